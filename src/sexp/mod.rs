//! The in-memory object-graph model.
//!
//! This module defines the closed [`Sexp`] node enum, the arena-backed
//! [`Session`] that owns every node, and [`deep_eq`] for structural
//! comparison across sessions. The serializer treats nodes purely
//! structurally; nothing here evaluates anything.

/// Defines the `Session` arena and the `Sexp` node kinds.
pub mod arena;
/// Defines the `SexpId` handle type.
pub mod id;

pub use arena::{
    deep_eq, CallData, ClosureData, Complex, EnvData, PairCell, PromiseData, RString, Session,
    Sexp, VectorData,
};
pub use id::SexpId;
