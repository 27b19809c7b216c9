//! # RDX
//!
//! A portable, versioned serialization protocol for a dynamic-language
//! runtime's object graph: vectors, linked attribute/argument lists,
//! closures, promises, environments and symbols. Graphs round-trip through
//! three interchangeable on-wire encodings while preserving structural
//! sharing and self-reference.
//!
//! ## Overview
//!
//! RDX treats the data it serializes as a graph, not a blob. Every node
//! lives in an arena owned by a [`Session`] and is addressed by a stable
//! [`SexpId`] handle, so shared subtrees and cyclic environment chains are
//! first-class: encoding the same environment reachable over two paths
//! emits it once plus a back reference, and decoding reconstructs a single
//! identity referenced from both paths.
//!
//! ### Key Properties
//!
//! *   **Three encodings, one format:** XDR (big-endian), native binary and
//!     a whitespace-delimited ASCII text form all decode to identical
//!     in-memory graphs. The reader sniffs a short magic prefix to pick one.
//! *   **Versioned:** every stream carries a three-integer version record;
//!     anything but the one supported protocol version is rejected before a
//!     single node is decoded.
//! *   **NA fidelity:** each value type has its own "not available"
//!     sentinel (a reserved integer, a reserved 64-bit double pattern
//!     distinct from any computable NaN, a negative length for strings),
//!     and each survives a round trip bit-for-bit.
//! *   **Structural only:** the serializer never evaluates anything. In
//!     particular, unforced promises are reconstructed with their expression
//!     and environment intact rather than being forced during decode.
//!
//! ## Architecture
//!
//! ### The Session
//!
//! A [`Session`] is the arena allocator for graph nodes plus the identity
//! tables the protocol needs: interned symbols (same name, same handle), a
//! namespace registry, and the process-wide singletons (null, the sentinel
//! values, the global/base/empty environments). Independent sessions share
//! no identity, so parallel callers each own one.
//!
//! ### Reader and Writer
//!
//! [`RdxReader`] and [`RdxWriter`] are one-shot engines: each owns one byte
//! stream and one reference table for exactly one root node. The reference
//! table assigns 1-based indices to shareable nodes (symbols, environments,
//! namespaces) in pre-order, first-occurrence order on both sides, so the
//! index itself is never transmitted for packed references.
//!
//! ### Persistence Hook
//!
//! Streams may contain persistent-value nodes: opaque key sequences that
//! only an injected [`PersistentRestorer`] can resolve (typically against a
//! package registry). Decoding such a stream without a restorer is a
//! configuration error.
//!
//! ## Usage
//!
//! ```rust
//! use rdx::{Rdx, Session, Sexp, VectorData};
//!
//! let mut session = Session::new();
//! let values = session.alloc(Sexp::Ints(VectorData::new(vec![1, 2, 3])));
//! let root = session.named_pairlist([("serialized", values)]);
//!
//! let mut buffer = Vec::new();
//! Rdx::write(&session, &mut buffer, root)?;
//!
//! let mut other = Session::new();
//! let decoded = Rdx::read(&mut other, buffer.as_slice())?;
//! assert!(rdx::deep_eq(&session, root, &other, decoded));
//! # Ok::<(), rdx::RdxError>(())
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **No panics:** no `unwrap()` or `panic!()` in the library (enforced by
//!   clippy lints); arena handle lookups assert their invariant explicitly.
//! * **Fatal errors only:** a call either materializes the whole graph or
//!   fails with an [`RdxError`]; partial results are never returned.
//! * **Encapsulated unsafe:** `unsafe` appears only for memory-mapping in
//!   [`Rdx::read_path`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod error;
pub mod flags;
pub mod format;
pub mod reader;
pub mod refs;
pub mod sexp;
pub mod stream;
pub mod writer;

// --- RE-EXPORTS ---

pub use api::Rdx;
pub use error::{RdxError, Result};
pub use format::{is_na_real, Version, WireFormat, NA_INTEGER, NA_REAL};
pub use reader::{PersistentRestorer, RdxReader};
pub use sexp::{
    deep_eq, CallData, ClosureData, Complex, EnvData, PairCell, PromiseData, RString, Session,
    Sexp, SexpId, VectorData,
};
pub use writer::RdxWriter;
