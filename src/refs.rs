//! Reference tables for shared and self-referential nodes.
//!
//! Only shareable kinds register: symbols, environments, namespaces and
//! persistently restored values. Indices are 1-based on the wire and
//! strictly increasing in assignment order. Reader and writer assign them
//! along the same pre-order, first-occurrence traversal, so the writer never
//! looks an index up by content, only by node identity.
//!
//! One table lives exactly as long as one read or write call.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use twox_hash::XxHash64;

use crate::error::{RdxError, Result};
use crate::sexp::SexpId;

/// The decoder's table: append-only, addressed by wire index.
#[derive(Debug, Default)]
pub struct ReadRefTable {
    entries: Vec<SexpId>,
}

impl ReadRefTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly materialized shareable node.
    pub fn add(&mut self, id: SexpId) -> SexpId {
        self.entries.push(id);
        id
    }

    /// Resolves a 1-based wire index.
    pub fn get(&self, index: i32) -> Result<SexpId> {
        if index < 1 {
            return Err(RdxError::Format(format!(
                "reference index {index} is not positive"
            )));
        }
        self.entries
            .get(index as usize - 1)
            .copied()
            .ok_or_else(|| {
                RdxError::Format(format!(
                    "reference index {index} out of range (table holds {})",
                    self.entries.len()
                ))
            })
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The encoder's table: node identity to already-assigned wire index.
#[derive(Debug, Default)]
pub struct WriteRefTable {
    indices: HashMap<SexpId, i32, BuildHasherDefault<XxHash64>>,
}

impl WriteRefTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next sequential 1-based index to `id`.
    pub fn add(&mut self, id: SexpId) -> i32 {
        let index = self.indices.len() as i32 + 1;
        self.indices.insert(id, index);
        index
    }

    /// The index previously assigned to `id`, if any.
    pub fn get(&self, id: SexpId) -> Option<i32> {
        self.indices.get(&id).copied()
    }
}
