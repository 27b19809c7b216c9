use std::fmt;

/// A strong type representing a stable handle to a node in a [`super::Session`] arena.
///
/// Handles stay valid for the lifetime of their session and make cyclic
/// structure (environment self/parent links) representable without any
/// owning references.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SexpId(u32);

impl SexpId {
    /// Creates a new handle. Only the session arena mints these.
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for SexpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SexpId({})", self.0)
    }
}

impl fmt::Display for SexpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
