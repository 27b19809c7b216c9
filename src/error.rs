//! Centralized error handling.
//!
//! Every failure is fatal to the current read or write call: there is no
//! local recovery and no partial result. The caller must discard any
//! partially read graph or partially written bytes.
//!
//! Errors are grouped by domain:
//!
//! - **I/O** ([`RdxError::Io`]): the underlying stream failed.
//! - **Format** ([`RdxError::Format`]): bad magic, unsupported protocol
//!   version, unknown type tag, out-of-range reference index, truncation.
//! - **Unsupported** ([`RdxError::Unsupported`]): a recognized type tag with
//!   no implementation (byte code, S4 objects, ...). These are never decoded
//!   on a best-effort basis, since guessing would silently corrupt structure.
//! - **Config** ([`RdxError::Config`]): the stream needs a collaborator the
//!   caller did not supply (a persistence restorer or a registered
//!   namespace).

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for serialization operations.
pub type Result<T> = std::result::Result<T, RdxError>;

/// The master error enum covering all failure domains.
///
/// The type is `Clone` so errors can be stored or compared in tests; I/O
/// errors are wrapped in `Arc` to keep cloning cheap.
#[derive(Debug, Clone)]
pub enum RdxError {
    /// Low-level I/O failure on the underlying stream.
    Io(Arc<io::Error>),

    /// The stream violates the wire format.
    ///
    /// Covers malformed or unknown magic headers, rejected protocol
    /// versions, unknown type tags, reference indices outside the table,
    /// and truncated input.
    Format(String),

    /// A recognized node kind this implementation does not encode or decode.
    Unsupported(String),

    /// A required collaborator was not configured for this call.
    Config(String),
}

impl fmt::Display for RdxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::Unsupported(s) => write!(f, "Unsupported Feature: {s}"),
            Self::Config(s) => write!(f, "Configuration Error: {s}"),
        }
    }
}

impl std::error::Error for RdxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RdxError {
    fn from(err: io::Error) -> Self {
        // Truncation is a property of the stream contents, not of the
        // transport, so it surfaces as a format violation.
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Format("unexpected end of stream".into())
        } else {
            Self::Io(Arc::new(err))
        }
    }
}
