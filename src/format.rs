//! Defines the on-wire constants of the serialization protocol.
//!
//! # Stream Layout
//! A serialized graph is one header, one version record and one root node:
//!
//! `[Magic (2 or 7 bytes)] [Version Record (3 x i32)] [Root Node]`
//!
//! The magic selects one of three encodings (XDR, ASCII, native binary); the
//! version record gates protocol compatibility. Everything after the version
//! record is a stream of tagged nodes in the dispatcher's format (see
//! [`crate::reader`] and [`crate::writer`]).

use std::fmt;

// --- MAGIC HEADERS ---

/// Short-form magic for the XDR (big-endian) encoding.
pub const XDR_MAGIC_SHORT: [u8; 2] = *b"X\n";
/// Short-form magic for the ASCII encoding.
pub const ASCII_MAGIC_SHORT: [u8; 2] = *b"A\n";
/// Short-form magic for the native binary encoding.
pub const BINARY_MAGIC_SHORT: [u8; 2] = *b"B\n";

/// Long-form magic for the XDR encoding, as written by workspace files.
pub const XDR_MAGIC: [u8; 7] = *b"RDX2\nX\n";
/// Long-form magic for the ASCII encoding.
pub const ASCII_MAGIC: [u8; 7] = *b"RDA2\nA\n";
/// Long-form magic for the native binary encoding.
pub const BINARY_MAGIC: [u8; 7] = *b"RDB2\nB\n";

/// The one protocol version this implementation reads and writes.
pub const VERSION2: i32 = 2;

// --- NA SENTINELS ---

/// The integer (and logical) NA sentinel.
pub const NA_INTEGER: i32 = i32::MIN;

/// The exact 64-bit pattern transmitted for the double NA.
///
/// This is a quiet NaN whose low word is 1954; it must survive a round trip
/// bit-for-bit and must stay distinguishable from every computable NaN.
pub const XDR_NA_BITS: u64 = 0x7FF0_0000_0000_07A2;

/// The double NA value. Compare with [`is_na_real`], never with `==`.
pub const NA_REAL: f64 = f64::from_bits(XDR_NA_BITS);

/// Returns true if `value` is the double NA (and not an ordinary NaN).
pub fn is_na_real(value: f64) -> bool {
    value.to_bits() == XDR_NA_BITS
}

// --- TYPE TAGS ---
//
// The low byte of every node's flags word. Values below 128 are real node
// kinds; values from 241 up are pseudo-tags for singletons, references and
// the persistence hook.

/// Symbol.
pub const SYMSXP: i32 = 1;
/// Pairlist cell.
pub const LISTSXP: i32 = 2;
/// Closure.
pub const CLOSXP: i32 = 3;
/// Environment.
pub const ENVSXP: i32 = 4;
/// Promise.
pub const PROMSXP: i32 = 5;
/// Call expression.
pub const LANGSXP: i32 = 6;
/// Special primitive (not supported).
pub const SPECIALSXP: i32 = 7;
/// Builtin primitive (not supported).
pub const BUILTINSXP: i32 = 8;
/// Single character string.
pub const CHARSXP: i32 = 9;
/// Logical vector.
pub const LGLSXP: i32 = 10;
/// Integer vector.
pub const INTSXP: i32 = 13;
/// Double vector.
pub const REALSXP: i32 = 14;
/// Complex vector.
pub const CPLXSXP: i32 = 15;
/// String vector.
pub const STRSXP: i32 = 16;
/// Dot-dot-dot list (not supported).
pub const DOTSXP: i32 = 17;
/// List vector.
pub const VECSXP: i32 = 19;
/// Expression vector.
pub const EXPRSXP: i32 = 20;
/// Byte-compiled code (not supported).
pub const BCODESXP: i32 = 21;
/// External pointer (not supported).
pub const EXTPTRSXP: i32 = 22;
/// Weak reference (not supported).
pub const WEAKREFSXP: i32 = 23;
/// Raw byte vector.
pub const RAWSXP: i32 = 24;
/// S4 object (not supported).
pub const S4SXP: i32 = 25;

/// Base environment singleton.
pub const BASEENV_SXP: i32 = 241;
/// Empty environment singleton.
pub const EMPTYENV_SXP: i32 = 242;
/// Generic function reference (not supported).
pub const GENERICREFSXP: i32 = 245;
/// Class reference (not supported).
pub const CLASSREFSXP: i32 = 246;
/// Persistent value resolved through the injected restorer.
pub const PERSISTSXP: i32 = 247;
/// Package environment (not supported).
pub const PACKAGESXP: i32 = 248;
/// Namespace environment, resolved by name against the session registry.
pub const NAMESPACESXP: i32 = 249;
/// Base namespace singleton.
pub const BASENAMESPACE_SXP: i32 = 250;
/// Missing-argument sentinel.
pub const MISSINGARG_SXP: i32 = 251;
/// Unbound-value sentinel.
pub const UNBOUNDVALUE_SXP: i32 = 252;
/// Global environment singleton.
pub const GLOBALENV_SXP: i32 = 253;
/// Null.
pub const NILVALUE_SXP: i32 = 254;
/// Back reference into the reference table.
pub const REFSXP: i32 = 255;

// --- VERSION RECORD ---

/// A release version packed into one integer as `major*65536 + minor*256 + patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version(i32);

impl Version {
    /// Packs a version triple.
    pub const fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self(major * 65536 + minor * 256 + patch)
    }

    /// Wraps an already-packed value read from the wire.
    pub const fn from_packed(packed: i32) -> Self {
        Self(packed)
    }

    /// Returns the packed wire representation.
    pub const fn packed(&self) -> i32 {
        self.0
    }

    /// True for version records written by unreleased, development writers.
    pub const fn is_experimental(&self) -> bool {
        self.0 <= 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_experimental() {
            write!(f, "(unreleased)")
        } else {
            write!(f, "{}.{}.{}", self.0 >> 16, (self.0 >> 8) & 0xFF, self.0 & 0xFF)
        }
    }
}

/// The writer version stamped into every produced stream.
pub const WRITER_VERSION: Version = Version::new(2, 10, 1);
/// The oldest reader release able to consume streams we produce.
pub const MIN_READER_VERSION: Version = Version::new(2, 3, 0);

// --- ENCODING SELECTOR ---

/// The three interchangeable on-wire encodings.
///
/// All three decode to identical in-memory graphs; they differ only in how
/// integers, doubles and byte strings are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Big-endian fixed-width binary. The portable default.
    #[default]
    Xdr,
    /// Whitespace-delimited decimal text with escaped strings.
    Ascii,
    /// Native-endian fixed-width binary.
    Binary,
}

impl WireFormat {
    /// The long-form magic emitted by the writer for this encoding.
    pub const fn magic(&self) -> &'static [u8; 7] {
        match self {
            Self::Xdr => &XDR_MAGIC,
            Self::Ascii => &ASCII_MAGIC,
            Self::Binary => &BINARY_MAGIC,
        }
    }
}
