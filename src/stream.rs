//! Byte-level readers and writers for the three wire encodings.
//!
//! Each encoding implements the same three primitives: 32-bit integers,
//! 64-bit doubles, and counted byte strings. The dispatcher never touches
//! bytes directly; everything flows through [`WireRead`] and [`WireWrite`].
//!
//! NA handling is encoding-specific: XDR translates one reserved 64-bit
//! pattern to the NA double, the ASCII encoding uses the literal tokens
//! `NA`, `Inf`, `-Inf` and `NaN`, and the native binary encoding passes
//! bit patterns through untouched.

use std::io::{Read, Write};

use crate::error::{RdxError, Result};
use crate::format::{is_na_real, NA_INTEGER, NA_REAL, XDR_NA_BITS};

/// Primitive decode operations shared by all encodings.
pub trait WireRead {
    /// Reads one 32-bit integer.
    fn read_int(&mut self) -> Result<i32>;
    /// Reads one 64-bit double.
    fn read_double(&mut self) -> Result<f64>;
    /// Reads a byte string of exactly `length` decoded bytes.
    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>>;
}

/// Primitive encode operations shared by all encodings.
pub trait WireWrite {
    /// Writes one 32-bit integer.
    fn write_int(&mut self, value: i32) -> Result<()>;
    /// Writes one 64-bit double.
    fn write_double(&mut self, value: f64) -> Result<()>;
    /// Writes a byte string; the caller has already written its length.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
    /// Flushes the underlying sink.
    fn flush(&mut self) -> Result<()>;
}

// --- XDR (big-endian) ---

/// Big-endian fixed-width reader.
#[derive(Debug)]
pub struct XdrReader<R> {
    inner: R,
}

impl<R: Read> XdrReader<R> {
    /// Wraps a byte source.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> WireRead for XdrReader<R> {
    fn read_int(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_double(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        let bits = u64::from_be_bytes(buf);
        if bits == XDR_NA_BITS {
            Ok(NA_REAL)
        } else {
            Ok(f64::from_bits(bits))
        }
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Big-endian fixed-width writer.
#[derive(Debug)]
pub struct XdrWriter<W> {
    inner: W,
}

impl<W: Write> XdrWriter<W> {
    /// Wraps a byte sink.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> WireWrite for XdrWriter<W> {
    fn write_int(&mut self, value: i32) -> Result<()> {
        self.inner.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        // The NA pattern is written explicitly so a NaN-canonicalizing
        // platform can never clobber it.
        let bits = if is_na_real(value) {
            XDR_NA_BITS
        } else {
            value.to_bits()
        };
        self.inner.write_all(&bits.to_be_bytes())?;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

// --- Native binary ---

/// Native-endian fixed-width reader.
#[derive(Debug)]
pub struct BinaryReader<R> {
    inner: R,
}

impl<R: Read> BinaryReader<R> {
    /// Wraps a byte source.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> WireRead for BinaryReader<R> {
    fn read_int(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(i32::from_ne_bytes(buf))
    }

    fn read_double(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(f64::from_bits(u64::from_ne_bytes(buf)))
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Native-endian fixed-width writer.
#[derive(Debug)]
pub struct BinaryWriter<W> {
    inner: W,
}

impl<W: Write> BinaryWriter<W> {
    /// Wraps a byte sink.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> WireWrite for BinaryWriter<W> {
    fn write_int(&mut self, value: i32) -> Result<()> {
        self.inner.write_all(&value.to_ne_bytes())?;
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.inner.write_all(&value.to_bits().to_ne_bytes())?;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

// --- ASCII ---

/// Whitespace-delimited decimal-token reader with string un-escaping.
#[derive(Debug)]
pub struct AsciiReader<R> {
    inner: R,
    pushed_back: Option<u8>,
}

impl<R: Read> AsciiReader<R> {
    /// Wraps a byte source.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pushed_back: None,
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.pushed_back.take() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) => Err(e.into()),
        }
    }

    fn require_byte(&mut self) -> Result<u8> {
        self.next_byte()?
            .ok_or_else(|| RdxError::Format("unexpected end of stream".into()))
    }

    fn unread(&mut self, byte: u8) {
        self.pushed_back = Some(byte);
    }

    /// Skips whitespace and returns the byte that follows it.
    fn skip_whitespace(&mut self) -> Result<u8> {
        loop {
            let b = self.require_byte()?;
            if !b.is_ascii_whitespace() {
                return Ok(b);
            }
        }
    }

    fn read_word(&mut self) -> Result<String> {
        let mut word = Vec::new();
        let mut b = self.skip_whitespace()?;
        loop {
            word.push(b);
            match self.next_byte()? {
                Some(next) if !next.is_ascii_whitespace() => b = next,
                _ => break,
            }
        }
        String::from_utf8(word)
            .map_err(|_| RdxError::Format("non-ASCII bytes in numeric token".into()))
    }

    /// Decodes one byte of an escaped string, consuming the backslash
    /// sequence if present.
    fn read_escaped_byte(&mut self) -> Result<u8> {
        let b = self.require_byte()?;
        if b != b'\\' {
            return Ok(b);
        }
        let e = self.require_byte()?;
        Ok(match e {
            b'n' => b'\n',
            b't' => b'\t',
            b'v' => 0x0B,
            b'b' => 0x08,
            b'r' => b'\r',
            b'f' => 0x0C,
            b'a' => 0x07,
            b'0'..=b'7' => {
                // Up to three octal digits; the first non-digit is pushed back.
                let mut value = u32::from(e - b'0');
                for _ in 0..2 {
                    match self.next_byte()? {
                        Some(d @ b'0'..=b'7') => value = value * 8 + u32::from(d - b'0'),
                        Some(other) => {
                            self.unread(other);
                            break;
                        }
                        None => break,
                    }
                }
                (value & 0xFF) as u8
            }
            other => other,
        })
    }
}

impl<R: Read> WireRead for AsciiReader<R> {
    fn read_int(&mut self) -> Result<i32> {
        let word = self.read_word()?;
        if word == "NA" {
            return Ok(NA_INTEGER);
        }
        word.parse::<i32>()
            .map_err(|_| RdxError::Format(format!("invalid integer token '{word}'")))
    }

    fn read_double(&mut self) -> Result<f64> {
        let word = self.read_word()?;
        match word.as_str() {
            "NA" => Ok(NA_REAL),
            "Inf" => Ok(f64::INFINITY),
            "-Inf" => Ok(f64::NEG_INFINITY),
            _ => word
                .parse::<f64>()
                .map_err(|_| RdxError::Format(format!("invalid double token '{word}'"))),
        }
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(length);
        if length > 0 {
            let first = self.skip_whitespace()?;
            self.unread(first);
            for _ in 0..length {
                buf.push(self.read_escaped_byte()?);
            }
        }
        Ok(buf)
    }
}

/// Decimal-token writer with string escaping.
#[derive(Debug)]
pub struct AsciiWriter<W> {
    inner: W,
}

impl<W: Write> AsciiWriter<W> {
    /// Wraps a byte sink.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> WireWrite for AsciiWriter<W> {
    fn write_int(&mut self, value: i32) -> Result<()> {
        if value == NA_INTEGER {
            self.inner.write_all(b"NA\n")?;
        } else {
            writeln!(self.inner, "{value}")?;
        }
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        if is_na_real(value) {
            self.inner.write_all(b"NA\n")?;
        } else if value == f64::INFINITY {
            self.inner.write_all(b"Inf\n")?;
        } else if value == f64::NEG_INFINITY {
            self.inner.write_all(b"-Inf\n")?;
        } else {
            // Rust's shortest round-trip formatting parses back exactly,
            // and emits "NaN" for ordinary NaNs.
            writeln!(self.inner, "{value}")?;
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for &b in bytes {
            match b {
                b'\n' => self.inner.write_all(b"\\n")?,
                b'\t' => self.inner.write_all(b"\\t")?,
                0x0B => self.inner.write_all(b"\\v")?,
                0x08 => self.inner.write_all(b"\\b")?,
                b'\r' => self.inner.write_all(b"\\r")?,
                0x0C => self.inner.write_all(b"\\f")?,
                0x07 => self.inner.write_all(b"\\a")?,
                b'\\' => self.inner.write_all(b"\\\\")?,
                // Space must be escaped: string payloads are themselves
                // whitespace-delimited tokens.
                b' ' => self.inner.write_all(b"\\040")?,
                0x21..=0x7E => self.inner.write_all(&[b])?,
                other => write!(self.inner, "\\{other:03o}")?,
            }
        }
        self.inner.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

// --- Runtime dispatch ---

/// A reader whose encoding was selected at runtime by header sniffing.
#[derive(Debug)]
pub enum AnyReader<R> {
    /// Big-endian.
    Xdr(XdrReader<R>),
    /// Text tokens.
    Ascii(AsciiReader<R>),
    /// Native-endian.
    Binary(BinaryReader<R>),
}

impl<R: Read> WireRead for AnyReader<R> {
    fn read_int(&mut self) -> Result<i32> {
        match self {
            Self::Xdr(r) => r.read_int(),
            Self::Ascii(r) => r.read_int(),
            Self::Binary(r) => r.read_int(),
        }
    }

    fn read_double(&mut self) -> Result<f64> {
        match self {
            Self::Xdr(r) => r.read_double(),
            Self::Ascii(r) => r.read_double(),
            Self::Binary(r) => r.read_double(),
        }
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        match self {
            Self::Xdr(r) => r.read_bytes(length),
            Self::Ascii(r) => r.read_bytes(length),
            Self::Binary(r) => r.read_bytes(length),
        }
    }
}

/// A writer for a caller-selected encoding.
#[derive(Debug)]
pub enum AnyWriter<W> {
    /// Big-endian.
    Xdr(XdrWriter<W>),
    /// Text tokens.
    Ascii(AsciiWriter<W>),
    /// Native-endian.
    Binary(BinaryWriter<W>),
}

impl<W: Write> WireWrite for AnyWriter<W> {
    fn write_int(&mut self, value: i32) -> Result<()> {
        match self {
            Self::Xdr(w) => w.write_int(value),
            Self::Ascii(w) => w.write_int(value),
            Self::Binary(w) => w.write_int(value),
        }
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        match self {
            Self::Xdr(w) => w.write_double(value),
            Self::Ascii(w) => w.write_double(value),
            Self::Binary(w) => w.write_double(value),
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            Self::Xdr(w) => w.write_bytes(bytes),
            Self::Ascii(w) => w.write_bytes(bytes),
            Self::Binary(w) => w.write_bytes(bytes),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            Self::Xdr(w) => w.flush(),
            Self::Ascii(w) => w.flush(),
            Self::Binary(w) => w.flush(),
        }
    }
}
