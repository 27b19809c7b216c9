//! High-level entry points.
//!
//! One function call per whole-graph operation: the reader and writer types
//! stay available for callers that need a persistence restorer or an
//! explicit encoding, while the common paths are one-liners.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::format::WireFormat;
use crate::reader::{PersistentRestorer, RdxReader};
use crate::sexp::{Session, SexpId};
use crate::writer::RdxWriter;

/// The main entry point for reading and writing serialized graphs.
#[derive(Debug)]
pub struct Rdx;

impl Rdx {
    /// Decodes one graph from a byte source into `session`.
    pub fn read<R: Read>(session: &mut Session, source: R) -> Result<SexpId> {
        RdxReader::new(session, source)?.read_root()
    }

    /// Decodes one graph, resolving persistent-value nodes through `restorer`.
    pub fn read_with<R: Read>(
        session: &mut Session,
        source: R,
        restorer: &dyn PersistentRestorer,
    ) -> Result<SexpId> {
        RdxReader::with_restorer(session, source, Some(restorer))?.read_root()
    }

    /// Decodes one graph from a file, memory-mapping it for zero-copy reads.
    ///
    /// Compressed workspaces must be unwrapped by the caller first; this
    /// component only sees the serialized byte stream.
    pub fn read_path<P: AsRef<Path>>(session: &mut Session, path: P) -> Result<SexpId> {
        let file = File::open(path)?;
        // Safety: an external process rewriting the file mid-read is accepted
        // for mapped reads, as with any mmap-backed reader.
        #[allow(unsafe_code)]
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Self::read(session, &mmap[..])
    }

    /// Encodes one graph to a byte sink in the default XDR encoding.
    pub fn write<W: Write>(session: &Session, sink: W, root: SexpId) -> Result<()> {
        RdxWriter::new(session, sink)?.write_root(root)
    }

    /// Encodes one graph in an explicit encoding.
    pub fn write_as<W: Write>(
        session: &Session,
        sink: W,
        root: SexpId,
        format: WireFormat,
    ) -> Result<()> {
        RdxWriter::with_format(session, sink, format)?.write_root(root)
    }

    /// Encodes one graph to a file in the default XDR encoding.
    pub fn write_path<P: AsRef<Path>>(session: &Session, path: P, root: SexpId) -> Result<()> {
        let file = File::create(path)?;
        Self::write(session, BufWriter::new(file), root)
    }
}
