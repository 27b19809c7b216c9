//! The encode engine.
//!
//! Mirrors the decode dispatcher field for field: flags word, tag, attribute
//! list, then the type-specific payload. Shareable nodes (symbols,
//! environments, namespaces) are assigned reference-table indices in the
//! same pre-order, first-occurrence order a compliant decoder uses, so a
//! second encounter emits only a back reference.
//!
//! The graph is a read-only input; it must be fully materialized before
//! writing starts.

use std::io::Write;

use tracing::debug;

use crate::error::{RdxError, Result};
use crate::flags::{Flags, MAX_PACKED_INDEX, UTF8_LEVEL};
use crate::format::{
    WireFormat, BASEENV_SXP, BASENAMESPACE_SXP, CHARSXP, CLOSXP, CPLXSXP, EMPTYENV_SXP, ENVSXP,
    EXPRSXP, GLOBALENV_SXP, INTSXP, LANGSXP, LGLSXP, LISTSXP, MIN_READER_VERSION, MISSINGARG_SXP,
    NAMESPACESXP, NILVALUE_SXP, PROMSXP, RAWSXP, REALSXP, REFSXP, STRSXP, SYMSXP,
    UNBOUNDVALUE_SXP, VECSXP, VERSION2, WRITER_VERSION,
};
use crate::refs::WriteRefTable;
use crate::sexp::{Session, Sexp, SexpId};
use crate::stream::{AnyWriter, AsciiWriter, BinaryWriter, WireWrite, XdrWriter};

/// The main handle for encoding one graph to one byte sink.
pub struct RdxWriter<'a, W> {
    session: &'a Session,
    wire: AnyWriter<W>,
    refs: WriteRefTable,
}

impl<'a, W: Write> RdxWriter<'a, W> {
    /// Opens a sink with the default XDR encoding, writing the magic header.
    pub fn new(session: &'a Session, sink: W) -> Result<Self> {
        Self::with_format(session, sink, WireFormat::default())
    }

    /// Opens a sink for the given encoding, writing the magic header.
    pub fn with_format(session: &'a Session, mut sink: W, format: WireFormat) -> Result<Self> {
        sink.write_all(format.magic())?;
        let wire = match format {
            WireFormat::Xdr => AnyWriter::Xdr(XdrWriter::new(sink)),
            WireFormat::Ascii => AnyWriter::Ascii(AsciiWriter::new(sink)),
            WireFormat::Binary => AnyWriter::Binary(BinaryWriter::new(sink)),
        };
        Ok(Self {
            session,
            wire,
            refs: WriteRefTable::new(),
        })
    }

    /// Encodes the version record and one root node, consuming the writer.
    pub fn write_root(mut self, root: SexpId) -> Result<()> {
        self.wire.write_int(VERSION2)?;
        self.wire.write_int(WRITER_VERSION.packed())?;
        self.wire.write_int(MIN_READER_VERSION.packed())?;
        self.write_node(root)?;
        self.wire.flush()?;
        debug!(
            kind = self.session.get(root).kind_name(),
            "encoded root node"
        );
        Ok(())
    }

    // --- dispatch ---

    fn write_node(&mut self, id: SexpId) -> Result<()> {
        let session = self.session;

        // Singletons carry no payload: the pseudo-tag is the whole node.
        match session.get(id) {
            Sexp::Null => return self.wire.write_int(NILVALUE_SXP),
            Sexp::UnboundValue => return self.wire.write_int(UNBOUNDVALUE_SXP),
            Sexp::MissingArg => return self.wire.write_int(MISSINGARG_SXP),
            Sexp::EmptyEnv => return self.wire.write_int(EMPTYENV_SXP),
            Sexp::GlobalEnv => return self.wire.write_int(GLOBALENV_SXP),
            Sexp::BaseEnv => return self.wire.write_int(BASEENV_SXP),
            Sexp::BaseNamespace => return self.wire.write_int(BASENAMESPACE_SXP),
            _ => {}
        }

        if let Some(index) = self.refs.get(id) {
            return self.write_ref(index);
        }

        match session.get(id) {
            Sexp::Symbol(name) => {
                self.refs.add(id);
                self.wire.write_int(SYMSXP)?;
                self.write_char_node(Some(name))
            }
            Sexp::Environment(data) => {
                self.refs.add(id);
                self.wire.write_int(ENVSXP)?;
                self.wire.write_int(i32::from(data.locked))?;
                self.write_node(data.parent)?;
                self.write_node(data.frame)?;
                // Legacy hash-table slot.
                self.wire.write_int(NILVALUE_SXP)?;
                self.write_attributes_or_null(data.attributes)
            }
            Sexp::Namespace(name) => {
                self.refs.add(id);
                self.wire.write_int(NAMESPACESXP)?;
                self.write_string_keys(std::slice::from_ref(name))
            }
            Sexp::Pair(_) => self.write_pairlist(id),
            Sexp::Call(call) => {
                let word = Flags::pack(
                    LANGSXP,
                    0,
                    self.is_object(id),
                    call.attributes.is_some(),
                    false,
                );
                self.wire.write_int(word)?;
                self.write_attributes(call.attributes)?;
                self.write_node(call.function)?;
                self.write_node(call.arguments)
            }
            Sexp::Closure(closure) => {
                let word = Flags::pack(
                    CLOSXP,
                    0,
                    self.is_object(id),
                    closure.attributes.is_some(),
                    true,
                );
                self.wire.write_int(word)?;
                self.write_attributes(closure.attributes)?;
                self.write_node(closure.environment)?;
                self.write_node(closure.formals)?;
                self.write_node(closure.body)
            }
            Sexp::Promise(promise) => {
                let word = Flags::pack(
                    PROMSXP,
                    0,
                    false,
                    promise.attributes.is_some(),
                    promise.environment.is_some(),
                );
                self.wire.write_int(word)?;
                self.write_attributes(promise.attributes)?;
                if let Some(environment) = promise.environment {
                    self.write_node(environment)?;
                }
                match promise.value {
                    Some(value) => self.write_node(value)?,
                    None => self.wire.write_int(UNBOUNDVALUE_SXP)?,
                }
                self.write_node(promise.expression)
            }
            Sexp::Char(value) => self.write_char_node(value.as_deref()),
            Sexp::Logicals(vector) => {
                self.write_vector_prefix(LGLSXP, id, vector.attributes, vector.values.len())?;
                for &value in &vector.values {
                    self.wire.write_int(value)?;
                }
                self.write_attributes(vector.attributes)
            }
            Sexp::Ints(vector) => {
                self.write_vector_prefix(INTSXP, id, vector.attributes, vector.values.len())?;
                for &value in &vector.values {
                    self.wire.write_int(value)?;
                }
                self.write_attributes(vector.attributes)
            }
            Sexp::Doubles(vector) => {
                self.write_vector_prefix(REALSXP, id, vector.attributes, vector.values.len())?;
                for &value in &vector.values {
                    self.wire.write_double(value)?;
                }
                self.write_attributes(vector.attributes)
            }
            Sexp::Complexes(vector) => {
                self.write_vector_prefix(CPLXSXP, id, vector.attributes, vector.values.len())?;
                for &value in &vector.values {
                    self.wire.write_double(value.re)?;
                    self.wire.write_double(value.im)?;
                }
                self.write_attributes(vector.attributes)
            }
            Sexp::Strings(vector) => {
                self.write_vector_prefix(STRSXP, id, vector.attributes, vector.values.len())?;
                for value in &vector.values {
                    self.write_char_node(value.as_deref())?;
                }
                self.write_attributes(vector.attributes)
            }
            Sexp::Raw(vector) => {
                self.write_vector_prefix(RAWSXP, id, vector.attributes, vector.values.len())?;
                self.wire.write_bytes(&vector.values)?;
                self.write_attributes(vector.attributes)
            }
            Sexp::List(vector) => {
                self.write_vector_prefix(VECSXP, id, vector.attributes, vector.values.len())?;
                for &value in &vector.values {
                    self.write_node(value)?;
                }
                self.write_attributes(vector.attributes)
            }
            Sexp::Expressions(vector) => {
                self.write_vector_prefix(EXPRSXP, id, vector.attributes, vector.values.len())?;
                for &value in &vector.values {
                    self.write_node(value)?;
                }
                self.write_attributes(vector.attributes)
            }
            singleton => Err(RdxError::Unsupported(format!(
                "cannot encode node kind {}",
                singleton.kind_name()
            ))),
        }
    }

    // --- helpers ---

    fn write_ref(&mut self, index: i32) -> Result<()> {
        if index <= MAX_PACKED_INDEX {
            self.wire.write_int(Flags::pack_ref(index))
        } else {
            self.wire.write_int(REFSXP)?;
            self.wire.write_int(index)
        }
    }

    fn write_vector_prefix(
        &mut self,
        ty: i32,
        id: SexpId,
        attributes: Option<SexpId>,
        length: usize,
    ) -> Result<()> {
        let word = Flags::pack(ty, 0, self.is_object(id), attributes.is_some(), false);
        self.wire.write_int(word)?;
        let length = i32::try_from(length)
            .map_err(|_| RdxError::Format(format!("vector length {length} exceeds wire range")))?;
        self.wire.write_int(length)
    }

    fn write_attributes(&mut self, attributes: Option<SexpId>) -> Result<()> {
        match attributes {
            Some(id) => self.write_node(id),
            None => Ok(()),
        }
    }

    /// Environments carry their attribute slot unconditionally.
    fn write_attributes_or_null(&mut self, attributes: Option<SexpId>) -> Result<()> {
        match attributes {
            Some(id) => self.write_node(id),
            None => self.wire.write_int(NILVALUE_SXP),
        }
    }

    fn write_char_node(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(text) => {
                self.wire
                    .write_int(Flags::pack(CHARSXP, UTF8_LEVEL, false, false, false))?;
                let length = i32::try_from(text.len()).map_err(|_| {
                    RdxError::Format("character payload exceeds wire range".into())
                })?;
                self.wire.write_int(length)?;
                self.wire.write_bytes(text.as_bytes())
            }
            None => {
                self.wire
                    .write_int(Flags::pack(CHARSXP, 0, false, false, false))?;
                self.wire.write_int(-1)
            }
        }
    }

    /// The 0-prefixed string-vector form shared with persistent records.
    fn write_string_keys(&mut self, keys: &[String]) -> Result<()> {
        self.wire.write_int(0)?;
        let length = i32::try_from(keys.len())
            .map_err(|_| RdxError::Format("key sequence exceeds wire range".into()))?;
        self.wire.write_int(length)?;
        for key in keys {
            self.write_char_node(Some(key))?;
        }
        Ok(())
    }

    /// Encodes a pairlist chain iteratively, one cell per loop turn; the
    /// first non-cell node terminates the chain.
    fn write_pairlist(&mut self, mut id: SexpId) -> Result<()> {
        let session = self.session;
        loop {
            match session.get(id) {
                Sexp::Pair(cell) => {
                    let word = Flags::pack(
                        LISTSXP,
                        0,
                        self.is_object(id),
                        cell.attributes.is_some(),
                        cell.tag.is_some(),
                    );
                    self.wire.write_int(word)?;
                    self.write_attributes(cell.attributes)?;
                    if let Some(tag) = cell.tag {
                        self.write_node(tag)?;
                    }
                    self.write_node(cell.value)?;
                    id = cell.next;
                }
                _ => return self.write_node(id),
            }
        }
    }

    /// A node is an "object" on the wire when its attribute list carries a
    /// class attribute.
    fn is_object(&self, id: SexpId) -> bool {
        let session = self.session;
        let Some(mut attributes) = session.get(id).attributes() else {
            return false;
        };
        loop {
            match session.get(attributes) {
                Sexp::Pair(cell) => {
                    if let Some(tag) = cell.tag {
                        if matches!(session.get(tag), Sexp::Symbol(name) if name == "class") {
                            return true;
                        }
                    }
                    attributes = cell.next;
                }
                _ => return false,
            }
        }
    }
}
