//! The decode engine.
//!
//! Sniffs the magic header to select an encoding, enforces the protocol
//! version, then materializes one root node by recursive dispatch on each
//! node's flags word. Pairlist chains and vector elements are traversed
//! iteratively so call-stack depth tracks only genuine structural nesting.
//!
//! One reader owns one byte source and one reference table for exactly one
//! call; a failed call leaves the session with whatever nodes were already
//! allocated, and the caller must discard the result.

use std::io::Read;

use tracing::{debug, trace};

use crate::error::{RdxError, Result};
use crate::flags::Flags;
use crate::format::{
    Version, WireFormat, ASCII_MAGIC, BASEENV_SXP, BASENAMESPACE_SXP, BCODESXP, BINARY_MAGIC,
    BUILTINSXP, CHARSXP, CLASSREFSXP, CLOSXP, CPLXSXP, DOTSXP, EMPTYENV_SXP, ENVSXP, EXPRSXP,
    EXTPTRSXP, GENERICREFSXP, GLOBALENV_SXP, INTSXP, LANGSXP, LGLSXP, LISTSXP, MISSINGARG_SXP,
    NAMESPACESXP, NILVALUE_SXP, PACKAGESXP, PERSISTSXP, PROMSXP, RAWSXP, REALSXP, REFSXP, S4SXP,
    SPECIALSXP, STRSXP, SYMSXP, UNBOUNDVALUE_SXP, VECSXP, VERSION2, WEAKREFSXP, XDR_MAGIC,
};
use crate::refs::ReadRefTable;
use crate::sexp::{
    CallData, ClosureData, Complex, EnvData, PairCell, PromiseData, RString, Session, Sexp,
    SexpId, VectorData,
};
use crate::stream::{AnyReader, AsciiReader, BinaryReader, WireRead, XdrReader};

/// Injected callback resolving persistent-value nodes.
///
/// The byte stream carries only an opaque key sequence for these nodes; the
/// restorer maps the keys back to a live value (typically through a package
/// or namespace registry the serializer knows nothing about).
pub trait PersistentRestorer {
    /// Resolves one key sequence to a node in `session`.
    fn restore(&self, session: &mut Session, keys: &[String]) -> Result<SexpId>;
}

/// The main handle for decoding one graph from one byte source.
///
/// Construction sniffs the header and validates the protocol version;
/// [`RdxReader::read_root`] then materializes the root node.
pub struct RdxReader<'a, R> {
    session: &'a mut Session,
    wire: AnyReader<R>,
    encoding: WireFormat,
    refs: ReadRefTable,
    restorer: Option<&'a dyn PersistentRestorer>,
}

impl<'a, R: Read> RdxReader<'a, R> {
    /// Opens a stream with no persistence restorer.
    pub fn new(session: &'a mut Session, conn: R) -> Result<Self> {
        Self::with_restorer(session, conn, None)
    }

    /// Opens a stream, sniffing the header and enforcing the version gate.
    ///
    /// Both header and version failures are fatal and happen before any node
    /// is decoded.
    pub fn with_restorer(
        session: &'a mut Session,
        conn: R,
        restorer: Option<&'a dyn PersistentRestorer>,
    ) -> Result<Self> {
        let (wire, encoding) = negotiate(conn)?;
        debug!(?encoding, "negotiated wire encoding");
        let mut reader = Self {
            session,
            wire,
            encoding,
            refs: ReadRefTable::new(),
            restorer,
        };
        reader.check_version()?;
        Ok(reader)
    }

    /// The encoding selected by header sniffing.
    pub fn encoding(&self) -> WireFormat {
        self.encoding
    }

    /// Decodes the root node, consuming the reader.
    pub fn read_root(mut self) -> Result<SexpId> {
        let root = self.read_node()?;
        debug!(
            shared_nodes = self.refs.len(),
            kind = self.session.get(root).kind_name(),
            "decoded root node"
        );
        Ok(root)
    }

    fn check_version(&mut self) -> Result<()> {
        let version = self.wire.read_int()?;
        let writer_version = Version::from_packed(self.wire.read_int()?);
        let release_version = Version::from_packed(self.wire.read_int()?);

        if version != VERSION2 {
            return Err(if release_version.is_experimental() {
                RdxError::Format(format!(
                    "cannot read workspace version {version} written by experimental writer {writer_version}"
                ))
            } else {
                RdxError::Format(format!(
                    "cannot read workspace version {version} written by release {writer_version}; \
                     need {release_version} or newer"
                ))
            });
        }
        debug!(version, writer = %writer_version, "accepted protocol version");
        Ok(())
    }

    // --- dispatch ---

    fn read_node(&mut self) -> Result<SexpId> {
        let flags = Flags::unpack(self.wire.read_int()?);
        self.read_node_with(flags)
    }

    fn read_node_with(&mut self, flags: Flags) -> Result<SexpId> {
        match flags.ty {
            NILVALUE_SXP => Ok(self.session.null()),
            EMPTYENV_SXP => Ok(self.session.empty_env()),
            BASEENV_SXP => Ok(self.session.base_env()),
            GLOBALENV_SXP => Ok(self.session.global_env()),
            UNBOUNDVALUE_SXP => Ok(self.session.unbound_value()),
            MISSINGARG_SXP => Ok(self.session.missing_arg()),
            BASENAMESPACE_SXP => Ok(self.session.base_namespace()),
            REFSXP => self.read_reference(flags),
            PERSISTSXP => self.read_persistent(),
            SYMSXP => self.read_symbol(),
            NAMESPACESXP => self.read_namespace(),
            ENVSXP => self.read_environment(),
            LISTSXP => self.read_pairlist(flags),
            LANGSXP => self.read_call(flags),
            CLOSXP => self.read_closure(flags),
            PROMSXP => self.read_promise(flags),
            CHARSXP => self.read_char(flags),
            LGLSXP => self.read_logicals(flags),
            INTSXP => self.read_ints(flags),
            REALSXP => self.read_doubles(flags),
            CPLXSXP => self.read_complexes(flags),
            STRSXP => self.read_strings(flags),
            RAWSXP => self.read_raw(flags),
            VECSXP => self.read_list(flags),
            EXPRSXP => self.read_expressions(flags),
            BCODESXP => Err(RdxError::Unsupported("byte-compiled code".into())),
            SPECIALSXP | BUILTINSXP => {
                Err(RdxError::Unsupported("primitive function".into()))
            }
            DOTSXP => Err(RdxError::Unsupported("dot-dot-dot list".into())),
            EXTPTRSXP => Err(RdxError::Unsupported("external pointer".into())),
            WEAKREFSXP => Err(RdxError::Unsupported("weak reference".into())),
            PACKAGESXP => Err(RdxError::Unsupported("package environment".into())),
            CLASSREFSXP => Err(RdxError::Unsupported("class reference".into())),
            GENERICREFSXP => {
                Err(RdxError::Unsupported("generic function reference".into()))
            }
            S4SXP => Err(RdxError::Unsupported("S4 object".into())),
            other => Err(RdxError::Format(format!(
                "unknown type tag {other}, perhaps written by a later protocol version"
            ))),
        }
    }

    // --- shared helpers ---

    /// Maps the Null singleton to `None` so absent attribute lists and tags
    /// keep a uniform in-memory shape.
    fn non_null(&self, id: SexpId) -> Option<SexpId> {
        if id == self.session.null() {
            None
        } else {
            Some(id)
        }
    }

    fn read_attributes(&mut self, flags: Flags) -> Result<Option<SexpId>> {
        if flags.has_attributes {
            let id = self.read_node()?;
            Ok(self.non_null(id))
        } else {
            Ok(None)
        }
    }

    fn read_tag(&mut self, flags: Flags) -> Result<Option<SexpId>> {
        if flags.has_tag {
            let id = self.read_node()?;
            Ok(self.non_null(id))
        } else {
            Ok(None)
        }
    }

    fn read_length(&mut self) -> Result<usize> {
        let length = self.wire.read_int()?;
        usize::try_from(length)
            .map_err(|_| RdxError::Format(format!("negative vector length {length}")))
    }

    fn register(&mut self, id: SexpId) -> SexpId {
        self.refs.add(id);
        trace!(
            index = self.refs.len(),
            kind = self.session.get(id).kind_name(),
            "registered shareable node"
        );
        id
    }

    // --- node kinds ---

    fn read_reference(&mut self, flags: Flags) -> Result<SexpId> {
        let packed = flags.packed_ref_index();
        let index = if packed == 0 {
            self.wire.read_int()?
        } else {
            packed
        };
        self.refs.get(index)
    }

    fn read_symbol(&mut self) -> Result<SexpId> {
        let name_id = self.read_node()?;
        let name = match self.session.get(name_id) {
            Sexp::Char(Some(name)) => name.clone(),
            Sexp::Char(None) => {
                return Err(RdxError::Format("symbol print name is NA".into()))
            }
            other => {
                return Err(RdxError::Format(format!(
                    "symbol print name must be a character node, found {}",
                    other.kind_name()
                )))
            }
        };
        let symbol = self.session.intern(&name);
        Ok(self.register(symbol))
    }

    fn read_namespace(&mut self) -> Result<SexpId> {
        let keys = self.read_string_keys()?;
        let name = keys
            .first()
            .ok_or_else(|| RdxError::Format("namespace record carries no name".into()))?;
        let namespace = self.session.find_namespace(name).ok_or_else(|| {
            RdxError::Config(format!("namespace '{name}' is not registered"))
        })?;
        Ok(self.register(namespace))
    }

    fn read_persistent(&mut self) -> Result<SexpId> {
        let restorer = self.restorer.ok_or_else(|| {
            RdxError::Config("stream contains a persistent value but no restorer is configured".into())
        })?;
        let keys = self.read_string_keys()?;
        let value = restorer.restore(self.session, &keys)?;
        Ok(self.register(value))
    }

    /// The 0-prefixed string-vector form used by namespace and persistent
    /// records: a zero names flag, a length, then bare character nodes.
    fn read_string_keys(&mut self) -> Result<Vec<String>> {
        if self.wire.read_int()? != 0 {
            return Err(RdxError::Format(
                "named persistent string vectors are not supported".into(),
            ));
        }
        let length = self.read_length()?;
        let mut keys = Vec::with_capacity(length);
        for _ in 0..length {
            let id = self.read_node()?;
            match self.session.get(id) {
                Sexp::Char(Some(key)) => keys.push(key.clone()),
                Sexp::Char(None) => {
                    return Err(RdxError::Format("persistent key is NA".into()))
                }
                other => {
                    return Err(RdxError::Format(format!(
                        "persistent key must be a character node, found {}",
                        other.kind_name()
                    )))
                }
            }
        }
        Ok(keys)
    }

    /// Environments register in the reference table *before* their parent
    /// and frame are read, so self- and mutually-referential environments
    /// resolve to the node under construction.
    fn read_environment(&mut self) -> Result<SexpId> {
        let locked = self.wire.read_int()? != 0;
        let empty = self.session.empty_env();
        let null = self.session.null();
        let id = self.session.alloc(Sexp::Environment(EnvData {
            locked,
            parent: empty,
            frame: null,
            attributes: None,
        }));
        self.register(id);

        let parent = self.read_node()?;
        let frame = self.read_node()?;
        // Legacy hash-table slot: present on the wire, never used.
        let _hashtab = self.read_node()?;
        let attributes_id = self.read_node()?;

        let parent = if parent == self.session.null() {
            self.session.empty_env()
        } else {
            parent
        };
        let attributes = self.non_null(attributes_id);
        if let Sexp::Environment(data) = self.session.get_mut(id) {
            data.parent = parent;
            data.frame = frame;
            data.attributes = attributes;
        }
        Ok(id)
    }

    /// Decodes a pairlist chain iteratively: the next cell's flags word is
    /// pre-read, and anything that is not another cell terminates the chain.
    fn read_pairlist(&mut self, first: Flags) -> Result<SexpId> {
        let mut cells: Vec<(Option<SexpId>, Option<SexpId>, SexpId)> = Vec::new();
        let mut flags = first;
        let tail = loop {
            let attributes = self.read_attributes(flags)?;
            let tag = self.read_tag(flags)?;
            let value = self.read_node()?;
            cells.push((attributes, tag, value));

            let next = Flags::unpack(self.wire.read_int()?);
            if next.ty == LISTSXP {
                flags = next;
            } else {
                break self.read_node_with(next)?;
            }
        };

        let mut next = tail;
        for (attributes, tag, value) in cells.into_iter().rev() {
            next = self.session.alloc(Sexp::Pair(PairCell {
                tag,
                value,
                next,
                attributes,
            }));
        }
        Ok(next)
    }

    fn read_call(&mut self, flags: Flags) -> Result<SexpId> {
        let attributes = self.read_attributes(flags)?;
        // Call cells may carry a tag on the wire; it has no in-memory slot.
        let _tag = self.read_tag(flags)?;
        let function = self.read_node()?;
        let arguments = self.read_node()?;
        Ok(self.session.alloc(Sexp::Call(CallData {
            function,
            arguments,
            attributes,
        })))
    }

    fn read_closure(&mut self, flags: Flags) -> Result<SexpId> {
        let attributes = self.read_attributes(flags)?;
        let environment = match self.read_tag(flags)? {
            Some(env) => env,
            None => self.session.global_env(),
        };
        let formals = self.read_node()?;
        let body = self.read_node()?;
        Ok(self.session.alloc(Sexp::Closure(ClosureData {
            environment,
            formals,
            body,
            attributes,
        })))
    }

    /// Unforced promises (value on the wire is the unbound-value sentinel)
    /// are reconstructed with their expression and environment intact;
    /// decoding never forces evaluation. A forced value of Null is still a
    /// forced value and stays one.
    fn read_promise(&mut self, flags: Flags) -> Result<SexpId> {
        let attributes = self.read_attributes(flags)?;
        let environment = self.read_tag(flags)?;
        let value_id = self.read_node()?;
        let expression = self.read_node()?;

        let value = if value_id == self.session.unbound_value() {
            None
        } else {
            Some(value_id)
        };
        Ok(self.session.alloc(Sexp::Promise(PromiseData {
            environment,
            value,
            expression,
            attributes,
        })))
    }

    fn read_char(&mut self, flags: Flags) -> Result<SexpId> {
        let length = self.wire.read_int()?;
        if length == -1 {
            return Ok(self.session.alloc(Sexp::Char(None)));
        }
        let length = usize::try_from(length)
            .map_err(|_| RdxError::Format(format!("negative character length {length}")))?;
        let bytes = self.wire.read_bytes(length)?;
        let value = if flags.is_utf8() {
            String::from_utf8(bytes)
                .map_err(|_| RdxError::Format("invalid UTF-8 in character data".into()))?
        } else if flags.is_latin1() {
            bytes.iter().map(|&b| b as char).collect()
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };
        Ok(self.session.alloc(Sexp::Char(Some(value))))
    }

    fn read_logicals(&mut self, flags: Flags) -> Result<SexpId> {
        let length = self.read_length()?;
        let mut values = Vec::with_capacity(length);
        for _ in 0..length {
            values.push(self.wire.read_int()?);
        }
        let attributes = self.read_attributes(flags)?;
        Ok(self
            .session
            .alloc(Sexp::Logicals(VectorData { values, attributes })))
    }

    fn read_ints(&mut self, flags: Flags) -> Result<SexpId> {
        let length = self.read_length()?;
        let mut values = Vec::with_capacity(length);
        for _ in 0..length {
            values.push(self.wire.read_int()?);
        }
        let attributes = self.read_attributes(flags)?;
        Ok(self
            .session
            .alloc(Sexp::Ints(VectorData { values, attributes })))
    }

    fn read_doubles(&mut self, flags: Flags) -> Result<SexpId> {
        let length = self.read_length()?;
        let mut values = Vec::with_capacity(length);
        for _ in 0..length {
            values.push(self.wire.read_double()?);
        }
        let attributes = self.read_attributes(flags)?;
        Ok(self
            .session
            .alloc(Sexp::Doubles(VectorData { values, attributes })))
    }

    fn read_complexes(&mut self, flags: Flags) -> Result<SexpId> {
        let length = self.read_length()?;
        let mut values = Vec::with_capacity(length);
        for _ in 0..length {
            let re = self.wire.read_double()?;
            let im = self.wire.read_double()?;
            values.push(Complex { re, im });
        }
        let attributes = self.read_attributes(flags)?;
        Ok(self
            .session
            .alloc(Sexp::Complexes(VectorData { values, attributes })))
    }

    fn read_strings(&mut self, flags: Flags) -> Result<SexpId> {
        let length = self.read_length()?;
        let mut values: Vec<RString> = Vec::with_capacity(length);
        for _ in 0..length {
            let id = self.read_node()?;
            match self.session.get(id) {
                Sexp::Char(value) => values.push(value.clone()),
                other => {
                    return Err(RdxError::Format(format!(
                        "string vector element must be a character node, found {}",
                        other.kind_name()
                    )))
                }
            }
        }
        let attributes = self.read_attributes(flags)?;
        Ok(self
            .session
            .alloc(Sexp::Strings(VectorData { values, attributes })))
    }

    fn read_raw(&mut self, flags: Flags) -> Result<SexpId> {
        let length = self.read_length()?;
        let values = self.wire.read_bytes(length)?;
        let attributes = self.read_attributes(flags)?;
        Ok(self
            .session
            .alloc(Sexp::Raw(VectorData { values, attributes })))
    }

    fn read_list(&mut self, flags: Flags) -> Result<SexpId> {
        let values = self.read_node_array()?;
        let attributes = self.read_attributes(flags)?;
        Ok(self
            .session
            .alloc(Sexp::List(VectorData { values, attributes })))
    }

    fn read_expressions(&mut self, flags: Flags) -> Result<SexpId> {
        let values = self.read_node_array()?;
        let attributes = self.read_attributes(flags)?;
        Ok(self
            .session
            .alloc(Sexp::Expressions(VectorData { values, attributes })))
    }

    fn read_node_array(&mut self) -> Result<Vec<SexpId>> {
        let length = self.read_length()?;
        let mut values = Vec::with_capacity(length);
        for _ in 0..length {
            values.push(self.read_node()?);
        }
        Ok(values)
    }
}

/// Sniffs the two- or seven-byte magic prefix and selects an encoding.
///
/// An unrecognized prefix is fatal; no further bytes are read.
fn negotiate<R: Read>(mut conn: R) -> Result<(AnyReader<R>, WireFormat)> {
    let mut prefix = [0u8; 2];
    conn.read_exact(&mut prefix)?;

    if prefix[1] == b'\n' {
        return match prefix[0] {
            b'X' => Ok((AnyReader::Xdr(XdrReader::new(conn)), WireFormat::Xdr)),
            b'A' => Ok((AnyReader::Ascii(AsciiReader::new(conn)), WireFormat::Ascii)),
            b'B' => Ok((AnyReader::Binary(BinaryReader::new(conn)), WireFormat::Binary)),
            other => Err(RdxError::Format(format!(
                "malformed header: {:#04x} {:#04x}",
                other, prefix[1]
            ))),
        };
    }

    let mut magic = [0u8; 7];
    magic[..2].copy_from_slice(&prefix);
    conn.read_exact(&mut magic[2..])?;

    if magic == XDR_MAGIC {
        Ok((AnyReader::Xdr(XdrReader::new(conn)), WireFormat::Xdr))
    } else if magic == ASCII_MAGIC {
        Ok((AnyReader::Ascii(AsciiReader::new(conn)), WireFormat::Ascii))
    } else if magic == BINARY_MAGIC {
        Ok((AnyReader::Binary(BinaryReader::new(conn)), WireFormat::Binary))
    } else {
        Err(RdxError::Format("could not read header".into()))
    }
}
