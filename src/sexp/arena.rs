use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use twox_hash::XxHash64;

use super::id::SexpId;

type FastMap<K, V> = HashMap<K, V, BuildHasherDefault<XxHash64>>;

/// A complex number element of a complex vector.
///
/// Equality in [`deep_eq`] is bit-exact on both parts so NA and ordinary
/// NaN payloads survive comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex {
    /// Real part.
    pub re: f64,
    /// Imaginary part.
    pub im: f64,
}

/// One element of a string vector: `None` is the NA string.
pub type RString = Option<String>;

/// One cell of a singly linked pairlist chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCell {
    /// Optional tag, by convention a symbol.
    pub tag: Option<SexpId>,
    /// The cell's value.
    pub value: SexpId,
    /// The next cell, or Null to terminate the chain.
    pub next: SexpId,
    /// Optional attribute pairlist.
    pub attributes: Option<SexpId>,
}

/// A call expression: a function position plus an argument pairlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallData {
    /// The expression in function position.
    pub function: SexpId,
    /// The argument pairlist (possibly Null).
    pub arguments: SexpId,
    /// Optional attribute pairlist.
    pub attributes: Option<SexpId>,
}

/// A closure: enclosing environment, formals pairlist and body expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureData {
    /// The enclosing environment.
    pub environment: SexpId,
    /// The formal argument pairlist.
    pub formals: SexpId,
    /// The body expression.
    pub body: SexpId,
    /// Optional attribute pairlist.
    pub attributes: Option<SexpId>,
}

/// A promise. The value is `None` while the promise is unforced.
///
/// Decoding never forces a promise: an unforced promise on the wire is
/// reconstructed with its expression and environment intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromiseData {
    /// The evaluation environment, retained only while unforced.
    pub environment: Option<SexpId>,
    /// The forced value, if any.
    pub value: Option<SexpId>,
    /// The unevaluated expression.
    pub expression: SexpId,
    /// Optional attribute pairlist.
    pub attributes: Option<SexpId>,
}

/// A non-singleton environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvData {
    /// The locking flag carried on the wire.
    pub locked: bool,
    /// The parent environment. May point back at this environment or at a
    /// descendant; cycles are expected.
    pub parent: SexpId,
    /// The variable frame, a pairlist of (symbol, value) cells.
    pub frame: SexpId,
    /// Optional attribute pairlist.
    pub attributes: Option<SexpId>,
}

/// The payload of a vector node: elements plus an optional attribute list.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorData<T> {
    /// The elements.
    pub values: Vec<T>,
    /// Optional attribute pairlist.
    pub attributes: Option<SexpId>,
}

impl<T> VectorData<T> {
    /// Creates vector data with no attributes.
    pub fn new(values: Vec<T>) -> Self {
        Self {
            values,
            attributes: None,
        }
    }
}

/// One node of the object graph. A closed set: the dispatcher has exactly
/// one encode and one decode arm per variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexp {
    /// The null value, also the pairlist terminator.
    Null,
    /// The unbound-value sentinel.
    UnboundValue,
    /// The missing-argument sentinel.
    MissingArg,
    /// The empty environment singleton.
    EmptyEnv,
    /// The global environment singleton.
    GlobalEnv,
    /// The base environment singleton.
    BaseEnv,
    /// The base namespace singleton.
    BaseNamespace,
    /// An interned symbol. Same name, same handle within a session.
    Symbol(String),
    /// A pairlist cell.
    Pair(PairCell),
    /// A call expression.
    Call(CallData),
    /// A closure.
    Closure(ClosureData),
    /// A promise.
    Promise(PromiseData),
    /// An environment.
    Environment(EnvData),
    /// A namespace, resolved by name against the session registry.
    Namespace(String),
    /// A single character string; `None` is the NA string.
    Char(RString),
    /// A logical vector; elements use the integer NA sentinel.
    Logicals(VectorData<i32>),
    /// An integer vector; elements use the integer NA sentinel.
    Ints(VectorData<i32>),
    /// A double vector; NA is the reserved bit pattern.
    Doubles(VectorData<f64>),
    /// A complex vector.
    Complexes(VectorData<Complex>),
    /// A string vector.
    Strings(VectorData<RString>),
    /// A raw byte vector.
    Raw(VectorData<u8>),
    /// A generic list vector.
    List(VectorData<SexpId>),
    /// An expression vector.
    Expressions(VectorData<SexpId>),
}

impl Sexp {
    /// A short human-readable name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::UnboundValue => "unbound-value",
            Self::MissingArg => "missing-arg",
            Self::EmptyEnv => "empty-environment",
            Self::GlobalEnv => "global-environment",
            Self::BaseEnv => "base-environment",
            Self::BaseNamespace => "base-namespace",
            Self::Symbol(_) => "symbol",
            Self::Pair(_) => "pairlist",
            Self::Call(_) => "call",
            Self::Closure(_) => "closure",
            Self::Promise(_) => "promise",
            Self::Environment(_) => "environment",
            Self::Namespace(_) => "namespace",
            Self::Char(_) => "char",
            Self::Logicals(_) => "logical-vector",
            Self::Ints(_) => "integer-vector",
            Self::Doubles(_) => "double-vector",
            Self::Complexes(_) => "complex-vector",
            Self::Strings(_) => "string-vector",
            Self::Raw(_) => "raw-vector",
            Self::List(_) => "list",
            Self::Expressions(_) => "expression-vector",
        }
    }

    /// The attribute pairlist, if this kind can carry one and does.
    pub fn attributes(&self) -> Option<SexpId> {
        match self {
            Self::Pair(p) => p.attributes,
            Self::Call(c) => c.attributes,
            Self::Closure(c) => c.attributes,
            Self::Promise(p) => p.attributes,
            Self::Environment(e) => e.attributes,
            Self::Logicals(v) => v.attributes,
            Self::Ints(v) => v.attributes,
            Self::Doubles(v) => v.attributes,
            Self::Complexes(v) => v.attributes,
            Self::Strings(v) => v.attributes,
            Self::Raw(v) => v.attributes,
            Self::List(v) => v.attributes,
            Self::Expressions(v) => v.attributes,
            _ => None,
        }
    }
}

// Well-known slots allocated by Session::new, in order.
const NULL_SLOT: u32 = 0;
const UNBOUND_SLOT: u32 = 1;
const MISSING_SLOT: u32 = 2;
const EMPTY_ENV_SLOT: u32 = 3;
const GLOBAL_ENV_SLOT: u32 = 4;
const BASE_ENV_SLOT: u32 = 5;
const BASE_NAMESPACE_SLOT: u32 = 6;

/// Owns one object-graph arena plus the identity tables the serializer
/// consults: interned symbols, registered namespaces and the process-wide
/// singletons.
///
/// Acts as an arena allocator: nodes are addressed by stable [`SexpId`]
/// handles, so cyclic environment structure never requires owning
/// references. Independent sessions share no identity; parallel callers
/// should each own one.
#[derive(Debug, Default)]
pub struct Session {
    nodes: Vec<Sexp>,
    symbols: FastMap<String, SexpId>,
    namespaces: FastMap<String, SexpId>,
}

impl Session {
    /// Creates a session with the singleton identities pre-allocated.
    pub fn new() -> Self {
        let mut session = Self {
            nodes: Vec::with_capacity(64),
            symbols: FastMap::default(),
            namespaces: FastMap::default(),
        };
        session.nodes.push(Sexp::Null);
        session.nodes.push(Sexp::UnboundValue);
        session.nodes.push(Sexp::MissingArg);
        session.nodes.push(Sexp::EmptyEnv);
        session.nodes.push(Sexp::GlobalEnv);
        session.nodes.push(Sexp::BaseEnv);
        session.nodes.push(Sexp::BaseNamespace);
        session
    }

    /// The null singleton.
    pub fn null(&self) -> SexpId {
        SexpId::new(NULL_SLOT)
    }

    /// The unbound-value sentinel.
    pub fn unbound_value(&self) -> SexpId {
        SexpId::new(UNBOUND_SLOT)
    }

    /// The missing-argument sentinel.
    pub fn missing_arg(&self) -> SexpId {
        SexpId::new(MISSING_SLOT)
    }

    /// The empty environment singleton.
    pub fn empty_env(&self) -> SexpId {
        SexpId::new(EMPTY_ENV_SLOT)
    }

    /// The global environment singleton.
    pub fn global_env(&self) -> SexpId {
        SexpId::new(GLOBAL_ENV_SLOT)
    }

    /// The base environment singleton.
    pub fn base_env(&self) -> SexpId {
        SexpId::new(BASE_ENV_SLOT)
    }

    /// The base namespace singleton.
    pub fn base_namespace(&self) -> SexpId {
        SexpId::new(BASE_NAMESPACE_SLOT)
    }

    /// Adds a node to the arena and returns its handle.
    pub fn alloc(&mut self, node: Sexp) -> SexpId {
        let id = SexpId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    /// Retrieves a node by handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle belongs to a different session. Handles are only
    /// minted by this session, so an out-of-bounds id is an invariant
    /// violation, not a recoverable state.
    pub fn get(&self, id: SexpId) -> &Sexp {
        self.nodes
            .get(id.as_u32() as usize)
            .expect("Session invariant violated: node id out of bounds")
    }

    /// Retrieves a node mutably. Same invariants as [`Session::get`].
    pub fn get_mut(&mut self, id: SexpId) -> &mut Sexp {
        self.nodes
            .get_mut(id.as_u32() as usize)
            .expect("Session invariant violated: node id out of bounds")
    }

    /// Returns the number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the arena holds only the singletons.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= BASE_NAMESPACE_SLOT as usize + 1
    }

    /// Interns a symbol: the same name always yields the same handle within
    /// this session.
    pub fn intern(&mut self, name: &str) -> SexpId {
        if let Some(&id) = self.symbols.get(name) {
            return id;
        }
        let id = self.alloc(Sexp::Symbol(name.to_string()));
        self.symbols.insert(name.to_string(), id);
        id
    }

    /// Registers a namespace identity under `name`, creating it on first
    /// use. Decoding a namespace node resolves against this registry.
    pub fn register_namespace(&mut self, name: &str) -> SexpId {
        if let Some(&id) = self.namespaces.get(name) {
            return id;
        }
        let id = self.alloc(Sexp::Namespace(name.to_string()));
        self.namespaces.insert(name.to_string(), id);
        id
    }

    /// Looks up a registered namespace by name.
    pub fn find_namespace(&self, name: &str) -> Option<SexpId> {
        self.namespaces.get(name).copied()
    }

    /// Convenience constructor for a pairlist cell with no attributes.
    pub fn pair(&mut self, tag: Option<SexpId>, value: SexpId, next: SexpId) -> SexpId {
        self.alloc(Sexp::Pair(PairCell {
            tag,
            value,
            next,
            attributes: None,
        }))
    }

    /// Builds a pairlist from (name, value) entries, tagging each cell with
    /// the interned name symbol.
    pub fn named_pairlist<I, S>(&mut self, entries: I) -> SexpId
    where
        I: IntoIterator<Item = (S, SexpId)>,
        S: AsRef<str>,
    {
        let entries: Vec<(SexpId, SexpId)> = entries
            .into_iter()
            .map(|(name, value)| (self.intern(name.as_ref()), value))
            .collect();
        let mut next = self.null();
        for (tag, value) in entries.into_iter().rev() {
            next = self.pair(Some(tag), value, next);
        }
        next
    }
}

/// Deep structural equality between two graphs, possibly in different
/// sessions.
///
/// Doubles (and complex parts) compare bit-for-bit, so the NA pattern, NaN
/// and the infinities all stay distinct. Cycles terminate through a visited
/// set; two nodes on an already-visited pair compare equal, which matches
/// the co-inductive reading of equality on cyclic environments.
pub fn deep_eq(ctx_a: &Session, a: SexpId, ctx_b: &Session, b: SexpId) -> bool {
    let mut visited: std::collections::HashSet<(u32, u32)> = std::collections::HashSet::new();
    let mut work: Vec<(SexpId, SexpId)> = vec![(a, b)];

    while let Some((a, b)) = work.pop() {
        if !visited.insert((a.as_u32(), b.as_u32())) {
            continue;
        }
        let (na, nb) = (ctx_a.get(a), ctx_b.get(b));
        let fields_match = match (na, nb) {
            (Sexp::Null, Sexp::Null)
            | (Sexp::UnboundValue, Sexp::UnboundValue)
            | (Sexp::MissingArg, Sexp::MissingArg)
            | (Sexp::EmptyEnv, Sexp::EmptyEnv)
            | (Sexp::GlobalEnv, Sexp::GlobalEnv)
            | (Sexp::BaseEnv, Sexp::BaseEnv)
            | (Sexp::BaseNamespace, Sexp::BaseNamespace) => true,
            (Sexp::Symbol(x), Sexp::Symbol(y)) => x == y,
            (Sexp::Namespace(x), Sexp::Namespace(y)) => x == y,
            (Sexp::Char(x), Sexp::Char(y)) => x == y,
            (Sexp::Logicals(x), Sexp::Logicals(y)) => {
                vector_eq(x, y, &mut work, |a, b| a == b)
            }
            (Sexp::Ints(x), Sexp::Ints(y)) => vector_eq(x, y, &mut work, |a, b| a == b),
            (Sexp::Doubles(x), Sexp::Doubles(y)) => {
                vector_eq(x, y, &mut work, |a, b| a.to_bits() == b.to_bits())
            }
            (Sexp::Complexes(x), Sexp::Complexes(y)) => vector_eq(x, y, &mut work, |a, b| {
                a.re.to_bits() == b.re.to_bits() && a.im.to_bits() == b.im.to_bits()
            }),
            (Sexp::Strings(x), Sexp::Strings(y)) => vector_eq(x, y, &mut work, |a, b| a == b),
            (Sexp::Raw(x), Sexp::Raw(y)) => vector_eq(x, y, &mut work, |a, b| a == b),
            (Sexp::List(x), Sexp::List(y)) | (Sexp::Expressions(x), Sexp::Expressions(y)) => {
                if x.values.len() != y.values.len() {
                    false
                } else {
                    work.extend(x.values.iter().copied().zip(y.values.iter().copied()));
                    vector_eq(x, y, &mut work, |_, _| true)
                }
            }
            (Sexp::Pair(x), Sexp::Pair(y)) => {
                push_opt(&mut work, x.tag, y.tag)
                    && push_opt(&mut work, x.attributes, y.attributes)
                    && {
                        work.push((x.value, y.value));
                        work.push((x.next, y.next));
                        true
                    }
            }
            (Sexp::Call(x), Sexp::Call(y)) => {
                push_opt(&mut work, x.attributes, y.attributes) && {
                    work.push((x.function, y.function));
                    work.push((x.arguments, y.arguments));
                    true
                }
            }
            (Sexp::Closure(x), Sexp::Closure(y)) => {
                push_opt(&mut work, x.attributes, y.attributes) && {
                    work.push((x.environment, y.environment));
                    work.push((x.formals, y.formals));
                    work.push((x.body, y.body));
                    true
                }
            }
            (Sexp::Promise(x), Sexp::Promise(y)) => {
                push_opt(&mut work, x.environment, y.environment)
                    && push_opt(&mut work, x.value, y.value)
                    && push_opt(&mut work, x.attributes, y.attributes)
                    && {
                        work.push((x.expression, y.expression));
                        true
                    }
            }
            (Sexp::Environment(x), Sexp::Environment(y)) => {
                x.locked == y.locked && push_opt(&mut work, x.attributes, y.attributes) && {
                    work.push((x.parent, y.parent));
                    work.push((x.frame, y.frame));
                    true
                }
            }
            _ => false,
        };
        if !fields_match {
            return false;
        }
    }
    true
}

fn vector_eq<T, F>(
    x: &VectorData<T>,
    y: &VectorData<T>,
    work: &mut Vec<(SexpId, SexpId)>,
    eq: F,
) -> bool
where
    F: Fn(&T, &T) -> bool,
{
    x.values.len() == y.values.len()
        && x.values.iter().zip(y.values.iter()).all(|(a, b)| eq(a, b))
        && push_opt(work, x.attributes, y.attributes)
}

fn push_opt(work: &mut Vec<(SexpId, SexpId)>, a: Option<SexpId>, b: Option<SexpId>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            work.push((a, b));
            true
        }
        _ => false,
    }
}
