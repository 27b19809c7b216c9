//! Pure encode/decode of the per-node control word.
//!
//! Every node on the wire starts with one 32-bit flags word:
//!
//! ```text
//! bits  0..8   type tag
//! bit   8      is-object (the node carries a class attribute)
//! bit   9      has-attributes
//! bit   10     has-tag
//! bits  12..   levels (charset bits for character nodes)
//! ```
//!
//! Reference nodes reuse the bits above the type tag to pack a non-zero
//! 1-based table index; a packed value of zero means a full integer index
//! follows the flags word.

use crate::format::REFSXP;

const IS_OBJECT_BIT: i32 = 1 << 8;
const HAS_ATTR_BIT: i32 = 1 << 9;
const HAS_TAG_BIT: i32 = 1 << 10;

/// Charset level bit: payload bytes are Latin-1.
pub const LATIN1_LEVEL: i32 = 1 << 2;
/// Charset level bit: payload bytes are UTF-8.
pub const UTF8_LEVEL: i32 = 1 << 3;

/// Largest reference index that fits inline in a flags word.
pub const MAX_PACKED_INDEX: i32 = i32::MAX >> 8;

/// The unpacked form of one control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    /// The raw word as read from the wire.
    pub word: i32,
    /// The node's type tag (low byte of the word).
    pub ty: i32,
    /// The raw levels bits (word shifted right by 12).
    pub levels: i32,
    /// True if the node carries a class attribute.
    pub is_object: bool,
    /// True if an attribute pairlist follows the type-specific prefix.
    pub has_attributes: bool,
    /// True if a tag node is present (pairlist tag, closure environment,
    /// promise environment).
    pub has_tag: bool,
}

impl Flags {
    /// Decodes a raw flags word.
    pub fn unpack(word: i32) -> Self {
        Self {
            word,
            ty: word & 0xFF,
            levels: ((word as u32) >> 12) as i32,
            is_object: word & IS_OBJECT_BIT != 0,
            has_attributes: word & HAS_ATTR_BIT != 0,
            has_tag: word & HAS_TAG_BIT != 0,
        }
    }

    /// Encodes a flags word for a regular node.
    pub fn pack(ty: i32, levels: i32, is_object: bool, has_attributes: bool, has_tag: bool) -> i32 {
        let mut word = ty | (levels << 12);
        if is_object {
            word |= IS_OBJECT_BIT;
        }
        if has_attributes {
            word |= HAS_ATTR_BIT;
        }
        if has_tag {
            word |= HAS_TAG_BIT;
        }
        word
    }

    /// Encodes a reference node's flags word with an inline index.
    ///
    /// Callers must check [`MAX_PACKED_INDEX`] first; larger indices are
    /// written as a bare `REFSXP` word followed by a full integer.
    pub fn pack_ref(index: i32) -> i32 {
        REFSXP | (index << 8)
    }

    /// For reference nodes: the inline 1-based index, or zero meaning a full
    /// integer index follows the flags word.
    pub fn unpack_ref_index(word: i32) -> i32 {
        ((word as u32) >> 8) as i32
    }

    /// The inline reference index of this word (see [`Flags::unpack_ref_index`]).
    pub fn packed_ref_index(&self) -> i32 {
        Self::unpack_ref_index(self.word)
    }

    /// True if the levels bits declare a UTF-8 payload.
    pub fn is_utf8(&self) -> bool {
        self.levels & UTF8_LEVEL != 0
    }

    /// True if the levels bits declare a Latin-1 payload.
    pub fn is_latin1(&self) -> bool {
        self.levels & LATIN1_LEVEL != 0
    }
}
