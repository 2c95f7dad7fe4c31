//! Property keys for object member access.
//!
//! A property key is a name (interned string), an array index, or a symbol.
//! Equality is identity for names and symbols and by value for indices. Each
//! key kind carries a cheap pre-existing hash the cache layers read directly:
//! names use the hash cached in the string header, indices hash as their own
//! value, symbols as their id.

use crate::intern::{InternedStr, Symbol};
use std::fmt;

/// A tagged property key.
///
/// The `Hole` variant is the empty-cache-slot filler; it is never produced
/// by key conversion and matches nothing during dispatch (cache slot
/// occupancy is tracked by the hidden-class field, not the key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// A named property (`obj.prop`), interned.
    Name(InternedStr),
    /// An array index (`obj[7]`).
    Index(u32),
    /// A symbol-keyed property.
    Sym(Symbol),
    /// Empty-slot filler; matches nothing meaningful.
    Hole,
}

impl PropertyKey {
    /// The empty-slot filler.
    #[inline]
    #[must_use]
    pub const fn hole() -> Self {
        Self::Hole
    }

    /// Check for the empty-slot filler.
    #[inline]
    #[must_use]
    pub const fn is_hole(&self) -> bool {
        matches!(self, Self::Hole)
    }

    /// Check for an array-index key.
    #[inline]
    #[must_use]
    pub const fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// Extract the array index, if this is one.
    #[inline]
    #[must_use]
    pub const fn as_index(&self) -> Option<u32> {
        match self {
            Self::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract the name, if this is a named key.
    #[inline]
    #[must_use]
    pub fn as_name(&self) -> Option<&InternedStr> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// The cheap pre-existing hash for this key.
    ///
    /// Names read the hash cached in the string header (no recomputation);
    /// indices hash as their value; symbols as their id, spread so that
    /// symbol ids and small indices do not collide trivially.
    #[inline]
    #[must_use]
    pub fn cached_hash(&self) -> u32 {
        match self {
            Self::Name(n) => n.header_hash(),
            Self::Index(i) => *i,
            Self::Sym(s) => s.id().rotate_left(16) | 1,
            Self::Hole => 0,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => f.write_str(n.as_str()),
            Self::Index(i) => write!(f, "{i}"),
            Self::Sym(s) => match s.description() {
                Some(d) => write!(f, "Symbol({d})"),
                None => write!(f, "Symbol()"),
            },
            Self::Hole => f.write_str("<hole>"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
