//! Access handlers: compact descriptors of how to perform a property access.
//!
//! A handler is produced once by the generic lookup and memoized by the
//! cache layers. Applying a handler skips the entire lookup: a field handler
//! is a slot read/write, an element handler selects the typed element
//! routine, an accessor handler invokes the recorded pair.
//!
//! `NotFound` is a first-class handler, not an absence: it round-trips
//! through the same channel as real handlers, which is how the megamorphic
//! cache reports both "never inserted" and "evicted" without a second
//! return path. It also memoizes negative lookups.

use crate::object::elements::ElementsKind;
use crate::object::shape::Representation;
use vesper_core::Value;

/// How to perform a specific property access.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Handler {
    /// Data field in an inline slot.
    Field {
        /// Slot offset in the object's named-property storage.
        offset: u16,
        /// Declared representation, checked on stores.
        representation: Representation,
    },
    /// Accessor pair; the values are callable objects (or `undefined`).
    Accessor {
        /// Getter function value.
        getter: Value,
        /// Setter function value.
        setter: Value,
    },
    /// Indexed access via the element routine for this kind.
    Element(ElementsKind),
    /// The property does not exist (memoized negative result), and the
    /// distinguished miss sentinel returned by cache probes.
    NotFound,
}

impl Handler {
    /// The miss/negative sentinel.
    pub const NOT_FOUND: Self = Self::NotFound;

    /// Check for the sentinel.
    #[inline]
    pub const fn is_not_found(self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Check for a data-field handler.
    #[inline]
    pub const fn is_field(self) -> bool {
        matches!(self, Self::Field { .. })
    }

    /// Check for an accessor handler.
    #[inline]
    pub const fn is_accessor(self) -> bool {
        matches!(self, Self::Accessor { .. })
    }
}

// =============================================================================
// Tests
// =============================================================================
