//! Inline-cache tier for the Vesper engine.
//!
//! A property-access site progresses through states as it observes shape
//! diversity:
//!
//! ```text
//! Uninitialized → Monomorphic → Polymorphic → Megamorphic
//!                     ↑              ↑              ↑
//!                 1 class       2-4 classes     5+ classes
//! ```
//!
//! Monomorphic and polymorphic sites track classes in their own feedback
//! slot. Megamorphic sites give up per-site tracking and consult the shared
//! [`ic::MegaIcCache`], a fixed-size direct-mapped table keyed by
//! (hidden class, property key). Every miss at every level falls through to
//! the generic lookup, which is the correctness backstop.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

pub mod ic;

pub use ic::feedback::{ClassMarker, FeedbackSlot, FeedbackSlotId, FeedbackVector, ObservedType};
pub use ic::invalidation::{CacheEpoch, InvalidationLog, InvalidationReason};
pub use ic::mega::{MegaCacheStats, MegaIcCache, PropertyKeyEntry, CACHE_LENGTH};
pub use ic::IcState;
