//! Execution context and property-access dispatch for the Vesper engine.
//!
//! The [`EngineContext`] owns everything one executing thread needs: the
//! object heap, the class registry, the interner, the realm anchors, the
//! per-site feedback vector, and — central to this crate — the pair of
//! megamorphic caches (one for loads, one for stores).
//!
//! [`access`] is the decision procedure run at every property access:
//!
//! ```text
//! per-site probe (mono/poly) → megamorphic cache → generic lookup
//! ```
//!
//! Misses fall through silently; generic lookup is the correctness
//! backstop, and cacheable outcomes populate the level that missed.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

pub mod access;
pub mod context;

pub use access::{get_keyed, get_property, set_keyed, set_property};
pub use context::EngineContext;
