//! Object model for the Vesper engine.
//!
//! This crate provides everything the inline-cache tier keys on:
//!
//! - **Hidden classes**: immutable shape nodes describing property layout,
//!   shared by objects built the same way, forming a transition tree
//! - **Element kinds**: the closed set of indexed-storage layouts, including
//!   the typed-array kinds
//! - **Heap**: context-owned object storage with stable handles
//! - **Handlers**: compact descriptors of how to perform a property access,
//!   produced by the slow path and memoized by the caches
//! - **Slow path**: the generic property lookup the caches fall back to
//! - **GC seam**: the root-visitor traits the caches implement

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

pub mod gc;
pub mod handler;
pub mod lookup;
pub mod object;

pub use gc::{Trace, Tracer};
pub use handler::Handler;
pub use lookup::{generic_get, generic_set, LookupOutcome, StoreOutcome};
pub use object::elements::{ElementStore, ElementsKind};
pub use object::shape::{
    ClassFlags, ClassId, ClassRegistry, HiddenClass, HiddenClassRef, PropertyDescriptor,
    PropertyFlags, PropertyKind, Representation,
};
pub use object::{Heap, JsObject, NativeFn, ObjectId};
