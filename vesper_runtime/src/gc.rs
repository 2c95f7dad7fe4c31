//! Garbage-collection root visiting for runtime and cache state.
//!
//! The engine's collector model is stop-the-world for root scans: the
//! mutator is paused while `trace` runs, so tracing sees a consistent
//! snapshot and cache `get`/`set` never race a scan.
//!
//! The inline caches matter here because they hold hidden-class references,
//! property keys, and handler values outside any object graph. A cache entry
//! whose class was collected and whose address was recycled would alias a
//! different class and hand out a wrong handler — so occupied cache slots
//! hold strong class references (the entry pins its class), and `trace`
//! reports every occupied slot to the collector.
//!
//! # Safety
//!
//! Implementations are `unsafe impl` because an incorrect one breaks the
//! collector: a `trace` must visit every reference the value holds, exactly
//! once, without touching freed memory.

use crate::handler::Handler;
use crate::object::elements::ElementStore;
use crate::object::shape::HiddenClassRef;
use crate::object::JsObject;
use vesper_core::{PropertyKey, Value};

/// Receives the references a traced value holds.
pub trait Tracer {
    /// Visit a tagged value (only heap-referencing tags matter).
    fn trace_value(&mut self, value: Value);

    /// Visit a hidden-class reference.
    fn trace_class(&mut self, class: &HiddenClassRef);

    /// Visit a property key (names and symbols hold heap data).
    fn trace_key(&mut self, key: &PropertyKey);
}

/// A value the collector can traverse.
///
/// # Safety
///
/// `trace` must visit all references the value holds, must not visit the
/// same reference twice in one call, and must not access freed memory.
pub unsafe trait Trace {
    /// Report every held reference to `tracer`.
    fn trace(&self, tracer: &mut dyn Tracer);
}

/// Safety: visits the class, every named slot, and every element.
unsafe impl Trace for JsObject {
    fn trace(&self, tracer: &mut dyn Tracer) {
        tracer.trace_class(self.class());
        for i in 0..self.class().inline_count() {
            tracer.trace_value(self.slot(i));
        }
        self.elements().trace(tracer);
    }
}

/// Safety: packed and dictionary stores hold tagged values; typed stores are
/// raw bytes with no references.
unsafe impl Trace for ElementStore {
    fn trace(&self, tracer: &mut dyn Tracer) {
        match self {
            Self::Packed(values) => {
                for value in values {
                    tracer.trace_value(*value);
                }
            }
            Self::Dictionary(map) => {
                for value in map.values() {
                    tracer.trace_value(*value);
                }
            }
            Self::Empty | Self::Typed { .. } => {}
        }
    }
}

/// Safety: a handler holds references only in its accessor pair.
unsafe impl Trace for Handler {
    fn trace(&self, tracer: &mut dyn Tracer) {
        if let Handler::Accessor { getter, setter } = self {
            tracer.trace_value(*getter);
            tracer.trace_value(*setter);
        }
    }
}

/// A tracer that records visit counts; used by diagnostics and tests.
#[derive(Debug, Default)]
pub struct CountingTracer {
    /// Values visited.
    pub values: usize,
    /// Classes visited.
    pub classes: usize,
    /// Keys visited.
    pub keys: usize,
}

impl Tracer for CountingTracer {
    fn trace_value(&mut self, _value: Value) {
        self.values += 1;
    }

    fn trace_class(&mut self, _class: &HiddenClassRef) {
        self.classes += 1;
    }

    fn trace_key(&mut self, _key: &PropertyKey) {
        self.keys += 1;
    }
}

// =============================================================================
// Tests
// =============================================================================
