//! The generic property lookup: the slow path every cache level falls back
//! to, and the only producer of [`Handler`]s.
//!
//! Besides performing the access, each outcome carries a **cacheable**
//! verdict. The dispatch layer must never memoize an outcome that reports
//! `cacheable: false`; the conditions that suppress caching are computed
//! here (exotic receivers, dictionary elements, layout-changing stores,
//! prototype-chain hits) and are deliberately open for extension.

use crate::handler::Handler;
use crate::object::elements::{ElementStore, ElementsKind};
use crate::object::shape::{ClassRegistry, PropertyKind, Representation};
use crate::object::{Heap, ObjectId};
use rustc_hash::FxHashMap;
use vesper_core::{EngineError, EngineResult, PropertyKey, Value};

/// Result of a generic load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupOutcome {
    /// The value read.
    pub value: Value,
    /// The handler describing how the read was satisfied.
    pub handler: Handler,
    /// Whether the caches may memoize `handler` for the receiver's class.
    pub cacheable: bool,
}

/// Result of a generic store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreOutcome {
    /// The handler describing how the write was satisfied.
    pub handler: Handler,
    /// Whether the caches may memoize `handler` for the receiver's class.
    pub cacheable: bool,
}

/// Generic load: `receiver[key]` / `receiver.key`, full resolution.
///
/// Walks the receiver's own layout, then its prototype chain. Accessor
/// getters run here (and may fail); absent properties read as `undefined`
/// and produce a cacheable negative handler.
pub fn generic_get(
    heap: &mut Heap,
    receiver: ObjectId,
    key: &PropertyKey,
) -> EngineResult<LookupOutcome> {
    let class = heap.get(receiver).class().clone();
    let exotic = class.is_exotic();

    // Indexed path first: dispatch on the class's elements kind tag.
    // Objects without indexed storage treat integer keys as ordinary
    // property keys instead.
    let kind = class.elements_kind();
    if let Some(index) = key.as_index().filter(|_| kind != ElementsKind::None) {
        if let Some(value) = heap.get(receiver).elements().load(index) {
            return Ok(LookupOutcome {
                value,
                handler: Handler::Element(kind),
                cacheable: kind.is_cacheable() && !exotic,
            });
        }
        // Out-of-range reads are `undefined` but not negative-cacheable:
        // element population changes without a class transition.
        return Ok(LookupOutcome {
            value: Value::undefined(),
            handler: Handler::NotFound,
            cacheable: false,
        });
    }

    // Own named/symbol property.
    if let Some(descriptor) = class.lookup(key) {
        let outcome = match &descriptor.kind {
            PropertyKind::Data { representation } => LookupOutcome {
                value: heap.get(receiver).slot(descriptor.slot_index),
                handler: Handler::Field {
                    offset: descriptor.slot_index,
                    representation: *representation,
                },
                cacheable: !exotic,
            },
            PropertyKind::Accessor { getter, setter } => {
                let (getter, setter) = (*getter, *setter);
                let value = heap.call_getter(&descriptor.kind, receiver.to_value())?;
                LookupOutcome {
                    value,
                    handler: Handler::Accessor { getter, setter },
                    cacheable: !exotic,
                }
            }
        };
        return Ok(outcome);
    }

    // Prototype chain. Hits are correct but uncacheable against the
    // receiver's class: the memoized offset would alias the receiver's own
    // slots, not the holder's.
    let mut proto = class.prototype();
    while let Some(holder_raw) = proto {
        let holder = ObjectId(holder_raw);
        let holder_class = heap.get(holder).class().clone();
        if let Some(descriptor) = holder_class.lookup(key) {
            let value = match &descriptor.kind {
                PropertyKind::Data { .. } => heap.get(holder).slot(descriptor.slot_index),
                PropertyKind::Accessor { .. } => {
                    heap.call_getter(&descriptor.kind, receiver.to_value())?
                }
            };
            return Ok(LookupOutcome {
                value,
                handler: Handler::NotFound,
                cacheable: false,
            });
        }
        proto = holder_class.prototype();
    }

    // Absent everywhere: `undefined`, with a memoizable negative handler.
    Ok(LookupOutcome {
        value: Value::undefined(),
        handler: Handler::NotFound,
        cacheable: !exotic,
    })
}

/// Generic store: `receiver[key] = value` / `receiver.key = value`.
///
/// Shared-object fields enforce their declared representation: a
/// non-matching store raises TypeError and is never silently coerced.
/// Property additions transition the receiver's class and are uncacheable
/// (the produced layout differs from the probed one).
pub fn generic_set(
    heap: &mut Heap,
    registry: &ClassRegistry,
    receiver: ObjectId,
    key: &PropertyKey,
    value: Value,
) -> EngineResult<StoreOutcome> {
    let class = heap.get(receiver).class().clone();
    let exotic = class.is_exotic();

    // Indexed path; same kind-tag gate as loads.
    let kind = class.elements_kind();
    if let Some(index) = key.as_index().filter(|_| kind != ElementsKind::None) {
        if kind.is_typed() && !value.is_number() {
            // Typed stores require numeric values; the full ToNumber ladder
            // lives with the interpreter, not here.
            return Err(EngineError::type_error(
                "cannot store non-numeric value in typed elements",
            ));
        }
        let stored = heap.get_mut(receiver).elements_mut().store(index, value);
        if stored {
            return Ok(StoreOutcome {
                handler: Handler::Element(kind),
                cacheable: kind.is_cacheable() && !exotic,
            });
        }
        if kind.is_typed() {
            // Out-of-range typed stores are dropped, matching typed-array
            // semantics. Nothing worth memoizing.
            return Ok(StoreOutcome {
                handler: Handler::NotFound,
                cacheable: false,
            });
        }
        // Contiguous store past the end: spill to sparse storage. The
        // elements-kind transition proper belongs to the layout machinery;
        // the store itself still succeeds, but is never memoized.
        let object = heap.get_mut(receiver);
        if let ElementStore::Packed(values) = object.elements() {
            let mut map: FxHashMap<u32, Value> = values
                .iter()
                .enumerate()
                .map(|(i, v)| (u32::try_from(i).unwrap_or(u32::MAX), *v))
                .collect();
            map.insert(index, value);
            *object.elements_mut() = ElementStore::Dictionary(map);
            return Ok(StoreOutcome {
                handler: Handler::NotFound,
                cacheable: false,
            });
        }
        return Err(EngineError::range_error(format!(
            "index {index} out of bounds for element store"
        )));
    }

    // Existing own property.
    if let Some(descriptor) = class.lookup(key).cloned() {
        match &descriptor.kind {
            PropertyKind::Data { representation } => {
                if !descriptor.is_writable() {
                    return Err(EngineError::type_error(format!(
                        "cannot assign to read-only property '{key}'"
                    )));
                }
                if !representation.admits(value) {
                    if class.is_shared() {
                        // Statically-typed shared field: reject, never
                        // coerce.
                        return Err(EngineError::type_error(format!(
                            "cannot store {value:?} in typed field '{key}'"
                        )));
                    }
                    // Plain object with a narrowed field: store succeeds
                    // (the layout generalization itself is the transition
                    // machinery's business) but must not be memoized.
                    heap.get_mut(receiver).set_slot(descriptor.slot_index, value);
                    return Ok(StoreOutcome {
                        handler: Handler::Field {
                            offset: descriptor.slot_index,
                            representation: Representation::Any,
                        },
                        cacheable: false,
                    });
                }
                heap.get_mut(receiver).set_slot(descriptor.slot_index, value);
                Ok(StoreOutcome {
                    handler: Handler::Field {
                        offset: descriptor.slot_index,
                        representation: *representation,
                    },
                    cacheable: !exotic,
                })
            }
            PropertyKind::Accessor { getter, setter } => {
                let (getter, setter) = (*getter, *setter);
                if setter.is_undefined() {
                    return Err(EngineError::type_error(format!(
                        "cannot set property '{key}' which has only a getter"
                    )));
                }
                heap.call(setter, receiver.to_value(), &[value])?;
                Ok(StoreOutcome {
                    handler: Handler::Accessor { getter, setter },
                    cacheable: !exotic,
                })
            }
        }
    } else {
        // Property addition.
        if class.is_shared() {
            return Err(EngineError::type_error(
                "cannot add properties to a shared object",
            ));
        }
        let child = registry.transition(
            &class,
            key.clone(),
            crate::object::shape::PropertyFlags::default(),
            Representation::Any,
        );
        let offset = child
            .lookup(key)
            .map(|d| d.slot_index)
            .ok_or_else(|| EngineError::InternalError {
                message: "transition lost its own descriptor".into(),
            })?;
        let object = heap.get_mut(receiver);
        object.transition(child);
        object.set_slot(offset, value);
        // The handler targets the post-transition layout; probes against
        // the pre-transition class must not see it.
        Ok(StoreOutcome {
            handler: Handler::Field {
                offset,
                representation: Representation::Any,
            },
            cacheable: false,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
