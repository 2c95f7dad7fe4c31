//! Property-access dispatch: the decision procedure at every access site.
//!
//! Order of consultation, each level falling through silently on a miss:
//!
//! 1. the site's own feedback slot (monomorphic compare / polymorphic scan)
//! 2. the shared megamorphic cache, once the site has gone megamorphic
//! 3. the generic lookup — the correctness backstop
//!
//! Cacheable generic outcomes populate the level that missed; the
//! megamorphic caches are written here and only here, lazily. Cache probes
//! internally signal "could not resolve" with the hole sentinel — a value
//! distinguishable from every script value including `undefined` — so a
//! cached negative result (`undefined`) never reads as a miss.
//!
//! Primitive numeric receivers ride the same fast paths via the Number
//! sentinel, resolving against the realm's number prototype without boxing.
//! Keyed access (`obj[k]`) adds a head branch: receivers whose class tag
//! names a contiguous, typed-array, or string-indexed layout take the
//! element routine for that tag directly.

use crate::context::EngineContext;
use vesper_core::{EngineError, EngineResult, PropertyKey, Value};
use vesper_jit::ic::feedback::{ClassMarker, FeedbackSlotId, ObservedType};
use vesper_jit::ic::IcState;
use vesper_runtime::handler::Handler;
use vesper_runtime::lookup::{generic_get, generic_set};
use vesper_runtime::object::elements::ElementsKind;
use vesper_runtime::object::ObjectId;

// =============================================================================
// Receiver Resolution
// =============================================================================

/// Map a receiver to its probe marker and slow-path holder object.
///
/// Objects probe with their hidden class; primitive numbers probe with the
/// Number sentinel and resolve against the realm's number prototype. Other
/// primitives take no IC path here.
fn resolve_receiver(ctx: &EngineContext, receiver: Value) -> Option<(ClassMarker, ObjectId)> {
    if let Some(raw) = receiver.as_object() {
        let id = ObjectId(raw);
        Some((ClassMarker::Class(ctx.heap.get(id).class().id()), id))
    } else if receiver.is_number() {
        Some((ClassMarker::Number, ctx.realm().number_prototype))
    } else {
        None
    }
}

// =============================================================================
// Loads
// =============================================================================

/// `receiver.key` — named property load through the cache hierarchy.
pub fn get_property(
    ctx: &mut EngineContext,
    site: FeedbackSlotId,
    receiver: Value,
    key: &PropertyKey,
) -> EngineResult<Value> {
    if receiver.is_nullish() {
        return Err(nullish_read(receiver, key));
    }
    // Profile collection disabled: bypass every cache level.
    if !ctx.profiling_enabled() {
        return generic_load(ctx, receiver, key);
    }

    let cached = probe_load(ctx, site, receiver, key)?;
    if !cached.is_hole() {
        if ctx.feedback.get(site).state().has_feedback() {
            ctx.feedback
                .get_mut(site)
                .record_observed(ObservedType::of(cached));
        }
        return Ok(cached);
    }
    miss_load(ctx, site, receiver, key)
}

/// Probe the cache hierarchy for a load.
///
/// Returns the loaded value, or the hole sentinel when no cache level could
/// resolve the access and the caller must run the generic lookup.
pub fn probe_load(
    ctx: &mut EngineContext,
    site: FeedbackSlotId,
    receiver: Value,
    key: &PropertyKey,
) -> EngineResult<Value> {
    let Some((marker, holder)) = resolve_receiver(ctx, receiver) else {
        return Ok(Value::hole());
    };

    let probed = ctx.feedback.get(site).probe(marker);
    if let Some(handler) = probed {
        return apply_load_handler(ctx, handler, holder, receiver, key);
    }

    if ctx.feedback.get(site).state() == IcState::Megamorphic {
        let class = ctx.heap.get(holder).class().clone();
        let handler = ctx.load_cache().get(&class, key);
        if !handler.is_not_found() {
            return apply_load_handler(ctx, handler, holder, receiver, key);
        }
    }
    Ok(Value::hole())
}

/// Apply a cached load handler against `holder`.
///
/// Guard failures (an element handler whose index is out of range, a
/// non-index key against an element handler) yield the hole sentinel so the
/// caller falls through to the generic path instead of fabricating a value.
fn apply_load_handler(
    ctx: &mut EngineContext,
    handler: Handler,
    holder: ObjectId,
    receiver: Value,
    key: &PropertyKey,
) -> EngineResult<Value> {
    match handler {
        Handler::Field { offset, .. } => Ok(ctx.heap.get(holder).slot(offset)),
        Handler::Accessor { getter, .. } => {
            if getter.is_undefined() {
                Ok(Value::undefined())
            } else {
                ctx.heap.call(getter, receiver, &[])
            }
        }
        Handler::Element(_) => {
            let Some(index) = key.as_index() else {
                return Ok(Value::hole());
            };
            match ctx.heap.get(holder).elements().load(index) {
                Some(value) => Ok(value),
                None => Ok(Value::hole()),
            }
        }
        // A memoized negative result: the property is known absent.
        Handler::NotFound => Ok(Value::undefined()),
    }
}

/// Slow path: generic lookup, then populate whichever level missed.
fn miss_load(
    ctx: &mut EngineContext,
    site: FeedbackSlotId,
    receiver: Value,
    key: &PropertyKey,
) -> EngineResult<Value> {
    let Some((marker, holder)) = resolve_receiver(ctx, receiver) else {
        return generic_primitive_load(ctx, receiver, key);
    };

    ctx.count_generic_call();
    let outcome = generic_get(&mut ctx.heap, holder, key)?;

    if outcome.cacheable {
        let state = ctx.feedback.get_mut(site).update(marker, outcome.handler);
        if state == IcState::Megamorphic {
            // The one place the shared load cache is written: after a
            // cacheable generic lookup at a (now-)megamorphic site.
            let class = ctx.heap.get(holder).class().clone();
            ctx.load_cache_mut().set(class, key.clone(), outcome.handler);
        }
    }
    ctx.feedback
        .get_mut(site)
        .record_observed(ObservedType::of(outcome.value));
    Ok(outcome.value)
}

/// Uncached load for when profiling is disabled.
fn generic_load(ctx: &mut EngineContext, receiver: Value, key: &PropertyKey) -> EngineResult<Value> {
    match resolve_receiver(ctx, receiver) {
        Some((_, holder)) => {
            ctx.count_generic_call();
            Ok(generic_get(&mut ctx.heap, holder, key)?.value)
        }
        None => generic_primitive_load(ctx, receiver, key),
    }
}

/// Loads on primitives that have no IC path: string length/characters;
/// everything else reads as `undefined`.
fn generic_primitive_load(
    ctx: &mut EngineContext,
    receiver: Value,
    key: &PropertyKey,
) -> EngineResult<Value> {
    if receiver.is_string() {
        if let Some(index) = key.as_index() {
            return string_char(ctx, receiver, index);
        }
        if key.as_name().is_some_and(|n| n.as_str() == "length") {
            if let Some(s) = resolve_string(ctx, receiver) {
                let len = i64::try_from(s.chars().count()).unwrap_or(0);
                return Ok(Value::int_unchecked(len));
            }
        }
    }
    Ok(Value::undefined())
}

// =============================================================================
// Stores
// =============================================================================

/// `receiver.key = value` — named property store through the cache
/// hierarchy.
pub fn set_property(
    ctx: &mut EngineContext,
    site: FeedbackSlotId,
    receiver: Value,
    key: &PropertyKey,
    value: Value,
) -> EngineResult<()> {
    if receiver.is_nullish() {
        return Err(nullish_write(receiver, key));
    }
    let Some(raw) = receiver.as_object() else {
        // Sloppy-mode semantics: writes to primitives are dropped. (Strict
        // mode's TypeError belongs to the interpreter's mode handling.)
        return Ok(());
    };
    let holder = ObjectId(raw);

    if !ctx.profiling_enabled() {
        ctx.count_generic_call();
        return generic_set(&mut ctx.heap, &ctx.registry, holder, key, value).map(|_| ());
    }

    let marker = ClassMarker::Class(ctx.heap.get(holder).class().id());

    // Per-site probe.
    let probed = ctx.feedback.get(site).probe(marker);
    if let Some(handler) = probed {
        if try_apply_store(ctx, handler, holder, receiver, key, value)? {
            return Ok(());
        }
    } else if ctx.feedback.get(site).state() == IcState::Megamorphic {
        let class = ctx.heap.get(holder).class().clone();
        let handler = ctx.store_cache().get(&class, key);
        if !handler.is_not_found() && try_apply_store(ctx, handler, holder, receiver, key, value)? {
            return Ok(());
        }
    }

    // Slow path.
    ctx.count_generic_call();
    let outcome = generic_set(&mut ctx.heap, &ctx.registry, holder, key, value)?;
    if outcome.cacheable {
        let state = ctx.feedback.get_mut(site).update(marker, outcome.handler);
        if state == IcState::Megamorphic {
            // The one writer of the shared store cache.
            let class = ctx.heap.get(holder).class().clone();
            ctx.store_cache_mut().set(class, key.clone(), outcome.handler);
        }
    }
    ctx.feedback
        .get_mut(site)
        .record_observed(ObservedType::of(value));
    Ok(())
}

/// Apply a cached store handler.
///
/// Returns `Ok(false)` when the handler's guards reject the store (wrong
/// representation, out-of-range element, missing setter) — the caller falls
/// through to the generic path, which owns coercion and TypeError policy.
fn try_apply_store(
    ctx: &mut EngineContext,
    handler: Handler,
    holder: ObjectId,
    receiver: Value,
    key: &PropertyKey,
    value: Value,
) -> EngineResult<bool> {
    match handler {
        Handler::Field {
            offset,
            representation,
        } => {
            if !representation.admits(value) {
                return Ok(false);
            }
            ctx.heap.get_mut(holder).set_slot(offset, value);
            Ok(true)
        }
        Handler::Accessor { setter, .. } => {
            if setter.is_undefined() {
                return Ok(false);
            }
            ctx.heap.call(setter, receiver, &[value])?;
            Ok(true)
        }
        Handler::Element(_) => {
            let Some(index) = key.as_index() else {
                return Ok(false);
            };
            Ok(ctx.heap.get_mut(holder).elements_mut().store(index, value))
        }
        Handler::NotFound => Ok(false),
    }
}

// =============================================================================
// Keyed Access
// =============================================================================

/// `receiver[key]` — keyed load.
///
/// Head branch: integer keys against contiguous, typed-array, or
/// string-indexed layouts take the element routine selected by the class's
/// kind tag; everything else funnels into the named machinery.
pub fn get_keyed(
    ctx: &mut EngineContext,
    site: FeedbackSlotId,
    receiver: Value,
    key: &PropertyKey,
) -> EngineResult<Value> {
    if let Some(index) = key.as_index() {
        if receiver.is_string() {
            return string_char(ctx, receiver, index);
        }
        if let Some(raw) = receiver.as_object() {
            let id = ObjectId(raw);
            let kind = ctx.heap.get(id).class().elements_kind();
            if kind.is_typed() || kind == ElementsKind::Packed {
                if let Some(value) = ctx.heap.get(id).elements().load(index) {
                    ctx.feedback
                        .get_mut(site)
                        .record_observed(ObservedType::of(value));
                    return Ok(value);
                }
                // Out of range: let the generic-backed path sort it out.
            }
        }
    }
    get_property(ctx, site, receiver, key)
}

/// `receiver[key] = value` — keyed store, with the same head branch.
pub fn set_keyed(
    ctx: &mut EngineContext,
    site: FeedbackSlotId,
    receiver: Value,
    key: &PropertyKey,
    value: Value,
) -> EngineResult<()> {
    if let Some(index) = key.as_index() {
        if let Some(raw) = receiver.as_object() {
            let id = ObjectId(raw);
            let kind = ctx.heap.get(id).class().elements_kind();
            if (kind.is_typed() || kind == ElementsKind::Packed)
                && (!kind.is_typed() || value.is_number())
                && ctx.heap.get_mut(id).elements_mut().store(index, value)
            {
                ctx.feedback
                    .get_mut(site)
                    .record_observed(ObservedType::of(value));
                return Ok(());
            }
        }
    }
    set_property(ctx, site, receiver, key, value)
}

// =============================================================================
// Helpers
// =============================================================================

fn resolve_string(ctx: &EngineContext, receiver: Value) -> Option<String> {
    receiver
        .as_string_raw()
        .and_then(|ptr| ctx.interner.resolve_ptr(ptr))
        .map(|s| s.as_str().to_owned())
}

/// String-indexed load: one character as a fresh interned string.
fn string_char(ctx: &mut EngineContext, receiver: Value, index: u32) -> EngineResult<Value> {
    let Some(text) = resolve_string(ctx, receiver) else {
        return Ok(Value::undefined());
    };
    match text.chars().nth(index as usize) {
        Some(c) => {
            let interned = ctx.interner.intern(&c.to_string());
            Ok(Value::string_from_raw(interned.raw_ptr()))
        }
        None => Ok(Value::undefined()),
    }
}

fn nullish_read(receiver: Value, key: &PropertyKey) -> EngineError {
    EngineError::NullishReceiver {
        receiver: if receiver.is_null() {
            "null"
        } else {
            "undefined"
        },
        key: key.to_string(),
    }
}

fn nullish_write(receiver: Value, key: &PropertyKey) -> EngineError {
    EngineError::type_error(format!(
        "cannot set properties of {} (setting '{key}')",
        if receiver.is_null() {
            "null"
        } else {
            "undefined"
        }
    ))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_runtime::object::elements::ElementStore;
    use vesper_runtime::object::shape::{ClassFlags, PropertyFlags, Representation};
    use vesper_runtime::object::JsObject;

    #[test]
    fn test_nullish_receiver_load_is_type_error() {
        let mut ctx = EngineContext::new();
        let site = ctx.new_site();
        let key = ctx.name_key("x");
        let err = get_property(&mut ctx, site, Value::undefined(), &key).unwrap_err();
        assert!(err.is_type_error());
        let err = get_property(&mut ctx, site, Value::null(), &key).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_nullish_receiver_store_is_type_error() {
        let mut ctx = EngineContext::new();
        let site = ctx.new_site();
        let key = ctx.name_key("x");
        let err = set_property(&mut ctx, site, Value::null(), &key, Value::null()).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_load_store_roundtrip_through_dispatch() {
        let mut ctx = EngineContext::new();
        let store_site = ctx.new_site();
        let load_site = ctx.new_site();
        let obj = ctx.new_plain_object();
        let key = ctx.name_key("x");

        set_property(&mut ctx, store_site, obj.to_value(), &key, Value::int(7).unwrap()).unwrap();
        let got = get_property(&mut ctx, load_site, obj.to_value(), &key).unwrap();
        assert_eq!(got, Value::int(7).unwrap());
    }

    #[test]
    fn test_absent_property_reads_undefined() {
        let mut ctx = EngineContext::new();
        let site = ctx.new_site();
        let obj = ctx.new_plain_object();
        let key = ctx.name_key("nope");
        assert!(get_property(&mut ctx, site, obj.to_value(), &key)
            .unwrap()
            .is_undefined());
    }

    #[test]
    fn test_monomorphic_load_skips_generic_lookup() {
        let mut ctx = EngineContext::new();
        let store_site = ctx.new_site();
        let load_site = ctx.new_site();
        let obj = ctx.new_plain_object();
        let key = ctx.name_key("x");
        set_property(&mut ctx, store_site, obj.to_value(), &key, Value::int(1).unwrap()).unwrap();

        // First load: miss, populates the site.
        get_property(&mut ctx, load_site, obj.to_value(), &key).unwrap();
        let after_first = ctx.generic_calls();
        assert_eq!(ctx.feedback.get(load_site).state(), IcState::Monomorphic);

        // Repeats: all served by the monomorphic probe.
        for _ in 0..10 {
            let v = get_property(&mut ctx, load_site, obj.to_value(), &key).unwrap();
            assert_eq!(v, Value::int(1).unwrap());
        }
        assert_eq!(ctx.generic_calls(), after_first);
    }

    #[test]
    fn test_profiling_disabled_bypasses_caches() {
        let mut ctx = EngineContext::new();
        ctx.set_profiling_enabled(false);
        let site = ctx.new_site();
        let obj = ctx.new_plain_object();
        let key = ctx.name_key("x");

        set_property(&mut ctx, site, obj.to_value(), &key, Value::int(3).unwrap()).unwrap();
        for _ in 0..5 {
            get_property(&mut ctx, site, obj.to_value(), &key).unwrap();
        }
        // Site never initialized, caches never touched.
        assert_eq!(ctx.feedback.get(site).state(), IcState::Uninitialized);
        assert!(ctx.load_cache().is_cleared());
        assert_eq!(ctx.load_cache().stats().hits + ctx.load_cache().stats().misses, 0);
    }

    #[test]
    fn test_number_receiver_uses_number_sentinel() {
        let mut ctx = EngineContext::new();
        // Put a property on the number prototype.
        let proto = ctx.realm().number_prototype;
        let seed_site = ctx.new_site();
        let key = ctx.name_key("half");
        set_property(&mut ctx, seed_site, proto.to_value(), &key, Value::double(0.5)).unwrap();

        let site = ctx.new_site();
        let v = get_property(&mut ctx, site, Value::int(42).unwrap(), &key).unwrap();
        assert_eq!(v, Value::double(0.5));
        assert_eq!(ctx.feedback.get(site).state(), IcState::Monomorphic);

        // Doubles ride the same sentinel: still monomorphic, cache hit.
        let calls = ctx.generic_calls();
        let v = get_property(&mut ctx, site, Value::double(2.5), &key).unwrap();
        assert_eq!(v, Value::double(0.5));
        assert_eq!(ctx.generic_calls(), calls);
    }

    #[test]
    fn test_primitive_store_is_dropped() {
        let mut ctx = EngineContext::new();
        let site = ctx.new_site();
        let key = ctx.name_key("x");
        set_property(&mut ctx, site, Value::int(5).unwrap(), &key, Value::null()).unwrap();
        // The number prototype was not touched.
        let load_site = ctx.new_site();
        let proto = ctx.realm().number_prototype;
        assert!(get_property(&mut ctx, load_site, proto.to_value(), &key)
            .unwrap()
            .is_undefined());
    }

    #[test]
    fn test_string_length_and_chars() {
        let mut ctx = EngineContext::new();
        let site = ctx.new_site();
        let s = ctx.interner.intern("héllo");
        let receiver = Value::string_from_raw(s.raw_ptr());

        let len_key = ctx.name_key("length");
        assert_eq!(
            get_property(&mut ctx, site, receiver, &len_key).unwrap(),
            Value::int(5).unwrap()
        );

        let c = get_keyed(&mut ctx, site, receiver, &PropertyKey::Index(1)).unwrap();
        let resolved = ctx
            .interner
            .resolve_ptr(c.as_string_raw().unwrap())
            .unwrap();
        assert_eq!(resolved.as_str(), "é");

        assert!(get_keyed(&mut ctx, site, receiver, &PropertyKey::Index(99))
            .unwrap()
            .is_undefined());
    }

    #[test]
    fn test_keyed_typed_array_fast_path() {
        let mut ctx = EngineContext::new();
        let class = ctx
            .registry
            .create_root(ElementsKind::Int32, None, ClassFlags::empty());
        let obj = ctx.heap.alloc(JsObject::with_elements(
            class,
            ElementStore::typed(ElementsKind::Int32, 8),
        ));
        let site = ctx.new_site();

        set_keyed(
            &mut ctx,
            site,
            obj.to_value(),
            &PropertyKey::Index(3),
            Value::int(77).unwrap(),
        )
        .unwrap();
        let v = get_keyed(&mut ctx, site, obj.to_value(), &PropertyKey::Index(3)).unwrap();
        assert_eq!(v, Value::int(77).unwrap());
        // The element head branch never consulted the generic path.
        assert_eq!(ctx.generic_calls(), 0);
    }

    #[test]
    fn test_shared_field_store_type_error_via_cache_guard() {
        let mut ctx = EngineContext::new();
        let root = ctx
            .registry
            .create_root(ElementsKind::None, None, ClassFlags::SHARED);
        let key = ctx.name_key("count");
        let c1 = ctx.registry.transition(
            &root,
            key.clone(),
            PropertyFlags::default(),
            Representation::Int32,
        );
        let obj = ctx.heap.alloc(JsObject::new(c1));
        let site = ctx.new_site();

        // Warm the store site with a matching write.
        set_property(&mut ctx, site, obj.to_value(), &key, Value::int(1).unwrap()).unwrap();
        assert_eq!(ctx.feedback.get(site).state(), IcState::Monomorphic);

        // Cached handler's representation guard rejects the double; the
        // generic path raises the TypeError. Never silently coerced.
        let err =
            set_property(&mut ctx, site, obj.to_value(), &key, Value::double(1.5)).unwrap_err();
        assert!(err.is_type_error());
    }
}
