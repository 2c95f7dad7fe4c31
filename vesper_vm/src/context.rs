//! The per-thread execution context.
//!
//! All cache state is owned here and passed by reference into the dispatch
//! functions — there is no process-global cache. A context is
//! single-threaded; the GC's root scan (`trace_caches`) runs with the
//! mutator paused.

use vesper_core::{PropertyKey, StringInterner, SymbolRegistry, Value};
use vesper_jit::ic::feedback::{FeedbackSlotId, FeedbackVector};
use vesper_jit::ic::invalidation::{CacheEpoch, InvalidationLog, InvalidationReason};
use vesper_jit::ic::mega::MegaIcCache;
use vesper_runtime::gc::Tracer;
use vesper_runtime::object::elements::ElementsKind;
use vesper_runtime::object::shape::{ClassFlags, ClassRegistry, HiddenClassRef};
use vesper_runtime::object::{Heap, JsObject, ObjectId};

/// Realm anchors: the canonical objects and classes primitive receivers
/// resolve against.
#[derive(Debug)]
pub struct Realm {
    /// The object numeric receivers read properties from.
    pub number_prototype: ObjectId,
    /// The canonical Number-wrapper class (the number prototype's class).
    pub number_wrapper_class: HiddenClassRef,
}

/// One executing thread's engine state.
///
/// Field-per-subsystem, all reachable through `&mut self`; the caches are
/// private so population stays confined to the dispatch path.
pub struct EngineContext {
    /// Object storage.
    pub heap: Heap,
    /// Hidden-class creation and transition caching.
    pub registry: ClassRegistry,
    /// Property-name interning.
    pub interner: StringInterner,
    /// Symbol allocation.
    pub symbols: SymbolRegistry,
    /// Per-site feedback slots.
    pub feedback: FeedbackVector,
    /// Realm anchors.
    realm: Realm,
    /// Shared megamorphic cache for loads.
    load_cache: MegaIcCache,
    /// Shared megamorphic cache for stores.
    store_cache: MegaIcCache,
    /// Invalidation bookkeeping.
    invalidations: InvalidationLog,
    /// When false, dispatch bypasses every cache level.
    profiling_enabled: bool,
    /// Generic-lookup invocations (diagnostics; lets tests assert which
    /// level answered).
    generic_calls: u64,
}

impl EngineContext {
    /// Create a context with profiling enabled.
    #[must_use]
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let registry = ClassRegistry::new();

        // The number prototype starts empty; scripts (or tests) populate
        // it. Its class is the canonical marker target for primitive
        // numeric receivers.
        let number_wrapper_class =
            registry.create_root(ElementsKind::None, None, ClassFlags::empty());
        let number_prototype = heap.alloc(JsObject::new(number_wrapper_class.clone()));

        Self {
            heap,
            registry,
            interner: StringInterner::new(),
            symbols: SymbolRegistry::new(),
            feedback: FeedbackVector::new(),
            realm: Realm {
                number_prototype,
                number_wrapper_class,
            },
            load_cache: MegaIcCache::new(),
            store_cache: MegaIcCache::new(),
            invalidations: InvalidationLog::new(),
            profiling_enabled: true,
            generic_calls: 0,
        }
    }

    /// Realm anchors.
    #[inline]
    #[must_use]
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// The load-side megamorphic cache.
    #[inline]
    #[must_use]
    pub fn load_cache(&self) -> &MegaIcCache {
        &self.load_cache
    }

    /// The store-side megamorphic cache.
    #[inline]
    #[must_use]
    pub fn store_cache(&self) -> &MegaIcCache {
        &self.store_cache
    }

    pub(crate) fn load_cache_mut(&mut self) -> &mut MegaIcCache {
        &mut self.load_cache
    }

    pub(crate) fn store_cache_mut(&mut self) -> &mut MegaIcCache {
        &mut self.store_cache
    }

    /// Whether dispatch consults and populates caches.
    #[inline]
    #[must_use]
    pub fn profiling_enabled(&self) -> bool {
        self.profiling_enabled
    }

    /// Enable or disable profile collection. Disabling makes every access
    /// go straight to the generic lookup.
    pub fn set_profiling_enabled(&mut self, enabled: bool) {
        self.profiling_enabled = enabled;
    }

    /// Allocate a feedback slot for a new access site.
    pub fn new_site(&mut self) -> FeedbackSlotId {
        self.feedback.alloc()
    }

    /// Intern a property name as a key.
    pub fn name_key(&self, name: &str) -> PropertyKey {
        PropertyKey::Name(self.interner.intern(name))
    }

    /// Bulk-invalidate all cache state.
    ///
    /// Clears both megamorphic caches and resets every feedback slot; there
    /// is no per-entry invalidation by design. Returns the new epoch.
    pub fn invalidate_caches(&mut self, reason: InvalidationReason) -> CacheEpoch {
        self.load_cache.clear();
        self.store_cache.clear();
        self.feedback.reset_all();
        self.invalidations.record(reason)
    }

    /// Invalidation bookkeeping.
    #[inline]
    #[must_use]
    pub fn invalidations(&self) -> &InvalidationLog {
        &self.invalidations
    }

    /// Generic-lookup invocations so far.
    #[inline]
    #[must_use]
    pub fn generic_calls(&self) -> u64 {
        self.generic_calls
    }

    pub(crate) fn count_generic_call(&mut self) {
        self.generic_calls += 1;
    }

    /// Visit both caches' occupied slots for GC root scanning.
    ///
    /// Called with the mutator paused (stop-the-world root scan); cache
    /// entries pin the classes they reference, and this is how the
    /// collector learns about those pins.
    pub fn trace_caches(&self, tracer: &mut dyn Tracer) {
        self.load_cache.iterate(tracer);
        self.store_cache.iterate(tracer);
    }

    /// Convenience: allocate a plain empty object with a fresh root class.
    pub fn new_plain_object(&mut self) -> ObjectId {
        let class = self
            .registry
            .create_root(ElementsKind::None, None, ClassFlags::empty());
        self.heap.alloc(JsObject::new(class))
    }

    /// The value numeric receivers resolve properties against.
    #[inline]
    #[must_use]
    pub fn number_prototype_value(&self) -> Value {
        self.realm.number_prototype.to_value()
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("heap_objects", &self.heap.len())
            .field("classes", &self.registry.class_count())
            .field("feedback_slots", &self.feedback.len())
            .field("load_cache", &self.load_cache)
            .field("store_cache", &self.store_cache)
            .field("profiling_enabled", &self.profiling_enabled)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_core::Value;
    use vesper_runtime::gc::CountingTracer;
    use vesper_runtime::handler::Handler;
    use vesper_runtime::object::shape::Representation;

    #[test]
    fn test_context_has_disjoint_cache_pair() {
        let mut ctx = EngineContext::new();
        let class = ctx
            .registry
            .create_root(ElementsKind::None, None, ClassFlags::empty());
        let key = ctx.name_key("x");
        let handler = Handler::Field {
            offset: 0,
            representation: Representation::Any,
        };

        ctx.load_cache_mut().set(class.clone(), key.clone(), handler);
        // The store cache is untouched: disjoint population.
        assert_eq!(ctx.load_cache().get(&class, &key), handler);
        assert_eq!(ctx.store_cache().get(&class, &key), Handler::NotFound);
    }

    #[test]
    fn test_invalidate_clears_both_caches() {
        let mut ctx = EngineContext::new();
        let class = ctx
            .registry
            .create_root(ElementsKind::None, None, ClassFlags::empty());
        let key = ctx.name_key("x");
        let handler = Handler::NotFound;

        ctx.load_cache_mut().set(class.clone(), key.clone(), handler);
        ctx.store_cache_mut().set(class, key, handler);
        assert!(!ctx.load_cache().is_cleared());

        let epoch = ctx.invalidate_caches(InvalidationReason::Manual);
        assert!(ctx.load_cache().is_cleared());
        assert!(ctx.store_cache().is_cleared());
        assert_eq!(epoch.value(), 1);
        assert_eq!(ctx.invalidations().count(InvalidationReason::Manual), 1);
    }

    #[test]
    fn test_trace_caches_covers_both_instances() {
        let mut ctx = EngineContext::new();
        let class_a = ctx
            .registry
            .create_root(ElementsKind::None, None, ClassFlags::empty());
        let class_b = ctx
            .registry
            .create_root(ElementsKind::None, None, ClassFlags::empty());
        let key_a = ctx.name_key("a");
        let key_b = ctx.name_key("b");
        ctx.load_cache_mut().set(class_a, key_a, Handler::NotFound);
        ctx.store_cache_mut().set(class_b, key_b, Handler::NotFound);

        let mut tracer = CountingTracer::default();
        ctx.trace_caches(&mut tracer);
        assert_eq!(tracer.classes, 2);
        assert_eq!(tracer.keys, 2);
    }

    #[test]
    fn test_realm_number_anchors() {
        let ctx = EngineContext::new();
        let proto = ctx.realm().number_prototype;
        assert_eq!(
            ctx.heap.get(proto).class().id(),
            ctx.realm().number_wrapper_class.id()
        );
        assert_eq!(ctx.number_prototype_value(), Value::object(proto.raw()));
    }

    #[test]
    fn test_name_key_interns() {
        let ctx = EngineContext::new();
        assert_eq!(ctx.name_key("p"), ctx.name_key("p"));
    }
}
