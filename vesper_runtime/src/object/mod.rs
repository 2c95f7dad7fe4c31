//! Heap objects and the context-owned object heap.
//!
//! Object values NaN-box an [`ObjectId`]: an index into the context's
//! [`Heap`]. Handles are stable for the lifetime of the context (the heap
//! never compacts), which is what lets hidden-class identity words serve as
//! cache hash inputs.

pub mod elements;
pub mod shape;

use self::elements::{ElementStore, ElementsKind};
use self::shape::{ClassFlags, HiddenClassRef, PropertyKind, MAX_INLINE_SLOTS};
use smallvec::SmallVec;
use vesper_core::{EngineError, EngineResult, Value};

/// Stable handle to a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Raw index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The NaN-boxed value for this handle.
    #[inline]
    pub const fn to_value(self) -> Value {
        Value::object(self.0)
    }
}

/// A native function invoked with the receiver and its arguments.
///
/// The call machinery proper is out of scope here; native functions cover
/// what the property caches need — accessor getters (no arguments) and
/// setters (the stored value).
pub type NativeFn = fn(&mut Heap, Value, &[Value]) -> EngineResult<Value>;

/// A heap-allocated object: hidden class, inline slots, element store.
#[derive(Debug)]
pub struct JsObject {
    /// The object's hidden class. Replaced (not mutated) on transitions.
    class: HiddenClassRef,
    /// Named-property storage, indexed by descriptor slot.
    slots: SmallVec<[Value; MAX_INLINE_SLOTS]>,
    /// Indexed-property storage matching the class's elements kind.
    elements: ElementStore,
    /// Native behavior for callable objects.
    native: Option<NativeFn>,
}

impl JsObject {
    /// Create an object of the given class with empty storage.
    pub fn new(class: HiddenClassRef) -> Self {
        let elements = match class.elements_kind() {
            ElementsKind::Packed => ElementStore::Packed(Vec::new()),
            ElementsKind::Dictionary => {
                ElementStore::Dictionary(rustc_hash::FxHashMap::default())
            }
            _ => ElementStore::Empty,
        };
        Self {
            class,
            slots: SmallVec::new(),
            elements,
            native: None,
        }
    }

    /// Create an object with a specific element store (typed arrays).
    pub fn with_elements(class: HiddenClassRef, elements: ElementStore) -> Self {
        Self {
            class,
            slots: SmallVec::new(),
            elements,
            native: None,
        }
    }

    /// Create a callable object wrapping a native function.
    pub fn callable(class: HiddenClassRef, native: NativeFn) -> Self {
        debug_assert!(class.flags().contains(ClassFlags::CALLABLE));
        Self {
            class,
            slots: SmallVec::new(),
            elements: ElementStore::Empty,
            native: Some(native),
        }
    }

    /// The object's current hidden class.
    #[inline]
    pub fn class(&self) -> &HiddenClassRef {
        &self.class
    }

    /// Read the inline slot at `offset` (`undefined` for never-written
    /// slots).
    #[inline]
    pub fn slot(&self, offset: u16) -> Value {
        self.slots
            .get(offset as usize)
            .copied()
            .unwrap_or_else(Value::undefined)
    }

    /// Write the inline slot at `offset`, growing as needed.
    pub fn set_slot(&mut self, offset: u16, value: Value) {
        let idx = offset as usize;
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, Value::undefined());
        }
        self.slots[idx] = value;
    }

    /// Replace the hidden class (property-addition transition).
    pub fn transition(&mut self, class: HiddenClassRef) {
        self.class = class;
    }

    /// The element store.
    #[inline]
    pub fn elements(&self) -> &ElementStore {
        &self.elements
    }

    /// Mutable element store.
    #[inline]
    pub fn elements_mut(&mut self) -> &mut ElementStore {
        &mut self.elements
    }

    /// The native function, for callable objects.
    #[inline]
    pub fn native(&self) -> Option<NativeFn> {
        self.native
    }
}

/// Context-owned object storage.
///
/// Allocation is append-only and handles are never invalidated; a real
/// collector would plug into the [`crate::gc`] seam.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<JsObject>,
}

impl Heap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    /// Allocate an object, returning its stable handle.
    pub fn alloc(&mut self, object: JsObject) -> ObjectId {
        let id = u32::try_from(self.objects.len()).expect("heap handle space exhausted");
        self.objects.push(object);
        ObjectId(id)
    }

    /// Borrow an object.
    #[inline]
    pub fn get(&self, id: ObjectId) -> &JsObject {
        &self.objects[id.0 as usize]
    }

    /// Mutably borrow an object.
    #[inline]
    pub fn get_mut(&mut self, id: ObjectId) -> &mut JsObject {
        &mut self.objects[id.0 as usize]
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check for an empty heap.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Invoke a callable object value with `this` and `args`.
    ///
    /// Used by accessor handlers; anything else is a TypeError.
    pub fn call(&mut self, callee: Value, this: Value, args: &[Value]) -> EngineResult<Value> {
        let Some(handle) = callee.as_object() else {
            return Err(EngineError::type_error("value is not callable"));
        };
        let Some(native) = self.get(ObjectId(handle)).native() else {
            return Err(EngineError::type_error("object is not callable"));
        };
        native(self, this, args)
    }

    /// Invoke an accessor getter from a class descriptor.
    pub fn call_getter(&mut self, descriptor_kind: &PropertyKind, this: Value) -> EngineResult<Value> {
        match descriptor_kind {
            PropertyKind::Accessor { getter, .. } => {
                if getter.is_undefined() {
                    Ok(Value::undefined())
                } else {
                    self.call(*getter, this, &[])
                }
            }
            PropertyKind::Data { .. } => Err(EngineError::InternalError {
                message: "call_getter on data property".into(),
            }),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use super::shape::{ClassRegistry, PropertyFlags, Representation};
    use vesper_core::StringInterner;

    #[test]
    fn test_alloc_and_handles() {
        let registry = ClassRegistry::new();
        let root = registry.create_root(ElementsKind::None, None, ClassFlags::empty());
        let mut heap = Heap::new();

        let a = heap.alloc(JsObject::new(root.clone()));
        let b = heap.alloc(JsObject::new(root));
        assert_ne!(a, b);
        assert_eq!(heap.len(), 2);
        assert_eq!(a.to_value().as_object(), Some(a.raw()));
    }

    #[test]
    fn test_slot_read_write() {
        let registry = ClassRegistry::new();
        let root = registry.create_root(ElementsKind::None, None, ClassFlags::empty());
        let mut heap = Heap::new();
        let id = heap.alloc(JsObject::new(root));

        assert!(heap.get(id).slot(0).is_undefined());
        heap.get_mut(id).set_slot(0, Value::int(42).unwrap());
        assert_eq!(heap.get(id).slot(0), Value::int(42).unwrap());
        // Sparse write grows intermediate slots as undefined.
        heap.get_mut(id).set_slot(3, Value::bool(true));
        assert!(heap.get(id).slot(2).is_undefined());
    }

    #[test]
    fn test_transition_replaces_class() {
        let registry = ClassRegistry::new();
        let interner = StringInterner::new();
        let root = registry.create_root(ElementsKind::None, None, ClassFlags::empty());
        let c1 = registry.transition(
            &root,
            vesper_core::PropertyKey::Name(interner.intern("x")),
            PropertyFlags::default(),
            Representation::Any,
        );
        let mut heap = Heap::new();
        let id = heap.alloc(JsObject::new(root.clone()));

        assert_eq!(heap.get(id).class().id(), root.id());
        heap.get_mut(id).transition(c1.clone());
        assert_eq!(heap.get(id).class().id(), c1.id());
    }

    #[test]
    fn test_call_non_callable_is_type_error() {
        let registry = ClassRegistry::new();
        let root = registry.create_root(ElementsKind::None, None, ClassFlags::empty());
        let mut heap = Heap::new();
        let id = heap.alloc(JsObject::new(root));

        let err = heap
            .call(id.to_value(), Value::undefined(), &[])
            .unwrap_err();
        assert!(err.is_type_error());
        let err = heap
            .call(Value::int(1).unwrap(), Value::undefined(), &[])
            .unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_call_native() {
        fn first_arg_or_42(_: &mut Heap, _: Value, args: &[Value]) -> EngineResult<Value> {
            Ok(args.first().copied().unwrap_or(Value::int_unchecked(42)))
        }
        let registry = ClassRegistry::new();
        let fn_class = registry.create_root(ElementsKind::None, None, ClassFlags::CALLABLE);
        let mut heap = Heap::new();
        let f = heap.alloc(JsObject::callable(fn_class, first_arg_or_42));

        let result = heap.call(f.to_value(), Value::undefined(), &[]).unwrap();
        assert_eq!(result, Value::int(42).unwrap());
        let result = heap
            .call(f.to_value(), Value::undefined(), &[Value::bool(true)])
            .unwrap();
        assert_eq!(result, Value::bool(true));
    }
}
