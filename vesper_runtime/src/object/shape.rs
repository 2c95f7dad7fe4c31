//! Hidden classes for property-layout sharing.
//!
//! Objects built by the same sequence of property additions share a hidden
//! class. Each class describes the layout of named properties in the
//! object's inline slots, which is what makes inline caching possible: a
//! single class-identity comparison stands in for a full property lookup.
//!
//! ## Transitions
//!
//! Adding a property transitions to a child class rather than mutating the
//! current one; classes are immutable once created and form a transition
//! tree:
//!
//! ```text
//!     root
//!       |
//!   +---+---+
//!   |       |
//!  "x"     "y"
//!   |       |
//!  C1      C2
//!   |
//!  "y"
//!   |
//!  C3 (has both x and y)
//! ```
//!
//! ## Identity
//!
//! Class identity is the [`ClassId`]: unique, monotonically allocated,
//! never reused, so an id comparison is exact with no liveness hazard. The
//! stable `Arc` address doubles as the cache hash word (its low bits are
//! always zero from allocator alignment and get shifted off).

use crate::object::elements::ElementsKind;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use vesper_core::{PropertyKey, Value};

// =============================================================================
// Property Attributes
// =============================================================================

bitflags::bitflags! {
    /// Property descriptor attributes (ECMAScript semantics).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u8 {
        /// Property value can be changed.
        const WRITABLE = 1 << 0;
        /// Property appears in enumeration.
        const ENUMERABLE = 1 << 1;
        /// Property can be deleted or reconfigured.
        const CONFIGURABLE = 1 << 2;
    }
}

impl Default for PropertyFlags {
    /// Default data-property attributes: writable, enumerable, configurable.
    #[inline]
    fn default() -> Self {
        Self::WRITABLE | Self::ENUMERABLE | Self::CONFIGURABLE
    }
}

impl PropertyFlags {
    /// Read-only data property.
    #[inline]
    pub const fn read_only() -> Self {
        Self::ENUMERABLE.union(Self::CONFIGURABLE)
    }
}

// =============================================================================
// Field Representation
// =============================================================================

/// Declared representation of a field's stored value.
///
/// Plain objects declare `Any`. Shared-object fields declare a concrete
/// representation; stores of non-matching values are rejected with a
/// TypeError rather than coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Representation {
    /// Any tagged value.
    #[default]
    Any,
    /// Small integers only.
    Int32,
    /// Any numeric value (small int or double).
    Double,
    /// Heap references only (objects, strings, symbols).
    HeapRef,
}

impl Representation {
    /// Check whether `value` matches this representation.
    #[inline]
    pub fn admits(self, value: Value) -> bool {
        match self {
            Self::Any => true,
            Self::Int32 => value.is_int(),
            Self::Double => value.is_number(),
            Self::HeapRef => value.is_object() || value.is_string() || value.is_symbol(),
        }
    }
}

// =============================================================================
// Property Descriptor
// =============================================================================

/// What kind of property a descriptor declares.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    /// A data property stored in an inline slot.
    Data {
        /// Declared representation of the stored value.
        representation: Representation,
    },
    /// An accessor property; the pair lives in the descriptor (shared by
    /// every object of this class, like the layout itself).
    Accessor {
        /// Getter function value (`undefined` if absent).
        getter: Value,
        /// Setter function value (`undefined` if absent).
        setter: Value,
    },
}

/// Describes the property added by one class transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    /// Property key (name, index, or symbol; names compare by identity).
    pub key: PropertyKey,
    /// Inline slot index (0-based). Accessors reserve a slot too, keeping
    /// offsets stable across reconfiguration.
    pub slot_index: u16,
    /// Attribute flags.
    pub flags: PropertyFlags,
    /// Data or accessor.
    pub kind: PropertyKind,
}

impl PropertyDescriptor {
    /// Check if this is a data property.
    #[inline]
    pub const fn is_data(&self) -> bool {
        matches!(self.kind, PropertyKind::Data { .. })
    }

    /// Check if the property is writable.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.flags.contains(PropertyFlags::WRITABLE)
    }

    /// The declared representation (accessors admit anything).
    #[inline]
    pub fn representation(&self) -> Representation {
        match self.kind {
            PropertyKind::Data { representation } => representation,
            PropertyKind::Accessor { .. } => Representation::Any,
        }
    }
}

// =============================================================================
// Class Identity
// =============================================================================

/// Unique identifier for a hidden class.
///
/// Allocated monotonically, never reused: comparing ids is an exact
/// identity test with no address-recycling hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Raw value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

bitflags::bitflags! {
    /// Class-wide behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassFlags: u8 {
        /// Shared-memory object: field representations are enforced, never
        /// coerced; mismatched stores raise TypeError.
        const SHARED = 1 << 0;
        /// Exotic receiver (proxy-like): every lookup outcome is
        /// uncacheable.
        const EXOTIC = 1 << 1;
        /// Callable object carrying a native function.
        const CALLABLE = 1 << 2;
    }
}

// =============================================================================
// Hidden Class
// =============================================================================

/// Maximum number of inline property slots.
pub const MAX_INLINE_SLOTS: usize = 8;

/// Shared, immutable reference to a hidden class.
pub type HiddenClassRef = Arc<HiddenClass>;

/// A hidden class: the structural descriptor of every object shaped by the
/// same property-addition history.
///
/// Immutable once created (transitions produce new classes). The transition
/// table is the only interior-mutable part and is append-only.
#[derive(Debug)]
pub struct HiddenClass {
    /// Unique identity.
    id: ClassId,
    /// Parent class (`None` for roots).
    parent: Option<HiddenClassRef>,
    /// Property added by this transition (`None` for roots).
    property: Option<PropertyDescriptor>,
    /// Total named properties along the chain.
    property_count: u16,
    /// Inline slots in use.
    inline_count: u16,
    /// Indexed-storage layout tag; keyed access dispatches on this.
    elements_kind: ElementsKind,
    /// Prototype object handle, if any.
    prototype: Option<u32>,
    /// Behavior flags.
    flags: ClassFlags,
    /// Transitions to child classes (lazily populated).
    transitions: RwLock<FxHashMap<PropertyKey, HiddenClassRef>>,
}

impl HiddenClass {
    fn root(
        id: ClassId,
        elements_kind: ElementsKind,
        prototype: Option<u32>,
        flags: ClassFlags,
    ) -> HiddenClassRef {
        Arc::new(Self {
            id,
            parent: None,
            property: None,
            property_count: 0,
            inline_count: 0,
            elements_kind,
            prototype,
            flags,
            transitions: RwLock::new(FxHashMap::default()),
        })
    }

    fn with_property(
        parent: HiddenClassRef,
        descriptor: PropertyDescriptor,
        id: ClassId,
    ) -> HiddenClassRef {
        let inline_count = parent.inline_count + 1;
        Arc::new(Self {
            id,
            property_count: parent.property_count + 1,
            inline_count,
            elements_kind: parent.elements_kind,
            prototype: parent.prototype,
            flags: parent.flags,
            parent: Some(parent),
            property: Some(descriptor),
            transitions: RwLock::new(FxHashMap::default()),
        })
    }

    /// The class identity.
    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Parent class, if any.
    #[inline]
    pub fn parent(&self) -> Option<&HiddenClassRef> {
        self.parent.as_ref()
    }

    /// The descriptor added by this transition.
    #[inline]
    pub fn property(&self) -> Option<&PropertyDescriptor> {
        self.property.as_ref()
    }

    /// Total named properties.
    #[inline]
    pub fn property_count(&self) -> u16 {
        self.property_count
    }

    /// Inline slots in use.
    #[inline]
    pub fn inline_count(&self) -> u16 {
        self.inline_count
    }

    /// The indexed-storage layout tag.
    #[inline]
    pub fn elements_kind(&self) -> ElementsKind {
        self.elements_kind
    }

    /// Prototype object handle.
    #[inline]
    pub fn prototype(&self) -> Option<u32> {
        self.prototype
    }

    /// Behavior flags.
    #[inline]
    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    /// Shared-memory object class?
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.flags.contains(ClassFlags::SHARED)
    }

    /// Exotic (proxy-like) receiver class?
    #[inline]
    pub fn is_exotic(&self) -> bool {
        self.flags.contains(ClassFlags::EXOTIC)
    }

    /// Look up an own property by key, walking the chain.
    ///
    /// O(n) in property count; the caches exist so this rarely runs.
    pub fn lookup(&self, key: &PropertyKey) -> Option<&PropertyDescriptor> {
        let mut current = self;
        loop {
            if let Some(prop) = &current.property {
                if &prop.key == key {
                    return Some(prop);
                }
            }
            match &current.parent {
                Some(parent) => current = parent.as_ref(),
                None => return None,
            }
        }
    }

    /// Get an existing transition, if cached.
    pub fn get_transition(&self, key: &PropertyKey) -> Option<HiddenClassRef> {
        self.transitions.read().get(key).cloned()
    }

    fn add_transition(&self, key: PropertyKey, class: HiddenClassRef) {
        self.transitions.write().insert(key, class);
    }
}

impl PartialEq for HiddenClass {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for HiddenClass {}

/// The stable identity word of a class, used as the cache hash input.
///
/// This is the `Arc` allocation address: stable for the class's lifetime
/// (nothing moves it), with the low bits always zero from heap alignment.
#[inline]
pub fn class_identity_word(class: &HiddenClassRef) -> usize {
    Arc::as_ptr(class) as usize
}

// =============================================================================
// Class Registry
// =============================================================================

/// Creates classes and caches transitions.
///
/// Owned by the execution context — deliberately not a process global, so
/// cache state never outlives or leaks across contexts.
#[derive(Debug)]
pub struct ClassRegistry {
    /// Counter for unique class ids.
    next_id: AtomicU32,
}

impl ClassRegistry {
    /// Create a new registry.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(0),
        }
    }

    fn allocate_id(&self) -> ClassId {
        ClassId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a root class with the given layout tag and flags.
    pub fn create_root(
        &self,
        elements_kind: ElementsKind,
        prototype: Option<u32>,
        flags: ClassFlags,
    ) -> HiddenClassRef {
        HiddenClass::root(self.allocate_id(), elements_kind, prototype, flags)
    }

    /// Transition to a child class by adding a data property.
    ///
    /// Returns the cached child if this transition was taken before.
    pub fn transition(
        &self,
        from: &HiddenClassRef,
        key: PropertyKey,
        flags: PropertyFlags,
        representation: Representation,
    ) -> HiddenClassRef {
        if let Some(existing) = from.get_transition(&key) {
            return existing;
        }
        let descriptor = PropertyDescriptor {
            key: key.clone(),
            slot_index: from.inline_count,
            flags,
            kind: PropertyKind::Data { representation },
        };
        let child = HiddenClass::with_property(Arc::clone(from), descriptor, self.allocate_id());
        from.add_transition(key, Arc::clone(&child));
        child
    }

    /// Transition to a child class by adding an accessor property.
    pub fn transition_accessor(
        &self,
        from: &HiddenClassRef,
        key: PropertyKey,
        flags: PropertyFlags,
        getter: Value,
        setter: Value,
    ) -> HiddenClassRef {
        if let Some(existing) = from.get_transition(&key) {
            return existing;
        }
        let descriptor = PropertyDescriptor {
            key: key.clone(),
            slot_index: from.inline_count,
            flags,
            kind: PropertyKind::Accessor { getter, setter },
        };
        let child = HiddenClass::with_property(Arc::clone(from), descriptor, self.allocate_id());
        from.add_transition(key, Arc::clone(&child));
        child
    }

    /// Number of classes created so far.
    pub fn class_count(&self) -> u32 {
        self.next_id.load(Ordering::Relaxed)
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
