//! Per-call-site feedback slots.
//!
//! Each property-access site owns a two-value profile slot pair: the first
//! value identifies what the site has seen (one class, a small side table
//! of classes, or the number sentinel for primitive numeric receivers), the
//! second holds the matching handler. The pair is what the interpreter's
//! slot-allocation machinery hands the dispatch logic.
//!
//! Class references here are weak by construction: a [`ClassMarker`] holds
//! a class *id*, which pins nothing and can never alias a recycled
//! allocation (ids are not reused).

use crate::ic::{IcState, POLY_IC_ENTRIES};
use smallvec::SmallVec;
use vesper_core::Value;
use vesper_runtime::handler::Handler;
use vesper_runtime::object::shape::ClassId;

// =============================================================================
// Class Marker
// =============================================================================

/// What a site compares receivers against.
///
/// Primitive numbers have no hidden class of their own; they probe with the
/// `Number` sentinel, which the dispatch maps to the context's canonical
/// Number-wrapper class. This keeps numeric receivers on the monomorphic
/// and polymorphic fast paths without boxing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassMarker {
    /// An object receiver's hidden class, by id (weak).
    Class(ClassId),
    /// A primitive numeric receiver.
    Number,
}

// =============================================================================
// Feedback Slot
// =============================================================================

/// One polymorphic side-table entry.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PolyEntry {
    marker: ClassMarker,
    handler: Handler,
}

/// A call site's feedback: the profile slot pair plus its state machine.
///
/// Transitions are forward-only; megamorphic is sticky even if the site
/// later stabilizes on one class.
#[derive(Debug, Clone)]
pub struct FeedbackSlot {
    /// Current tier.
    state: IcState,
    /// Monomorphic: the one marker seen.
    mono_marker: Option<ClassMarker>,
    /// Monomorphic: its handler.
    mono_handler: Handler,
    /// Polymorphic side table, bounded by [`POLY_IC_ENTRIES`].
    poly: SmallVec<[PolyEntry; POLY_IC_ENTRIES]>,
    /// Best-effort observed-type bitmask for the optimizing tier.
    observed: u8,
}

impl FeedbackSlot {
    /// A fresh, uninitialized slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: IcState::Uninitialized,
            mono_marker: None,
            mono_handler: Handler::NotFound,
            poly: SmallVec::new(),
            observed: 0,
        }
    }

    /// Current tier.
    #[inline]
    #[must_use]
    pub fn state(&self) -> IcState {
        self.state
    }

    /// Probe the site's own tracking for `marker`.
    ///
    /// Monomorphic: one comparison. Polymorphic: a bounded linear scan.
    /// `None` means this level cannot answer — uninitialized and
    /// megamorphic sites always fall through (the latter to the shared
    /// megamorphic cache).
    #[inline]
    pub fn probe(&self, marker: ClassMarker) -> Option<Handler> {
        match self.state {
            IcState::Uninitialized | IcState::Megamorphic => None,
            IcState::Monomorphic => {
                if self.mono_marker == Some(marker) {
                    Some(self.mono_handler)
                } else {
                    None
                }
            }
            IcState::Polymorphic => self
                .poly
                .iter()
                .find(|entry| entry.marker == marker)
                .map(|entry| entry.handler),
        }
    }

    /// Record a resolved access and advance the state machine.
    ///
    /// Returns the resulting state, which the caller uses to decide whether
    /// the shared megamorphic cache takes over population.
    pub fn update(&mut self, marker: ClassMarker, handler: Handler) -> IcState {
        match self.state {
            IcState::Uninitialized => {
                self.mono_marker = Some(marker);
                self.mono_handler = handler;
                self.state = IcState::Monomorphic;
            }
            IcState::Monomorphic => {
                if self.mono_marker == Some(marker) {
                    // Same class, refreshed handler (e.g. after a negative
                    // result turned positive).
                    self.mono_handler = handler;
                } else {
                    // Second class: spill the mono entry into the side
                    // table and go polymorphic.
                    if let Some(first) = self.mono_marker.take() {
                        self.poly.push(PolyEntry {
                            marker: first,
                            handler: self.mono_handler,
                        });
                    }
                    self.poly.push(PolyEntry { marker, handler });
                    self.state = IcState::Polymorphic;
                }
            }
            IcState::Polymorphic => {
                if let Some(entry) = self.poly.iter_mut().find(|e| e.marker == marker) {
                    entry.handler = handler;
                } else if self.poly.len() < POLY_IC_ENTRIES {
                    self.poly.push(PolyEntry { marker, handler });
                } else {
                    // Table full: give up per-site tracking for good.
                    self.poly.clear();
                    self.state = IcState::Megamorphic;
                }
            }
            IcState::Megamorphic => {
                // Sticky; the shared cache owns this site's population now.
            }
        }
        self.state
    }

    /// Record the observed value type (best effort; no correctness impact
    /// if skipped).
    #[inline]
    pub fn record_observed(&mut self, observed: ObservedType) {
        self.observed |= observed.bit();
    }

    /// The observed-type bitmask accumulated so far.
    #[inline]
    #[must_use]
    pub fn observed_mask(&self) -> u8 {
        self.observed
    }

    /// Reset to uninitialized (bulk invalidation only).
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for FeedbackSlot {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Observed Types
// =============================================================================

/// Coarse value classification recorded as profiling feedback for the
/// optimizing tier's speculation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObservedType {
    /// Small integer.
    Int = 0,
    /// Unboxed double.
    Double = 1,
    /// Boolean.
    Bool = 2,
    /// Interned string.
    String = 3,
    /// Symbol.
    Symbol = 4,
    /// Heap object.
    Object = 5,
    /// `undefined` or `null`.
    Nullish = 6,
}

impl ObservedType {
    /// Classify a value.
    #[must_use]
    pub fn of(value: Value) -> Self {
        if value.is_int() {
            Self::Int
        } else if value.is_double() {
            Self::Double
        } else if value.is_bool() {
            Self::Bool
        } else if value.is_string() {
            Self::String
        } else if value.is_symbol() {
            Self::Symbol
        } else if value.is_object() {
            Self::Object
        } else {
            Self::Nullish
        }
    }

    /// Bit position in the feedback mask.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

// =============================================================================
// Feedback Vector
// =============================================================================

/// Stable handle to a feedback slot within a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FeedbackSlotId(pub u32);

/// Per-function (or per-context, in tests) collection of feedback slots.
#[derive(Debug, Default)]
pub struct FeedbackVector {
    slots: Vec<FeedbackSlot>,
}

impl FeedbackVector {
    /// Create an empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Allocate a fresh slot.
    pub fn alloc(&mut self) -> FeedbackSlotId {
        let id = u32::try_from(self.slots.len()).expect("feedback slot space exhausted");
        self.slots.push(FeedbackSlot::new());
        FeedbackSlotId(id)
    }

    /// Borrow a slot.
    #[inline]
    #[must_use]
    pub fn get(&self, id: FeedbackSlotId) -> &FeedbackSlot {
        &self.slots[id.0 as usize]
    }

    /// Mutably borrow a slot.
    #[inline]
    pub fn get_mut(&mut self, id: FeedbackSlotId) -> &mut FeedbackSlot {
        &mut self.slots[id.0 as usize]
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check for an empty vector.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reset every slot (bulk invalidation).
    pub fn reset_all(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_runtime::object::shape::Representation;

    fn field(offset: u16) -> Handler {
        Handler::Field {
            offset,
            representation: Representation::Any,
        }
    }

    fn class(id: u32) -> ClassMarker {
        ClassMarker::Class(ClassId(id))
    }

    #[test]
    fn test_uninitialized_probe_misses() {
        let slot = FeedbackSlot::new();
        assert_eq!(slot.state(), IcState::Uninitialized);
        assert!(slot.probe(class(1)).is_none());
    }

    #[test]
    fn test_mono_hit_and_miss() {
        let mut slot = FeedbackSlot::new();
        slot.update(class(1), field(0));
        assert_eq!(slot.state(), IcState::Monomorphic);
        assert_eq!(slot.probe(class(1)), Some(field(0)));
        assert!(slot.probe(class(2)).is_none());
    }

    #[test]
    fn test_mono_same_class_refreshes_handler() {
        let mut slot = FeedbackSlot::new();
        slot.update(class(1), field(0));
        slot.update(class(1), field(5));
        assert_eq!(slot.state(), IcState::Monomorphic);
        assert_eq!(slot.probe(class(1)), Some(field(5)));
    }

    #[test]
    fn test_mono_to_poly_keeps_first_entry() {
        let mut slot = FeedbackSlot::new();
        slot.update(class(1), field(0));
        slot.update(class(2), field(1));
        assert_eq!(slot.state(), IcState::Polymorphic);
        assert_eq!(slot.probe(class(1)), Some(field(0)));
        assert_eq!(slot.probe(class(2)), Some(field(1)));
    }

    #[test]
    fn test_poly_fills_to_capacity() {
        let mut slot = FeedbackSlot::new();
        for i in 0..POLY_IC_ENTRIES as u32 {
            slot.update(class(i), field(i as u16));
        }
        assert_eq!(slot.state(), IcState::Polymorphic);
        for i in 0..POLY_IC_ENTRIES as u32 {
            assert_eq!(slot.probe(class(i)), Some(field(i as u16)));
        }
    }

    #[test]
    fn test_poly_overflow_goes_megamorphic() {
        let mut slot = FeedbackSlot::new();
        for i in 0..=POLY_IC_ENTRIES as u32 {
            slot.update(class(i), field(0));
        }
        assert_eq!(slot.state(), IcState::Megamorphic);
        // Megamorphic sites answer nothing themselves.
        assert!(slot.probe(class(0)).is_none());
    }

    #[test]
    fn test_megamorphic_is_sticky() {
        let mut slot = FeedbackSlot::new();
        for i in 0..=POLY_IC_ENTRIES as u32 {
            slot.update(class(i), field(0));
        }
        // A long stable run of one class does not regress the site.
        for _ in 0..100 {
            slot.update(class(7), field(3));
        }
        assert_eq!(slot.state(), IcState::Megamorphic);
        assert!(slot.probe(class(7)).is_none());
    }

    #[test]
    fn test_number_sentinel_probes() {
        let mut slot = FeedbackSlot::new();
        slot.update(ClassMarker::Number, field(2));
        assert_eq!(slot.probe(ClassMarker::Number), Some(field(2)));
        assert!(slot.probe(class(1)).is_none());
    }

    #[test]
    fn test_number_and_classes_share_side_table() {
        let mut slot = FeedbackSlot::new();
        slot.update(ClassMarker::Number, field(0));
        slot.update(class(1), field(1));
        assert_eq!(slot.state(), IcState::Polymorphic);
        assert_eq!(slot.probe(ClassMarker::Number), Some(field(0)));
        assert_eq!(slot.probe(class(1)), Some(field(1)));
    }

    #[test]
    fn test_reset_returns_to_uninitialized() {
        let mut slot = FeedbackSlot::new();
        slot.update(class(1), field(0));
        slot.record_observed(ObservedType::Int);
        slot.reset();
        assert_eq!(slot.state(), IcState::Uninitialized);
        assert!(slot.probe(class(1)).is_none());
        assert_eq!(slot.observed_mask(), 0);
    }

    #[test]
    fn test_observed_mask_accumulates() {
        let mut slot = FeedbackSlot::new();
        slot.record_observed(ObservedType::Int);
        slot.record_observed(ObservedType::Double);
        slot.record_observed(ObservedType::Int);
        assert_eq!(
            slot.observed_mask(),
            ObservedType::Int.bit() | ObservedType::Double.bit()
        );
    }

    #[test]
    fn test_observed_type_classification() {
        assert_eq!(ObservedType::of(Value::int(1).unwrap()), ObservedType::Int);
        assert_eq!(ObservedType::of(Value::double(1.5)), ObservedType::Double);
        assert_eq!(ObservedType::of(Value::bool(true)), ObservedType::Bool);
        assert_eq!(ObservedType::of(Value::object(0)), ObservedType::Object);
        assert_eq!(ObservedType::of(Value::undefined()), ObservedType::Nullish);
        assert_eq!(ObservedType::of(Value::null()), ObservedType::Nullish);
    }

    #[test]
    fn test_feedback_vector_alloc_and_reset() {
        let mut vector = FeedbackVector::new();
        let a = vector.alloc();
        let b = vector.alloc();
        assert_ne!(a, b);
        assert_eq!(vector.len(), 2);

        vector.get_mut(a).update(class(1), field(0));
        assert_eq!(vector.get(a).state(), IcState::Monomorphic);
        assert_eq!(vector.get(b).state(), IcState::Uninitialized);

        vector.reset_all();
        assert_eq!(vector.get(a).state(), IcState::Uninitialized);
    }
}
