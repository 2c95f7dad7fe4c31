//! Indexed-property storage layouts.
//!
//! Every object's hidden class carries an [`ElementsKind`] tag. Keyed access
//! dispatches on this tag alone — never by inspecting stored values — so the
//! set of kinds is closed and enumerable.

use rustc_hash::FxHashMap;
use vesper_core::Value;

// =============================================================================
// Elements Kind
// =============================================================================

/// The closed set of indexed-storage layouts.
///
/// The typed kinds select the correctly-typed load/store routine for
/// typed-array backing stores; `Dictionary` marks sparse storage that the
/// caches refuse to memoize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementsKind {
    /// No indexed properties (named-only objects).
    None = 0,
    /// Contiguous array of tagged values.
    Packed = 1,
    /// Sparse map storage. Uncacheable.
    Dictionary = 2,
    /// String receivers: index reads yield single-character strings.
    StringChars = 3,
    /// Typed array of `i8`.
    Int8 = 4,
    /// Typed array of `u8`.
    Uint8 = 5,
    /// Typed array of `u8`, stores clamped to `[0, 255]`.
    Uint8Clamped = 6,
    /// Typed array of `i16`.
    Int16 = 7,
    /// Typed array of `u16`.
    Uint16 = 8,
    /// Typed array of `i32`.
    Int32 = 9,
    /// Typed array of `u32`.
    Uint32 = 10,
    /// Typed array of `f32`.
    Float32 = 11,
    /// Typed array of `f64`.
    Float64 = 12,
}

impl ElementsKind {
    /// Check for a typed-array kind.
    #[inline]
    pub const fn is_typed(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Uint8
                | Self::Uint8Clamped
                | Self::Int16
                | Self::Uint16
                | Self::Int32
                | Self::Uint32
                | Self::Float32
                | Self::Float64
        )
    }

    /// Check for a kind the caches may memoize element handlers for.
    #[inline]
    pub const fn is_cacheable(self) -> bool {
        !matches!(self, Self::Dictionary)
    }

    /// Element width in bytes for typed kinds, 0 otherwise.
    #[inline]
    pub const fn element_size(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 | Self::Uint8Clamped => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
            _ => 0,
        }
    }
}

// =============================================================================
// Element Store
// =============================================================================

/// The per-object backing store matching the class's elements kind.
#[derive(Debug, Clone)]
pub enum ElementStore {
    /// No indexed storage.
    Empty,
    /// Contiguous tagged values.
    Packed(Vec<Value>),
    /// Sparse index → value map.
    Dictionary(FxHashMap<u32, Value>),
    /// Raw little-endian bytes interpreted per the typed kind.
    Typed {
        /// The concrete typed kind (fixed for the store's lifetime).
        kind: ElementsKind,
        /// Backing bytes, `len * kind.element_size()` long.
        data: Vec<u8>,
    },
}

impl ElementStore {
    /// Create a typed store of `len` zeroed elements.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is not a typed kind.
    pub fn typed(kind: ElementsKind, len: usize) -> Self {
        assert!(kind.is_typed(), "not a typed elements kind: {kind:?}");
        Self::Typed {
            kind,
            data: vec![0; len * kind.element_size()],
        }
    }

    /// Number of elements present.
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Packed(v) => v.len(),
            Self::Dictionary(m) => m.len(),
            Self::Typed { kind, data } => data.len() / kind.element_size(),
        }
    }

    /// Check for an empty store.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the element at `index`, or `None` if absent/out of range.
    pub fn load(&self, index: u32) -> Option<Value> {
        match self {
            Self::Empty => None,
            Self::Packed(v) => v.get(index as usize).copied(),
            Self::Dictionary(m) => m.get(&index).copied(),
            Self::Typed { kind, data } => typed_load(*kind, data, index as usize),
        }
    }

    /// Store `value` at `index`.
    ///
    /// Packed stores grow by exactly one (appending); beyond-the-end writes
    /// return `false` so the caller can fall back to dictionary conversion.
    /// Typed stores return `false` when `value` is not numeric or the index
    /// is out of range.
    pub fn store(&mut self, index: u32, value: Value) -> bool {
        match self {
            Self::Empty => false,
            Self::Packed(v) => {
                let idx = index as usize;
                if idx < v.len() {
                    v[idx] = value;
                    true
                } else if idx == v.len() {
                    v.push(value);
                    true
                } else {
                    false
                }
            }
            Self::Dictionary(m) => {
                m.insert(index, value);
                true
            }
            Self::Typed { kind, data } => {
                let Some(n) = value.as_number() else {
                    return false;
                };
                typed_store(*kind, data, index as usize, n)
            }
        }
    }
}

/// Typed load routine, selected by the kind tag.
#[allow(clippy::cast_precision_loss)]
fn typed_load(kind: ElementsKind, data: &[u8], index: usize) -> Option<Value> {
    let size = kind.element_size();
    let bytes = data.get(index * size..index * size + size)?;
    let value = match kind {
        ElementsKind::Int8 => Value::int_unchecked(i64::from(bytes[0] as i8)),
        ElementsKind::Uint8 | ElementsKind::Uint8Clamped => {
            Value::int_unchecked(i64::from(bytes[0]))
        }
        ElementsKind::Int16 => {
            Value::int_unchecked(i64::from(i16::from_le_bytes([bytes[0], bytes[1]])))
        }
        ElementsKind::Uint16 => {
            Value::int_unchecked(i64::from(u16::from_le_bytes([bytes[0], bytes[1]])))
        }
        ElementsKind::Int32 => Value::int_unchecked(i64::from(i32::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]))),
        ElementsKind::Uint32 => Value::int_unchecked(i64::from(u32::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]))),
        ElementsKind::Float32 => Value::double(f64::from(f32::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]))),
        ElementsKind::Float64 => Value::double(f64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])),
        _ => return None,
    };
    Some(value)
}

/// Typed store routine, selected by the kind tag.
///
/// Conversion follows typed-array semantics: integral kinds truncate modulo
/// their width, `Uint8Clamped` saturates, float kinds round-trip the double.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn typed_store(kind: ElementsKind, data: &mut [u8], index: usize, n: f64) -> bool {
    let size = kind.element_size();
    let Some(bytes) = data.get_mut(index * size..index * size + size) else {
        return false;
    };
    match kind {
        ElementsKind::Int8 => bytes[0] = (to_int32(n) as i8) as u8,
        ElementsKind::Uint8 => bytes[0] = to_int32(n) as u8,
        ElementsKind::Uint8Clamped => bytes[0] = clamp_u8(n),
        ElementsKind::Int16 => bytes.copy_from_slice(&(to_int32(n) as i16).to_le_bytes()),
        ElementsKind::Uint16 => bytes.copy_from_slice(&(to_int32(n) as u16).to_le_bytes()),
        ElementsKind::Int32 => bytes.copy_from_slice(&to_int32(n).to_le_bytes()),
        ElementsKind::Uint32 => bytes.copy_from_slice(&(to_int32(n) as u32).to_le_bytes()),
        ElementsKind::Float32 => bytes.copy_from_slice(&(n as f32).to_le_bytes()),
        ElementsKind::Float64 => bytes.copy_from_slice(&n.to_le_bytes()),
        _ => return false,
    }
    true
}

/// ToInt32 conversion (modular, NaN/Infinity → 0).
#[allow(clippy::cast_possible_truncation)]
fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let m = n.trunc() % 4_294_967_296.0;
    let m = if m < 0.0 { m + 4_294_967_296.0 } else { m };
    if m >= 2_147_483_648.0 {
        (m - 4_294_967_296.0) as i32
    } else {
        m as i32
    }
}

/// Uint8Clamped conversion: saturate to [0, 255], round half to even.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_u8(n: f64) -> u8 {
    if n.is_nan() || n <= 0.0 {
        0
    } else if n >= 255.0 {
        255
    } else {
        n.round_ties_even() as u8
    }
}

// =============================================================================
// Tests
// =============================================================================
