//! String and symbol interning for O(1) identity equality.
//!
//! Property names are interned once and compared by pointer thereafter. The
//! interner stores each unique string together with a content hash computed
//! at intern time; the hash lives in the string header and is read directly
//! by the cache layers, never recomputed on the hot path.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// =============================================================================
// Interned Strings
// =============================================================================

/// Header-plus-payload storage for one interned string.
///
/// The hash field is redundant with the text but is the only part the cache
/// hot path touches.
struct StrData {
    /// Content hash, computed once at intern time.
    hash: u32,
    /// The string text.
    text: Box<str>,
}

/// A handle to an interned string.
///
/// `InternedStr` is a thin wrapper around an `Arc` of the interner-owned
/// string data. Two handles are equal iff they point at the same data, so
/// equality is a single pointer comparison.
#[derive(Clone)]
pub struct InternedStr {
    inner: Arc<StrData>,
}

impl InternedStr {
    #[inline]
    fn new(inner: Arc<StrData>) -> Self {
        Self { inner }
    }

    /// Get the string content.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.inner.text
    }

    /// Length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.text.len()
    }

    /// Check if the string is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.text.is_empty()
    }

    /// The content hash stored in the string header.
    ///
    /// Read directly; never recomputed.
    #[inline]
    #[must_use]
    pub fn header_hash(&self) -> u32 {
        self.inner.hash
    }

    /// Stable data pointer, for NaN-boxing into a [`crate::Value`] and for
    /// identity hashing. The interner owns the data for the process
    /// lifetime, so the pointer never dangles.
    #[inline]
    #[must_use]
    pub fn raw_ptr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl PartialEq for InternedStr {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for InternedStr {}

impl Hash for InternedStr {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw_ptr().hash(state);
    }
}

impl fmt::Debug for InternedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InternedStr({:?})", self.as_str())
    }
}

impl fmt::Display for InternedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for InternedStr {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::ops::Deref for InternedStr {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl PartialEq<str> for InternedStr {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for InternedStr {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Compute the content hash stored in a string header.
#[inline]
fn content_hash(s: &str) -> u32 {
    let mut hasher = FxHasher::default();
    s.hash(&mut hasher);
    // Fold to 32 bits; the cache mixing function widens again as needed.
    let h = hasher.finish();
    #[allow(clippy::cast_possible_truncation)]
    let folded = (h ^ (h >> 32)) as u32;
    folded
}

/// Thread-safe string interner.
///
/// Interning the same text twice returns the same handle. A secondary map
/// keyed by data pointer resolves NaN-boxed string payloads back to handles.
pub struct StringInterner {
    maps: RwLock<InternerMaps>,
}

struct InternerMaps {
    by_value: FxHashMap<Box<str>, InternedStr>,
    by_ptr: FxHashMap<usize, InternedStr>,
}

impl StringInterner {
    /// Create a new, empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(InternerMaps {
                by_value: FxHashMap::default(),
                by_ptr: FxHashMap::default(),
            }),
        }
    }

    /// Intern a string, returning its canonical handle.
    pub fn intern(&self, s: &str) -> InternedStr {
        {
            let maps = self.maps.read();
            if let Some(existing) = maps.by_value.get(s) {
                return existing.clone();
            }
        }

        let mut maps = self.maps.write();
        // Re-check under the write lock; another thread may have won.
        if let Some(existing) = maps.by_value.get(s) {
            return existing.clone();
        }

        let handle = InternedStr::new(Arc::new(StrData {
            hash: content_hash(s),
            text: s.into(),
        }));
        maps.by_value.insert(s.into(), handle.clone());
        maps.by_ptr.insert(handle.raw_ptr(), handle.clone());
        handle
    }

    /// Resolve a NaN-boxed string payload back to its handle.
    #[must_use]
    pub fn resolve_ptr(&self, ptr: usize) -> Option<InternedStr> {
        self.maps.read().by_ptr.get(&ptr).cloned()
    }

    /// Number of distinct strings interned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.read().by_value.len()
    }

    /// Check if no strings have been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringInterner")
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// Symbols
// =============================================================================

/// A symbol: a unique, optionally-described property key.
///
/// Equality is by id; ids are allocated monotonically and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    id: u32,
    description: Option<InternedStr>,
}

impl Symbol {
    /// The symbol's unique id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// The symbol's description, if any.
    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&InternedStr> {
        self.description.as_ref()
    }
}

/// Allocates symbols and resolves ids back to them.
pub struct SymbolRegistry {
    symbols: RwLock<Vec<Symbol>>,
}

impl SymbolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            symbols: RwLock::new(Vec::new()),
        }
    }

    /// Allocate a fresh symbol.
    pub fn create(&self, description: Option<InternedStr>) -> Symbol {
        let mut symbols = self.symbols.write();
        #[allow(clippy::cast_possible_truncation)]
        let id = symbols.len() as u32;
        let symbol = Symbol { id, description };
        symbols.push(symbol.clone());
        symbol
    }

    /// Resolve an id to its symbol.
    #[must_use]
    pub fn resolve(&self, id: u32) -> Option<Symbol> {
        self.symbols.read().get(id as usize).cloned()
    }

    /// Number of symbols allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    /// Check if no symbols have been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SymbolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolRegistry")
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedup() {
        let interner = StringInterner::new();
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        assert_eq!(a, b);
        assert_eq!(a.raw_ptr(), b.raw_ptr());
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn test_intern_distinct() {
        let interner = StringInterner::new();
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        assert_ne!(a, b);
        assert_ne!(a.raw_ptr(), b.raw_ptr());
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_header_hash_stable() {
        let interner = StringInterner::new();
        let a = interner.intern("prop");
        let b = interner.intern("prop");
        assert_eq!(a.header_hash(), b.header_hash());
        // Re-interning must not recompute into a different value.
        assert_eq!(a.header_hash(), content_hash("prop"));
    }

    #[test]
    fn test_resolve_ptr() {
        let interner = StringInterner::new();
        let a = interner.intern("name");
        let resolved = interner.resolve_ptr(a.raw_ptr()).unwrap();
        assert_eq!(resolved, a);
        assert!(interner.resolve_ptr(0xdead_beef).is_none());
    }

    #[test]
    fn test_interned_str_api() {
        let interner = StringInterner::new();
        let s = interner.intern("hello");
        assert_eq!(s.as_str(), "hello");
        assert_eq!(s.len(), 5);
        assert!(!s.is_empty());
        assert_eq!(s, "hello");
        assert_eq!(format!("{s}"), "hello");
    }

    #[test]
    fn test_symbol_identity() {
        let registry = SymbolRegistry::new();
        let interner = StringInterner::new();
        let desc = interner.intern("iterator");
        let a = registry.create(Some(desc.clone()));
        let b = registry.create(Some(desc));
        // Same description, distinct identity.
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_symbol_resolve() {
        let registry = SymbolRegistry::new();
        let s = registry.create(None);
        assert_eq!(registry.resolve(s.id()), Some(s));
        assert!(registry.resolve(999).is_none());
    }
}
