//! Per-context key interning store.
//!
//! Keys are reference-counted via `Rc`; the store itself only ever holds a
//! `Weak` handle, so the last `Rc<KeyEntry>` dropping (a map removing a pair,
//! or the map itself dropping) is what evicts the entry — there is no
//! explicit `release()` call anywhere in this crate.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hasher};
use std::rc::{Rc, Weak};

use crate::error::KeyError;
use crate::MAX_KEY_LENGTH;

/// djb2 hasher (`h = ((h<<5)+h)+c`, seed 5381), matching the interning
/// algorithm's hash function.
#[derive(Default)]
pub struct DjbHasher(u64);

impl Hasher for DjbHasher {
    fn write(&mut self, bytes: &[u8]) {
        let mut h = if self.0 == 0 { 5381 } else { self.0 };
        for &b in bytes {
            h = (h << 5).wrapping_add(h).wrapping_add(b as u64);
        }
        self.0 = h;
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

type DjbBuildHasher = BuildHasherDefault<DjbHasher>;

/// The interned key entry. Holds the string contents and a back-reference to
/// its owning store so it can evict itself from the table on drop.
pub struct KeyEntry {
    bytes: Box<str>,
    store: Weak<RefCell<KeyStoreInner>>,
}

impl KeyEntry {
    pub fn as_str(&self) -> &str {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for KeyEntry {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.borrow_mut().table.remove(&*self.bytes);
            tracing::trace!(key = %self.bytes, "key evicted at refcount 0");
        }
    }
}

impl std::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("KeyEntry").field(&self.bytes).finish()
    }
}

impl PartialEq for KeyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

/// A reference-counted interned key. Two keys interned from equal byte
/// strings in the same context are `Rc::ptr_eq`.
pub type Key = Rc<KeyEntry>;

#[derive(Default)]
struct KeyStoreInner {
    table: HashMap<Box<str>, Weak<KeyEntry>, DjbBuildHasher>,
}

/// Per-context interning table. Shared (`Rc<RefCell<_>>`) so that `KeyEntry`
/// can hold a back-reference for self-eviction without the context needing
/// to scan for dead keys itself.
#[derive(Clone, Default)]
pub struct KeyStore(Rc<RefCell<KeyStoreInner>>);

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning a shared handle. Equal byte strings interned
    /// twice return `Rc::clone`s of the same entry (refcount increment).
    pub fn intern(&self, s: &str) -> Result<Key, KeyError> {
        if s.len() > MAX_KEY_LENGTH {
            return Err(KeyError::TooLong { len: s.len() });
        }

        let mut inner = self.0.borrow_mut();
        if let Some(existing) = inner.table.get(s).and_then(Weak::upgrade) {
            tracing::trace!(key = s, "key intern hit");
            return Ok(existing);
        }

        let entry = Rc::new(KeyEntry {
            bytes: s.into(),
            store: Rc::downgrade(&self.0),
        });
        inner.table.insert(entry.bytes.clone(), Rc::downgrade(&entry));
        tracing::trace!(key = s, "key intern miss, allocated");
        Ok(entry)
    }

    /// Number of currently live (refcount > 0) keys. Used to verify the
    /// create/destroy key-store-size invariant.
    pub fn len(&self) -> usize {
        self.0.borrow().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_returns_same_entry_for_equal_strings() {
        let store = KeyStore::new();
        let a = store.intern("hello").unwrap();
        let b = store.intern("hello").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn key_evicted_when_last_handle_drops() {
        let store = KeyStore::new();
        let a = store.intern("evict-me").unwrap();
        assert_eq!(store.len(), 1);
        drop(a);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn intern_rejects_oversized_keys() {
        let store = KeyStore::new();
        let long = "x".repeat(MAX_KEY_LENGTH + 1);
        assert!(matches!(store.intern(&long), Err(KeyError::TooLong { .. })));
        let exact = "x".repeat(MAX_KEY_LENGTH);
        assert!(store.intern(&exact).is_ok());
    }

    #[test]
    fn djb_hasher_matches_reference_algorithm() {
        let mut h = DjbHasher::default();
        h.write(b"hello");
        let mut expected: u64 = 5381;
        for b in b"hello" {
            expected = (expected << 5).wrapping_add(expected).wrapping_add(*b as u64);
        }
        assert_eq!(h.finish(), expected);
    }
}
