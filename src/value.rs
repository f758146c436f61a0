//! The tagged-union value tree: maps, arrays, strings, numbers, bools, null.

use crate::context::Context;
use crate::error::{MapError, ValueError};
use crate::key::{Key, KeyStore};
use crate::string::StringRepr;
use crate::MAX_TREE_DEPTH;

/// An unordered `(Key, Value)` collection. Maps are context-scoped: they
/// intern every key they hold against the `KeyStore` they were created with.
pub struct Map {
    store: KeyStore,
    pairs: Vec<(Key, Value)>,
    fast_insert: bool,
}

impl Map {
    pub(crate) fn new(store: KeyStore, fast_insert: bool) -> Self {
        Self {
            store,
            pairs: Vec::new(),
            fast_insert,
        }
    }

    /// Interns `key` and appends the pair. Rejects a duplicate key unless
    /// the owning context was configured with `fast_map_insert`.
    pub fn insert(&mut self, key: &str, value: Value) -> Result<(), MapError> {
        if !self.fast_insert && self.find(key).is_some() {
            return Err(MapError::DuplicateKey);
        }
        if self.pairs.len() >= u32::MAX as usize {
            return Err(MapError::SizeExceeded);
        }
        let k = self.store.intern(key)?;
        self.pairs.push((k, value));
        Ok(())
    }

    pub fn find(&self, key: &str) -> Option<&Value> {
        self.pairs
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.pairs
            .iter_mut()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    /// Removes the pair, compacting by swap-with-last. Map iteration order
    /// is not preserved across removal.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.pairs.iter().position(|(k, _)| k.as_str() == key)?;
        Some(self.pairs.swap_remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Borrowing iterator over `(key, value)` pairs in storage order. Its
    /// lifetime ties it to this borrow, so `insert`/`remove` cannot be
    /// called while a cursor is alive — enforced by the borrow checker, not
    /// a runtime check.
    pub fn iter(&self) -> MapCursor<'_> {
        MapCursor {
            inner: self.pairs.iter(),
        }
    }
}

impl Clone for Map {
    fn clone(&self) -> Self {
        // Re-interns every key into the same store (refcount increments);
        // this is the `deep_copy` contract applied to a bare `Map`. Child
        // values are cloned via `clone_value`, not `Value::clone` — `Value`
        // does not implement `Clone` (see its definition below).
        let mut out = Map::new(self.store.clone(), self.fast_insert);
        for (k, v) in &self.pairs {
            out.pairs.push((
                self.store.intern(k.as_str()).expect("already-valid key re-interns"),
                clone_value(v, &self.store, self.fast_insert),
            ));
        }
        out
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.pairs
            .iter()
            .all(|(k, v)| other.find(k.as_str()) == Some(v))
    }
}

impl std::fmt::Debug for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.pairs.iter().map(|(k, v)| (k.as_str(), v)))
            .finish()
    }
}

/// Immutable iterator over a map's pairs, valid until the borrow ends.
pub struct MapCursor<'a> {
    inner: std::slice::Iter<'a, (Key, Value)>,
}

impl<'a> Iterator for MapCursor<'a> {
    type Item = (&'a str, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_str(), v))
    }
}

/// An ordered element array. Not `Clone` — see `Value`'s definition below for
/// why; use `Value::deep_copy` to duplicate an array that may hold maps.
#[derive(Debug, PartialEq, Default)]
pub struct Array {
    items: Vec<Value>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value`. Fails once the array holds `u32::MAX` elements.
    pub fn push(&mut self, value: Value) -> Result<(), ValueError> {
        if self.items.len() >= u32::MAX as usize {
            return Err(ValueError::SizeExceeded);
        }
        self.items.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.items.pop()
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.items.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Value> {
        self.items.get_mut(i)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.items
    }
}

/// Recursively duplicates `v`, re-interning any map keys into `store`. The
/// replacement for a derived `Value: Clone` — it threads the `KeyStore`
/// instead of relying on a trait that can't see one.
fn clone_value(v: &Value, store: &KeyStore, fast_insert: bool) -> Value {
    match v {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Int(i) => Value::Int(*i),
        Value::Float(f) => Value::Float(*f),
        Value::String(s) => Value::String(s.clone()),
        Value::Array(a) => {
            let mut out = Array::new();
            for item in a.iter() {
                // Source array already satisfies the size invariant.
                let _ = out.push(clone_value(item, store, fast_insert));
            }
            Value::Array(out)
        }
        Value::Map(m) => {
            let mut out = Map::new(store.clone(), fast_insert);
            for (k, v) in m.iter() {
                let _ = out.insert(k, clone_value(v, store, fast_insert));
            }
            Value::Map(out)
        }
    }
}

/// The tagged value tree node.
///
/// Deliberately not `Clone`: cloning a map-bearing value must re-intern its
/// keys, which needs a `KeyStore` (a bare `Context` doesn't have to be in
/// scope at every call site that touches a `Value`). Use `deep_copy`, which
/// takes the `Context` to re-intern into explicitly.
#[derive(Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(StringRepr),
    Array(Array),
    Map(Map),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }
    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Asserts the conversion `ctx`'s config permits: a typed setter is only
    /// a logic error when it overwrites an existing value of a *different*,
    /// non-null tag while `implicit_type_conversion` is off. Building up a
    /// fresh (`Null`) value or re-applying the same tag is always fine.
    fn check_implicit_conversion(&self, ctx: &Context, target: &'static str) {
        debug_assert!(
            ctx.config().implicit_type_conversion || self.is_null() || self.type_name() == target,
            "implicit type conversion disabled: cannot convert {} to {target}",
            self.type_name()
        );
    }

    // --- conversions -----------------------------------------------------

    /// Destructs the current payload (if any) and becomes an empty map. A
    /// no-op if already a map.
    pub fn to_map(&mut self, ctx: &Context) -> &mut Map {
        self.check_implicit_conversion(ctx, "map");
        if !self.is_map() {
            *self = Value::Map(Map::new(ctx.key_store(), ctx.config().fast_map_insert));
        }
        match self {
            Value::Map(m) => m,
            _ => unreachable!(),
        }
    }

    /// Destructs the current payload (if any) and becomes an empty array. A
    /// no-op if already an array.
    pub fn to_array(&mut self, ctx: &Context) -> &mut Array {
        self.check_implicit_conversion(ctx, "array");
        if !self.is_array() {
            *self = Value::Array(Array::new());
        }
        match self {
            Value::Array(a) => a,
            _ => unreachable!(),
        }
    }

    pub fn set_string(&mut self, ctx: &Context, s: &str) {
        self.check_implicit_conversion(ctx, "string");
        *self = Value::String(StringRepr::from_str(s));
    }

    pub fn set_string_move(&mut self, ctx: &Context, s: String) {
        self.check_implicit_conversion(ctx, "string");
        *self = Value::String(StringRepr::from_string(s));
    }

    pub fn set_int(&mut self, ctx: &Context, i: i64) {
        self.check_implicit_conversion(ctx, "int");
        *self = Value::Int(i);
    }

    pub fn set_float(&mut self, ctx: &Context, f: f64) {
        self.check_implicit_conversion(ctx, "float");
        *self = Value::Float(f);
    }

    pub fn set_bool(&mut self, ctx: &Context, b: bool) {
        self.check_implicit_conversion(ctx, "bool");
        *self = Value::Bool(b);
    }

    pub fn set_null(&mut self, ctx: &Context) {
        self.check_implicit_conversion(ctx, "null");
        *self = Value::Null;
    }

    // --- getters -----------------------------------------------------

    pub fn as_bool(&self) -> Result<bool, ValueError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ValueError::WrongType {
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_int(&self) -> Result<i64, ValueError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(ValueError::WrongType {
                expected: "int",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_float(&self) -> Result<f64, ValueError> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(ValueError::WrongType {
                expected: "float",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str, ValueError> {
        match self {
            Value::String(s) => Ok(s.as_str()),
            other => Err(ValueError::WrongType {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_map(&self) -> Result<&Map, ValueError> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(ValueError::WrongType {
                expected: "map",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_map_mut(&mut self) -> Result<&mut Map, ValueError> {
        let name = self.type_name();
        match self {
            Value::Map(m) => Ok(m),
            _ => Err(ValueError::WrongType {
                expected: "map",
                found: name,
            }),
        }
    }

    pub fn as_array(&self) -> Result<&Array, ValueError> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(ValueError::WrongType {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Array, ValueError> {
        let name = self.type_name();
        match self {
            Value::Array(a) => Ok(a),
            _ => Err(ValueError::WrongType {
                expected: "array",
                found: name,
            }),
        }
    }

    /// Deep-copies `self`, re-interning every key into `ctx`.
    pub fn deep_copy(&self, ctx: &Context) -> Value {
        clone_value(self, &ctx.key_store(), ctx.config().fast_map_insert)
    }

    /// Stable, order-independent hash for maps, order-dependent for arrays.
    pub fn hashcode(&self, seed: u64) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut h = std::collections::hash_map::DefaultHasher::new();
        seed.hash(&mut h);
        self.hash_into(&mut h);
        h.finish()
    }

    fn hash_into<H: std::hash::Hasher>(&self, h: &mut H) {
        use std::hash::Hash;
        std::mem::discriminant(self).hash(h);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(h),
            Value::Int(i) => i.hash(h),
            Value::Float(f) => f.to_bits().hash(h),
            Value::String(s) => s.as_str().hash(h),
            Value::Array(a) => {
                for v in a.iter() {
                    v.hash_into(h);
                }
            }
            Value::Map(m) => {
                // Order-independent: fold each pair's hash with XOR rather
                // than feeding them sequentially into `h`.
                let mut acc: u64 = 0;
                for (k, v) in m.iter() {
                    let mut pair_hasher = std::collections::hash_map::DefaultHasher::new();
                    k.hash(&mut pair_hasher);
                    v.hash_into(&mut pair_hasher);
                    acc ^= std::hash::Hasher::finish(&pair_hasher);
                }
                acc.hash(h);
            }
        }
    }

    // --- path queries ------------------------------------------------

    /// Evaluates a dotted path expression (`a.b`, `@N` array index, leading
    /// `.` allowed). Fails early to `None` on type mismatch, missing key, or
    /// out-of-range index.
    pub fn search(&self, expr: &str) -> Option<&Value> {
        let segments: Vec<&str> = expr
            .trim_start_matches('.')
            .split('.')
            .filter(|s| !s.is_empty())
            .collect();
        self.search_segments(&segments)
    }

    pub fn search_segments(&self, segments: &[&str]) -> Option<&Value> {
        if segments.len() > MAX_TREE_DEPTH {
            return None;
        }
        let mut cur = self;
        for seg in segments {
            cur = if let Some(idx) = seg.strip_prefix('@') {
                let n: usize = idx.parse().ok()?;
                cur.as_array().ok()?.get(n)?
            } else {
                cur.as_map().ok()?.find(seg)?
            };
        }
        Some(cur)
    }

    // --- approximate size (§4.5) --------------------------------------

    /// Upper-estimate of encoded length, letting callers pre-size an
    /// `OutputBuffer` to avoid growth thrashing. Both codecs share the same
    /// formula; MsgPack's typed length-value framing is close enough in
    /// practice that a single estimator suffices (it never needs to be
    /// exact, only an upper bound).
    pub fn approx_encode_size(&self, _codec: crate::codec::Codec) -> usize {
        crate::codec::json::approx_encode_size(self)
    }
}
