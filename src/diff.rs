//! Minimal diff documents and patch application.
//!
//! A diff document is a map with up to three children, `set`/`add`/`rem`,
//! each itself a tree shaped like the documents being compared: a key or
//! `@N` array-index segment at each level either holds a literal leaf value
//! (the thing to set/add, or `Null` to mark a removal) or a nested
//! `set`/`add`/`rem`-shaped subtree describing a change further down an
//! aggregate that exists unchanged in both documents.
//!
//! The two shapes never collide: a literal `set` replacement is only ever
//! emitted for a still-scalar value (an aggregate-typed change is expressed
//! as `rem` + `add` of the whole key instead, see `diff_pair` below), so at
//! apply time a `Map`/`Array` found under `set`/`rem` unambiguously means
//! "recurse". `add` alone needs a target-presence check to disambiguate a
//! literal insert from a nested add (see `apply_add`).

use crate::context::Context;
use crate::error::PatchError;
use crate::value::{Array, Map, Value};
use crate::ZERO_TOLERANCE;

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => (x - y).abs() <= ZERO_TOLERANCE,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => {
            (*x as f64 - y).abs() <= ZERO_TOLERANCE
        }
        (Value::String(x), Value::String(y)) => x.as_str() == y.as_str(),
        _ => false,
    }
}

fn is_aggregate(v: &Value) -> bool {
    v.is_map() || v.is_array()
}

/// Accumulates `set`/`add`/`rem` entries lazily, only materializing a `Map`
/// the first time an entry is recorded for that delta.
struct Delta {
    ctx_keys: crate::key::KeyStore,
    map: Option<Map>,
}

impl Delta {
    fn new(ctx: &Context) -> Self {
        Self {
            ctx_keys: ctx.key_store(),
            map: None,
        }
    }

    fn put(&mut self, segment: &str, value: Value) {
        let map = self
            .map
            .get_or_insert_with(|| Map::new(self.ctx_keys.clone(), true));
        let _ = map.insert(segment, value);
    }

    fn into_value(self) -> Option<Value> {
        self.map.map(Value::Map)
    }
}

struct DiffAcc {
    set: Delta,
    add: Delta,
    rem: Delta,
}

impl DiffAcc {
    fn new(ctx: &Context) -> Self {
        Self {
            set: Delta::new(ctx),
            add: Delta::new(ctx),
            rem: Delta::new(ctx),
        }
    }

    fn merge_child(&mut self, segment: &str, child: (Option<Value>, Option<Value>, Option<Value>)) {
        let (set, add, rem) = child;
        if let Some(v) = set {
            self.set.put(segment, v);
        }
        if let Some(v) = add {
            self.add.put(segment, v);
        }
        if let Some(v) = rem {
            self.rem.put(segment, v);
        }
    }
}

/// Diffs a single `(og, md)` pair that occupy the same path, returning the
/// child `(set, add, rem)` subtrees to attach at that path in the parent.
fn diff_pair(ctx: &Context, og: &Value, md: &Value) -> (Option<Value>, Option<Value>, Option<Value>) {
    if scalar_eq(og, md) {
        return (None, None, None);
    }
    match (og, md) {
        (Value::Map(_), Value::Map(_)) | (Value::Array(_), Value::Array(_)) => {
            let (set, add, rem) = diff_node(ctx, og, md);
            (set, add, rem)
        }
        _ if is_aggregate(og) || is_aggregate(md) => {
            // Type changed to/from an aggregate: never emit an aggregate
            // literal under `set` (ambiguous at apply time). Remove the old
            // key entirely and re-add the new value wholesale instead.
            (None, Some(md.deep_copy(ctx)), Some(Value::Null))
        }
        _ => (Some(md.deep_copy(ctx)), None, None),
    }
}

fn diff_node(ctx: &Context, og: &Value, md: &Value) -> (Option<Value>, Option<Value>, Option<Value>) {
    let mut acc = DiffAcc::new(ctx);

    match (og, md) {
        (Value::Map(om), Value::Map(mm)) => {
            for (k, ov) in om.iter() {
                match mm.find(k) {
                    None => acc.rem.put(k, Value::Null),
                    Some(mv) => acc.merge_child(k, diff_pair(ctx, ov, mv)),
                }
            }
            for (k, mv) in mm.iter() {
                if om.find(k).is_none() {
                    acc.add.put(k, mv.deep_copy(ctx));
                }
            }
        }
        (Value::Array(oa), Value::Array(ma)) => {
            let shared = oa.len().min(ma.len());
            for i in 0..shared {
                let seg = format!("@{i}");
                acc.merge_child(&seg, diff_pair(ctx, oa.get(i).unwrap(), ma.get(i).unwrap()));
            }
            for i in shared..oa.len() {
                acc.rem.put(&format!("@{i}"), Value::Null);
            }
            for i in shared..ma.len() {
                acc.add.put(&format!("@{i}"), ma.get(i).unwrap().deep_copy(ctx));
            }
        }
        _ => unreachable!("diff_node called on a non-matching pair"),
    }

    (acc.set.into_value(), acc.add.into_value(), acc.rem.into_value())
}

/// Computes the minimal `{set, add, rem}` change document turning `original`
/// into `modified`.
pub fn diff(ctx: &Context, original: &Value, modified: &Value) -> Value {
    let (set, add, rem) = diff_node(ctx, original, modified);
    let mut out = Value::Null;
    let m = out.to_map(ctx);
    if let Some(v) = set {
        let _ = m.insert("set", v);
    }
    if let Some(v) = add {
        let _ = m.insert("add", v);
    }
    if let Some(v) = rem {
        let _ = m.insert("rem", v);
    }
    out
}

fn child_mut<'a>(target: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    if let Some(idx) = segment.strip_prefix('@') {
        let n: usize = idx.parse().ok()?;
        target.as_array_mut().ok()?.get_mut(n)
    } else {
        target.as_map_mut().ok()?.find_mut(segment)
    }
}

fn apply_rem(target: &mut Value, rem: &Value) -> Result<(), PatchError> {
    let rem_map = rem.as_map().map_err(|_| PatchError::MissingIntermediate(String::new()))?;
    // Arrays: remove highest index first so earlier indices stay valid.
    let mut segments: Vec<&str> = rem_map.iter().map(|(k, _)| k).collect();
    segments.sort_by_key(|s| std::cmp::Reverse(s.strip_prefix('@').and_then(|n| n.parse::<i64>().ok()).unwrap_or(i64::MIN)));

    for seg in segments {
        let entry = rem_map.find(seg).unwrap();
        if entry.is_null() {
            if let Some(idx) = seg.strip_prefix('@') {
                let n: usize = idx.parse().map_err(|_| PatchError::MissingIntermediate(seg.to_string()))?;
                let arr = target
                    .as_array_mut()
                    .map_err(|_| PatchError::MissingIntermediate(seg.to_string()))?;
                if n < arr.len() {
                    // swap-remove would disturb earlier indices we may still
                    // need to touch in this same pass; descending order (see
                    // above) makes that safe.
                    let mut items: Vec<Value> = std::mem::take(arr).into_iter().collect();
                    items.remove(n);
                    for v in items {
                        let _ = arr.push(v);
                    }
                }
            } else {
                target
                    .as_map_mut()
                    .map_err(|_| PatchError::MissingIntermediate(seg.to_string()))?
                    .remove(seg);
            }
        } else {
            let child = child_mut(target, seg).ok_or_else(|| PatchError::MissingIntermediate(seg.to_string()))?;
            apply_rem(child, entry)?;
        }
    }
    Ok(())
}

/// Duplicates a scalar `Value` without a `Context`. `set` entries are always
/// scalar by `diff_pair`'s own invariant (an aggregate-typed change is
/// expressed as `rem` + `add` instead), so the aggregate arms are unreachable.
fn clone_scalar(v: &Value) -> Value {
    match v {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Int(i) => Value::Int(*i),
        Value::Float(f) => Value::Float(*f),
        Value::String(s) => Value::String(s.clone()),
        Value::Array(_) | Value::Map(_) => unreachable!("apply_set only ever clones scalar entries"),
    }
}

fn apply_set(target: &mut Value, set: &Value) -> Result<(), PatchError> {
    let set_map = set.as_map().map_err(|_| PatchError::MissingIntermediate(String::new()))?;
    for (seg, v) in set_map.iter() {
        if is_aggregate(v) {
            let child = child_mut(target, seg).ok_or_else(|| PatchError::MissingIntermediate(seg.to_string()))?;
            apply_set(child, v)?;
        } else if let Some(idx) = seg.strip_prefix('@') {
            let n: usize = idx.parse().map_err(|_| PatchError::MissingIntermediate(seg.to_string()))?;
            let arr = target
                .as_array_mut()
                .map_err(|_| PatchError::MissingIntermediate(seg.to_string()))?;
            let slot = arr.get_mut(n).ok_or_else(|| PatchError::MissingIntermediate(seg.to_string()))?;
            *slot = clone_scalar(v);
        } else {
            let m = target
                .as_map_mut()
                .map_err(|_| PatchError::MissingIntermediate(seg.to_string()))?;
            let slot = m.find_mut(seg).ok_or_else(|| PatchError::MissingIntermediate(seg.to_string()))?;
            *slot = clone_scalar(v);
        }
    }
    Ok(())
}

fn apply_add(ctx: &Context, target: &mut Value, add: &Value) -> Result<(), PatchError> {
    let add_map = add.as_map().map_err(|_| PatchError::MissingIntermediate(String::new()))?;
    for (seg, v) in add_map.iter() {
        let exists = if let Some(idx) = seg.strip_prefix('@') {
            idx.parse::<usize>().ok().and_then(|n| target.as_array().ok().and_then(|a| a.get(n))).is_some()
        } else {
            target.as_map().ok().and_then(|m| m.find(seg)).is_some()
        };

        if exists {
            let child = child_mut(target, seg).ok_or_else(|| PatchError::MissingIntermediate(seg.to_string()))?;
            apply_add(ctx, child, v)?;
        } else if seg.starts_with('@') {
            let arr = target
                .as_array_mut()
                .map_err(|_| PatchError::MissingIntermediate(seg.to_string()))?;
            arr.push(v.deep_copy(ctx))
                .map_err(|_| PatchError::MissingIntermediate(seg.to_string()))?;
        } else {
            let m = target
                .as_map_mut()
                .map_err(|_| PatchError::MissingIntermediate(seg.to_string()))?;
            m.insert(seg, v.deep_copy(ctx))
                .map_err(|_| PatchError::MissingIntermediate(seg.to_string()))?;
        }
    }
    Ok(())
}

/// Applies `diff` (as produced by `diff`) to a copy of `original`: `rem`
/// first (depth-first, prunes path), then `set` (overwrite), then `add`
/// (create missing entries). Returns the patched copy; `original` is
/// untouched.
pub fn patch(ctx: &Context, original: &Value, diff: &Value) -> Result<Value, PatchError> {
    let mut out = original.deep_copy(ctx);
    let diff_map = diff
        .as_map()
        .map_err(|_| PatchError::MissingIntermediate(String::new()))?;

    if let Some(rem) = diff_map.find("rem") {
        apply_rem(&mut out, rem)?;
    }
    if let Some(set) = diff_map.find("set") {
        apply_set(&mut out, set)?;
    }
    if let Some(add) = diff_map.find("add") {
        apply_add(ctx, &mut out, add)?;
    }

    Ok(out)
}

impl IntoIterator for Array {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::string::StringRepr;

    fn build_map(ctx: &Context, pairs: &[(&str, Value)]) -> Value {
        let mut v = Value::Null;
        let m = v.to_map(ctx);
        for (k, val) in pairs {
            m.insert(k, val.deep_copy(ctx)).unwrap();
        }
        v
    }

    #[test]
    fn diff_then_patch_roundtrips_scenario_5() {
        let ctx = Context::new();
        let og = build_map(&ctx, &[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let md = build_map(
            &ctx,
            &[("a", Value::Int(1)), ("b", Value::Int(3)), ("c", Value::Int(4))],
        );

        let d = diff(&ctx, &og, &md);
        let patched = patch(&ctx, &og, &d).unwrap();
        assert_eq!(patched, md);

        let dm = d.as_map().unwrap();
        assert_eq!(dm.find("set").unwrap().as_map().unwrap().find("b").unwrap().as_int().unwrap(), 3);
        assert_eq!(dm.find("add").unwrap().as_map().unwrap().find("c").unwrap().as_int().unwrap(), 4);
        assert!(dm.find("rem").is_none());
    }

    #[test]
    fn diff_handles_removed_key() {
        let ctx = Context::new();
        let og = build_map(&ctx, &[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let md = build_map(&ctx, &[("a", Value::Int(1))]);

        let d = diff(&ctx, &og, &md);
        let patched = patch(&ctx, &og, &d).unwrap();
        assert_eq!(patched, md);
    }

    #[test]
    fn diff_recurses_into_nested_maps() {
        let ctx = Context::new();
        let inner_og = build_map(&ctx, &[("x", Value::Int(1))]);
        let inner_md = build_map(&ctx, &[("x", Value::Int(1)), ("y", Value::Int(2))]);
        let og = build_map(&ctx, &[("nested", inner_og)]);
        let md = build_map(&ctx, &[("nested", inner_md)]);

        let d = diff(&ctx, &og, &md);
        let patched = patch(&ctx, &og, &d).unwrap();
        assert_eq!(patched, md);
    }

    #[test]
    fn diff_type_change_uses_rem_and_add_not_ambiguous_set() {
        let ctx = Context::new();
        let og = build_map(&ctx, &[("a", Value::Int(1))]);
        let mut md = Value::Null;
        md.to_map(&ctx).insert("a", build_map(&ctx, &[("x", Value::Int(9))])).unwrap();

        let d = diff(&ctx, &og, &md);
        let patched = patch(&ctx, &og, &d).unwrap();
        assert_eq!(patched, md);
    }

    #[test]
    fn diff_array_tail_add_and_value_roundtrip() {
        let ctx = Context::new();
        let mut og = Value::Null;
        og.to_array(&ctx);
        og.as_array_mut().unwrap().push(Value::String(StringRepr::from_str("x"))).unwrap();

        let mut md = Value::Null;
        md.to_array(&ctx);
        md.as_array_mut().unwrap().push(Value::String(StringRepr::from_str("x"))).unwrap();
        md.as_array_mut().unwrap().push(Value::String(StringRepr::from_str("y"))).unwrap();

        let d = diff(&ctx, &og, &md);
        let patched = patch(&ctx, &og, &d).unwrap();
        assert_eq!(patched, md);
    }
}
