//! Per-tree allocation/interning scope.

use crate::key::KeyStore;
use crate::value::Value;

/// Builder-style configuration mirroring the source's
/// `KVR_OPTIMIZATION_*` toggles.
#[derive(Debug, Clone, Copy)]
pub struct ContextConfig {
    /// When `true` (default), typed setters (`set_int`, `to_map`, …)
    /// implicitly convert the value's current tag first. When `false`,
    /// calling a typed setter on a mismatched tag is a logic error.
    pub implicit_type_conversion: bool,
    /// When `true`, `Map::insert` allows duplicate keys instead of
    /// rejecting them. Default `false` (strict).
    pub fast_map_insert: bool,
    /// When `true`, `Map::remove` compacts immediately (this is always the
    /// behavior of the swap-remove strategy; the flag is kept for parity
    /// with the source's naming and to gate future batched-removal work).
    pub fast_map_remove: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            implicit_type_conversion: true,
            fast_map_insert: false,
            fast_map_remove: false,
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn implicit_type_conversion(mut self, on: bool) -> Self {
        self.implicit_type_conversion = on;
        self
    }

    pub fn fast_map_insert(mut self, on: bool) -> Self {
        self.fast_map_insert = on;
        self
    }

    pub fn fast_map_remove(mut self, on: bool) -> Self {
        self.fast_map_remove = on;
        self
    }
}

/// Owns the key store for one document tree. Single-threaded by design
/// (`Rc`-backed, not `Arc`): `Context` is `!Send + !Sync`.
pub struct Context {
    keys: KeyStore,
    config: ContextConfig,
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        tracing::debug!(?config, "context created");
        Self {
            keys: KeyStore::new(),
            config,
        }
    }

    pub fn create_value(&self) -> Value {
        Value::Null
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub(crate) fn key_store(&self) -> KeyStore {
        self.keys.clone()
    }

    /// Number of currently interned keys. Diagnostic; used by the
    /// create/destroy key-store-size testable property.
    pub fn key_store_len(&self) -> usize {
        self.keys.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_store_size_unchanged_after_create_and_drop() {
        let ctx = Context::new();
        let before = ctx.key_store_len();
        {
            let mut v = ctx.create_value();
            v.to_map(&ctx).insert("k", Value::Int(1)).unwrap();
        }
        assert_eq!(ctx.key_store_len(), before);
    }
}
