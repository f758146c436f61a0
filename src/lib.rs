//! A dynamically-typed, in-memory document value tree with small-value
//! optimizations, a key interning store, a dotted-path query engine,
//! diff/patch, and pluggable JSON/MessagePack codecs.
//!
//! See `SPEC_FULL.md` in the repository root for the full design.

pub mod buffer;
pub mod codec;
pub mod context;
pub mod diff;
pub mod error;
pub mod key;
pub mod string;
pub mod value;

pub use buffer::{InputCursor, OutputBuffer};
pub use codec::Codec;
pub use context::{Context, ContextConfig};
pub use error::{BufferError, CodecError, KeyError, MapError, PatchError, ValueError};
pub use value::{Array, Map, MapCursor, Value};

/// Maximum byte length of a map key.
pub const MAX_KEY_LENGTH: usize = 127;

/// Maximum tree depth honored by the path engine, the codec readers, and
/// the diff/patch path stack.
pub const MAX_TREE_DEPTH: usize = 64;

/// Absolute tolerance used for float comparisons in `diff` and in the
/// testable-property round-trip checks.
pub const ZERO_TOLERANCE: f64 = 1.0e-7;

impl Value {
    /// Encodes `self` into `out` using `codec`.
    pub fn encode(&self, codec: Codec, out: &mut OutputBuffer) -> Result<(), CodecError> {
        match codec {
            Codec::Json => codec::json::encode(out, self),
            Codec::MsgPack => codec::msgpack::encode_value(out, self),
        }
    }

    /// Decodes a new tree from `bytes` using `codec`, interning keys into
    /// `ctx`.
    pub fn decode(ctx: &Context, codec: Codec, bytes: &[u8]) -> Result<Value, CodecError> {
        match codec {
            Codec::Json => codec::json::decode(ctx, bytes),
            Codec::MsgPack => codec::msgpack::decode(ctx, bytes),
        }
    }

    /// Computes the minimal `{set, add, rem}` change document turning
    /// `self` into `modified`.
    pub fn diff(&self, ctx: &Context, modified: &Value) -> Value {
        diff::diff(ctx, self, modified)
    }

    /// Applies a diff document (as produced by `diff`) to a copy of `self`.
    pub fn patch(&self, ctx: &Context, diff: &Value) -> Result<Value, PatchError> {
        diff::patch(ctx, self, diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_value_starts_null() {
        let ctx = Context::new();
        let v = ctx.create_value();
        assert!(v.is_null());
    }
}
