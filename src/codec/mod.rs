//! Wire codecs sharing one push-down tree builder and one output-buffer
//! writing discipline.

pub mod json;
pub mod msgpack;

use crate::context::Context;
use crate::error::CodecError;
use crate::value::{Array, Map, Value};
use crate::MAX_TREE_DEPTH;

/// Which wire format to use. CBOR is named in the external contract as a
/// future slot sharing this same builder/writer plumbing but has no
/// implementation yet (see SPEC_FULL.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Json,
    MsgPack,
}

enum Frame {
    Map(Map),
    Array(Array),
}

/// Push-down builder driving tree construction from an event-shaped reader:
/// a depth-bounded stack of in-progress containers plus a single pending
/// map-key slot, mirroring the source's `json_read_context`.
pub struct TreeBuilder<'ctx> {
    ctx: &'ctx Context,
    stack: Vec<Frame>,
    pending_key: Option<String>,
    root: Option<Value>,
}

impl<'ctx> TreeBuilder<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
            pending_key: None,
            root: None,
        }
    }

    pub fn start_map(&mut self) -> Result<(), CodecError> {
        if self.stack.len() >= MAX_TREE_DEPTH {
            return Err(CodecError::DepthExceeded);
        }
        self.stack.push(Frame::Map(Map::new(
            self.ctx.key_store(),
            self.ctx.config().fast_map_insert,
        )));
        Ok(())
    }

    pub fn start_array(&mut self) -> Result<(), CodecError> {
        if self.stack.len() >= MAX_TREE_DEPTH {
            return Err(CodecError::DepthExceeded);
        }
        self.stack.push(Frame::Array(Array::new()));
        Ok(())
    }

    /// Records a map key; the next `value`/`end_container` call consumes it.
    pub fn map_key(&mut self, key: String) -> Result<(), CodecError> {
        match self.stack.last() {
            Some(Frame::Map(_)) => {
                self.pending_key = Some(key);
                Ok(())
            }
            _ => Err(CodecError::Parse("map key outside a map".into())),
        }
    }

    /// Routes a freshly-built scalar (or a just-closed container, via
    /// `end_container`) into whatever is at the top of the stack: the
    /// pending key of a map, the tail of an array, or — if the stack is
    /// empty — the document root.
    pub fn value(&mut self, v: Value) -> Result<(), CodecError> {
        match self.stack.last_mut() {
            Some(Frame::Map(m)) => {
                let key = self.pending_key.take().ok_or(CodecError::MissingPendingKey)?;
                m.insert(&key, v)
                    .map_err(|e| CodecError::Parse(format!("map insert failed: {e}")))?;
                Ok(())
            }
            Some(Frame::Array(a)) => {
                a.push(v)?;
                Ok(())
            }
            None => {
                self.root = Some(v);
                Ok(())
            }
        }
    }

    pub fn end_container(&mut self) -> Result<(), CodecError> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| CodecError::Parse("unbalanced container end".into()))?;
        let v = match frame {
            Frame::Map(m) => Value::Map(m),
            Frame::Array(a) => Value::Array(a),
        };
        self.value(v)
    }

    pub fn finish(self) -> Result<Value, CodecError> {
        if !self.stack.is_empty() {
            return Err(CodecError::Parse("unterminated container".into()));
        }
        self.root.ok_or_else(|| CodecError::Parse("empty document".into()))
    }
}
