//! MessagePack codec, built on the `rmp` crate's low-level `Marker`-based
//! encode/decode primitives (introduced as a new dependency purely for this
//! codec — see DESIGN.md).
//!
//! Unlike JSON's event stream, MsgPack's container markers carry their
//! element count up front (`fixmap(n)`, `array16(n)`, …), so the reader does
//! not need the push-down `TreeBuilder` used by the JSON decoder: it can
//! recurse directly, reading exactly `n` children. It still produces the
//! same `Value` tree through the same constructors (`StringRepr::from_str`,
//! `Map::insert`, `Array::push`), so the two codecs share everything except
//! their byte-level framing.

use rmp::decode::{self, ValueReadError};
use rmp::encode;
use rmp::Marker;

use crate::buffer::OutputBuffer;
use crate::context::Context;
use crate::error::CodecError;
use crate::string::StringRepr;
use crate::value::Value;
use crate::MAX_TREE_DEPTH;

impl From<ValueReadError> for CodecError {
    fn from(e: ValueReadError) -> Self {
        CodecError::Parse(e.to_string())
    }
}

struct ByteSink<'a, 'b>(&'a mut OutputBuffer<'b>);

impl<'a, 'b> std::io::Write for ByteSink<'a, 'b> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .put_bytes(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::WriteZero, e.to_string()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn write_value(out: &mut OutputBuffer, v: &Value) -> Result<(), CodecError> {
    let mut sink = ByteSink(out);
    match v {
        Value::Null => encode::write_nil(&mut sink).map_err(|e| CodecError::Parse(e.to_string()))?,
        Value::Bool(b) => encode::write_bool(&mut sink, *b).map_err(|e| CodecError::Parse(e.to_string()))?,
        Value::Int(i) => {
            encode::write_sint(&mut sink, *i).map_err(|e| CodecError::Parse(e.to_string()))?;
        }
        Value::Float(f) => {
            encode::write_f64(&mut sink, *f).map_err(|e| CodecError::Parse(e.to_string()))?;
        }
        Value::String(s) => {
            encode::write_str(&mut sink, s.as_str()).map_err(|e| CodecError::Parse(e.to_string()))?;
        }
        Value::Array(a) => {
            encode::write_array_len(&mut sink, a.len() as u32)
                .map_err(|e| CodecError::Parse(e.to_string()))?;
            for elem in a.iter() {
                write_value(out, elem)?;
            }
            return Ok(());
        }
        Value::Map(m) => {
            encode::write_map_len(&mut sink, m.len() as u32)
                .map_err(|e| CodecError::Parse(e.to_string()))?;
            for (k, val) in m.iter() {
                let mut sink = ByteSink(out);
                encode::write_str(&mut sink, k).map_err(|e| CodecError::Parse(e.to_string()))?;
                write_value(out, val)?;
            }
            return Ok(());
        }
    }
    Ok(())
}

pub fn encode_value(out: &mut OutputBuffer, v: &Value) -> Result<(), CodecError> {
    write_value(out, v)
}

fn read_value(ctx: &Context, cursor: &mut &[u8], depth: usize) -> Result<Value, CodecError> {
    let marker = decode::read_marker(cursor).map_err(|e| CodecError::Parse(e.to_string()))?;
    read_from_marker(ctx, marker, cursor, depth)
}

fn read_from_marker(ctx: &Context, marker: Marker, cursor: &mut &[u8], depth: usize) -> Result<Value, CodecError> {
    use rmp::decode::*;

    match marker {
        Marker::Null => Ok(Value::Null),
        Marker::True => Ok(Value::Bool(true)),
        Marker::False => Ok(Value::Bool(false)),
        Marker::FixPos(n) => Ok(Value::Int(n as i64)),
        Marker::FixNeg(n) => Ok(Value::Int(n as i64)),
        Marker::U8 => Ok(Value::Int(read_data_u8(cursor).map_err(|e| CodecError::Parse(e.to_string()))? as i64)),
        Marker::U16 => Ok(Value::Int(read_data_u16(cursor).map_err(|e| CodecError::Parse(e.to_string()))? as i64)),
        Marker::U32 => Ok(Value::Int(read_data_u32(cursor).map_err(|e| CodecError::Parse(e.to_string()))? as i64)),
        Marker::U64 => {
            let v = read_data_u64(cursor).map_err(|e| CodecError::Parse(e.to_string()))?;
            Ok(if v <= i64::MAX as u64 {
                Value::Int(v as i64)
            } else {
                Value::Float(v as f64)
            })
        }
        Marker::I8 => Ok(Value::Int(read_data_i8(cursor).map_err(|e| CodecError::Parse(e.to_string()))? as i64)),
        Marker::I16 => Ok(Value::Int(read_data_i16(cursor).map_err(|e| CodecError::Parse(e.to_string()))? as i64)),
        Marker::I32 => Ok(Value::Int(read_data_i32(cursor).map_err(|e| CodecError::Parse(e.to_string()))? as i64)),
        Marker::I64 => Ok(Value::Int(read_data_i64(cursor).map_err(|e| CodecError::Parse(e.to_string()))?)),
        Marker::F32 => Ok(Value::Float(read_data_f32(cursor).map_err(|e| CodecError::Parse(e.to_string()))? as f64)),
        Marker::F64 => Ok(Value::Float(read_data_f64(cursor).map_err(|e| CodecError::Parse(e.to_string()))?)),
        Marker::FixStr(len) => read_str_body(cursor, len as u32),
        Marker::Str8 => {
            let len = read_data_u8(cursor).map_err(|e| CodecError::Parse(e.to_string()))?;
            read_str_body(cursor, len as u32)
        }
        Marker::Str16 => {
            let len = read_data_u16(cursor).map_err(|e| CodecError::Parse(e.to_string()))?;
            read_str_body(cursor, len as u32)
        }
        Marker::Str32 => {
            let len = read_data_u32(cursor).map_err(|e| CodecError::Parse(e.to_string()))?;
            read_str_body(cursor, len)
        }
        Marker::FixArray(len) => read_array_body(ctx, cursor, len as u32, depth),
        Marker::Array16 => {
            let len = read_data_u16(cursor).map_err(|e| CodecError::Parse(e.to_string()))?;
            read_array_body(ctx, cursor, len as u32, depth)
        }
        Marker::Array32 => {
            let len = read_data_u32(cursor).map_err(|e| CodecError::Parse(e.to_string()))?;
            read_array_body(ctx, cursor, len, depth)
        }
        Marker::FixMap(len) => read_map_body(ctx, cursor, len as u32, depth),
        Marker::Map16 => {
            let len = read_data_u16(cursor).map_err(|e| CodecError::Parse(e.to_string()))?;
            read_map_body(ctx, cursor, len as u32, depth)
        }
        Marker::Map32 => {
            let len = read_data_u32(cursor).map_err(|e| CodecError::Parse(e.to_string()))?;
            read_map_body(ctx, cursor, len, depth)
        }
        other => Err(CodecError::Parse(format!("unsupported msgpack marker {other:?}"))),
    }
}

fn read_str_body(cursor: &mut &[u8], len: u32) -> Result<Value, CodecError> {
    let len = len as usize;
    if cursor.len() < len {
        return Err(CodecError::Parse("truncated string body".into()));
    }
    let (bytes, rest) = cursor.split_at(len);
    *cursor = rest;
    let s = std::str::from_utf8(bytes).map_err(|e| CodecError::Parse(e.to_string()))?;
    Ok(Value::String(StringRepr::from_str(s)))
}

fn read_array_body(ctx: &Context, cursor: &mut &[u8], len: u32, depth: usize) -> Result<Value, CodecError> {
    // Checked at container-entry, like JSON's `TreeBuilder::start_array`, so
    // an empty 65th-level container is rejected even though it never
    // recurses into a child `read_value` call.
    if depth >= MAX_TREE_DEPTH {
        return Err(CodecError::DepthExceeded);
    }
    let mut arr = crate::value::Array::new();
    for _ in 0..len {
        arr.push(read_value(ctx, cursor, depth + 1)?)?;
    }
    Ok(Value::Array(arr))
}

fn read_map_body(ctx: &Context, cursor: &mut &[u8], len: u32, depth: usize) -> Result<Value, CodecError> {
    if depth >= MAX_TREE_DEPTH {
        return Err(CodecError::DepthExceeded);
    }
    let mut out = Value::Null;
    let map = out.to_map(ctx);
    for _ in 0..len {
        let marker = decode::read_marker(cursor).map_err(|e| CodecError::Parse(e.to_string()))?;
        let key = match read_from_marker(ctx, marker, cursor, depth + 1)? {
            Value::String(s) => s.as_str().to_string(),
            _ => return Err(CodecError::Parse("msgpack map key was not a string".into())),
        };
        let value = read_value(ctx, cursor, depth + 1)?;
        map.insert(&key, value)
            .map_err(|e| CodecError::Parse(format!("map insert failed: {e}")))?;
    }
    Ok(out)
}

pub fn decode(ctx: &Context, bytes: &[u8]) -> Result<Value, CodecError> {
    let mut cursor = bytes;
    let v = read_value(ctx, &mut cursor, 0)?;
    tracing::debug!(bytes = bytes.len(), "msgpack decode complete");
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_roundtrip_scenario_2() {
        let ctx = Context::new();
        let mut v = Value::Null;
        {
            let m = v.to_map(&ctx);
            m.insert("street", Value::String(StringRepr::from_str("sesame"))).unwrap();
            m.insert("f", Value::Bool(false)).unwrap();
            m.insert("i", Value::Int(123)).unwrap();
            m.insert("pi", Value::Float(3.1416)).unwrap();
            m.insert("null", Value::Null).unwrap();
            let mut arr = Value::Null;
            arr.to_array(&ctx).push(Value::Int(-1)).unwrap();
            m.insert("array", arr).unwrap();
        }

        let mut out = OutputBuffer::new();
        encode_value(&mut out, &v).unwrap();
        let decoded = decode(&ctx, out.data()).unwrap();

        let pi = decoded.search("pi").unwrap().as_float().unwrap();
        assert!((pi - 3.1416).abs() < crate::ZERO_TOLERANCE);
    }

    #[test]
    fn depth_limit_enforced() {
        let ctx = Context::new();
        let mut out = OutputBuffer::new();

        let mut v = Value::Null;
        {
            let mut cur = &mut v;
            for _ in 0..(MAX_TREE_DEPTH + 1) {
                let m = cur.to_map(&ctx);
                m.insert("a", Value::Null).unwrap();
                cur = m.find_mut("a").unwrap();
            }
        }
        encode_value(&mut out, &v).unwrap();
        assert!(decode(&ctx, out.data()).is_err());
    }

    /// A container with zero children still counts toward `MAX_TREE_DEPTH`:
    /// the check must fire at container-entry, not only when a child is
    /// actually read.
    #[test]
    fn depth_limit_enforced_even_when_innermost_container_is_empty() {
        let ctx = Context::new();

        fn wrap_empty_map(ctx: &Context, levels: usize) -> Value {
            let mut v = Value::Null;
            v.to_map(ctx);
            for _ in 0..levels {
                let mut wrapper = Value::Null;
                wrapper.to_map(ctx).insert("a", v).unwrap();
                v = wrapper;
            }
            v
        }

        let at_limit = wrap_empty_map(&ctx, MAX_TREE_DEPTH - 1);
        let mut out = OutputBuffer::new();
        encode_value(&mut out, &at_limit).unwrap();
        assert!(decode(&ctx, out.data()).is_ok());

        let over_limit = wrap_empty_map(&ctx, MAX_TREE_DEPTH);
        let mut out = OutputBuffer::new();
        encode_value(&mut out, &over_limit).unwrap();
        assert!(decode(&ctx, out.data()).is_err());
    }
}
