//! JSON codec: decoding drives `TreeBuilder` through a `serde_json` visitor;
//! encoding is a hand-rolled recursive writer against `OutputBuffer` (not
//! `serde::Serializer`), since the writer must drive the exact growth and
//! approximate-sizing contracts described in SPEC_FULL.md §4.5.

use serde::de::{DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::buffer::OutputBuffer;
use crate::context::Context;
use crate::error::CodecError;
use crate::string::StringRepr;
use crate::value::Value;

use super::TreeBuilder;

struct BuilderSeed<'a, 'ctx> {
    builder: &'a mut TreeBuilder<'ctx>,
}

impl<'de, 'a, 'ctx> DeserializeSeed<'de> for BuilderSeed<'a, 'ctx> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TreeVisitor { builder: self.builder })
    }
}

struct TreeVisitor<'a, 'ctx> {
    builder: &'a mut TreeBuilder<'ctx>,
}

impl<'de, 'a, 'ctx> Visitor<'de> for TreeVisitor<'a, 'ctx> {
    type Value = ();

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<(), E> {
        self.builder.value(Value::Bool(v)).map_err(serde::de::Error::custom)
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<(), E> {
        self.builder.value(Value::Int(v)).map_err(serde::de::Error::custom)
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<(), E> {
        // Open Question resolution (SPEC_FULL.md §13): promote to float on
        // overflow instead of failing the whole document.
        let value = if v <= i64::MAX as u64 {
            Value::Int(v as i64)
        } else {
            Value::Float(v as f64)
        };
        self.builder.value(value).map_err(serde::de::Error::custom)
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<(), E> {
        self.builder.value(Value::Float(v)).map_err(serde::de::Error::custom)
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<(), E> {
        self.builder
            .value(Value::String(StringRepr::from_str(v)))
            .map_err(serde::de::Error::custom)
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> Result<(), E> {
        self.builder
            .value(Value::String(StringRepr::from_string(v)))
            .map_err(serde::de::Error::custom)
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<(), E> {
        self.builder.value(Value::Null).map_err(serde::de::Error::custom)
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<(), E> {
        self.visit_unit()
    }

    fn visit_map<A>(self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        self.builder.start_map().map_err(serde::de::Error::custom)?;
        while let Some(key) = map.next_key::<String>()? {
            self.builder.map_key(key).map_err(serde::de::Error::custom)?;
            map.next_value_seed(BuilderSeed { builder: self.builder })?;
        }
        self.builder.end_container().map_err(serde::de::Error::custom)?;
        Ok(())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        self.builder.start_array().map_err(serde::de::Error::custom)?;
        while seq
            .next_element_seed(BuilderSeed { builder: self.builder })?
            .is_some()
        {}
        self.builder.end_container().map_err(serde::de::Error::custom)?;
        Ok(())
    }
}

pub fn decode(ctx: &Context, bytes: &[u8]) -> Result<Value, CodecError> {
    let mut builder = TreeBuilder::new(ctx);
    let mut de = serde_json::Deserializer::from_slice(bytes);
    de.deserialize_any(TreeVisitor { builder: &mut builder })
        .map_err(|e| CodecError::Parse(e.to_string()))?;
    tracing::debug!(bytes = bytes.len(), "json decode complete");
    builder.finish()
}

fn write_string(out: &mut OutputBuffer, s: &str) -> Result<(), CodecError> {
    out.put(b'"')?;
    for c in s.chars() {
        match c {
            '"' => out.put_bytes(b"\\\"")?,
            '\\' => out.put_bytes(b"\\\\")?,
            '\n' => out.put_bytes(b"\\n")?,
            '\r' => out.put_bytes(b"\\r")?,
            '\t' => out.put_bytes(b"\\t")?,
            c if (c as u32) < 0x20 => {
                out.put_bytes(format!("\\u{:04x}", c as u32).as_bytes())?;
            }
            c => {
                let mut buf = [0u8; 4];
                out.put_bytes(c.encode_utf8(&mut buf).as_bytes())?;
            }
        }
    }
    out.put(b'"')?;
    Ok(())
}

/// Largest typical-range double, and the hard ceiling on a formatted float's
/// byte length (`FLOAT_APPROX_TYPICAL` / `FLOAT_APPROX_MAX` from the source's
/// `write_approx_size`).
const FLOAT_APPROX_TYPICAL: usize = 13;
const FLOAT_APPROX_MAX: usize = 25;

/// Formats a finite float as a JSON number, falling back to scientific
/// notation when the plain decimal form (which `f64::to_string` never
/// switches away from on its own, however extreme the magnitude) would
/// exceed `FLOAT_APPROX_MAX` bytes. NaN/Infinity have no JSON token
/// (RFC 8259) and are rejected.
fn format_float(f: f64) -> Result<String, CodecError> {
    if !f.is_finite() {
        return Err(CodecError::NonFiniteFloat(f));
    }
    let plain = f.to_string();
    let plain = if plain.contains('.') || plain.contains('e') {
        plain
    } else {
        format!("{plain}.0")
    };
    Ok(if plain.len() <= FLOAT_APPROX_MAX {
        plain
    } else {
        format!("{f:e}")
    })
}

/// Length `format_float` would produce, without needing a `Context` or
/// erroring on non-finite input (the caller's own `encode` will surface
/// that error when it actually tries to write the value).
fn float_approx_len(f: f64) -> usize {
    match format_float(f) {
        Ok(s) => s.len().max(FLOAT_APPROX_TYPICAL),
        Err(_) => FLOAT_APPROX_MAX,
    }
}

pub fn write_value(out: &mut OutputBuffer, v: &Value) -> Result<(), CodecError> {
    match v {
        Value::Null => out.put_bytes(b"null")?,
        Value::Bool(true) => out.put_bytes(b"true")?,
        Value::Bool(false) => out.put_bytes(b"false")?,
        Value::Int(i) => out.put_bytes(i.to_string().as_bytes())?,
        Value::Float(f) => out.put_bytes(format_float(*f)?.as_bytes())?,
        Value::String(s) => write_string(out, s.as_str())?,
        Value::Array(a) => {
            out.put(b'[')?;
            for (i, elem) in a.iter().enumerate() {
                if i > 0 {
                    out.put(b',')?;
                }
                write_value(out, elem)?;
            }
            out.put(b']')?;
        }
        Value::Map(m) => {
            out.put(b'{')?;
            for (i, (k, val)) in m.iter().enumerate() {
                if i > 0 {
                    out.put(b',')?;
                }
                write_string(out, k)?;
                out.put(b':')?;
                write_value(out, val)?;
            }
            out.put(b'}')?;
        }
    }
    Ok(())
}

/// Encodes `v` as JSON into `out`, terminating with an EOS byte (matching
/// the source's `write_stream` + `set_eos` pairing).
pub fn encode(out: &mut OutputBuffer, v: &Value) -> Result<(), CodecError> {
    write_value(out, v)?;
    out.set_eos(0);
    Ok(())
}

fn ndigits_i64(i: i64) -> usize {
    if i == 0 {
        return 1;
    }
    let neg = if i < 0 { 1 } else { 0 };
    let mut n = i.unsigned_abs();
    let mut digits = 0;
    while n > 0 {
        digits += 1;
        n /= 10;
    }
    digits + neg
}

/// Upper-estimate of encoded length (SPEC_FULL.md §4.5), ported directly
/// from the source's `write_approx_size` branch table.
pub fn approx_encode_size(v: &Value) -> usize {
    match v {
        Value::Null => 4,
        Value::Bool(true) => 4,
        Value::Bool(false) => 5,
        Value::Int(i) => ndigits_i64(*i),
        Value::Float(f) => float_approx_len(*f),
        Value::String(s) => s.len() + 2,
        Value::Array(a) => {
            2 + a
                .iter()
                .enumerate()
                .map(|(i, v)| ndigits_i64(i as i64) + approx_encode_size(v) + 1)
                .sum::<usize>()
        }
        Value::Map(m) => {
            2 + m
                .iter()
                .map(|(k, v)| k.len() + 2 + approx_encode_size(v) + 2)
                .sum::<usize>()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_roundtrip_scenario_1() {
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
        encode(&mut out, &v).unwrap();
        let decoded = decode(&ctx, out.data()).unwrap();

        let pi = decoded.search("pi").unwrap().as_float().unwrap();
        assert!((pi - 3.1416).abs() < crate::ZERO_TOLERANCE);
    }

    #[test]
    fn approx_size_is_upper_bound_for_scalar_document() {
        let ctx = Context::new();
        let mut v = Value::Null;
        v.to_map(&ctx).insert("a", Value::Int(12345)).unwrap();

        let mut out = OutputBuffer::new();
        encode(&mut out, &v).unwrap();
        // EOS byte is not counted by approx_encode_size; allow for it.
        assert!(approx_encode_size(&v) + 1 >= out.len());
    }

    #[test]
    fn non_finite_float_is_rejected() {
        let mut out = OutputBuffer::new();
        assert!(matches!(
            write_value(&mut out, &Value::Float(f64::NAN)),
            Err(CodecError::NonFiniteFloat(_))
        ));
        let mut out = OutputBuffer::new();
        assert!(matches!(
            write_value(&mut out, &Value::Float(f64::INFINITY)),
            Err(CodecError::NonFiniteFloat(_))
        ));
    }

    #[test]
    fn extreme_magnitude_float_stays_within_approx_size() {
        for f in [1e300, -1e300, 1e-300, f64::MAX, f64::MIN_POSITIVE] {
            let v = Value::Float(f);
            let mut out = OutputBuffer::new();
            write_value(&mut out, &v).unwrap();
            assert!(out.len() <= approx_encode_size(&v), "{f} exceeded its approx size");
        }
    }

    #[test]
    fn depth_64_succeeds_depth_65_rejected() {
        let ctx = Context::new();

        fn nest(n: usize) -> String {
            let mut s = String::new();
            for _ in 0..n {
                s.push_str("{\"a\":");
            }
            s.push_str("1");
            for _ in 0..n {
                s.push('}');
            }
            s
        }

        assert!(decode(&ctx, nest(crate::MAX_TREE_DEPTH).as_bytes()).is_ok());
        assert!(decode(&ctx, nest(crate::MAX_TREE_DEPTH + 1).as_bytes()).is_err());
    }
}
