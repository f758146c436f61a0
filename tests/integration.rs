use doctree::{Codec, Context, OutputBuffer, Value, ZERO_TOLERANCE};

fn sample_document(ctx: &Context) -> Value {
    let mut v = Value::Null;
    {
        let m = v.to_map(ctx);
        m.insert("street", Value::String(doctree::string::StringRepr::from_str("sesame")))
            .unwrap();
        m.insert("f", Value::Bool(false)).unwrap();
        m.insert("i", Value::Int(123)).unwrap();
        m.insert("pi", Value::Float(3.1416)).unwrap();
        m.insert("null", Value::Null).unwrap();
        let mut arr = Value::Null;
        arr.to_array(ctx).push(Value::Int(-1)).unwrap();
        m.insert("array", arr).unwrap();
    }
    v
}

#[test]
fn scenario_1_json_roundtrip_preserves_float() {
    let ctx = Context::new();
    let v = sample_document(&ctx);

    let mut out = OutputBuffer::new();
    v.encode(Codec::Json, &mut out).unwrap();
    let decoded = Value::decode(&ctx, Codec::Json, out.data()).unwrap();

    let pi = decoded.search("pi").unwrap().as_float().unwrap();
    assert!((pi - 3.1416).abs() < ZERO_TOLERANCE);
}

#[test]
fn scenario_2_msgpack_roundtrip_preserves_float() {
    let ctx = Context::new();
    let v = sample_document(&ctx);

    let mut out = OutputBuffer::new();
    v.encode(Codec::MsgPack, &mut out).unwrap();
    let decoded = Value::decode(&ctx, Codec::MsgPack, out.data()).unwrap();

    let pi = decoded.search("pi").unwrap().as_float().unwrap();
    assert!((pi - 3.1416).abs() < ZERO_TOLERANCE);
}

#[test]
fn scenario_3_search_nested_map_field() {
    let ctx = Context::new();
    let mut v = Value::Null;
    let mut inner = Value::Null;
    inner.to_map(&ctx).insert("b", Value::Int(1)).unwrap();
    inner.to_map(&ctx).insert("c", Value::Int(2)).unwrap();
    v.to_map(&ctx).insert("a", inner).unwrap();

    let found = v.search("a.b").unwrap();
    assert_eq!(found.as_int().unwrap(), 1);
}

#[test]
fn scenario_4_search_array_index_within_map() {
    let ctx = Context::new();
    let mut v = Value::Null;
    let mut users = Value::Null;
    users.to_array(&ctx);
    for name in ["x", "y"] {
        let mut u = Value::Null;
        u.to_map(&ctx)
            .insert("name", Value::String(doctree::string::StringRepr::from_str(name)))
            .unwrap();
        users.as_array_mut().unwrap().push(u).unwrap();
    }
    v.to_map(&ctx).insert("users", users).unwrap();

    let found = v.search("users.@1.name").unwrap();
    assert_eq!(found.as_str().unwrap(), "y");
}

#[test]
fn scenario_5_diff_then_patch_equals_modified() {
    let ctx = Context::new();
    let mut og = Value::Null;
    {
        let m = og.to_map(&ctx);
        m.insert("a", Value::Int(1)).unwrap();
        m.insert("b", Value::Int(2)).unwrap();
    }
    let mut md = Value::Null;
    {
        let m = md.to_map(&ctx);
        m.insert("a", Value::Int(1)).unwrap();
        m.insert("b", Value::Int(3)).unwrap();
        m.insert("c", Value::Int(4)).unwrap();
    }

    let d = og.diff(&ctx, &md);
    let patched = og.patch(&ctx, &d).unwrap();
    assert_eq!(patched, md);

    let dm = d.as_map().unwrap();
    assert!(dm.find("rem").is_none());
    assert_eq!(dm.find("set").unwrap().as_map().unwrap().find("b").unwrap().as_int().unwrap(), 3);
    assert_eq!(dm.find("add").unwrap().as_map().unwrap().find("c").unwrap().as_int().unwrap(), 4);
}

#[test]
fn scenario_6_oversized_key_rejected_map_unchanged() {
    let ctx = Context::new();
    let mut v = Value::Null;
    let map = v.to_map(&ctx);
    let long_key = "k".repeat(128);
    assert!(map.insert(&long_key, Value::Int(1)).is_err());
    assert_eq!(map.len(), 0);
}

#[test]
fn boundary_key_length_127_accepted_128_rejected() {
    let ctx = Context::new();
    let mut v = Value::Null;
    let map = v.to_map(&ctx);
    assert!(map.insert(&"k".repeat(127), Value::Int(1)).is_ok());
    assert!(map.insert(&"k".repeat(128), Value::Int(1)).is_err());
}

#[test]
fn boundary_fixed_buffer_sized_to_approx_estimate_succeeds() {
    let ctx = Context::new();
    let mut v = Value::Null;
    v.to_map(&ctx).insert("a", Value::Int(42)).unwrap();

    let size = v.approx_encode_size(Codec::Json) + 1; // + EOS byte
    let mut region = vec![0u8; size];
    let mut out = OutputBuffer::fixed(&mut region);
    assert!(v.encode(Codec::Json, &mut out).is_ok());
}
