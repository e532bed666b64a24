use crate::{
    copy_events, DecodeOptions, Decoder, Encoder, Event, EventSink, NumberType, SizingEncoder,
    Symbols,
};
use pretty_assertions::assert_eq;
use std::io::Read;

pub fn hex(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut nibbles = s.chars().filter(|c| !c.is_whitespace());
    while let (Some(hi), Some(lo)) = (nibbles.next(), nibbles.next()) {
        let hi = hi.to_digit(16).expect("hex digit");
        let lo = lo.to_digit(16).expect("hex digit");
        out.push((hi * 16 + lo) as u8);
    }
    out
}

fn events_of(bytes: &[u8]) -> Vec<Event> {
    let mut dec = Decoder::new(bytes);
    let mut events = Vec::new();
    while let Some(ev) = dec.next_event().expect("well-formed input") {
        events.push(ev);
    }
    events
}

fn encode(f: impl FnOnce(&mut Encoder<&mut Vec<u8>>)) -> Vec<u8> {
    let mut out = Vec::new();
    let mut enc = Encoder::new(&mut out);
    f(&mut enc);
    enc.close().unwrap();
    drop(enc);
    out
}

fn encode_sized(f: impl FnOnce(&mut SizingEncoder<&mut Vec<u8>>)) -> Vec<u8> {
    let mut out = Vec::new();
    let mut enc = SizingEncoder::new(Encoder::new(&mut out));
    f(&mut enc);
    enc.close().unwrap();
    drop(enc);
    out
}

/// Re-encode a byte stream through decoder and sizer.
fn resize(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut dec = Decoder::new(bytes);
    let mut enc = SizingEncoder::new(Encoder::new(&mut out));
    copy_events(&mut dec, &mut enc).unwrap();
    enc.close().unwrap();
    drop(enc);
    out
}

#[test]
fn wire_vectors() {
    let cases: &[(&str, &dyn Fn(&mut Encoder<&mut Vec<u8>>))] = &[
        ("f5", &|e| e.write_bool(true).unwrap()),
        ("f4", &|e| e.write_bool(false).unwrap()),
        ("f6", &|e| e.write_null().unwrap()),
        ("00", &|e| e.write_i64(0).unwrap()),
        ("17", &|e| e.write_i64(23).unwrap()),
        ("18 18", &|e| e.write_i64(24).unwrap()),
        ("20", &|e| e.write_i64(-1).unwrap()),
        ("38 ff", &|e| e.write_i64(-256).unwrap()),
        ("19 fe dc", &|e| e.write_i64(0xfedc).unwrap()),
        ("fa 3f a0 00 00", &|e| e.write_f32(1.25).unwrap()),
        ("fb 3f e8 00 00 00 00 00 00", &|e| e.write_f64(0.75).unwrap()),
        ("60", &|e| e.write_str("").unwrap()),
        ("63 61 62 63", &|e| e.write_str("abc").unwrap()),
        ("9f ff", &|e| {
            e.write_start_array().unwrap();
            e.write_end_array().unwrap();
        }),
        ("bf ff", &|e| {
            e.write_start_object().unwrap();
            e.write_end_object().unwrap();
        }),
        ("d9 d9 f7 f5", &|e| {
            e.write_tag(crate::constants::TAG_SELF_DESCRIBE).unwrap();
            e.write_bool(true).unwrap();
        }),
        ("c2 41 01", &|e| {
            e.write_tag(crate::constants::TAG_BIGNUM_POS).unwrap();
            e.write_bytes(&[1]).unwrap();
        }),
    ];
    for (expected, write) in cases {
        assert_eq!(encode(*write), hex(expected), "vector {}", expected);
    }

    // definite [1,2,3] through the sizer
    let bytes = encode_sized(|e| {
        e.write_start_array().unwrap();
        e.write_i64(1).unwrap();
        e.write_i64(2).unwrap();
        e.write_i64(3).unwrap();
        e.write_end_array().unwrap();
    });
    assert_eq!(bytes, hex("83 01 02 03"));
}

#[test]
fn image_document_round_trip() {
    // the classic RFC 4627 image document
    let bytes = encode(|e| {
        e.write_start_object().unwrap();
        e.write_field_name("Image").unwrap();
        e.write_start_object().unwrap();
        e.write_field_name("Width").unwrap();
        e.write_i64(800).unwrap();
        e.write_field_name("Height").unwrap();
        e.write_i64(600).unwrap();
        e.write_field_name("Title").unwrap();
        e.write_str("View from 15th Floor").unwrap();
        e.write_field_name("Thumbnail").unwrap();
        e.write_start_object().unwrap();
        e.write_field_name("Url").unwrap();
        e.write_str("http://www.example.com/image/481989943").unwrap();
        e.write_field_name("Height").unwrap();
        e.write_i64(125).unwrap();
        e.write_field_name("Width").unwrap();
        e.write_str("100").unwrap();
        e.write_end_object().unwrap();
        e.write_field_name("IDs").unwrap();
        e.write_start_array().unwrap();
        e.write_i64(116).unwrap();
        e.write_i64(943).unwrap();
        e.write_i64(234).unwrap();
        e.write_i64(38793).unwrap();
        e.write_end_array().unwrap();
        e.write_end_object().unwrap();
        e.write_end_object().unwrap();
    });

    let mut dec = Decoder::new(&bytes[..]);
    use Event::*;

    assert_eq!(dec.next_event().unwrap(), Some(StartObject));
    assert_eq!(dec.next_event().unwrap(), Some(FieldName));
    assert_eq!(dec.current_name(), Some("Image"));
    assert_eq!(dec.next_event().unwrap(), Some(StartObject));

    assert_eq!(dec.next_event().unwrap(), Some(FieldName));
    assert_eq!(dec.current_name(), Some("Width"));
    assert_eq!(dec.next_event().unwrap(), Some(Int));
    assert_eq!(dec.to_i32().unwrap(), 800);
    assert_eq!(dec.next_event().unwrap(), Some(FieldName));
    assert_eq!(dec.next_event().unwrap(), Some(Int));
    assert_eq!(dec.to_i32().unwrap(), 600);
    assert_eq!(dec.next_event().unwrap(), Some(FieldName));
    assert_eq!(dec.current_name(), Some("Title"));
    assert_eq!(dec.next_event().unwrap(), Some(Text));
    assert_eq!(dec.text().unwrap(), "View from 15th Floor");

    assert_eq!(dec.next_event().unwrap(), Some(FieldName));
    assert_eq!(dec.current_name(), Some("Thumbnail"));
    assert_eq!(dec.next_event().unwrap(), Some(StartObject));
    assert_eq!(dec.next_event().unwrap(), Some(FieldName));
    assert_eq!(dec.next_event().unwrap(), Some(Text));
    assert_eq!(dec.text().unwrap(), "http://www.example.com/image/481989943");
    assert_eq!(dec.next_event().unwrap(), Some(FieldName));
    assert_eq!(dec.next_event().unwrap(), Some(Int));
    assert_eq!(dec.to_i64().unwrap(), 125);
    assert_eq!(dec.next_event().unwrap(), Some(FieldName));
    assert_eq!(dec.next_event().unwrap(), Some(Text));
    assert_eq!(dec.text().unwrap(), "100");
    assert_eq!(dec.next_event().unwrap(), Some(EndObject));

    assert_eq!(dec.next_event().unwrap(), Some(FieldName));
    assert_eq!(dec.current_name(), Some("IDs"));
    assert_eq!(dec.next_event().unwrap(), Some(StartArray));
    for expected in [116, 943, 234, 38793] {
        assert_eq!(dec.next_event().unwrap(), Some(Int));
        assert_eq!(dec.to_i64().unwrap(), expected);
        assert_eq!(dec.current_name(), Some("IDs"));
    }
    assert_eq!(dec.next_event().unwrap(), Some(EndArray));
    assert_eq!(dec.next_event().unwrap(), Some(EndObject));
    assert_eq!(dec.next_event().unwrap(), Some(EndObject));
    assert_eq!(dec.next_event().unwrap(), None);
}

#[test]
fn byte_string_keyed_map() {
    // a1 45 71 75 65 72 79 a0 is {h'7175657279': {}} with a bytes key
    let bytes = hex("a1 45 71 75 65 72 79 a0");
    let mut dec = Decoder::new(&bytes[..]);
    assert_eq!(dec.next_event().unwrap(), Some(Event::StartObject));
    assert_eq!(dec.next_event().unwrap(), Some(Event::FieldName));
    assert_eq!(dec.current_name(), Some("query"));
    assert_eq!(dec.next_event().unwrap(), Some(Event::StartObject));
    assert_eq!(dec.next_event().unwrap(), Some(Event::EndObject));
    assert_eq!(dec.next_event().unwrap(), Some(Event::EndObject));
    assert_eq!(dec.next_event().unwrap(), None);
}

#[test]
fn indefinite_equals_definite() {
    // [1, "ab", {"k": false}] in both framings
    let definite = hex("83 01 62 61 62 a1 61 6b f4");
    let indefinite = hex("9f 01 7f 62 61 62 ff bf 61 6b f4 ff ff");
    assert_eq!(events_of(&definite), events_of(&indefinite));
    // and the sizer maps both to the canonical definite bytes
    assert_eq!(resize(&definite), definite);
    assert_eq!(resize(&indefinite), definite);
}

#[test]
fn sizer_output_re_decodes_identically() {
    let original = encode(|e| {
        e.write_start_object().unwrap();
        e.write_field_name("xs").unwrap();
        e.write_start_array().unwrap();
        for i in 0..40 {
            e.write_i64(i * 3 - 20).unwrap();
        }
        e.write_end_array().unwrap();
        e.write_field_name("flag").unwrap();
        e.write_bool(false).unwrap();
        e.write_end_object().unwrap();
    });
    let resized = resize(&original);
    assert_eq!(events_of(&original), events_of(&resized));
    // re-sizing the definite form is the identity
    assert_eq!(resize(&resized), resized);
}

#[test]
fn interned_names_are_shared_across_decoders() {
    let symbols = Symbols::new();
    let bytes = encode(|e| {
        e.write_start_object().unwrap();
        e.write_field_name("shared").unwrap();
        e.write_i64(1).unwrap();
        e.write_end_object().unwrap();
    });
    for _ in 0..3 {
        let mut dec =
            Decoder::with_symbols(&bytes[..], DecodeOptions::default(), symbols.clone());
        while dec.next_event().unwrap().is_some() {}
    }
    assert_eq!(symbols.len(), 1);
}

#[test]
fn binary_round_trip_small_and_buffer_crossing() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(481989943);
    // 100 bytes fits one buffer load; 8500 forces incremental streaming
    for size in [100usize, 8500] {
        let payload: Vec<u8> = (0..size).map(|_| rng.gen()).collect();
        let bytes = encode(|e| e.write_bytes(&payload).unwrap());

        // materialised access
        let mut dec = Decoder::new(&bytes[..]);
        assert_eq!(dec.next_event().unwrap(), Some(Event::Bytes));
        assert_eq!(dec.binary().unwrap(), &payload[..]);

        // streamed access
        let mut dec = Decoder::new(&bytes[..]);
        dec.next_event().unwrap();
        let mut sink = Vec::new();
        assert_eq!(dec.read_binary(&mut sink).unwrap(), size as u64);
        assert_eq!(sink, payload);
        assert_eq!(dec.next_event().unwrap(), None);
    }
}

#[test]
fn serde_cbor_interop_round_trip() {
    // bytes produced by an independent CBOR implementation decode to the
    // same document and re-encode bit-exact through the sizer
    let value = serde_json::json!({
        "name": "interop",
        "count": 3,
        "nested": { "xs": [1, 2, 3], "ok": true },
        "ratio": 0.5,
        "nothing": null,
    });
    let bytes = serde_cbor::to_vec(&value).unwrap();
    assert_eq!(resize(&bytes), bytes);

    let decoded: serde_json::Value = serde_cbor::from_slice(&resize(&bytes)).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn number_promotion_across_the_ladder() {
    let bytes = encode(|e| e.write_i64(42).unwrap());
    let mut dec = Decoder::new(&bytes[..]);
    dec.next_event().unwrap();
    assert_eq!(dec.number_type(), Some(NumberType::I32));
    assert_eq!(dec.to_i32().unwrap(), 42);
    assert_eq!(dec.to_i64().unwrap(), 42);
    assert_eq!(dec.to_f32().unwrap(), 42.0);
    assert_eq!(dec.to_f64().unwrap(), 42.0);
    assert_eq!(dec.to_big_int().unwrap(), crate::BigInt::from_i64(42));
    assert_eq!(dec.to_big_decimal().unwrap().to_f64(), 42.0);

    // a big decimal narrows through its double conversion
    let bytes = encode(|e| {
        e.write_big_decimal(&crate::BigDecimal::new(1, crate::BigInt::from_i64(25)))
            .unwrap()
    });
    let mut dec = Decoder::new(&bytes[..]);
    assert_eq!(dec.next_event().unwrap(), Some(Event::Float));
    assert_eq!(dec.number_type(), Some(NumberType::BigDecimal));
    assert_eq!(dec.to_f64().unwrap(), 2.5);
    assert_eq!(dec.to_i32().unwrap(), 2);
}

#[test]
fn big_numbers_survive_the_event_pipeline() {
    let huge = crate::BigInt::from_be_bytes(false, &[0x01; 12]);
    let tiny = crate::BigDecimal::new(30, crate::BigInt::from_i64(12345));
    let bytes = encode(|e| {
        e.write_start_array().unwrap();
        e.write_big_int(&huge).unwrap();
        e.write_big_decimal(&tiny).unwrap();
        e.write_end_array().unwrap();
    });

    let mut dec = Decoder::new(&bytes[..]);
    dec.next_event().unwrap();
    assert_eq!(dec.next_event().unwrap(), Some(Event::Int));
    assert_eq!(dec.to_big_int().unwrap(), huge);
    assert_eq!(dec.next_event().unwrap(), Some(Event::Float));
    assert_eq!(dec.to_big_decimal().unwrap(), tiny);

    // and the whole pipeline preserves the wire form
    let direct = encode_sized(|e| {
        e.write_start_array().unwrap();
        e.write_big_int(&huge).unwrap();
        e.write_big_decimal(&tiny).unwrap();
        e.write_end_array().unwrap();
    });
    assert_eq!(resize(&bytes), direct);
}

#[test]
fn release_buffered_resumes_the_stream() {
    // a CBOR item followed by trailing plain bytes
    let mut stream = encode(|e| e.write_i64(7).unwrap());
    stream.extend_from_slice(b"TRAILER");
    let mut reader = &stream[..];
    let mut dec = Decoder::with_options(
        &mut reader,
        DecodeOptions::default().with_auto_close_source(false),
    );
    assert_eq!(dec.next_event().unwrap(), Some(Event::Int));
    let mut rest = Vec::new();
    dec.release_buffered(&mut rest).unwrap();
    drop(dec);
    reader.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, b"TRAILER");
}
