use super::*;

#[test]
fn roundtrip_scalar_values() {
    let values = vec![
        Amf0Value::Number(1.0),
        Amf0Value::Boolean(true),
        Amf0Value::Boolean(false),
        Amf0Value::String("connect".to_string()),
        Amf0Value::Null,
        Amf0Value::Undefined,
    ];
    let encoded = encode_amf0_values(&values).unwrap();
    let decoded = decode_amf0_values(encoded).unwrap();
    assert_eq!(values, decoded);
}

#[test]
fn object_key_order_is_preserved_on_the_wire() {
    let value = Amf0Value::object([
        ("app", Amf0Value::String("rtmp2".to_string())),
        ("type", Amf0Value::String("nonprivate".to_string())),
        ("objectEncoding", Amf0Value::Number(0.0)),
    ]);
    let encoded = encode_amf0_values(std::slice::from_ref(&value)).unwrap();

    // Find the three string keys appear in the encoded bytes in the order
    // they were inserted, not hash order.
    let app_pos = find_bytes(&encoded, b"app").unwrap();
    let type_pos = find_bytes(&encoded, b"type").unwrap();
    let encoding_pos = find_bytes(&encoded, b"objectEncoding").unwrap();
    assert!(app_pos < type_pos);
    assert!(type_pos < encoding_pos);

    let decoded = decode_amf0_values(encoded).unwrap();
    assert_eq!(decoded, vec![value]);
}

#[test]
fn ecma_array_roundtrip() {
    let value = Amf0Value::ecma_array([("objectEncoding", Amf0Value::Number(0.0))]);
    let encoded = encode_amf0_values(std::slice::from_ref(&value)).unwrap();
    let decoded = decode_amf0_values(encoded).unwrap();
    assert_eq!(decoded, vec![value]);
}

#[test]
fn command_message_roundtrip() {
    let command = vec![
        Amf0Value::String("_result".to_string()),
        Amf0Value::Number(1.0),
        Amf0Value::object([("fmsVer", Amf0Value::String("FMS/3,5,7,7009".to_string()))]),
        Amf0Value::object([(
            "code",
            Amf0Value::String("NetConnection.Connect.Success".to_string()),
        )]),
    ];
    let encoded = encode_amf0_values(&command).unwrap();
    let decoded = decode_amf0_values(encoded).unwrap();
    assert_eq!(decoded, command);
}

#[test]
fn unknown_marker_fails_the_whole_parse() {
    let bytes = bytes::Bytes::from_static(&[0xFF]);
    let err = decode_amf0_values(bytes).unwrap_err();
    assert_eq!(err, Amf0DecodeError::UnknownMarker(0xFF));
}

#[test]
fn truncated_string_is_insufficient_data() {
    // STRING marker + length 5 but only 2 bytes of payload follow.
    let bytes = bytes::Bytes::from_static(&[MARKER_STRING, 0x00, 0x05, b'h', b'i']);
    let err = decode_amf0_values(bytes).unwrap_err();
    assert_eq!(err, Amf0DecodeError::InsufficientData);
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
