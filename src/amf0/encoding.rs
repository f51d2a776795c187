use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::amf0::{
    Amf0Value, MARKER_BOOLEAN, MARKER_ECMA_ARRAY, MARKER_NULL, MARKER_NUMBER, MARKER_OBJECT,
    MARKER_OBJECT_END, MARKER_STRING, MARKER_UNDEFINED,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Amf0EncodeError {
    #[error("string too long: {0} bytes (max {})", u16::MAX)]
    StringTooLong(usize),
}

/// Encodes a sequence of AMF0 values, concatenated, as used for a single
/// RTMP command message payload (`[name, transaction_id, ...args]`).
pub fn encode_amf0_values(values: &[Amf0Value]) -> Result<Bytes, Amf0EncodeError> {
    let mut buf = BytesMut::new();
    for value in values {
        encode_value(&mut buf, value)?;
    }
    Ok(buf.freeze())
}

fn encode_value(buf: &mut BytesMut, value: &Amf0Value) -> Result<(), Amf0EncodeError> {
    match value {
        Amf0Value::Number(n) => {
            buf.put_u8(MARKER_NUMBER);
            buf.put_f64(*n);
        }
        Amf0Value::Boolean(b) => {
            buf.put_u8(MARKER_BOOLEAN);
            buf.put_u8(*b as u8);
        }
        Amf0Value::String(s) => {
            buf.put_u8(MARKER_STRING);
            put_short_string(buf, s)?;
        }
        Amf0Value::Object(pairs) => {
            buf.put_u8(MARKER_OBJECT);
            put_pairs(buf, pairs)?;
        }
        Amf0Value::Null => buf.put_u8(MARKER_NULL),
        Amf0Value::Undefined => buf.put_u8(MARKER_UNDEFINED),
        Amf0Value::EcmaArray(pairs) => {
            buf.put_u8(MARKER_ECMA_ARRAY);
            buf.put_u32(pairs.len() as u32);
            put_pairs(buf, pairs)?;
        }
    }
    Ok(())
}

fn put_short_string(buf: &mut BytesMut, s: &str) -> Result<(), Amf0EncodeError> {
    if s.len() > u16::MAX as usize {
        return Err(Amf0EncodeError::StringTooLong(s.len()));
    }
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn put_pairs(buf: &mut BytesMut, pairs: &[(String, Amf0Value)]) -> Result<(), Amf0EncodeError> {
    for (key, value) in pairs {
        put_short_string(buf, key)?;
        encode_value(buf, value)?;
    }
    buf.put_u8(0x00);
    buf.put_u8(0x00);
    buf.put_u8(MARKER_OBJECT_END);
    Ok(())
}
