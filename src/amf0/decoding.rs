use bytes::{Buf, Bytes};
use thiserror::Error;

use crate::amf0::{
    Amf0Value, MARKER_BOOLEAN, MARKER_ECMA_ARRAY, MARKER_NULL, MARKER_NUMBER, MARKER_OBJECT,
    MARKER_STRING, MARKER_UNDEFINED, OBJECT_END_MARKER,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Amf0DecodeError {
    #[error("unknown amf0 marker: {0:#04x}")]
    UnknownMarker(u8),
    #[error("insufficient data decoding amf0 value")]
    InsufficientData,
    #[error("invalid utf-8 in amf0 string")]
    InvalidUtf8,
}

/// Decodes a whole RTMP command payload into its sequence of AMF0 values.
/// Tolerant reading stops at the first unknown marker and surfaces the
/// failure rather than guessing: a malformed command is abandoned, not
/// partially interpreted.
pub fn decode_amf0_values(payload: Bytes) -> Result<Vec<Amf0Value>, Amf0DecodeError> {
    let mut buf = payload;
    let mut values = Vec::new();
    while buf.has_remaining() {
        values.push(decode_value(&mut buf)?);
    }
    Ok(values)
}

fn decode_value(buf: &mut Bytes) -> Result<Amf0Value, Amf0DecodeError> {
    if !buf.has_remaining() {
        return Err(Amf0DecodeError::InsufficientData);
    }
    let marker = buf.get_u8();
    match marker {
        MARKER_NUMBER => {
            require(buf, 8)?;
            Ok(Amf0Value::Number(buf.get_f64()))
        }
        MARKER_BOOLEAN => {
            require(buf, 1)?;
            Ok(Amf0Value::Boolean(buf.get_u8() != 0))
        }
        MARKER_STRING => Ok(Amf0Value::String(decode_short_string(buf)?)),
        MARKER_OBJECT => Ok(Amf0Value::Object(decode_pairs(buf)?)),
        MARKER_NULL => Ok(Amf0Value::Null),
        MARKER_UNDEFINED => Ok(Amf0Value::Undefined),
        MARKER_ECMA_ARRAY => {
            require(buf, 4)?;
            let _count = buf.get_u32();
            Ok(Amf0Value::EcmaArray(decode_pairs(buf)?))
        }
        other => Err(Amf0DecodeError::UnknownMarker(other)),
    }
}

fn decode_short_string(buf: &mut Bytes) -> Result<String, Amf0DecodeError> {
    require(buf, 2)?;
    let len = buf.get_u16() as usize;
    require(buf, len)?;
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| Amf0DecodeError::InvalidUtf8)
}

fn decode_pairs(buf: &mut Bytes) -> Result<Vec<(String, Amf0Value)>, Amf0DecodeError> {
    let mut pairs = Vec::new();
    loop {
        require(buf, 3)?;
        if buf[..3] == OBJECT_END_MARKER {
            buf.advance(3);
            return Ok(pairs);
        }
        let key = decode_short_string(buf)?;
        let value = decode_value(buf)?;
        pairs.push((key, value));
    }
}

fn require(buf: &Bytes, n: usize) -> Result<(), Amf0DecodeError> {
    if buf.remaining() < n {
        Err(Amf0DecodeError::InsufficientData)
    } else {
        Ok(())
    }
}
