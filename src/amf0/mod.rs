//! AMF0 (Action Message Format v0) codec, the serialization used for RTMP
//! command payloads. Supports the subset the RTMP command channel actually
//! uses: number, boolean, string, object, ecma-array, null, undefined.
//!
//! Object and ecma-array keys preserve insertion order on the wire: some
//! ingest servers key off field order, so `Amf0Value::Object` is backed by
//! `Vec<(String, Amf0Value)>` rather than a map.

mod decoding;
mod encoding;
#[cfg(test)]
mod tests;

pub use decoding::{decode_amf0_values, Amf0DecodeError};
pub use encoding::{encode_amf0_values, Amf0EncodeError};

pub(crate) const MARKER_NUMBER: u8 = 0x00;
pub(crate) const MARKER_BOOLEAN: u8 = 0x01;
pub(crate) const MARKER_STRING: u8 = 0x02;
pub(crate) const MARKER_OBJECT: u8 = 0x03;
pub(crate) const MARKER_NULL: u8 = 0x05;
pub(crate) const MARKER_UNDEFINED: u8 = 0x06;
pub(crate) const MARKER_ECMA_ARRAY: u8 = 0x08;
pub(crate) const MARKER_OBJECT_END: u8 = 0x09;
pub(crate) const OBJECT_END_MARKER: [u8; 3] = [0x00, 0x00, MARKER_OBJECT_END];

/// A decoded/to-be-encoded AMF0 value.
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    String(String),
    /// Ordered key/value pairs. Order is preserved on encode because some
    /// ingest servers key off field order in the `connect` command object.
    Object(Vec<(String, Amf0Value)>),
    Null,
    Undefined,
    EcmaArray(Vec<(String, Amf0Value)>),
}

impl Amf0Value {
    pub fn object<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Amf0Value)>,
    {
        Amf0Value::Object(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn ecma_array<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Amf0Value)>,
    {
        Amf0Value::EcmaArray(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn object_get(&self, key: &str) -> Option<&Amf0Value> {
        match self {
            Amf0Value::Object(pairs) | Amf0Value::EcmaArray(pairs) => {
                pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }
}
