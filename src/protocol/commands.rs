//! Outbound AMF0 command builders (§4.5 step 1-3).

use bytes::Bytes;

use crate::amf0::{encode_amf0_values, Amf0EncodeError, Amf0Value};
use crate::endpoint::Endpoint;
use crate::message::{csid, MessageType, RtmpMessage};

fn command_message(payload: Bytes, message_stream_id: u32) -> RtmpMessage {
    RtmpMessage {
        chunk_stream_id: csid::COMMAND,
        message_type: MessageType::CommandMessageAmf0,
        message_stream_id,
        timestamp: 0,
        payload,
    }
}

pub fn connect(tx_id: f64, endpoint: &Endpoint) -> Result<RtmpMessage, Amf0EncodeError> {
    let command_object = Amf0Value::object([
        ("app", Amf0Value::String(endpoint.app.clone())),
        ("type", Amf0Value::String("nonprivate".to_string())),
        ("tcUrl", Amf0Value::String(endpoint.tc_url.clone())),
        (
            "flashVer",
            Amf0Value::String("FMLE/3.0 (compatible; rtmp-ingest)".to_string()),
        ),
        ("fpad", Amf0Value::Boolean(false)),
        ("capabilities", Amf0Value::Number(239.0)),
        ("audioCodecs", Amf0Value::Number(3575.0)),
        ("videoCodecs", Amf0Value::Number(252.0)),
        ("videoFunction", Amf0Value::Number(1.0)),
    ]);
    let object_encoding = Amf0Value::ecma_array([("objectEncoding", Amf0Value::Number(0.0))]);

    let payload = encode_amf0_values(&[
        Amf0Value::String("connect".to_string()),
        Amf0Value::Number(tx_id),
        command_object,
        object_encoding,
    ])?;
    Ok(command_message(payload, 0))
}

pub fn release_stream(tx_id: f64, stream_key: &str) -> Result<RtmpMessage, Amf0EncodeError> {
    let payload = encode_amf0_values(&[
        Amf0Value::String("releaseStream".to_string()),
        Amf0Value::Number(tx_id),
        Amf0Value::Null,
        Amf0Value::String(stream_key.to_string()),
    ])?;
    Ok(command_message(payload, 0))
}

pub fn fc_publish(tx_id: f64, stream_key: &str) -> Result<RtmpMessage, Amf0EncodeError> {
    let payload = encode_amf0_values(&[
        Amf0Value::String("FCPublish".to_string()),
        Amf0Value::Number(tx_id),
        Amf0Value::Null,
        Amf0Value::String(stream_key.to_string()),
    ])?;
    Ok(command_message(payload, 0))
}

pub fn create_stream(tx_id: f64) -> Result<RtmpMessage, Amf0EncodeError> {
    let payload = encode_amf0_values(&[
        Amf0Value::String("createStream".to_string()),
        Amf0Value::Number(tx_id),
        Amf0Value::Null,
    ])?;
    Ok(command_message(payload, 0))
}

pub fn publish(stream_key: &str, message_stream_id: u32) -> Result<RtmpMessage, Amf0EncodeError> {
    let payload = encode_amf0_values(&[
        Amf0Value::String("publish".to_string()),
        Amf0Value::Number(0.0),
        Amf0Value::Null,
        Amf0Value::String(stream_key.to_string()),
        Amf0Value::String("live".to_string()),
    ])?;
    // Goes out on the media-command chunk stream, not csid 3, per the
    // connect -> publish wire trace.
    Ok(RtmpMessage {
        chunk_stream_id: csid::VIDEO,
        message_type: MessageType::CommandMessageAmf0,
        message_stream_id,
        timestamp: 0,
        payload,
    })
}

pub fn fc_unpublish(stream_key: &str) -> Result<RtmpMessage, Amf0EncodeError> {
    let payload = encode_amf0_values(&[
        Amf0Value::String("FCUnpublish".to_string()),
        Amf0Value::Number(0.0),
        Amf0Value::Null,
        Amf0Value::String(stream_key.to_string()),
    ])?;
    Ok(command_message(payload, 0))
}

pub fn delete_stream(tx_id: f64, message_stream_id: u32) -> Result<RtmpMessage, Amf0EncodeError> {
    let payload = encode_amf0_values(&[
        Amf0Value::String("deleteStream".to_string()),
        Amf0Value::Number(tx_id),
        Amf0Value::Null,
        Amf0Value::Number(message_stream_id as f64),
    ])?;
    Ok(command_message(payload, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf0::decode_amf0_values;

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "a.rtmps.youtube.com".to_string(),
            port: 443,
            app: "rtmp2".to_string(),
            tc_url: "rtmps://a.rtmps.youtube.com:443/rtmp2".to_string(),
            use_tls: true,
        }
    }

    #[test]
    fn connect_command_carries_app_and_tc_url_in_order() {
        let msg = connect(1.0, &endpoint()).unwrap();
        let values = decode_amf0_values(msg.payload).unwrap();
        assert_eq!(values[0].as_str(), Some("connect"));
        assert_eq!(values[1].as_f64(), Some(1.0));
        assert_eq!(values[2].object_get("app").and_then(|v| v.as_str()), Some("rtmp2"));
        assert_eq!(
            values[2].object_get("tcUrl").and_then(|v| v.as_str()),
            Some("rtmps://a.rtmps.youtube.com:443/rtmp2")
        );
    }

    #[test]
    fn publish_command_targets_the_created_stream_id() {
        let msg = publish("XXXX-YYYY", 1).unwrap();
        assert_eq!(msg.message_stream_id, 1);
        assert_eq!(msg.chunk_stream_id, csid::VIDEO);
        let values = decode_amf0_values(msg.payload).unwrap();
        assert_eq!(values[0].as_str(), Some("publish"));
        assert_eq!(values[3].as_str(), Some("XXXX-YYYY"));
        assert_eq!(values[4].as_str(), Some("live"));
    }
}
