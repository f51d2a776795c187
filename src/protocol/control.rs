//! Protocol control message builders/parsers (§4.5 inbound dispatch table).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::message::{csid, MessageType, RtmpMessage};

pub mod user_control_event {
    pub const STREAM_BEGIN: u16 = 0;
    pub const STREAM_EOF: u16 = 1;
    pub const PING_REQUEST: u16 = 6;
    pub const PING_RESPONSE: u16 = 7;
}

fn control_message(message_type: MessageType, payload: Bytes) -> RtmpMessage {
    RtmpMessage {
        chunk_stream_id: csid::PROTOCOL_CONTROL,
        message_type,
        message_stream_id: 0,
        timestamp: 0,
        payload,
    }
}

pub fn window_ack_size(size: u32) -> RtmpMessage {
    control_message(MessageType::WindowAckSize, Bytes::copy_from_slice(&size.to_be_bytes()))
}

pub fn set_chunk_size(size: u32) -> RtmpMessage {
    control_message(MessageType::SetChunkSize, Bytes::copy_from_slice(&size.to_be_bytes()))
}

pub fn acknowledgement(total_bytes_read: u32) -> RtmpMessage {
    control_message(
        MessageType::Acknowledgement,
        Bytes::copy_from_slice(&total_bytes_read.to_be_bytes()),
    )
}

fn user_control(event_type: u16, data: u32) -> RtmpMessage {
    let mut buf = BytesMut::with_capacity(6);
    buf.put_u16(event_type);
    buf.put_u32(data);
    control_message(MessageType::UserControl, buf.freeze())
}

pub fn ping_request(wall_clock_low32: u32) -> RtmpMessage {
    user_control(user_control_event::PING_REQUEST, wall_clock_low32)
}

pub fn ping_response(echoed_timestamp: u32) -> RtmpMessage {
    user_control(user_control_event::PING_RESPONSE, echoed_timestamp)
}

/// Parses a User Control payload into `(event_type, event_data)`. Returns
/// `None` for a truncated payload rather than erroring — an unparseable
/// User Control event is logged and dropped, not fatal to the session.
pub fn parse_user_control(mut payload: Bytes) -> Option<(u16, u32)> {
    if payload.len() < 6 {
        return None;
    }
    let event_type = payload.get_u16();
    let data = payload.get_u32();
    Some((event_type, data))
}

/// `SetChunkSize`/`WindowAckSize` payloads are a single big-endian u32 with
/// the high bit reserved (masked off per spec).
pub fn parse_u32_control(payload: &[u8]) -> Option<u32> {
    if payload.len() < 4 {
        return None;
    }
    let raw = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    Some(raw & 0x7FFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_request_round_trips_through_user_control_parsing() {
        let msg = ping_request(0x1234_5678);
        let (event, data) = parse_user_control(msg.payload).unwrap();
        assert_eq!(event, user_control_event::PING_REQUEST);
        assert_eq!(data, 0x1234_5678);
    }

    #[test]
    fn set_chunk_size_masks_the_reserved_high_bit() {
        let raw = 0x8000_1000u32.to_be_bytes();
        assert_eq!(parse_u32_control(&raw), Some(0x0000_1000));
    }
}
