use std::io::Cursor;

use bytes::Bytes;

use super::*;
use crate::message::{csid, MessageType, RtmpMessage};

fn roundtrip(chunk_size: usize, messages: &[RtmpMessage]) -> Vec<RtmpMessage> {
    let mut wire = Vec::new();
    {
        let mut writer = ChunkWriter::new(&mut wire);
        writer.set_chunk_size(chunk_size);
        for msg in messages {
            writer.write_message(msg).unwrap();
        }
    }

    let mut reader = ChunkReader::new(Cursor::new(wire));
    reader.set_chunk_size(chunk_size);
    (0..messages.len())
        .map(|_| reader.read_message().unwrap())
        .collect()
}

fn msg(chunk_stream_id: u32, timestamp: u32, payload: &[u8]) -> RtmpMessage {
    RtmpMessage {
        chunk_stream_id,
        message_type: MessageType::Video,
        message_stream_id: 1,
        timestamp,
        payload: Bytes::copy_from_slice(payload),
    }
}

#[test]
fn payload_exactly_one_chunk_size_fits_in_a_single_chunk() {
    let payload = vec![0xAB; DEFAULT_CHUNK_SIZE];
    let out = roundtrip(DEFAULT_CHUNK_SIZE, &[msg(csid::VIDEO, 10, &payload)]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].payload.as_ref(), payload.as_slice());
    assert_eq!(out[0].timestamp, 10);
}

#[test]
fn payload_one_byte_over_chunk_size_splits_into_two_chunks() {
    let payload = vec![0xCD; DEFAULT_CHUNK_SIZE + 1];
    let out = roundtrip(DEFAULT_CHUNK_SIZE, &[msg(csid::VIDEO, 10, &payload)]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].payload.as_ref(), payload.as_slice());
}

#[test]
fn extended_timestamp_survives_the_round_trip() {
    let out = roundtrip(128, &[msg(csid::VIDEO, EXTENDED_TIMESTAMP_MARKER + 500, &[1, 2, 3])]);
    assert_eq!(out[0].timestamp, EXTENDED_TIMESTAMP_MARKER + 500);
}

#[test]
fn interleaved_channels_assemble_independently() {
    let mut wire = Vec::new();
    {
        let mut writer = ChunkWriter::new(&mut wire);
        writer.set_chunk_size(4);
        writer
            .write_message(&msg(csid::VIDEO, 1, &[1, 2, 3, 4, 5, 6]))
            .unwrap();
        writer
            .write_message(&msg(csid::AUDIO, 2, &[9, 9]))
            .unwrap();
    }

    let mut reader = ChunkReader::new(Cursor::new(wire));
    reader.set_chunk_size(4);
    let a = reader.read_message().unwrap();
    let b = reader.read_message().unwrap();
    assert_eq!(a.chunk_stream_id, csid::VIDEO);
    assert_eq!(a.payload.as_ref(), &[1, 2, 3, 4, 5, 6]);
    assert_eq!(b.chunk_stream_id, csid::AUDIO);
    assert_eq!(b.payload.as_ref(), &[9, 9]);
}

#[test]
fn oversized_message_length_is_rejected() {
    // Hand-craft a format-0 header claiming a length above the cap.
    let mut wire = Vec::new();
    wire.push(0u8 << 6 | csid::VIDEO as u8); // fmt 0, csid 8
    wire.extend_from_slice(&0u32.to_be_bytes()[1..4]); // timestamp
    wire.extend_from_slice(&(MAX_MESSAGE_SIZE + 1).to_be_bytes()[1..4]); // length
    wire.push(MessageType::Video.into_id());
    wire.extend_from_slice(&1u32.to_le_bytes());

    let mut reader = ChunkReader::new(Cursor::new(wire));
    let err = reader.read_message().unwrap_err();
    assert!(matches!(err, crate::error::RtmpError::ChunkTooLarge(_, _)));
}
