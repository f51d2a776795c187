use bytes::{BufMut, Bytes, BytesMut};

const AVC_CODEC_ID: u8 = 7;
const FRAME_TYPE_KEYFRAME: u8 = 1 << 4;
const FRAME_TYPE_INTERFRAME: u8 = 2 << 4;
const AVC_PACKET_TYPE_SEQUENCE_HEADER: u8 = 0;
const AVC_PACKET_TYPE_NALU: u8 = 1;

/// Builds the one-time AVCDecoderConfigurationRecord tag. Must be emitted
/// exactly once per track, before the first NALU tag.
pub fn build_avc_config_tag(avc_decoder_config: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + avc_decoder_config.len());
    buf.put_u8(FRAME_TYPE_KEYFRAME | AVC_CODEC_ID);
    buf.put_u8(AVC_PACKET_TYPE_SEQUENCE_HEADER);
    buf.put_bytes(0, 3); // composition time, always zero for a config tag
    buf.put_slice(avc_decoder_config);
    buf.freeze()
}

/// Builds a video NALU tag. `composition_time` is `pts - dts` in
/// milliseconds (zero when the encoder has no B-frames). `nalu_payload` is
/// the length-prefixed NAL unit data exactly as produced by the encoder.
pub fn build_avc_nalu_tag(is_keyframe: bool, composition_time: i32, nalu_payload: &[u8]) -> Bytes {
    let frame_type = if is_keyframe {
        FRAME_TYPE_KEYFRAME
    } else {
        FRAME_TYPE_INTERFRAME
    };

    let mut buf = BytesMut::with_capacity(5 + nalu_payload.len());
    buf.put_u8(frame_type | AVC_CODEC_ID);
    buf.put_u8(AVC_PACKET_TYPE_NALU);
    buf.put_slice(&composition_time.to_be_bytes()[1..4]);
    buf.put_slice(nalu_payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_tag_header_bytes_are_bit_exact() {
        let tag = build_avc_config_tag(&[0xAA, 0xBB]);
        assert_eq!(&tag[..5], &[0x17, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(&tag[5..], &[0xAA, 0xBB]);
    }

    #[test]
    fn keyframe_nalu_tag_uses_0x17_prefix() {
        let tag = build_avc_nalu_tag(true, 0, &[1, 2, 3]);
        assert_eq!(tag[0], 0x17);
        assert_eq!(tag[1], 0x01);
        assert_eq!(&tag[2..5], &[0, 0, 0]);
        assert_eq!(&tag[5..], &[1, 2, 3]);
    }

    #[test]
    fn interframe_nalu_tag_uses_0x27_prefix() {
        let tag = build_avc_nalu_tag(false, 0, &[]);
        assert_eq!(tag[0], 0x27);
    }

    #[test]
    fn composition_time_offset_is_encoded_as_signed_24_bit() {
        let tag = build_avc_nalu_tag(true, -1, &[]);
        assert_eq!(&tag[2..5], &[0xFF, 0xFF, 0xFF]);
    }
}
