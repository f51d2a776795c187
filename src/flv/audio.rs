use bytes::{BufMut, Bytes, BytesMut};

const SOUND_FORMAT_AAC: u8 = 10;
const AAC_PACKET_TYPE_SEQUENCE_HEADER: u8 = 0;
const AAC_PACKET_TYPE_RAW: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioChannels {
    Mono,
    Stereo,
}

impl AudioChannels {
    fn sound_type_bit(self) -> u8 {
        match self {
            AudioChannels::Mono => 0,
            AudioChannels::Stereo => 1,
        }
    }
}

/// Packs the FLV AUDIODATA format byte for AAC: sound format 10, sound
/// rate 3 (44/48 kHz — only value meaningful for AAC, whose real sample
/// rate lives in the AudioSpecificConfig), sound size 1 (16-bit), and the
/// given channel count.
fn aac_format_byte(channels: AudioChannels) -> u8 {
    const SOUND_RATE_44_OR_48_KHZ: u8 = 3;
    const SOUND_SIZE_16_BIT: u8 = 1;
    (SOUND_FORMAT_AAC << 4)
        | (SOUND_RATE_44_OR_48_KHZ << 2)
        | (SOUND_SIZE_16_BIT << 1)
        | channels.sound_type_bit()
}

/// Builds the one-time AudioSpecificConfig tag. Must be emitted exactly
/// once per track, before the first raw AAC frame.
pub fn build_aac_config_tag(channels: AudioChannels, audio_specific_config: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + audio_specific_config.len());
    buf.put_u8(aac_format_byte(channels));
    buf.put_u8(AAC_PACKET_TYPE_SEQUENCE_HEADER);
    buf.put_slice(audio_specific_config);
    buf.freeze()
}

/// Builds a raw AAC frame tag.
pub fn build_aac_frame_tag(channels: AudioChannels, raw_aac_payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + raw_aac_payload.len());
    buf.put_u8(aac_format_byte(channels));
    buf.put_u8(AAC_PACKET_TYPE_RAW);
    buf.put_slice(raw_aac_payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_tag_format_byte_is_bit_exact_for_stereo() {
        let tag = build_aac_config_tag(AudioChannels::Stereo, &[0x12, 0x34]);
        assert_eq!(tag[0], 0xAF); // format=10 rate=11 size=1 type=1
        assert_eq!(tag[1], 0x00);
        assert_eq!(&tag[2..], &[0x12, 0x34]);
    }

    #[test]
    fn config_tag_format_byte_is_bit_exact_for_mono() {
        let tag = build_aac_config_tag(AudioChannels::Mono, &[]);
        assert_eq!(tag[0], 0xAE); // format=10 rate=11 size=1 type=0
    }

    #[test]
    fn frame_tag_uses_raw_aac_packet_type() {
        let tag = build_aac_frame_tag(AudioChannels::Stereo, &[0xFF]);
        assert_eq!(tag[1], 0x01);
        assert_eq!(&tag[2..], &[0xFF]);
    }
}
