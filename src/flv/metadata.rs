use bytes::Bytes;

use crate::amf0::{encode_amf0_values, Amf0EncodeError, Amf0Value};

/// Fields carried in the `onMetaData` object, mirroring the preset the
/// publish session was configured with.
#[derive(Debug, Clone)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    pub framerate: f64,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub audio_sample_rate: u32,
    pub audio_sample_size: u32,
    pub audio_channels: u32,
    pub encoder: String,
}

/// Builds the `@setDataFrame("onMetaData", {...})` AMF0 command payload.
/// Must be sent exactly once, immediately after publish is acknowledged
/// and before any media message.
pub fn build_on_metadata(meta: &StreamMetadata) -> Result<Bytes, Amf0EncodeError> {
    let values = vec![
        Amf0Value::String("@setDataFrame".to_string()),
        Amf0Value::String("onMetaData".to_string()),
        Amf0Value::object([
            ("width", Amf0Value::Number(meta.width as f64)),
            ("height", Amf0Value::Number(meta.height as f64)),
            ("framerate", Amf0Value::Number(meta.framerate)),
            (
                "videodatarate",
                Amf0Value::Number(meta.video_bitrate_kbps as f64),
            ),
            ("videocodecid", Amf0Value::Number(7.0)),
            (
                "audiodatarate",
                Amf0Value::Number(meta.audio_bitrate_kbps as f64),
            ),
            (
                "audiosamplerate",
                Amf0Value::Number(meta.audio_sample_rate as f64),
            ),
            (
                "audiosamplesize",
                Amf0Value::Number(meta.audio_sample_size as f64),
            ),
            (
                "audiochannels",
                Amf0Value::Number(meta.audio_channels as f64),
            ),
            ("audiocodecid", Amf0Value::Number(10.0)),
            ("encoder", Amf0Value::String(meta.encoder.clone())),
        ]),
    ];
    encode_amf0_values(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf0::decode_amf0_values;

    fn sample() -> StreamMetadata {
        StreamMetadata {
            width: 1280,
            height: 720,
            framerate: 60.0,
            video_bitrate_kbps: 6000,
            audio_bitrate_kbps: 160,
            audio_sample_rate: 48_000,
            audio_sample_size: 16,
            audio_channels: 1,
            encoder: "rtmp-ingest".to_string(),
        }
    }

    #[test]
    fn metadata_command_starts_with_set_data_frame() {
        let payload = build_on_metadata(&sample()).unwrap();
        let values = decode_amf0_values(payload).unwrap();
        assert_eq!(values[0], Amf0Value::String("@setDataFrame".to_string()));
        assert_eq!(values[1], Amf0Value::String("onMetaData".to_string()));
        let obj = values[2].object_get("videocodecid").unwrap();
        assert_eq!(obj.as_f64(), Some(7.0));
    }
}
