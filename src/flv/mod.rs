//! FLV tag payload construction (C4). Produces the payload bytes carried by
//! RTMP `Audio`/`Video`/`DataMessageAmf0` messages — no FLV file header, no
//! previous-tag-size, since RTMP carries those fields in its own chunk
//! envelope, not the FLV container's.

mod audio;
mod metadata;
mod video;

pub use audio::{build_aac_config_tag, build_aac_frame_tag, AudioChannels};
pub use metadata::{build_on_metadata, StreamMetadata};
pub use video::build_avc_config_tag;
pub use video::build_avc_nalu_tag;
