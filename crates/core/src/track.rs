//! Per-track metadata and the format record handed to consumers.

/// Upper bound on a single sample's payload, in bytes.
///
/// This is an allocation contract with the consumer, not a measured value:
/// sample buffers sized to it are large enough for any sample a session
/// will deliver.
pub const MAX_INPUT_SIZE: usize = 10 * 1024 * 1024;

/// Immutable metadata for one track, captured at prepare time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Codec identifier, e.g. `video/avc`.
    pub mime_type: String,
    /// Track duration in microseconds; `None` when the source cannot tell
    /// (live streams).
    pub duration_us: Option<i64>,
}

impl TrackInfo {
    pub fn new(mime_type: impl Into<String>, duration_us: Option<i64>) -> Self {
        Self {
            mime_type: mime_type.into(),
            duration_us,
        }
    }
}

/// Format of one track, assembled on demand from the demuxer.
///
/// Geometry, bitrate and init data are re-queried on every
/// [`format`](crate::session::SampleSourceReader::format) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    pub track_index: usize,
    pub mime_type: String,
    pub duration_us: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub bitrate: u32,
    /// Always [`MAX_INPUT_SIZE`].
    pub max_input_size: usize,
    /// Codec-specific units (e.g. SPS, PPS), each with its start code.
    pub initialization_data: Vec<Vec<u8>>,
}

/// Build a MIME type from a media type and a demuxer codec name.
///
/// Demuxers name H.264 `h264`; playback pipelines expect `avc`.
///
/// ```
/// use rtsp_source::track::mime_type_for;
///
/// assert_eq!(mime_type_for("video", "h264"), "video/avc");
/// assert_eq!(mime_type_for("audio", "aac"), "audio/aac");
/// ```
pub fn mime_type_for(media_type: &str, codec_name: &str) -> String {
    let codec = match codec_name {
        "h264" => "avc",
        other => other,
    };
    format!("{}/{}", media_type, codec)
}
