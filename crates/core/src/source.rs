use std::sync::Arc;

use crate::demuxer::{DemuxerOpener, Headers};
use crate::session::SourceReader;

/// Entry point binding a source URI and request headers to a demuxer.
///
/// A source holds no session state. Each [`register`](Self::register)
/// returns a brand-new [`SourceReader`] that opens its own demuxer, so one
/// source can feed several independent pipelines.
///
/// ```
/// use std::sync::Arc;
/// use rtsp_source::demuxer::{AnnexBOpener, Headers};
/// use rtsp_source::{SampleSource, SampleSourceReader, SessionState};
///
/// let source = SampleSource::new(
///     "file:///tmp/clip.h264",
///     Headers::new(),
///     Arc::new(AnnexBOpener::default()),
/// );
/// let reader = source.register();
/// assert_eq!(reader.state(), SessionState::Uninitialized);
/// ```
#[derive(Clone)]
pub struct SampleSource {
    uri: String,
    headers: Headers,
    opener: Arc<dyn DemuxerOpener>,
}

impl SampleSource {
    pub fn new(uri: impl Into<String>, headers: Headers, opener: Arc<dyn DemuxerOpener>) -> Self {
        Self {
            uri: uri.into(),
            headers,
            opener,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Create a fresh, unprepared session for this source.
    pub fn register(&self) -> SourceReader {
        tracing::trace!(uri = %self.uri, "session registered");
        SourceReader::new(&self.uri, self.headers.clone(), self.opener.clone())
    }
}

impl std::fmt::Debug for SampleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleSource")
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
