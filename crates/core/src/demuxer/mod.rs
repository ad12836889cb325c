//! Demuxer capability consumed by the sample source.
//!
//! A demuxer owns one open network/container session and exposes its
//! tracks, selection state, seeking and raw packet extraction. The sample
//! source never looks inside it; it only drives the calls below.
//!
//! ## Lifecycle
//!
//! ```text
//! DemuxerOpener::open(uri, headers) -> DemuxerHandle
//!   tracks() / select_track() / seek() / read_sample() ...
//! DemuxerHandle dropped or closed      -> Demuxer::close() (exactly once)
//! ```
//!
//! ## Implementations
//!
//! | Demuxer | Module | Source |
//! |---------|--------|--------|
//! | Annex B H.264 elementary stream | [`annexb`] | local file / `file://` URI |

pub mod annexb;

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::error::{Result, SourceError};
use crate::sample::DemuxedSample;
use crate::track::TrackInfo;

pub use annexb::{AnnexBConfig, AnnexBDemuxer, AnnexBOpener};

/// Request headers bound to a source, as ordered (name, value) pairs.
///
/// Lookups via [`get`](Self::get) are case-insensitive, like RTSP and HTTP
/// header names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header. Existing entries with the same name are kept.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Look up the first header value by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// What a demuxer produced for one read request.
#[derive(Debug)]
pub enum DemuxerRead {
    /// The next sample of the requested track.
    Sample(DemuxedSample),
    /// No sample available right now.
    Nothing,
    /// The track's format changed before its next sample.
    FormatChanged,
    /// The track is exhausted.
    EndOfStream,
    /// The underlying session failed (dropped connection, read error).
    Error(SourceError),
}

/// An open demuxer session.
///
/// Track indices are the positions in [`tracks`](Self::tracks) and stay
/// stable for the life of the session. Index arguments are validated by
/// the caller; implementations may panic on an out-of-range index.
///
/// Calls may block on network or file I/O. A demuxer is not required to
/// be thread-safe beyond `Send`: one owner drives it at a time.
pub trait Demuxer: Send {
    /// Enumerate all tracks, in index order.
    fn tracks(&mut self) -> Result<Vec<TrackInfo>>;

    /// Include the track in reads.
    fn select_track(&mut self, index: usize);

    /// Exclude the track from reads.
    fn deselect_track(&mut self, index: usize);

    /// Reposition the selected tracks near `position_us`.
    fn seek(&mut self, position_us: i64) -> Result<()>;

    /// Picture width; 0 for non-video tracks.
    fn width(&self, index: usize) -> u32;

    /// Picture height; 0 for non-video tracks.
    fn height(&self, index: usize) -> u32;

    /// Bits per second; 0 when unknown.
    fn bitrate(&self, index: usize) -> u32;

    /// Raw codec init blob (e.g. Annex B SPS/PPS); empty when none.
    fn init_data(&self, index: usize) -> Vec<u8>;

    /// Pull the next sample for `track`.
    fn read_sample(&mut self, track: usize) -> DemuxerRead;

    /// Furthest presentation time buffered, if the demuxer tracks one.
    fn buffered_position_us(&self) -> Option<i64> {
        None
    }

    /// Release the underlying session. Called exactly once, by
    /// [`DemuxerHandle`].
    fn close(&mut self);
}

/// Establishes demuxer sessions.
pub trait DemuxerOpener: Send + Sync {
    fn open(&self, uri: &str, headers: &Headers) -> Result<Box<dyn Demuxer>>;
}

/// Exclusive owner of one open [`Demuxer`].
///
/// The demuxer is closed when the handle is dropped; [`close`](Self::close)
/// consumes the handle, so a closed demuxer can never be reached again.
pub struct DemuxerHandle {
    uri: String,
    demuxer: Box<dyn Demuxer>,
}

impl DemuxerHandle {
    pub fn new(uri: &str, demuxer: Box<dyn Demuxer>) -> Self {
        tracing::trace!(uri, "demuxer handle acquired");
        Self {
            uri: uri.to_string(),
            demuxer,
        }
    }

    /// Open through `opener` and wrap the result.
    pub fn open(opener: &dyn DemuxerOpener, uri: &str, headers: &Headers) -> Result<Self> {
        let demuxer = opener.open(uri, headers)?;
        Ok(Self::new(uri, demuxer))
    }

    /// Close the demuxer now instead of at drop.
    pub fn close(self) {}
}

impl Deref for DemuxerHandle {
    type Target = dyn Demuxer;

    fn deref(&self) -> &Self::Target {
        self.demuxer.as_ref()
    }
}

impl DerefMut for DemuxerHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.demuxer.as_mut()
    }
}

impl Drop for DemuxerHandle {
    fn drop(&mut self) {
        self.demuxer.close();
        tracing::debug!(uri = %self.uri, "demuxer closed");
    }
}

impl fmt::Debug for DemuxerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemuxerHandle")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}
