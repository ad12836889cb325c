//! Sample source session: the pull-contract state machine.
//!
//! A session sits between a playback pipeline that pulls samples and a
//! [`Demuxer`](crate::demuxer::Demuxer) that owns the network/container
//! session. The consumer drives every transition; the session never calls
//! back into it.
//!
//! ## Session lifecycle
//!
//! ```text
//! register()          -> Uninitialized
//! prepare() ok        -> Prepared      (tracks enumerated, all disabled)
//! prepare() failed    -> Uninitialized (error parked, retry allowed)
//! release()           -> Released      (demuxer closed, session dead)
//! ```
//!
//! While Prepared, each track is independently enabled or disabled.
//!
//! ## Errors
//!
//! Failures detected while talking to the demuxer are parked in a single
//! pending-error slot and surface only when the consumer calls
//! [`maybe_throw_error`](SampleSourceReader::maybe_throw_error). Caller
//! contract violations (bad track index, use before prepare, use after
//! release) panic immediately.
//!
//! ## Threading
//!
//! Calls reaching the demuxer may block on I/O. A session is driven by one
//! caller at a time; it spawns no threads of its own.

use std::sync::Arc;

use crate::demuxer::{DemuxerHandle, DemuxerOpener, DemuxerRead, Headers};
use crate::error::{Result, SourceError};
use crate::media::h264::split_init_data;
use crate::sample::{ReadResult, SampleHolder, UNKNOWN_TIME_US};
use crate::track::{MAX_INPUT_SIZE, TrackFormat, TrackInfo};

/// The pull contract a playback pipeline drives.
pub trait SampleSourceReader {
    /// Surface and clear the pending error, if any. Callable in any state.
    fn maybe_throw_error(&mut self) -> Result<()>;

    /// Open the source and discover its tracks.
    ///
    /// Returns `true` once prepared; calling again afterwards is a no-op.
    /// On failure the error is parked for
    /// [`maybe_throw_error`](Self::maybe_throw_error) and `false` is
    /// returned; the session stays unprepared and may be prepared again.
    fn prepare(&mut self, position_us: i64) -> bool;

    /// Number of tracks discovered by `prepare`.
    fn track_count(&self) -> usize;

    /// Current format of a track, freshly queried from the demuxer.
    fn format(&self, track: usize) -> TrackFormat;

    /// Select a track and seek to `position_us`.
    fn enable(&mut self, track: usize, position_us: i64);

    /// Whether playback past `position_us` can continue without waiting.
    fn continue_buffering(&mut self, track: usize, position_us: i64) -> bool;

    /// Pull at most one unit of progress for `track` into `holder`.
    fn read_data(
        &mut self,
        track: usize,
        position_us: i64,
        holder: &mut SampleHolder,
        only_read_discontinuity: bool,
    ) -> ReadResult;

    /// Seek the selected tracks. Enabled state is unchanged.
    fn seek_to_us(&mut self, position_us: i64);

    /// Buffered horizon, or [`UNKNOWN_TIME_US`].
    fn buffered_position_us(&self) -> i64;

    /// Deselect a track. Disabling a disabled track is a no-op.
    fn disable(&mut self, track: usize);

    /// Close the demuxer. Must be called at most once.
    fn release(&mut self);
}

/// Observable lifecycle state of a [`SourceReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, not (successfully) prepared yet.
    Uninitialized,
    /// Demuxer open, tracks known.
    Prepared,
    /// Demuxer closed; only `maybe_throw_error` remains valid.
    Released,
}

#[derive(Debug)]
struct Prepared {
    demuxer: DemuxerHandle,
    tracks: Vec<TrackInfo>,
    enabled: Vec<bool>,
}

impl Prepared {
    fn check_track(&self, track: usize) {
        assert!(
            track < self.tracks.len(),
            "track index {} out of range ({} tracks)",
            track,
            self.tracks.len()
        );
    }
}

#[derive(Debug)]
enum Stage {
    Uninitialized,
    Prepared(Prepared),
    Released,
}

/// One session over one demuxer handle.
///
/// Created by [`SampleSource::register`](crate::SampleSource::register).
/// Every session opens its own demuxer; nothing mutable is shared between
/// sessions of the same source.
pub struct SourceReader {
    uri: String,
    headers: Headers,
    opener: Arc<dyn DemuxerOpener>,
    stage: Stage,
    /// Single-slot deferred error, cleared when consumed.
    pending_error: Option<SourceError>,
}

impl SourceReader {
    pub(crate) fn new(uri: &str, headers: Headers, opener: Arc<dyn DemuxerOpener>) -> Self {
        Self {
            uri: uri.to_string(),
            headers,
            opener,
            stage: Stage::Uninitialized,
            pending_error: None,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn state(&self) -> SessionState {
        match self.stage {
            Stage::Uninitialized => SessionState::Uninitialized,
            Stage::Prepared(_) => SessionState::Prepared,
            Stage::Released => SessionState::Released,
        }
    }

    /// Whether `track` is currently enabled. `false` unless prepared.
    pub fn is_enabled(&self, track: usize) -> bool {
        match &self.stage {
            Stage::Prepared(p) => p.enabled.get(track).copied().unwrap_or(false),
            _ => false,
        }
    }

    fn prepared(&self, op: &str) -> &Prepared {
        match &self.stage {
            Stage::Prepared(p) => p,
            Stage::Uninitialized => panic!("{} called before prepare succeeded", op),
            Stage::Released => panic!("{} called after release", op),
        }
    }

    fn prepared_mut(&mut self, op: &str) -> &mut Prepared {
        match &mut self.stage {
            Stage::Prepared(p) => p,
            Stage::Uninitialized => panic!("{} called before prepare succeeded", op),
            Stage::Released => panic!("{} called after release", op),
        }
    }

    fn open(&self, position_us: i64) -> Result<Prepared> {
        let mut demuxer = DemuxerHandle::open(self.opener.as_ref(), &self.uri, &self.headers)?;
        let tracks = demuxer.tracks()?;

        // The demuxer's initial selection is not trusted.
        for index in 0..tracks.len() {
            demuxer.deselect_track(index);
        }
        demuxer.seek(position_us)?;

        Ok(Prepared {
            demuxer,
            enabled: vec![false; tracks.len()],
            tracks,
        })
    }

    /// Park a failure for the next `maybe_throw_error`.
    fn defer(&mut self, op: &str, err: SourceError) {
        tracing::warn!(uri = %self.uri, op, error = %err, "demuxer failure deferred");
        self.pending_error = Some(err);
    }
}

impl SampleSourceReader for SourceReader {
    fn maybe_throw_error(&mut self) -> Result<()> {
        match self.pending_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn prepare(&mut self, position_us: i64) -> bool {
        match self.stage {
            Stage::Prepared(_) => return true,
            Stage::Released => panic!("prepare called after release"),
            Stage::Uninitialized => {}
        }

        match self.open(position_us) {
            Ok(prepared) => {
                tracing::debug!(
                    uri = %self.uri,
                    tracks = prepared.tracks.len(),
                    position_us,
                    "session prepared"
                );
                self.stage = Stage::Prepared(prepared);
                true
            }
            Err(err) => {
                tracing::warn!(uri = %self.uri, error = %err, "unable to prepare source");
                self.pending_error = Some(err);
                false
            }
        }
    }

    fn track_count(&self) -> usize {
        self.prepared("track_count").tracks.len()
    }

    fn format(&self, track: usize) -> TrackFormat {
        let p = self.prepared("format");
        p.check_track(track);

        let info = &p.tracks[track];
        let init_data = p.demuxer.init_data(track);
        let initialization_data: Vec<Vec<u8>> = split_init_data(&init_data)
            .into_iter()
            .map(<[u8]>::to_vec)
            .collect();

        tracing::trace!(
            track,
            mime = %info.mime_type,
            init_units = initialization_data.len(),
            "format queried"
        );

        TrackFormat {
            track_index: track,
            mime_type: info.mime_type.clone(),
            duration_us: info.duration_us,
            width: p.demuxer.width(track),
            height: p.demuxer.height(track),
            bitrate: p.demuxer.bitrate(track),
            max_input_size: MAX_INPUT_SIZE,
            initialization_data,
        }
    }

    fn enable(&mut self, track: usize, position_us: i64) {
        let p = self.prepared_mut("enable");
        p.check_track(track);
        p.demuxer.select_track(track);
        p.enabled[track] = true;
        let seeked = p.demuxer.seek(position_us);
        tracing::debug!(track, position_us, "track enabled");
        if let Err(err) = seeked {
            self.defer("enable", err);
        }
    }

    fn continue_buffering(&mut self, track: usize, _position_us: i64) -> bool {
        self.prepared("continue_buffering").check_track(track);
        // Buffering is left to the demuxer/transport; there is no buffered
        // range to consult yet.
        true
    }

    fn read_data(
        &mut self,
        track: usize,
        position_us: i64,
        holder: &mut SampleHolder,
        _only_read_discontinuity: bool,
    ) -> ReadResult {
        let p = self.prepared_mut("read_data");
        p.check_track(track);

        if holder.is_probe() {
            holder.size = 0;
            return ReadResult::SampleRead;
        }

        let read = p.demuxer.read_sample(track);
        match read {
            DemuxerRead::Error(err) => {
                self.defer("read_data", err);
                ReadResult::NothingRead
            }
            DemuxerRead::Sample(sample) => {
                if sample.data.len() > MAX_INPUT_SIZE {
                    tracing::warn!(
                        track,
                        size = sample.data.len(),
                        max = MAX_INPUT_SIZE,
                        "sample exceeds max input size, dropped"
                    );
                    return ReadResult::NothingRead;
                }
                holder.fill(&sample);
                tracing::trace!(
                    track,
                    position_us,
                    time_us = sample.time_us,
                    size = holder.size,
                    sync = holder.is_sync(),
                    "sample read"
                );
                ReadResult::SampleRead
            }
            DemuxerRead::Nothing => ReadResult::NothingRead,
            DemuxerRead::FormatChanged => {
                tracing::debug!(track, "format changed");
                ReadResult::FormatRead
            }
            DemuxerRead::EndOfStream => {
                tracing::debug!(track, "end of stream");
                ReadResult::EndOfStream
            }
        }
    }

    fn seek_to_us(&mut self, position_us: i64) {
        let seeked = self.prepared_mut("seek_to_us").demuxer.seek(position_us);
        tracing::debug!(position_us, "seek");
        if let Err(err) = seeked {
            self.defer("seek_to_us", err);
        }
    }

    fn buffered_position_us(&self) -> i64 {
        self.prepared("buffered_position_us")
            .demuxer
            .buffered_position_us()
            .unwrap_or(UNKNOWN_TIME_US)
    }

    fn disable(&mut self, track: usize) {
        let p = self.prepared_mut("disable");
        p.check_track(track);
        p.demuxer.deselect_track(track);
        if std::mem::replace(&mut p.enabled[track], false) {
            tracing::debug!(track, "track disabled");
        }
    }

    fn release(&mut self) {
        match std::mem::replace(&mut self.stage, Stage::Released) {
            Stage::Prepared(p) => p.demuxer.close(),
            Stage::Uninitialized => {}
            Stage::Released => panic!("release called twice"),
        }
        tracing::debug!(uri = %self.uri, "session released");
    }
}

impl std::fmt::Debug for SourceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceReader")
            .field("uri", &self.uri)
            .field("state", &self.state())
            .field("pending_error", &self.pending_error)
            .finish_non_exhaustive()
    }
}
