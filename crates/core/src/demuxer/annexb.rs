//! Demuxer for raw H.264 Annex B elementary streams.
//!
//! The stream is read fully into memory and cut into access units:
//!
//! - An AUD (type 9) always opens a new access unit.
//! - SPS, PPS and SEI open a new access unit when the current one already
//!   holds a coded slice.
//! - A slice with `first_mb_in_slice == 0` opens a new access unit when
//!   the current one already holds a coded slice.
//!
//! Elementary streams carry no timing, so timestamps are synthesized on a
//! 90 kHz clock from [`AnnexBConfig::frame_rate`]. Units containing an IDR
//! slice are flagged [`SampleFlags::SYNC`]; seeking snaps back to the
//! nearest preceding one. When in-band SPS/PPS change mid-stream the next
//! read reports [`DemuxerRead::FormatChanged`] before the first sample
//! using the new parameters.

use std::path::PathBuf;

use super::{Demuxer, DemuxerOpener, DemuxerRead, Headers};
use crate::engine;
use crate::error::{Result, SourceError};
use crate::media::h264::{self, NAL_AUD, NAL_IDR, NAL_PPS, NAL_SEI, NAL_SPS};
use crate::media::sps;
use crate::sample::{DemuxedSample, SampleFlags, pts_to_us};
use crate::track::{TrackInfo, mime_type_for};

/// RTP video clock (RFC 6184 §8.1), used for synthesized timestamps.
const CLOCK_RATE: u32 = 90_000;

/// Settings for [`AnnexBDemuxer`].
#[derive(Debug, Clone)]
pub struct AnnexBConfig {
    /// Frames per second used to synthesize timestamps.
    pub frame_rate: f64,
    /// Reported bitrate. When `None`, it is estimated from the stream size
    /// and duration.
    pub bitrate: Option<u32>,
}

impl Default for AnnexBConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            bitrate: None,
        }
    }
}

/// Opens [`AnnexBDemuxer`]s from local paths or `file://` URIs.
#[derive(Debug, Clone, Default)]
pub struct AnnexBOpener {
    config: AnnexBConfig,
}

impl AnnexBOpener {
    pub fn new(config: AnnexBConfig) -> Self {
        Self { config }
    }
}

impl DemuxerOpener for AnnexBOpener {
    fn open(&self, uri: &str, headers: &Headers) -> Result<Box<dyn Demuxer>> {
        engine::ensure_initialized()?;

        let path = path_from_uri(uri)?;
        if !headers.is_empty() {
            tracing::debug!(uri, headers = headers.len(), "request headers ignored for local stream");
        }

        let data = std::fs::read(&path)?;

        let demuxer = AnnexBDemuxer::from_bytes(uri, &data, self.config.clone())?;
        Ok(Box::new(demuxer))
    }
}

/// Resolve a source URI to a local path.
///
/// `file:///tmp/a.h264` → `/tmp/a.h264`
/// `/tmp/a.h264`        → `/tmp/a.h264`
/// `rtsp://host/stream` → [`SourceError::InvalidUri`] (no network transport)
fn path_from_uri(uri: &str) -> Result<PathBuf> {
    if let Some(path) = uri.strip_prefix("file://") {
        if path.is_empty() {
            return Err(SourceError::InvalidUri(uri.to_string()));
        }
        return Ok(PathBuf::from(path));
    }
    if uri.contains("://") || uri.is_empty() {
        return Err(SourceError::InvalidUri(uri.to_string()));
    }
    Ok(PathBuf::from(uri))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ParameterSets {
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl ParameterSets {
    fn init_data(&self) -> Vec<u8> {
        let units: Vec<&[u8]> = [self.sps.as_deref(), self.pps.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        h264::build_annexb(&units)
    }
}

#[derive(Debug)]
struct AccessUnit {
    data: Vec<u8>,
    time_us: i64,
    sync: bool,
    /// Index into `AnnexBDemuxer::parameter_sets` in force for this unit.
    params: usize,
}

/// Single-track demuxer over an in-memory H.264 Annex B stream.
#[derive(Debug)]
pub struct AnnexBDemuxer {
    uri: String,
    config: AnnexBConfig,
    units: Vec<AccessUnit>,
    parameter_sets: Vec<ParameterSets>,
    duration_us: i64,
    total_bytes: usize,
    /// Parameter sets the consumer currently knows about.
    active_params: usize,
    cursor: usize,
    selected: bool,
    closed: bool,
}

impl AnnexBDemuxer {
    /// Parse an Annex B stream. Fails with [`SourceError::NoTracks`] when
    /// the stream holds no coded slices.
    pub fn from_bytes(uri: &str, data: &[u8], config: AnnexBConfig) -> Result<Self> {
        if !(config.frame_rate.is_finite() && config.frame_rate > 0.0) {
            return Err(SourceError::Open {
                uri: uri.to_string(),
                reason: format!("invalid frame rate {}", config.frame_rate),
            });
        }
        let ticks_per_frame = (CLOCK_RATE as f64 / config.frame_rate).round().max(1.0) as i64;

        let mut splitter = AccessUnitSplitter::default();
        for nal in h264::extract_nal_units(data) {
            splitter.push(nal);
        }
        let (raw_units, parameter_sets) = splitter.finish();

        if raw_units.is_empty() {
            return Err(SourceError::NoTracks {
                uri: uri.to_string(),
            });
        }
        // Bounds every unit's pts as well.
        let total_ticks = i64::try_from(raw_units.len())
            .ok()
            .and_then(|n| n.checked_mul(ticks_per_frame))
            .ok_or_else(|| SourceError::Open {
                uri: uri.to_string(),
                reason: format!(
                    "frame rate {} too low for {} access units",
                    config.frame_rate,
                    raw_units.len()
                ),
            })?;

        let units: Vec<AccessUnit> = raw_units
            .into_iter()
            .enumerate()
            .map(|(i, raw)| AccessUnit {
                data: h264::build_annexb(&raw.nals.iter().map(Vec::as_slice).collect::<Vec<_>>()),
                time_us: pts_to_us(i as i64 * ticks_per_frame, 1, CLOCK_RATE),
                sync: raw.sync,
                params: raw.params,
            })
            .collect();

        let duration_us = pts_to_us(total_ticks, 1, CLOCK_RATE);
        let total_bytes = units.iter().map(|u| u.data.len()).sum();
        let active_params = units[0].params;

        tracing::debug!(
            uri,
            access_units = units.len(),
            keyframes = units.iter().filter(|u| u.sync).count(),
            parameter_sets = parameter_sets.len(),
            duration_us,
            "Annex B stream parsed"
        );

        Ok(Self {
            uri: uri.to_string(),
            config,
            units,
            parameter_sets,
            duration_us,
            total_bytes,
            active_params,
            cursor: 0,
            selected: false,
            closed: false,
        })
    }

    pub fn duration_us(&self) -> i64 {
        self.duration_us
    }

    pub fn access_unit_count(&self) -> usize {
        self.units.len()
    }

    fn active_sps(&self) -> Option<&[u8]> {
        self.parameter_sets
            .get(self.active_params)
            .and_then(|p| p.sps.as_deref())
    }

    fn dimensions(&self) -> (u32, u32) {
        self.active_sps()
            .and_then(sps::parse_sps_dimensions)
            .unwrap_or((0, 0))
    }
}

impl Demuxer for AnnexBDemuxer {
    fn tracks(&mut self) -> Result<Vec<TrackInfo>> {
        Ok(vec![TrackInfo::new(
            mime_type_for("video", "h264"),
            Some(self.duration_us),
        )])
    }

    fn select_track(&mut self, index: usize) {
        debug_assert_eq!(index, 0);
        self.selected = true;
    }

    fn deselect_track(&mut self, index: usize) {
        debug_assert_eq!(index, 0);
        self.selected = false;
    }

    fn seek(&mut self, position_us: i64) -> Result<()> {
        let target = self
            .units
            .iter()
            .rposition(|u| u.sync && u.time_us <= position_us)
            .unwrap_or(0);
        tracing::trace!(
            uri = %self.uri,
            position_us,
            landed_us = self.units[target].time_us,
            "seek"
        );
        self.cursor = target;
        Ok(())
    }

    fn width(&self, _index: usize) -> u32 {
        self.dimensions().0
    }

    fn height(&self, _index: usize) -> u32 {
        self.dimensions().1
    }

    fn bitrate(&self, _index: usize) -> u32 {
        if let Some(bitrate) = self.config.bitrate {
            return bitrate;
        }
        if self.duration_us <= 0 {
            return 0;
        }
        let bps = self.total_bytes as u128 * 8 * 1_000_000 / self.duration_us as u128;
        bps.min(u32::MAX as u128) as u32
    }

    fn init_data(&self, _index: usize) -> Vec<u8> {
        self.parameter_sets
            .get(self.active_params)
            .map(ParameterSets::init_data)
            .unwrap_or_default()
    }

    fn read_sample(&mut self, track: usize) -> DemuxerRead {
        if self.closed || track != 0 || !self.selected {
            return DemuxerRead::Nothing;
        }
        let Some(unit) = self.units.get(self.cursor) else {
            return DemuxerRead::EndOfStream;
        };
        if unit.params != self.active_params {
            tracing::debug!(uri = %self.uri, time_us = unit.time_us, "parameter sets changed");
            self.active_params = unit.params;
            return DemuxerRead::FormatChanged;
        }

        let sample = DemuxedSample {
            time_us: unit.time_us,
            flags: if unit.sync {
                SampleFlags::SYNC
            } else {
                SampleFlags::empty()
            },
            data: unit.data.clone(),
        };
        self.cursor += 1;
        DemuxerRead::Sample(sample)
    }

    fn buffered_position_us(&self) -> Option<i64> {
        Some(self.duration_us)
    }

    fn close(&mut self) {
        self.closed = true;
        self.units.clear();
        self.parameter_sets.clear();
        tracing::trace!(uri = %self.uri, "Annex B stream released");
    }
}

#[derive(Debug, Default)]
struct RawAccessUnit {
    nals: Vec<Vec<u8>>,
    has_vcl: bool,
    sync: bool,
    params: usize,
}

/// Groups NAL units into access units while tracking parameter sets.
#[derive(Debug, Default)]
struct AccessUnitSplitter {
    current: RawAccessUnit,
    units: Vec<RawAccessUnit>,
    params: ParameterSets,
    parameter_sets: Vec<ParameterSets>,
}

impl AccessUnitSplitter {
    fn push(&mut self, nal: &[u8]) {
        let Some(nal_type) = h264::nal_type(nal) else {
            return;
        };

        let opens_unit = match nal_type {
            NAL_AUD => true,
            NAL_SPS | NAL_PPS | NAL_SEI => self.current.has_vcl,
            _ => self.current.has_vcl && h264::starts_picture(nal),
        };
        if opens_unit {
            self.flush();
        }

        match nal_type {
            NAL_SPS => self.params.sps = Some(nal.to_vec()),
            NAL_PPS => self.params.pps = Some(nal.to_vec()),
            _ => {}
        }
        if h264::is_vcl(nal) {
            self.current.has_vcl = true;
            self.current.sync |= nal_type == NAL_IDR;
        }
        self.current.nals.push(nal.to_vec());
    }

    /// Close the current unit. Units without a coded slice are merged into
    /// the next one instead of being emitted on their own.
    fn flush(&mut self) {
        if !self.current.has_vcl {
            return;
        }
        if self.parameter_sets.last() != Some(&self.params) {
            self.parameter_sets.push(self.params.clone());
        }
        let mut unit = std::mem::take(&mut self.current);
        unit.params = self.parameter_sets.len() - 1;
        self.units.push(unit);
    }

    /// Close the stream. Trailing NAL units without a coded slice (SEI,
    /// end of sequence) belong to the last access unit.
    fn finish(mut self) -> (Vec<RawAccessUnit>, Vec<ParameterSets>) {
        if self.current.has_vcl {
            self.flush();
        } else if let Some(last) = self.units.last_mut() {
            last.nals.append(&mut self.current.nals);
        }
        (self.units, self.parameter_sets)
    }
}
