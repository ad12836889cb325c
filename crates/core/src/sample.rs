//! Sample containers exchanged between demuxer, session and consumer.

use bitflags::bitflags;

/// Sentinel for "time not known", as used by the consuming pipeline.
pub const UNKNOWN_TIME_US: i64 = i64::MIN + 1;

bitflags! {
    /// Per-sample flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SampleFlags: u32 {
        /// The sample is a sync point (keyframe); decoding may start here.
        const SYNC = 0x1;
    }
}

/// Outcome of a single [`read_data`](crate::session::SampleSourceReader::read_data) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    /// Nothing available right now; retry later.
    NothingRead,
    /// The sample holder was populated.
    SampleRead,
    /// The track's format changed; query it again before the next sample.
    FormatRead,
    /// The track has no more samples.
    EndOfStream,
}

/// Caller-owned destination for one sample.
///
/// A holder without a buffer (or with a zero-capacity one) turns
/// `read_data` into a probe: it reports a zero-size sample and leaves the
/// demuxer untouched.
#[derive(Debug, Default)]
pub struct SampleHolder {
    pub data: Option<Vec<u8>>,
    /// Bytes of `data` holding the last sample.
    pub size: usize,
    pub time_us: i64,
    pub flags: SampleFlags,
}

impl SampleHolder {
    /// Holder with a buffer of the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Some(Vec::with_capacity(capacity)),
            ..Self::default()
        }
    }

    /// Holder without a buffer, for probe reads.
    pub fn probe() -> Self {
        Self::default()
    }

    pub(crate) fn is_probe(&self) -> bool {
        self.data.as_ref().is_none_or(|d| d.capacity() == 0)
    }

    /// Copy a demuxed sample in, replacing the previous contents.
    pub(crate) fn fill(&mut self, sample: &DemuxedSample) {
        if let Some(data) = self.data.as_mut() {
            data.clear();
            data.extend_from_slice(&sample.data);
        }
        self.size = sample.data.len();
        self.time_us = sample.time_us;
        self.flags = sample.flags;
    }

    pub fn is_sync(&self) -> bool {
        self.flags.contains(SampleFlags::SYNC)
    }
}

/// One encoded sample as produced by a demuxer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxedSample {
    pub time_us: i64,
    pub flags: SampleFlags,
    pub data: Vec<u8>,
}

/// Convert a presentation timestamp in `num/den` second units to microseconds.
///
/// ```
/// use rtsp_source::sample::pts_to_us;
///
/// // 90 kHz clock: 3000 ticks is one frame at 30 fps
/// assert_eq!(pts_to_us(3000, 1, 90_000), 33_333);
/// ```
pub fn pts_to_us(pts: i64, num: u32, den: u32) -> i64 {
    if den == 0 {
        return UNKNOWN_TIME_US;
    }
    let us = pts as i128 * num as i128 * 1_000_000 / den as i128;
    us.clamp(i64::MIN as i128 + 2, i64::MAX as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(data: &[u8]) -> DemuxedSample {
        DemuxedSample {
            time_us: 40_000,
            flags: SampleFlags::SYNC,
            data: data.to_vec(),
        }
    }

    #[test]
    fn missing_buffer_is_probe() {
        assert!(SampleHolder::probe().is_probe());
        assert!(SampleHolder::with_capacity(0).is_probe());
        assert!(!SampleHolder::with_capacity(16).is_probe());
    }

    #[test]
    fn fill_replaces_previous_sample() {
        let mut holder = SampleHolder::with_capacity(16);
        holder.fill(&sample(&[1, 2, 3, 4]));
        holder.fill(&sample(&[9, 8]));
        assert_eq!(holder.data.as_deref(), Some(&[9u8, 8][..]));
        assert_eq!(holder.size, 2);
        assert_eq!(holder.time_us, 40_000);
        assert!(holder.is_sync());
    }

    #[test]
    fn pts_conversion() {
        assert_eq!(pts_to_us(1, 1, 1000), 1000);
        assert_eq!(pts_to_us(90_000, 1, 90_000), 1_000_000);
        assert_eq!(pts_to_us(5, 1, 0), UNKNOWN_TIME_US);
    }
}
