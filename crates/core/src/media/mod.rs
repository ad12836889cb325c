//! Codec bitstream helpers.
//!
//! Demuxers hand out codec initialization data as one opaque blob per
//! track. For H.264 that blob is an Annex B run of parameter sets:
//!
//! ```text
//! 00 00 00 01 | 67 ... (SPS) | 00 00 00 01 | 68 ... (PPS)
//! ```
//!
//! Consumers want one buffer per parameter set, which is what
//! [`h264::split_init_data`] produces.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`h264`] | Init-data splitting, NAL extraction, `fmtp` rendering (RFC 6184) |
//! | [`sps`] | SPS geometry parsing (ITU-T H.264 §7.3.2.1) |

pub mod h264;
pub mod sps;

pub use h264::split_init_data;
