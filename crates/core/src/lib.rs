pub mod demuxer;
pub mod engine;
pub mod error;
pub mod media;
pub mod sample;
pub mod session;
pub mod source;
pub mod track;

pub use error::{Result, SourceError};
pub use sample::{ReadResult, SampleFlags, SampleHolder, UNKNOWN_TIME_US};
pub use session::{SampleSourceReader, SessionState, SourceReader};
pub use source::SampleSource;
pub use track::{MAX_INPUT_SIZE, TrackFormat, TrackInfo};
