//! Engine lifecycle: opening is refused while the engine is down.
//!
//! Kept in its own test binary because it toggles process-wide state.

use std::sync::Arc;

use rtsp_source::demuxer::{AnnexBOpener, Headers};
use rtsp_source::{SampleSource, SampleSourceReader, SourceError, engine};

#[test]
fn open_refused_until_engine_initialized() {
    let source = SampleSource::new(
        "/tmp/rtsp-source-engine.h264",
        Headers::new(),
        Arc::new(AnnexBOpener::default()),
    );
    let mut reader = source.register();

    engine::shutdown();
    assert!(!engine::is_initialized());
    assert!(!reader.prepare(0));
    assert!(matches!(
        reader.maybe_throw_error(),
        Err(SourceError::EngineNotInitialized)
    ));

    engine::init();
    assert!(engine::is_initialized());
    // engine is up; the missing file is now the failure
    assert!(!reader.prepare(0));
    assert!(matches!(reader.maybe_throw_error(), Err(SourceError::Io(_))));

    engine::shutdown();
    reader.release();
}
