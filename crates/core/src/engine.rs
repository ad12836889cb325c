//! Process-wide demuxer engine lifecycle.
//!
//! The hosting application calls [`init`] once at startup, before any
//! source is prepared, and [`shutdown`] once at exit after every session
//! has been released. Built-in demuxers refuse to open while the engine
//! is down; the refusal reaches the consumer as a deferred open failure.
//!
//! ```
//! rtsp_source::engine::init();
//! assert!(rtsp_source::engine::is_initialized());
//! ```

use std::time::Instant;

use parking_lot::Mutex;

use crate::error::{Result, SourceError};

#[derive(Debug)]
struct EngineState {
    started_at: Option<Instant>,
}

static ENGINE: Mutex<EngineState> = Mutex::new(EngineState { started_at: None });

/// Bring up the demuxer engine. Calling it again while up is a no-op.
pub fn init() {
    let mut engine = ENGINE.lock();
    if engine.started_at.is_some() {
        tracing::trace!("demuxer engine already initialized");
        return;
    }
    engine.started_at = Some(Instant::now());
    tracing::info!("demuxer engine initialized");
}

/// Tear the engine down. Sessions still holding a demuxer keep working
/// until released, but no new demuxer can be opened.
pub fn shutdown() {
    let mut engine = ENGINE.lock();
    if let Some(started_at) = engine.started_at.take() {
        tracing::info!(uptime = ?started_at.elapsed(), "demuxer engine shut down");
    }
}

/// Whether [`init`] has been called without a matching [`shutdown`].
pub fn is_initialized() -> bool {
    ENGINE.lock().started_at.is_some()
}

/// Fails with [`SourceError::EngineNotInitialized`] while the engine is down.
pub fn ensure_initialized() -> Result<()> {
    if is_initialized() {
        Ok(())
    } else {
        Err(SourceError::EngineNotInitialized)
    }
}
