//! Integration test: full pull cycle register → prepare → format → enable →
//! read → seek → release against an Annex B stream written to disk.

use std::path::PathBuf;
use std::sync::Arc;

use rtsp_source::demuxer::{AnnexBConfig, AnnexBOpener, Headers};
use rtsp_source::media::h264;
use rtsp_source::{
    ReadResult, SampleHolder, SampleSource, SampleSourceReader, SessionState, SourceError, engine,
};

// Baseline 320x240 SPS, PPS, one IDR slice and one P slice.
const SPS: [u8; 8] = [0x67, 0x42, 0x00, 0x1e, 0xf4, 0x0a, 0x0f, 0xc8];
const PPS: [u8; 4] = [0x68, 0xce, 0x38, 0x80];
const IDR: [u8; 3] = [0x65, 0x88, 0x84];
const P_SLICE: [u8; 3] = [0x41, 0x9a, 0x02];

/// Two GOPs of 15 frames each.
fn write_stream(name: &str) -> PathBuf {
    let mut nals: Vec<&[u8]> = Vec::new();
    for _ in 0..2 {
        nals.extend_from_slice(&[&SPS[..], &PPS[..], &IDR[..]]);
        for _ in 0..14 {
            nals.push(&P_SLICE[..]);
        }
    }
    let path = std::env::temp_dir().join(format!("rtsp-source-{}-{}.h264", name, std::process::id()));
    std::fs::write(&path, h264::build_annexb(&nals)).expect("write test stream");
    path
}

fn source_for(path: &PathBuf) -> SampleSource {
    engine::init();
    let opener = AnnexBOpener::new(AnnexBConfig {
        frame_rate: 25.0,
        ..AnnexBConfig::default()
    });
    SampleSource::new(
        format!("file://{}", path.display()),
        Headers::new(),
        Arc::new(opener),
    )
}

#[test]
fn full_pull_cycle() {
    let path = write_stream("cycle");
    let source = source_for(&path);
    let mut reader = source.register();

    assert!(reader.prepare(0), "prepare: {:?}", reader.maybe_throw_error());
    assert_eq!(reader.track_count(), 1);

    let format = reader.format(0);
    assert_eq!(format.mime_type, "video/avc");
    assert_eq!((format.width, format.height), (320, 240));
    assert_eq!(format.duration_us, Some(1_200_000));
    assert_eq!(format.initialization_data.len(), 2);
    assert_eq!(h264::strip_start_code(&format.initialization_data[0]), &SPS);
    assert_eq!(h264::strip_start_code(&format.initialization_data[1]), &PPS);

    // nothing flows until the track is enabled
    let mut holder = SampleHolder::with_capacity(format.max_input_size);
    assert_eq!(reader.read_data(0, 0, &mut holder, false), ReadResult::NothingRead);

    reader.enable(0, 0);
    assert!(reader.continue_buffering(0, 0));

    let mut times = Vec::new();
    loop {
        match reader.read_data(0, 0, &mut holder, false) {
            ReadResult::SampleRead => {
                assert!(holder.size > 0);
                times.push((holder.time_us, holder.is_sync()));
            }
            ReadResult::EndOfStream => break,
            other => panic!("unexpected read result {:?}", other),
        }
    }
    assert_eq!(times.len(), 30);
    assert_eq!(times[0], (0, true));
    assert_eq!(times[1], (40_000, false));
    assert_eq!(times[15], (600_000, true));
    assert_eq!(reader.buffered_position_us(), 1_200_000);

    // seek lands on the second GOP's keyframe, track stays enabled
    reader.seek_to_us(900_000);
    assert!(reader.is_enabled(0));
    assert_eq!(reader.read_data(0, 900_000, &mut holder, false), ReadResult::SampleRead);
    assert_eq!(holder.time_us, 600_000);
    assert!(holder.is_sync());

    reader.disable(0);
    assert_eq!(reader.read_data(0, 0, &mut holder, false), ReadResult::NothingRead);

    reader.release();
    assert_eq!(reader.state(), SessionState::Released);
    assert!(reader.maybe_throw_error().is_ok());

    std::fs::remove_file(&path).ok();
}

#[test]
fn prepare_seeks_to_start_position() {
    let path = write_stream("start");
    let source = source_for(&path);
    let mut reader = source.register();

    assert!(reader.prepare(700_000));
    reader.enable(0, 700_000);
    let mut holder = SampleHolder::with_capacity(1024);
    assert_eq!(reader.read_data(0, 700_000, &mut holder, false), ReadResult::SampleRead);
    assert_eq!(holder.time_us, 600_000);

    reader.release();
    std::fs::remove_file(&path).ok();
}

#[test]
fn independent_sessions_from_one_source() {
    let path = write_stream("shared");
    let source = source_for(&path);
    let mut a = source.register();
    let mut b = source.register();

    assert!(a.prepare(0));
    assert!(b.prepare(0));
    a.enable(0, 0);
    b.enable(0, 0);

    let mut holder = SampleHolder::with_capacity(1024);
    for _ in 0..3 {
        assert_eq!(a.read_data(0, 0, &mut holder, false), ReadResult::SampleRead);
    }
    a.release();

    // b still starts from the beginning and is unaffected by a's release
    assert_eq!(b.read_data(0, 0, &mut holder, false), ReadResult::SampleRead);
    assert_eq!(holder.time_us, 0);
    b.release();

    std::fs::remove_file(&path).ok();
}

#[test]
fn missing_file_is_deferred_open_failure() {
    let source = source_for(&std::env::temp_dir().join("rtsp-source-does-not-exist.h264"));
    let mut reader = source.register();

    assert!(!reader.prepare(0));
    assert_eq!(reader.state(), SessionState::Uninitialized);
    assert!(matches!(reader.maybe_throw_error(), Err(SourceError::Io(_))));
    assert!(reader.maybe_throw_error().is_ok());
    reader.release();
}

#[test]
fn network_uri_rejected() {
    engine::init();
    let source = SampleSource::new(
        "rtsp://127.0.0.1:8554/stream",
        Headers::new(),
        Arc::new(AnnexBOpener::default()),
    );
    let mut reader = source.register();
    assert!(!reader.prepare(0));
    assert!(matches!(reader.maybe_throw_error(), Err(SourceError::InvalidUri(_))));
}

#[test]
fn probe_read_on_live_session() {
    let path = write_stream("probe");
    let source = source_for(&path);
    let mut reader = source.register();
    assert!(reader.prepare(0));
    reader.enable(0, 0);

    let mut probe = SampleHolder::probe();
    assert_eq!(reader.read_data(0, 0, &mut probe, false), ReadResult::SampleRead);
    assert_eq!(probe.size, 0);

    // the probe consumed nothing
    let mut holder = SampleHolder::with_capacity(1024);
    assert_eq!(reader.read_data(0, 0, &mut holder, false), ReadResult::SampleRead);
    assert_eq!(holder.time_us, 0);

    reader.release();
    std::fs::remove_file(&path).ok();
}
