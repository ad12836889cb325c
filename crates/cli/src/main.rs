use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use rtsp_source::demuxer::{AnnexBConfig, AnnexBOpener, Headers};
use rtsp_source::media::h264::fmtp_parameters;
use rtsp_source::{ReadResult, SampleHolder, SampleSource, SampleSourceReader, engine};
use tracing_subscriber::EnvFilter;

/// Consecutive empty reads tolerated before giving up on a stalled source.
const MAX_EMPTY_READS: usize = 50;

#[derive(Parser)]
#[command(
    name = "rtsp-source-probe",
    about = "Prepare a sample source, print its tracks and pull samples"
)]
struct Args {
    /// Source URI (local path or file:// URI to an H.264 Annex B stream)
    uri: String,

    /// Frame rate used to timestamp elementary streams
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Maximum number of samples to read from the first track
    #[arg(long, short = 'n', default_value_t = 10)]
    samples: usize,

    /// Initial playback position in microseconds
    #[arg(long, default_value_t = 0)]
    seek_us: i64,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,
}

fn parse_headers(raw: &[String]) -> Headers {
    let mut headers = Headers::new();
    for header in raw {
        match header.split_once(':') {
            Some((name, value)) => headers.insert(name.trim(), value.trim()),
            None => eprintln!("ignoring malformed header {:?}", header),
        }
    }
    headers
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    engine::init();

    let opener = AnnexBOpener::new(AnnexBConfig {
        frame_rate: args.fps,
        ..AnnexBConfig::default()
    });
    let source = SampleSource::new(&args.uri, parse_headers(&args.headers), Arc::new(opener));
    let mut reader = source.register();

    if !reader.prepare(args.seek_us) {
        if let Err(e) = reader.maybe_throw_error() {
            eprintln!("Failed to prepare {}: {}", args.uri, e);
        }
        reader.release();
        engine::shutdown();
        return;
    }

    for track in 0..reader.track_count() {
        let format = reader.format(track);
        println!(
            "track {}: {} {}x{} bitrate={} duration_us={:?} init_units={}",
            track,
            format.mime_type,
            format.width,
            format.height,
            format.bitrate,
            format.duration_us,
            format.initialization_data.len()
        );
        if let Some(fmtp) = fmtp_parameters(&format.initialization_data) {
            println!("  fmtp: {}", fmtp);
        }
    }

    if reader.track_count() > 0 {
        reader.enable(0, args.seek_us);
        let mut holder = SampleHolder::with_capacity(reader.format(0).max_input_size);
        let mut read = 0;
        let mut empty_reads = 0;
        while read < args.samples {
            match reader.read_data(0, args.seek_us, &mut holder, false) {
                ReadResult::SampleRead => {
                    read += 1;
                    empty_reads = 0;
                    println!(
                        "sample time_us={} size={} sync={}",
                        holder.time_us,
                        holder.size,
                        holder.is_sync()
                    );
                }
                ReadResult::FormatRead => {
                    let format = reader.format(0);
                    println!("format changed: {}x{}", format.width, format.height);
                }
                ReadResult::EndOfStream => {
                    println!("end of stream");
                    break;
                }
                ReadResult::NothingRead => {
                    if let Err(e) = reader.maybe_throw_error() {
                        eprintln!("read failed: {}", e);
                        break;
                    }
                    empty_reads += 1;
                    if empty_reads >= MAX_EMPTY_READS {
                        eprintln!("no samples after {} attempts, giving up", empty_reads);
                        break;
                    }
                    thread::sleep(Duration::from_millis(20));
                }
            }
        }
        println!("buffered_position_us={}", reader.buffered_position_us());
        reader.disable(0);
    }

    reader.release();
    engine::shutdown();
}
