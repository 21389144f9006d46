use egui::{Color32, Pos2};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, RgbaImage};
use magic_message::background::Background;
use magic_message::error::{ExportError, ExportResult};
use magic_message::export::{
    CancelToken, DirectorySink, ExportRequest, FrameEncoder, GifExporter, OutputSink,
    ResultLocation,
};
use magic_message::stroke::{BrushEffect, Stroke, TimedPoint};
use parking_lot::Mutex;
use std::io::{self, BufReader, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const CYAN: Color32 = Color32::from_rgb(0, 255, 255);

fn stroke(effect: BrushEffect, width: f32, points: &[(f32, f32, u64)]) -> Stroke {
    Stroke::new(
        CYAN,
        width,
        effect,
        points
            .iter()
            .map(|&(x, y, t)| TimedPoint::new(Pos2::new(x, y), t))
            .collect(),
    )
    .unwrap()
}

/// Keeps frames in memory
#[derive(Default)]
struct RecordingEncoder {
    frames: Vec<(RgbaImage, u64)>,
    closed: bool,
}

impl FrameEncoder for RecordingEncoder {
    fn encode_frame(&mut self, frame: RgbaImage, duration_ms: u64) -> ExportResult<()> {
        self.frames.push((frame, duration_ms));
        Ok(())
    }

    fn close(&mut self) -> ExportResult<()> {
        self.closed = true;
        Ok(())
    }
}

fn replay(request: &ExportRequest) -> (RecordingEncoder, Vec<u8>) {
    let mut encoder = RecordingEncoder::default();
    let mut progress = Vec::new();
    GifExporter::default()
        .replay(request, &mut encoder, &CancelToken::new(), &mut |p| progress.push(p))
        .unwrap();
    (encoder, progress)
}

fn assert_monotonic_to_100(progress: &[u8]) {
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.iter().all(|&p| p <= 100));
}

#[test]
fn test_two_point_stroke_exports_readable_gif() {
    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path());
    let request = ExportRequest::new(
        vec![stroke(BrushEffect::None, 12.0, &[(100.0, 200.0, 0), (600.0, 900.0, 33)])],
        1080,
        1920,
        Background::Solid(Color32::BLACK),
    );

    let mut progress = Vec::new();
    let location = GifExporter::default()
        .export(&request, &sink, &CancelToken::new(), &mut |p| progress.push(p))
        .unwrap();

    assert_eq!(progress.last(), Some(&100));
    assert!(location.path().starts_with(dir.path()));
    assert!(std::fs::metadata(location.path()).unwrap().len() > 0);

    let file = std::fs::File::open(location.path()).unwrap();
    let frames = GifDecoder::new(BufReader::new(file))
        .unwrap()
        .into_frames()
        .collect_frames()
        .unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].buffer().dimensions(), (1080, 1920));
}

#[test]
fn test_strokes_are_revealed_over_time() {
    let request = ExportRequest::new(
        vec![stroke(BrushEffect::None, 8.0, &[(10.0, 24.0, 0), (54.0, 24.0, 40)])],
        64,
        48,
        Background::Solid(Color32::BLACK),
    );
    let (encoder, progress) = replay(&request);

    // 0, 33 and the stroke end at 40
    assert_eq!(encoder.frames.len(), 3);
    assert!(encoder.frames.iter().all(|(_, duration)| *duration == 33));
    assert_eq!(progress, vec![0, 83, 100]);

    let middle = |frame: &RgbaImage| frame.get_pixel(32, 24).0;
    assert_eq!(middle(&encoder.frames[0].0), [0, 0, 0, 255]);
    assert_eq!(middle(&encoder.frames[2].0), [0, 255, 255, 255]);
    assert!(!encoder.closed);
}

#[test]
fn test_progress_spans_every_stroke() {
    let request = ExportRequest::new(
        vec![
            stroke(BrushEffect::Glow, 4.0, &[(2.0, 2.0, 0), (20.0, 2.0, 100)]),
            stroke(BrushEffect::Neon, 4.0, &[(5.0, 5.0, 0)]),
            stroke(BrushEffect::None, 4.0, &[(2.0, 20.0, 0), (9.0, 9.0, 50), (20.0, 20.0, 100)]),
        ],
        32,
        32,
        Background::LinearGradient {
            colors: vec![Color32::BLUE, Color32::RED],
            start: None,
            end: None,
        },
    );
    let (encoder, progress) = replay(&request);

    // 0,33,66,99,100 + 0 + 0,33,66,99,100
    assert_eq!(encoder.frames.len(), 11);
    assert_eq!(progress.len(), 11);
    assert_monotonic_to_100(&progress);
}

#[test]
fn test_zero_duration_recording_reports_complete() {
    let request = ExportRequest::new(
        vec![stroke(BrushEffect::Glow, 6.0, &[(8.0, 8.0, 0)])],
        16,
        16,
        Background::default(),
    );
    let (encoder, progress) = replay(&request);
    assert_eq!(encoder.frames.len(), 1);
    assert_eq!(progress, vec![100]);
}

#[test]
fn test_sparkle_export_is_deterministic() {
    let request = ExportRequest::new(
        vec![stroke(
            BrushEffect::Sparkle,
            6.0,
            &[(4.0, 4.0, 0), (20.0, 10.0, 30), (40.0, 30.0, 70)],
        )],
        48,
        40,
        Background::Solid(Color32::BLACK),
    );
    let (first, _) = replay(&request);
    let (second, _) = replay(&request);
    assert_eq!(first.frames.len(), second.frames.len());
    for ((a, _), (b, _)) in first.frames.iter().zip(&second.frames) {
        assert_eq!(a.as_raw(), b.as_raw());
    }
}

#[test]
fn test_empty_recording_exports_background_frame() {
    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path());
    let request = ExportRequest::new(Vec::new(), 20, 10, Background::Solid(Color32::GREEN));

    let mut progress = Vec::new();
    let location = GifExporter::default()
        .export(&request, &sink, &CancelToken::new(), &mut |p| progress.push(p))
        .unwrap();

    assert_eq!(progress, vec![100]);
    let decoded = image::open(location.path()).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (20, 10));
    let [r, g, b, _] = decoded.get_pixel(10, 5).0;
    assert!(g > 200 && r < 40 && b < 40);
}

#[test]
fn test_invalid_dimensions_fail_before_output() {
    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path().join("out"));
    let request = ExportRequest::new(Vec::new(), 0, 100, Background::default());

    let err = GifExporter::default()
        .export(&request, &sink, &CancelToken::new(), &mut |_| {})
        .unwrap_err();
    assert!(matches!(err, ExportError::InvalidDimensions { width: 0, height: 100 }));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_cancelled_export_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path().join("out"));
    let request = ExportRequest::new(
        vec![stroke(BrushEffect::None, 4.0, &[(1.0, 1.0, 0), (9.0, 9.0, 200)])],
        16,
        16,
        Background::default(),
    );
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = GifExporter::default()
        .export(&request, &sink, &cancel, &mut |_| {})
        .unwrap_err();
    assert!(matches!(err, ExportError::Cancelled));
    assert!(!dir.path().join("out").exists());
}

/// Accepts a few bytes, then fails every write
struct BrokenWriter {
    budget: usize,
}

impl Write for BrokenWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::other("disk full"));
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct BrokenSink {
    discarded: Mutex<Vec<ResultLocation>>,
}

impl OutputSink for BrokenSink {
    fn create(&self, _mime: &str, display_name: &str) -> io::Result<(Box<dyn Write + Send>, ResultLocation)> {
        Ok((
            Box::new(BrokenWriter { budget: 16 }),
            ResultLocation::new(format!("/nowhere/{}.gif", display_name)),
        ))
    }

    fn discard(&self, location: &ResultLocation) -> io::Result<()> {
        self.discarded.lock().push(location.clone());
        Ok(())
    }
}

#[test]
fn test_failed_copy_discards_destination() {
    let sink = Arc::new(BrokenSink::default());
    let request = ExportRequest::new(
        vec![stroke(BrushEffect::Glow, 4.0, &[(1.0, 1.0, 0), (9.0, 9.0, 40)])],
        16,
        16,
        Background::default(),
    );

    let err = GifExporter::default()
        .export(&request, sink.as_ref(), &CancelToken::new(), &mut |_| {})
        .unwrap_err();
    assert!(matches!(err, ExportError::Io(_)));

    let discarded = sink.discarded.lock();
    assert_eq!(discarded.len(), 1);
    assert!(discarded[0].path().starts_with("/nowhere"));
}

/// What a [`ScriptedEncoder`] saw, kept after the encoder is gone
#[derive(Debug, Default)]
struct EncoderLog {
    frames: usize,
    closes: usize,
}

/// Fails on frame `fail_at`, if set
struct ScriptedEncoder {
    log: Arc<Mutex<EncoderLog>>,
    fail_at: Option<usize>,
}

impl FrameEncoder for ScriptedEncoder {
    fn encode_frame(&mut self, _frame: RgbaImage, _duration_ms: u64) -> ExportResult<()> {
        let mut log = self.log.lock();
        if self.fail_at == Some(log.frames) {
            return Err(io::Error::other("encoder rejected frame").into());
        }
        log.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> ExportResult<()> {
        self.log.lock().closes += 1;
        Ok(())
    }
}

/// Counts destinations it was asked for
#[derive(Default)]
struct CountingSink {
    created: AtomicUsize,
}

impl OutputSink for CountingSink {
    fn create(&self, _mime: &str, display_name: &str) -> io::Result<(Box<dyn Write + Send>, ResultLocation)> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok((Box::new(io::sink()), ResultLocation::new(format!("/counted/{}.gif", display_name))))
    }

    fn discard(&self, _location: &ResultLocation) -> io::Result<()> {
        Ok(())
    }
}

fn long_request() -> ExportRequest {
    ExportRequest::new(
        vec![stroke(BrushEffect::Sparkle, 4.0, &[(1.0, 1.0, 0), (14.0, 14.0, 330)])],
        16,
        16,
        Background::default(),
    )
}

#[test]
fn test_encoder_failure_mid_export_closes_and_skips_sink() {
    let log = Arc::new(Mutex::new(EncoderLog::default()));
    let sink = CountingSink::default();
    let mut progress = Vec::new();

    let encoder_log = Arc::clone(&log);
    let err = GifExporter::default()
        .export_with(
            &long_request(),
            &sink,
            &CancelToken::new(),
            &mut |p| progress.push(p),
            move |_file, _width, _height| {
                Ok(ScriptedEncoder {
                    log: encoder_log,
                    fail_at: Some(3),
                })
            },
        )
        .unwrap_err();

    assert!(matches!(err, ExportError::Io(_)));
    let log = log.lock();
    assert_eq!(log.frames, 3);
    assert_eq!(log.closes, 1);
    assert_eq!(progress.len(), 3);
    assert_eq!(sink.created.load(Ordering::SeqCst), 0);
}

#[test]
fn test_cancel_mid_export_stops_after_frame_in_flight() {
    let log = Arc::new(Mutex::new(EncoderLog::default()));
    let sink = CountingSink::default();
    let cancel = CancelToken::new();
    let mut reports = 0;

    let encoder_log = Arc::clone(&log);
    let err = GifExporter::default()
        .export_with(
            &long_request(),
            &sink,
            &cancel,
            &mut |_| {
                reports += 1;
                if reports == 2 {
                    cancel.cancel();
                }
            },
            move |_file, _width, _height| {
                Ok(ScriptedEncoder {
                    log: encoder_log,
                    fail_at: None,
                })
            },
        )
        .unwrap_err();

    assert!(matches!(err, ExportError::Cancelled));
    let log = log.lock();
    assert_eq!(log.frames, 2);
    assert_eq!(log.closes, 1);
    assert_eq!(sink.created.load(Ordering::SeqCst), 0);
}
