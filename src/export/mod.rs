//! Replays a finished recording into an animated GIF.
//!
//! Each stroke is sampled on a fixed frame interval from its first to its
//! last timestamp. Every frame is rendered from scratch: background, the
//! strokes already finished, the current stroke cut to the points drawn so
//! far, and the particles. Particles live in the exporter's own list and use
//! a seeded generator, so the same recording always yields the same file.

mod encoder;
mod progress;
mod sink;
mod task;

use egui::Vec2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::background::{Background, ImageDecoder, NoImages};
use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::particle::{Particle, ParticleEmitter};
use crate::renderer::{PixmapSurface, StrokeView, Surface, render_frame};
use crate::stroke::Stroke;

pub use encoder::{FrameEncoder, GifFileEncoder};
pub use progress::{ExportPhase, ExportProgress, ExportRun, ProgressBroadcast};
pub use sink::{DirectorySink, GIF_MIME, OutputSink, ResultLocation};
pub use task::{ExportHandle, ExportService};

/// Everything needed to replay one recording
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub strokes: Vec<Stroke>,
    pub width: u32,
    pub height: u32,
    pub background: Background,
    /// Size of the canvas the strokes were recorded on. When set, strokes
    /// are scaled uniformly to fit the export raster and centred.
    pub canvas_size: Option<Vec2>,
}

impl ExportRequest {
    pub fn new(strokes: Vec<Stroke>, width: u32, height: u32, background: Background) -> Self {
        Self {
            strokes,
            width,
            height,
            background,
            canvas_size: None,
        }
    }

    pub fn with_canvas_size(mut self, canvas_size: Vec2) -> Self {
        self.canvas_size = Some(canvas_size);
        self
    }

    /// Strokes mapped into export raster coordinates
    fn placed_strokes(&self) -> Vec<Stroke> {
        let Some(canvas) = self.canvas_size.filter(|c| c.x > 0.0 && c.y > 0.0) else {
            return self.strokes.clone();
        };
        let target = Vec2::new(self.width as f32, self.height as f32);
        let factor = (target.x / canvas.x).min(target.y / canvas.y);
        let offset = (target - canvas * factor) / 2.0;
        self.strokes
            .iter()
            .map(|stroke| stroke.scaled(factor, offset))
            .collect()
    }
}

/// Cooperative cancellation flag shared with a running export
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Share of the recording covered so far, in whole percent
pub fn progress_percent(done_ms: u64, total_ms: u64) -> u8 {
    if total_ms == 0 {
        return 100;
    }
    let percent = (100.0 * done_ms as f64 / total_ms as f64).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Sample times for a stroke spanning `start..=end`: every `interval` from
/// `start`, plus `end` itself when the grid falls short of it
pub fn frame_times(start: u64, end: u64, interval: u64) -> Vec<u64> {
    let interval = interval.max(1);
    let mut times: Vec<u64> = (start..=end).step_by(interval as usize).collect();
    if times.last().is_some_and(|&last| last < end) {
        times.push(end);
    }
    times
}

pub struct GifExporter {
    config: ExportConfig,
    emitter: ParticleEmitter,
    decoder: Arc<dyn ImageDecoder>,
}

impl std::fmt::Debug for GifExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GifExporter")
            .field("config", &self.config)
            .field("emitter", &self.emitter)
            .finish()
    }
}

impl Default for GifExporter {
    fn default() -> Self {
        Self::new(
            ExportConfig::default(),
            ParticleEmitter::default(),
            Arc::new(NoImages),
        )
    }
}

impl GifExporter {
    pub fn new(config: ExportConfig, emitter: ParticleEmitter, decoder: Arc<dyn ImageDecoder>) -> Self {
        Self {
            config,
            emitter,
            decoder,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn frame_interval_ms(&self) -> u64 {
        self.config.frame_interval_ms.max(1)
    }

    fn display_name(&self) -> String {
        format!(
            "{}_{}",
            self.config.display_name_prefix,
            uuid::Uuid::new_v4().simple()
        )
    }

    /// Render `request` to a GIF and hand it to `sink`.
    ///
    /// The GIF is encoded into a private scratch file first; the sink only
    /// receives a complete stream. On any failure the encoder is still
    /// closed, the scratch file removed, and a partially written
    /// destination discarded.
    pub fn export(
        &self,
        request: &ExportRequest,
        sink: &dyn OutputSink,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(u8),
    ) -> ExportResult<ResultLocation> {
        let (speed, repeat) = (self.config.gif_speed, self.config.repeat_forever);
        self.export_with(request, sink, cancel, progress, |file, width, height| {
            GifFileEncoder::create(file, width, height, speed, repeat)
        })
    }

    /// Like [`GifExporter::export`], with the encoder opened by
    /// `open_encoder` over the scratch file.
    pub fn export_with<E, F>(
        &self,
        request: &ExportRequest,
        sink: &dyn OutputSink,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(u8),
        open_encoder: F,
    ) -> ExportResult<ResultLocation>
    where
        E: FrameEncoder,
        F: FnOnce(File, u32, u32) -> ExportResult<E>,
    {
        let (width, height) = (request.width, request.height);
        if width == 0 || height == 0 {
            return Err(ExportError::InvalidDimensions { width, height });
        }
        log::info!(
            "Exporting {} strokes at {}x{}",
            request.strokes.len(),
            width,
            height
        );

        let scratch = tempfile::Builder::new()
            .prefix("magic-export-")
            .suffix(".gif")
            .tempfile()?;
        let mut encoder = open_encoder(scratch.reopen()?, width, height)?;

        let replayed = self.replay(request, &mut encoder, cancel, progress);
        let closed = encoder.close();
        let frames = replayed?;
        closed?;

        let location = self.deliver(&scratch, sink)?;
        log::info!("Export finished: {} frames written to {}", frames, location.uri());
        Ok(location)
    }

    fn deliver(&self, scratch: &tempfile::NamedTempFile, sink: &dyn OutputSink) -> ExportResult<ResultLocation> {
        let (mut writer, location) = sink
            .create(GIF_MIME, &self.display_name())
            .map_err(|err| ExportError::Sink(err.to_string()))?;

        let copied = scratch
            .reopen()
            .and_then(|mut source| std::io::copy(&mut source, &mut writer))
            .and_then(|_| writer.flush());
        drop(writer);

        if let Err(err) = copied {
            if let Err(cleanup) = sink.discard(&location) {
                log::warn!("Could not discard partial export {}: {}", location.uri(), cleanup);
            }
            return Err(err.into());
        }
        Ok(location)
    }

    /// Render every frame of `request` into `encoder`, reporting progress
    /// after each one. Returns the number of frames encoded.
    ///
    /// Does not close the encoder.
    pub fn replay(
        &self,
        request: &ExportRequest,
        encoder: &mut dyn FrameEncoder,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(u8),
    ) -> ExportResult<usize> {
        let interval = self.frame_interval_ms();
        let strokes = request.placed_strokes();
        let mut surface = PixmapSurface::new(request.width, request.height)?;
        let background = request.background.resolve(self.decoder.as_ref());

        if strokes.is_empty() {
            if cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            surface.clear();
            render_frame(&mut surface, &background, std::iter::empty(), None, &[]);
            encoder.encode_frame(surface.to_rgba_image()?, interval)?;
            progress(100);
            return Ok(1);
        }

        let total_ms: u64 = strokes.iter().map(Stroke::duration_ms).sum();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut particles: Vec<Particle> = Vec::new();
        let mut elapsed_ms = 0;
        let mut frames = 0;

        for (index, stroke) in strokes.iter().enumerate() {
            let (start, end) = (stroke.start_ms(), stroke.end_ms());
            let mut previous: Option<u64> = None;

            for frame_time in frame_times(start, end, interval) {
                if cancel.is_cancelled() {
                    log::info!("Export cancelled after {} frames", frames);
                    return Err(ExportError::Cancelled);
                }

                if stroke.effect().emits_particles() {
                    for point in stroke.arrived_between(previous, frame_time) {
                        let spawned = self.emitter.spawn(&mut rng, point.position, stroke.color());
                        particles.extend(spawned);
                    }
                }
                self.emitter.advance(&mut particles, interval);
                previous = Some(frame_time);

                surface.clear();
                render_frame(
                    &mut surface,
                    &background,
                    strokes[..index].iter().map(StrokeView::from),
                    Some(StrokeView::revealed(stroke, frame_time)),
                    &particles,
                );
                encoder.encode_frame(surface.to_rgba_image()?, interval)?;
                frames += 1;

                progress(progress_percent(elapsed_ms + frame_time - start, total_ms));
            }

            elapsed_ms += end - start;
            log::debug!(
                "Stroke {}/{} replayed, {} frames so far",
                index + 1,
                strokes.len(),
                frames
            );
        }

        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_times_include_end() {
        assert_eq!(frame_times(0, 0, 33), vec![0]);
        assert_eq!(frame_times(0, 66, 33), vec![0, 33, 66]);
        assert_eq!(frame_times(0, 70, 33), vec![0, 33, 66, 70]);
        assert_eq!(frame_times(0, 10, 0), (0..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_progress_percent_bounds() {
        assert_eq!(progress_percent(0, 0), 100);
        assert_eq!(progress_percent(0, 200), 0);
        assert_eq!(progress_percent(1, 200), 1);
        assert_eq!(progress_percent(200, 200), 100);
        assert_eq!(progress_percent(500, 200), 100);
    }

    #[test]
    fn test_placed_strokes_fit_and_centre() {
        use crate::stroke::{BrushEffect, TimedPoint};
        use egui::{Color32, Pos2};

        let stroke = Stroke::new(
            Color32::WHITE,
            4.0,
            BrushEffect::None,
            vec![TimedPoint::new(Pos2::new(50.0, 50.0), 0)],
        )
        .unwrap();
        let request = ExportRequest::new(vec![stroke], 200, 400, Background::default())
            .with_canvas_size(Vec2::new(100.0, 100.0));
        let placed = request.placed_strokes();
        assert_eq!(placed[0].points()[0].position, Pos2::new(100.0, 200.0));
        assert_eq!(placed[0].width(), 8.0);
    }
}
