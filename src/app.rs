use egui::{Color32, Pos2, Rect};
use std::sync::Arc;
use std::time::Duration;

use crate::background::{Background, FileImageDecoder, ImageDecoder, ResolvedBackground};
use crate::config::MagicConfig;
use crate::export::{DirectorySink, ExportHandle, ExportProgress, ExportRequest, ExportService, GifExporter};
use crate::panels::{canvas_panel, controls_panel};
use crate::particle::{ParticleEmitter, ParticleField, ParticleTicker};
use crate::recorder::{Brush, Recorder};
use crate::renderer::BackgroundTextures;
use crate::store::{DrawingId, DrawingRecord, DrawingStore, MemoryStore};

/// Backgrounds offered by the picker
pub fn background_presets() -> Vec<(&'static str, Background)> {
    vec![
        ("Night", Background::Solid(Color32::BLACK)),
        (
            "Dusk",
            Background::LinearGradient {
                colors: vec![Color32::from_rgb(20, 16, 60), Color32::from_rgb(120, 40, 110)],
                start: None,
                end: None,
            },
        ),
        (
            "Aurora",
            Background::LinearGradient {
                colors: vec![
                    Color32::from_rgb(4, 30, 40),
                    Color32::from_rgb(10, 110, 90),
                    Color32::from_rgb(60, 20, 90),
                ],
                start: Some(Pos2::new(0.0, 1.0)),
                end: Some(Pos2::new(1.0, 0.0)),
            },
        ),
    ]
}

/// Install `env_logger` once; later calls are ignored
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Live drawing canvas with GIF export
pub struct MagicApp {
    config: MagicConfig,
    recorder: Recorder,
    brush: Brush,
    background: Background,
    resolved_background: ResolvedBackground,
    decoder: Arc<dyn ImageDecoder>,
    textures: BackgroundTextures,
    ticker: Option<ParticleTicker>,
    export: Option<ExportService>,
    export_handle: Option<ExportHandle>,
    store: Arc<dyn DrawingStore>,
    draft_id: Option<DrawingId>,
    canvas_rect: Rect,
    status: Option<String>,
}

impl std::fmt::Debug for MagicApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagicApp")
            .field("recorder", &self.recorder)
            .field("brush", &self.brush)
            .field("background", &self.background)
            .field("exporting", &self.export_handle.is_some())
            .field("draft_id", &self.draft_id)
            .finish()
    }
}

impl MagicApp {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        Self::with_config(cc, MagicConfig::load_or_default("magic_message.json"))
    }

    pub fn with_config(cc: &eframe::CreationContext<'_>, config: MagicConfig) -> Self {
        let emitter = ParticleEmitter::new(config.particles.clone());
        let particles = ParticleField::new(emitter.clone());
        let recorder = Recorder::new(&config.recorder, particles.clone());

        let ctx = cc.egui_ctx.clone();
        let tick = Duration::from_millis(config.live.tick_ms.max(1));
        let ticker = match ParticleTicker::spawn(particles, tick, move |_| ctx.request_repaint()) {
            Ok(ticker) => Some(ticker),
            Err(err) => {
                log::error!("Could not start particle ticker: {}", err);
                None
            }
        };

        let decoder: Arc<dyn ImageDecoder> = Arc::new(FileImageDecoder::new("."));
        let exporter = GifExporter::new(config.export.clone(), emitter, Arc::clone(&decoder));
        let export = match ExportService::new(exporter) {
            Ok(service) => Some(service),
            Err(err) => {
                log::error!("Export is unavailable: {}", err);
                None
            }
        };

        let background = Background::default();
        let resolved_background = background.resolve(decoder.as_ref());

        Self {
            config,
            recorder,
            brush: Brush::default(),
            background,
            resolved_background,
            decoder,
            textures: BackgroundTextures::default(),
            ticker,
            export,
            export_handle: None,
            store: Arc::new(MemoryStore::new()),
            draft_id: None,
            canvas_rect: Rect::NOTHING,
            status: None,
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    pub fn brush_mut(&mut self) -> &mut Brush {
        &mut self.brush
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn set_background(&mut self, background: Background) {
        if background == self.background {
            return;
        }
        self.resolved_background = background.resolve(self.decoder.as_ref());
        self.textures.clear();
        self.background = background;
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub(crate) fn set_canvas_rect(&mut self, rect: Rect) {
        self.canvas_rect = rect;
    }

    /// Split borrow for the canvas renderer
    pub(crate) fn render_parts(&mut self) -> (&Recorder, &ResolvedBackground, &mut BackgroundTextures) {
        (&self.recorder, &self.resolved_background, &mut self.textures)
    }

    pub fn export_progress(&self) -> ExportProgress {
        self.export
            .as_ref()
            .map(|service| service.progress().current())
            .unwrap_or_default()
    }

    pub fn is_exporting(&self) -> bool {
        self.export_handle.is_some()
    }

    pub fn start_export(&mut self) {
        let Some(service) = &self.export else {
            self.status = Some("Export is unavailable".to_string());
            return;
        };
        if self.export_handle.is_some() {
            return;
        }

        let export = &self.config.export;
        let mut request = ExportRequest::new(
            self.recorder.stroke_list(),
            export.width,
            export.height,
            self.background.clone(),
        );
        let canvas = self.canvas_rect.size();
        if canvas.x > 0.0 && canvas.y > 0.0 {
            request = request.with_canvas_size(canvas);
        }

        let sink = Arc::new(DirectorySink::new(export.output_dir.clone()));
        self.export_handle = Some(service.start(request, sink));
        self.status = None;
    }

    pub fn cancel_export(&mut self) {
        if let Some(handle) = &self.export_handle {
            handle.cancel();
        }
    }

    /// Reset a finished export back to idle
    pub fn dismiss_export(&mut self) {
        if self.export_handle.is_some() {
            return;
        }
        if let Some(service) = &self.export {
            service.progress().reset();
        }
        self.status = None;
    }

    fn poll_export(&mut self) {
        let Some(handle) = self.export_handle.as_mut() else {
            return;
        };
        let Some(outcome) = handle.try_take() else {
            return;
        };
        self.export_handle = None;

        match outcome {
            Ok(location) => {
                self.status = Some(format!("Saved {}", location.path().display()));
                if let Some(id) = self.draft_id {
                    let record = DrawingRecord::new(self.recorder.stroke_list(), self.background.clone())
                        .draft(false)
                        .with_preview(location);
                    if let Err(err) = self.store.update(id, record) {
                        log::warn!("Could not attach preview: {}", err);
                    }
                }
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    pub fn save_draft(&mut self) {
        let record = DrawingRecord::new(self.recorder.stroke_list(), self.background.clone());
        let saved = match self.draft_id {
            Some(id) => self.store.update(id, record).map(|_| id),
            None => self.store.save(record),
        };
        match saved {
            Ok(id) => {
                self.draft_id = Some(id);
                self.status = Some("Draft saved".to_string());
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    /// Replace the canvas with the saved draft, if any
    pub fn load_draft(&mut self) {
        let Some(id) = self.draft_id else {
            return;
        };
        match self.store.load(id) {
            Ok(Some(record)) => {
                self.recorder.restore(record.strokes.into_iter().map(Arc::new));
                self.set_background(record.background);
            }
            Ok(None) => self.status = Some(format!("Draft {} is gone", id)),
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    /// Strokes are recorded in canvas-local coordinates
    pub(crate) fn to_canvas(&self, pos: Pos2) -> Pos2 {
        Pos2::ZERO + (pos - self.canvas_rect.min)
    }
}

impl eframe::App for MagicApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_export();

        controls_panel(self, ctx);
        canvas_panel(self, ctx);

        if self.is_exporting() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
        self.cancel_export();
    }
}
