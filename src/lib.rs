#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
pub mod background;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod history;
pub mod panels;
pub mod particle;
pub mod recorder;
pub mod renderer;
pub mod store;
pub mod stroke;
pub mod util;

pub use app::{MagicApp, init_logging};
pub use background::{Background, ImageDecoder, ImageRef};
pub use config::MagicConfig;
pub use error::{ExportError, ExportResult};
pub use export::{
    CancelToken, ExportHandle, ExportPhase, ExportProgress, ExportRequest, ExportService,
    GifExporter, OutputSink, ResultLocation,
};
pub use particle::{Particle, ParticleEmitter, ParticleField};
pub use recorder::{Brush, Recorder};
pub use store::{DrawingId, DrawingRecord, DrawingStore, MemoryStore};
pub use stroke::{BrushEffect, Stroke, StrokeRef, TimedPoint};
