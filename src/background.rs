use egui::{Color32, Pos2};
use image::RgbaImage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::DecodeError;

/// Opaque handle to a background picture, resolved by an [`ImageDecoder`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

/// What sits behind the strokes.
///
/// Gradient endpoints are in normalized surface coordinates, `(0, 0)` being
/// the top left corner and `(1, 1)` the bottom right, so the same
/// background fits both the live canvas and the export raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Background {
    Solid(Color32),
    LinearGradient {
        /// Evenly spaced along the gradient axis
        colors: Vec<Color32>,
        start: Option<Pos2>,
        end: Option<Pos2>,
    },
    Image(ImageRef),
}

impl Default for Background {
    fn default() -> Self {
        Background::Solid(Color32::BLACK)
    }
}

/// A background with its picture, if any, already decoded
#[derive(Debug, Clone)]
pub enum ResolvedBackground {
    /// Nothing to draw; the surface stays transparent
    Blank,
    Solid(Color32),
    LinearGradient {
        colors: Vec<Color32>,
        start: Pos2,
        end: Pos2,
    },
    Image(Arc<RgbaImage>),
}

impl Background {
    pub const DEFAULT_GRADIENT_START: Pos2 = Pos2::new(0.0, 0.0);
    pub const DEFAULT_GRADIENT_END: Pos2 = Pos2::new(1.0, 1.0);

    /// Decode whatever the background needs. A picture that fails to load
    /// degrades to a blank layer instead of failing the caller.
    pub fn resolve(&self, decoder: &dyn ImageDecoder) -> ResolvedBackground {
        match self {
            Background::Solid(color) => ResolvedBackground::Solid(*color),
            Background::LinearGradient { colors, start, end } => match colors.len() {
                0 => ResolvedBackground::Blank,
                1 => ResolvedBackground::Solid(colors[0]),
                _ => ResolvedBackground::LinearGradient {
                    colors: colors.clone(),
                    start: start.unwrap_or(Self::DEFAULT_GRADIENT_START),
                    end: end.unwrap_or(Self::DEFAULT_GRADIENT_END),
                },
            },
            Background::Image(reference) => match decoder.decode(reference) {
                Ok(image) => ResolvedBackground::Image(image),
                Err(err) => {
                    log::warn!("Background image {:?} unavailable: {}", reference.key(), err);
                    ResolvedBackground::Blank
                }
            },
        }
    }
}

/// Colour of an evenly spaced gradient at `t` in `0..=1`
pub fn gradient_color_at(colors: &[Color32], t: f32) -> Color32 {
    match colors {
        [] => Color32::TRANSPARENT,
        [only] => *only,
        _ => {
            let scaled = t.clamp(0.0, 1.0) * (colors.len() - 1) as f32;
            let index = (scaled.floor() as usize).min(colors.len() - 2);
            lerp_color(colors[index], colors[index + 1], scaled - index as f32)
        }
    }
}

fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let a = a.to_srgba_unmultiplied();
    let b = b.to_srgba_unmultiplied();
    let mix = |i: usize| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
    Color32::from_rgba_unmultiplied(mix(0), mix(1), mix(2), mix(3))
}

/// Turns an [`ImageRef`] into pixels
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, reference: &ImageRef) -> Result<Arc<RgbaImage>, DecodeError>;
}

/// Decoder for hosts without picture backgrounds; every lookup fails
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImages;

impl ImageDecoder for NoImages {
    fn decode(&self, reference: &ImageRef) -> Result<Arc<RgbaImage>, DecodeError> {
        Err(DecodeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no image source for {:?}", reference.key()),
        )))
    }
}

/// Loads pictures from disk, treating the reference key as a path relative
/// to `root`. Decoded images are cached for the decoder's lifetime.
#[derive(Debug)]
pub struct FileImageDecoder {
    root: PathBuf,
    cache: Mutex<HashMap<ImageRef, Arc<RgbaImage>>>,
}

impl FileImageDecoder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl ImageDecoder for FileImageDecoder {
    fn decode(&self, reference: &ImageRef) -> Result<Arc<RgbaImage>, DecodeError> {
        if let Some(image) = self.cache.lock().get(reference) {
            return Ok(Arc::clone(image));
        }

        let path = self.root.join(reference.key());
        let bytes = std::fs::read(&path)?;
        let image = Arc::new(image::load_from_memory(&bytes)?.to_rgba8());
        log::debug!(
            "Decoded background {}: {}x{}",
            path.display(),
            image.width(),
            image.height()
        );

        self.cache.lock().insert(reference.clone(), Arc::clone(&image));
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_endpoints_and_middle() {
        let colors = [Color32::BLACK, Color32::WHITE];
        assert_eq!(gradient_color_at(&colors, 0.0), Color32::BLACK);
        assert_eq!(gradient_color_at(&colors, 1.0), Color32::WHITE);
        assert_eq!(
            gradient_color_at(&colors, 0.5),
            Color32::from_rgb(128, 128, 128)
        );
    }

    #[test]
    fn test_missing_image_degrades_to_blank() {
        let resolved = Background::Image(ImageRef::new("nope.png")).resolve(&NoImages);
        assert!(matches!(resolved, ResolvedBackground::Blank));
    }

    #[test]
    fn test_gradient_defaults_fill_in() {
        let resolved = Background::LinearGradient {
            colors: vec![Color32::RED, Color32::BLUE],
            start: None,
            end: None,
        }
        .resolve(&NoImages);
        match resolved {
            ResolvedBackground::LinearGradient { start, end, .. } => {
                assert_eq!(start, Pos2::new(0.0, 0.0));
                assert_eq!(end, Pos2::new(1.0, 1.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_file_decoder_reads_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]))
            .save(dir.path().join("bg.png"))
            .unwrap();

        let decoder = FileImageDecoder::new(dir.path());
        let first = decoder.decode(&ImageRef::new("bg.png")).unwrap();
        assert_eq!(first.dimensions(), (4, 2));

        std::fs::remove_file(dir.path().join("bg.png")).unwrap();
        let cached = decoder.decode(&ImageRef::new("bg.png")).unwrap();
        assert!(Arc::ptr_eq(&first, &cached));
    }
}
