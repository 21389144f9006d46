//! Frame rendering shared by the live canvas and the GIF exporter.
//!
//! [`render_frame`] only looks at its arguments; all drawing goes through a
//! [`Surface`], implemented over an egui painter for the live view and over
//! a tiny-skia pixmap for offscreen export frames.

mod painter;
mod pixmap;

use egui::{Color32, Pos2, Vec2};
use image::RgbaImage;
use std::sync::Arc;

use crate::background::ResolvedBackground;
use crate::geometry::{PathShape, SmoothPath};
use crate::particle::Particle;
use crate::stroke::{BrushEffect, MutableStroke, Stroke, TimedPoint};

pub use painter::{BackgroundTextures, PainterSurface};
pub use pixmap::PixmapSurface;

const GLOW_ALPHA: f32 = 0.25;
const NEON_CORE_RATIO: f32 = 0.35;
const NEON_CORE_COLOR: Color32 = Color32::from_rgba_premultiplied(220, 220, 220, 220);

/// Drawing target of a frame. Coordinates are surface-local pixels.
pub trait Surface {
    fn size(&self) -> Vec2;

    /// Reset every pixel to transparent
    fn clear(&mut self);

    fn fill_solid(&mut self, color: Color32);

    /// Fill the whole surface with evenly spaced `colors` from `start` to `end`
    fn fill_linear_gradient(&mut self, colors: &[Color32], start: Pos2, end: Pos2);

    /// Draw `image` scaled to cover the surface, centred
    fn draw_image_cover(&mut self, image: &Arc<RgbaImage>);

    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32);

    /// Stroke `path` with round caps and joins
    fn stroke_path(&mut self, path: &SmoothPath, width: f32, color: Color32);
}

/// Borrowed view of anything drawable as a stroke
#[derive(Debug, Clone, Copy)]
pub struct StrokeView<'a> {
    pub points: &'a [TimedPoint],
    pub color: Color32,
    pub width: f32,
    pub effect: BrushEffect,
}

impl<'a> From<&'a Stroke> for StrokeView<'a> {
    fn from(stroke: &'a Stroke) -> Self {
        Self {
            points: stroke.points(),
            color: stroke.color(),
            width: stroke.width(),
            effect: stroke.effect(),
        }
    }
}

impl<'a> From<&'a MutableStroke> for StrokeView<'a> {
    fn from(stroke: &'a MutableStroke) -> Self {
        Self {
            points: stroke.points(),
            color: stroke.color(),
            width: stroke.width(),
            effect: stroke.effect(),
        }
    }
}

impl<'a> StrokeView<'a> {
    /// The same stroke cut down to the points stamped at or before `time_ms`
    pub fn revealed(stroke: &'a Stroke, time_ms: u64) -> Self {
        Self {
            points: stroke.revealed_at(time_ms),
            ..Self::from(stroke)
        }
    }
}

/// Draws background, committed strokes in order, the stroke in progress,
/// then particles
pub fn render_frame<'a, S, I>(
    surface: &mut S,
    background: &ResolvedBackground,
    strokes: I,
    active: Option<StrokeView<'_>>,
    particles: &[Particle],
) where
    S: Surface + ?Sized,
    I: IntoIterator<Item = StrokeView<'a>>,
{
    draw_background(surface, background);
    for stroke in strokes {
        draw_stroke(surface, stroke);
    }
    if let Some(active) = active {
        draw_stroke(surface, active);
    }
    draw_particles(surface, particles);
}

pub fn draw_background<S: Surface + ?Sized>(surface: &mut S, background: &ResolvedBackground) {
    match background {
        ResolvedBackground::Blank => {}
        ResolvedBackground::Solid(color) => surface.fill_solid(*color),
        ResolvedBackground::LinearGradient { colors, start, end } => {
            let size = surface.size();
            let to_pixels = |p: &Pos2| Pos2::new(p.x * size.x, p.y * size.y);
            surface.fill_linear_gradient(colors, to_pixels(start), to_pixels(end));
        }
        ResolvedBackground::Image(image) => surface.draw_image_cover(image),
    }
}

pub fn draw_stroke<S: Surface + ?Sized>(surface: &mut S, stroke: StrokeView<'_>) {
    let glow = faded(stroke.color, GLOW_ALPHA);
    match PathShape::build(stroke.points.iter().map(|p| p.position)) {
        PathShape::Empty => {}
        PathShape::Dot(center) => {
            if stroke.effect.glows() {
                surface.fill_circle(center, stroke.width * 1.5, glow);
                surface.fill_circle(center, stroke.width, glow);
            }
            surface.fill_circle(center, stroke.width / 2.0, stroke.color);
            if stroke.effect == BrushEffect::Neon {
                surface.fill_circle(center, stroke.width * NEON_CORE_RATIO / 2.0, NEON_CORE_COLOR);
            }
        }
        PathShape::Curve(path) => {
            if stroke.effect.glows() {
                surface.stroke_path(&path, stroke.width * 3.0, glow);
                surface.stroke_path(&path, stroke.width * 2.0, glow);
            }
            surface.stroke_path(&path, stroke.width, stroke.color);
            if stroke.effect == BrushEffect::Neon {
                surface.stroke_path(&path, stroke.width * NEON_CORE_RATIO, NEON_CORE_COLOR);
            }
        }
    }
}

pub fn draw_particles<S: Surface + ?Sized>(surface: &mut S, particles: &[Particle]) {
    for particle in particles {
        surface.fill_circle(particle.position, particle.size, particle.color);
    }
}

/// `color` with its alpha scaled by `factor`
pub fn faded(color: Color32, factor: f32) -> Color32 {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    Color32::from_rgba_unmultiplied(r, g, b, (a as f32 * factor).round() as u8)
}
