use egui::{Color32, Pos2, Vec2};
use image::RgbaImage;
use std::sync::Arc;
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, GradientStop, LineCap, LineJoin, LinearGradient, Paint,
    PathBuilder, Pixmap, PixmapPaint, Point, Rect, SpreadMode, Stroke, Transform,
};

use super::Surface;
use crate::error::{ExportError, ExportResult};
use crate::geometry::{PathSegment, SmoothPath};

/// Offscreen RGBA raster backed by a tiny-skia pixmap
pub struct PixmapSurface {
    pixmap: Pixmap,
    /// Last background picture converted to premultiplied form
    image_cache: Option<(Arc<RgbaImage>, Pixmap)>,
}

impl std::fmt::Debug for PixmapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapSurface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .finish()
    }
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> ExportResult<Self> {
        let pixmap =
            Pixmap::new(width, height).ok_or(ExportError::InvalidDimensions { width, height })?;
        Ok(Self {
            pixmap,
            image_cache: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Copy the raster out with straight (unpremultiplied) alpha
    pub fn to_rgba_image(&self) -> ExportResult<RgbaImage> {
        let mut raw = Vec::with_capacity(self.pixmap.pixels().len() * 4);
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            raw.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        RgbaImage::from_raw(self.width(), self.height(), raw)
            .ok_or_else(|| ExportError::Surface("pixel buffer size mismatch".to_string()))
    }

    /// Straight-alpha colour at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    fn full_rect(&self) -> Option<Rect> {
        Rect::from_xywh(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Makes sure `image` is the cached premultiplied source
    fn cache_source(&mut self, image: &Arc<RgbaImage>) -> bool {
        if matches!(&self.image_cache, Some((cached, _)) if Arc::ptr_eq(cached, image)) {
            return true;
        }
        let Some(mut source) = Pixmap::new(image.width(), image.height()) else {
            return false;
        };
        for (dst, px) in source.pixels_mut().iter_mut().zip(image.pixels()) {
            *dst = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
        }
        self.image_cache = Some((Arc::clone(image), source));
        true
    }
}

fn paint_for(color: Color32) -> Paint<'static> {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn skia_color(color: Color32) -> tiny_skia::Color {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

fn skia_path(path: &SmoothPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for segment in path.segments() {
        match *segment {
            PathSegment::MoveTo(p) => builder.move_to(p.x, p.y),
            PathSegment::QuadTo { ctrl, to } => builder.quad_to(ctrl.x, ctrl.y, to.x, to.y),
            PathSegment::LineTo(p) => builder.line_to(p.x, p.y),
        }
    }
    builder.finish()
}

impl Surface for PixmapSurface {
    fn size(&self) -> Vec2 {
        Vec2::new(self.width() as f32, self.height() as f32)
    }

    fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    fn fill_solid(&mut self, color: Color32) {
        if let Some(rect) = self.full_rect() {
            self.pixmap
                .fill_rect(rect, &paint_for(color), Transform::identity(), None);
        }
    }

    fn fill_linear_gradient(&mut self, colors: &[Color32], start: Pos2, end: Pos2) {
        let Some(first) = colors.first().copied() else {
            return;
        };
        let last_index = (colors.len().max(2) - 1) as f32;
        let stops = colors
            .iter()
            .enumerate()
            .map(|(i, c)| GradientStop::new(i as f32 / last_index, skia_color(*c)))
            .collect();

        let shader = LinearGradient::new(
            Point::from_xy(start.x, start.y),
            Point::from_xy(end.x, end.y),
            stops,
            SpreadMode::Pad,
            Transform::identity(),
        );
        let Some(shader) = shader else {
            // degenerate axis
            self.fill_solid(first);
            return;
        };

        let paint = Paint {
            shader,
            anti_alias: true,
            ..Paint::default()
        };
        if let Some(rect) = self.full_rect() {
            self.pixmap
                .fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    fn draw_image_cover(&mut self, image: &Arc<RgbaImage>) {
        let (width, height) = (self.width() as f32, self.height() as f32);
        let (src_w, src_h) = (image.width() as f32, image.height() as f32);
        if src_w == 0.0 || src_h == 0.0 {
            return;
        }
        let scale = (width / src_w).max(height / src_h);
        let dx = (width - src_w * scale) / 2.0;
        let dy = (height - src_h * scale) / 2.0;
        let transform = Transform::from_row(scale, 0.0, 0.0, scale, dx, dy);

        if !self.cache_source(image) {
            log::warn!("Could not allocate background of {}x{}", src_w, src_h);
            return;
        }
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        if let Some((_, source)) = &self.image_cache {
            self.pixmap
                .draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
        }
    }

    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32) {
        if radius <= 0.0 {
            return;
        }
        if let Some(circle) = PathBuilder::from_circle(center.x, center.y, radius) {
            self.pixmap.fill_path(
                &circle,
                &paint_for(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    fn stroke_path(&mut self, path: &SmoothPath, width: f32, color: Color32) {
        let Some(path) = skia_path(path) else {
            return;
        };
        let stroke = Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        self.pixmap.stroke_path(
            &path,
            &paint_for(color),
            &stroke,
            Transform::identity(),
            None,
        );
    }
}
