use egui::epaint::{Mesh, Vertex, WHITE_UV};
use egui::{
    Color32, ColorImage, Context, Painter, Pos2, Rect, Shape, TextureHandle, TextureId,
    TextureOptions, Vec2,
};
use image::RgbaImage;
use std::sync::Arc;

use super::Surface;
use crate::background::gradient_color_at;
use crate::geometry::SmoothPath;

/// Grid resolution of the mesh that approximates a gradient fill
const GRADIENT_CELLS: usize = 24;

/// Arc segments in a round line cap
const CAP_SEGMENTS: usize = 8;

/// Half disc of `radius` past `end`, bulging along `outward` (unit length).
/// Never overlaps the line body it caps.
fn cap_polygon(end: Pos2, outward: Vec2, radius: f32) -> Vec<Pos2> {
    let side = outward.rot90();
    (0..=CAP_SEGMENTS)
        .map(|i| {
            let angle = std::f32::consts::PI * i as f32 / CAP_SEGMENTS as f32;
            end + (side * angle.cos() + outward * angle.sin()) * radius
        })
        .collect()
}

/// Unit direction from the nearest distinct point in `towards` to `end`
fn outward_from<'p>(end: Pos2, towards: impl Iterator<Item = &'p Pos2>) -> Option<Vec2> {
    towards
        .map(|p| end - *p)
        .find(|d| d.length_sq() > f32::EPSILON)
        .map(Vec2::normalized)
}

/// Keeps the uploaded texture of the current background picture alive
/// between frames
#[derive(Default)]
pub struct BackgroundTextures {
    current: Option<(Arc<RgbaImage>, TextureHandle)>,
}

impl std::fmt::Debug for BackgroundTextures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTextures")
            .field("loaded", &self.current.is_some())
            .finish()
    }
}

impl BackgroundTextures {
    fn texture_for(&mut self, ctx: &Context, image: &Arc<RgbaImage>) -> Option<TextureId> {
        let stale = !matches!(&self.current, Some((cached, _)) if Arc::ptr_eq(cached, image));
        if stale {
            let size = [image.width() as usize, image.height() as usize];
            let color_image = ColorImage::from_rgba_unmultiplied(size, image.as_raw());
            let handle = ctx.load_texture("canvas_background", color_image, TextureOptions::LINEAR);
            self.current = Some((Arc::clone(image), handle));
        }
        self.current.as_ref().map(|(_, handle)| handle.id())
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Live canvas surface: draws through an egui painter into `rect`, with
/// surface coordinates relative to `rect.min`
pub struct PainterSurface<'a> {
    painter: Painter,
    rect: Rect,
    textures: &'a mut BackgroundTextures,
}

impl<'a> PainterSurface<'a> {
    pub fn new(painter: &Painter, rect: Rect, textures: &'a mut BackgroundTextures) -> Self {
        Self {
            painter: painter.with_clip_rect(rect),
            rect,
            textures,
        }
    }

    fn to_screen(&self, p: Pos2) -> Pos2 {
        self.rect.min + p.to_vec2()
    }
}

impl Surface for PainterSurface<'_> {
    fn size(&self) -> Vec2 {
        self.rect.size()
    }

    fn clear(&mut self) {
        // egui starts every frame from scratch
    }

    fn fill_solid(&mut self, color: Color32) {
        self.painter.rect_filled(self.rect, 0.0, color);
    }

    fn fill_linear_gradient(&mut self, colors: &[Color32], start: Pos2, end: Pos2) {
        let axis = end - start;
        let axis_len_sq = axis.length_sq();
        let color_at = |p: Pos2| {
            let t = if axis_len_sq > 0.0 {
                (p - start).dot(axis) / axis_len_sq
            } else {
                0.0
            };
            gradient_color_at(colors, t)
        };

        let mut mesh = Mesh::default();
        let size = self.rect.size();
        let cells = GRADIENT_CELLS as u32;
        for row in 0..=cells {
            for col in 0..=cells {
                let local = Pos2::new(
                    size.x * col as f32 / cells as f32,
                    size.y * row as f32 / cells as f32,
                );
                mesh.vertices.push(Vertex {
                    pos: self.to_screen(local),
                    uv: WHITE_UV,
                    color: color_at(local),
                });
            }
        }
        let stride = cells + 1;
        for row in 0..cells {
            for col in 0..cells {
                let top_left = row * stride + col;
                let bottom_left = top_left + stride;
                mesh.add_triangle(top_left, top_left + 1, bottom_left);
                mesh.add_triangle(top_left + 1, bottom_left + 1, bottom_left);
            }
        }
        self.painter.add(Shape::mesh(mesh));
    }

    fn draw_image_cover(&mut self, image: &Arc<RgbaImage>) {
        let (src_w, src_h) = (image.width() as f32, image.height() as f32);
        if src_w == 0.0 || src_h == 0.0 {
            return;
        }
        let size = self.rect.size();
        let scale = (size.x / src_w).max(size.y / src_h);
        let dest = Rect::from_center_size(self.rect.center(), Vec2::new(src_w, src_h) * scale);

        let Some(texture) = self.textures.texture_for(self.painter.ctx(), image) else {
            return;
        };
        self.painter.image(
            texture,
            dest,
            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );
    }

    fn fill_circle(&mut self, center: Pos2, radius: f32, color: Color32) {
        self.painter
            .circle_filled(self.to_screen(center), radius, color);
    }

    fn stroke_path(&mut self, path: &SmoothPath, width: f32, color: Color32) {
        if !self.rect.expand(width).intersects(path.bounds().translate(self.rect.min.to_vec2())) {
            return;
        }
        let points: Vec<Pos2> = path.flatten().into_iter().map(|p| self.to_screen(p)).collect();
        let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) else {
            return;
        };
        let radius = width / 2.0;
        let caps = outward_from(first, points.iter().skip(1))
            .zip(outward_from(last, points.iter().rev().skip(1)));
        let Some((first_out, last_out)) = caps else {
            // every sample on one spot
            self.painter.circle_filled(first, radius, color);
            return;
        };
        self.painter
            .add(Shape::line(points, egui::Stroke::new(width, color)));
        // egui lines have butt ends
        for (end, outward) in [(first, first_out), (last, last_out)] {
            self.painter.add(Shape::convex_polygon(
                cap_polygon(end, outward, radius),
                color,
                egui::Stroke::NONE,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_stays_beyond_the_line_end() {
        let end = Pos2::new(10.0, 5.0);
        let outward = Vec2::new(3.0, -4.0).normalized();
        let cap = cap_polygon(end, outward, 2.5);

        assert_eq!(cap.len(), CAP_SEGMENTS + 1);
        for p in &cap {
            assert!(((*p - end).length() - 2.5).abs() < 1e-4);
            assert!((*p - end).dot(outward) >= -1e-4);
        }
        let tip = cap[CAP_SEGMENTS / 2];
        assert!((tip - (end + outward * 2.5)).length() < 1e-4);
    }

    #[test]
    fn test_outward_skips_repeated_samples() {
        let points = [
            Pos2::new(0.0, 0.0),
            Pos2::new(0.0, 0.0),
            Pos2::new(4.0, 0.0),
        ];
        let out = outward_from(points[0], points.iter().skip(1)).unwrap();
        assert_eq!(out, Vec2::new(-1.0, 0.0));
        assert!(outward_from(points[0], points[..2].iter().skip(1)).is_none());
    }
}
