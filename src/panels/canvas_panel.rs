use crate::MagicApp;
use crate::renderer::{PainterSurface, StrokeView, render_frame};

pub fn canvas_panel(app: &mut MagicApp, ctx: &egui::Context) {
    egui::CentralPanel::default()
        .frame(egui::Frame::none())
        .show(ctx, |ui| {
            let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::drag());
            let rect = response.rect;
            app.set_canvas_rect(rect);

            handle_pointer(app, &response);

            let (recorder, background, textures) = app.render_parts();
            let particles = recorder.particles().snapshot();
            let mut surface = PainterSurface::new(&painter, rect, textures);
            render_frame(
                &mut surface,
                background,
                recorder.strokes().iter().map(|stroke| StrokeView::from(stroke.as_ref())),
                recorder.current_stroke().map(StrokeView::from),
                &particles,
            );
        });
}

fn handle_pointer(app: &mut MagicApp, response: &egui::Response) {
    let brush = *app.brush();

    if let Some(pointer) = response.interact_pointer_pos() {
        let pos = app.to_canvas(pointer);
        if response.drag_started() {
            app.recorder_mut().start_stroke(pos, &brush);
        } else if response.dragged() && response.drag_delta() != egui::Vec2::ZERO {
            app.recorder_mut().add_point(pos, &brush);
        }
    }

    if response.drag_stopped() {
        app.recorder_mut().end_stroke(&brush);
    }
}
