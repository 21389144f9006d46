use crate::MagicApp;
use crate::app::background_presets;
use crate::export::ExportPhase;
use crate::stroke::BrushEffect;

pub fn controls_panel(app: &mut MagicApp, ctx: &egui::Context) {
    egui::TopBottomPanel::top("controls_panel").show(ctx, |ui| {
        ui.horizontal_wrapped(|ui| {
            brush_controls(app, ui);
            ui.separator();
            history_controls(app, ui);
            ui.separator();
            background_controls(app, ui);
        });
        ui.horizontal(|ui| export_controls(app, ui));
    });
}

fn brush_controls(app: &mut MagicApp, ui: &mut egui::Ui) {
    let brush = app.brush_mut();
    for effect in BrushEffect::ALL {
        if ui.selectable_label(brush.effect == effect, effect.label()).clicked() {
            log::info!("Brush effect selected: {}", effect.label());
            brush.effect = effect;
        }
    }
    ui.color_edit_button_srgba(&mut brush.color);
    ui.add(egui::Slider::new(&mut brush.width, 2.0..=40.0).text("Width"));
}

fn history_controls(app: &mut MagicApp, ui: &mut egui::Ui) {
    let recorder = app.recorder();
    let (can_undo, can_redo) = (recorder.can_undo(), recorder.can_redo());

    if ui.add_enabled(can_undo, egui::Button::new("Undo")).clicked() {
        app.recorder_mut().undo();
    }
    if ui.add_enabled(can_redo, egui::Button::new("Redo")).clicked() {
        app.recorder_mut().redo();
    }
    if ui.button("Clear").clicked() {
        app.recorder_mut().clear();
    }

    let recorder = app.recorder();
    let label = format!("{}/{} points", recorder.total_points(), recorder.max_points());
    if recorder.is_drawing_enabled() {
        ui.label(label);
    } else {
        ui.colored_label(egui::Color32::LIGHT_RED, label);
    }
}

fn background_controls(app: &mut MagicApp, ui: &mut egui::Ui) {
    for (name, background) in background_presets() {
        let selected = app.background() == &background;
        if ui.selectable_label(selected, name).clicked() {
            app.set_background(background);
        }
    }
}

fn export_controls(app: &mut MagicApp, ui: &mut egui::Ui) {
    let progress = app.export_progress();

    if app.is_exporting() {
        if ui.button("Cancel").clicked() {
            app.cancel_export();
        }
    } else if ui.button("Export GIF").clicked() {
        app.start_export();
    }
    if ui.add_enabled(!app.is_exporting(), egui::Button::new("Save draft")).clicked() {
        app.save_draft();
    }
    if ui.add_enabled(!app.is_exporting(), egui::Button::new("Load draft")).clicked() {
        app.load_draft();
    }

    match progress.phase {
        ExportPhase::Idle => {}
        ExportPhase::Preparing | ExportPhase::Exporting => {
            ui.add(
                egui::ProgressBar::new(progress.percent as f32 / 100.0)
                    .show_percentage()
                    .desired_width(200.0),
            );
        }
        ExportPhase::Completed | ExportPhase::Failed => {
            if ui.small_button("Dismiss").clicked() {
                app.dismiss_export();
            }
        }
    }

    if let Some(status) = app.status() {
        ui.label(status);
    }
}
