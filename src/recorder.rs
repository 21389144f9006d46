//! Gesture capture for the live canvas.
//!
//! The [`Recorder`] turns pointer down/move/up events into immutable,
//! time-stamped [`Stroke`]s, keeps the committed strokes under a global
//! point budget, and offers linear undo/redo. Misuse (drawing while the
//! budget is spent, undo with nothing to undo) is silently ignored, since
//! these calls come straight from the input hot path.

use egui::{Color32, Pos2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::RecorderConfig;
use crate::history::StrokeHistory;
use crate::particle::ParticleField;
use crate::stroke::{BrushEffect, MutableStroke, Stroke, StrokeRef, TimedPoint};
use crate::util::time::{Clock, SystemClock};

/// Style applied to the stroke being drawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Brush {
    pub color: Color32,
    pub width: f32,
    pub effect: BrushEffect,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            color: Color32::from_rgb(0, 255, 255),
            width: 12.0,
            effect: BrushEffect::Glow,
        }
    }
}

pub struct Recorder {
    strokes: Vec<StrokeRef>,
    current: MutableStroke,
    total_points: usize,
    drawing_enabled: bool,
    history: StrokeHistory,
    max_points: usize,
    clock: Arc<dyn Clock>,
    stroke_origin_ms: u64,
    particles: ParticleField,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("strokes", &self.strokes.len())
            .field("current_points", &self.current.len())
            .field("total_points", &self.total_points)
            .field("max_points", &self.max_points)
            .field("drawing_enabled", &self.drawing_enabled)
            .field("history", &self.history)
            .finish()
    }
}

impl Recorder {
    pub fn new(config: &RecorderConfig, particles: ParticleField) -> Self {
        Self::with_clock(config, particles, Arc::new(SystemClock::default()))
    }

    pub fn with_clock(config: &RecorderConfig, particles: ParticleField, clock: Arc<dyn Clock>) -> Self {
        let brush = Brush::default();
        Self {
            strokes: Vec::new(),
            current: MutableStroke::new(brush.color, brush.width, brush.effect),
            total_points: 0,
            drawing_enabled: true,
            history: StrokeHistory::new(),
            max_points: config.max_points,
            clock,
            stroke_origin_ms: 0,
            particles,
        }
    }

    /// Begin a new gesture at `position`
    pub fn start_stroke(&mut self, position: Pos2, brush: &Brush) {
        if !self.drawing_enabled {
            log::debug!("Ignoring stroke start, point budget exhausted");
            return;
        }

        self.current.clear();
        self.current.set_style(brush.color, brush.width, brush.effect);
        self.stroke_origin_ms = self.clock.now_ms();
        self.current.add_point(TimedPoint::new(position, 0));

        if brush.effect.emits_particles() {
            self.particles.spawn(position, brush.color);
        }
    }

    /// Extend the gesture in progress. Points past the budget are dropped
    /// and further drawing is disabled.
    pub fn add_point(&mut self, position: Pos2, brush: &Brush) {
        if !self.drawing_enabled || self.current.is_empty() {
            return;
        }

        if self.total_points + self.current.len() + 1 > self.max_points {
            log::info!(
                "Point budget of {} reached, drawing disabled",
                self.max_points
            );
            self.drawing_enabled = false;
            return;
        }

        // a clock that steps back must not reorder the stroke
        let timestamp_ms = self
            .clock
            .now_ms()
            .saturating_sub(self.stroke_origin_ms)
            .max(self.current.last_timestamp_ms().unwrap_or(0));
        self.current.add_point(TimedPoint::new(position, timestamp_ms));

        if brush.effect.emits_particles() {
            self.particles.spawn(position, brush.color);
        }
    }

    /// Freeze the gesture in progress into a committed stroke
    pub fn end_stroke(&mut self, brush: &Brush) {
        if self.current.is_empty() {
            return;
        }

        self.current.set_style(brush.color, brush.width, brush.effect);
        let stroke = match self.current.to_stroke_ref() {
            Ok(stroke) => stroke,
            Err(err) => {
                log::warn!("Discarding stroke: {}", err);
                self.current.clear();
                return;
            }
        };
        self.current.clear();

        self.total_points += stroke.len();
        log::debug!(
            "Committed stroke #{}: {} points over {} ms ({}/{} budget)",
            self.strokes.len() + 1,
            stroke.len(),
            stroke.duration_ms(),
            self.total_points,
            self.max_points
        );
        self.strokes.push(stroke.clone());
        self.history.record(stroke);

        if self.total_points >= self.max_points {
            self.drawing_enabled = false;
        }
    }

    pub fn undo(&mut self) {
        let Some(stroke) = self.history.undo() else {
            return;
        };
        self.strokes.pop();
        self.total_points -= stroke.len();
        self.drawing_enabled = self.total_points < self.max_points;
    }

    pub fn redo(&mut self) {
        let Some(stroke) = self.history.redo() else {
            return;
        };
        self.total_points += stroke.len();
        self.strokes.push(stroke);
        self.drawing_enabled = self.total_points < self.max_points;
    }

    /// Reset to an empty canvas
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.current.clear();
        self.history.clear();
        self.total_points = 0;
        self.drawing_enabled = true;
        self.stroke_origin_ms = 0;
        self.particles.clear();
    }

    /// Replace the canvas with previously saved strokes. Each restored
    /// stroke can be undone.
    pub fn restore(&mut self, strokes: impl IntoIterator<Item = StrokeRef>) {
        self.clear();
        for stroke in strokes {
            self.total_points += stroke.len();
            self.strokes.push(stroke.clone());
            self.history.record(stroke);
        }
        self.drawing_enabled = self.total_points < self.max_points;
    }

    pub fn strokes(&self) -> &[StrokeRef] {
        &self.strokes
    }

    /// The committed strokes as owned values, ready for export
    pub fn stroke_list(&self) -> Vec<Stroke> {
        self.strokes.iter().map(|s| Stroke::clone(s)).collect()
    }

    /// The gesture in progress, if any
    pub fn current_stroke(&self) -> Option<&MutableStroke> {
        (!self.current.is_empty()).then_some(&self.current)
    }

    pub fn total_points(&self) -> usize {
        self.total_points
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    pub fn remaining_points(&self) -> usize {
        self.max_points.saturating_sub(self.total_points + self.current.len())
    }

    pub fn is_drawing_enabled(&self) -> bool {
        self.drawing_enabled
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleEmitter;
    use crate::util::time::ManualClock;

    fn recorder(max_points: usize) -> (Recorder, ManualClock) {
        let clock = ManualClock::new();
        let recorder = Recorder::with_clock(
            &RecorderConfig { max_points },
            ParticleField::with_seed(ParticleEmitter::default(), 1),
            Arc::new(clock.clone()),
        );
        (recorder, clock)
    }

    #[test]
    fn test_timestamps_are_stroke_relative() {
        let (mut rec, clock) = recorder(100);
        let brush = Brush::default();
        clock.set(5_000);
        rec.start_stroke(Pos2::new(0.0, 0.0), &brush);
        clock.advance(16);
        rec.add_point(Pos2::new(1.0, 0.0), &brush);
        clock.advance(17);
        rec.add_point(Pos2::new(2.0, 0.0), &brush);
        rec.end_stroke(&brush);

        let stamps: Vec<u64> = rec.strokes()[0].points().iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 16, 33]);
    }

    #[test]
    fn test_clock_stepping_back_keeps_order() {
        let (mut rec, clock) = recorder(100);
        let brush = Brush::default();
        clock.set(1_000);
        rec.start_stroke(Pos2::new(0.0, 0.0), &brush);
        clock.set(1_040);
        rec.add_point(Pos2::new(1.0, 0.0), &brush);
        clock.set(1_020);
        rec.add_point(Pos2::new(2.0, 0.0), &brush);
        rec.end_stroke(&brush);

        let stamps: Vec<u64> = rec.strokes()[0].points().iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 40, 40]);
    }

    #[test]
    fn test_add_point_without_start_is_ignored() {
        let (mut rec, _) = recorder(100);
        rec.add_point(Pos2::new(1.0, 1.0), &Brush::default());
        rec.end_stroke(&Brush::default());
        assert!(rec.strokes().is_empty());
        assert_eq!(rec.total_points(), 0);
    }

    #[test]
    fn test_sparkle_spawns_particles() {
        let (mut rec, _) = recorder(100);
        let brush = Brush {
            effect: BrushEffect::Sparkle,
            ..Brush::default()
        };
        rec.start_stroke(Pos2::new(3.0, 3.0), &brush);
        assert!(!rec.particles().is_empty());

        let (mut plain, _) = recorder(100);
        plain.start_stroke(
            Pos2::new(3.0, 3.0),
            &Brush {
                effect: BrushEffect::None,
                ..Brush::default()
            },
        );
        assert!(plain.particles().is_empty());
    }
}
