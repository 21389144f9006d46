use egui::{Color32, Pos2, Vec2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// A sampled pointer position, stamped relative to the start of its stroke
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedPoint {
    pub position: Pos2,
    pub timestamp_ms: u64,
}

impl TimedPoint {
    pub fn new(position: Pos2, timestamp_ms: u64) -> Self {
        Self {
            position,
            timestamp_ms,
        }
    }
}

/// Visual treatment applied to a stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BrushEffect {
    #[default]
    None,
    /// Soft bloom under the solid pass
    Glow,
    /// Bloom plus a thin white core
    Neon,
    /// Bloom that also sheds particles while drawing
    Sparkle,
}

impl BrushEffect {
    pub const ALL: [BrushEffect; 4] = [
        BrushEffect::None,
        BrushEffect::Glow,
        BrushEffect::Neon,
        BrushEffect::Sparkle,
    ];

    pub fn glows(self) -> bool {
        !matches!(self, BrushEffect::None)
    }

    pub fn emits_particles(self) -> bool {
        matches!(self, BrushEffect::Sparkle)
    }

    pub fn label(self) -> &'static str {
        match self {
            BrushEffect::None => "Plain",
            BrushEffect::Glow => "Glow",
            BrushEffect::Neon => "Neon",
            BrushEffect::Sparkle => "Sparkle",
        }
    }
}

/// Why a point list and style cannot form a [`Stroke`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidStroke {
    #[error("stroke has no points")]
    NoPoints,

    #[error("stroke width must be positive, got {0}")]
    Width(f32),

    #[error("stroke timestamps go backwards at point {0}")]
    Unordered(usize),
}

// Immutable stroke for sharing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StrokeData")]
pub struct Stroke {
    points: Vec<TimedPoint>,
    color: Color32,
    width: f32,
    effect: BrushEffect,
}

/// Wire form of a [`Stroke`], checked by [`Stroke::try_new`] on the way in
#[derive(Deserialize)]
struct StrokeData {
    points: Vec<TimedPoint>,
    color: Color32,
    width: f32,
    effect: BrushEffect,
}

impl TryFrom<StrokeData> for Stroke {
    type Error = InvalidStroke;

    fn try_from(data: StrokeData) -> Result<Self, Self::Error> {
        Stroke::try_new(data.color, data.width, data.effect, data.points)
    }
}

// Mutable stroke for the gesture in progress
#[derive(Debug, Clone)]
pub struct MutableStroke {
    points: Vec<TimedPoint>,
    color: Color32,
    width: f32,
    effect: BrushEffect,
}

// Define a reference-counted type alias for Stroke
pub type StrokeRef = Arc<Stroke>;

impl Stroke {
    /// Creates a stroke from already recorded points.
    ///
    /// Timestamps are rebased so the first point sits at 0 and must never
    /// decrease. Fails on an empty point list or a non-positive width.
    pub fn try_new(
        color: Color32,
        width: f32,
        effect: BrushEffect,
        mut points: Vec<TimedPoint>,
    ) -> Result<Self, InvalidStroke> {
        let Some(origin) = points.first().map(|p| p.timestamp_ms) else {
            return Err(InvalidStroke::NoPoints);
        };
        if !(width > 0.0) {
            return Err(InvalidStroke::Width(width));
        }
        if let Some(index) = points
            .windows(2)
            .position(|w| w[1].timestamp_ms < w[0].timestamp_ms)
        {
            return Err(InvalidStroke::Unordered(index + 1));
        }
        for point in &mut points {
            point.timestamp_ms -= origin;
        }
        Ok(Self {
            points,
            color,
            width,
            effect,
        })
    }

    /// [`Stroke::try_new`], discarding the reason
    pub fn new(
        color: Color32,
        width: f32,
        effect: BrushEffect,
        points: Vec<TimedPoint>,
    ) -> Option<Self> {
        Self::try_new(color, width, effect, points).ok()
    }

    pub fn new_ref(
        color: Color32,
        width: f32,
        effect: BrushEffect,
        points: Vec<TimedPoint>,
    ) -> Option<StrokeRef> {
        Self::new(color, width, effect, points).map(Arc::new)
    }

    pub fn points(&self) -> &[TimedPoint] {
        &self.points
    }

    pub fn color(&self) -> Color32 {
        self.color
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn effect(&self) -> BrushEffect {
        self.effect
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_dot(&self) -> bool {
        self.points.len() == 1
    }

    pub fn start_ms(&self) -> u64 {
        self.points.first().map_or(0, |p| p.timestamp_ms)
    }

    pub fn end_ms(&self) -> u64 {
        self.points.last().map_or(0, |p| p.timestamp_ms)
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms().saturating_sub(self.start_ms())
    }

    /// The prefix of this stroke revealed at `time_ms`
    pub fn revealed_at(&self, time_ms: u64) -> &[TimedPoint] {
        let visible = self.points.partition_point(|p| p.timestamp_ms <= time_ms);
        &self.points[..visible]
    }

    /// Points that arrived in the half-open window `(after_ms, until_ms]`
    pub fn arrived_between(
        &self,
        after_ms: Option<u64>,
        until_ms: u64,
    ) -> impl Iterator<Item = &TimedPoint> + '_ {
        self.points.iter().filter(move |p| {
            after_ms.is_none_or(|after| p.timestamp_ms > after) && p.timestamp_ms <= until_ms
        })
    }

    /// Uniformly scales positions and width, then shifts by `offset`.
    /// The timeline is untouched.
    pub fn scaled(&self, factor: f32, offset: Vec2) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| {
                    let position = Pos2::new(p.position.x * factor, p.position.y * factor) + offset;
                    TimedPoint::new(position, p.timestamp_ms)
                })
                .collect(),
            color: self.color,
            width: self.width * factor,
            effect: self.effect,
        }
    }
}

impl MutableStroke {
    pub fn new(color: Color32, width: f32, effect: BrushEffect) -> Self {
        Self {
            points: Vec::new(),
            color,
            width,
            effect,
        }
    }

    pub fn add_point(&mut self, point: TimedPoint) {
        self.points.push(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn set_style(&mut self, color: Color32, width: f32, effect: BrushEffect) {
        self.color = color;
        self.width = width;
        self.effect = effect;
    }

    // Convert to an immutable Stroke
    pub fn to_stroke(&self) -> Result<Stroke, InvalidStroke> {
        Stroke::try_new(self.color, self.width, self.effect, self.points.clone())
    }

    pub fn to_stroke_ref(&self) -> Result<StrokeRef, InvalidStroke> {
        self.to_stroke().map(Arc::new)
    }

    /// Timestamp of the latest point, if any
    pub fn last_timestamp_ms(&self) -> Option<u64> {
        self.points.last().map(|p| p.timestamp_ms)
    }

    // Get a reference to the points for preview
    pub fn points(&self) -> &[TimedPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn color(&self) -> Color32 {
        self.color
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn effect(&self) -> BrushEffect {
        self.effect
    }
}
