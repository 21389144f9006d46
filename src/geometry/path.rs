use egui::{Pos2, Rect};

/// Distance in pixels between samples when a curve is flattened to a polyline
const FLATTEN_STEP: f32 = 4.0;
const MAX_FLATTEN_SUBDIVISIONS: usize = 16;

/// One drawing instruction of a smoothed path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Pos2),
    QuadTo { ctrl: Pos2, to: Pos2 },
    LineTo(Pos2),
}

/// A smoothed curve through a list of touch samples.
///
/// Built with midpoint quadratic smoothing: each sample becomes the control
/// point of a curve ending halfway to the next sample, and the path closes
/// with an explicit line to the final sample so the endpoint is exact.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SmoothPath {
    segments: Vec<PathSegment>,
}

/// Result of building a path from an arbitrary number of points
#[derive(Debug, Clone, PartialEq)]
pub enum PathShape {
    Empty,
    /// A single sample; rendered as a dot by the caller
    Dot(Pos2),
    Curve(SmoothPath),
}

impl PathShape {
    pub fn build<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Pos2>,
    {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return PathShape::Empty;
        };
        let Some(second) = points.next() else {
            return PathShape::Dot(first);
        };

        let mut segments = vec![PathSegment::MoveTo(first)];
        let mut prev = first;
        for curr in std::iter::once(second).chain(points) {
            segments.push(PathSegment::QuadTo {
                ctrl: prev,
                to: midpoint(prev, curr),
            });
            prev = curr;
        }
        segments.push(PathSegment::LineTo(prev));

        PathShape::Curve(SmoothPath { segments })
    }

    pub fn curve(&self) -> Option<&SmoothPath> {
        match self {
            PathShape::Curve(path) => Some(path),
            _ => None,
        }
    }
}

impl SmoothPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn start(&self) -> Option<Pos2> {
        match self.segments.first() {
            Some(PathSegment::MoveTo(p)) => Some(*p),
            _ => None,
        }
    }

    pub fn end(&self) -> Option<Pos2> {
        self.segments.last().map(|segment| match *segment {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => p,
            PathSegment::QuadTo { to, .. } => to,
        })
    }

    /// Approximates the curve with a polyline, for backends without native
    /// quadratic support
    pub fn flatten(&self) -> Vec<Pos2> {
        let mut out: Vec<Pos2> = Vec::with_capacity(self.segments.len() * 2);
        let mut pen = Pos2::ZERO;
        for segment in &self.segments {
            match *segment {
                PathSegment::MoveTo(p) => {
                    out.push(p);
                    pen = p;
                }
                PathSegment::LineTo(p) => {
                    if out.last() != Some(&p) {
                        out.push(p);
                    }
                    pen = p;
                }
                PathSegment::QuadTo { ctrl, to } => {
                    let approx_len = pen.distance(ctrl) + ctrl.distance(to);
                    let steps = ((approx_len / FLATTEN_STEP).ceil() as usize)
                        .clamp(1, MAX_FLATTEN_SUBDIVISIONS);
                    for i in 1..=steps {
                        let t = i as f32 / steps as f32;
                        let p = quad_point(pen, ctrl, to, t);
                        if out.last() != Some(&p) {
                            out.push(p);
                        }
                    }
                    pen = to;
                }
            }
        }
        out
    }

    /// Bounding box of every point the path touches, control points included
    pub fn bounds(&self) -> Rect {
        let mut rect = Rect::NOTHING;
        for segment in &self.segments {
            match *segment {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => rect.extend_with(p),
                PathSegment::QuadTo { ctrl, to } => {
                    rect.extend_with(ctrl);
                    rect.extend_with(to);
                }
            }
        }
        rect
    }
}

fn midpoint(a: Pos2, b: Pos2) -> Pos2 {
    Pos2::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

fn quad_point(from: Pos2, ctrl: Pos2, to: Pos2, t: f32) -> Pos2 {
    let u = 1.0 - t;
    Pos2::new(
        u * u * from.x + 2.0 * u * t * ctrl.x + t * t * to.x,
        u * u * from.y + 2.0 * u * t * ctrl.y + t * t * to.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    #[test]
    fn test_empty_and_single_point() {
        assert_eq!(PathShape::build(Vec::<Pos2>::new()), PathShape::Empty);
        assert_eq!(
            PathShape::build([pos2(3.0, 4.0)]),
            PathShape::Dot(pos2(3.0, 4.0))
        );
        assert!(PathShape::build([pos2(3.0, 4.0)]).curve().is_none());
    }

    #[test]
    fn test_two_points_keep_both_ends() {
        let shape = PathShape::build([pos2(0.0, 0.0), pos2(10.0, 0.0)]);
        let path = shape.curve().expect("two points make a curve");
        assert_eq!(path.start(), Some(pos2(0.0, 0.0)));
        assert_eq!(path.end(), Some(pos2(10.0, 0.0)));
        assert_eq!(
            path.segments(),
            &[
                PathSegment::MoveTo(pos2(0.0, 0.0)),
                PathSegment::QuadTo {
                    ctrl: pos2(0.0, 0.0),
                    to: pos2(5.0, 0.0)
                },
                PathSegment::LineTo(pos2(10.0, 0.0)),
            ]
        );
    }

    #[test]
    fn test_segments_follow_midpoints() {
        let shape = PathShape::build([pos2(0.0, 0.0), pos2(10.0, 10.0), pos2(20.0, 0.0)]);
        let path = shape.curve().unwrap();
        assert_eq!(path.segments().len(), 4);
        assert_eq!(
            path.segments()[2],
            PathSegment::QuadTo {
                ctrl: pos2(10.0, 10.0),
                to: pos2(15.0, 5.0)
            }
        );
    }

    #[test]
    fn test_flatten_starts_and_ends_on_samples() {
        let shape = PathShape::build([pos2(0.0, 0.0), pos2(40.0, 40.0), pos2(80.0, 0.0)]);
        let line = shape.curve().unwrap().flatten();
        assert_eq!(line.first(), Some(&pos2(0.0, 0.0)));
        assert_eq!(line.last(), Some(&pos2(80.0, 0.0)));
        assert!(line.len() > 3);
    }

    #[test]
    fn test_bounds_cover_samples() {
        let shape = PathShape::build([pos2(-5.0, 2.0), pos2(10.0, 8.0)]);
        let bounds = shape.curve().unwrap().bounds();
        assert!(bounds.contains(pos2(-5.0, 2.0)));
        assert!(bounds.contains(pos2(10.0, 8.0)));
    }
}
