//! Geometric outlines for shape attractors.
//!
//! A [`Shape`] is a declarative description (circle, star, free polyline,
//! ...) that flattens into [`Segment`]s in normalized space. Shapes are
//! serializable so scene files can name them directly:
//!
//! ```json
//! { "kind": "star", "points": 5, "outer": 0.7, "inner": 0.3 }
//! ```

use std::f32::consts::TAU;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::spatial::Segment;

/// Upper bound on segments generated for any procedural shape.
const MAX_SEGMENTS: u32 = 8192;

/// Radii and scales are clamped into this range of normalized units.
pub const EXTENT_RANGE: (f32, f32) = (0.01, 1.0);

/// Lissajous frequencies are clamped into this range.
pub const FREQUENCY_RANGE: (f32, f32) = (0.5, 16.0);

/// An outline particles are attracted onto.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// Circle centred on the origin.
    Circle { radius: f32, segments: u32 },
    /// Regular polygon centred on the origin, first vertex pointing up.
    Polygon { sides: u32, radius: f32 },
    /// Star with alternating outer and inner vertices.
    Star { points: u32, outer: f32, inner: f32 },
    /// Closed Lissajous curve `(sin(a·t + π/2), sin(b·t))` scaled by `scale`.
    Lissajous { a: f32, b: f32, scale: f32, segments: u32 },
    /// Arbitrary strokes. Each inner list is one open polyline.
    Polyline { strokes: Vec<Vec<[f32; 2]>> },
}

impl Shape {
    /// Copy of the shape with every parameter finite and inside the domain.
    ///
    /// Radii and scales land in [`EXTENT_RANGE`], polygons keep at least
    /// three sides, stars at least two points, and polyline vertices that
    /// are not finite are dropped.
    pub fn sanitized(&self) -> Shape {
        let extent = |v: f32, fallback: f32| clean(v, fallback, EXTENT_RANGE);
        match self {
            Shape::Circle { radius, segments } => Shape::Circle {
                radius: extent(*radius, 0.5),
                segments: (*segments).clamp(3, MAX_SEGMENTS),
            },
            Shape::Polygon { sides, radius } => Shape::Polygon {
                sides: (*sides).clamp(3, MAX_SEGMENTS),
                radius: extent(*radius, 0.5),
            },
            Shape::Star { points, outer, inner } => Shape::Star {
                points: (*points).clamp(2, MAX_SEGMENTS / 2),
                outer: extent(*outer, 0.7),
                inner: extent(*inner, 0.3),
            },
            Shape::Lissajous { a, b, scale, segments } => Shape::Lissajous {
                a: clean(*a, 3.0, FREQUENCY_RANGE),
                b: clean(*b, 2.0, FREQUENCY_RANGE),
                scale: extent(*scale, 0.7),
                segments: (*segments).clamp(3, MAX_SEGMENTS),
            },
            Shape::Polyline { strokes } => Shape::Polyline {
                strokes: strokes
                    .iter()
                    .map(|stroke| {
                        stroke
                            .iter()
                            .copied()
                            .filter(|[x, y]| x.is_finite() && y.is_finite())
                            .collect::<Vec<_>>()
                    })
                    .filter(|stroke| stroke.len() >= 2)
                    .collect(),
            },
        }
    }

    /// Flatten the outline into line segments.
    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Shape::Circle { radius, segments } => {
                closed_loop(ring_points(*segments, |t| Vec2::from_angle(t * TAU) * *radius))
            }
            Shape::Polygon { sides, radius } => {
                let sides = (*sides).max(3);
                closed_loop(ring_points(sides, |t| {
                    Vec2::from_angle(t * TAU + TAU / 4.0) * *radius
                }))
            }
            Shape::Star {
                points,
                outer,
                inner,
            } => {
                let vertices = (*points).max(2) * 2;
                closed_loop(ring_points(vertices, |t| {
                    let i = (t * vertices as f32).round() as u32;
                    let r = if i % 2 == 0 { *outer } else { *inner };
                    Vec2::from_angle(t * TAU + TAU / 4.0) * r
                }))
            }
            Shape::Lissajous {
                a,
                b,
                scale,
                segments,
            } => closed_loop(ring_points(*segments, |t| {
                let theta = t * TAU;
                Vec2::new((a * theta + TAU / 4.0).sin(), (b * theta).sin()) * *scale
            })),
            Shape::Polyline { strokes } => strokes
                .iter()
                .flat_map(|stroke| {
                    stroke
                        .windows(2)
                        .map(|w| Segment::new(Vec2::from(w[0]), Vec2::from(w[1])))
                        .collect::<Vec<_>>()
                })
                .collect(),
        }
    }
}

fn clean(v: f32, fallback: f32, (lo, hi): (f32, f32)) -> f32 {
    if v.is_finite() {
        v.clamp(lo, hi)
    } else {
        fallback
    }
}

/// Sample `count` points around a loop, `f` receiving `t ∈ [0, 1)`.
fn ring_points(count: u32, f: impl Fn(f32) -> Vec2) -> Vec<Vec2> {
    let count = count.clamp(3, MAX_SEGMENTS);
    (0..count).map(|i| f(i as f32 / count as f32)).collect()
}

fn closed_loop(points: Vec<Vec2>) -> Vec<Segment> {
    let n = points.len();
    (0..n)
        .map(|i| Segment::new(points[i], points[(i + 1) % n]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_segments_lie_on_radius() {
        let segs = Shape::Circle { radius: 0.5, segments: 90 }.segments();
        assert_eq!(segs.len(), 90);
        for s in &segs {
            assert!((s.a.length() - 0.5).abs() < 1e-5);
        }
        // Closed: last segment ends where the first begins.
        assert_eq!(segs.last().unwrap().b, segs[0].a);
    }

    #[test]
    fn test_star_alternates_radii() {
        let segs = Shape::Star { points: 5, outer: 0.8, inner: 0.4 }.segments();
        assert_eq!(segs.len(), 10);
        assert!((segs[0].a.length() - 0.8).abs() < 1e-5);
        assert!((segs[1].a.length() - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_polygon_has_minimum_three_sides() {
        let segs = Shape::Polygon { sides: 1, radius: 0.5 }.segments();
        assert_eq!(segs.len(), 3);
    }

    #[test]
    fn test_polyline_strokes_are_open() {
        let shape = Shape::Polyline {
            strokes: vec![
                vec![[-0.5, -0.5], [0.0, 0.5], [0.5, -0.5]],
                vec![[-0.25, 0.0], [0.25, 0.0]],
            ],
        };
        assert_eq!(shape.segments().len(), 3);
    }

    #[test]
    fn test_sanitized_shapes_have_finite_segments() {
        let wild = [
            Shape::Circle { radius: f32::INFINITY, segments: 64 },
            Shape::Polygon { sides: 0, radius: -3.0 },
            Shape::Star { points: 1, outer: f32::NAN, inner: 1e30 },
            Shape::Lissajous { a: f32::NAN, b: 1e9, scale: f32::NEG_INFINITY, segments: 0 },
            Shape::Polyline {
                strokes: vec![vec![[0.0, 0.0], [f32::NAN, 0.5], [0.5, 0.5]], vec![[f32::INFINITY, 0.0]]],
            },
        ];
        for shape in &wild {
            let clean = shape.sanitized();
            let segments = clean.segments();
            assert!(!segments.is_empty(), "{:?} lost every segment", clean);
            for s in &segments {
                assert!(s.a.is_finite() && s.b.is_finite(), "{:?} -> {:?}", shape, s);
                assert!(s.a.length() <= 1.5 && s.b.length() <= 1.5);
            }
        }
    }

    #[test]
    fn test_sanitized_enforces_minimum_vertices() {
        assert_eq!(
            Shape::Polygon { sides: 1, radius: 0.5 }.sanitized(),
            Shape::Polygon { sides: 3, radius: 0.5 }
        );
        assert_eq!(
            Shape::Star { points: 0, outer: 0.8, inner: 0.4 }.sanitized(),
            Shape::Star { points: 2, outer: 0.8, inner: 0.4 }
        );
        let valid = Shape::Circle { radius: 0.6, segments: 128 };
        assert_eq!(valid.sanitized(), valid);
    }

    #[test]
    fn test_shape_round_trips_through_json() {
        let json = r#"{ "kind": "star", "points": 5, "outer": 0.7, "inner": 0.3 }"#;
        let shape: Shape = serde_json::from_str(json).unwrap();
        assert_eq!(shape, Shape::Star { points: 5, outer: 0.7, inner: 0.3 });
    }
}
