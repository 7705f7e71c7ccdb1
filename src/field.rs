//! Force fields that pull particles onto nodal patterns.
//!
//! Two kinds of field drive the simulation:
//!
//! - **Chladni fields**: the closed-form standing wave
//!   `cos(nπx)·cos(mπy) − cos(mπx)·cos(nπy)`. Its zero set (the *nodal
//!   lines*) is where particles accumulate.
//! - **Shape fields**: a distance field around a fixed geometric outline,
//!   answered by a nearest-segment query.
//!
//! Both are evaluated in normalized space `[-1, 1] × [-1, 1]`.
//!
//! # Force shape
//!
//! The Chladni force is the negated, normalized gradient scaled by the field
//! value itself:
//!
//! ```text
//! F(p) = -(∇f / |∇f|) · f(p) · strength
//! ```
//!
//! Its magnitude `|f|·strength` vanishes on the nodal lines and grows away
//! from them, and its direction always points toward decreasing `|f|`.
//! Particles are pulled in from anywhere in the domain and come to rest on
//! the lines instead of orbiting them.

use std::f32::consts::PI;

use glam::Vec2;

use crate::shape::Shape;
use crate::spatial::{Nearest, Segment, SegmentGrid};

/// Finite-difference step used for numerical gradients.
pub const GRADIENT_STEP: f32 = 1e-3;

/// Segment count above which [`ShapeField`] builds a [`SegmentGrid`].
pub const GRID_THRESHOLD: usize = 128;

/// Distance from a shape outline inside which the pull fades out linearly.
pub const SETTLE_RADIUS: f32 = 0.02;

/// Evaluate the Chladni standing wave at `(x, y)`.
///
/// `n` and `m` need not be integers: fractional mode numbers produce the
/// intermediate figures seen while a transition is blending.
///
/// The result is always within `[-2, 2]`.
#[inline]
pub fn field_value(x: f32, y: f32, n: f32, m: f32) -> f32 {
    (n * PI * x).cos() * (m * PI * y).cos() - (m * PI * x).cos() * (n * PI * y).cos()
}

/// Central-difference gradient of [`field_value`].
#[inline]
pub fn field_gradient(x: f32, y: f32, n: f32, m: f32) -> Vec2 {
    let h = GRADIENT_STEP;
    let dx = field_value(x + h, y, n, m) - field_value(x - h, y, n, m);
    let dy = field_value(x, y + h, n, m) - field_value(x, y - h, n, m);
    Vec2::new(dx, dy) / (2.0 * h)
}

/// Force pulling a particle at `(x, y)` toward the nearest nodal line.
///
/// Returns `Vec2::ZERO` where the gradient underflows to zero (field
/// extrema, saddle points) instead of normalizing a zero-length vector.
pub fn field_force(x: f32, y: f32, n: f32, m: f32, strength: f32) -> Vec2 {
    let value = field_value(x, y, n, m);
    let gradient = field_gradient(x, y, n, m);
    let length = gradient.length();
    if length == 0.0 || !length.is_finite() {
        return Vec2::ZERO;
    }
    -(gradient / length) * value * strength
}

/// A scalar field with an attracting zero set.
pub trait ForceField: Send + Sync {
    /// Field value at `p`. Zero on the attracting curves.
    fn value(&self, p: Vec2) -> f32;

    /// Force acting on a particle at `p`.
    fn force(&self, p: Vec2, strength: f32) -> Vec2;
}

/// Chladni standing wave with mode numbers `(n, m)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChladniField {
    pub n: f32,
    pub m: f32,
}

impl ChladniField {
    pub fn new(n: f32, m: f32) -> Self {
        Self { n, m }
    }
}

impl ForceField for ChladniField {
    #[inline]
    fn value(&self, p: Vec2) -> f32 {
        field_value(p.x, p.y, self.n, self.m)
    }

    #[inline]
    fn force(&self, p: Vec2, strength: f32) -> Vec2 {
        field_force(p.x, p.y, self.n, self.m, strength)
    }
}

/// Attractor built from a fixed outline.
///
/// The shape is flattened into line segments once at construction. Small
/// outlines are scanned linearly; anything above [`GRID_THRESHOLD`]
/// segments goes through a [`SegmentGrid`] so a frame stays well under
/// `O(particles × segments)`.
#[derive(Clone, Debug)]
pub struct ShapeField {
    segments: Vec<Segment>,
    grid: Option<SegmentGrid>,
}

impl ShapeField {
    /// Flatten `shape` and index its segments.
    pub fn new(shape: &Shape) -> Self {
        Self::from_segments(shape.segments())
    }

    /// Index prebuilt segments. Degenerate segments are kept; they act as points.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let grid = if segments.len() > GRID_THRESHOLD {
            Some(SegmentGrid::new(&segments, SegmentGrid::resolution_for(segments.len())))
        } else {
            None
        };
        Self { segments, grid }
    }

    /// Number of segments in the outline.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Whether queries go through the grid index.
    pub fn is_indexed(&self) -> bool {
        self.grid.is_some()
    }

    /// Closest point on the outline to `p`.
    pub fn nearest(&self, p: Vec2) -> Option<Nearest> {
        match &self.grid {
            Some(grid) => grid.nearest(&self.segments, p),
            None => crate::spatial::nearest_linear(&self.segments, p),
        }
    }
}

impl ForceField for ShapeField {
    fn value(&self, p: Vec2) -> f32 {
        self.nearest(p).map(|n| n.distance).unwrap_or(0.0)
    }

    fn force(&self, p: Vec2, strength: f32) -> Vec2 {
        let Some(nearest) = self.nearest(p) else {
            return Vec2::ZERO;
        };
        if nearest.distance <= f32::EPSILON {
            return Vec2::ZERO;
        }
        let direction = (nearest.point - p) / nearest.distance;
        let falloff = (nearest.distance / SETTLE_RADIUS).min(1.0);
        direction * strength * falloff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    #[test]
    fn test_field_value_is_bounded_and_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let x = rng.gen_range(-1.0..=1.0);
            let y = rng.gen_range(-1.0..=1.0);
            let n = rng.gen_range(1..8) as f32;
            let m = rng.gen_range(1..8) as f32;
            let v = field_value(x, y, n, m);
            assert!((-2.0..=2.0).contains(&v), "value {} out of range", v);
            assert_eq!(v, field_value(x, y, n, m));
        }
    }

    #[test]
    fn test_field_value_is_antisymmetric_in_modes() {
        let v = field_value(0.3, -0.2, 2.0, 5.0);
        let w = field_value(0.3, -0.2, 5.0, 2.0);
        assert!((v + w).abs() < 1e-6);
    }

    #[test]
    fn test_equal_modes_give_a_flat_field() {
        assert_eq!(field_value(0.41, 0.77, 3.0, 3.0), 0.0);
        assert_eq!(field_force(0.41, 0.77, 3.0, 3.0, 1.0), Vec2::ZERO);
    }

    #[test]
    fn test_diagonal_is_a_nodal_line() {
        // cos(nπx)cos(mπx) - cos(mπx)cos(nπx) = 0 whenever x == y.
        for i in 0..20 {
            let t = -1.0 + i as f32 * 0.1;
            assert!(field_value(t, t, 2.0, 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_force_points_toward_nodal_line() {
        let (n, m) = (2.0, 3.0);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            let p = Vec2::new(rng.gen_range(-0.95..0.95), rng.gen_range(-0.95..0.95));
            let f = field_force(p.x, p.y, n, m, 1.0);
            if f.length() < 0.05 || field_gradient(p.x, p.y, n, m).length() < 0.1 {
                continue;
            }
            let step = p + f.normalize() * 1e-4;
            assert!(
                field_value(step.x, step.y, n, m).abs() < field_value(p.x, p.y, n, m).abs(),
                "force at {:?} does not reduce |f|",
                p
            );
        }
    }

    #[test]
    fn test_force_magnitude_tracks_field_value() {
        let p = Vec2::new(0.13, 0.58);
        let f = field_force(p.x, p.y, 2.0, 3.0, 0.8);
        let expected = field_value(p.x, p.y, 2.0, 3.0).abs() * 0.8;
        assert!((f.length() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_force_is_zero_at_stationary_point() {
        // The origin is a stationary point of every Chladni field.
        let f = field_force(0.0, 0.0, 1.0, 2.0, 1.0);
        assert!(f.is_finite());
        assert_eq!(f, Vec2::ZERO);
    }

    #[test]
    fn test_fractional_modes_are_valid() {
        let v = field_value(0.2, 0.4, 2.5, 3.25);
        assert!(v.is_finite());
        assert!(field_force(0.2, 0.4, 2.5, 3.25, 1.0).is_finite());
    }

    #[test]
    fn test_shape_force_pulls_onto_outline() {
        let field = ShapeField::new(&Shape::Circle { radius: 0.5, segments: 64 });
        let outside = field.force(Vec2::new(0.9, 0.0), 1.0);
        assert!(outside.x < 0.0);
        let inside = field.force(Vec2::new(0.1, 0.0), 1.0);
        assert!(inside.x > 0.0);
        assert!((outside.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shape_force_fades_near_outline() {
        let field = ShapeField::new(&Shape::Circle { radius: 0.5, segments: 256 });
        let near = field.force(Vec2::new(0.505, 0.0), 1.0);
        assert!(near.length() < 0.5);
    }

    #[test]
    fn test_large_shape_builds_index() {
        let small = ShapeField::new(&Shape::Circle { radius: 0.5, segments: 32 });
        let large = ShapeField::new(&Shape::Circle { radius: 0.5, segments: 1024 });
        assert!(!small.is_indexed());
        assert!(large.is_indexed());
    }
}
