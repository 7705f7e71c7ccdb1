//! Grid-bucket spatial index for nearest-segment queries.
//!
//! Shape attractors are answered by "closest point on any segment". With a
//! few thousand segments and tens of thousands of particles a linear scan
//! per particle is far too slow, so segments are bucketed into a uniform
//! grid over the normalized domain and queries walk outward ring by ring
//! from the particle's cell until no closer segment can exist.
//!
//! Results are exact: the grid only prunes, it never approximates.

use glam::Vec2;

/// Lower corner of the indexed domain.
const DOMAIN_MIN: f32 = -1.0;
/// Side length of the indexed domain.
const DOMAIN_SIZE: f32 = 2.0;

/// A line segment in normalized space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub a: Vec2,
    pub b: Vec2,
}

impl Segment {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    /// Closest point on the segment to `p`.
    #[inline]
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        let ab = self.b - self.a;
        let len_sq = ab.length_squared();
        if len_sq <= f32::EPSILON {
            return self.a;
        }
        let t = ((p - self.a).dot(ab) / len_sq).clamp(0.0, 1.0);
        self.a + ab * t
    }

    fn min(&self) -> Vec2 {
        self.a.min(self.b)
    }

    fn max(&self) -> Vec2 {
        self.a.max(self.b)
    }
}

/// Result of a nearest-segment query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Nearest {
    /// Closest point on the outline.
    pub point: Vec2,
    /// Euclidean distance from the query point.
    pub distance: f32,
    /// Index of the winning segment.
    pub segment: usize,
}

/// Brute-force nearest segment. Used for small outlines and as the
/// reference the grid is tested against.
pub fn nearest_linear(segments: &[Segment], p: Vec2) -> Option<Nearest> {
    let mut best: Option<(usize, Vec2, f32)> = None;
    for (i, seg) in segments.iter().enumerate() {
        let q = seg.closest_point(p);
        let d = q.distance_squared(p);
        if best.map_or(true, |(_, _, bd)| d < bd) {
            best = Some((i, q, d));
        }
    }
    best.map(|(segment, point, d)| Nearest {
        point,
        distance: d.sqrt(),
        segment,
    })
}

/// Uniform grid of segment buckets covering `[-1, 1]²`.
///
/// Each cell lists the segments whose bounding box overlaps it. Points
/// outside the domain are clamped to the border cells for the starting
/// ring; distance bounds still use the true position.
#[derive(Clone, Debug)]
pub struct SegmentGrid {
    resolution: u32,
    cell_size: f32,
    cells: Vec<Vec<u32>>,
}

impl SegmentGrid {
    /// Pick a resolution giving roughly a handful of segments per cell.
    pub fn resolution_for(segment_count: usize) -> u32 {
        let target = (segment_count as f32 / 4.0).sqrt().ceil() as u32;
        target.clamp(4, 256)
    }

    pub fn new(segments: &[Segment], resolution: u32) -> Self {
        let resolution = resolution.max(1);
        let cell_size = DOMAIN_SIZE / resolution as f32;
        let mut cells = vec![Vec::new(); (resolution * resolution) as usize];

        for (i, seg) in segments.iter().enumerate() {
            let (x0, y0) = Self::cell_coords(seg.min(), resolution, cell_size);
            let (x1, y1) = Self::cell_coords(seg.max(), resolution, cell_size);
            for cy in y0..=y1 {
                for cx in x0..=x1 {
                    cells[(cy * resolution + cx) as usize].push(i as u32);
                }
            }
        }

        Self {
            resolution,
            cell_size,
            cells,
        }
    }

    /// Cells per axis.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    fn cell_coords(p: Vec2, resolution: u32, cell_size: f32) -> (u32, u32) {
        let max = (resolution - 1) as f32;
        let x = ((p.x - DOMAIN_MIN) / cell_size).floor().clamp(0.0, max);
        let y = ((p.y - DOMAIN_MIN) / cell_size).floor().clamp(0.0, max);
        (x as u32, y as u32)
    }

    /// Closest segment to `p`, identical to [`nearest_linear`] over the
    /// same segments.
    pub fn nearest(&self, segments: &[Segment], p: Vec2) -> Option<Nearest> {
        if segments.is_empty() || !p.is_finite() {
            return nearest_linear(segments, p);
        }

        let (cx, cy) = Self::cell_coords(p, self.resolution, self.cell_size);
        let res = self.resolution as i32;
        let mut best: Option<(usize, Vec2, f32)> = None;

        for ring in 0..res {
            let ring_found = self.scan_ring(segments, p, cx as i32, cy as i32, ring, &mut best);
            if !ring_found && ring > 0 && self.ring_is_exhausted(cx as i32, cy as i32, ring) {
                break;
            }
            if let Some((_, _, best_sq)) = best {
                // Anything in ring r+1 or beyond is at least `ring * cell_size`
                // away from the query cell's border.
                let reach = ring as f32 * self.cell_size + self.distance_to_cell_border(p, cx, cy);
                if best_sq.sqrt() <= reach {
                    break;
                }
            }
        }

        best.map(|(segment, point, d)| Nearest {
            point,
            distance: d.sqrt(),
            segment,
        })
    }

    /// Scan every cell on the square ring `ring` around `(cx, cy)`.
    /// Returns whether any cell of the ring lay inside the grid.
    fn scan_ring(
        &self,
        segments: &[Segment],
        p: Vec2,
        cx: i32,
        cy: i32,
        ring: i32,
        best: &mut Option<(usize, Vec2, f32)>,
    ) -> bool {
        let res = self.resolution as i32;
        let mut any = false;
        for y in (cy - ring)..=(cy + ring) {
            for x in (cx - ring)..=(cx + ring) {
                let on_ring = (x - cx).abs() == ring || (y - cy).abs() == ring;
                if !on_ring || x < 0 || y < 0 || x >= res || y >= res {
                    continue;
                }
                any = true;
                for &i in &self.cells[(y * res + x) as usize] {
                    let q = segments[i as usize].closest_point(p);
                    let d = q.distance_squared(p);
                    if best.map_or(true, |(_, _, bd)| d < bd) {
                        *best = Some((i as usize, q, d));
                    }
                }
            }
        }
        any
    }

    fn ring_is_exhausted(&self, cx: i32, cy: i32, ring: i32) -> bool {
        let res = self.resolution as i32;
        cx - ring < 0 && cy - ring < 0 && cx + ring >= res && cy + ring >= res
    }

    /// Distance from `p` to the nearest edge of its (clamped) cell, zero if
    /// `p` lies outside that cell.
    fn distance_to_cell_border(&self, p: Vec2, cx: u32, cy: u32) -> f32 {
        let lo = Vec2::new(
            DOMAIN_MIN + cx as f32 * self.cell_size,
            DOMAIN_MIN + cy as f32 * self.cell_size,
        );
        let hi = lo + Vec2::splat(self.cell_size);
        let dx = (p.x - lo.x).min(hi.x - p.x);
        let dy = (p.y - lo.y).min(hi.y - p.y);
        dx.min(dy).max(0.0)
    }
}
