//! The particle ensemble.
//!
//! A [`ParticleStore`] is allocated once per simulation instance and never
//! grows or shrinks. The integrator mutates it in place every frame;
//! "scatter" repositions the existing particles rather than reallocating.
//!
//! Positions live in normalized space `[-1, 1] × [-1, 1]`.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Half-extent of the normalized domain.
pub const BOUNDS: f32 = 1.0;

/// Per-particle size multiplier is drawn from this range.
const SIZE_JITTER: (f32, f32) = (0.6, 1.4);

/// One simulated point.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Multiplier on the pattern's base particle size.
    pub size: f32,
}

impl Particle {
    /// Whether position and velocity are free of NaN/Infinity.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }

    #[inline]
    /// Inside the `[-BOUNDS, BOUNDS]` square.
    pub fn in_bounds(&self) -> bool {
        self.position.x.abs() <= BOUNDS && self.position.y.abs() <= BOUNDS
    }
}

/// Fixed-size particle ensemble plus the random source used to place it.
pub struct ParticleStore {
    particles: Vec<Particle>,
    rng: StdRng,
}

impl ParticleStore {
    /// Allocate `count` particles at uniform random positions.
    ///
    /// A zero count is bumped to one particle so every downstream stage can
    /// assume a non-empty ensemble.
    pub fn new(count: usize, seed: u64) -> Self {
        let count = count.max(1);
        let mut store = Self {
            particles: vec![Particle::default(); count],
            rng: StdRng::seed_from_u64(seed),
        };
        store.scatter();
        store
    }

    /// Reinitialize every particle to a uniform random position with zero
    /// velocity. The target pattern is untouched.
    pub fn scatter(&mut self) {
        for p in &mut self.particles {
            *p = Self::fresh(&mut self.rng);
        }
    }

    /// Reset a single particle, e.g. after it picked up a NaN.
    pub fn reset_particle(&mut self, index: usize) {
        if let Some(p) = self.particles.get_mut(index) {
            *p = Self::fresh(&mut self.rng);
        }
    }

    fn fresh(rng: &mut StdRng) -> Particle {
        Particle {
            position: Vec2::new(rng.gen_range(-BOUNDS..=BOUNDS), rng.gen_range(-BOUNDS..=BOUNDS)),
            velocity: Vec2::ZERO,
            size: rng.gen_range(SIZE_JITTER.0..=SIZE_JITTER.1),
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Particles together with the store's random source, for the integrator.
    pub(crate) fn split_mut(&mut self) -> (&mut [Particle], &mut StdRng) {
        (&mut self.particles, &mut self.rng)
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.particles.iter().map(|p| p.position)
    }

    /// Raw bytes for GPU upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.particles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_in_bounds_and_at_rest() {
        let store = ParticleStore::new(5_000, 1);
        assert_eq!(store.len(), 5_000);
        for p in store.particles() {
            assert!(p.in_bounds());
            assert_eq!(p.velocity, Vec2::ZERO);
            assert!(p.size >= SIZE_JITTER.0 && p.size <= SIZE_JITTER.1);
        }
    }

    #[test]
    fn test_zero_count_is_bumped() {
        assert_eq!(ParticleStore::new(0, 1).len(), 1);
    }

    #[test]
    fn test_scatter_zeroes_velocity() {
        let mut store = ParticleStore::new(1_000, 2);
        for p in store.particles_mut() {
            p.velocity = Vec2::new(3.0, -2.0);
            p.position = Vec2::new(7.0, 7.0);
        }
        store.scatter();
        for p in store.particles() {
            assert_eq!(p.velocity, Vec2::ZERO);
            assert!(p.in_bounds());
        }
    }

    #[test]
    fn test_consecutive_scatters_differ() {
        let mut store = ParticleStore::new(1_000, 3);
        store.scatter();
        let first: Vec<Vec2> = store.positions().collect();
        store.scatter();
        let second: Vec<Vec2> = store.positions().collect();
        let same = first.iter().zip(&second).filter(|(a, b)| a == b).count();
        assert_eq!(same, 0);
    }

    #[test]
    fn test_reset_particle_recovers_nan() {
        let mut store = ParticleStore::new(10, 4);
        store.particles_mut()[3].position = Vec2::new(f32::NAN, 0.0);
        assert!(!store.particles()[3].is_finite());
        store.reset_particle(3);
        assert!(store.particles()[3].is_finite());
        assert!(store.particles()[3].in_bounds());
    }

    #[test]
    fn test_byte_layout_is_packed() {
        let store = ParticleStore::new(4, 5);
        assert_eq!(std::mem::size_of::<Particle>(), 20);
        assert_eq!(store.as_bytes().len(), 4 * 20);
    }
}
