//! Per-frame physics step.
//!
//! The integrator is a pure transform over the particle store, run once per
//! frame with the blended field parameters:
//!
//! ```text
//! v += force(p) · dt
//! v += jitter · U(-1, 1)
//! v += chaos  · U(-1, 1)        (chaos regime only)
//! v += pointer repulsion        (if a pointer is present)
//! v *= damping
//! p += v
//! boundary(p, v)
//! ```
//!
//! Velocity is always damped before it is applied to the position; with
//! damping in `(0, 1)` the step is stable for any bounded force.
//!
//! `dt` is given in seconds and converted to frames at [`REFERENCE_FPS`],
//! so a 30 fps device takes half as many steps of twice the size and the
//! pattern settles at the same wall-clock speed.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::particle::{ParticleStore, BOUNDS};
use crate::transition::BlendedParams;

/// Frame rate the dimensionless step constants are tuned for.
pub const REFERENCE_FPS: f32 = 60.0;

/// Largest step, in reference frames, taken in one call. A long stall
/// (tab hidden, debugger) must not fling particles across the domain.
pub const MAX_FRAME_SCALE: f32 = 4.0;

/// Converts field force into per-frame velocity change.
pub const FORCE_SCALE: f32 = 0.01;

/// What happens to particles at the edge of the domain.
///
/// Exactly one policy applies per simulation instance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Re-enter from the opposite edge with velocity unchanged.
    ///
    /// Chladni fields are periodic with period 2 in both axes, so wrapping
    /// is seamless for them.
    Wrap,
    /// Hold particles on the edge and drop the outward velocity component.
    #[default]
    Clamp,
    /// Mirror the outward velocity component at the edge.
    Bounce,
    /// Push particles back with a small inward impulse once they enter the
    /// outer `margin` band. Positions may briefly leave the domain.
    Nudge { margin: f32, strength: f32 },
}

/// Weakest accepted nudge impulse. Zero would let particles drift away.
pub const MIN_NUDGE_STRENGTH: f32 = 1e-4;

impl BoundaryPolicy {
    /// Copy with nudge parameters in a usable range: `margin` in
    /// `[0, 1]`, `strength` in `[MIN_NUDGE_STRENGTH, 1]`. Non-finite values
    /// fall back to `margin: 0.1, strength: 0.002`.
    pub fn sanitized(self) -> Self {
        match self {
            BoundaryPolicy::Nudge { margin, strength } => BoundaryPolicy::Nudge {
                margin: if margin.is_finite() { margin.clamp(0.0, BOUNDS) } else { 0.1 },
                strength: if strength.is_finite() {
                    strength.clamp(MIN_NUDGE_STRENGTH, 1.0)
                } else {
                    0.002
                },
            },
            other => other,
        }
    }
}

/// Pointer interaction: particles within `radius` are pushed away.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pointer {
    /// Pointer location in normalized space.
    pub position: Vec2,
    pub radius: f32,
    pub strength: f32,
}

impl Pointer {
    /// Pointer at `position` with the default radius and strength.
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            radius: 0.15,
            strength: 1.5,
        }
    }
}

/// Which regime a step runs under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regime {
    /// Force, jitter, damping.
    Settle,
    /// Settle plus random impulses scaled by the chaos parameter.
    Chaos,
}

/// Bookkeeping from one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Particles reset because they carried NaN or Infinity.
    pub resets: usize,
}

/// Advances a [`ParticleStore`] by one frame.
#[derive(Clone, Debug)]
pub struct Integrator {
    policy: BoundaryPolicy,
    pointer: Option<Pointer>,
}

impl Integrator {
    /// Integrator applying `policy` (sanitized) at the domain edge.
    pub fn new(policy: BoundaryPolicy) -> Self {
        Self {
            policy: policy.sanitized(),
            pointer: None,
        }
    }

    /// Boundary policy in effect.
    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    /// Set or clear the pointer. Takes effect on the next step.
    pub fn set_pointer(&mut self, pointer: Option<Pointer>) {
        self.pointer = pointer;
    }

    /// Current pointer, if any.
    pub fn pointer(&self) -> Option<Pointer> {
        self.pointer
    }

    /// Regime implied by the blended parameters.
    pub fn regime(params: &BlendedParams) -> Regime {
        if params.chaos > 0.0 {
            Regime::Chaos
        } else {
            Regime::Settle
        }
    }

    /// Convert seconds to reference frames, clamped to `[0, MAX_FRAME_SCALE]`.
    pub fn frame_scale(dt: f32) -> f32 {
        if dt.is_finite() {
            (dt * REFERENCE_FPS).clamp(0.0, MAX_FRAME_SCALE)
        } else {
            0.0
        }
    }

    /// Run one step.
    pub fn step(&mut self, store: &mut ParticleStore, params: &BlendedParams, dt: f32) -> StepStats {
        let mut stats = StepStats::default();

        for i in 0..store.len() {
            if !store.particles()[i].is_finite() {
                store.reset_particle(i);
                stats.resets += 1;
            }
        }
        if stats.resets > 0 {
            tracing::warn!(resets = stats.resets, "reset particles with non-finite state");
        }

        let frame = Self::frame_scale(dt);
        if frame == 0.0 {
            return stats;
        }

        let strength = params.force_strength;
        let damping = params.damping.powf(frame);
        let jitter = params.jitter * frame;
        let chaos = match Self::regime(params) {
            Regime::Chaos => params.chaos * frame,
            Regime::Settle => 0.0,
        };
        let pointer = self.pointer;
        let policy = self.policy;

        let (particles, rng) = store.split_mut();
        for p in particles.iter_mut() {
            let mut v = p.velocity;

            v += params.field.force(p.position, strength) * FORCE_SCALE * frame;

            if jitter > 0.0 {
                v += Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0)) * jitter;
            }
            if chaos > 0.0 {
                v += Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0)) * chaos;
            }
            if let Some(ptr) = pointer {
                v += pointer_impulse(p.position, &ptr) * frame;
            }

            v *= damping;
            p.position += v * frame;
            p.velocity = v;

            apply_boundary(policy, &mut p.position, &mut p.velocity, frame);
        }

        stats
    }
}

fn pointer_impulse(position: Vec2, pointer: &Pointer) -> Vec2 {
    let offset = position - pointer.position;
    let distance = offset.length();
    if distance >= pointer.radius || distance <= f32::EPSILON {
        return Vec2::ZERO;
    }
    let falloff = 1.0 - distance / pointer.radius;
    offset / distance * pointer.strength * falloff * FORCE_SCALE
}

/// Apply `policy` to one particle. Public for callers that move particles
/// outside the integrator.
pub fn apply_boundary(policy: BoundaryPolicy, position: &mut Vec2, velocity: &mut Vec2, frame: f32) {
    match policy {
        BoundaryPolicy::Wrap => {
            position.x = wrap(position.x);
            position.y = wrap(position.y);
        }
        BoundaryPolicy::Clamp => {
            clamp_axis(&mut position.x, &mut velocity.x);
            clamp_axis(&mut position.y, &mut velocity.y);
        }
        BoundaryPolicy::Bounce => {
            bounce_axis(&mut position.x, &mut velocity.x);
            bounce_axis(&mut position.y, &mut velocity.y);
        }
        BoundaryPolicy::Nudge { margin, strength } => {
            let inner = BOUNDS - margin.clamp(0.0, BOUNDS);
            nudge_axis(position.x, &mut velocity.x, inner, strength * frame);
            nudge_axis(position.y, &mut velocity.y, inner, strength * frame);
        }
    }
}

#[inline]
fn wrap(x: f32) -> f32 {
    if x > BOUNDS || x < -BOUNDS {
        (x + BOUNDS).rem_euclid(2.0 * BOUNDS) - BOUNDS
    } else {
        x
    }
}

#[inline]
fn clamp_axis(x: &mut f32, v: &mut f32) {
    if *x > BOUNDS {
        *x = BOUNDS;
        *v = v.min(0.0);
    } else if *x < -BOUNDS {
        *x = -BOUNDS;
        *v = v.max(0.0);
    }
}

#[inline]
fn bounce_axis(x: &mut f32, v: &mut f32) {
    if *x > BOUNDS {
        *x = (2.0 * BOUNDS - *x).max(-BOUNDS);
        *v = -v.abs();
    } else if *x < -BOUNDS {
        *x = (-2.0 * BOUNDS - *x).min(BOUNDS);
        *v = v.abs();
    }
}

#[inline]
fn nudge_axis(x: f32, v: &mut f32, inner: f32, impulse: f32) {
    if x > inner {
        *v -= impulse;
    } else if x < -inner {
        *v += impulse;
    }
}
