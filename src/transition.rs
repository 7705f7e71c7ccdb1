//! Smooth interpolation between pattern configurations.
//!
//! The controller blends the *field parameters* rather than particle
//! positions: mode numbers, force strength, damping, jitter and chaos move
//! continuously from the current pattern to the target, so the force field
//! itself morphs and particles follow it. Fractional mode numbers are valid
//! field inputs and produce the in-between figures.
//!
//! Color, opacity and particle size are cosmetic and snap to the target as
//! soon as it is assigned.
//!
//! Two drive modes:
//!
//! - [`TransitionMode::Timed`]: `blend` approaches 1 exponentially, one
//!   `lerp_speed` fraction of the remaining distance per reference frame.
//! - [`TransitionMode::ScrollLinked`]: `blend` *is* the scroll progress, so
//!   the user can scrub forward and back through the morph.

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::field::{field_force, field_value, ForceField};
use crate::integrator::Integrator;
use crate::pattern::{Color, PatternConfig, ResolvedAttractor};

/// Remaining distance below which a timed blend snaps to exactly 1.
const SNAP_EPSILON: f32 = 1e-4;

/// Chaos injected at the start of a transition, fading with the blend.
pub const TRANSITION_CHAOS: f32 = 0.0015;

/// Slowest accepted timed blend; anything lower would never arrive.
pub const MIN_LERP_SPEED: f32 = 0.001;

/// Frozen blends nested deeper than this collapse onto their dominant end.
const MAX_BLEND_DEPTH: usize = 3;

/// Cubic ease-in-out on `[0, 1]`. Exact at both ends.
#[inline]
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// How the blend factor advances.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TransitionMode {
    /// Exponential approach, `lerp_speed` of the remaining gap per frame.
    Timed { lerp_speed: f32 },
    /// Blend equals the scroll progress handed to [`TransitionController::tick`].
    ScrollLinked,
}

impl Default for TransitionMode {
    fn default() -> Self {
        TransitionMode::Timed { lerp_speed: 0.04 }
    }
}

impl TransitionMode {
    /// Copy with a timed `lerp_speed` in `[MIN_LERP_SPEED, 1]`. A
    /// non-finite speed falls back to the default.
    pub fn sanitized(self) -> Self {
        match self {
            TransitionMode::Timed { lerp_speed } if lerp_speed.is_finite() => TransitionMode::Timed {
                lerp_speed: lerp_speed.clamp(MIN_LERP_SPEED, 1.0),
            },
            TransitionMode::Timed { .. } => TransitionMode::default(),
            TransitionMode::ScrollLinked => TransitionMode::ScrollLinked,
        }
    }
}

/// Input driving one controller tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransitionInput {
    /// Elapsed wall time in seconds. Advances timed blends.
    Frame { dt: f32 },
    /// Progress through the current scroll segment, `[0, 1]`. Sets
    /// scroll-linked blends.
    Scroll { progress: f32 },
}

/// Field-shaping scalars of a pattern.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldScalars {
    pub n: f32,
    pub m: f32,
    pub force_strength: f32,
    pub damping: f32,
    pub jitter: f32,
    pub chaos: f32,
}

impl FieldScalars {
    /// Scalars of `config`. Shape attractors have no mode numbers of
    /// their own and inherit `fallback_modes`.
    fn of(config: &PatternConfig, fallback_modes: (f32, f32)) -> Self {
        let (n, m) = config.attractor.modes().unwrap_or(fallback_modes);
        Self {
            n,
            m,
            force_strength: config.force_strength,
            damping: config.damping,
            jitter: config.jitter,
            chaos: config.chaos,
        }
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            n: lerp(self.n, other.n, t),
            m: lerp(self.m, other.m, t),
            force_strength: lerp(self.force_strength, other.force_strength, t),
            damping: lerp(self.damping, other.damping, t),
            jitter: lerp(self.jitter, other.jitter, t),
            chaos: lerp(self.chaos, other.chaos, t),
        }
    }
}

/// The live force field: two attractors and how far along the blend is.
#[derive(Clone, Debug)]
pub struct FieldBlend {
    pub from: ResolvedAttractor,
    pub to: ResolvedAttractor,
    /// Blended mode numbers, used when both ends are Chladni fields.
    pub modes: Vec2,
    /// Eased blend factor.
    pub mix: f32,
}

impl FieldBlend {
    /// A field that is not transitioning.
    pub fn settled(attractor: ResolvedAttractor) -> Self {
        let modes = match &attractor {
            ResolvedAttractor::Chladni { n, m } => Vec2::new(*n, *m),
            ResolvedAttractor::Blend(blend) => blend.modes,
            ResolvedAttractor::Shape(_) => Vec2::new(2.0, 3.0),
        };
        Self {
            from: attractor.clone(),
            to: attractor,
            modes,
            mix: 1.0,
        }
    }

    fn both_chladni(&self) -> bool {
        self.from.is_chladni() && self.to.is_chladni()
    }

    fn endpoint_value(attractor: &ResolvedAttractor, p: Vec2) -> f32 {
        match attractor {
            ResolvedAttractor::Chladni { n, m } => field_value(p.x, p.y, *n, *m),
            ResolvedAttractor::Shape(shape) => shape.value(p),
            ResolvedAttractor::Blend(blend) => blend.value(p),
        }
    }

    fn endpoint_force(attractor: &ResolvedAttractor, p: Vec2, strength: f32) -> Vec2 {
        match attractor {
            ResolvedAttractor::Chladni { n, m } => field_force(p.x, p.y, *n, *m, strength),
            ResolvedAttractor::Shape(shape) => shape.force(p, strength),
            ResolvedAttractor::Blend(blend) => blend.force(p, strength),
        }
    }

    /// Field value at `p`.
    pub fn value(&self, p: Vec2) -> f32 {
        if self.both_chladni() {
            return field_value(p.x, p.y, self.modes.x, self.modes.y);
        }
        match self.mix {
            t if t <= 0.0 => Self::endpoint_value(&self.from, p),
            t if t >= 1.0 => Self::endpoint_value(&self.to, p),
            t => lerp(
                Self::endpoint_value(&self.from, p),
                Self::endpoint_value(&self.to, p),
                t,
            ),
        }
    }

    /// Force on a particle at `p`.
    ///
    /// Chladni-to-Chladni blends evaluate one field at the blended mode
    /// numbers. Blends involving a shape cross-fade the two endpoint forces.
    pub fn force(&self, p: Vec2, strength: f32) -> Vec2 {
        if self.both_chladni() {
            return field_force(p.x, p.y, self.modes.x, self.modes.y, strength);
        }
        match self.mix {
            t if t <= 0.0 => Self::endpoint_force(&self.from, p, strength),
            t if t >= 1.0 => Self::endpoint_force(&self.to, p, strength),
            t => Self::endpoint_force(&self.from, p, strength)
                .lerp(Self::endpoint_force(&self.to, p, strength), t),
        }
    }
}

/// Everything the integrator and renderer need for one frame.
#[derive(Clone, Debug)]
pub struct BlendedParams {
    pub field: FieldBlend,
    pub force_strength: f32,
    pub damping: f32,
    pub jitter: f32,
    pub chaos: f32,
    pub color: Color,
    pub opacity: f32,
    pub particle_size: f32,
}

impl BlendedParams {
    /// Parameters of a single, settled pattern.
    pub fn from_config(config: &PatternConfig) -> Self {
        Self {
            field: FieldBlend::settled(ResolvedAttractor::resolve(&config.attractor)),
            force_strength: config.force_strength,
            damping: config.damping,
            jitter: config.jitter,
            chaos: config.chaos,
            color: config.color,
            opacity: config.opacity,
            particle_size: config.particle_size,
        }
    }

    /// Current (blended) mode numbers.
    pub fn modes(&self) -> Vec2 {
        self.field.modes
    }
}

#[derive(Clone, Debug)]
struct Endpoint {
    id: String,
    attractor: ResolvedAttractor,
    scalars: FieldScalars,
}

#[derive(Clone, Copy, Debug)]
struct Cosmetics {
    color: Color,
    opacity: f32,
    particle_size: f32,
}

impl From<&PatternConfig> for Cosmetics {
    fn from(c: &PatternConfig) -> Self {
        Self {
            color: c.color,
            opacity: c.opacity,
            particle_size: c.particle_size,
        }
    }
}

/// Blends field parameters from the current pattern toward a target.
#[derive(Clone, Debug)]
pub struct TransitionController {
    mode: TransitionMode,
    current: Endpoint,
    target: Endpoint,
    blend: f32,
    cosmetics: Cosmetics,
    transition_chaos: f32,
}

impl TransitionController {
    /// Start settled on `config`. The mode is sanitized first.
    pub fn new(id: impl Into<String>, config: &PatternConfig, mode: TransitionMode) -> Self {
        let endpoint = Endpoint {
            id: id.into(),
            attractor: ResolvedAttractor::resolve(&config.attractor),
            scalars: FieldScalars::of(config, (2.0, 3.0)),
        };
        Self {
            mode: mode.sanitized(),
            current: endpoint.clone(),
            target: endpoint,
            blend: 1.0,
            cosmetics: Cosmetics::from(config),
            transition_chaos: TRANSITION_CHAOS,
        }
    }

    /// Override the chaos injected at the start of each transition.
    pub fn with_transition_chaos(mut self, chaos: f32) -> Self {
        self.transition_chaos = chaos.max(0.0);
        self
    }

    /// How the blend advances.
    pub fn mode(&self) -> TransitionMode {
        self.mode
    }

    /// Switch drive modes. Takes effect on the next tick; the blend is kept.
    pub fn set_mode(&mut self, mode: TransitionMode) {
        self.mode = mode.sanitized();
    }

    /// Raw blend factor in `[0, 1]`.
    pub fn blend(&self) -> f32 {
        self.blend
    }

    /// Eased blend factor.
    pub fn eased(&self) -> f32 {
        ease_in_out_cubic(self.blend)
    }

    /// Id of the pattern being blended toward.
    pub fn target_id(&self) -> &str {
        &self.target.id
    }

    /// Id of the pattern the blend started from.
    pub fn current_id(&self) -> &str {
        &self.current.id
    }

    /// Whether the blend has reached the target.
    pub fn is_settled(&self) -> bool {
        self.blend >= 1.0
    }

    /// Assign a new target pattern.
    ///
    /// Re-assigning the current target is a no-op. Otherwise the scalars
    /// blended so far become the new starting point, so a retarget in the
    /// middle of a transition continues from where the field is rather
    /// than jumping. Between two Chladni fields that is the blended mode
    /// pair; otherwise the half-finished cross-fade itself is frozen and
    /// becomes the starting field. Cosmetics snap immediately. Returns
    /// whether a new transition started.
    pub fn set_target(&mut self, id: &str, config: &PatternConfig) -> bool {
        if self.target.id == id {
            return false;
        }

        let eased = self.eased();
        let snapshot = self.current.scalars.lerp(&self.target.scalars, eased);
        let attractor = if self.current.attractor.is_chladni() && self.target.attractor.is_chladni() {
            ResolvedAttractor::Chladni {
                n: snapshot.n,
                m: snapshot.m,
            }
        } else if eased <= 0.0 {
            self.current.attractor.clone()
        } else if eased >= 1.0 {
            self.target.attractor.clone()
        } else {
            let frozen = ResolvedAttractor::Blend(Arc::new(FieldBlend {
                from: self.current.attractor.clone(),
                to: self.target.attractor.clone(),
                modes: Vec2::new(snapshot.n, snapshot.m),
                mix: eased,
            }));
            if frozen.depth() <= MAX_BLEND_DEPTH {
                frozen
            } else if eased < 0.5 {
                self.current.attractor.clone()
            } else {
                self.target.attractor.clone()
            }
        };

        let previous = std::mem::replace(
            &mut self.target,
            Endpoint {
                id: id.to_string(),
                attractor: ResolvedAttractor::resolve(&config.attractor),
                scalars: FieldScalars::of(config, (snapshot.n, snapshot.m)),
            },
        );
        self.current = Endpoint {
            id: previous.id,
            attractor,
            scalars: snapshot,
        };
        self.blend = 0.0;
        self.cosmetics = Cosmetics::from(config);

        tracing::debug!(from = %self.current.id, to = %self.target.id, "pattern transition started");
        true
    }

    /// Pin both ends of a scroll segment, for continuous activation.
    ///
    /// Unlike [`set_target`](Self::set_target) nothing is snapshotted: the
    /// scroll position fully determines the field, so scrubbing back across
    /// a stop lands on exactly that stop's pattern. Returns whether the pair
    /// changed.
    pub fn set_segment(&mut self, from: (&str, &PatternConfig), to: (&str, &PatternConfig)) -> bool {
        if self.current.id == from.0 && self.target.id == to.0 {
            return false;
        }
        let from_scalars = FieldScalars::of(from.1, (2.0, 3.0));
        self.current = Endpoint {
            id: from.0.to_string(),
            attractor: ResolvedAttractor::resolve(&from.1.attractor),
            scalars: from_scalars,
        };
        self.target = Endpoint {
            id: to.0.to_string(),
            attractor: ResolvedAttractor::resolve(&to.1.attractor),
            scalars: FieldScalars::of(to.1, (from_scalars.n, from_scalars.m)),
        };
        self.cosmetics = Cosmetics::from(to.1);
        tracing::debug!(from = %from.0, to = %to.0, "scroll segment entered");
        true
    }

    /// Advance the blend and return the parameters for this frame.
    pub fn tick(&mut self, input: TransitionInput) -> BlendedParams {
        match (self.mode, input) {
            (TransitionMode::Timed { lerp_speed }, TransitionInput::Frame { dt }) => {
                let frames = Integrator::frame_scale(dt);
                let speed = lerp_speed.clamp(0.0, 1.0);
                let step = 1.0 - (1.0 - speed).powf(frames);
                self.blend += (1.0 - self.blend) * step;
                if 1.0 - self.blend < SNAP_EPSILON {
                    self.blend = 1.0;
                }
            }
            (TransitionMode::ScrollLinked, TransitionInput::Scroll { progress }) => {
                if progress.is_finite() {
                    self.blend = progress.clamp(0.0, 1.0);
                }
            }
            _ => {}
        }
        self.params()
    }

    /// Parameters at the current blend without advancing it.
    pub fn params(&self) -> BlendedParams {
        let eased = self.eased();
        let s = self.current.scalars.lerp(&self.target.scalars, eased);
        let chaos = s.chaos + self.transition_chaos * (1.0 - eased);

        BlendedParams {
            field: FieldBlend {
                from: self.current.attractor.clone(),
                to: self.target.attractor.clone(),
                modes: Vec2::new(s.n, s.m),
                mix: eased,
            },
            force_strength: s.force_strength,
            damping: s.damping,
            jitter: s.jitter,
            chaos,
            color: self.cosmetics.color,
            opacity: self.cosmetics.opacity,
            particle_size: self.cosmetics.particle_size,
        }
    }
}
