//! # nodal
//!
//! Particle fields that settle onto Chladni nodal patterns and morph between
//! them as a page scrolls.
//!
//! Tens of thousands of particles are pushed toward the zero set ("nodal
//! lines") of a standing-wave field
//!
//! ```text
//! f(x, y) = cos(nπx)·cos(mπy) − cos(mπx)·cos(nπy)
//! ```
//!
//! or onto the outline of a shape. Each page section names a pattern; when
//! the active section changes the *field* blends toward the new pattern, so
//! particles flow into the new figure instead of jumping.
//!
//! ## Quick Start
//!
//! ```no_run
//! use nodal::prelude::*;
//!
//! fn main() {
//!     let patterns = PatternRegistry::new()
//!         .with("intro", PatternConfig::chladni(1.0, 2.0))
//!         .with("detail", PatternConfig::chladni(3.0, 5.0).with_color(Color::hex(0xffd27a)))
//!         .with("outro", PatternConfig::shape(Shape::Circle { radius: 0.6, segments: 128 }));
//!
//!     Simulation::new()
//!         .with_particle_count(30_000)
//!         .with_registry(patterns)
//!         .with_boundary(BoundaryPolicy::Wrap)
//!         .run()
//!         .unwrap();
//! }
//! ```
//!
//! ## Pipeline
//!
//! Every frame runs, strictly in order:
//!
//! 1. **Activation** ([`activation`]): viewport state → "target pattern changed".
//! 2. **Transition** ([`transition`]): blend field parameters toward the target.
//! 3. **Integration** ([`integrator`]): force, jitter, chaos, damping, boundary.
//! 4. **Rendering** ([`render`]): CPU canvas or GPU point cloud.
//!
//! Host events (scroll, resize, pointer, visibility) are queued as
//! [`Signal`]s and applied at the start of the next frame.
//!
//! ## Coordinates
//!
//! All simulation state lives in normalized space `[-1, 1] × [-1, 1]`, y up.
//! [`RenderSurface`] maps it onto the largest centred square of the screen.
//!
//! ## Headless use
//!
//! ```
//! use nodal::prelude::*;
//!
//! let mut sim = Simulation::new()
//!     .with_particle_count(1_000)
//!     .with_seed(7)
//!     .with_backend(BackendPreference::Cpu)
//!     .with_surface_size(320.0, 240.0)
//!     .build();
//!
//! for _ in 0..10 {
//!     sim.frame(1.0 / 60.0);
//! }
//! let image = sim.snapshot().unwrap();
//! assert_eq!(image.dimensions(), (320, 240));
//! ```

pub mod activation;
pub mod config;
pub mod error;
pub mod field;
pub mod integrator;
pub mod particle;
pub mod pattern;
pub mod render;
pub mod shape;
pub mod simulation;
pub mod spatial;
pub mod time;
pub mod transition;
mod window;

pub use activation::{ActivationEvent, IntersectionSource, ScrollProgressSource, SectionSource, Viewport};
pub use config::SceneConfig;
pub use error::{ConfigError, RenderError, SimulationError};
pub use field::{field_force, field_value, ChladniField, ForceField, ShapeField};
pub use glam::Vec2;
pub use integrator::{BoundaryPolicy, Integrator};
pub use particle::{Particle, ParticleStore};
pub use pattern::{Attractor, Color, PatternConfig, PatternRegistry};
pub use render::{BackendKind, BackendPreference, RenderBackend, RenderSurface};
pub use shape::Shape;
pub use simulation::{Signal, Simulation, SimulationInstance};
pub use transition::{BlendedParams, TransitionController, TransitionMode};

/// Convenient re-exports for common usage.
///
/// ```
/// use nodal::prelude::*;
/// ```
pub mod prelude {
    pub use crate::activation::{
        ActivationEvent, IntersectionSource, ScrollProgressSource, SectionExtent, SectionSource, Viewport,
    };
    pub use crate::config::SceneConfig;
    pub use crate::integrator::BoundaryPolicy;
    pub use crate::pattern::{Attractor, Color, PatternConfig, PatternRegistry};
    pub use crate::render::{BackendKind, BackendPreference, RenderSurface};
    pub use crate::shape::Shape;
    pub use crate::simulation::{Signal, Simulation, SimulationInstance};
    pub use crate::time::DeviceClass;
    pub use crate::transition::TransitionMode;
    pub use crate::Vec2;
}
