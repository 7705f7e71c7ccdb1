//! Simulation builder and instance lifecycle.
//!
//! [`Simulation`] collects configuration with method chaining. It either
//! opens a window and runs ([`Simulation::run`]) or builds a headless
//! [`SimulationInstance`] that the host drives frame by frame
//! ([`Simulation::build`]).
//!
//! A [`SimulationInstance`] owns everything one mounted simulation needs:
//! the particle store, integrator, transition controller, activation
//! source, render backend and frame clock. Nothing is global, so several
//! instances can run side by side.
//!
//! Host events never touch particle data directly. They are queued with
//! [`SimulationInstance::schedule`] and applied at the start of the next
//! [`frame`](SimulationInstance::frame), which then runs
//! source → transition → integrator → draw in that order.

use std::collections::VecDeque;
use std::sync::Arc;

use glam::Vec2;
use image::RgbaImage;
use tracing::{debug, info, warn};
use winit::window::Window;

use crate::activation::{ActivationEvent, SectionSource, Viewport};
use crate::config::SceneConfig;
use crate::error::{RenderError, SimulationError};
use crate::integrator::{BoundaryPolicy, Integrator, Pointer, StepStats};
use crate::particle::ParticleStore;
use crate::pattern::{PatternConfig, PatternRegistry};
use crate::render::{select_backend, BackendKind, BackendPreference, RenderBackend, RenderSurface};
use crate::time::{DeviceClass, FrameClock};
use crate::transition::{BlendedParams, TransitionController, TransitionInput, TransitionMode};

/// Id used when a simulation is built without any patterns.
const FALLBACK_PATTERN: &str = "default";

/// A host event, applied at the start of the next frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Signal {
    /// Scroll by a delta in logical page pixels.
    ScrollBy(f32),
    /// Scroll to an absolute offset in logical page pixels.
    ScrollTo(f32),
    /// Surface resized, physical pixels.
    Resize { width: u32, height: u32 },
    /// Device pixel ratio changed.
    ScaleFactor(f64),
    /// Pointer moved (normalized space) or left the surface.
    Pointer(Option<Vec2>),
    /// Activate a pattern directly, bypassing the activation source.
    Target(String),
    /// Re-randomize all particle positions.
    Scatter,
    /// Surface shown or hidden.
    Visibility(bool),
}

/// A particle field simulation builder.
///
/// # Example
///
/// ```no_run
/// use nodal::prelude::*;
///
/// Simulation::new()
///     .with_particle_count(30_000)
///     .with_registry(PatternRegistry::landing_page())
///     .with_boundary(BoundaryPolicy::Wrap)
///     .run()
///     .unwrap();
/// ```
pub struct Simulation {
    pub(crate) particle_count: usize,
    pub(crate) registry: PatternRegistry,
    pub(crate) boundary: BoundaryPolicy,
    pub(crate) transition_mode: TransitionMode,
    pub(crate) source: Option<Box<dyn SectionSource>>,
    pub(crate) device_class: DeviceClass,
    pub(crate) backend: BackendPreference,
    pub(crate) seed: Option<u64>,
    pub(crate) page_height: Option<f32>,
    pub(crate) surface_size: (f64, f64),
    pub(crate) fixed_delta: Option<f32>,
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            particle_count: 20_000,
            registry: PatternRegistry::landing_page(),
            boundary: BoundaryPolicy::default(),
            transition_mode: TransitionMode::default(),
            source: None,
            device_class: DeviceClass::default(),
            backend: BackendPreference::default(),
            seed: None,
            page_height: None,
            surface_size: (1280.0, 720.0),
            fixed_delta: None,
        }
    }

    /// Set the number of particles. Capped by the device class budget.
    pub fn with_particle_count(mut self, count: usize) -> Self {
        self.particle_count = count;
        self
    }

    /// Set the patterns. The first entry is the initial pattern.
    pub fn with_registry(mut self, registry: PatternRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Out-of-bounds handling for the integrator.
    pub fn with_boundary(mut self, policy: BoundaryPolicy) -> Self {
        self.boundary = policy;
        self
    }

    /// How the active parameters move toward a new target.
    pub fn with_transition_mode(mut self, mode: TransitionMode) -> Self {
        self.transition_mode = mode;
        self
    }

    /// Attach an activation source that picks patterns from scroll state.
    pub fn with_source(mut self, source: impl SectionSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Device class used to cap the particle count.
    pub fn with_device_class(mut self, class: DeviceClass) -> Self {
        self.device_class = class;
        self
    }

    pub fn with_backend(mut self, preference: BackendPreference) -> Self {
        self.backend = preference;
        self
    }

    /// Seed the particle RNG for reproducible layouts.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Initial surface size in logical pixels.
    pub fn with_surface_size(mut self, width: f64, height: f64) -> Self {
        self.surface_size = (width, height);
        self
    }

    /// Step every frame by a fixed delta instead of wall time.
    pub fn with_fixed_delta(mut self, dt: f32) -> Self {
        self.fixed_delta = Some(dt);
        self
    }

    /// Take everything from a scene file.
    pub fn with_scene(mut self, scene: &SceneConfig) -> Self {
        self.particle_count = scene.particle_count;
        self.registry = scene.to_registry();
        self.boundary = scene.boundary;
        self.transition_mode = scene.transition;
        self.source = Some(scene.build_source());
        self.device_class = scene.device_class;
        self.backend = scene.backend;
        self.seed = scene.seed;
        self.page_height = Some(scene.page_height());
        self
    }

    /// Build a headless instance rendering into an offscreen canvas.
    pub fn build(self) -> SimulationInstance {
        SimulationInstance::create(self, None)
    }

    /// Open a window and run until it is closed.
    pub fn run(self) -> Result<(), SimulationError> {
        crate::window::run(self)
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

/// One mounted simulation.
pub struct SimulationInstance {
    registry: PatternRegistry,
    store: ParticleStore,
    integrator: Integrator,
    transition: TransitionController,
    source: Option<Box<dyn SectionSource>>,
    backend: Option<Box<dyn RenderBackend>>,
    surface: RenderSurface,
    clock: FrameClock,
    pending: VecDeque<Signal>,
    viewport: Viewport,
    viewport_dirty: bool,
    page_height: Option<f32>,
    scroll_progress: f32,
    params: BlendedParams,
    last_step: StepStats,
    visible: bool,
    disposed: bool,
}

impl SimulationInstance {
    /// Mount a simulation. With a window the backend presents into it;
    /// without one the canvas backend renders offscreen.
    pub fn create(simulation: Simulation, window: Option<Arc<Window>>) -> Self {
        let Simulation {
            particle_count,
            mut registry,
            boundary,
            transition_mode,
            source,
            device_class,
            backend,
            seed,
            page_height,
            surface_size,
            fixed_delta,
        } = simulation;

        let budget = device_class.budget();
        let count = particle_count.clamp(1, budget.max_particles);
        if count != particle_count {
            warn!(
                requested = particle_count,
                using = count,
                "particle count adjusted to the {:?} budget",
                device_class
            );
        }

        if registry.is_empty() {
            warn!("no patterns registered, using the default pattern");
            registry.insert(FALLBACK_PATTERN, PatternConfig::default());
        }
        let (initial_id, initial) = registry
            .first()
            .map(|(id, cfg)| (id.to_string(), cfg.clone()))
            .unwrap_or_else(|| (FALLBACK_PATTERN.to_string(), PatternConfig::default()));

        let surface = match &window {
            Some(w) => {
                let size = w.inner_size();
                RenderSurface::new(size.width, size.height, w.scale_factor())
            }
            None => RenderSurface::from_logical(surface_size.0, surface_size.1, 1.0),
        };
        let backend = select_backend(window, &surface, backend, count);

        let mut clock = FrameClock::new().with_max_fps(budget.max_fps);
        clock.set_fixed_delta(fixed_delta);

        let transition = TransitionController::new(initial_id.as_str(), &initial, transition_mode);
        let params = transition.params();
        let viewport = Viewport::new(0.0, surface.logical_size().1 as f32);

        info!(
            particles = count,
            pattern = %initial_id,
            backend = ?backend.kind(),
            "simulation created"
        );

        Self {
            registry,
            store: ParticleStore::new(count, seed.unwrap_or_else(rand::random)),
            integrator: Integrator::new(boundary),
            transition,
            source,
            backend: Some(backend),
            surface,
            clock,
            pending: VecDeque::new(),
            viewport,
            viewport_dirty: true,
            page_height,
            scroll_progress: 1.0,
            params,
            last_step: StepStats::default(),
            visible: true,
            disposed: false,
        }
    }

    /// Queue a host event for the next frame. Ignored after dispose.
    pub fn schedule(&mut self, signal: Signal) {
        if !self.disposed {
            self.pending.push_back(signal);
        }
    }

    /// Scatter particles at the start of the next frame.
    pub fn scatter(&mut self) {
        self.schedule(Signal::Scatter);
    }

    /// Run one frame with the clock's own delta.
    pub fn tick(&mut self) -> bool {
        let dt = self.clock.tick();
        self.frame(dt)
    }

    /// Run one frame of `dt` seconds. Returns whether anything was drawn.
    ///
    /// Never fails: render errors are logged and the frame is skipped.
    pub fn frame(&mut self, dt: f32) -> bool {
        if self.disposed {
            return false;
        }
        self.apply_pending();
        if !self.visible {
            return false;
        }

        self.poll_source();

        let input = match self.transition.mode() {
            TransitionMode::Timed { .. } => TransitionInput::Frame { dt },
            TransitionMode::ScrollLinked => TransitionInput::Scroll {
                progress: self.scroll_progress,
            },
        };
        self.params = self.transition.tick(input);

        self.last_step = self.integrator.step(&mut self.store, &self.params, dt);

        self.draw()
    }

    fn apply_pending(&mut self) {
        while let Some(signal) = self.pending.pop_front() {
            match signal {
                Signal::ScrollBy(delta) => self.scroll_to(self.viewport.scroll_offset + delta),
                Signal::ScrollTo(offset) => self.scroll_to(offset),
                Signal::Resize { width, height } => {
                    self.surface.resize(width, height);
                    if let Some(backend) = self.backend.as_mut() {
                        backend.resize(&self.surface);
                    }
                    self.viewport.height = self.surface.logical_size().1 as f32;
                    self.viewport_dirty = true;
                    debug!(width, height, "surface resized");
                }
                Signal::ScaleFactor(scale) => {
                    self.surface.set_scale_factor(scale);
                    if let Some(backend) = self.backend.as_mut() {
                        backend.resize(&self.surface);
                    }
                    self.viewport.height = self.surface.logical_size().1 as f32;
                    self.viewport_dirty = true;
                }
                Signal::Pointer(position) => {
                    self.integrator.set_pointer(position.map(Pointer::new));
                }
                Signal::Target(id) => self.activate(&id),
                Signal::Scatter => {
                    self.store.scatter();
                    debug!("particles scattered");
                }
                Signal::Visibility(visible) => {
                    self.visible = visible;
                    if visible {
                        self.clock.resume();
                    } else {
                        self.clock.pause();
                    }
                    debug!(visible, "visibility changed");
                }
            }
        }
    }

    fn scroll_to(&mut self, offset: f32) {
        let max = self
            .page_height
            .map(|h| (h - self.viewport.height).max(0.0))
            .unwrap_or(f32::INFINITY);
        let offset = if offset.is_finite() { offset.clamp(0.0, max) } else { 0.0 };
        if offset != self.viewport.scroll_offset {
            self.viewport.scroll_offset = offset;
            self.viewport_dirty = true;
        }
    }

    fn poll_source(&mut self) {
        if !self.viewport_dirty {
            return;
        }
        self.viewport_dirty = false;
        let Some(source) = self.source.as_mut() else {
            return;
        };
        if let Some(event) = source.observe(&self.viewport) {
            self.handle_activation(event);
        }
    }

    fn handle_activation(&mut self, event: ActivationEvent) {
        match event {
            ActivationEvent::Section { id } => self.activate(&id),
            ActivationEvent::Progress { from, to, t } => match self.transition.mode() {
                TransitionMode::ScrollLinked => {
                    let (Some(a), Some(b)) = (self.registry.get(&from), self.registry.get(&to)) else {
                        warn!(%from, %to, "scroll stops reference unknown patterns");
                        return;
                    };
                    if self.transition.set_segment((from.as_str(), a), (to.as_str(), b)) {
                        info!(%from, %to, "pattern segment");
                    }
                    self.scroll_progress = t;
                }
                TransitionMode::Timed { .. } => {
                    let id = if t < 0.5 { from } else { to };
                    self.activate(&id);
                }
            },
        }
    }

    /// Start a transition toward `id`, if it is known.
    fn activate(&mut self, id: &str) {
        let Some(config) = self.registry.get(id) else {
            warn!(pattern = %id, "unknown pattern, keeping the current one");
            return;
        };
        if self.transition.set_target(id, config) {
            info!(pattern = %id, "pattern activated");
        }
        // Discrete activations have no scroll progress; land on the target.
        self.scroll_progress = 1.0;
    }

    fn draw(&mut self) -> bool {
        if self.surface.is_empty() {
            return false;
        }
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };
        match backend.draw(&self.store, &self.params) {
            Ok(()) => true,
            Err(RenderError::SurfaceLost) => {
                debug!("surface lost, reconfigured; skipping frame");
                false
            }
            Err(e) => {
                warn!("draw failed: {}", e);
                false
            }
        }
    }

    /// Release the backend and stop accepting signals. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(mut backend) = self.backend.take() {
            backend.dispose();
        }
        self.source = None;
        self.pending.clear();
        self.disposed = true;
        info!("simulation disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn particles(&self) -> &ParticleStore {
        &self.store
    }

    /// Parameters used by the last frame.
    pub fn params(&self) -> &BlendedParams {
        &self.params
    }

    pub fn transition(&self) -> &TransitionController {
        &self.transition
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    /// Counters from the most recent integration step.
    pub fn last_step(&self) -> StepStats {
        self.last_step
    }

    /// Active backend, `None` once disposed.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|b| b.kind())
    }

    /// Read back the last drawn frame.
    pub fn snapshot(&self) -> Result<RgbaImage, RenderError> {
        self.backend
            .as_ref()
            .ok_or(RenderError::NotInitialized)?
            .snapshot()
    }
}

impl Drop for SimulationInstance {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{IntersectionSource, ScrollProgressSource, SectionExtent};

    fn headless() -> SimulationInstance {
        Simulation::new()
            .with_particle_count(500)
            .with_seed(1)
            .with_backend(BackendPreference::Cpu)
            .with_surface_size(64.0, 48.0)
            .build()
    }

    #[test]
    fn test_build_uses_first_pattern() {
        let sim = headless();
        assert_eq!(sim.transition().target_id(), "hero");
        assert_eq!(sim.particles().len(), 500);
        assert_eq!(sim.backend_kind(), Some(BackendKind::Canvas));
    }

    #[test]
    fn test_particle_count_respects_budget() {
        let sim = Simulation::new()
            .with_particle_count(1_000_000)
            .with_device_class(DeviceClass::Constrained)
            .with_surface_size(8.0, 8.0)
            .build();
        assert_eq!(sim.particles().len(), DeviceClass::Constrained.budget().max_particles);
    }

    #[test]
    fn test_empty_registry_falls_back() {
        let sim = Simulation::new()
            .with_registry(PatternRegistry::new())
            .with_particle_count(10)
            .with_surface_size(8.0, 8.0)
            .build();
        assert_eq!(sim.transition().target_id(), FALLBACK_PATTERN);
    }

    #[test]
    fn test_signals_wait_for_next_frame() {
        let mut sim = headless();
        let before: Vec<Vec2> = sim.particles().positions().collect();
        sim.scatter();
        sim.schedule(Signal::Target("features".into()));
        // Nothing applied yet.
        assert_eq!(sim.particles().positions().collect::<Vec<_>>(), before);
        assert_eq!(sim.transition().target_id(), "hero");

        sim.frame(1.0 / 60.0);
        assert_ne!(sim.particles().positions().collect::<Vec<_>>(), before);
        assert_eq!(sim.transition().target_id(), "features");
    }

    #[test]
    fn test_unknown_target_keeps_current() {
        let mut sim = headless();
        sim.schedule(Signal::Target("nope".into()));
        sim.frame(1.0 / 60.0);
        assert_eq!(sim.transition().target_id(), "hero");
    }

    #[test]
    fn test_frame_draws_into_canvas() {
        let mut sim = headless();
        assert!(sim.frame(1.0 / 60.0));
        let shot = sim.snapshot().unwrap();
        assert_eq!(shot.dimensions(), (64, 48));
    }

    #[test]
    fn test_hidden_instance_does_not_step() {
        let mut sim = headless();
        sim.schedule(Signal::Visibility(false));
        let before: Vec<Vec2> = sim.particles().positions().collect();
        assert!(!sim.frame(1.0 / 60.0));
        assert_eq!(sim.particles().positions().collect::<Vec<_>>(), before);
        assert!(sim.clock().is_paused());

        sim.schedule(Signal::Visibility(true));
        assert!(sim.frame(1.0 / 60.0));
    }

    #[test]
    fn test_resize_signal_updates_surface() {
        let mut sim = headless();
        sim.schedule(Signal::Resize { width: 160, height: 90 });
        sim.frame(1.0 / 60.0);
        assert_eq!(sim.surface().physical_size(), (160, 90));
        assert_eq!(sim.snapshot().unwrap().dimensions(), (160, 90));
        assert_eq!(sim.viewport().height, 90.0);
    }

    #[test]
    fn test_scroll_drives_intersection_source() {
        let source = IntersectionSource::new(vec![
            SectionExtent::new("hero", 0.0, 48.0),
            SectionExtent::new("features", 48.0, 48.0),
        ]);
        let mut sim = Simulation::new()
            .with_particle_count(100)
            .with_surface_size(64.0, 48.0)
            .with_source(source)
            .build();
        sim.frame(1.0 / 60.0);
        assert_eq!(sim.transition().target_id(), "hero");

        sim.schedule(Signal::ScrollBy(48.0));
        sim.frame(1.0 / 60.0);
        assert_eq!(sim.transition().target_id(), "features");
    }

    #[test]
    fn test_timed_mode_follows_nearer_scroll_stop() {
        let registry = PatternRegistry::new()
            .with("a", PatternConfig::chladni(2.0, 3.0))
            .with("b", PatternConfig::chladni(4.0, 7.0));
        // 60px viewport over a 180px region: 120px of pinned scrolling.
        let mut sim = Simulation::new()
            .with_registry(registry)
            .with_particle_count(100)
            .with_surface_size(64.0, 60.0)
            .with_transition_mode(TransitionMode::Timed { lerp_speed: 0.05 })
            .with_source(ScrollProgressSource::new(0.0, 180.0, ["a", "b"]))
            .build();

        sim.schedule(Signal::ScrollTo(30.0));
        sim.frame(1.0 / 60.0);
        assert_eq!(sim.transition().target_id(), "a");

        sim.schedule(Signal::ScrollTo(90.0));
        sim.frame(1.0 / 60.0);
        assert_eq!(sim.transition().target_id(), "b");
        assert!(!sim.transition().is_settled());

        sim.schedule(Signal::ScrollTo(20.0));
        sim.frame(1.0 / 60.0);
        assert_eq!(sim.transition().target_id(), "a");
    }

    #[test]
    fn test_scroll_is_clamped_to_page() {
        let scene = SceneConfig::default();
        let mut sim = Simulation::new()
            .with_scene(&scene)
            .with_particle_count(100)
            .with_surface_size(64.0, 900.0)
            .build();
        sim.schedule(Signal::ScrollTo(1.0e9));
        sim.frame(1.0 / 60.0);
        assert_eq!(sim.viewport().scroll_offset, scene.page_height() - 900.0);
        sim.schedule(Signal::ScrollBy(-1.0e9));
        sim.frame(1.0 / 60.0);
        assert_eq!(sim.viewport().scroll_offset, 0.0);
    }

    #[test]
    fn test_dispose_is_final() {
        let mut sim = headless();
        sim.dispose();
        assert!(sim.is_disposed());
        assert_eq!(sim.backend_kind(), None);
        sim.schedule(Signal::Scatter);
        assert!(!sim.frame(1.0 / 60.0));
        assert!(sim.snapshot().is_err());
        sim.dispose();
    }
}
