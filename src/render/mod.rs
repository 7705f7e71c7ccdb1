//! Render backends.
//!
//! A [`RenderBackend`] draws the particle store once per frame. Exactly one
//! backend is chosen when the simulation starts ([`select_backend`]) and it
//! is never swapped mid-frame:
//!
//! - [`CanvasBackend`]: CPU rasterisation of alpha-blended discs, presented
//!   through `softbuffer`. Always available; fine up to ~25k particles.
//! - [`PointCloudBackend`] (feature `gpu`): instanced quads through `wgpu`
//!   with additive blending.
//!
//! Both share [`RenderSurface`], which owns the device-pixel-ratio scaling
//! and the aspect-correct projection from normalized space to the screen.

mod canvas;
#[cfg(feature = "gpu")]
mod gpu;

use std::sync::Arc;

use glam::{Mat4, Vec2};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use winit::window::Window;

use crate::error::RenderError;
use crate::particle::ParticleStore;
use crate::transition::BlendedParams;

pub use canvas::CanvasBackend;
#[cfg(feature = "gpu")]
pub use gpu::PointCloudBackend;

/// Above this many particles `Auto` asks for the GPU backend.
pub const CPU_PARTICLE_LIMIT: usize = 25_000;

/// Background the backends clear to.
pub const BACKGROUND: [f32; 3] = [0.02, 0.02, 0.05];

/// Drawing surface geometry.
///
/// `width`/`height` are physical pixels; `scale_factor` is the device pixel
/// ratio. Particle sizes are given in logical pixels and multiplied by the
/// scale factor, so both the backing store and the point size follow DPR.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSurface {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32, scale_factor: f64) -> Self {
        Self {
            width,
            height,
            scale_factor: sanitize_scale(scale_factor),
        }
    }

    /// Surface for a logical size at the given pixel ratio.
    pub fn from_logical(width: f64, height: f64, scale_factor: f64) -> Self {
        let scale = sanitize_scale(scale_factor);
        Self::new(
            (width * scale).round() as u32,
            (height * scale).round() as u32,
            scale,
        )
    }

    pub fn physical_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

/// Size in logical pixels.
    pub fn logical_size(&self) -> (f64, f64) {
        (
            self.width as f64 / self.scale_factor,
            self.height as f64 / self.scale_factor,
        )
    }

    /// Zero-sized surfaces (minimised windows) are not drawn to.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = sanitize_scale(scale_factor);
    }

    /// Half-extents of the visible region in normalized units. The shorter
    /// side always spans `[-1, 1]`.
    pub fn extents(&self) -> Vec2 {
        let w = self.width.max(1) as f32;
        let h = self.height.max(1) as f32;
        if w >= h {
            Vec2::new(w / h, 1.0)
        } else {
            Vec2::new(1.0, h / w)
        }
    }

    /// Orthographic projection from normalized space to clip space.
    ///
    /// The unit square lands on the largest centred square of the surface,
    /// so particles never stretch when the aspect ratio changes.
    pub fn projection(&self) -> Mat4 {
        let e = self.extents();
        Mat4::orthographic_rh(-e.x, e.x, -e.y, e.y, -1.0, 1.0)
    }

    /// Normalized position to physical pixel coordinates (y down).
    pub fn to_screen(&self, p: Vec2) -> Vec2 {
        let half = self.width.min(self.height) as f32 * 0.5;
        Vec2::new(
            self.width as f32 * 0.5 + p.x * half,
            self.height as f32 * 0.5 - p.y * half,
        )
    }

    /// Physical pixel coordinates back to normalized space.
    pub fn to_normalized(&self, screen: Vec2) -> Vec2 {
        let half = (self.width.min(self.height) as f32 * 0.5).max(0.5);
        Vec2::new(
            (screen.x - self.width as f32 * 0.5) / half,
            (self.height as f32 * 0.5 - screen.y) / half,
        )
    }

    /// Disc radius in physical pixels for a logical particle size.
    pub fn point_radius(&self, logical_size: f32) -> f32 {
        logical_size * self.scale_factor as f32
    }
}

fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// Which backend is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Canvas,
    PointCloud,
}

/// Requested backend. `Auto` decides from the particle count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    #[default]
    Auto,
    Cpu,
    Gpu,
}

/// Draws particles onto a surface.
pub trait RenderBackend {
    /// Acquire device resources for `surface`.
    fn init(&mut self, surface: &RenderSurface) -> Result<(), RenderError>;

    /// Draw one frame.
    fn draw(&mut self, particles: &ParticleStore, params: &BlendedParams) -> Result<(), RenderError>;

    /// Surface geometry changed: physical size, device pixel ratio or both.
    fn resize(&mut self, surface: &RenderSurface);

    /// Release device resources. Further draws fail with `NotInitialized`.
    fn dispose(&mut self);

    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Read back the last drawn frame, where the backend supports it.
    fn snapshot(&self) -> Result<RgbaImage, RenderError> {
        Err(RenderError::Backend(format!("{:?} backend cannot read back frames", self.kind())))
    }
}

/// Pick and initialise a backend.
///
/// GPU initialisation failures fall back to the canvas backend with a
/// warning; this never fails. Without a window the canvas renders
/// offscreen.
pub fn select_backend(
    window: Option<Arc<Window>>,
    surface: &RenderSurface,
    preference: BackendPreference,
    particle_count: usize,
) -> Box<dyn RenderBackend> {
    let want_gpu = match preference {
        BackendPreference::Cpu => false,
        BackendPreference::Gpu => true,
        BackendPreference::Auto => particle_count > CPU_PARTICLE_LIMIT,
    };

    #[cfg(feature = "gpu")]
    if want_gpu {
        if let Some(window) = window.clone() {
            let mut backend = PointCloudBackend::new(window);
            match backend.init(surface) {
                Ok(()) => {
                    info!(particles = particle_count, "render backend: point cloud (wgpu)");
                    return Box::new(backend);
                }
                Err(e) => warn!("GPU backend unavailable, falling back to canvas: {}", e),
            }
        }
    }
    #[cfg(not(feature = "gpu"))]
    if want_gpu {
        warn!("built without the `gpu` feature, using canvas backend");
    }

    let mut backend = match window {
        Some(window) => CanvasBackend::with_window(window).unwrap_or_else(|e| {
            warn!("no presentable canvas, rendering offscreen: {}", e);
            CanvasBackend::new()
        }),
        None => CanvasBackend::new(),
    };
    if let Err(e) = backend.init(surface) {
        warn!("canvas init failed: {}", e);
    }
    info!(particles = particle_count, "render backend: canvas (cpu)");
    Box::new(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ndc_to_screen(surface: &RenderSurface, p: Vec2) -> Vec2 {
        let clip = surface.projection() * p.extend(0.0).extend(1.0);
        Vec2::new(
            (clip.x + 1.0) * 0.5 * surface.width as f32,
            (1.0 - clip.y) * 0.5 * surface.height as f32,
        )
    }

    #[test]
    fn test_projection_matches_to_screen() {
        for surface in [
            RenderSurface::new(800, 600, 1.0),
            RenderSurface::new(600, 800, 1.0),
            RenderSurface::new(1600, 900, 2.0),
        ] {
            for p in [Vec2::ZERO, Vec2::new(1.0, 1.0), Vec2::new(-0.5, 0.25)] {
                let a = ndc_to_screen(&surface, p);
                let b = surface.to_screen(p);
                assert!((a - b).length() < 1e-2, "{:?}: {} vs {}", surface, a, b);
            }
        }
    }

    #[test]
    fn test_unit_square_is_not_stretched() {
        let surface = RenderSurface::new(1600, 900, 1.0);
        let center = surface.to_screen(Vec2::ZERO);
        let right = surface.to_screen(Vec2::X) - center;
        let up = center - surface.to_screen(Vec2::Y);
        assert_eq!(right.x, up.y);
        assert_eq!(right.x, 450.0);
    }

    #[test]
    fn test_resize_round_trip_is_consistent() {
        let mut surface = RenderSurface::new(800, 600, 1.0);
        let p = Vec2::new(0.3, -0.7);
        let before = surface.to_screen(p);
        let relative_before = (before - surface.to_screen(Vec2::ZERO)) / 300.0;

        surface.resize(1600, 900);
        let wide = surface.to_screen(p);
        let relative_wide = (wide - surface.to_screen(Vec2::ZERO)) / 450.0;
        assert!((relative_before - relative_wide).length() < 1e-6);

        surface.resize(800, 600);
        assert_eq!(surface.to_screen(p), before);
    }

    #[test]
    fn test_dpr_scales_backing_store_and_points() {
        let surface = RenderSurface::from_logical(800.0, 600.0, 2.0);
        assert_eq!(surface.physical_size(), (1600, 1200));
        assert_eq!(surface.logical_size(), (800.0, 600.0));
        assert_eq!(surface.point_radius(1.5), 3.0);
        // Same normalized point lands at the same logical location.
        let lo = RenderSurface::from_logical(800.0, 600.0, 1.0);
        let p = Vec2::new(0.5, 0.5);
        assert_eq!(surface.to_screen(p) / 2.0, lo.to_screen(p));
    }

    #[test]
    fn test_to_normalized_inverts_to_screen() {
        let surface = RenderSurface::new(1280, 720, 1.0);
        let p = Vec2::new(-0.4, 0.9);
        let back = surface.to_normalized(surface.to_screen(p));
        assert!((back - p).length() < 1e-5);
    }

    #[test]
    fn test_bad_scale_factor_defaults_to_one() {
        assert_eq!(RenderSurface::new(10, 10, f64::NAN).scale_factor, 1.0);
        assert_eq!(RenderSurface::new(10, 10, 0.0).scale_factor, 1.0);
    }

    #[test]
    fn test_headless_selection_falls_back_to_canvas() {
        let surface = RenderSurface::new(64, 64, 1.0);
        let backend = select_backend(None, &surface, BackendPreference::Gpu, 100_000);
        assert_eq!(backend.kind(), BackendKind::Canvas);
    }
}
