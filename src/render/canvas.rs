//! CPU canvas backend.

use std::num::NonZeroU32;
use std::sync::Arc;

use glam::Vec2;
use image::RgbaImage;
use tracing::{debug, warn};
use winit::window::Window;

use super::{BackendKind, RenderBackend, RenderSurface, BACKGROUND};
use crate::error::RenderError;
use crate::particle::ParticleStore;
use crate::transition::BlendedParams;

type Presenter = softbuffer::Surface<Arc<Window>, Arc<Window>>;

/// Immediate-mode disc renderer into a `0x00RRGGBB` framebuffer.
///
/// With a window attached the framebuffer is presented through softbuffer;
/// without one it stays offscreen and can be read back via
/// [`RenderBackend::snapshot`].
pub struct CanvasBackend {
    surface: Option<RenderSurface>,
    pixels: Vec<u32>,
    presenter: Option<Presenter>,
}

impl CanvasBackend {
    /// Offscreen canvas.
    pub fn new() -> Self {
        Self {
            surface: None,
            pixels: Vec::new(),
            presenter: None,
        }
    }

    /// Canvas presenting into `window`.
    pub fn with_window(window: Arc<Window>) -> Result<Self, RenderError> {
        let context = softbuffer::Context::new(window.clone())?;
        let presenter = softbuffer::Surface::new(&context, window)?;
        Ok(Self {
            presenter: Some(presenter),
            ..Self::new()
        })
    }

    /// False when rendering offscreen.
    pub fn is_presentable(&self) -> bool {
        self.presenter.is_some()
    }

    /// Raw framebuffer, row-major, `0x00RRGGBB`.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    fn allocate(&mut self) -> Result<(), RenderError> {
        let Some(surface) = self.surface else {
            return Ok(());
        };
        self.pixels = vec![0; surface.width as usize * surface.height as usize];
        if let (Some(presenter), Some(w), Some(h)) = (
            self.presenter.as_mut(),
            NonZeroU32::new(surface.width),
            NonZeroU32::new(surface.height),
        ) {
            presenter.resize(w, h)?;
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.pixels.fill(pack(BACKGROUND));
    }

    /// Alpha-blend an antialiased disc centred at `center` (physical px).
    fn fill_disc(&mut self, width: usize, height: usize, center: Vec2, radius: f32, color: [f32; 3], alpha: f32) {
        let reach = radius + 1.0;
        if center.x + reach < 0.0
            || center.y + reach < 0.0
            || center.x - reach > width as f32
            || center.y - reach > height as f32
        {
            return;
        }
        let x0 = (center.x - reach).floor().max(0.0) as usize;
        let y0 = (center.y - reach).floor().max(0.0) as usize;
        let x1 = ((center.x + reach).ceil() as usize).min(width);
        let y1 = ((center.y + reach).ceil() as usize).min(height);

        for y in y0..y1 {
            let row = y * width;
            for x in x0..x1 {
                let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5).distance(center);
                let coverage = (radius + 0.5 - d).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let px = &mut self.pixels[row + x];
                *px = blend_over(*px, color, alpha * coverage);
            }
        }
    }
}

impl Default for CanvasBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for CanvasBackend {
    fn init(&mut self, surface: &RenderSurface) -> Result<(), RenderError> {
        self.surface = Some(*surface);
        self.allocate()?;
        self.clear();
        Ok(())
    }

    fn draw(&mut self, particles: &ParticleStore, params: &BlendedParams) -> Result<(), RenderError> {
        let surface = self.surface.ok_or(RenderError::NotInitialized)?;
        if surface.is_empty() {
            return Ok(());
        }
        self.clear();

        let (width, height) = (surface.width as usize, surface.height as usize);
        let color = [params.color.r, params.color.g, params.color.b];
        let alpha = params.opacity.clamp(0.0, 1.0);
        let base = surface.point_radius(params.particle_size);
        for p in particles.particles() {
            let center = surface.to_screen(p.position);
            self.fill_disc(width, height, center, base * p.size, color, alpha);
        }

        if let Some(presenter) = self.presenter.as_mut() {
            let mut buffer = presenter.buffer_mut()?;
            if !copy_frame(&mut buffer, &self.pixels) {
                // Out of date after a failed resize: resize now, present next frame.
                drop(buffer);
                if let (Some(w), Some(h)) = (NonZeroU32::new(surface.width), NonZeroU32::new(surface.height)) {
                    presenter.resize(w, h)?;
                }
                return Err(RenderError::SurfaceLost);
            }
            buffer.present()?;
        }
        Ok(())
    }

    fn resize(&mut self, surface: &RenderSurface) {
        let Some(current) = self.surface.as_mut() else {
            return;
        };
        let resized = current.physical_size() != surface.physical_size();
        *current = *surface;
        if !resized {
            return;
        }
        debug!(width = surface.width, height = surface.height, "canvas resized");
        if let Err(e) = self.allocate() {
            warn!("canvas resize failed: {}", e);
        }
        self.clear();
    }

    fn dispose(&mut self) {
        self.surface = None;
        self.pixels = Vec::new();
        self.presenter = None;
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Canvas
    }

    fn snapshot(&self) -> Result<RgbaImage, RenderError> {
        let surface = self.surface.ok_or(RenderError::NotInitialized)?;
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for &px in &self.pixels {
            bytes.extend_from_slice(&[(px >> 16) as u8, (px >> 8) as u8, px as u8, 0xff]);
        }
        RgbaImage::from_raw(surface.width, surface.height, bytes)
            .ok_or_else(|| RenderError::Backend("framebuffer size mismatch".to_string()))
    }
}

/// Copy `pixels` into a presenter buffer of the same size. Returns false,
/// leaving `buffer` untouched, when the sizes differ.
fn copy_frame(buffer: &mut [u32], pixels: &[u32]) -> bool {
    if buffer.len() != pixels.len() {
        return false;
    }
    buffer.copy_from_slice(pixels);
    true
}

fn pack(rgb: [f32; 3]) -> u32 {
    let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
    (q(rgb[0]) << 16) | (q(rgb[1]) << 8) | q(rgb[2])
}

fn unpack(px: u32) -> [f32; 3] {
    [
        ((px >> 16) & 0xff) as f32 / 255.0,
        ((px >> 8) & 0xff) as f32 / 255.0,
        (px & 0xff) as f32 / 255.0,
    ]
}

/// Source-over compositing onto an opaque destination.
fn blend_over(dst: u32, src: [f32; 3], alpha: f32) -> u32 {
    let d = unpack(dst);
    pack([
        src[0] * alpha + d[0] * (1.0 - alpha),
        src[1] * alpha + d[1] * (1.0 - alpha),
        src[2] * alpha + d[2] * (1.0 - alpha),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Color, PatternConfig};

    fn params(opacity: f32) -> BlendedParams {
        BlendedParams::from_config(
            &PatternConfig::default()
                .with_color(Color::hex(0xff0000))
                .with_opacity(opacity)
                .with_particle_size(3.0),
        )
    }

    fn single_particle_at(p: Vec2) -> ParticleStore {
        let mut store = ParticleStore::new(1, 0);
        store.particles_mut()[0].position = p;
        store.particles_mut()[0].size = 1.0;
        store
    }

    #[test]
    fn test_draw_before_init_fails() {
        let mut canvas = CanvasBackend::new();
        let store = ParticleStore::new(1, 0);
        assert!(matches!(canvas.draw(&store, &params(1.0)), Err(RenderError::NotInitialized)));
    }

    #[test]
    fn test_disc_lands_at_projected_position() {
        let surface = RenderSurface::new(200, 100, 1.0);
        let mut canvas = CanvasBackend::new();
        canvas.init(&surface).unwrap();

        let p = Vec2::new(0.5, -0.5);
        canvas.draw(&single_particle_at(p), &params(1.0)).unwrap();

        let center = surface.to_screen(p);
        let idx = center.y as usize * 200 + center.x as usize;
        assert_eq!(canvas.pixels()[idx], 0xff0000);
        // Far corner stays background.
        assert_eq!(canvas.pixels()[0], pack(BACKGROUND));
    }

    #[test]
    fn test_opacity_blends_with_background() {
        let surface = RenderSurface::new(32, 32, 1.0);
        let mut canvas = CanvasBackend::new();
        canvas.init(&surface).unwrap();
        canvas.draw(&single_particle_at(Vec2::ZERO), &params(0.5)).unwrap();
        let px = canvas.pixels()[16 * 32 + 16];
        let red = (px >> 16) & 0xff;
        assert!(red > 100 && red < 160, "red channel {}", red);
    }

    #[test]
    fn test_offscreen_particle_is_skipped() {
        let surface = RenderSurface::new(32, 32, 1.0);
        let mut canvas = CanvasBackend::new();
        canvas.init(&surface).unwrap();
        canvas.draw(&single_particle_at(Vec2::new(50.0, 50.0)), &params(1.0)).unwrap();
        assert!(canvas.pixels().iter().all(|&px| px == pack(BACKGROUND)));
    }

    #[test]
    fn test_resize_reallocates_framebuffer() {
        let mut canvas = CanvasBackend::new();
        canvas.init(&RenderSurface::new(800, 600, 1.0)).unwrap();
        canvas.resize(&RenderSurface::new(1600, 900, 1.0));
        assert_eq!(canvas.pixels().len(), 1600 * 900);
        let shot = canvas.snapshot().unwrap();
        assert_eq!(shot.dimensions(), (1600, 900));
    }

    #[test]
    fn test_scale_change_grows_discs_without_reallocating() {
        let lit = |canvas: &CanvasBackend| canvas.pixels().iter().filter(|&&px| px != pack(BACKGROUND)).count();
        let store = single_particle_at(Vec2::ZERO);

        let mut canvas = CanvasBackend::new();
        canvas.init(&RenderSurface::new(64, 64, 1.0)).unwrap();
        canvas.draw(&store, &params(1.0)).unwrap();
        let small = lit(&canvas);

        canvas.resize(&RenderSurface::new(64, 64, 2.0));
        assert_eq!(canvas.pixels().len(), 64 * 64);
        canvas.draw(&store, &params(1.0)).unwrap();
        assert!(lit(&canvas) > 3 * small, "{} vs {}", lit(&canvas), small);
    }

    #[test]
    fn test_mismatched_presenter_buffer_is_left_alone() {
        let pixels = vec![0x00ff00; 16];
        let mut stale = vec![7u32; 9];
        assert!(!copy_frame(&mut stale, &pixels));
        assert!(stale.iter().all(|&px| px == 7));

        let mut fresh = vec![0u32; 16];
        assert!(copy_frame(&mut fresh, &pixels));
        assert_eq!(fresh, pixels);
    }

    #[test]
    fn test_dispose_releases_framebuffer() {
        let mut canvas = CanvasBackend::new();
        canvas.init(&RenderSurface::new(16, 16, 1.0)).unwrap();
        canvas.dispose();
        assert!(canvas.pixels().is_empty());
        assert!(canvas.snapshot().is_err());
        let store = ParticleStore::new(1, 0);
        assert!(canvas.draw(&store, &params(1.0)).is_err());
    }
}
