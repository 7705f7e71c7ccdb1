//! Error types for nodal.
//!
//! Errors only surface while constructing things: loading a scene file,
//! opening a window, acquiring a GPU. Once a simulation is running every
//! failure is recovered locally and logged.

use std::fmt;

/// Errors that can occur during GPU initialization.
#[cfg(feature = "gpu")]
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The surface reports no usable texture format.
    NoSurfaceFormat,
}

#[cfg(feature = "gpu")]
impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found"),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::NoSurfaceFormat => write!(f, "Surface has no supported texture format"),
        }
    }
}

#[cfg(feature = "gpu")]
impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "gpu")]
impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

#[cfg(feature = "gpu")]
impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors raised by a render backend.
#[derive(Debug)]
pub enum RenderError {
    /// `draw` was called before `init` or after `dispose`.
    NotInitialized,
    /// The swapchain surface was lost or went stale; reconfigure and retry.
    SurfaceLost,
    /// The GPU ran out of memory.
    OutOfMemory,
    /// Presenting a CPU framebuffer failed.
    Present(softbuffer::SoftBufferError),
    /// GPU backend could not be brought up.
    #[cfg(feature = "gpu")]
    Gpu(GpuError),
    /// Any other backend failure.
    Backend(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => write!(f, "Render backend used before init or after dispose"),
            RenderError::SurfaceLost => write!(f, "Render surface lost"),
            RenderError::OutOfMemory => write!(f, "GPU out of memory"),
            RenderError::Present(e) => write!(f, "Failed to present frame: {}", e),
            #[cfg(feature = "gpu")]
            RenderError::Gpu(e) => write!(f, "GPU initialization failed: {}", e),
            RenderError::Backend(msg) => write!(f, "Render backend error: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Present(e) => Some(e),
            #[cfg(feature = "gpu")]
            RenderError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<softbuffer::SoftBufferError> for RenderError {
    fn from(e: softbuffer::SoftBufferError) -> Self {
        RenderError::Present(e)
    }
}

#[cfg(feature = "gpu")]
impl From<GpuError> for RenderError {
    fn from(e: GpuError) -> Self {
        RenderError::Gpu(e)
    }
}

#[cfg(feature = "gpu")]
impl From<wgpu::SurfaceError> for RenderError {
    fn from(e: wgpu::SurfaceError) -> Self {
        match e {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => RenderError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
            other => RenderError::Backend(other.to_string()),
        }
    }
}

/// Errors that can occur while loading a scene configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the file from disk.
    Io(std::io::Error),
    /// The file is not valid scene JSON.
    Json(serde_json::Error),
    /// The scene defines no sections.
    NoSections,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read scene file: {}", e),
            ConfigError::Json(e) => write!(f, "Invalid scene JSON: {}", e),
            ConfigError::NoSections => write!(f, "Scene must define at least one section"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::NoSections => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// Errors that can occur when running a simulation.
#[derive(Debug)]
pub enum SimulationError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// Scene configuration could not be loaded.
    Config(ConfigError),
    /// Rendering failed outside the frame loop (e.g. snapshot export).
    Render(RenderError),
    /// Writing a snapshot image failed.
    Image(image::ImageError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            SimulationError::Window(e) => write!(f, "Failed to create window: {}", e),
            SimulationError::Config(e) => write!(f, "Configuration error: {}", e),
            SimulationError::Render(e) => write!(f, "Render error: {}", e),
            SimulationError::Image(e) => write!(f, "Failed to write snapshot: {}", e),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::EventLoop(e) => Some(e),
            SimulationError::Window(e) => Some(e),
            SimulationError::Config(e) => Some(e),
            SimulationError::Render(e) => Some(e),
            SimulationError::Image(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for SimulationError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SimulationError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for SimulationError {
    fn from(e: winit::error::OsError) -> Self {
        SimulationError::Window(e)
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        SimulationError::Config(e)
    }
}

impl From<RenderError> for SimulationError {
    fn from(e: RenderError) -> Self {
        SimulationError::Render(e)
    }
}

impl From<image::ImageError> for SimulationError {
    fn from(e: image::ImageError) -> Self {
        SimulationError::Image(e)
    }
}
