//! Windowed runner.
//!
//! Translates winit events into [`Signal`]s and paces frames. Events only
//! ever schedule work; the instance applies it inside its next frame.
//! Frame pacing follows the instance clock: `WaitUntil` the next allowed
//! frame while visible, plain `Wait` while occluded so nothing redraws.

use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use tracing::{error, info};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::error::SimulationError;
use crate::simulation::{Signal, Simulation, SimulationInstance};

/// Logical pixels scrolled per wheel line.
const LINE_HEIGHT: f32 = 48.0;

pub(crate) fn run(simulation: Simulation) -> Result<(), SimulationError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(simulation);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct App {
    pending: Option<Simulation>,
    window: Option<Arc<Window>>,
    instance: Option<SimulationInstance>,
    visible: bool,
    error: Option<SimulationError>,
}

impl App {
    fn new(simulation: Simulation) -> Self {
        Self {
            pending: Some(simulation),
            window: None,
            instance: None,
            visible: true,
            error: None,
        }
    }

    fn schedule(&mut self, signal: Signal) {
        if let Some(instance) = self.instance.as_mut() {
            instance.schedule(signal);
        }
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(instance) = self.instance.as_mut() {
            instance.dispose();
        }
        event_loop.exit();
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        let page = self
            .instance
            .as_ref()
            .map(|i| i.viewport().height)
            .unwrap_or(0.0);
        match event.logical_key {
            Key::Named(NamedKey::Escape) => self.shutdown(event_loop),
            Key::Named(NamedKey::Space) => self.schedule(Signal::Scatter),
            Key::Named(NamedKey::PageDown) => self.schedule(Signal::ScrollBy(page)),
            Key::Named(NamedKey::PageUp) => self.schedule(Signal::ScrollBy(-page)),
            Key::Named(NamedKey::ArrowDown) => self.schedule(Signal::ScrollBy(LINE_HEIGHT)),
            Key::Named(NamedKey::ArrowUp) => self.schedule(Signal::ScrollBy(-LINE_HEIGHT)),
            Key::Named(NamedKey::Home) => self.schedule(Signal::ScrollTo(0.0)),
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(simulation) = self.pending.take() else {
            return;
        };

        let (width, height) = simulation.surface_size;
        let window_attrs = Window::default_attributes()
            .with_title("nodal")
            .with_inner_size(winit::dpi::LogicalSize::new(width, height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("failed to create window: {}", e);
                self.error = Some(e.into());
                event_loop.exit();
                return;
            }
        };

        self.instance = Some(SimulationInstance::create(simulation, Some(window.clone())));
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => self.shutdown(event_loop),
            WindowEvent::Resized(size) => {
                self.schedule(Signal::Resize {
                    width: size.width,
                    height: size.height,
                });
                self.request_redraw();
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.schedule(Signal::ScaleFactor(scale_factor));
            }
            WindowEvent::Occluded(occluded) => {
                self.visible = !occluded;
                self.schedule(Signal::Visibility(!occluded));
                // One more frame applies the signal (and resumes the clock).
                self.request_redraw();
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(instance) = self.instance.as_mut() {
                    let p = instance
                        .surface()
                        .to_normalized(Vec2::new(position.x as f32, position.y as f32));
                    instance.schedule(Signal::Pointer(Some(p)));
                }
            }
            WindowEvent::CursorLeft { .. } => self.schedule(Signal::Pointer(None)),
            WindowEvent::MouseWheel { delta, .. } => {
                let scale = self
                    .window
                    .as_ref()
                    .map(|w| w.scale_factor() as f32)
                    .unwrap_or(1.0);
                let dy = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * LINE_HEIGHT,
                    MouseScrollDelta::PixelDelta(pos) => -(pos.y as f32) / scale,
                };
                self.schedule(Signal::ScrollBy(dy));
            }
            WindowEvent::KeyboardInput { event, .. } => self.on_key(event_loop, event),
            WindowEvent::RedrawRequested => {
                let Some(instance) = self.instance.as_mut() else {
                    return;
                };
                if instance.is_disposed() {
                    return;
                }
                if instance.is_visible() && !instance.clock().should_render(Instant::now()) {
                    return;
                }
                instance.tick();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(instance) = self.instance.as_ref() else {
            return;
        };
        if instance.is_disposed() || !self.visible {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        let next = instance.clock().next_frame_at();
        if Instant::now() >= next {
            self.request_redraw();
        } else {
            event_loop.set_control_flow(ControlFlow::WaitUntil(next));
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut instance) = self.instance.take() {
            instance.dispose();
        }
        // Drop the window after the backend that presents into it.
        self.window = None;
        info!("event loop exited");
    }
}
