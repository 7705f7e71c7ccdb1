//! Frame timing and device budgets.
//!
//! [`FrameClock`] is the single source of truth for frame time inside a
//! simulation instance: delta time, frame count, measured FPS, pausing
//! (used while the window is hidden) and an optional frame-rate clamp.
//!
//! # Example
//!
//! ```
//! use nodal::time::{DeviceClass, FrameClock};
//!
//! let budget = DeviceClass::Constrained.budget();
//! let mut clock = FrameClock::new().with_max_fps(budget.max_fps);
//!
//! // In the frame loop:
//! if clock.should_render(std::time::Instant::now()) {
//!     let dt = clock.tick();
//!     # let _ = dt;
//! }
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Frame timing for one simulation instance.
#[derive(Debug)]
pub struct FrameClock {
    /// When the last frame was ticked.
    last_frame: Instant,
    /// Time since last frame in seconds.
    delta_secs: f32,
    /// Total frames ticked.
    frame_count: u64,
    /// Measured FPS, refreshed every `fps_update_interval`.
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    paused: bool,
    /// Fixed delta for deterministic stepping (headless runs, tests).
    fixed_delta: Option<f32>,
    /// Minimum time between rendered frames.
    min_interval: Option<Duration>,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
            min_interval: None,
        }
    }

    /// Clamp rendering to at most `fps` frames per second. Zero disables
    /// the clamp.
    pub fn with_max_fps(mut self, fps: u32) -> Self {
        self.set_max_fps(fps);
        self
    }

    pub fn set_max_fps(&mut self, fps: u32) {
        self.min_interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
    }

    /// Advance one frame and return the delta in seconds.
    ///
    /// Returns 0 while paused.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();

        if self.paused {
            self.delta_secs = 0.0;
            return 0.0;
        }

        let raw_delta = now.duration_since(self.last_frame).as_secs_f32();
        self.delta_secs = self.fixed_delta.unwrap_or(raw_delta);
        self.last_frame = now;
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        self.delta_secs
    }

    /// Whether enough time has passed since the last frame to draw again.
    pub fn should_render(&self, now: Instant) -> bool {
        if self.paused {
            return false;
        }
        match self.min_interval {
            Some(interval) => now.duration_since(self.last_frame) >= interval,
            None => true,
        }
    }

    /// Earliest instant the next frame may be drawn.
    pub fn next_frame_at(&self) -> Instant {
        self.last_frame + self.min_interval.unwrap_or(Duration::ZERO)
    }

    #[inline]
    /// Delta returned by the last `tick()`.
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Total frames ticked.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    /// Frames per second, refreshed twice a second.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stop time. `tick()` returns 0 and `should_render` is false.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume after pausing. The pause does not show up as one huge delta.
    pub fn resume(&mut self) {
        if self.paused {
            self.last_frame = Instant::now();
            self.paused = false;
        }
    }

    /// Set a fixed delta time. Pass `None` to use real frame timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Broad hardware class, chosen once at start-up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    #[default]
    Desktop,
    /// Phones, tablets, integrated GPUs on battery.
    Constrained,
}

/// Workload caps for a device class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationBudget {
    pub max_particles: usize,
    pub max_fps: u32,
}

impl DeviceClass {
    /// Constrained devices get a smaller ensemble and a lower frame rate
    /// rather than the same workload at reduced fidelity.
    pub fn budget(self) -> SimulationBudget {
        match self {
            DeviceClass::Desktop => SimulationBudget {
                max_particles: 100_000,
                max_fps: 60,
            },
            DeviceClass::Constrained => SimulationBudget {
                max_particles: 15_000,
                max_fps: 30,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert!(!clock.is_paused());
        assert_eq!(clock.delta(), 0.0);
    }

    #[test]
    fn test_clock_tick() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(10));
        let delta = clock.tick();

        assert!(delta > 0.0);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_clock_pause() {
        let mut clock = FrameClock::new();
        clock.tick();

        clock.pause();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.tick(), 0.0);
        assert_eq!(clock.frame(), 1);
        assert!(!clock.should_render(Instant::now()));
    }

    #[test]
    fn test_resume_does_not_spike_delta() {
        let mut clock = FrameClock::new();
        clock.pause();
        thread::sleep(Duration::from_millis(50));
        clock.resume();
        let delta = clock.tick();
        assert!(delta < 0.04);
    }

    #[test]
    fn test_fixed_delta() {
        let mut clock = FrameClock::new();
        clock.set_fixed_delta(Some(1.0 / 60.0));

        thread::sleep(Duration::from_millis(100));
        clock.tick();

        let expected = 1.0 / 60.0;
        assert!((clock.delta() - expected).abs() < 0.0001);
    }

    #[test]
    fn test_frame_rate_clamp() {
        let clock = FrameClock::new().with_max_fps(30);
        let start = clock.next_frame_at() - Duration::from_secs_f64(1.0 / 30.0);
        assert!(!clock.should_render(start + Duration::from_millis(10)));
        assert!(clock.should_render(start + Duration::from_millis(34)));
    }

    #[test]
    fn test_unclamped_clock_always_renders() {
        let clock = FrameClock::new().with_max_fps(0);
        assert!(clock.should_render(Instant::now()));
    }

    #[test]
    fn test_constrained_budget_is_smaller() {
        let desktop = DeviceClass::Desktop.budget();
        let mobile = DeviceClass::Constrained.budget();
        assert!(mobile.max_particles < desktop.max_particles);
        assert_eq!(mobile.max_fps, 30);
        assert_eq!(desktop.max_fps, 60);
    }
}
