//! Continuous activation driven by scroll position.

use tracing::debug;

use super::capture::{CaptureMeasurement, CaptureState, ScrollCapture};
use super::{notify, ActivationEvent, ChangeCallback, SectionSource, Viewport};

/// Maps a scroll region onto an ordered list of pattern stops.
///
/// The region is captured (see [`ScrollCapture`]) while it fills the
/// viewport; progress through it is split evenly between consecutive stops.
/// With stops `[a, b, c]`, the first half of the region reports
/// `Progress { from: a, to: b, t }` and the second half
/// `Progress { from: b, to: c, t }`.
pub struct ScrollProgressSource {
    region_top: f32,
    region_height: f32,
    stops: Vec<String>,
    capture: ScrollCapture,
    state: CaptureState,
    last: Option<(usize, f32)>,
    current: Option<String>,
    listeners: Vec<ChangeCallback>,
}

impl ScrollProgressSource {
    /// Split the region at `region_top..region_top + region_height` evenly
    /// between `stops`, in order.
    pub fn new<S: Into<String>>(
        region_top: f32,
        region_height: f32,
        stops: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            region_top,
            region_height,
            stops: stops.into_iter().map(Into::into).collect(),
            capture: ScrollCapture::default(),
            state: CaptureState::Idle,
            last: None,
            current: None,
            listeners: Vec::new(),
        }
    }

    pub fn with_capture(mut self, capture: ScrollCapture) -> Self {
        self.capture = capture;
        self
    }

    pub fn stops(&self) -> &[String] {
        &self.stops
    }

    /// Where the region currently is in the capture cycle.
    pub fn capture_state(&self) -> CaptureState {
        self.state
    }

    /// Overall progress through the region, `0..=1`.
    pub fn progress(&self) -> f32 {
        self.state.progress()
    }

    /// Segment index and local `t` for an overall progress value.
    fn locate(&self, progress: f32) -> (usize, f32) {
        let segments = self.stops.len() - 1;
        let scaled = progress.clamp(0.0, 1.0) * segments as f32;
        let index = (scaled.floor() as usize).min(segments - 1);
        (index, scaled - index as f32)
    }

    fn emit(&mut self, event: ActivationEvent) -> ActivationEvent {
        let id = event.pattern_id().to_string();
        if self.current.as_deref() != Some(id.as_str()) {
            debug!(to = %id, "scroll stop activated");
        }
        self.current = Some(id);
        notify(&mut self.listeners, &event);
        event
    }
}

impl SectionSource for ScrollProgressSource {
    fn current_pattern_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn on_change(&mut self, callback: ChangeCallback) {
        self.listeners.push(callback);
    }

    fn observe(&mut self, viewport: &Viewport) -> Option<ActivationEvent> {
        let measurement = CaptureMeasurement {
            section_top: self.region_top - viewport.scroll_offset,
            section_height: self.region_height,
            viewport_height: viewport.height,
        };
        self.state = self.capture.next(self.state, measurement);

        match self.stops.len() {
            0 => None,
            1 => {
                if self.current.is_some() {
                    return None;
                }
                let id = self.stops[0].clone();
                Some(self.emit(ActivationEvent::Section { id }))
            }
            _ => {
                let located = self.locate(self.state.progress());
                if self.last == Some(located) {
                    return None;
                }
                self.last = Some(located);
                let (index, t) = located;
                let event = ActivationEvent::Progress {
                    from: self.stops[index].clone(),
                    to: self.stops[index + 1].clone(),
                    t,
                };
                Some(self.emit(event))
            }
        }
    }
}
