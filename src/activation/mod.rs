//! Section activation: turning viewport state into "target pattern changed".
//!
//! The host page (or the windowed runner) reports viewport measurements;
//! a [`SectionSource`] decides which pattern should be active and notifies
//! listeners when that changes. Two sources ship with the crate:
//!
//! - [`IntersectionSource`]: discrete. The most visible section above a
//!   threshold wins, like an intersection observer.
//! - [`ScrollProgressSource`]: continuous. A tall scroll region is mapped
//!   onto a sequence of pattern stops and reports progress between the two
//!   stops around the current offset.
//!
//! Neither source falls back to a default when nothing is active: the last
//! known pattern is retained.

mod capture;
mod intersection;
mod progress;

pub use capture::{CaptureMeasurement, CaptureState, ScrollCapture};
pub use intersection::{IntersectionSource, SectionExtent};
pub use progress::ScrollProgressSource;

/// Viewport measurement in page pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Distance from the top of the page to the top of the viewport.
    pub scroll_offset: f32,
    /// Visible height.
    pub height: f32,
}

impl Viewport {
    pub fn new(scroll_offset: f32, height: f32) -> Self {
        Self {
            scroll_offset,
            height,
        }
    }
}

/// What a source reports when the active pattern changes.
#[derive(Clone, Debug, PartialEq)]
pub enum ActivationEvent {
    /// A single section became active.
    Section { id: String },
    /// The offset lies between two pattern stops.
    Progress { from: String, to: String, t: f32 },
}

impl ActivationEvent {
    /// The pattern this event points at: the section, or the nearer stop.
    pub fn pattern_id(&self) -> &str {
        match self {
            ActivationEvent::Section { id } => id,
            ActivationEvent::Progress { from, to, t } => {
                if *t < 0.5 {
                    from
                } else {
                    to
                }
            }
        }
    }
}

/// Listener invoked whenever a source's active pattern changes.
pub type ChangeCallback = Box<dyn FnMut(&ActivationEvent)>;

/// Capability interface for anything that selects the active pattern.
pub trait SectionSource {
    /// The active pattern, or `None` before anything was ever active.
    fn current_pattern_id(&self) -> Option<&str>;

    /// Register a listener for changes.
    fn on_change(&mut self, callback: ChangeCallback);

    /// Feed a viewport measurement. Returns an event if the activation
    /// changed, after notifying listeners.
    fn observe(&mut self, viewport: &Viewport) -> Option<ActivationEvent>;
}

/// Fan an event out to every listener.
pub(crate) fn notify(listeners: &mut [ChangeCallback], event: &ActivationEvent) {
    for listener in listeners.iter_mut() {
        listener(event);
    }
}
