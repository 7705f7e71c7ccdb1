//! Discrete section activation by visibility.

use tracing::debug;

use super::{notify, ActivationEvent, ChangeCallback, SectionSource, Viewport};

/// Vertical extent of one page section, in page pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct SectionExtent {
    /// Pattern id this section activates.
    pub id: String,
    pub top: f32,
    pub height: f32,
}

impl SectionExtent {
    pub fn new(id: impl Into<String>, top: f32, height: f32) -> Self {
        Self {
            id: id.into(),
            top,
            height,
        }
    }

    /// Fraction of this section that is on screen.
    ///
    /// Sections taller than the viewport are measured against the viewport
    /// height, so a section that fills the screen reports 1.0.
    pub fn visible_ratio(&self, viewport: &Viewport) -> f32 {
        if self.height <= 0.0 || viewport.height <= 0.0 {
            return 0.0;
        }
        let view_top = viewport.scroll_offset;
        let view_bottom = view_top + viewport.height;
        let overlap = (self.top + self.height).min(view_bottom) - self.top.max(view_top);
        (overlap.max(0.0) / self.height.min(viewport.height)).min(1.0)
    }
}

/// Activates whichever section is most visible, once it clears `threshold`.
///
/// Ties go to the section listed first. When no section clears the threshold
/// the previously active pattern stays active.
pub struct IntersectionSource {
    sections: Vec<SectionExtent>,
    threshold: f32,
    current: Option<String>,
    listeners: Vec<ChangeCallback>,
}

impl IntersectionSource {
    /// Default visibility needed before a section takes over.
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new(sections: Vec<SectionExtent>) -> Self {
        Self {
            sections,
            threshold: Self::DEFAULT_THRESHOLD,
            current: None,
            listeners: Vec::new(),
        }
    }

    /// Visibility a section needs before it activates, clamped to `0..=1`.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn sections(&self) -> &[SectionExtent] {
        &self.sections
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Feed visibility ratios measured by the host directly, bypassing
    /// the section geometry. Unknown ids are ignored.
    pub fn observe_ratios<'a, I>(&mut self, ratios: I) -> Option<ActivationEvent>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut best: Option<(&str, f32)> = None;
        for (id, ratio) in ratios {
            if !self.sections.iter().any(|s| s.id == id) {
                continue;
            }
            if ratio < self.threshold {
                continue;
            }
            if best.map_or(true, |(_, r)| ratio > r) {
                best = Some((id, ratio));
            }
        }
        let id = best.map(|(id, _)| id.to_string())?;
        self.activate(id)
    }

    fn activate(&mut self, id: String) -> Option<ActivationEvent> {
        if self.current.as_deref() == Some(id.as_str()) {
            return None;
        }
        debug!(from = ?self.current, to = %id, "section activated");
        self.current = Some(id.clone());
        let event = ActivationEvent::Section { id };
        notify(&mut self.listeners, &event);
        Some(event)
    }
}

impl SectionSource for IntersectionSource {
    fn current_pattern_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn on_change(&mut self, callback: ChangeCallback) {
        self.listeners.push(callback);
    }

    fn observe(&mut self, viewport: &Viewport) -> Option<ActivationEvent> {
        let ratios: Vec<(String, f32)> = self
            .sections
            .iter()
            .map(|s| (s.id.clone(), s.visible_ratio(viewport)))
            .collect();
        self.observe_ratios(ratios.iter().map(|(id, r)| (id.as_str(), *r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn page() -> IntersectionSource {
        IntersectionSource::new(vec![
            SectionExtent::new("hero", 0.0, 800.0),
            SectionExtent::new("features", 800.0, 800.0),
            SectionExtent::new("community", 1600.0, 800.0),
        ])
    }

    #[test]
    fn test_visible_ratio() {
        let s = SectionExtent::new("a", 800.0, 800.0);
        assert_eq!(s.visible_ratio(&Viewport::new(0.0, 800.0)), 0.0);
        assert_eq!(s.visible_ratio(&Viewport::new(400.0, 800.0)), 0.5);
        assert_eq!(s.visible_ratio(&Viewport::new(800.0, 800.0)), 1.0);
    }

    #[test]
    fn test_tall_section_counts_as_full() {
        let s = SectionExtent::new("tall", 0.0, 3000.0);
        assert_eq!(s.visible_ratio(&Viewport::new(1000.0, 800.0)), 1.0);
    }

    #[test]
    fn test_most_visible_section_wins() {
        let mut src = page();
        let event = src.observe(&Viewport::new(0.0, 800.0));
        assert_eq!(event, Some(ActivationEvent::Section { id: "hero".into() }));

        // 70% features, 30% hero
        let event = src.observe(&Viewport::new(560.0, 800.0));
        assert_eq!(event, Some(ActivationEvent::Section { id: "features".into() }));
        assert_eq!(src.current_pattern_id(), Some("features"));
    }

    #[test]
    fn test_unchanged_activation_emits_nothing() {
        let mut src = page();
        src.observe(&Viewport::new(0.0, 800.0));
        assert_eq!(src.observe(&Viewport::new(10.0, 800.0)), None);
    }

    #[test]
    fn test_last_pattern_retained_when_nothing_visible() {
        let mut src = page();
        src.observe(&Viewport::new(800.0, 800.0));
        assert_eq!(src.observe(&Viewport::new(10_000.0, 800.0)), None);
        assert_eq!(src.current_pattern_id(), Some("features"));
    }

    #[test]
    fn test_nothing_active_before_first_observation() {
        let src = page();
        assert_eq!(src.current_pattern_id(), None);
    }

    #[test]
    fn test_listeners_are_notified() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut src = page();
        src.on_change(Box::new(move |e| sink.borrow_mut().push(e.pattern_id().to_string())));
        src.observe(&Viewport::new(0.0, 800.0));
        src.observe(&Viewport::new(1600.0, 800.0));
        assert_eq!(*seen.borrow(), vec!["hero", "community"]);
    }

    #[test]
    fn test_host_ratios_respect_threshold() {
        let mut src = page().with_threshold(0.6);
        assert_eq!(src.observe_ratios([("hero", 0.55), ("features", 0.45)]), None);
        let event = src.observe_ratios([("hero", 0.2), ("features", 0.65), ("bogus", 0.9)]);
        assert_eq!(event, Some(ActivationEvent::Section { id: "features".into() }));
    }
}
