//! Scroll capture: pinning a tall region while its story plays out.
//!
//! The region moves through five phases as the page scrolls past it:
//!
//! ```text
//! Idle ──▶ Approaching ──▶ Captured ──▶ Releasing ──▶ Settled
//!   ◀──────────     ◀──────────     ◀──────────     ◀──────
//! ```
//!
//! [`ScrollCapture::next`] is a pure function of the previous state and the
//! latest measurement, so the machine runs equally well forwards and
//! backwards and can be tested without a page.

/// Geometry of the captured region relative to the viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureMeasurement {
    /// Region top minus viewport top. Negative once scrolled past.
    pub section_top: f32,
    pub section_height: f32,
    pub viewport_height: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum CaptureState {
    /// Region is well below the viewport.
    #[default]
    Idle,
    /// Region is about to reach the top of the viewport.
    Approaching,
    /// Region is pinned; `progress` runs 0 → 1 across it.
    Captured { progress: f32 },
    /// Region end has scrolled into the viewport.
    Releasing,
    /// Region is entirely above the viewport.
    Settled,
}

impl CaptureState {
    /// Story progress implied by this state.
    pub fn progress(&self) -> f32 {
        match self {
            CaptureState::Idle | CaptureState::Approaching => 0.0,
            CaptureState::Captured { progress } => *progress,
            CaptureState::Releasing | CaptureState::Settled => 1.0,
        }
    }

    pub fn is_captured(&self) -> bool {
        matches!(self, CaptureState::Captured { .. })
    }
}

/// Capture thresholds, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollCapture {
    /// How far below the viewport the region counts as approaching.
    pub approach_margin: f32,
    /// Slack before a captured region lets go at either end.
    pub hysteresis: f32,
}

impl Default for ScrollCapture {
    fn default() -> Self {
        Self {
            approach_margin: 200.0,
            hysteresis: 8.0,
        }
    }
}

impl ScrollCapture {
    /// Advance the capture state machine by one scroll measurement.
    ///
    /// Once captured, a region is only released after it scrolls `hysteresis`
    /// pixels past either edge.
    pub fn next(&self, state: CaptureState, m: CaptureMeasurement) -> CaptureState {
        let top = m.section_top;
        let bottom = top + m.section_height;
        let vh = m.viewport_height;
        let captured = state.is_captured();

        if bottom <= 0.0 {
            return CaptureState::Settled;
        }
        if top >= vh + self.approach_margin {
            return CaptureState::Idle;
        }
        if top > 0.0 {
            if captured && top <= self.hysteresis {
                return CaptureState::Captured { progress: 0.0 };
            }
            return CaptureState::Approaching;
        }
        if bottom < vh {
            if captured && bottom >= vh - self.hysteresis {
                return CaptureState::Captured { progress: 1.0 };
            }
            return CaptureState::Releasing;
        }
        CaptureState::Captured {
            progress: pinned_progress(top, m.section_height, vh),
        }
    }
}

fn pinned_progress(top: f32, height: f32, viewport_height: f32) -> f32 {
    let span = height - viewport_height;
    if span <= 0.0 {
        return if top < 0.0 { 1.0 } else { 0.0 };
    }
    (-top / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(top: f32) -> CaptureMeasurement {
        CaptureMeasurement {
            section_top: top,
            section_height: 3000.0,
            viewport_height: 1000.0,
        }
    }

    #[test]
    fn test_forward_scroll_visits_every_phase() {
        let fsm = ScrollCapture::default();
        let mut state = CaptureState::Idle;
        let mut phases = Vec::new();
        for top in [2000.0, 1100.0, 500.0, -1000.0, -2500.0, -3500.0] {
            state = fsm.next(state, at(top));
            phases.push(std::mem::discriminant(&state));
        }
        let expected = [
            CaptureState::Idle,
            CaptureState::Approaching,
            CaptureState::Approaching,
            CaptureState::Captured { progress: 0.5 },
            CaptureState::Releasing,
            CaptureState::Settled,
        ]
        .map(|s| std::mem::discriminant(&s));
        assert_eq!(phases, expected);
    }

    #[test]
    fn test_progress_is_linear_while_pinned() {
        let fsm = ScrollCapture::default();
        assert_eq!(fsm.next(CaptureState::Approaching, at(0.0)).progress(), 0.0);
        assert_eq!(fsm.next(CaptureState::Approaching, at(-500.0)).progress(), 0.25);
        assert_eq!(fsm.next(CaptureState::Approaching, at(-2000.0)).progress(), 1.0);
    }

    #[test]
    fn test_backward_scroll_reverses() {
        let fsm = ScrollCapture::default();
        let mut state = CaptureState::Settled;
        state = fsm.next(state, at(-2500.0));
        assert_eq!(state, CaptureState::Releasing);
        state = fsm.next(state, at(-1000.0));
        assert_eq!(state, CaptureState::Captured { progress: 0.5 });
        state = fsm.next(state, at(400.0));
        assert_eq!(state, CaptureState::Approaching);
        state = fsm.next(state, at(5000.0));
        assert_eq!(state, CaptureState::Idle);
    }

    #[test]
    fn test_hysteresis_holds_capture_near_edges() {
        let fsm = ScrollCapture::default();
        let pinned = CaptureState::Captured { progress: 0.0 };
        assert_eq!(fsm.next(pinned, at(4.0)), CaptureState::Captured { progress: 0.0 });
        assert_eq!(fsm.next(CaptureState::Idle, at(4.0)), CaptureState::Approaching);

        let end = CaptureState::Captured { progress: 1.0 };
        assert_eq!(fsm.next(end, at(-2004.0)), CaptureState::Captured { progress: 1.0 });
        assert_eq!(fsm.next(CaptureState::Approaching, at(-2004.0)), CaptureState::Releasing);
    }

    #[test]
    fn test_short_region_skips_pinning() {
        let fsm = ScrollCapture::default();
        let m = CaptureMeasurement {
            section_top: -10.0,
            section_height: 500.0,
            viewport_height: 1000.0,
        };
        assert_eq!(fsm.next(CaptureState::Approaching, m), CaptureState::Releasing);
    }
}
