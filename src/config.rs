//! Scene configuration files.
//!
//! A scene is the host page as far as the simulation cares: an ordered list
//! of sections, each with a height and a pattern, plus the knobs that stay
//! fixed for the session.
//!
//! ```json
//! {
//!   "particle_count": 20000,
//!   "boundary": { "policy": "wrap" },
//!   "transition": { "mode": "timed", "lerp_speed": 0.05 },
//!   "activation": { "kind": "intersection", "threshold": 0.5 },
//!   "sections": [
//!     { "id": "hero", "pattern": { "attractor": { "type": "chladni", "n": 1, "m": 2 } } },
//!     { "id": "logo", "height": 1200,
//!       "pattern": { "attractor": { "type": "shape", "shape": { "kind": "circle", "radius": 0.6, "segments": 96 } } } }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::activation::{IntersectionSource, ScrollProgressSource, SectionExtent, SectionSource};
use crate::error::ConfigError;
use crate::integrator::BoundaryPolicy;
use crate::pattern::{PatternConfig, PatternRegistry};
use crate::render::BackendPreference;
use crate::time::DeviceClass;
use crate::transition::TransitionMode;

/// Default section height in logical pixels.
pub const DEFAULT_SECTION_HEIGHT: f32 = 900.0;

/// Shortest section accepted, in logical pixels.
pub const MIN_SECTION_HEIGHT: f32 = 1.0;

fn default_section_height() -> f32 {
    DEFAULT_SECTION_HEIGHT
}

fn section_height(height: f32) -> f32 {
    if height.is_finite() {
        height.max(MIN_SECTION_HEIGHT)
    } else {
        DEFAULT_SECTION_HEIGHT
    }
}

/// One page section and the pattern it activates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub id: String,
    #[serde(default = "default_section_height")]
    pub height: f32,
    #[serde(default)]
    pub pattern: PatternConfig,
}

/// How sections become active.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivationConfig {
    /// Most visible section wins once it clears `threshold`.
    Intersection { threshold: f32 },
    /// The whole page is one scroll story through every section in order.
    ScrollProgress,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        ActivationConfig::Intersection {
            threshold: IntersectionSource::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub particle_count: usize,
    pub boundary: BoundaryPolicy,
    pub transition: TransitionMode,
    pub activation: ActivationConfig,
    pub device_class: DeviceClass,
    pub backend: BackendPreference,
    pub seed: Option<u64>,
    pub sections: Vec<SectionConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let registry = PatternRegistry::landing_page();
        let sections = registry
            .ids()
            .filter_map(|id| {
                registry.get(id).map(|pattern| SectionConfig {
                    id: id.to_string(),
                    height: DEFAULT_SECTION_HEIGHT,
                    pattern: pattern.clone(),
                })
            })
            .collect();
        Self {
            particle_count: 20_000,
            boundary: BoundaryPolicy::default(),
            transition: TransitionMode::default(),
            activation: ActivationConfig::default(),
            device_class: DeviceClass::default(),
            backend: BackendPreference::default(),
            seed: None,
            sections,
        }
    }
}

impl SceneConfig {
    /// Read and validate a scene file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse, sanitize and validate a scene.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let mut scene: SceneConfig = serde_json::from_str(text)?;
        scene.sanitize();
        scene.validate()?;
        Ok(scene)
    }

    /// Clamp session-wide knobs and section heights into working ranges.
    ///
    /// Patterns are sanitized separately when they enter the registry.
    /// Returns whether anything changed.
    pub fn sanitize(&mut self) -> bool {
        let mut changed = false;

        let transition = self.transition.sanitized();
        if transition != self.transition {
            warn!(from = ?self.transition, to = ?transition, "transition mode clamped");
            self.transition = transition;
            changed = true;
        }

        let boundary = self.boundary.sanitized();
        if boundary != self.boundary {
            warn!(from = ?self.boundary, to = ?boundary, "boundary policy clamped");
            self.boundary = boundary;
            changed = true;
        }

        for section in &mut self.sections {
            let height = section_height(section.height);
            if height != section.height {
                warn!(section = %section.id, height = section.height, using = height, "section height clamped");
                section.height = height;
                changed = true;
            }
        }
        changed
    }

    /// Reject scenes that cannot drive a page.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sections.is_empty() {
            return Err(ConfigError::NoSections);
        }
        Ok(())
    }

    /// Sanitized patterns keyed by section id.
    pub fn to_registry(&self) -> PatternRegistry {
        let mut registry = PatternRegistry::new();
        for section in &self.sections {
            registry.insert(section.id.clone(), section.pattern.clone());
        }
        registry
    }

    /// Sections stacked top to bottom in page pixels.
    pub fn extents(&self) -> Vec<SectionExtent> {
        let mut top = 0.0;
        self.sections
            .iter()
            .map(|s| {
                let height = section_height(s.height);
                let extent = SectionExtent::new(s.id.clone(), top, height);
                top += height;
                extent
            })
            .collect()
    }

    /// Total page height.
    pub fn page_height(&self) -> f32 {
        self.extents().iter().map(|e| e.height).sum()
    }

    /// Activation source for this scene's page.
    pub fn build_source(&self) -> Box<dyn SectionSource> {
        match self.activation {
            ActivationConfig::Intersection { threshold } => {
                Box::new(IntersectionSource::new(self.extents()).with_threshold(threshold))
            }
            ActivationConfig::ScrollProgress => Box::new(ScrollProgressSource::new(
                0.0,
                self.page_height(),
                self.sections.iter().map(|s| s.id.clone()),
            )),
        }
    }
}
