//! Named pattern configurations keyed by section.
//!
//! A [`PatternConfig`] is a point in parameter space: which attractor to
//! use and how strongly, how much damping, jitter and chaos, and the
//! cosmetic color/opacity/size. Configurations are static per section and
//! read-only at runtime; the activation source *selects* one, the
//! transition controller blends toward it.
//!
//! Everything entering a [`PatternRegistry`] is passed through
//! [`PatternConfig::sanitized`], so the integrator never sees damping
//! outside `(0, 1)` or non-finite inputs.

use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::field::ShapeField;
use crate::shape::Shape;
use crate::transition::FieldBlend;

/// Damping is clamped into this closed range, strictly inside `(0, 1)`.
pub const DAMPING_RANGE: (f32, f32) = (0.05, 0.995);
/// Mode numbers are clamped into this range.
pub const MODE_RANGE: (f32, f32) = (0.5, 32.0);
/// Particle size (pixels, before device-pixel-ratio scaling).
pub const SIZE_RANGE: (f32, f32) = (0.1, 16.0);

/// An sRGB color with components in `[0, 1]`.
///
/// Serialized as a `"#rrggbb"` string.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build a color from a packed `0xRRGGBB` value.
    pub fn hex(value: u32) -> Self {
        Self {
            r: ((value >> 16) & 0xff) as f32 / 255.0,
            g: ((value >> 8) & 0xff) as f32 / 255.0,
            b: (value & 0xff) as f32 / 255.0,
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    /// 8-bit channels, clamped.
    pub fn to_rgb8(self) -> [u8; 3] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }

    fn sanitized(self) -> Self {
        let c = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 1.0 };
        Self::rgb(c(self.r), c(self.g), c(self.b))
    }
}

/// Failed to parse a `#rrggbb` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color '{}', expected #rrggbb", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let digits = s.strip_prefix('#').unwrap_or(&s);
        if digits.len() != 6 {
            return Err(ParseColorError(s));
        }
        u32::from_str_radix(digits, 16)
            .map(Color::hex)
            .map_err(|_| ParseColorError(s))
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        let [r, g, b] = c.to_rgb8();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

/// What the force field is built from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attractor {
    /// Chladni standing wave with mode numbers `(n, m)`.
    Chladni { n: f32, m: f32 },
    /// Nearest-point attraction onto a fixed outline.
    Shape { shape: Shape },
}

impl Attractor {
    /// Mode numbers, if this is a Chladni attractor.
    pub fn modes(&self) -> Option<(f32, f32)> {
        match self {
            Attractor::Chladni { n, m } => Some((*n, *m)),
            Attractor::Shape { .. } => None,
        }
    }
}

/// A shape attractor with its segment index built, ready for per-frame use.
///
/// Building the index is the expensive part of a shape attractor, so it is
/// done once when the pattern becomes a transition endpoint and shared.
#[derive(Clone, Debug)]
pub enum ResolvedAttractor {
    Chladni { n: f32, m: f32 },
    Shape(Arc<ShapeField>),
    /// A cross-fade frozen part way through, the starting field of a
    /// transition that was retargeted before it finished.
    Blend(Arc<FieldBlend>),
}

impl ResolvedAttractor {
    /// Build the field for `attractor`. Shapes are flattened here, once.
    pub fn resolve(attractor: &Attractor) -> Self {
        match attractor {
            Attractor::Chladni { n, m } => ResolvedAttractor::Chladni { n: *n, m: *m },
            Attractor::Shape { shape } => ResolvedAttractor::Shape(Arc::new(ShapeField::new(shape))),
        }
    }

    /// How many frozen blends are nested inside this attractor.
    pub fn depth(&self) -> usize {
        match self {
            ResolvedAttractor::Blend(blend) => 1 + blend.from.depth().max(blend.to.depth()),
            _ => 0,
        }
    }

    pub fn is_chladni(&self) -> bool {
        matches!(self, ResolvedAttractor::Chladni { .. })
    }
}

/// A named point in parameter space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub attractor: Attractor,
    pub force_strength: f32,
    /// Per-frame velocity retention, strictly inside `(0, 1)`.
    pub damping: f32,
    /// Random velocity noise added every frame.
    pub jitter: f32,
    /// Extra random impulse; keeps a section visibly "searching".
    pub chaos: f32,
    pub particle_size: f32,
    pub color: Color,
    pub opacity: f32,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            attractor: Attractor::Chladni { n: 2.0, m: 3.0 },
            force_strength: 0.8,
            damping: 0.92,
            jitter: 0.0005,
            chaos: 0.0,
            particle_size: 1.5,
            color: Color::WHITE,
            opacity: 0.8,
        }
    }
}

impl PatternConfig {
    /// Chladni pattern with default dynamics.
    pub fn chladni(n: f32, m: f32) -> Self {
        Self {
            attractor: Attractor::Chladni { n, m },
            ..Self::default()
        }
    }

    /// Shape attractor with default dynamics.
    pub fn shape(shape: Shape) -> Self {
        Self {
            attractor: Attractor::Shape { shape },
            ..Self::default()
        }
    }

    pub fn with_force_strength(mut self, strength: f32) -> Self {
        self.force_strength = strength;
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_chaos(mut self, chaos: f32) -> Self {
        self.chaos = chaos;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_particle_size(mut self, size: f32) -> Self {
        self.particle_size = size;
        self
    }

    /// Clamp every parameter into a range the integrator is stable in.
    ///
    /// Non-finite values fall back to the defaults; finite values are
    /// clamped. Returns the cleaned config and whether anything changed.
    pub fn sanitize(&self) -> (Self, bool) {
        let defaults = Self::default();
        let clean = |v: f32, fallback: f32, lo: f32, hi: f32| {
            if v.is_finite() {
                v.clamp(lo, hi)
            } else {
                fallback
            }
        };

        let attractor = match &self.attractor {
            Attractor::Chladni { n, m } => Attractor::Chladni {
                n: clean(*n, 2.0, MODE_RANGE.0, MODE_RANGE.1),
                m: clean(*m, 3.0, MODE_RANGE.0, MODE_RANGE.1),
            },
            Attractor::Shape { shape } => Attractor::Shape {
                shape: shape.sanitized(),
            },
        };

        let out = Self {
            attractor,
            force_strength: clean(self.force_strength, defaults.force_strength, 0.0, 10.0),
            damping: clean(self.damping, defaults.damping, DAMPING_RANGE.0, DAMPING_RANGE.1),
            jitter: clean(self.jitter, defaults.jitter, 0.0, 0.1),
            chaos: clean(self.chaos, defaults.chaos, 0.0, 0.1),
            particle_size: clean(self.particle_size, defaults.particle_size, SIZE_RANGE.0, SIZE_RANGE.1),
            color: self.color.sanitized(),
            opacity: clean(self.opacity, defaults.opacity, 0.0, 1.0),
        };
        let changed = out != *self;
        (out, changed)
    }

    /// [`sanitize`](Self::sanitize) without the change flag.
    pub fn sanitized(&self) -> Self {
        self.sanitize().0
    }
}

/// Section identifier → pattern, in insertion (page) order.
#[derive(Clone, Debug)]
pub struct PatternRegistry {
    entries: Vec<(String, PatternConfig)>,
}

impl PatternRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register (or replace) the pattern for a section.
    ///
    /// The config is sanitized on the way in; a warning is logged when
    /// anything had to be clamped.
    pub fn insert(&mut self, id: impl Into<String>, config: PatternConfig) -> &mut Self {
        let id = id.into();
        let (config, changed) = config.sanitize();
        if changed {
            tracing::warn!(section = %id, "pattern parameters clamped into a stable range");
        }
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some(slot) => slot.1 = config,
            None => self.entries.push((id, config)),
        }
        self
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, id: impl Into<String>, config: PatternConfig) -> Self {
        self.insert(id, config);
        self
    }

    /// Look up a pattern by id.
    pub fn get(&self, id: &str) -> Option<&PatternConfig> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, c)| c)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Section ids in page order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// First registered section, used as the initial pattern.
    pub fn first(&self) -> Option<(&str, &PatternConfig)> {
        self.entries.first().map(|(k, c)| (k.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The built-in landing page scene: a hero, a run of feature sections
    /// with increasing complexity, and a closing shape.
    pub fn landing_page() -> Self {
        Self::new()
            .with(
                "hero",
                PatternConfig::chladni(1.0, 2.0)
                    .with_color(Color::hex(0x9ad1ff))
                    .with_opacity(0.85),
            )
            .with(
                "features",
                PatternConfig::chladni(2.0, 3.0).with_color(Color::hex(0xb8f2c4)),
            )
            .with(
                "performance",
                PatternConfig::chladni(3.0, 5.0)
                    .with_force_strength(1.0)
                    .with_color(Color::hex(0xffd27a)),
            )
            .with(
                "ecosystem",
                PatternConfig::chladni(4.0, 7.0)
                    .with_chaos(0.002)
                    .with_damping(0.9)
                    .with_color(Color::hex(0xf5a3ff)),
            )
            .with(
                "community",
                PatternConfig::shape(Shape::Star {
                    points: 5,
                    outer: 0.75,
                    inner: 0.32,
                })
                .with_color(Color::hex(0xffffff)),
            )
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::landing_page()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ForceField;

    #[test]
    fn test_color_hex_round_trip() {
        let c = Color::try_from("#ff8000".to_string()).unwrap();
        assert_eq!(c.to_rgb8(), [255, 128, 0]);
        assert_eq!(String::from(c), "#ff8000");
    }

    #[test]
    fn test_color_rejects_garbage() {
        assert!(Color::try_from("#ff80".to_string()).is_err());
        assert!(Color::try_from("#gg0000".to_string()).is_err());
    }

    #[test]
    fn test_damping_is_clamped_inside_unit_interval() {
        let high = PatternConfig::default().with_damping(1.5).sanitized();
        assert!(high.damping < 1.0);
        let low = PatternConfig::default().with_damping(-0.2).sanitized();
        assert!(low.damping > 0.0);
        let exact = PatternConfig::default().with_damping(1.0).sanitized();
        assert!(exact.damping < 1.0);
    }

    #[test]
    fn test_non_finite_values_fall_back_to_defaults() {
        let cfg = PatternConfig {
            attractor: Attractor::Chladni { n: f32::NAN, m: f32::INFINITY },
            force_strength: f32::NAN,
            damping: f32::NAN,
            ..PatternConfig::default()
        };
        let (clean, changed) = cfg.sanitize();
        assert!(changed);
        assert_eq!(clean.attractor, Attractor::Chladni { n: 2.0, m: 3.0 });
        assert_eq!(clean.force_strength, PatternConfig::default().force_strength);
        assert_eq!(clean.damping, PatternConfig::default().damping);
    }

    #[test]
    fn test_valid_config_is_untouched() {
        let (_, changed) = PatternConfig::chladni(2.0, 3.0).sanitize();
        assert!(!changed);
    }

    #[test]
    fn test_registry_sanitizes_and_replaces() {
        let mut reg = PatternRegistry::new();
        reg.insert("a", PatternConfig::chladni(1.0, 2.0).with_damping(2.0));
        reg.insert("b", PatternConfig::chladni(2.0, 5.0));
        reg.insert("a", PatternConfig::chladni(3.0, 4.0));

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(reg.get("a").unwrap().attractor.modes(), Some((3.0, 4.0)));
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn test_registry_sanitizes_shape_attractors() {
        let mut reg = PatternRegistry::new();
        reg.insert(
            "logo",
            PatternConfig::shape(Shape::Circle {
                radius: f32::INFINITY,
                segments: 64,
            }),
        );
        let config = reg.get("logo").unwrap();
        assert_eq!(
            config.attractor,
            Attractor::Shape {
                shape: Shape::Circle { radius: 0.5, segments: 64 }
            }
        );

        // The resolved field pulls particles somewhere finite.
        let field = ResolvedAttractor::resolve(&config.attractor);
        let ResolvedAttractor::Shape(shape) = field else {
            panic!("expected a shape attractor");
        };
        let force = shape.force(glam::Vec2::new(0.1, 0.2), 1.0);
        assert!(force.is_finite() && force != glam::Vec2::ZERO);
    }

    #[test]
    fn test_pattern_json_defaults() {
        let cfg: PatternConfig = serde_json::from_str(
            r##"{ "attractor": { "type": "chladni", "n": 4, "m": 5 }, "color": "#00ff00" }"##,
        )
        .unwrap();
        assert_eq!(cfg.attractor.modes(), Some((4.0, 5.0)));
        assert_eq!(cfg.damping, PatternConfig::default().damping);
        assert_eq!(cfg.color.to_rgb8(), [0, 255, 0]);
    }

    #[test]
    fn test_default_is_landing_page() {
        let ids: Vec<String> = PatternRegistry::default().ids().map(String::from).collect();
        let expected: Vec<String> = PatternRegistry::landing_page().ids().map(String::from).collect();
        assert_eq!(ids, expected);
        assert!(PatternRegistry::new().is_empty());
    }

    #[test]
    fn test_landing_page_is_valid() {
        let reg = PatternRegistry::landing_page();
        assert_eq!(reg.first().map(|(id, _)| id), Some("hero"));
        for id in reg.ids() {
            let (_, changed) = reg.get(id).unwrap().sanitize();
            assert!(!changed, "built-in pattern {} needs clamping", id);
        }
    }
}
