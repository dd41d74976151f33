//! Colour palettes and the palette registry.
//!
//! Palettes are plain configuration: an ordered colour list plus a mode. The
//! built-in set ships in `config/palettes.json`; deployments can add or replace
//! entries with their own document of the same shape.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RenderError, RenderResult};

/// Palettes shipped with the crate.
pub const BUILTIN_PALETTES: &str = include_str!("../config/palettes.json");

/// Name of the palette used when nothing else is configured.
pub const DEFAULT_PALETTE: &str = "viridis_10";

/// RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(self) -> Self {
        Self { a: 255, ..self }
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (the `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Color> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            6 => Some(Color::new(channel(0)?, channel(2)?, channel(4)?, 255)),
            8 => Some(Color::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    /// Linear blend towards `other`, `t` clamped to `[0, 1]`.
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

/// How normalised values map onto the colour list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteMode {
    /// Hard-edged buckets, one per colour.
    #[default]
    Discrete,
    /// Smooth ramp through the colours as evenly spaced stops.
    Continuous,
}

/// A palette entry as written in a palette document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaletteDefinition {
    #[serde(default)]
    pub mode: PaletteMode,
    #[serde(default)]
    pub description: Option<String>,
    pub colors: Vec<String>,
}

/// Palette document: `{ "palettes": { name: definition } }`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PaletteConfig {
    pub palettes: HashMap<String, PaletteDefinition>,
}

impl PaletteConfig {
    pub fn from_json(json: &str) -> RenderResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// A ready-to-use palette.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub name: String,
    pub mode: PaletteMode,
    pub colors: Vec<Color>,
}

impl Palette {
    pub fn new(name: impl Into<String>, mode: PaletteMode, colors: Vec<Color>) -> RenderResult<Self> {
        let name = name.into();
        if colors.is_empty() {
            return Err(RenderError::Palette(format!("palette '{}' has no colours", name)));
        }
        Ok(Self { name, mode, colors })
    }

    fn from_definition(name: &str, def: &PaletteDefinition) -> RenderResult<Self> {
        let colors = def
            .colors
            .iter()
            .map(|hex| {
                Color::from_hex(hex).ok_or_else(|| {
                    RenderError::Palette(format!("palette '{}': bad colour '{}'", name, hex))
                })
            })
            .collect::<RenderResult<Vec<_>>>()?;
        Self::new(name, def.mode, colors)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Bucket index of a normalised value: `floor(t * N)` clamped to the list.
    pub fn bucket(&self, t: f32) -> usize {
        let n = self.colors.len();
        let idx = (t * n as f32).floor();
        if idx.is_nan() || idx < 0.0 {
            0
        } else {
            (idx as usize).min(n.saturating_sub(1))
        }
    }

    /// Opaque colour for a normalised value in `[0, 1]`.
    pub fn color_at(&self, t: f32) -> Color {
        let color = match self.mode {
            PaletteMode::Discrete => self.colors[self.bucket(t)],
            PaletteMode::Continuous => self.ramp(t),
        };
        color.opaque()
    }

    fn ramp(&self, t: f32) -> Color {
        let n = self.colors.len();
        if n == 1 {
            return self.colors[0];
        }
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let pos = t * (n - 1) as f32;
        let lower = (pos.floor() as usize).min(n - 2);
        self.colors[lower].lerp(self.colors[lower + 1], pos - lower as f32)
    }
}

/// Named palettes with a fallback for unknown names.
#[derive(Debug, Clone)]
pub struct PaletteRegistry {
    palettes: HashMap<String, Palette>,
    default: Palette,
}

impl PaletteRegistry {
    /// Registry holding the built-in palettes, defaulting to the banded viridis_10.
    pub fn builtin() -> RenderResult<Self> {
        let config = PaletteConfig::from_json(BUILTIN_PALETTES)?;
        let def = config.palettes.get(DEFAULT_PALETTE).ok_or_else(|| {
            RenderError::Palette(format!("built-in palettes lack '{}'", DEFAULT_PALETTE))
        })?;
        let mut registry = Self {
            palettes: HashMap::new(),
            default: Palette::from_definition(DEFAULT_PALETTE, def)?,
        };
        registry.extend(&config)?;
        Ok(registry)
    }

    /// Add or replace palettes from a document.
    pub fn extend(&mut self, config: &PaletteConfig) -> RenderResult<()> {
        for (name, def) in &config.palettes {
            let palette = Palette::from_definition(name, def)?;
            debug!(palette = %name, colors = palette.len(), mode = ?palette.mode, "Registered palette");
            if *name == self.default.name {
                self.default = palette.clone();
            }
            self.palettes.insert(name.clone(), palette);
        }
        Ok(())
    }

    /// Load an override document on top of the current palettes.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> RenderResult<()> {
        let config = PaletteConfig::from_file(path)?;
        self.extend(&config)
    }

    /// Set the palette used for unknown names. It must be registered.
    pub fn set_default(&mut self, name: &str) -> RenderResult<()> {
        let palette = self.palettes.get(name).ok_or_else(|| {
            RenderError::Palette(format!("default palette '{}' is not registered", name))
        })?;
        self.default = palette.clone();
        Ok(())
    }

    pub fn default_name(&self) -> &str {
        &self.default.name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.palettes.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.palettes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The named palette, or the default one when `name` is unknown or absent.
    pub fn resolve(&self, name: Option<&str>) -> &Palette {
        if let Some(name) = name {
            if let Some(palette) = self.palettes.get(name) {
                return palette;
            }
            warn!(palette = %name, fallback = %self.default.name, "Unknown palette, using default");
        }
        &self.default
    }
}
