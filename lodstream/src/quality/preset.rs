//! Quality presets and the renderer knob bundles they select.
//!
//! Presets are static configuration. Only the *selected* preset changes at
//! runtime; the [`QualitySettings`] a preset maps to are never mutated.

use std::fmt;

use crate::catalog::DetailLevel;
use crate::device::{DeviceProfile, ShaderPrecision};

/// Named bundle of renderer configuration, ordered cheapest to most expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum QualityPreset {
    /// Lowest cost: reduced pixel density, no post effects.
    Performance,
    /// Middle ground used on most hardware.
    #[default]
    Balanced,
    /// Full pixel density, MSAA, shadows and ambient occlusion.
    Quality,
}

impl QualityPreset {
    pub const ALL: [QualityPreset; 3] = [
        QualityPreset::Performance,
        QualityPreset::Balanced,
        QualityPreset::Quality,
    ];

    /// One step cheaper, saturating at `Performance`.
    pub fn downgrade(&self) -> Self {
        match self {
            QualityPreset::Quality => QualityPreset::Balanced,
            QualityPreset::Balanced => QualityPreset::Performance,
            QualityPreset::Performance => QualityPreset::Performance,
        }
    }

    /// One step more expensive, saturating at `Quality`.
    pub fn upgrade(&self) -> Self {
        match self {
            QualityPreset::Performance => QualityPreset::Balanced,
            QualityPreset::Balanced => QualityPreset::Quality,
            QualityPreset::Quality => QualityPreset::Quality,
        }
    }

    /// The renderer knobs and LOD coupling for this preset.
    pub fn settings(&self) -> QualitySettings {
        match self {
            QualityPreset::Performance => QualitySettings {
                pixel_density: PixelDensityRange::new(0.5, 1.0),
                antialias: AntialiasMode::None,
                precision: ShaderPrecision::Medium,
                shadows: false,
                ambient_occlusion: false,
                environment_reflections: false,
                max_detail: DetailLevel::Region,
                budget_fraction: 0.5,
            },
            QualityPreset::Balanced => QualitySettings {
                pixel_density: PixelDensityRange::new(0.75, 1.5),
                antialias: AntialiasMode::Fxaa,
                precision: ShaderPrecision::High,
                shadows: true,
                ambient_occlusion: false,
                environment_reflections: true,
                max_detail: DetailLevel::Organ,
                budget_fraction: 0.75,
            },
            QualityPreset::Quality => QualitySettings {
                pixel_density: PixelDensityRange::new(1.0, 2.0),
                antialias: AntialiasMode::Msaa4,
                precision: ShaderPrecision::High,
                shadows: true,
                ambient_occlusion: true,
                environment_reflections: true,
                max_detail: DetailLevel::Tissue,
                budget_fraction: 1.0,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Performance => "performance",
            QualityPreset::Balanced => "balanced",
            QualityPreset::Quality => "quality",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "performance" | "low" => Some(QualityPreset::Performance),
            "balanced" | "medium" => Some(QualityPreset::Balanced),
            "quality" | "high" => Some(QualityPreset::Quality),
            _ => None,
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Antialiasing technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AntialiasMode {
    None,
    /// Post-process FXAA pass.
    Fxaa,
    /// 4x multisampling.
    Msaa4,
}

/// Allowed pixel density (device pixel ratio) range for a preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelDensityRange {
    pub min: f32,
    pub max: f32,
}

impl PixelDensityRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, density: f32) -> f32 {
        density.clamp(self.min, self.max)
    }
}

/// Renderer knobs selected as a unit by a [`QualityPreset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySettings {
    pub pixel_density: PixelDensityRange,
    pub antialias: AntialiasMode,
    pub precision: ShaderPrecision,
    pub shadows: bool,
    pub ambient_occlusion: bool,
    pub environment_reflections: bool,
    /// Finest detail tier reachable under this preset.
    pub max_detail: DetailLevel,
    /// Fraction of the configured memory capacity usable under this preset.
    pub budget_fraction: f32,
}

impl QualitySettings {
    /// Restrict the settings to what the device can sustain.
    ///
    /// The pixel density range is capped at the device maximum and shader
    /// precision at the device's supported precision.
    pub fn clamped_to(mut self, profile: &DeviceProfile) -> Self {
        let cap = profile.max_pixel_density;
        self.pixel_density.max = self.pixel_density.max.min(cap);
        self.pixel_density.min = self.pixel_density.min.min(self.pixel_density.max);
        self.precision = self.precision.min(profile.precision);
        self
    }
}
