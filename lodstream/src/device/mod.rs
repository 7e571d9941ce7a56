//! Device capability profiling.
//!
//! A [`DeviceProfile`] is produced once at startup by the
//! [`DeviceCapabilityProfiler`] from a short benchmark render and user-agent
//! hints. It seeds the quality controller's initial preset and clamps the
//! highest preset automatic control may reach.
//!
//! ```text
//! CapabilitySignals ──► DeviceCapabilityProfiler::probe() ──► DeviceProfile
//!                                                              │
//!                        initial_preset() / preset_ceiling() ◄─┘
//! ```

mod profiler;
mod signals;

pub use profiler::{
    DeviceCapabilityProfiler, ProfilerConfig, DEFAULT_HIGH_TIER_FRAME_MS,
    DEFAULT_MID_TIER_FRAME_MS, DEFAULT_PROBE_WINDOW,
};
pub use signals::{BenchmarkSample, CapabilitySignals, StaticSignals};

use std::fmt;

use crate::quality::QualityPreset;

/// Estimated GPU capability tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GpuTier {
    Low,
    Mid,
    High,
}

impl GpuTier {
    /// Highest pixel density considered safe for the tier.
    pub fn pixel_density_cap(&self) -> f32 {
        match self {
            GpuTier::Low => 1.0,
            GpuTier::Mid => 1.5,
            GpuTier::High => 2.0,
        }
    }
}

impl fmt::Display for GpuTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuTier::Low => write!(f, "low"),
            GpuTier::Mid => write!(f, "mid"),
            GpuTier::High => write!(f, "high"),
        }
    }
}

/// Fragment shader float precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShaderPrecision {
    Low,
    Medium,
    High,
}

impl fmt::Display for ShaderPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderPrecision::Low => write!(f, "lowp"),
            ShaderPrecision::Medium => write!(f, "mediump"),
            ShaderPrecision::High => write!(f, "highp"),
        }
    }
}

/// Rendering capability of the host, fixed for the session unless re-probed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    pub tier: GpuTier,
    /// Maximum safe pixel density (device pixel ratio).
    pub max_pixel_density: f32,
    pub precision: ShaderPrecision,
    /// Known constrained mobile class (phones, tablets).
    pub constrained_mobile: bool,
    /// `true` when no capability signal was available and this is the
    /// conservative fallback.
    pub conservative: bool,
}

impl DeviceProfile {
    /// Low-tier profile used when capability cannot be determined.
    pub fn conservative() -> Self {
        Self {
            tier: GpuTier::Low,
            max_pixel_density: GpuTier::Low.pixel_density_cap(),
            precision: ShaderPrecision::Medium,
            constrained_mobile: false,
            conservative: true,
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::conservative()
    }
}

/// Preset the quality controller starts from on this device.
pub fn initial_preset(profile: &DeviceProfile) -> QualityPreset {
    let preset = match profile.tier {
        GpuTier::Low => QualityPreset::Performance,
        GpuTier::Mid => QualityPreset::Balanced,
        GpuTier::High => QualityPreset::Quality,
    };
    preset.min(preset_ceiling(profile))
}

/// Highest preset automatic control may select on this device.
///
/// Early frames before thermal throttling can be misleadingly fast, so a
/// low-tier or constrained mobile device never auto-upgrades to `Quality`.
pub fn preset_ceiling(profile: &DeviceProfile) -> QualityPreset {
    if profile.tier == GpuTier::Low || profile.constrained_mobile {
        QualityPreset::Balanced
    } else {
        QualityPreset::Quality
    }
}
