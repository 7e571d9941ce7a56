//! Heuristic device profiler.
//!
//! # Heuristics
//!
//! ```text
//! benchmark frame time < 6ms   -> High
//! benchmark frame time < 16ms  -> Mid
//! otherwise                    -> Low
//! mobile user agent            -> tier capped at Mid, constrained
//! no benchmark, desktop UA     -> Mid
//! no signals at all            -> conservative Low (ProbeUnavailable)
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;

use super::signals::CapabilitySignals;
use super::{DeviceProfile, GpuTier, ShaderPrecision};
use crate::error::LodError;

/// Default upper bound on how long the benchmark may run.
pub const DEFAULT_PROBE_WINDOW: Duration = Duration::from_millis(250);

/// Benchmark frame time below which the GPU is considered high tier.
pub const DEFAULT_HIGH_TIER_FRAME_MS: f32 = 6.0;

/// Benchmark frame time below which the GPU is considered mid tier.
pub const DEFAULT_MID_TIER_FRAME_MS: f32 = 16.0;

/// Profiler tunables.
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Maximum benchmark duration; results that took longer are discarded.
    pub probe_window: Duration,
    pub high_tier_frame_ms: f32,
    pub mid_tier_frame_ms: f32,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            probe_window: DEFAULT_PROBE_WINDOW,
            high_tier_frame_ms: DEFAULT_HIGH_TIER_FRAME_MS,
            mid_tier_frame_ms: DEFAULT_MID_TIER_FRAME_MS,
        }
    }
}

fn mobile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(iphone|ipad|ipod|android|mobile|silk|kindle|opera mini)").unwrap()
    })
}

/// Probes host rendering capability.
///
/// Holds its signal source so the profile can be re-probed later (for
/// example when the user forces a quality preset change).
pub struct DeviceCapabilityProfiler {
    config: ProfilerConfig,
    signals: Arc<dyn CapabilitySignals>,
}

impl std::fmt::Debug for DeviceCapabilityProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCapabilityProfiler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DeviceCapabilityProfiler {
    pub fn new(config: ProfilerConfig, signals: Arc<dyn CapabilitySignals>) -> Self {
        Self { config, signals }
    }

    pub fn with_defaults(signals: Arc<dyn CapabilitySignals>) -> Self {
        Self::new(ProfilerConfig::default(), signals)
    }

    /// Probe the device, falling back to the conservative profile.
    ///
    /// Never fails: when no capability signal is available a low-tier
    /// profile is returned and a warning is logged.
    pub fn probe(&self) -> DeviceProfile {
        match self.try_probe() {
            Ok(profile) => {
                tracing::info!(
                    tier = %profile.tier,
                    max_pixel_density = profile.max_pixel_density,
                    precision = %profile.precision,
                    mobile = profile.constrained_mobile,
                    "Device capability probed"
                );
                profile
            }
            Err(e) => {
                tracing::warn!(error = %e, "Using conservative device profile");
                DeviceProfile::conservative()
            }
        }
    }

    /// Probe the device, reporting `ProbeUnavailable` when no usable signal
    /// exists.
    pub fn try_probe(&self) -> Result<DeviceProfile, LodError> {
        let window = self.config.probe_window;

        let benchmark = self.signals.benchmark(window).filter(|sample| {
            let within = sample.elapsed <= window;
            if !within {
                tracing::debug!(
                    elapsed_ms = sample.elapsed.as_millis() as u64,
                    window_ms = window.as_millis() as u64,
                    "Discarding benchmark that overran the probe window"
                );
            }
            within && sample.frame_ms.is_finite() && sample.frame_ms > 0.0
        });
        let user_agent = self.signals.user_agent();

        if benchmark.is_none() && user_agent.is_none() {
            return Err(LodError::ProbeUnavailable(
                "no benchmark result and no user agent".to_string(),
            ));
        }

        let mobile = user_agent
            .as_deref()
            .map(|ua| mobile_pattern().is_match(ua))
            .unwrap_or(false);

        let mut tier = match benchmark {
            Some(sample) if sample.frame_ms < self.config.high_tier_frame_ms => GpuTier::High,
            Some(sample) if sample.frame_ms < self.config.mid_tier_frame_ms => GpuTier::Mid,
            Some(_) => GpuTier::Low,
            None if mobile => GpuTier::Low,
            None => GpuTier::Mid,
        };
        if mobile {
            tier = tier.min(GpuTier::Mid);
        }

        let native_ratio = self
            .signals
            .device_pixel_ratio()
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(1.0);
        let max_pixel_density = native_ratio.min(tier.pixel_density_cap());

        let precision = match self.signals.high_precision_supported() {
            Some(true) => ShaderPrecision::High,
            Some(false) => ShaderPrecision::Medium,
            None if tier == GpuTier::Low => ShaderPrecision::Medium,
            None => ShaderPrecision::High,
        };

        Ok(DeviceProfile {
            tier,
            max_pixel_density,
            precision,
            constrained_mobile: mobile,
            conservative: false,
        })
    }
}
