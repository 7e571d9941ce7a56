//! Settable configuration keys (`section.key`).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFile;
use super::size::parse_size;
use super::ConfigError;
use crate::quality::QualityPreset;

/// Every key the configuration file understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    LodTissueDistance,
    LodOrganDistance,
    LodRegionDistance,
    LodHysteresis,
    LodNearRadius,

    QualityLowFps,
    QualityHighFps,
    QualityDowngradeSustainMs,
    QualityUpgradeSustainMs,
    QualityCooldownMs,
    QualityOverrideHoldMs,
    QualityMinSamples,
    QualitySamplerCapacity,
    QualityInitialPreset,

    StreamCapacity,
    StreamLoadTimeoutSecs,
    StreamMaxDeferralSecs,
    StreamMaxAttempts,
    StreamRetryInitialDelayMs,
    StreamRetryMaxDelaySecs,
    StreamAssetSource,

    SessionIdleMoveEpsilon,
    SessionLossThreshold,
    SessionLossWindowSecs,

    ProfilerProbeWindowMs,
    ProfilerHighTierFrameMs,
    ProfilerMidTierFrameMs,

    LoggingLevel,
    LoggingFile,
}

const ALL_KEYS: [ConfigKey; 29] = [
    ConfigKey::LodTissueDistance,
    ConfigKey::LodOrganDistance,
    ConfigKey::LodRegionDistance,
    ConfigKey::LodHysteresis,
    ConfigKey::LodNearRadius,
    ConfigKey::QualityLowFps,
    ConfigKey::QualityHighFps,
    ConfigKey::QualityDowngradeSustainMs,
    ConfigKey::QualityUpgradeSustainMs,
    ConfigKey::QualityCooldownMs,
    ConfigKey::QualityOverrideHoldMs,
    ConfigKey::QualityMinSamples,
    ConfigKey::QualitySamplerCapacity,
    ConfigKey::QualityInitialPreset,
    ConfigKey::StreamCapacity,
    ConfigKey::StreamLoadTimeoutSecs,
    ConfigKey::StreamMaxDeferralSecs,
    ConfigKey::StreamMaxAttempts,
    ConfigKey::StreamRetryInitialDelayMs,
    ConfigKey::StreamRetryMaxDelaySecs,
    ConfigKey::StreamAssetSource,
    ConfigKey::SessionIdleMoveEpsilon,
    ConfigKey::SessionLossThreshold,
    ConfigKey::SessionLossWindowSecs,
    ConfigKey::ProfilerProbeWindowMs,
    ConfigKey::ProfilerHighTierFrameMs,
    ConfigKey::ProfilerMidTierFrameMs,
    ConfigKey::LoggingLevel,
    ConfigKey::LoggingFile,
];

impl ConfigKey {
    /// All keys, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// Full name in `section.key` form.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            LodTissueDistance | LodOrganDistance | LodRegionDistance | LodHysteresis
            | LodNearRadius => "lod",
            QualityLowFps
            | QualityHighFps
            | QualityDowngradeSustainMs
            | QualityUpgradeSustainMs
            | QualityCooldownMs
            | QualityOverrideHoldMs
            | QualityMinSamples
            | QualitySamplerCapacity
            | QualityInitialPreset => "quality",
            StreamCapacity
            | StreamLoadTimeoutSecs
            | StreamMaxDeferralSecs
            | StreamMaxAttempts
            | StreamRetryInitialDelayMs
            | StreamRetryMaxDelaySecs
            | StreamAssetSource => "stream",
            SessionIdleMoveEpsilon | SessionLossThreshold | SessionLossWindowSecs => "session",
            ProfilerProbeWindowMs | ProfilerHighTierFrameMs | ProfilerMidTierFrameMs => "profiler",
            LoggingLevel | LoggingFile => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            LodTissueDistance => "tissue_distance",
            LodOrganDistance => "organ_distance",
            LodRegionDistance => "region_distance",
            LodHysteresis => "hysteresis",
            LodNearRadius => "near_radius",
            QualityLowFps => "low_fps",
            QualityHighFps => "high_fps",
            QualityDowngradeSustainMs => "downgrade_sustain_ms",
            QualityUpgradeSustainMs => "upgrade_sustain_ms",
            QualityCooldownMs => "cooldown_ms",
            QualityOverrideHoldMs => "override_hold_ms",
            QualityMinSamples => "min_samples",
            QualitySamplerCapacity => "sampler_capacity",
            QualityInitialPreset => "initial_preset",
            StreamCapacity => "capacity",
            StreamLoadTimeoutSecs => "load_timeout_secs",
            StreamMaxDeferralSecs => "max_deferral_secs",
            StreamMaxAttempts => "max_attempts",
            StreamRetryInitialDelayMs => "retry_initial_delay_ms",
            StreamRetryMaxDelaySecs => "retry_max_delay_secs",
            StreamAssetSource => "asset_source",
            SessionIdleMoveEpsilon => "idle_move_epsilon",
            SessionLossThreshold => "loss_threshold",
            SessionLossWindowSecs => "loss_window_secs",
            ProfilerProbeWindowMs => "probe_window_ms",
            ProfilerHighTierFrameMs => "high_tier_frame_ms",
            ProfilerMidTierFrameMs => "mid_tier_frame_ms",
            LoggingLevel => "level",
            LoggingFile => "file",
        }
    }

    /// Current value as written to the file; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        match self {
            LodTissueDistance => config.lod.tissue_distance.to_string(),
            LodOrganDistance => config.lod.organ_distance.to_string(),
            LodRegionDistance => config.lod.region_distance.to_string(),
            LodHysteresis => config.lod.hysteresis.to_string(),
            LodNearRadius => config.lod.near_radius.to_string(),
            QualityLowFps => config.quality.low_fps.to_string(),
            QualityHighFps => config.quality.high_fps.to_string(),
            QualityDowngradeSustainMs => config.quality.downgrade_sustain_ms.to_string(),
            QualityUpgradeSustainMs => config.quality.upgrade_sustain_ms.to_string(),
            QualityCooldownMs => config.quality.cooldown_ms.to_string(),
            QualityOverrideHoldMs => config.quality.override_hold_ms.to_string(),
            QualityMinSamples => config.quality.min_samples.to_string(),
            QualitySamplerCapacity => config.quality.sampler_capacity.to_string(),
            QualityInitialPreset => config
                .quality
                .initial_preset
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
            StreamCapacity => config.stream.capacity.to_string(),
            StreamLoadTimeoutSecs => config.stream.load_timeout_secs.to_string(),
            StreamMaxDeferralSecs => config.stream.max_deferral_secs.to_string(),
            StreamMaxAttempts => config.stream.max_attempts.to_string(),
            StreamRetryInitialDelayMs => config.stream.retry_initial_delay_ms.to_string(),
            StreamRetryMaxDelaySecs => config.stream.retry_max_delay_secs.to_string(),
            StreamAssetSource => config.stream.asset_source.clone().unwrap_or_default(),
            SessionIdleMoveEpsilon => config.session.idle_move_epsilon.to_string(),
            SessionLossThreshold => config.session.loss_threshold.to_string(),
            SessionLossWindowSecs => config.session.loss_window_secs.to_string(),
            ProfilerProbeWindowMs => config.profiler.probe_window_ms.to_string(),
            ProfilerHighTierFrameMs => config.profiler.high_tier_frame_ms.to_string(),
            ProfilerMidTierFrameMs => config.profiler.mid_tier_frame_ms.to_string(),
            LoggingLevel => config.logging.level.clone(),
            LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse `value` and store it. An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        match self {
            LodTissueDistance => config.lod.tissue_distance = self.parse(value)?,
            LodOrganDistance => config.lod.organ_distance = self.parse(value)?,
            LodRegionDistance => config.lod.region_distance = self.parse(value)?,
            LodHysteresis => config.lod.hysteresis = self.parse(value)?,
            LodNearRadius => config.lod.near_radius = self.parse(value)?,
            QualityLowFps => config.quality.low_fps = self.parse(value)?,
            QualityHighFps => config.quality.high_fps = self.parse(value)?,
            QualityDowngradeSustainMs => config.quality.downgrade_sustain_ms = self.parse(value)?,
            QualityUpgradeSustainMs => config.quality.upgrade_sustain_ms = self.parse(value)?,
            QualityCooldownMs => config.quality.cooldown_ms = self.parse(value)?,
            QualityOverrideHoldMs => config.quality.override_hold_ms = self.parse(value)?,
            QualityMinSamples => config.quality.min_samples = self.parse(value)?,
            QualitySamplerCapacity => config.quality.sampler_capacity = self.parse(value)?,
            QualityInitialPreset => {
                config.quality.initial_preset = if value.is_empty() {
                    None
                } else {
                    Some(QualityPreset::parse(value).ok_or_else(|| {
                        self.invalid(value, "expected performance, balanced or quality")
                    })?)
                }
            }
            StreamCapacity => {
                config.stream.capacity = parse_size(value)
                    .ok_or_else(|| self.invalid(value, "expected a size such as 256MB"))?
            }
            StreamLoadTimeoutSecs => config.stream.load_timeout_secs = self.parse(value)?,
            StreamMaxDeferralSecs => config.stream.max_deferral_secs = self.parse(value)?,
            StreamMaxAttempts => config.stream.max_attempts = self.parse(value)?,
            StreamRetryInitialDelayMs => config.stream.retry_initial_delay_ms = self.parse(value)?,
            StreamRetryMaxDelaySecs => config.stream.retry_max_delay_secs = self.parse(value)?,
            StreamAssetSource => {
                config.stream.asset_source = (!value.is_empty()).then(|| value.to_string())
            }
            SessionIdleMoveEpsilon => config.session.idle_move_epsilon = self.parse(value)?,
            SessionLossThreshold => config.session.loss_threshold = self.parse(value)?,
            SessionLossWindowSecs => config.session.loss_window_secs = self.parse(value)?,
            ProfilerProbeWindowMs => config.profiler.probe_window_ms = self.parse(value)?,
            ProfilerHighTierFrameMs => config.profiler.high_tier_frame_ms = self.parse(value)?,
            ProfilerMidTierFrameMs => config.profiler.mid_tier_frame_ms = self.parse(value)?,
            LoggingLevel => {
                if value.is_empty() {
                    return Err(self.invalid(value, "expected a log filter such as info"));
                }
                config.logging.level = value.to_string()
            }
            LoggingFile => config.logging.file = (!value.is_empty()).then(|| PathBuf::from(value)),
        }
        Ok(())
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        value.parse().map_err(|e: T::Err| self.invalid(value, &e.to_string()))
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_from_str() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
        assert_eq!(
            "LOD.Hysteresis".parse::<ConfigKey>().unwrap(),
            ConfigKey::LodHysteresis
        );
    }

    #[test]
    fn test_unknown_key() {
        assert!(matches!(
            "lod.colour".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_sections_are_contiguous() {
        let mut seen = Vec::new();
        for key in ConfigKey::all() {
            if seen.last() != Some(&key.section()) {
                assert!(!seen.contains(&key.section()), "{} split", key.section());
                seen.push(key.section());
            }
        }
        assert_eq!(
            seen,
            vec!["lod", "quality", "stream", "session", "profiler", "logging"]
        );
    }

    #[test]
    fn test_set_and_get() {
        let mut config = ConfigFile::default();
        ConfigKey::StreamCapacity.set(&mut config, "64MB").unwrap();
        assert_eq!(config.stream.capacity, 64 * 1024 * 1024);
        assert_eq!(ConfigKey::StreamCapacity.get(&config), "67108864");

        ConfigKey::QualityInitialPreset.set(&mut config, "High").unwrap();
        assert_eq!(ConfigKey::QualityInitialPreset.get(&config), "quality");
        ConfigKey::QualityInitialPreset.set(&mut config, "").unwrap();
        assert!(ConfigKey::QualityInitialPreset.get(&config).is_empty());
    }

    #[test]
    fn test_invalid_value_names_key() {
        let mut config = ConfigFile::default();
        let err = ConfigKey::QualityMinSamples
            .set(&mut config, "several")
            .unwrap_err();
        assert!(err.to_string().contains("quality.min_samples"));
        assert_eq!(config.quality.min_samples, crate::quality::DEFAULT_MIN_SAMPLES);
    }
}
