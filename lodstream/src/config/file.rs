//! Typed view of the INI configuration file.
//!
//! ```ini
//! [lod]
//! tissue_distance = 0.5
//! organ_distance = 1.5
//! region_distance = 4
//! hysteresis = 0.1
//! near_radius = 1
//!
//! [quality]
//! low_fps = 30
//! high_fps = 55
//! initial_preset = balanced
//!
//! [stream]
//! capacity = 256 MB
//! load_timeout_secs = 30
//! asset_source = https://cdn.example.org/anatomy
//!
//! [logging]
//! level = info
//! file = /var/log/lodstream.log
//! ```
//!
//! Unknown sections and keys are ignored. Missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;

use super::keys::ConfigKey;
use super::{config_file_path, ConfigError};
use crate::device::{
    ProfilerConfig, DEFAULT_HIGH_TIER_FRAME_MS, DEFAULT_MID_TIER_FRAME_MS, DEFAULT_PROBE_WINDOW,
};
use crate::lod::{
    LodConfig, DEFAULT_HYSTERESIS, DEFAULT_NEAR_RADIUS, DEFAULT_ORGAN_DISTANCE,
    DEFAULT_REGION_DISTANCE, DEFAULT_TISSUE_DISTANCE,
};
use crate::quality::{
    QualityConfig, QualityPreset, DEFAULT_COOLDOWN_MS, DEFAULT_DOWNGRADE_SUSTAIN_MS,
    DEFAULT_HIGH_FPS_THRESHOLD, DEFAULT_LOSS_THRESHOLD, DEFAULT_LOSS_WINDOW,
    DEFAULT_LOW_FPS_THRESHOLD, DEFAULT_MIN_SAMPLES, DEFAULT_OVERRIDE_HOLD_MS,
    DEFAULT_SAMPLER_CAPACITY, DEFAULT_UPGRADE_SUSTAIN_MS,
};
use crate::session::{SessionConfig, DEFAULT_IDLE_MOVE_EPSILON};
use crate::stream::{
    RetryPolicy, StreamConfig, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CAPACITY_BYTES,
    DEFAULT_INITIAL_DELAY_MS, DEFAULT_LOAD_TIMEOUT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DEFERRAL, DEFAULT_MAX_DELAY_SECS,
};

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `[lod]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LodSettings {
    pub tissue_distance: f32,
    pub organ_distance: f32,
    pub region_distance: f32,
    pub hysteresis: f32,
    pub near_radius: f32,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            tissue_distance: DEFAULT_TISSUE_DISTANCE,
            organ_distance: DEFAULT_ORGAN_DISTANCE,
            region_distance: DEFAULT_REGION_DISTANCE,
            hysteresis: DEFAULT_HYSTERESIS,
            near_radius: DEFAULT_NEAR_RADIUS,
        }
    }
}

/// `[quality]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityControlSettings {
    pub low_fps: f32,
    pub high_fps: f32,
    pub downgrade_sustain_ms: f64,
    pub upgrade_sustain_ms: f64,
    pub cooldown_ms: f64,
    pub override_hold_ms: f64,
    pub min_samples: usize,
    pub sampler_capacity: usize,
    /// Start from this preset instead of the device-derived one.
    pub initial_preset: Option<QualityPreset>,
}

impl Default for QualityControlSettings {
    fn default() -> Self {
        Self {
            low_fps: DEFAULT_LOW_FPS_THRESHOLD,
            high_fps: DEFAULT_HIGH_FPS_THRESHOLD,
            downgrade_sustain_ms: DEFAULT_DOWNGRADE_SUSTAIN_MS,
            upgrade_sustain_ms: DEFAULT_UPGRADE_SUSTAIN_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            override_hold_ms: DEFAULT_OVERRIDE_HOLD_MS,
            min_samples: DEFAULT_MIN_SAMPLES,
            sampler_capacity: DEFAULT_SAMPLER_CAPACITY,
            initial_preset: None,
        }
    }
}

/// `[stream]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// Memory capacity at the `Quality` preset, in bytes.
    pub capacity: u64,
    pub load_timeout_secs: u64,
    pub max_deferral_secs: u64,
    pub max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_secs: u64,
    /// Directory or base URL that asset locators are resolved against.
    pub asset_source: Option<String>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY_BYTES,
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT.as_secs(),
            max_deferral_secs: DEFAULT_MAX_DEFERRAL.as_secs(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            retry_max_delay_secs: DEFAULT_MAX_DELAY_SECS,
            asset_source: None,
        }
    }
}

/// `[session]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub idle_move_epsilon: f32,
    pub loss_threshold: usize,
    pub loss_window_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_move_epsilon: DEFAULT_IDLE_MOVE_EPSILON,
            loss_threshold: DEFAULT_LOSS_THRESHOLD,
            loss_window_secs: DEFAULT_LOSS_WINDOW.as_secs(),
        }
    }
}

/// `[profiler]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilerSettings {
    pub probe_window_ms: u64,
    pub high_tier_frame_ms: f32,
    pub mid_tier_frame_ms: f32,
}

impl Default for ProfilerSettings {
    fn default() -> Self {
        Self {
            probe_window_ms: DEFAULT_PROBE_WINDOW.as_millis() as u64,
            high_tier_frame_ms: DEFAULT_HIGH_TIER_FRAME_MS,
            mid_tier_frame_ms: DEFAULT_MID_TIER_FRAME_MS,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Optional log file, written through a non-blocking appender.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub lod: LodSettings,
    pub quality: QualityControlSettings,
    pub stream: StreamSettings,
    pub session: SessionSettings,
    pub profiler: ProfilerSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Parse an INI document.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the default location, creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Render as an INI document. Unset optional keys are omitted.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }

    pub fn lod_config(&self) -> LodConfig {
        let lod = &self.lod;
        LodConfig::new()
            .with_thresholds(lod.tissue_distance, lod.organ_distance, lod.region_distance)
            .with_hysteresis(lod.hysteresis)
            .with_near_radius(lod.near_radius)
    }

    pub fn quality_config(&self) -> QualityConfig {
        let q = &self.quality;
        let mut config = QualityConfig::new()
            .with_thresholds(q.low_fps, q.high_fps)
            .with_sustain_ms(q.downgrade_sustain_ms, q.upgrade_sustain_ms)
            .with_cooldown_ms(q.cooldown_ms)
            .with_override_hold_ms(q.override_hold_ms)
            .with_min_samples(q.min_samples);
        config.sampler_capacity = q.sampler_capacity;
        config
    }

    pub fn stream_config(&self) -> StreamConfig {
        let s = &self.stream;
        StreamConfig::new()
            .with_capacity_bytes(s.capacity)
            .with_load_timeout(Duration::from_secs(s.load_timeout_secs))
            .with_max_deferral(Duration::from_secs(s.max_deferral_secs))
            .with_retry(RetryPolicy::ExponentialBackoff {
                max_attempts: s.max_attempts,
                initial_delay: Duration::from_millis(s.retry_initial_delay_ms),
                max_delay: Duration::from_secs(s.retry_max_delay_secs),
                multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            })
    }

    pub fn profiler_config(&self) -> ProfilerConfig {
        ProfilerConfig {
            probe_window: Duration::from_millis(self.profiler.probe_window_ms),
            high_tier_frame_ms: self.profiler.high_tier_frame_ms,
            mid_tier_frame_ms: self.profiler.mid_tier_frame_ms,
        }
    }

    /// Build and validate the full session configuration.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let lod = self.lod_config();
        lod.validate().map_err(ConfigError::Invalid)?;
        let quality = self.quality_config();
        quality.validate().map_err(ConfigError::Invalid)?;

        let mut config = SessionConfig::new()
            .with_lod(lod)
            .with_quality(quality)
            .with_stream(self.stream_config())
            .with_idle_move_epsilon(self.session.idle_move_epsilon);
        config.loss_threshold = self.session.loss_threshold;
        config.loss_window = Duration::from_secs(self.session.loss_window_secs);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_component_defaults() {
        let config = ConfigFile::default();
        assert_eq!(config.lod_config(), LodConfig::default());
        assert_eq!(config.stream_config().retry, RetryPolicy::default());
        assert_eq!(config.stream_config().capacity_bytes, DEFAULT_CAPACITY_BYTES);
        assert!(config.session_config().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let text = "\
[lod]
tissue_distance = 0.4
hysteresis = 0.05

[quality]
initial_preset = performance

[stream]
capacity = 128 MB
asset_source = /srv/anatomy

[logging]
level = debug
";
        let config = ConfigFile::from_ini_str(text).unwrap();
        assert_eq!(config.lod.tissue_distance, 0.4);
        assert_eq!(config.lod.hysteresis, 0.05);
        assert_eq!(config.lod.organ_distance, DEFAULT_ORGAN_DISTANCE);
        assert_eq!(config.quality.initial_preset, Some(QualityPreset::Performance));
        assert_eq!(config.stream.capacity, 128 * 1024 * 1024);
        assert_eq!(config.stream.asset_source.as_deref(), Some("/srv/anatomy"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let text = "[lod]\nfavourite_colour = teal\n[extras]\nfoo = bar\n";
        assert_eq!(ConfigFile::from_ini_str(text).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_malformed_value_rejected() {
        let err = ConfigFile::from_ini_str("[lod]\nnear_radius = close\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(err.to_string().contains("lod.near_radius"));
    }

    #[test]
    fn test_incoherent_thresholds_fail_validation() {
        let mut config = ConfigFile::default();
        config.lod.organ_distance = 0.1;
        assert!(matches!(config.session_config(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.stream.capacity = 64 * 1024 * 1024;
        config.quality.initial_preset = Some(QualityPreset::Quality);
        config.logging.file = Some(PathBuf::from("/tmp/lodstream.log"));
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
