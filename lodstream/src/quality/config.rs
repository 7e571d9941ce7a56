//! Configuration for adaptive quality control.
//!
//! All windows are measured in accumulated frame time (the sum of reported
//! frame durations), so the controller behaves identically whether it is fed
//! by a live render loop or a synthetic trace.

use super::sampler::DEFAULT_SAMPLER_CAPACITY;

/// Smoothed FPS below which the controller considers the frame rate too low.
pub const DEFAULT_LOW_FPS_THRESHOLD: f32 = 30.0;

/// Smoothed FPS above which the controller considers there is headroom.
pub const DEFAULT_HIGH_FPS_THRESHOLD: f32 = 55.0;

/// How long FPS must stay low before downgrading (ms of frame time).
pub const DEFAULT_DOWNGRADE_SUSTAIN_MS: f64 = 1_000.0;

/// How long FPS must stay high before upgrading (ms of frame time).
pub const DEFAULT_UPGRADE_SUSTAIN_MS: f64 = 3_000.0;

/// Minimum time between two preset changes (ms of frame time).
pub const DEFAULT_COOLDOWN_MS: f64 = 5_000.0;

/// How long a manual preset is respected before auto control resumes.
pub const DEFAULT_OVERRIDE_HOLD_MS: f64 = 10_000.0;

/// Samples required before the controller takes any action.
pub const DEFAULT_MIN_SAMPLES: usize = 30;

/// Pixel density adjustment per step.
pub const DEFAULT_DENSITY_STEP: f32 = 0.1;

/// Frames between pixel density adjustments.
pub const DEFAULT_DENSITY_INTERVAL_FRAMES: u32 = 30;

/// Tunables for [`AdaptiveQualityController`](super::AdaptiveQualityController).
#[derive(Debug, Clone)]
pub struct QualityConfig {
    pub low_fps_threshold: f32,
    pub high_fps_threshold: f32,
    pub downgrade_sustain_ms: f64,
    pub upgrade_sustain_ms: f64,
    pub cooldown_ms: f64,
    pub override_hold_ms: f64,
    pub min_samples: usize,
    /// Frame-time ring capacity.
    pub sampler_capacity: usize,
    pub density_step: f32,
    pub density_interval_frames: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            low_fps_threshold: DEFAULT_LOW_FPS_THRESHOLD,
            high_fps_threshold: DEFAULT_HIGH_FPS_THRESHOLD,
            downgrade_sustain_ms: DEFAULT_DOWNGRADE_SUSTAIN_MS,
            upgrade_sustain_ms: DEFAULT_UPGRADE_SUSTAIN_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            override_hold_ms: DEFAULT_OVERRIDE_HOLD_MS,
            min_samples: DEFAULT_MIN_SAMPLES,
            sampler_capacity: DEFAULT_SAMPLER_CAPACITY,
            density_step: DEFAULT_DENSITY_STEP,
            density_interval_frames: DEFAULT_DENSITY_INTERVAL_FRAMES,
        }
    }
}

impl QualityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, low_fps: f32, high_fps: f32) -> Self {
        self.low_fps_threshold = low_fps;
        self.high_fps_threshold = high_fps;
        self
    }

    pub fn with_sustain_ms(mut self, downgrade: f64, upgrade: f64) -> Self {
        self.downgrade_sustain_ms = downgrade;
        self.upgrade_sustain_ms = upgrade;
        self
    }

    pub fn with_cooldown_ms(mut self, cooldown: f64) -> Self {
        self.cooldown_ms = cooldown;
        self
    }

    pub fn with_override_hold_ms(mut self, hold: f64) -> Self {
        self.override_hold_ms = hold;
        self
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Check that the thresholds and windows are coherent.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.low_fps_threshold > 0.0 && self.low_fps_threshold < self.high_fps_threshold) {
            return Err(format!(
                "low_fps_threshold ({}) must be positive and below high_fps_threshold ({})",
                self.low_fps_threshold, self.high_fps_threshold
            ));
        }
        if self.sampler_capacity == 0 {
            return Err("sampler_capacity must be at least 1".to_string());
        }
        if self.min_samples > self.sampler_capacity {
            return Err(format!(
                "min_samples ({}) exceeds sampler_capacity ({})",
                self.min_samples, self.sampler_capacity
            ));
        }
        if self.downgrade_sustain_ms < 0.0 || self.upgrade_sustain_ms < 0.0 || self.cooldown_ms < 0.0
        {
            return Err("sustain windows and cooldown must not be negative".to_string());
        }
        Ok(())
    }
}
