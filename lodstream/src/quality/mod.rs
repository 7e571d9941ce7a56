//! Adaptive rendering quality.
//!
//! ```text
//! frame times ──► FrameTimeSampler ──► smoothed FPS
//!                                         │
//!                                         ▼
//!                        AdaptiveQualityController ──► QualityPreset ──► QualitySettings
//!                                         ▲                                  │
//!        shed_detail() / memory reduction ┘                                  ▼
//!                                                               renderer knobs, max LOD,
//!                                                               memory budget fraction
//! ```

mod config;
mod context_loss;
mod controller;
mod preset;
mod sampler;

pub use config::{
    QualityConfig, DEFAULT_COOLDOWN_MS, DEFAULT_DENSITY_INTERVAL_FRAMES, DEFAULT_DENSITY_STEP,
    DEFAULT_DOWNGRADE_SUSTAIN_MS, DEFAULT_HIGH_FPS_THRESHOLD, DEFAULT_LOW_FPS_THRESHOLD,
    DEFAULT_MIN_SAMPLES, DEFAULT_OVERRIDE_HOLD_MS, DEFAULT_UPGRADE_SUSTAIN_MS,
};
pub use context_loss::{
    ContextLossTracker, LossVerdict, DEFAULT_LOSS_THRESHOLD, DEFAULT_LOSS_WINDOW,
};
pub use controller::{AdaptiveQualityController, ChangeReason, PresetChange};
pub use preset::{AntialiasMode, PixelDensityRange, QualityPreset, QualitySettings};
pub use sampler::{FrameTimeSample, FrameTimeSampler, DEFAULT_SAMPLER_CAPACITY, MAX_FRAME_MS};
