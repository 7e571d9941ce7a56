//! Adaptive quality controller.
//!
//! Drives the selected [`QualityPreset`] from the smoothed frame rate.
//!
//! # State Machine
//!
//! ```text
//!            fps < low                      sustained >= downgrade_sustain
//!  Steady ─────────────► Degrading ─────────────────────────────────────► step down
//!    ▲  ◄──────────────── (fps recovers)                                  (cooldown)
//!    │       fps > high                     sustained >= upgrade_sustain
//!    └─────────────────► Recovering ────────────────────────────────────► step up
//! ```
//!
//! Steps never skip a preset, never exceed the device ceiling, and at most one
//! change happens per cooldown window. A manual preset suspends automatic
//! control for `override_hold_ms`. Until the sampler holds `min_samples`
//! frames the controller keeps its current preset and takes no action.

use std::fmt;

use super::config::QualityConfig;
use super::preset::{QualityPreset, QualitySettings};
use super::sampler::FrameTimeSampler;
use crate::device::{self, DeviceProfile};

/// Why the preset changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Smoothed FPS stayed below the low threshold.
    LowFrameRate,
    /// Smoothed FPS stayed above the high threshold.
    HighFrameRate,
    /// The user selected a preset.
    Manual,
    /// On-screen assets alone exceed the memory budget.
    BudgetPressure,
    /// Repeated renderer resource loss forced the cheapest preset.
    MemoryReduction,
    /// A new device profile lowered the ceiling.
    DeviceCeiling,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeReason::LowFrameRate => "low frame rate",
            ChangeReason::HighFrameRate => "frame rate headroom",
            ChangeReason::Manual => "manual override",
            ChangeReason::BudgetPressure => "memory budget pressure",
            ChangeReason::MemoryReduction => "memory reduction mode",
            ChangeReason::DeviceCeiling => "device ceiling",
        };
        f.write_str(s)
    }
}

/// A preset transition reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetChange {
    pub from: QualityPreset,
    pub to: QualityPreset,
    pub reason: ChangeReason,
    /// Controller clock when the change happened (ms of frame time).
    pub at_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Trend {
    Steady,
    Degrading { since_ms: f64 },
    Recovering { since_ms: f64 },
}

/// Closed-loop controller over quality presets.
#[derive(Debug)]
pub struct AdaptiveQualityController {
    config: QualityConfig,
    sampler: FrameTimeSampler,
    device: DeviceProfile,
    preset: QualityPreset,
    ceiling: QualityPreset,
    trend: Trend,
    last_change_ms: Option<f64>,
    override_until_ms: Option<f64>,
    memory_reduction: bool,
    pixel_density: f32,
    frames_since_density_step: u32,
}

impl AdaptiveQualityController {
    /// Create a controller seeded from the device profile.
    pub fn new(config: QualityConfig, device: DeviceProfile) -> Self {
        let preset = device::initial_preset(&device);
        let ceiling = device::preset_ceiling(&device);
        let sampler = FrameTimeSampler::new(config.sampler_capacity);
        let pixel_density = preset.settings().clamped_to(&device).pixel_density.max;
        Self {
            config,
            sampler,
            device,
            preset,
            ceiling,
            trend: Trend::Steady,
            last_change_ms: None,
            override_until_ms: None,
            memory_reduction: false,
            pixel_density,
            frames_since_density_step: 0,
        }
    }

    /// Create a controller starting from an explicit preset.
    ///
    /// The preset is clamped to the device ceiling.
    pub fn with_initial_preset(
        config: QualityConfig,
        device: DeviceProfile,
        preset: QualityPreset,
    ) -> Self {
        let mut controller = Self::new(config, device);
        controller.preset = preset.min(controller.ceiling);
        controller.pixel_density = controller.settings().pixel_density.max;
        controller
    }

    /// Feed one frame duration. Returns the preset change it caused, if any.
    pub fn on_frame(&mut self, frame_ms: f32) -> Option<PresetChange> {
        self.sampler.record(frame_ms);
        let now = self.sampler.clock_ms();

        if self.sampler.len() < self.config.min_samples {
            return None;
        }
        let fps = self.sampler.smoothed_fps()?;

        self.adjust_pixel_density(fps);

        if let Some(until) = self.override_until_ms {
            if now < until {
                self.trend = Trend::Steady;
                return None;
            }
            self.override_until_ms = None;
            tracing::info!(preset = %self.preset, "Manual quality override expired, resuming automatic control");
        }

        self.trend = if fps < self.config.low_fps_threshold {
            match self.trend {
                Trend::Degrading { since_ms } => Trend::Degrading { since_ms },
                _ => Trend::Degrading { since_ms: now },
            }
        } else if fps > self.config.high_fps_threshold {
            match self.trend {
                Trend::Recovering { since_ms } => Trend::Recovering { since_ms },
                _ => Trend::Recovering { since_ms: now },
            }
        } else {
            Trend::Steady
        };

        match self.trend {
            Trend::Degrading { since_ms } if now - since_ms >= self.config.downgrade_sustain_ms => {
                let target = self.preset.downgrade();
                self.step_to(target, ChangeReason::LowFrameRate, now, fps)
            }
            Trend::Recovering { since_ms } if now - since_ms >= self.config.upgrade_sustain_ms => {
                let target = self.preset.upgrade().min(self.ceiling);
                self.step_to(target, ChangeReason::HighFrameRate, now, fps)
            }
            _ => None,
        }
    }

    fn cooldown_elapsed(&self, now: f64) -> bool {
        self.last_change_ms
            .map(|last| now - last >= self.config.cooldown_ms)
            .unwrap_or(true)
    }

    fn step_to(
        &mut self,
        target: QualityPreset,
        reason: ChangeReason,
        now: f64,
        fps: f32,
    ) -> Option<PresetChange> {
        if target == self.preset || !self.cooldown_elapsed(now) {
            return None;
        }
        let change = self.apply(target, reason, now);
        tracing::info!(
            from = %change.from,
            to = %change.to,
            reason = %reason,
            fps = format!("{:.1}", fps),
            "Quality preset changed"
        );
        Some(change)
    }

    fn apply(&mut self, target: QualityPreset, reason: ChangeReason, now: f64) -> PresetChange {
        let from = self.preset;
        self.preset = target;
        self.last_change_ms = Some(now);
        self.trend = Trend::Steady;
        // Measurements taken under the old preset say nothing about the new one.
        self.sampler.clear();
        self.pixel_density = self.settings().pixel_density.clamp(self.pixel_density);
        self.frames_since_density_step = 0;
        PresetChange {
            from,
            to: target,
            reason,
            at_ms: now,
        }
    }

    fn adjust_pixel_density(&mut self, fps: f32) {
        self.frames_since_density_step += 1;
        if self.frames_since_density_step < self.config.density_interval_frames {
            return;
        }
        self.frames_since_density_step = 0;

        let range = self.settings().pixel_density;
        let next = if fps < self.config.low_fps_threshold {
            self.pixel_density - self.config.density_step
        } else if fps > self.config.high_fps_threshold {
            self.pixel_density + self.config.density_step
        } else {
            self.pixel_density
        };
        let next = range.clamp(next);
        if (next - self.pixel_density).abs() > f32::EPSILON {
            tracing::debug!(
                from = self.pixel_density,
                to = next,
                fps = format!("{:.1}", fps),
                "Pixel density adjusted"
            );
            self.pixel_density = next;
        }
    }

    /// Select a preset manually.
    ///
    /// Automatic control is suspended for `override_hold_ms` of frame time.
    /// The manual choice is honoured even above the device ceiling, except in
    /// memory reduction mode.
    pub fn set_preset(&mut self, preset: QualityPreset) -> Option<PresetChange> {
        let now = self.sampler.clock_ms();
        let preset = if self.memory_reduction {
            QualityPreset::Performance
        } else {
            preset
        };
        self.override_until_ms = Some(now + self.config.override_hold_ms);
        self.trend = Trend::Steady;
        if preset == self.preset {
            return None;
        }
        let change = self.apply(preset, ChangeReason::Manual, now);
        tracing::info!(from = %change.from, to = %change.to, "Quality preset set manually");
        Some(change)
    }

    /// Shed detail because on-screen assets alone exceed the memory budget.
    ///
    /// Bypasses the sustain window but still honours the cooldown.
    pub fn shed_detail(&mut self) -> Option<PresetChange> {
        let now = self.sampler.clock_ms();
        let target = self.preset.downgrade();
        if target == self.preset || !self.cooldown_elapsed(now) {
            return None;
        }
        let change = self.apply(target, ChangeReason::BudgetPressure, now);
        tracing::warn!(from = %change.from, to = %change.to, "Shedding detail under memory pressure");
        Some(change)
    }

    /// Lock the controller to the cheapest preset for the rest of the session.
    pub fn enter_memory_reduction(&mut self) -> Option<PresetChange> {
        if self.memory_reduction {
            return None;
        }
        self.memory_reduction = true;
        self.ceiling = QualityPreset::Performance;
        self.override_until_ms = None;
        let now = self.sampler.clock_ms();
        if self.preset == QualityPreset::Performance {
            return None;
        }
        Some(self.apply(QualityPreset::Performance, ChangeReason::MemoryReduction, now))
    }

    /// Replace the device profile after a re-probe.
    pub fn set_device(&mut self, device: DeviceProfile) -> Option<PresetChange> {
        self.device = device;
        if !self.memory_reduction {
            self.ceiling = device::preset_ceiling(&device);
        }
        self.pixel_density = self.settings().pixel_density.clamp(self.pixel_density);
        if self.preset > self.ceiling && self.override_until_ms.is_none() {
            let now = self.sampler.clock_ms();
            return Some(self.apply(self.ceiling, ChangeReason::DeviceCeiling, now));
        }
        None
    }

    pub fn current_preset(&self) -> QualityPreset {
        self.preset
    }

    pub fn ceiling(&self) -> QualityPreset {
        self.ceiling
    }

    /// Renderer knobs for the current preset, clamped to the device.
    pub fn settings(&self) -> QualitySettings {
        self.preset.settings().clamped_to(&self.device)
    }

    /// Current adaptive pixel density within the preset's range.
    pub fn pixel_density(&self) -> f32 {
        self.pixel_density
    }

    pub fn smoothed_fps(&self) -> Option<f32> {
        self.sampler.smoothed_fps()
    }

    pub fn is_overridden(&self) -> bool {
        self.override_until_ms
            .map(|until| self.sampler.clock_ms() < until)
            .unwrap_or(false)
    }

    pub fn in_memory_reduction(&self) -> bool {
        self.memory_reduction
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    /// Controller clock in ms of accumulated frame time.
    pub fn clock_ms(&self) -> f64 {
        self.sampler.clock_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{GpuTier, ShaderPrecision};

    fn device(tier: GpuTier) -> DeviceProfile {
        DeviceProfile {
            tier,
            max_pixel_density: tier.pixel_density_cap(),
            precision: ShaderPrecision::High,
            constrained_mobile: false,
            conservative: false,
        }
    }

    fn balanced_controller(config: QualityConfig) -> AdaptiveQualityController {
        AdaptiveQualityController::with_initial_preset(
            config,
            device(GpuTier::High),
            QualityPreset::Balanced,
        )
    }

    fn feed(
        controller: &mut AdaptiveQualityController,
        frame_ms: f32,
        frames: usize,
    ) -> Vec<PresetChange> {
        (0..frames).filter_map(|_| controller.on_frame(frame_ms)).collect()
    }

    #[test]
    fn test_initial_preset_from_device() {
        let c = AdaptiveQualityController::new(QualityConfig::default(), device(GpuTier::Mid));
        assert_eq!(c.current_preset(), QualityPreset::Balanced);
        assert_eq!(c.ceiling(), QualityPreset::Quality);
    }

    #[test]
    fn test_holds_during_warmup() {
        let mut c = balanced_controller(QualityConfig::default());
        // Fewer than min_samples terrible frames: no action.
        let changes = feed(&mut c, 200.0, QualityConfig::default().min_samples - 1);
        assert!(changes.is_empty());
        assert_eq!(c.current_preset(), QualityPreset::Balanced);
    }

    #[test]
    fn test_sustained_high_fps_upgrades_exactly_once() {
        let mut c = balanced_controller(QualityConfig::default());
        let changes = feed(&mut c, 10.0, 3_000); // 30s at 100 FPS
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from, QualityPreset::Balanced);
        assert_eq!(changes[0].to, QualityPreset::Quality);
        assert_eq!(changes[0].reason, ChangeReason::HighFrameRate);
        assert_eq!(c.current_preset(), QualityPreset::Quality);
    }

    #[test]
    fn test_sustained_low_fps_downgrades_exactly_once() {
        let mut c = balanced_controller(QualityConfig::default());
        let changes = feed(&mut c, 50.0, 600); // 30s at 20 FPS
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].to, QualityPreset::Performance);
        assert_eq!(c.current_preset(), QualityPreset::Performance);
    }

    #[test]
    fn test_brief_dip_does_not_downgrade() {
        let mut c = balanced_controller(QualityConfig::default());
        feed(&mut c, 20.0, 60);
        // 500ms of slow frames is shorter than the 1s sustain window, and the
        // smoothed FPS does not stay low long enough.
        feed(&mut c, 50.0, 10);
        let changes = feed(&mut c, 20.0, 200);
        assert!(changes.is_empty());
        assert_eq!(c.current_preset(), QualityPreset::Balanced);
    }

    #[test]
    fn test_downgrade_never_skips_a_step() {
        let mut c = AdaptiveQualityController::with_initial_preset(
            QualityConfig::default(),
            device(GpuTier::High),
            QualityPreset::Quality,
        );
        let changes = feed(&mut c, 100.0, 1_000);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].to, QualityPreset::Balanced);
        assert_eq!(changes[1].to, QualityPreset::Performance);
        assert!(changes[1].at_ms - changes[0].at_ms >= QualityConfig::default().cooldown_ms);
    }

    #[test]
    fn test_low_tier_never_upgrades_to_quality() {
        let mut c = AdaptiveQualityController::new(QualityConfig::default(), device(GpuTier::Low));
        assert_eq!(c.current_preset(), QualityPreset::Performance);
        feed(&mut c, 5.0, 20_000);
        assert_eq!(c.current_preset(), QualityPreset::Balanced);
    }

    #[test]
    fn test_oscillation_bounded_by_cooldown() {
        let config = QualityConfig::default()
            .with_min_samples(5)
            .with_sustain_ms(200.0, 200.0)
            .with_cooldown_ms(5_000.0);
        let config = QualityConfig {
            sampler_capacity: 5,
            ..config
        };
        let mut c = AdaptiveQualityController::with_initial_preset(
            config.clone(),
            device(GpuTier::High),
            QualityPreset::Balanced,
        );

        let mut changes = Vec::new();
        for _ in 0..15 {
            changes.extend(feed(&mut c, 10.0, 100)); // 1s fast
            changes.extend(feed(&mut c, 50.0, 20)); // 1s slow
        }

        assert!(!changes.is_empty());
        for pair in changes.windows(2) {
            assert!(
                pair[1].at_ms - pair[0].at_ms >= config.cooldown_ms,
                "changes at {} and {} are closer than the cooldown",
                pair[0].at_ms,
                pair[1].at_ms
            );
        }
    }

    #[test]
    fn test_manual_override_suspends_auto_control() {
        let mut c = balanced_controller(QualityConfig::default());
        let change = c.set_preset(QualityPreset::Quality).unwrap();
        assert_eq!(change.reason, ChangeReason::Manual);
        assert!(c.is_overridden());

        // 5s of bad frames inside the 10s hold: nothing happens.
        let changes = feed(&mut c, 50.0, 100);
        assert!(changes.is_empty());
        assert_eq!(c.current_preset(), QualityPreset::Quality);

        // Once the hold expires, automatic control downgrades.
        let changes = feed(&mut c, 50.0, 400);
        assert!(!changes.is_empty());
        assert_eq!(changes[0].to, QualityPreset::Balanced);
    }

    #[test]
    fn test_manual_same_preset_returns_none() {
        let mut c = balanced_controller(QualityConfig::default());
        assert!(c.set_preset(QualityPreset::Balanced).is_none());
        assert!(c.is_overridden());
    }

    #[test]
    fn test_shed_detail_respects_cooldown() {
        let mut c = balanced_controller(QualityConfig::default());
        let first = c.shed_detail().unwrap();
        assert_eq!(first.to, QualityPreset::Performance);
        assert!(c.shed_detail().is_none());
    }

    #[test]
    fn test_memory_reduction_locks_performance() {
        let mut c = balanced_controller(QualityConfig::default());
        let change = c.enter_memory_reduction().unwrap();
        assert_eq!(change.reason, ChangeReason::MemoryReduction);
        assert_eq!(c.ceiling(), QualityPreset::Performance);
        assert!(c.set_preset(QualityPreset::Quality).is_none());
        assert_eq!(c.current_preset(), QualityPreset::Performance);

        feed(&mut c, 5.0, 10_000);
        assert_eq!(c.current_preset(), QualityPreset::Performance);
    }

    #[test]
    fn test_reprobe_lowers_ceiling() {
        let mut c = AdaptiveQualityController::with_initial_preset(
            QualityConfig::default(),
            device(GpuTier::High),
            QualityPreset::Quality,
        );
        let change = c.set_device(device(GpuTier::Low)).unwrap();
        assert_eq!(change.to, QualityPreset::Balanced);
        assert_eq!(change.reason, ChangeReason::DeviceCeiling);
    }

    #[test]
    fn test_pixel_density_tracks_fps_within_range() {
        let mut c = balanced_controller(QualityConfig::default().with_cooldown_ms(1e12));
        let range = c.settings().pixel_density;
        assert_eq!(c.pixel_density(), range.max);

        // First downgrade consumes the cooldown; afterwards only density moves.
        feed(&mut c, 45.0, 2_000);
        let range = c.settings().pixel_density;
        assert!(c.pixel_density() <= range.max);
        assert!(c.pixel_density() >= range.min);
        assert!((c.pixel_density() - range.min).abs() < 1e-4);
    }
}
