//! Per-frame glue between the quality controller, the LOD evaluator and the
//! stream manager.
//!
//! A [`LodSession`] owns one instance of each component. The host calls
//! [`tick`](LodSession::tick) once per rendered frame:
//!
//! ```text
//! frame_ms ──► AdaptiveQualityController ──► preset change?
//!                                              │ max_detail ──► LodEvaluator
//!                                              │ budget     ──► AssetStreamManager
//! camera, focus ──► LodEvaluator ──► DesiredState ──► reconcile
//!                                                       │
//!                     drain_completions ◄───────────────┘
//!                             │ pressure ──► shed_detail
//! ```
//!
//! Evaluation is skipped while the camera is idle and nothing else changed;
//! completions and retry timers are serviced on every tick regardless.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use tokio::runtime::Handle;

use crate::catalog::{Catalog, DetailLevel, RegionId, SystemTag};
use crate::device::{DeviceCapabilityProfiler, DeviceProfile};
use crate::error::LodError;
use crate::lod::{LodConfig, LodEvaluator};
use crate::quality::{
    AdaptiveQualityController, ContextLossTracker, LossVerdict, PresetChange, QualityConfig,
    QualityPreset, QualitySettings, DEFAULT_LOSS_THRESHOLD, DEFAULT_LOSS_WINDOW,
};
use crate::stream::{
    AssetLoader, AssetStreamManager, MemoryUsage, PendingLoad, ReconcileReport, RegionStatus,
    StreamConfig, StreamEvent, StreamSnapshot,
};

/// Default camera movement (scene units) below which a frame counts as idle.
pub const DEFAULT_IDLE_MOVE_EPSILON: f32 = 0.01;

/// Configuration for a [`LodSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub lod: LodConfig,
    pub quality: QualityConfig,
    pub stream: StreamConfig,
    pub idle_move_epsilon: f32,
    /// Renderer resource losses tolerated within `loss_window`.
    pub loss_threshold: usize,
    pub loss_window: std::time::Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lod: LodConfig::default(),
            quality: QualityConfig::default(),
            stream: StreamConfig::default(),
            idle_move_epsilon: DEFAULT_IDLE_MOVE_EPSILON,
            loss_threshold: DEFAULT_LOSS_THRESHOLD,
            loss_window: DEFAULT_LOSS_WINDOW,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lod(mut self, lod: LodConfig) -> Self {
        self.lod = lod;
        self
    }

    pub fn with_quality(mut self, quality: QualityConfig) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_idle_move_epsilon(mut self, epsilon: f32) -> Self {
        self.idle_move_epsilon = epsilon;
        self
    }
}

/// Inputs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInput {
    /// Duration of the frame just rendered.
    pub frame_ms: f32,
    pub camera: Vec3,
    pub focus: Option<RegionId>,
}

impl FrameInput {
    pub fn new(frame_ms: f32, camera: Vec3) -> Self {
        Self {
            frame_ms,
            camera,
            focus: None,
        }
    }

    pub fn with_focus(mut self, focus: impl Into<RegionId>) -> Self {
        self.focus = Some(focus.into());
        self
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Preset changes applied this tick (frame-rate driven or shed).
    pub preset_changes: Vec<PresetChange>,
    /// Report of the reconcile, when the desired state was re-evaluated.
    pub reconcile: Option<ReconcileReport>,
    /// Stream events since the previous tick.
    pub events: Vec<StreamEvent>,
}

impl TickOutcome {
    pub fn evaluated(&self) -> bool {
        self.reconcile.is_some()
    }
}

/// Read-only view of the whole session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub preset: QualityPreset,
    pub settings: QualitySettings,
    pub pixel_density: f32,
    pub smoothed_fps: Option<f32>,
    pub memory_reduction: bool,
    pub device: DeviceProfile,
    pub stream: StreamSnapshot,
}

/// Owns the quality controller, the LOD evaluator and the stream manager for
/// one viewer session.
pub struct LodSession {
    config: SessionConfig,
    profiler: DeviceCapabilityProfiler,
    controller: AdaptiveQualityController,
    evaluator: LodEvaluator,
    stream: AssetStreamManager,
    losses: ContextLossTracker,
    enabled: HashSet<SystemTag>,
    last_camera: Option<Vec3>,
    last_focus: Option<RegionId>,
    dirty: bool,
    evaluations: u64,
}

impl std::fmt::Debug for LodSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LodSession")
            .field("preset", &self.controller.current_preset())
            .field("enabled", &self.enabled.len())
            .field("evaluations", &self.evaluations)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

impl LodSession {
    /// Probe the device and build every component.
    ///
    /// All systems in the catalog start enabled. Loads are spawned on
    /// `runtime`.
    pub fn new(
        config: SessionConfig,
        catalog: Arc<Catalog>,
        loader: Arc<dyn AssetLoader>,
        profiler: DeviceCapabilityProfiler,
        runtime: Handle,
    ) -> Self {
        let device = profiler.probe();
        let controller = AdaptiveQualityController::new(config.quality.clone(), device);
        Self::assemble(config, catalog, loader, profiler, controller, runtime)
    }

    /// Build a session starting from an explicit preset.
    pub fn with_initial_preset(
        config: SessionConfig,
        catalog: Arc<Catalog>,
        loader: Arc<dyn AssetLoader>,
        profiler: DeviceCapabilityProfiler,
        preset: QualityPreset,
        runtime: Handle,
    ) -> Self {
        let device = profiler.probe();
        let controller =
            AdaptiveQualityController::with_initial_preset(config.quality.clone(), device, preset);
        Self::assemble(config, catalog, loader, profiler, controller, runtime)
    }

    fn assemble(
        config: SessionConfig,
        catalog: Arc<Catalog>,
        loader: Arc<dyn AssetLoader>,
        profiler: DeviceCapabilityProfiler,
        controller: AdaptiveQualityController,
        runtime: Handle,
    ) -> Self {
        let enabled = catalog.systems().into_iter().collect();
        let evaluator = LodEvaluator::new(config.lod.clone(), Arc::clone(&catalog));
        let stream = AssetStreamManager::new(config.stream.clone(), catalog, loader, runtime);
        let losses = ContextLossTracker::new(config.loss_threshold, config.loss_window);

        let mut session = Self {
            config,
            profiler,
            controller,
            evaluator,
            stream,
            losses,
            enabled,
            last_camera: None,
            last_focus: None,
            dirty: true,
            evaluations: 0,
        };
        session.couple();
        tracing::info!(
            preset = %session.controller.current_preset(),
            ceiling = %session.controller.ceiling(),
            max_detail = %session.evaluator.max_detail(),
            budget = session.stream.memory_usage().capacity_bytes,
            "LOD session started"
        );
        session
    }

    /// Run one frame: quality control, (maybe) evaluation and reconcile, then
    /// completions.
    pub fn tick(&mut self, input: &FrameInput) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if let Some(change) = self.controller.on_frame(input.frame_ms) {
            self.apply(change, &mut outcome);
        }

        if self.needs_evaluation(input) {
            let desired = self
                .evaluator
                .evaluate(input.camera, input.focus.as_ref(), &self.enabled);
            for transition in desired.transitions() {
                tracing::debug!(
                    region = %transition.region,
                    from = %transition.from,
                    to = %transition.to,
                    kind = ?transition.kind(),
                    "Detail tier changed"
                );
            }
            outcome.reconcile = Some(self.stream.reconcile(&desired));
            self.last_camera = Some(input.camera);
            self.last_focus = input.focus.clone();
            self.dirty = false;
            self.evaluations += 1;
        }

        outcome.events = self.stream.drain_completions();

        if self.stream.under_pressure() {
            if let Some(change) = self.controller.shed_detail() {
                self.apply(change, &mut outcome);
            }
        }
        outcome
    }

    fn needs_evaluation(&self, input: &FrameInput) -> bool {
        if self.dirty || self.last_focus != input.focus {
            return true;
        }
        match self.last_camera {
            Some(last) => last.distance(input.camera) >= self.config.idle_move_epsilon,
            None => true,
        }
    }

    fn apply(&mut self, change: PresetChange, outcome: &mut TickOutcome) {
        self.couple();
        self.dirty = true;
        outcome.preset_changes.push(change);
    }

    /// Push the current preset's detail ceiling and budget to the evaluator
    /// and the stream manager.
    fn couple(&mut self) {
        let settings = self.controller.settings();
        self.evaluator.set_max_detail(settings.max_detail);
        let fraction = f64::from(settings.budget_fraction.clamp(0.0, 1.0));
        let capacity = (self.config.stream.capacity_bytes as f64 * fraction) as u64;
        self.stream.set_capacity(capacity);
    }

    /// Renderer resources were lost. Every asset is dropped and re-streamed;
    /// repeated losses switch the session into memory reduction mode.
    pub fn on_context_lost(&mut self, at: Instant) -> LossVerdict {
        let verdict = self.losses.record(at);
        let invalidated = self.stream.invalidate_all();
        tracing::warn!(
            error = %LodError::RendererResourceLoss { invalidated },
            recent = self.losses.recent(),
            "Renderer context lost"
        );
        if verdict == LossVerdict::ReduceMemory {
            self.controller.enter_memory_reduction();
            self.couple();
            self.dirty = true;
        }
        verdict
    }

    /// Select a preset manually, suspending automatic control for the
    /// override hold.
    pub fn set_preset(&mut self, preset: QualityPreset) -> Option<PresetChange> {
        let change = self.controller.set_preset(preset)?;
        self.couple();
        self.dirty = true;
        Some(change)
    }

    /// Re-run the device probe and apply the new ceiling.
    pub fn reprobe(&mut self) -> DeviceProfile {
        let device = self.profiler.probe();
        if self.controller.set_device(device).is_some() {
            self.couple();
        }
        self.dirty = true;
        device
    }

    pub fn set_enabled_systems(&mut self, systems: HashSet<SystemTag>) {
        if systems != self.enabled {
            self.enabled = systems;
            self.dirty = true;
        }
    }

    pub fn enable_system(&mut self, system: SystemTag) {
        if self.enabled.insert(system) {
            self.dirty = true;
        }
    }

    pub fn disable_system(&mut self, system: &SystemTag) {
        if self.enabled.remove(system) {
            self.dirty = true;
        }
    }

    pub fn enabled_systems(&self) -> &HashSet<SystemTag> {
        &self.enabled
    }

    /// Wait for every in-flight load and process the results.
    pub async fn settle(&mut self) -> Vec<StreamEvent> {
        self.stream.settle().await
    }

    pub fn current_detail_levels(&self) -> BTreeMap<RegionId, DetailLevel> {
        self.stream.current_detail_levels()
    }

    pub fn memory_usage(&self) -> MemoryUsage {
        self.stream.memory_usage()
    }

    pub fn pending_loads(&self) -> Vec<PendingLoad> {
        self.stream.pending_loads()
    }

    pub fn current_preset(&self) -> QualityPreset {
        self.controller.current_preset()
    }

    pub fn quality_settings(&self) -> QualitySettings {
        self.controller.settings()
    }

    pub fn pixel_density(&self) -> f32 {
        self.controller.pixel_density()
    }

    pub fn region_status(&self, id: &str) -> RegionStatus {
        self.stream.region_status(id)
    }

    pub fn unavailable_regions(&self) -> Vec<RegionId> {
        self.stream.unavailable_regions()
    }

    /// Number of evaluate-and-reconcile passes run so far.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            preset: self.controller.current_preset(),
            settings: self.controller.settings(),
            pixel_density: self.controller.pixel_density(),
            smoothed_fps: self.controller.smoothed_fps(),
            memory_reduction: self.controller.in_memory_reduction(),
            device: *self.controller.device(),
            stream: self.stream.snapshot(),
        }
    }

    pub fn controller(&self) -> &AdaptiveQualityController {
        &self.controller
    }

    pub fn evaluator(&self) -> &LodEvaluator {
        &self.evaluator
    }

    pub fn stream(&self) -> &AssetStreamManager {
        &self.stream
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DetailLevel::{Organ, Region, Tissue};
    use crate::device::StaticSignals;
    use crate::testing::{catalog, full_region, ScriptedLoader, MB};
    use std::time::Duration;

    fn high_end() -> DeviceCapabilityProfiler {
        let signals = StaticSignals::unavailable()
            .with_benchmark(3.0, Duration::from_millis(50))
            .with_pixel_ratio(2.0)
            .with_high_precision(true);
        DeviceCapabilityProfiler::with_defaults(Arc::new(signals))
    }

    fn session(loader: &ScriptedLoader, preset: QualityPreset) -> LodSession {
        let regions = vec![
            full_region("heart", "cardio", Vec3::ZERO, [MB, 2 * MB, 4 * MB, 8 * MB]),
            full_region(
                "femur",
                "skeletal",
                Vec3::new(0.0, -3.0, 0.0),
                [MB, 2 * MB, 4 * MB, 8 * MB],
            ),
        ];
        let config = SessionConfig::default()
            .with_stream(StreamConfig::default().with_capacity_bytes(64 * MB));
        LodSession::with_initial_preset(
            config,
            catalog(regions),
            Arc::new(loader.clone()),
            high_end(),
            preset,
            Handle::current(),
        )
    }

    #[tokio::test]
    async fn test_first_tick_evaluates_and_streams() {
        let loader = ScriptedLoader::new();
        let mut s = session(&loader, QualityPreset::Quality);

        let outcome = s.tick(&FrameInput::new(16.0, Vec3::new(0.0, 0.0, 0.3)));
        assert!(outcome.evaluated());
        assert_eq!(s.evaluations(), 1);

        s.settle().await;
        assert_eq!(s.current_detail_levels()["heart"], Tissue);
        assert_eq!(s.current_detail_levels()["femur"], Region);
    }

    #[tokio::test]
    async fn test_idle_camera_skips_evaluation() {
        let loader = ScriptedLoader::new();
        let mut s = session(&loader, QualityPreset::Quality);
        let camera = Vec3::new(0.0, 0.0, 0.3);

        s.tick(&FrameInput::new(16.0, camera));
        for _ in 0..10 {
            let outcome = s.tick(&FrameInput::new(16.0, camera + Vec3::splat(0.001)));
            assert!(!outcome.evaluated());
        }
        assert_eq!(s.evaluations(), 1);

        let outcome = s.tick(&FrameInput::new(16.0, camera).with_focus("femur"));
        assert!(outcome.evaluated());
        assert_eq!(s.evaluations(), 2);
    }

    #[tokio::test]
    async fn test_preset_caps_detail_and_budget() {
        let loader = ScriptedLoader::new();
        let mut s = session(&loader, QualityPreset::Quality);
        let full = s.memory_usage().capacity_bytes;

        s.set_preset(QualityPreset::Performance).unwrap();
        let settings = s.quality_settings();
        assert_eq!(s.evaluator().max_detail(), settings.max_detail);
        assert!(s.memory_usage().capacity_bytes < full);

        s.tick(&FrameInput::new(16.0, Vec3::new(0.0, 0.0, 0.3)));
        s.settle().await;
        assert!(s.current_detail_levels()["heart"] <= settings.max_detail);
    }

    #[tokio::test]
    async fn test_disabling_system_unloads_its_regions() {
        let loader = ScriptedLoader::new();
        let mut s = session(&loader, QualityPreset::Quality);
        let camera = Vec3::new(0.0, 0.0, 0.3);
        s.tick(&FrameInput::new(16.0, camera));
        s.settle().await;
        assert!(s.current_detail_levels()["femur"].is_loadable());

        s.disable_system(&SystemTag::new("skeletal"));
        let outcome = s.tick(&FrameInput::new(16.0, camera));
        assert!(outcome.evaluated());
        assert_eq!(s.current_detail_levels()["femur"], DetailLevel::Unloaded);
        assert_eq!(s.region_status("femur"), RegionStatus::Unloaded);
        assert!(!loader.is_live(&crate::testing::key("femur", Region)));
    }

    #[tokio::test]
    async fn test_repeated_context_loss_enters_memory_reduction() {
        let loader = ScriptedLoader::new();
        let mut s = session(&loader, QualityPreset::Quality);
        let camera = Vec3::new(0.0, 0.0, 0.3);
        s.tick(&FrameInput::new(16.0, camera));
        s.settle().await;

        let start = Instant::now();
        assert_eq!(s.on_context_lost(start), LossVerdict::Recover);
        assert_eq!(s.memory_usage().used_bytes, 0);
        assert_eq!(
            s.on_context_lost(start + Duration::from_secs(10)),
            LossVerdict::Recover
        );
        assert_eq!(
            s.on_context_lost(start + Duration::from_secs(20)),
            LossVerdict::ReduceMemory
        );
        assert_eq!(s.current_preset(), QualityPreset::Performance);
        assert!(s.snapshot().memory_reduction);

        s.tick(&FrameInput::new(16.0, camera));
        s.settle().await;
        let cap = QualityPreset::Performance.settings().max_detail;
        assert!(s.current_detail_levels()["heart"] <= cap);
        assert!(cap < Tissue);
        // Manual upgrades stay locked out.
        assert!(s.set_preset(QualityPreset::Quality).is_none());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_components() {
        let loader = ScriptedLoader::new();
        let mut s = session(&loader, QualityPreset::Balanced);
        s.tick(&FrameInput::new(16.0, Vec3::new(0.0, 0.0, 0.3)));
        s.settle().await;

        let snap = s.snapshot();
        assert_eq!(snap.preset, QualityPreset::Balanced);
        assert_eq!(snap.stream.detail_levels.len(), 2);
        assert!(snap.stream.pending.is_empty());
        assert!(matches!(snap.stream.detail_levels["heart"], Region | Organ));
    }
}
