//! Integration tests for budgeted asset streaming.
//!
//! These tests drive the stream manager and the session end to end with a
//! scripted loader:
//! - cold start from an empty cache
//! - upgrading a focused region while the budget is full
//! - shrinking the budget while loads are in flight
//! - hiding a system and releasing its assets
//! - budget and single-request invariants over random desired states
//!
//! Run with: `cargo test --test streaming_integration`

use std::sync::Arc;

use glam::Vec3;
use proptest::prelude::*;
use tokio::runtime::Handle;

use lodstream::catalog::DetailLevel::{self, Body, Organ, Region, Tissue, Unloaded};
use lodstream::catalog::{RegionDescriptor, RegionId, SystemTag};
use lodstream::device::{DeviceCapabilityProfiler, StaticSignals};
use lodstream::lod::{DesiredState, RegionPriority, RegionTarget};
use lodstream::quality::QualityPreset;
use lodstream::stream::{
    AssetStreamManager, PendingState, RegionStatus, StreamConfig, StreamEvent,
};
use lodstream::testing::{catalog, full_region, key, region, ScriptedLoader, MB};
use lodstream::{FrameInput, LodSession, SessionConfig};

// ============================================================================
// Helper Functions
// ============================================================================

/// Sizes per level, coarsest first: Body, Region, Organ, Tissue.
const SIZES: [u64; 4] = [MB, 2 * MB, 4 * MB, 8 * MB];

fn torso() -> Vec<RegionDescriptor> {
    vec![
        full_region("heart", "cardio", Vec3::ZERO, SIZES),
        full_region("lung_left", "respiratory", Vec3::new(-0.6, 0.2, 0.0), SIZES),
        full_region("sternum", "skeletal", Vec3::new(0.0, 0.3, 0.8), SIZES),
        full_region("femur", "skeletal", Vec3::new(0.0, -3.0, 0.0), SIZES),
    ]
}

fn desired(targets: &[(&str, DetailLevel, u32)]) -> DesiredState {
    DesiredState::from_targets(targets.iter().map(|&(id, level, score)| {
        (
            RegionId::new(id),
            RegionTarget {
                level,
                priority: if level.is_loadable() {
                    RegionPriority {
                        score,
                        focus_recency: 0,
                    }
                } else {
                    RegionPriority::ZERO
                },
                distance: 0.0,
                focused: false,
            },
        )
    }))
}

fn manager(regions: Vec<RegionDescriptor>, loader: &ScriptedLoader, capacity: u64) -> AssetStreamManager {
    AssetStreamManager::new(
        StreamConfig::default().with_capacity_bytes(capacity),
        catalog(regions),
        Arc::new(loader.clone()),
        Handle::current(),
    )
}

fn high_end_profiler() -> DeviceCapabilityProfiler {
    let signals = StaticSignals::unavailable()
        .with_benchmark(3.0, std::time::Duration::from_millis(40))
        .with_pixel_ratio(2.0)
        .with_high_precision(true);
    DeviceCapabilityProfiler::with_defaults(Arc::new(signals))
}

fn session(loader: &ScriptedLoader, capacity: u64) -> LodSession {
    let config =
        SessionConfig::default().with_stream(StreamConfig::default().with_capacity_bytes(capacity));
    LodSession::with_initial_preset(
        config,
        catalog(torso()),
        Arc::new(loader.clone()),
        high_end_profiler(),
        QualityPreset::Quality,
        Handle::current(),
    )
}

/// Let spawned loads finish and process every outstanding completion.
async fn quiesce(m: &mut AssetStreamManager) -> Vec<StreamEvent> {
    let mut events = m.settle().await;
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
    events.extend(m.drain_completions());
    events
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_cold_start_streams_nearest_region_first() {
    let loader = ScriptedLoader::new();
    let mut s = session(&loader, 64 * MB);

    let camera = Vec3::new(0.0, 0.0, 0.3);
    let outcome = s.tick(&FrameInput::new(16.0, camera));
    assert!(outcome.evaluated());

    let issued: Vec<_> = outcome
        .events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Issued { key, .. } => Some(key.region.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(issued.len(), 4, "every region should start loading");
    assert_eq!(issued[0].as_str(), "heart");
    assert_eq!(issued[3].as_str(), "femur");

    // Nothing is visible until a load completes.
    assert!(s.current_detail_levels().values().all(|l| *l == Unloaded));

    s.settle().await;
    let levels = s.current_detail_levels();
    assert_eq!(levels["heart"], Tissue);
    assert_eq!(levels["femur"], Region);
    for id in ["heart", "lung_left", "sternum", "femur"] {
        assert!(matches!(s.region_status(id), RegionStatus::Ready { .. }), "{id}");
    }
    assert!(s.pending_loads().is_empty());
    let usage = s.memory_usage();
    assert!(usage.used_bytes <= usage.capacity_bytes);
    assert_eq!(usage.reserved_bytes, 0);
}

#[tokio::test]
async fn test_upgrade_under_pressure_evicts_lower_priority() {
    let loader = ScriptedLoader::new();
    let regions = vec![
        full_region("liver", "digestive", Vec3::ZERO, SIZES),
        full_region("spleen", "lymphatic", Vec3::X, SIZES),
    ];
    let mut m = manager(regions, &loader, 10 * MB);

    m.reconcile(&desired(&[("liver", Organ, 50), ("spleen", Organ, 50)]));
    quiesce(&mut m).await;
    assert_eq!(m.memory_usage().used_bytes, 8 * MB);

    // Focus the liver: it wants the finest tier while the spleen backs off.
    let report = m.reconcile(&desired(&[("liver", Tissue, 500), ("spleen", Body, 10)]));
    assert!(report.evicted > 0, "admission must evict to fit");
    let usage = m.memory_usage();
    assert!(usage.used_bytes + usage.reserved_bytes <= usage.capacity_bytes);

    let events = quiesce(&mut m).await;
    assert!(events
        .iter()
        .any(|e| matches!(e, StreamEvent::Published { key: k, .. } if *k == key("liver", Tissue))));
    let levels = m.current_detail_levels();
    assert_eq!(levels["liver"], Tissue);
    assert_eq!(levels["spleen"], Body);
    assert!(m.memory_usage().used_bytes <= 10 * MB);
    assert_eq!(loader.live_handles(), m.resident().len());
}

#[tokio::test]
async fn test_upgrade_evicts_own_stale_body_and_defers_neighbour() {
    let loader = ScriptedLoader::new();
    let regions = vec![
        region("region_a", "skeletal", Vec3::ZERO, &[(Body, 20 * MB), (Organ, 25 * MB)]),
        region("region_b", "skeletal", Vec3::X, &[(Body, 10 * MB)]),
    ];
    let mut m = manager(regions, &loader, 30 * MB);
    m.reconcile(&desired(&[("region_a", Body, 500)]));
    quiesce(&mut m).await;
    assert_eq!(m.memory_usage().used_bytes, 20 * MB);

    // region_a is focused, so it is admitted first.
    let report = m.reconcile(&desired(&[("region_a", Organ, 500), ("region_b", Body, 100)]));
    assert_eq!(report.evicted, 1);
    assert_eq!(report.issued, 1);
    assert_eq!(report.deferred, 1);
    assert!(!m.resident().contains(&key("region_a", Body)));
    assert_eq!(m.in_flight_level("region_a"), Some(Organ));
    assert_eq!(m.in_flight_level("region_b"), None);
    let usage = m.memory_usage();
    assert_eq!(usage.used_bytes, 0);
    assert_eq!(usage.reserved_bytes, 25 * MB);

    quiesce(&mut m).await;
    let usage = m.memory_usage();
    assert_eq!(usage.used_bytes, 25 * MB);
    assert_eq!(usage.reserved_bytes, 0);
    assert_eq!(m.region_status("region_a"), RegionStatus::Ready { level: Organ });
    assert_eq!(
        m.region_status("region_b"),
        RegionStatus::Deferred {
            target: Body,
            showing: None
        }
    );
    let pending = m.pending_loads();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].region.as_str(), "region_b");
    assert_eq!(pending[0].state, PendingState::Deferred);
    assert_eq!(loader.load_count(&key("region_b", Body)), 0);
}

#[tokio::test]
async fn test_budget_shrink_mid_load_never_overshoots() {
    let loader = ScriptedLoader::new();
    let mut m = manager(torso(), &loader, 10 * MB);
    m.reconcile(&desired(&[("heart", Organ, 500)]));
    quiesce(&mut m).await;

    loader.gate(key("lung_left", Organ));
    m.reconcile(&desired(&[("heart", Organ, 500), ("lung_left", Organ, 100)]));
    m.set_capacity(5 * MB);

    loader.open(&key("lung_left", Organ));
    quiesce(&mut m).await;
    let usage = m.memory_usage();
    assert_eq!(usage.capacity_bytes, 5 * MB);
    assert_eq!(usage.used_bytes, 4 * MB);
    assert_eq!(m.current_detail_levels()["lung_left"], Unloaded);
    assert!(matches!(
        m.region_status("lung_left"),
        RegionStatus::Deferred { target: Organ, .. }
    ));
    assert_eq!(loader.live_handles(), m.resident().len());
}

#[tokio::test]
async fn test_disabling_system_releases_its_assets() {
    let loader = ScriptedLoader::new();
    let mut s = session(&loader, 64 * MB);
    let camera = Vec3::new(0.0, 0.0, 0.3);
    s.tick(&FrameInput::new(16.0, camera));
    s.settle().await;
    let before = s.memory_usage().used_bytes;

    s.disable_system(&SystemTag::new("skeletal"));
    let outcome = s.tick(&FrameInput::new(16.0, camera));
    assert!(outcome.evaluated());

    let levels = s.current_detail_levels();
    assert_eq!(levels["sternum"], Unloaded);
    assert_eq!(levels["femur"], Unloaded);
    assert_eq!(levels["heart"], Tissue);
    assert!(s.memory_usage().used_bytes < before);
    assert!(!s.stream().resident().iter().any(|k| k.region.as_str() == "femur"));

    // Re-enabling streams the regions back in.
    s.enable_system(SystemTag::new("skeletal"));
    s.tick(&FrameInput::new(16.0, camera));
    s.settle().await;
    assert!(s.current_detail_levels()["femur"].is_loadable());
}

#[tokio::test]
async fn test_refocus_keeps_previous_level_visible() {
    let loader = ScriptedLoader::new();
    let mut m = manager(torso(), &loader, 64 * MB);
    m.reconcile(&desired(&[("heart", Region, 10)]));
    quiesce(&mut m).await;

    loader.gate(key("heart", Tissue));
    m.reconcile(&desired(&[("heart", Tissue, 10)]));
    for _ in 0..8 {
        tokio::task::yield_now().await;
        m.drain_completions();
        assert_eq!(m.current_detail_levels()["heart"], Region);
    }
    assert_eq!(
        m.pending_loads()
            .iter()
            .filter(|p| p.state == PendingState::InFlight)
            .count(),
        1
    );

    loader.open(&key("heart", Tissue));
    quiesce(&mut m).await;
    assert_eq!(m.current_detail_levels()["heart"], Tissue);
}

// ============================================================================
// Property Tests
// ============================================================================

const REGION_IDS: [&str; 4] = ["heart", "lung_left", "sternum", "femur"];

fn level_strategy() -> impl Strategy<Value = DetailLevel> {
    prop_oneof![
        Just(Unloaded),
        Just(Body),
        Just(Region),
        Just(Organ),
        Just(Tissue),
    ]
}

#[derive(Debug, Clone)]
enum Step {
    Reconcile(Vec<(DetailLevel, u32)>),
    Yield(u8),
    SetCapacity(u64),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => prop::collection::vec((level_strategy(), 1u32..1000), 4).prop_map(Step::Reconcile),
        3 => (1u8..8).prop_map(Step::Yield),
        1 => (1u64..24).prop_map(|mb| Step::SetCapacity(mb * MB)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_budget_and_single_request_hold(
        capacity_mb in 4u64..24,
        steps in prop::collection::vec(step_strategy(), 1..24),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let loader = ScriptedLoader::new();
            let mut m = manager(torso(), &loader, capacity_mb * MB);
            // Reservations admitted before a shrink may outlive it, but never
            // exceed the largest budget they were admitted under.
            let mut peak = capacity_mb * MB;

            for step in steps {
                match step {
                    Step::Reconcile(levels) => {
                        let targets: Vec<_> = REGION_IDS
                            .iter()
                            .zip(levels)
                            .map(|(id, (level, score))| (*id, level, score))
                            .collect();
                        m.reconcile(&desired(&targets));
                    }
                    Step::Yield(n) => {
                        for _ in 0..n {
                            tokio::task::yield_now().await;
                        }
                        m.drain_completions();
                    }
                    Step::SetCapacity(bytes) => {
                        m.set_capacity(bytes);
                        peak = peak.max(bytes);
                    }
                }

                let usage = m.memory_usage();
                if usage.used_bytes > usage.capacity_bytes {
                    assert_eq!(
                        usage.used_bytes, usage.pinned_bytes,
                        "used {} over budget {} with stale assets resident",
                        usage.used_bytes, usage.capacity_bytes
                    );
                    assert!(m.under_pressure());
                }
                assert!(
                    usage.used_bytes + usage.reserved_bytes <= peak,
                    "used {} + reserved {} over {}",
                    usage.used_bytes,
                    usage.reserved_bytes,
                    peak
                );

                let in_flight: Vec<_> = m
                    .pending_loads()
                    .into_iter()
                    .filter(|p| p.state == PendingState::InFlight)
                    .map(|p| p.region)
                    .collect();
                let mut unique = in_flight.clone();
                unique.sort();
                unique.dedup();
                assert_eq!(unique.len(), in_flight.len(), "two loads for one region");
                assert!(m.in_flight() <= REGION_IDS.len());
            }

            quiesce(&mut m).await;
            assert_eq!(m.in_flight(), 0);
            assert_eq!(loader.live_handles(), m.resident().len());
        });
    }
}
