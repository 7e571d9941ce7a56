//! End-to-end tests from files on disk.
//!
//! A config file, a catalog manifest and asset files are written to a
//! temporary directory, then a session streams them with the file loader:
//! - config keys flow into the runtime configuration
//! - catalog validation errors surface before any streaming
//! - corrupt assets fall back to a coarser level
//!
//! Run with: `cargo test --test pipeline_integration`

use std::path::Path;
use std::sync::Arc;

use glam::Vec3;
use tempfile::TempDir;
use tokio::runtime::Handle;

use lodstream::catalog::{Catalog, CatalogError, DetailLevel};
use lodstream::config::{ConfigError, ConfigFile, ConfigKey};
use lodstream::device::{DeviceCapabilityProfiler, StaticSignals};
use lodstream::quality::QualityPreset;
use lodstream::stream::{sha256_hex, FileAssetLoader, RegionStatus, StreamEvent};
use lodstream::{FrameInput, LodError, LodSession};

// ============================================================================
// Helper Functions
// ============================================================================

const CONFIG: &str = "\
[lod]
hysteresis = 0.05

[quality]
initial_preset = quality

[stream]
capacity = 4MB
max_attempts = 1

[logging]
level = warn
";

fn write_asset(dir: &Path, name: &str, bytes: usize) -> String {
    let data = vec![0x5au8; bytes];
    std::fs::write(dir.join(name), &data).unwrap();
    sha256_hex(&data)
}

/// Heart (body + organ) and femur (body only). The heart's organ asset is
/// declared with a digest that does not match its contents when `corrupt`.
fn write_catalog(dir: &Path, corrupt: bool) -> std::path::PathBuf {
    let body_sha = write_asset(dir, "heart_body.glb", 1024);
    let organ_sha = write_asset(dir, "heart_organ.glb", 4096);
    write_asset(dir, "femur_body.glb", 2048);
    let organ_sha = if corrupt { "00".repeat(32) } else { organ_sha };

    let manifest = format!(
        r#"{{
  "version": 1,
  "regions": [
    {{
      "id": "heart",
      "system": "cardiovascular",
      "centroid": [0.0, 0.0, 0.0],
      "assets": {{
        "body": {{ "locator": "heart_body.glb", "size_bytes": 1024, "sha256": "{body_sha}" }},
        "organ": {{ "locator": "heart_organ.glb", "size_bytes": 4096, "sha256": "{organ_sha}" }}
      }}
    }},
    {{
      "id": "femur",
      "system": "skeletal",
      "centroid": [0.0, -3.0, 0.0],
      "assets": {{
        "body": {{ "locator": "femur_body.glb", "size_bytes": 2048 }}
      }}
    }}
  ]
}}"#
    );
    let path = dir.join("catalog.json");
    std::fs::write(&path, manifest).unwrap();
    path
}

fn session_from_disk(dir: &TempDir, corrupt: bool) -> Result<LodSession, LodError> {
    let config_path = dir.path().join("config.ini");
    std::fs::write(&config_path, CONFIG).unwrap();
    let file = ConfigFile::load_from(&config_path)?;

    let catalog = Arc::new(Catalog::load(write_catalog(dir.path(), corrupt))?);
    let profiler = DeviceCapabilityProfiler::new(
        file.profiler_config(),
        Arc::new(StaticSignals::unavailable().with_benchmark(4.0, Default::default())),
    );
    let preset = file.quality.initial_preset.unwrap_or(QualityPreset::Balanced);
    Ok(LodSession::with_initial_preset(
        file.session_config()?,
        catalog,
        Arc::new(FileAssetLoader::new(dir.path())),
        profiler,
        preset,
        Handle::current(),
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_config_keys_flow_into_runtime_config() {
    let file = ConfigFile::from_ini_str(CONFIG).unwrap();
    let session = file.session_config().unwrap();
    assert_eq!(session.lod.hysteresis, 0.05);
    assert_eq!(session.stream.capacity_bytes, 4 * 1024 * 1024);
    assert_eq!(session.stream.retry.max_attempts(), 1);
    assert_eq!(ConfigKey::LoggingLevel.get(&file), "warn");
}

#[test]
fn test_set_then_save_round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.ini");

    let mut file = ConfigFile::default();
    for (key, value) in [
        ("stream.capacity", "96MB"),
        ("quality.initial_preset", "balanced"),
        ("session.loss_threshold", "5"),
        ("stream.asset_source", "https://cdn.example.org/anatomy"),
    ] {
        key.parse::<ConfigKey>()
            .unwrap()
            .set(&mut file, value)
            .unwrap();
    }
    file.save_to(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[stream]"));
    assert!(text.contains("capacity=100663296") || text.contains("capacity = 100663296"));

    let reloaded = ConfigFile::load_from(&path).unwrap();
    assert_eq!(reloaded, file);
    assert_eq!(reloaded.session.loss_threshold, 5);
}

#[test]
fn test_bad_value_in_file_names_the_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.ini");
    std::fs::write(&path, "[stream]\ncapacity = plenty\n").unwrap();

    match ConfigFile::load_from(&path) {
        Err(ConfigError::InvalidValue { key, value, .. }) => {
            assert_eq!(key, "stream.capacity");
            assert_eq!(value, "plenty");
        }
        other => panic!("expected invalid value, got {:?}", other),
    }
}

#[test]
fn test_catalog_with_zero_size_asset_rejected() {
    let json = r#"{
      "version": 1,
      "regions": [
        { "id": "skull", "system": "skeletal", "centroid": [0, 1.7, 0],
          "assets": { "body": { "locator": "skull.glb", "size_bytes": 0 } } }
      ]
    }"#;
    assert!(matches!(
        Catalog::from_json_str(json),
        Err(CatalogError::ZeroSize { .. })
    ));
}

#[tokio::test]
async fn test_streams_assets_from_disk() {
    let dir = TempDir::new().unwrap();
    let mut session = session_from_disk(&dir, false).unwrap();

    session.tick(&FrameInput::new(16.0, Vec3::new(0.0, 0.0, 0.3)));
    session.settle().await;

    let levels = session.current_detail_levels();
    // Tissue is requested but the catalog tops out at organ.
    assert_eq!(levels["heart"], DetailLevel::Organ);
    assert_eq!(levels["femur"], DetailLevel::Body);
    assert_eq!(session.memory_usage().used_bytes, 4096 + 2048);
}

#[tokio::test]
async fn test_digest_mismatch_falls_back_to_coarser_level() {
    let dir = TempDir::new().unwrap();
    let mut session = session_from_disk(&dir, true).unwrap();

    session.tick(&FrameInput::new(16.0, Vec3::new(0.0, 0.0, 0.3)));
    let mut events = session.settle().await;
    // The fallback issued after the failure may still be in flight.
    events.extend(session.settle().await);

    assert!(events
        .iter()
        .any(|e| matches!(e, StreamEvent::Failed { key, .. } if key.level == DetailLevel::Organ)));
    assert_eq!(session.current_detail_levels()["heart"], DetailLevel::Body);
    assert!(matches!(
        session.region_status("heart"),
        RegionStatus::Degraded {
            showing: DetailLevel::Body,
            ..
        }
    ));
}

// ============================================================================
// Shipped Demo Files
// ============================================================================

fn demo(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("demos")
        .join(name)
}

#[test]
fn test_demo_config_spells_out_the_defaults() {
    let config = ConfigFile::load_from(&demo("config.ini")).unwrap();
    assert_eq!(config, ConfigFile::default());
}

#[test]
fn test_demo_catalog_is_valid() {
    let catalog = Catalog::load(demo("catalog.json")).unwrap();
    assert_eq!(catalog.len(), 12);
    assert_eq!(catalog.asset_count(), 48);
    assert!(catalog.region("heart").is_some());
    assert!(catalog.systems().len() >= 5);
}
