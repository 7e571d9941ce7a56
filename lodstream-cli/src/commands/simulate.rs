//! Simulate command - run a scripted viewer session against a catalog.
//!
//! The camera flies in toward a target region, orbits it and pulls back out.
//! Frame times follow a synthetic cost model so the quality controller has
//! something to react to: each preset has a relative cost and an optional
//! slowdown is injected during the orbit.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use glam::Vec3;
use indicatif::{ProgressBar, ProgressStyle};
use lodstream::catalog::{Catalog, RegionId, SystemTag};
use lodstream::config::format_size;
use lodstream::device::{DeviceCapabilityProfiler, StaticSignals};
use lodstream::quality::QualityPreset;
use lodstream::stream::{
    AssetLoader, FileAssetLoader, HttpAssetLoader, SimulatedLoader, StreamEvent,
};
use lodstream::{FrameInput, LodSession, TickOutcome};

use super::common::{parse_asset_key, parse_size_arg, PresetArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Closest approach to the target, in scene units.
const NEAR_DISTANCE: f32 = 0.35;

/// Frames between progress message refreshes.
const MESSAGE_INTERVAL: u32 = 10;

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Path to the catalog JSON manifest
    pub catalog: PathBuf,

    /// Asset directory or http(s) base URL (overrides stream.asset_source).
    /// Without a source, loads are simulated.
    #[arg(long)]
    pub source: Option<String>,

    /// Number of frames to run
    #[arg(long, default_value_t = 1800)]
    pub frames: u32,

    /// Frame time at the Quality preset, in milliseconds
    #[arg(long, default_value_t = 14.0)]
    pub frame_ms: f32,

    /// Extra frame time injected while orbiting the target
    #[arg(long, default_value_t = 0.0)]
    pub slowdown_ms: f32,

    /// Region to fly to and focus while orbiting
    #[arg(long)]
    pub focus: Option<String>,

    /// Hide a system halfway through (repeatable)
    #[arg(long = "hide")]
    pub hide: Vec<String>,

    /// Simulate a renderer context loss at this frame (repeatable)
    #[arg(long = "context-loss-at")]
    pub context_loss_at: Vec<u32>,

    /// Make every load of region/level fail, e.g. heart/tissue (repeatable)
    #[arg(long = "fail")]
    pub fail: Vec<String>,

    /// Memory budget override, e.g. 128MB
    #[arg(long)]
    pub budget: Option<String>,

    /// Starting preset (default: from config, else from the device probe)
    #[arg(long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Device benchmark frame time fed to the capability probe
    #[arg(long, default_value_t = 8.0)]
    pub benchmark_ms: f32,

    /// Simulated load latency in milliseconds
    #[arg(long, default_value_t = 40)]
    pub latency_ms: u64,

    /// Simulated bandwidth per second, e.g. 50MB
    #[arg(long, default_value = "50MB")]
    pub bandwidth: String,

    /// Run without real-time pacing
    #[arg(long)]
    pub fast: bool,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("simulate");
    let config = runner.config().clone();

    let mut session_config = config.session_config()?;
    if let Some(budget) = &args.budget {
        session_config.stream.capacity_bytes = parse_size_arg("budget", budget)?;
    }

    let catalog = Arc::new(Catalog::load(&args.catalog)?);
    if catalog.is_empty() {
        return Err(CliError::Simulation(format!(
            "{} contains no regions",
            args.catalog.display()
        )));
    }
    let focus = match &args.focus {
        Some(id) if catalog.region(id).is_none() => {
            return Err(CliError::Simulation(format!(
                "Focus region '{}' is not in the catalog",
                id
            )));
        }
        Some(id) => Some(RegionId::new(id.as_str())),
        None => None,
    };

    let source = args.source.clone().or(config.stream.asset_source.clone());
    let (loader, loader_desc) = build_loader(source.as_deref(), &args)?;

    let signals = StaticSignals::unavailable()
        .with_benchmark(args.benchmark_ms, Duration::from_millis(50))
        .with_pixel_ratio(2.0)
        .with_high_precision(true);
    let profiler = DeviceCapabilityProfiler::new(config.profiler_config(), Arc::new(signals));
    let preset = args
        .preset
        .map(QualityPreset::from)
        .or(config.quality.initial_preset);

    let runtime = runner.runtime()?;
    let handle = runtime.handle().clone();
    let capacity = session_config.stream.capacity_bytes;
    let mut session = match preset {
        Some(preset) => LodSession::with_initial_preset(
            session_config,
            Arc::clone(&catalog),
            loader,
            profiler,
            preset,
            handle,
        ),
        None => LodSession::new(session_config, Arc::clone(&catalog), loader, profiler, handle),
    };

    println!("LodStream Simulation v{}", lodstream::VERSION);
    println!("==========================");
    println!();
    println!("Catalog:  {} ({} regions)", args.catalog.display(), catalog.len());
    println!("Loader:   {}", loader_desc);
    println!("Budget:   {}", format_size(capacity));
    println!("Preset:   {}", session.current_preset());
    println!("Frames:   {}", args.frames);
    println!();
    println!("Press Ctrl+C to stop early");
    println!();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Setup(format!("Failed to set signal handler: {}", e)))?;

    let path = CameraPath::new(&catalog, focus.as_ref());
    let trace = FrameTrace::new(args.frame_ms, args.slowdown_ms);

    let pb = ProgressBar::new(u64::from(args.frames));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| CliError::Setup(format!("Invalid progress template: {}", e)))?
            .progress_chars("=> "),
    );

    let mut tally = EventTally::default();
    let completed = runtime.block_on(async {
        for frame in 0..args.frames {
            if shutdown.load(Ordering::SeqCst) {
                return frame;
            }
            let t = frame as f32 / args.frames.max(1) as f32;

            if frame == args.frames / 2 && !args.hide.is_empty() {
                for system in &args.hide {
                    session.disable_system(&SystemTag::new(system.as_str()));
                }
                pb.println(format!(
                    "[frame {:>5}] hid systems: {}",
                    frame,
                    args.hide.join(", ")
                ));
            }
            if args.context_loss_at.contains(&frame) {
                let verdict = session.on_context_lost(std::time::Instant::now());
                pb.println(format!(
                    "[frame {:>5}] {} renderer context lost ({:?})",
                    frame,
                    style("!").red().bold(),
                    verdict
                ));
            }

            let mut input = FrameInput::new(trace.frame_ms(t, session.current_preset()), path.at(t));
            if let Some(id) = path.focus_at(t) {
                input = input.with_focus(id.clone());
            }
            let outcome = session.tick(&input);
            report(&pb, frame, &outcome, &mut tally);

            if frame % MESSAGE_INTERVAL == 0 {
                pb.set_message(status_line(&session));
            }
            pb.inc(1);

            if args.fast {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(Duration::from_secs_f32(input.frame_ms / 1000.0)).await;
            }
        }
        args.frames
    });

    let interrupted = completed < args.frames;
    if interrupted {
        pb.abandon_with_message("interrupted");
    } else {
        pb.finish_with_message("done");
        tally.record(&runtime.block_on(session.settle()));
    }

    print_summary(&session, &tally, completed);
    Ok(())
}

fn build_loader(
    source: Option<&str>,
    args: &SimulateArgs,
) -> Result<(Arc<dyn AssetLoader>, String), CliError> {
    match source {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            let loader = HttpAssetLoader::new(Some(url.to_string()))?;
            Ok((Arc::new(loader), format!("http ({})", url)))
        }
        Some(dir) => Ok((
            Arc::new(FileAssetLoader::new(dir)),
            format!("file ({})", dir),
        )),
        None => {
            let bandwidth = parse_size_arg("bandwidth", &args.bandwidth)?;
            let loader = SimulatedLoader::new(Duration::from_millis(args.latency_ms), bandwidth);
            for key in &args.fail {
                loader.fail(parse_asset_key(key)?);
            }
            Ok((
                Arc::new(loader),
                format!(
                    "simulated ({}ms latency, {}/s)",
                    args.latency_ms,
                    format_size(bandwidth)
                ),
            ))
        }
    }
}

fn status_line(session: &LodSession) -> String {
    let memory = session.memory_usage();
    let fps = session
        .controller()
        .smoothed_fps()
        .map(|f| format!("{:.0} fps", f))
        .unwrap_or_else(|| "-- fps".to_string());
    format!(
        "{} | {} | {} / {} | {} pending",
        session.current_preset(),
        fps,
        format_size(memory.used_bytes),
        format_size(memory.capacity_bytes),
        session.pending_loads().len()
    )
}

fn report(pb: &ProgressBar, frame: u32, outcome: &TickOutcome, tally: &mut EventTally) {
    for change in &outcome.preset_changes {
        pb.println(format!(
            "[frame {:>5}] preset {} -> {} ({})",
            frame,
            change.from,
            style(change.to).bold(),
            change.reason
        ));
    }
    for event in &outcome.events {
        match event {
            StreamEvent::Failed {
                key,
                error,
                retry_in,
                ..
            } => pb.println(format!(
                "[frame {:>5}] {} {}: {}{}",
                frame,
                style("failed").red(),
                key,
                error,
                retry_in
                    .map(|d| format!(" (retry in {}ms)", d.as_millis()))
                    .unwrap_or_default()
            )),
            StreamEvent::FellBack { region, from, to } => pb.println(format!(
                "[frame {:>5}] {} fell back {} -> {}",
                frame, region, from, to
            )),
            StreamEvent::BudgetUnsatisfiable { key } => pb.println(format!(
                "[frame {:>5}] {} budget cannot fit {}",
                frame,
                style("warning:").yellow(),
                key
            )),
            StreamEvent::Unavailable { region } => pb.println(format!(
                "[frame {:>5}] {} {} is unavailable",
                frame,
                style("error:").red().bold(),
                region
            )),
            _ => {}
        }
    }
    tally.record(&outcome.events);
}

fn print_summary(session: &LodSession, tally: &EventTally, frames: u32) {
    let snapshot = session.snapshot();

    println!();
    println!("Session Summary");
    println!("───────────────");
    println!("  Frames run:      {}", frames);
    println!("  Final preset:    {}", snapshot.preset);
    println!(
        "  Smoothed FPS:    {}",
        snapshot
            .smoothed_fps
            .map(|f| format!("{:.1}", f))
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!("  Pixel density:   {:.2}", snapshot.pixel_density);
    if snapshot.memory_reduction {
        println!("  Memory reduction mode: {}", style("active").yellow());
    }
    println!("  Memory:          {}", snapshot.stream.memory);
    println!(
        "  Loads:           {} issued, {} published, {} republished, {} cancelled, {} discarded",
        tally.issued, tally.published, tally.republished, tally.cancelled, tally.discarded
    );
    println!(
        "  Evictions:       {} ({})",
        tally.evicted,
        format_size(tally.evicted_bytes)
    );
    println!(
        "  Failures:        {} ({} fallbacks)",
        tally.failed, tally.fell_back
    );
    println!();

    println!("Regions");
    println!("───────");
    for (id, level) in &snapshot.stream.detail_levels {
        println!(
            "  {:<20} {:<8} {}",
            id.as_str(),
            level.as_str(),
            session.region_status(id.as_str())
        );
    }
    if !snapshot.stream.unavailable.is_empty() {
        println!();
        println!(
            "{} unavailable: {}",
            style("warning:").yellow().bold(),
            snapshot
                .stream
                .unavailable
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

/// Counts of stream events over the run.
#[derive(Debug, Default)]
struct EventTally {
    issued: u64,
    published: u64,
    republished: u64,
    cancelled: u64,
    discarded: u64,
    evicted: u64,
    evicted_bytes: u64,
    failed: u64,
    fell_back: u64,
}

impl EventTally {
    fn record(&mut self, events: &[StreamEvent]) {
        for event in events {
            match event {
                StreamEvent::Issued { .. } => self.issued += 1,
                StreamEvent::Published { .. } => self.published += 1,
                StreamEvent::Republished { .. } => self.republished += 1,
                StreamEvent::Cancelled { .. } => self.cancelled += 1,
                StreamEvent::Discarded { .. } => self.discarded += 1,
                StreamEvent::Evicted { bytes, .. } => {
                    self.evicted += 1;
                    self.evicted_bytes += bytes;
                }
                StreamEvent::Failed { .. } => self.failed += 1,
                StreamEvent::FellBack { .. } => self.fell_back += 1,
                _ => {}
            }
        }
    }
}

/// Fly-in, orbit, fly-out path around a target point.
#[derive(Debug, Clone)]
struct CameraPath {
    target: Vec3,
    far: f32,
    focus: Option<RegionId>,
}

impl CameraPath {
    fn new(catalog: &Catalog, focus: Option<&RegionId>) -> Self {
        let centroids: Vec<Vec3> = catalog.regions().map(|r| r.centroid).collect();
        let center = centroids.iter().copied().sum::<Vec3>() / centroids.len().max(1) as f32;
        let radius = centroids
            .iter()
            .map(|c| c.distance(center))
            .fold(0.0f32, f32::max);
        let target = focus
            .and_then(|id| catalog.region(id.as_str()))
            .map(|r| r.centroid)
            .unwrap_or(center);
        Self {
            target,
            far: radius + 6.0,
            focus: focus.cloned(),
        }
    }

    /// Camera position at `t` in `[0, 1]`.
    fn at(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        let (distance, angle) = if t < 0.4 {
            let k = smoothstep(t / 0.4);
            (self.far + (NEAR_DISTANCE - self.far) * k, 0.0)
        } else if t < 0.7 {
            let k = (t - 0.4) / 0.3;
            (NEAR_DISTANCE, k * std::f32::consts::TAU)
        } else {
            let k = smoothstep((t - 0.7) / 0.3);
            (NEAR_DISTANCE + (self.far - NEAR_DISTANCE) * k, 0.0)
        };
        self.target + Vec3::new(angle.sin(), 0.15, angle.cos()).normalize() * distance
    }

    /// Focused region at `t`: only while orbiting.
    fn focus_at(&self, t: f32) -> Option<&RegionId> {
        if (0.4..0.7).contains(&t) {
            self.focus.as_ref()
        } else {
            None
        }
    }
}

fn smoothstep(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// Synthetic frame-time model.
#[derive(Debug, Clone, Copy)]
struct FrameTrace {
    quality_ms: f32,
    slowdown_ms: f32,
}

impl FrameTrace {
    fn new(quality_ms: f32, slowdown_ms: f32) -> Self {
        Self {
            quality_ms: quality_ms.max(0.1),
            slowdown_ms: slowdown_ms.max(0.0),
        }
    }

    fn cost(preset: QualityPreset) -> f32 {
        match preset {
            QualityPreset::Performance => 0.55,
            QualityPreset::Balanced => 0.75,
            QualityPreset::Quality => 1.0,
        }
    }

    /// Frame duration at `t` under `preset`, with a little deterministic jitter.
    fn frame_ms(&self, t: f32, preset: QualityPreset) -> f32 {
        let slowdown = if (0.4..0.7).contains(&t) {
            self.slowdown_ms
        } else {
            0.0
        };
        let jitter = 1.0 + 0.05 * (t * 997.0).sin();
        (self.quality_ms + slowdown) * Self::cost(preset) * jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodstream::testing::{catalog, full_region, MB};
    use proptest::prelude::*;

    fn sample_catalog() -> Arc<Catalog> {
        catalog([
            full_region("heart", "cardio", Vec3::ZERO, [MB, 2 * MB, 4 * MB, 8 * MB]),
            full_region("femur", "skeletal", Vec3::new(0.0, -3.0, 0.0), [MB, 2 * MB, 4 * MB, 8 * MB]),
        ])
    }

    #[test]
    fn test_path_reaches_target_and_returns() {
        let c = sample_catalog();
        let focus = RegionId::new("heart");
        let path = CameraPath::new(&c, Some(&focus));

        assert!((path.at(0.0).distance(Vec3::ZERO) - path.far).abs() < 1e-3);
        assert!((path.at(0.5).distance(Vec3::ZERO) - NEAR_DISTANCE).abs() < 1e-3);
        assert!((path.at(1.0).distance(Vec3::ZERO) - path.far).abs() < 1e-3);
        assert_eq!(path.focus_at(0.5), Some(&focus));
        assert_eq!(path.focus_at(0.1), None);
    }

    #[test]
    fn test_cheaper_preset_is_faster() {
        let trace = FrameTrace::new(20.0, 30.0);
        let quality = trace.frame_ms(0.5, QualityPreset::Quality);
        let performance = trace.frame_ms(0.5, QualityPreset::Performance);
        assert!(performance < quality);
        assert!(trace.frame_ms(0.5, QualityPreset::Quality) > trace.frame_ms(0.1, QualityPreset::Quality));
    }

    #[test]
    fn test_tally_counts_evicted_bytes() {
        let mut tally = EventTally::default();
        let key = lodstream::testing::key("heart", lodstream::catalog::DetailLevel::Organ);
        tally.record(&[
            StreamEvent::Issued {
                key: key.clone(),
                generation: 1,
            },
            StreamEvent::Evicted {
                key,
                bytes: 4 * MB,
                reason: lodstream::stream::EvictionReason::Admission,
            },
        ]);
        assert_eq!(tally.issued, 1);
        assert_eq!(tally.evicted_bytes, 4 * MB);
    }

    proptest! {
        #[test]
        fn prop_frame_times_positive(t in 0.0f32..1.0, base in 0.0f32..100.0, slow in 0.0f32..100.0) {
            let trace = FrameTrace::new(base, slow);
            for preset in QualityPreset::ALL {
                let ms = trace.frame_ms(t, preset);
                prop_assert!(ms.is_finite() && ms > 0.0);
            }
        }
    }
}
