//! Probe command - classify a device from capability signals.
//!
//! The CLI has no renderer of its own, so signals are given on the command
//! line (for example a benchmark frame time measured in the viewer).

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use lodstream::config::ConfigFile;
use lodstream::device::{
    initial_preset, preset_ceiling, DeviceCapabilityProfiler, DeviceProfile, StaticSignals,
};

use crate::error::CliError;

/// Arguments for the probe command.
#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Benchmark frame time in milliseconds
    #[arg(long)]
    pub benchmark_ms: Option<f32>,

    /// How long the benchmark took, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub benchmark_elapsed_ms: u64,

    /// User agent / platform string
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Native device pixel ratio
    #[arg(long)]
    pub pixel_ratio: Option<f32>,

    /// Report that high-precision fragment shaders are unavailable
    #[arg(long)]
    pub no_high_precision: bool,
}

impl ProbeArgs {
    pub fn signals(&self) -> StaticSignals {
        let mut signals = StaticSignals::unavailable();
        if let Some(ms) = self.benchmark_ms {
            signals =
                signals.with_benchmark(ms, Duration::from_millis(self.benchmark_elapsed_ms));
        }
        if let Some(ua) = &self.user_agent {
            signals = signals.with_user_agent(ua.clone());
        }
        if let Some(ratio) = self.pixel_ratio {
            signals = signals.with_pixel_ratio(ratio);
        }
        signals.with_high_precision(!self.no_high_precision)
    }
}

/// Run the probe command.
pub fn run(args: ProbeArgs) -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();
    let profiler = DeviceCapabilityProfiler::new(config.profiler_config(), Arc::new(args.signals()));

    let profile = match profiler.try_probe() {
        Ok(profile) => profile,
        Err(e) => {
            println!("{} {}", style("warning:").yellow().bold(), e);
            println!("Falling back to the conservative profile.");
            println!();
            DeviceProfile::conservative()
        }
    };

    print_profile(&profile);
    Ok(())
}

fn print_profile(profile: &DeviceProfile) {
    let start = initial_preset(profile);
    let settings = start.settings().clamped_to(profile);

    println!("Device Profile");
    println!("==============");
    println!("  GPU tier:          {}", style(profile.tier).bold());
    println!("  Max pixel density: {:.2}", profile.max_pixel_density);
    println!("  Shader precision:  {}", profile.precision);
    println!("  Constrained mobile: {}", yes_no(profile.constrained_mobile));
    println!("  Conservative:      {}", yes_no(profile.conservative));
    println!();
    println!("Quality");
    println!("=======");
    println!("  Initial preset:    {}", style(start).green());
    println!("  Auto ceiling:      {}", preset_ceiling(profile));
    println!(
        "  Pixel density:     {:.2} - {:.2}",
        settings.pixel_density.min, settings.pixel_density.max
    );
    println!("  Antialiasing:      {:?}", settings.antialias);
    println!("  Shadows:           {}", yes_no(settings.shadows));
    println!("  Ambient occlusion: {}", yes_no(settings.ambient_occlusion));
    println!("  Max detail:        {}", settings.max_detail);
    println!("  Budget fraction:   {:.0}%", settings.budget_fraction * 100.0);
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodstream::device::{CapabilitySignals, GpuTier};

    fn args() -> ProbeArgs {
        ProbeArgs {
            benchmark_ms: None,
            benchmark_elapsed_ms: 100,
            user_agent: None,
            pixel_ratio: None,
            no_high_precision: false,
        }
    }

    #[test]
    fn test_signals_from_args() {
        let mut a = args();
        a.benchmark_ms = Some(4.5);
        a.pixel_ratio = Some(3.0);
        a.no_high_precision = true;
        let signals = a.signals();

        let sample = signals.benchmark(Duration::from_secs(1)).unwrap();
        assert_eq!(sample.frame_ms, 4.5);
        assert_eq!(signals.device_pixel_ratio(), Some(3.0));
        assert_eq!(signals.high_precision_supported(), Some(false));
    }

    #[test]
    fn test_fast_benchmark_probes_high() {
        let mut a = args();
        a.benchmark_ms = Some(3.0);
        let profiler = DeviceCapabilityProfiler::with_defaults(Arc::new(a.signals()));
        assert_eq!(profiler.probe().tier, GpuTier::High);
    }

    #[test]
    fn test_no_signals_is_unavailable() {
        let profiler = DeviceCapabilityProfiler::with_defaults(Arc::new(args().signals()));
        assert!(profiler.try_probe().is_err());
    }
}
