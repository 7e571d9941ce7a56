//! Capability signal sources consumed by the profiler.

use std::time::Duration;

/// Result of a short benchmark render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkSample {
    /// Average frame time of the benchmark scene in milliseconds.
    pub frame_ms: f32,
    /// Wall time the benchmark took.
    pub elapsed: Duration,
}

/// Host-provided capability signals.
///
/// Every method may return `None` when the platform cannot provide the
/// signal. Implementations must honour the `window` passed to
/// [`benchmark`](Self::benchmark) so the probe never blocks the render
/// thread for longer than that.
pub trait CapabilitySignals: Send + Sync {
    /// Run a benchmark render bounded by `window`.
    fn benchmark(&self, window: Duration) -> Option<BenchmarkSample>;

    /// User-agent or platform identification string.
    fn user_agent(&self) -> Option<String>;

    /// Native device pixel ratio.
    fn device_pixel_ratio(&self) -> Option<f32>;

    /// Whether high-precision fragment shaders are supported.
    fn high_precision_supported(&self) -> Option<bool>;
}

/// Plain-data signal source.
///
/// Used by hosts that gather signals up front, by the CLI, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSignals {
    pub benchmark_frame_ms: Option<f32>,
    pub benchmark_elapsed: Duration,
    pub user_agent: Option<String>,
    pub device_pixel_ratio: Option<f32>,
    pub high_precision: Option<bool>,
}

impl StaticSignals {
    /// No signals at all; probing yields the conservative profile.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_benchmark(mut self, frame_ms: f32, elapsed: Duration) -> Self {
        self.benchmark_frame_ms = Some(frame_ms);
        self.benchmark_elapsed = elapsed;
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.device_pixel_ratio = Some(ratio);
        self
    }

    pub fn with_high_precision(mut self, supported: bool) -> Self {
        self.high_precision = Some(supported);
        self
    }
}

impl CapabilitySignals for StaticSignals {
    fn benchmark(&self, _window: Duration) -> Option<BenchmarkSample> {
        self.benchmark_frame_ms.map(|frame_ms| BenchmarkSample {
            frame_ms,
            elapsed: self.benchmark_elapsed,
        })
    }

    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }

    fn device_pixel_ratio(&self) -> Option<f32> {
        self.device_pixel_ratio
    }

    fn high_precision_supported(&self) -> Option<bool> {
        self.high_precision
    }
}
