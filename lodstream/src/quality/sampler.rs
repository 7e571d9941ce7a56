//! Rolling frame-time window.
//!
//! Keeps the most recent frame durations in a fixed-capacity ring and derives
//! a smoothed FPS from their mean. Individual samples are ephemeral; only the
//! aggregate is consumed by the quality controller.

use std::collections::VecDeque;

/// Default ring capacity (about one second at 60 FPS).
pub const DEFAULT_SAMPLER_CAPACITY: usize = 60;

/// Frame durations above this are clamped (debugger pauses, tab switches).
pub const MAX_FRAME_MS: f32 = 1000.0;

/// One frame-time observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTimeSample {
    /// Sampler clock at the end of the frame, in milliseconds.
    pub at_ms: f64,
    pub duration_ms: f32,
}

/// Fixed-capacity window of recent frame durations.
#[derive(Debug, Clone)]
pub struct FrameTimeSampler {
    samples: VecDeque<FrameTimeSample>,
    capacity: usize,
    /// Running sum of durations currently in the window.
    window_sum_ms: f64,
    /// Monotonic clock advanced by every recorded frame.
    clock_ms: f64,
}

impl FrameTimeSampler {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            window_sum_ms: 0.0,
            clock_ms: 0.0,
        }
    }

    /// Record one frame duration in milliseconds.
    ///
    /// Non-finite or negative durations are ignored.
    pub fn record(&mut self, duration_ms: f32) {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return;
        }
        let duration_ms = duration_ms.min(MAX_FRAME_MS);
        self.clock_ms += duration_ms as f64;

        if self.samples.len() == self.capacity {
            if let Some(old) = self.samples.pop_front() {
                self.window_sum_ms -= old.duration_ms as f64;
            }
        }
        self.samples.push_back(FrameTimeSample {
            at_ms: self.clock_ms,
            duration_ms,
        });
        self.window_sum_ms += duration_ms as f64;
    }

    /// Smoothed FPS over the window, or `None` when empty.
    pub fn smoothed_fps(&self) -> Option<f32> {
        let mean = self.mean_frame_ms()?;
        if mean <= 0.0 {
            return None;
        }
        Some((1000.0 / mean) as f32)
    }

    /// Mean frame duration over the window.
    pub fn mean_frame_ms(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.window_sum_ms / self.samples.len() as f64)
        }
    }

    /// Sampler clock: total recorded frame time since creation.
    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    /// Drop all samples while keeping the clock running.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.window_sum_ms = 0.0;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<FrameTimeSample> {
        self.samples.back().copied()
    }
}

impl Default for FrameTimeSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sampler_has_no_fps() {
        let sampler = FrameTimeSampler::default();
        assert!(sampler.smoothed_fps().is_none());
        assert!(sampler.is_empty());
    }

    #[test]
    fn test_constant_frames() {
        let mut sampler = FrameTimeSampler::new(30);
        for _ in 0..30 {
            sampler.record(20.0);
        }
        let fps = sampler.smoothed_fps().unwrap();
        assert!((fps - 50.0).abs() < 0.01, "got {fps}");
        assert!((sampler.clock_ms() - 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let mut sampler = FrameTimeSampler::new(4);
        for _ in 0..4 {
            sampler.record(100.0);
        }
        for _ in 0..4 {
            sampler.record(10.0);
        }
        assert_eq!(sampler.len(), 4);
        let fps = sampler.smoothed_fps().unwrap();
        assert!((fps - 100.0).abs() < 0.01, "old samples must be gone, got {fps}");
    }

    #[test]
    fn test_invalid_samples_ignored() {
        let mut sampler = FrameTimeSampler::new(4);
        sampler.record(f32::NAN);
        sampler.record(-5.0);
        assert!(sampler.is_empty());
        assert_eq!(sampler.clock_ms(), 0.0);
    }

    #[test]
    fn test_huge_frames_clamped() {
        let mut sampler = FrameTimeSampler::new(4);
        sampler.record(60_000.0);
        assert_eq!(sampler.latest().unwrap().duration_ms, MAX_FRAME_MS);
    }

    #[test]
    fn test_clear_keeps_clock() {
        let mut sampler = FrameTimeSampler::new(4);
        sampler.record(16.0);
        sampler.clear();
        assert!(sampler.is_empty());
        assert!((sampler.clock_ms() - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_capacity_is_promoted() {
        let sampler = FrameTimeSampler::new(0);
        assert_eq!(sampler.capacity(), 1);
    }
}
