//! Renderer resource-loss tracking.
//!
//! A single GPU context loss is recovered by invalidating and re-streaming
//! assets. Repeated losses within a short window indicate the device is
//! running out of memory, so the session switches to memory reduction mode.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Losses within the window that trigger memory reduction mode.
pub const DEFAULT_LOSS_THRESHOLD: usize = 3;

/// Window over which losses are counted.
pub const DEFAULT_LOSS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Outcome of recording one context loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossVerdict {
    /// Recover normally.
    Recover,
    /// Threshold reached: enter memory reduction mode.
    ReduceMemory,
}

/// Sliding-window counter of renderer resource losses.
#[derive(Debug, Clone)]
pub struct ContextLossTracker {
    threshold: usize,
    window: Duration,
    losses: VecDeque<Instant>,
    total: u64,
}

impl ContextLossTracker {
    pub fn new(threshold: usize, window: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            window,
            losses: VecDeque::new(),
            total: 0,
        }
    }

    /// Record a loss at `at` and decide how to react.
    pub fn record(&mut self, at: Instant) -> LossVerdict {
        self.total += 1;
        while let Some(&oldest) = self.losses.front() {
            if at.saturating_duration_since(oldest) > self.window {
                self.losses.pop_front();
            } else {
                break;
            }
        }
        self.losses.push_back(at);

        if self.losses.len() >= self.threshold {
            tracing::warn!(
                losses = self.losses.len(),
                window_secs = self.window.as_secs(),
                "Repeated renderer resource loss"
            );
            LossVerdict::ReduceMemory
        } else {
            LossVerdict::Recover
        }
    }

    /// Losses currently inside the window.
    pub fn recent(&self) -> usize {
        self.losses.len()
    }

    /// Losses recorded over the tracker's lifetime.
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Default for ContextLossTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LOSS_THRESHOLD, DEFAULT_LOSS_WINDOW)
    }
}
