//! Read-only views of the stream manager.
//!
//! Observers (memory indicator, loading overlay, CLI) only ever receive these
//! owned values, never references into the manager's tables.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::catalog::{AssetKey, DetailLevel, RegionId};

/// Memory budget view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    /// Bytes of resident assets (published and stale).
    pub used_bytes: u64,
    /// Budget for the current preset.
    pub capacity_bytes: u64,
    /// Bytes reserved for in-flight loads.
    pub reserved_bytes: u64,
    /// Bytes of assets that are the current target of their region.
    pub pinned_bytes: u64,
    /// Bytes the desired state needs in total.
    pub demand_bytes: u64,
}

impl MemoryUsage {
    pub fn utilization(&self) -> f64 {
        if self.capacity_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.capacity_bytes as f64
        }
    }

    /// The desired working set does not fit the budget.
    pub fn under_pressure(&self) -> bool {
        self.demand_bytes > self.capacity_bytes
    }

    /// Resident bytes above the budget. Non-zero only while pinned assets
    /// alone exceed it.
    pub fn overshoot_bytes(&self) -> u64 {
        self.used_bytes.saturating_sub(self.capacity_bytes)
    }
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} used ({} reserved)",
            crate::config::format_size(self.used_bytes),
            crate::config::format_size(self.capacity_bytes),
            crate::config::format_size(self.reserved_bytes)
        )
    }
}

/// State of a pending load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    /// Admitted and in flight.
    InFlight,
    /// Waiting for budget.
    Deferred,
    /// Waiting for a retry timer after a failure.
    RetryScheduled,
    /// Deferred past the bound; no further attempts until the target changes.
    Unsatisfiable,
}

impl fmt::Display for PendingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PendingState::InFlight => "in flight",
            PendingState::Deferred => "deferred",
            PendingState::RetryScheduled => "retry scheduled",
            PendingState::Unsatisfiable => "unsatisfiable",
        };
        f.write_str(s)
    }
}

/// One pending load.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLoad {
    pub region: RegionId,
    pub level: DetailLevel,
    /// Byte progress in `[0, 1]`; zero unless in flight.
    pub progress: f32,
    pub state: PendingState,
}

/// Per-region status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionStatus {
    /// Nothing wanted, nothing shown.
    Unloaded,
    /// Showing the target level.
    Ready { level: DetailLevel },
    /// Loading `target`, showing `showing` meanwhile (if anything).
    Loading {
        target: DetailLevel,
        showing: Option<DetailLevel>,
    },
    /// Waiting for budget.
    Deferred {
        target: DetailLevel,
        showing: Option<DetailLevel>,
    },
    /// Showing a coarser fallback while the target waits for a retry or has
    /// exhausted its retries.
    Degraded {
        target: DetailLevel,
        showing: DetailLevel,
    },
    /// Deferred past the bound.
    BudgetUnsatisfiable { target: DetailLevel },
    /// Every level failed and nothing is visible.
    Unavailable,
}

impl RegionStatus {
    /// Level currently visible, if any.
    pub fn showing(&self) -> Option<DetailLevel> {
        match *self {
            RegionStatus::Ready { level } => Some(level),
            RegionStatus::Loading { showing, .. } | RegionStatus::Deferred { showing, .. } => {
                showing
            }
            RegionStatus::Degraded { showing, .. } => Some(showing),
            RegionStatus::Unloaded
            | RegionStatus::BudgetUnsatisfiable { .. }
            | RegionStatus::Unavailable => None,
        }
    }
}

impl fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionStatus::Unloaded => write!(f, "unloaded"),
            RegionStatus::Ready { level } => write!(f, "ready ({})", level),
            RegionStatus::Loading { target, .. } => write!(f, "loading {}", target),
            RegionStatus::Deferred { target, .. } => write!(f, "deferred {}", target),
            RegionStatus::Degraded { target, showing } => {
                write!(f, "degraded ({} instead of {})", showing, target)
            }
            RegionStatus::BudgetUnsatisfiable { target } => {
                write!(f, "budget unsatisfiable for {}", target)
            }
            RegionStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Why an asset was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Freed space for a higher-priority admission.
    Admission,
    /// The region's system was disabled or it left the desired state.
    Unloaded,
    /// The budget target was lowered below resident bytes.
    BudgetShrink,
}

/// Notable things that happened inside the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A load was admitted and started.
    Issued { key: AssetKey, generation: u64 },
    /// A resident stale asset was shown again without I/O.
    Republished { key: AssetKey },
    /// A completed load became visible.
    Published { key: AssetKey, generation: u64 },
    /// An obsolete completion was dropped.
    Discarded { key: AssetKey, generation: u64 },
    Cancelled { key: AssetKey },
    Evicted {
        key: AssetKey,
        bytes: u64,
        reason: EvictionReason,
    },
    Deferred { key: AssetKey, shortfall: u64 },
    BudgetUnsatisfiable { key: AssetKey },
    Failed {
        key: AssetKey,
        error: String,
        attempt: u32,
        retry_in: Option<Duration>,
    },
    /// A coarser level is being loaded because nothing is visible.
    FellBack {
        region: RegionId,
        from: DetailLevel,
        to: DetailLevel,
    },
    Unavailable { region: RegionId },
    /// Renderer resources were lost and every asset was dropped.
    Invalidated { assets: usize },
}

/// Summary of one reconcile transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    pub issued: usize,
    pub republished: usize,
    pub cancelled: usize,
    pub evicted: usize,
    pub deferred: usize,
    /// The desired working set exceeds the budget target.
    pub pressure: bool,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.issued == 0 && self.republished == 0 && self.cancelled == 0 && self.evicted == 0
    }
}

/// Complete read-only view of the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSnapshot {
    pub detail_levels: BTreeMap<RegionId, DetailLevel>,
    pub memory: MemoryUsage,
    pub pending: Vec<PendingLoad>,
    pub unavailable: Vec<RegionId>,
}
