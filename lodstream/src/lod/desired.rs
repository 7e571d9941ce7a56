//! Desired state produced by one evaluation.

use std::collections::BTreeMap;

use super::priority::RegionPriority;
use crate::catalog::{DetailLevel, RegionId};

/// Target for one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionTarget {
    pub level: DetailLevel,
    pub priority: RegionPriority,
    /// Camera distance to the region's representative point.
    pub distance: f32,
    pub focused: bool,
}

/// Direction of a tier change between two evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Upgrade,
    Downgrade,
}

/// A region whose target tier differs from the previous evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTransition {
    pub region: RegionId,
    pub from: DetailLevel,
    pub to: DetailLevel,
    pub priority: RegionPriority,
}

impl TierTransition {
    pub fn kind(&self) -> TransitionKind {
        if self.to > self.from {
            TransitionKind::Upgrade
        } else {
            TransitionKind::Downgrade
        }
    }
}

/// Per-region target detail levels plus their priority ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredState {
    targets: BTreeMap<RegionId, RegionTarget>,
    transitions: Vec<TierTransition>,
}

impl DesiredState {
    pub(crate) fn new(
        targets: BTreeMap<RegionId, RegionTarget>,
        mut transitions: Vec<TierTransition>,
    ) -> Self {
        transitions.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.region.cmp(&b.region)));
        Self {
            targets,
            transitions,
        }
    }

    /// Build a state directly from explicit targets (no transitions).
    ///
    /// Intended for hosts that compute their own targets and for tests.
    pub fn from_targets(targets: impl IntoIterator<Item = (RegionId, RegionTarget)>) -> Self {
        Self::new(targets.into_iter().collect(), Vec::new())
    }

    /// Target for `region`; regions absent from the state are `Unloaded`.
    pub fn target(&self, region: &str) -> Option<&RegionTarget> {
        self.targets.get(region)
    }

    pub fn level(&self, region: &str) -> DetailLevel {
        self.targets
            .get(region)
            .map(|t| t.level)
            .unwrap_or(DetailLevel::Unloaded)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionId, &RegionTarget)> {
        self.targets.iter()
    }

    /// Regions with a loadable target, highest priority first.
    ///
    /// Equal priorities are ordered by region id for determinism.
    pub fn ranked(&self) -> Vec<(&RegionId, &RegionTarget)> {
        let mut ranked: Vec<_> = self
            .targets
            .iter()
            .filter(|(_, t)| t.level.is_loadable())
            .collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| b.priority.cmp(&a.priority).then(a_id.cmp(b_id)));
        ranked
    }

    /// Tier changes relative to the previous evaluation, highest priority first.
    pub fn transitions(&self) -> &[TierTransition] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
