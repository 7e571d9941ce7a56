//! Camera-driven detail evaluation.
//!
//! # Tier Selection
//!
//! ```text
//! distance:  0 ──── tissue ──── organ ──── region ──────────►
//! tier:        Tissue     Organ      Region        Body
//!
//! with hysteresis ε around every threshold:
//!   finer   only when d < threshold - ε
//!   coarser only when d > threshold + ε
//! ```
//!
//! The distance tier is then shaped by focus, capped by the quality preset's
//! `max_detail`, and forced to `Unloaded` for disabled systems. Without a
//! focus only regions inside `near_radius` may reach the finest tier; that
//! boundary uses the same ε band.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use glam::Vec3;

use super::config::LodConfig;
use super::desired::{DesiredState, RegionTarget, TierTransition};
use super::priority::RegionPriority;
use crate::catalog::{Catalog, DetailLevel, RegionId, SystemTag};

/// Maps camera position, focus and enabled systems to a [`DesiredState`].
///
/// The only state kept between evaluations is each region's previous
/// distance tier and near-radius membership (for hysteresis), the previous
/// targets (for transitions) and the focus history (for priority
/// tie-breaking).
#[derive(Debug)]
pub struct LodEvaluator {
    config: LodConfig,
    catalog: Arc<Catalog>,
    max_detail: DetailLevel,
    distance_tiers: HashMap<RegionId, DetailLevel>,
    near: HashSet<RegionId>,
    previous_targets: HashMap<RegionId, DetailLevel>,
    focus_clock: u64,
    last_focus: Option<RegionId>,
    focus_stamps: HashMap<RegionId, u64>,
}

impl LodEvaluator {
    pub fn new(config: LodConfig, catalog: Arc<Catalog>) -> Self {
        Self {
            config,
            catalog,
            max_detail: DetailLevel::FINEST,
            distance_tiers: HashMap::new(),
            near: HashSet::new(),
            previous_targets: HashMap::new(),
            focus_clock: 0,
            last_focus: None,
            focus_stamps: HashMap::new(),
        }
    }

    /// Compute the desired state for this frame.
    pub fn evaluate(
        &mut self,
        camera: Vec3,
        focus: Option<&RegionId>,
        enabled: &HashSet<SystemTag>,
    ) -> DesiredState {
        let focus = focus.filter(|id| self.catalog.region(id.as_str()).is_some());
        self.note_focus(focus);

        let catalog = Arc::clone(&self.catalog);
        let mut targets = BTreeMap::new();
        let mut transitions = Vec::new();

        for region in catalog.regions() {
            let distance = region.distance_to(camera);
            let enabled_region = enabled.contains(&region.system);

            let target = if enabled_region {
                let previous = self.distance_tiers.get(&region.id).copied();
                let distance_tier = self.distance_tier(distance, previous);
                self.distance_tiers.insert(region.id.clone(), distance_tier);
                let near = self.update_near(&region.id, distance, previous.is_some());

                let focused = focus == Some(&region.id);
                let shaped = self.shape(distance_tier, near, focus.is_some(), focused);
                let recency = self.focus_stamps.get(&region.id).copied().unwrap_or(0);
                RegionTarget {
                    level: shaped.min(self.max_detail),
                    priority: RegionPriority::for_distance(distance, focused, recency),
                    distance,
                    focused,
                }
            } else {
                // Re-enabling starts from a clean distance tier.
                self.distance_tiers.remove(&region.id);
                self.near.remove(&region.id);
                RegionTarget {
                    level: DetailLevel::Unloaded,
                    priority: RegionPriority::ZERO,
                    distance,
                    focused: false,
                }
            };

            let before = self
                .previous_targets
                .insert(region.id.clone(), target.level)
                .unwrap_or(DetailLevel::Unloaded);
            if before != target.level {
                transitions.push(TierTransition {
                    region: region.id.clone(),
                    from: before,
                    to: target.level,
                    priority: target.priority,
                });
            }
            targets.insert(region.id.clone(), target);
        }

        if !transitions.is_empty() {
            tracing::debug!(
                transitions = transitions.len(),
                focus = focus.map(|f| f.as_str()).unwrap_or("-"),
                max_detail = %self.max_detail,
                "LOD targets changed"
            );
        }

        DesiredState::new(targets, transitions)
    }

    fn note_focus(&mut self, focus: Option<&RegionId>) {
        if focus == self.last_focus.as_ref() {
            return;
        }
        self.last_focus = focus.cloned();
        if let Some(id) = focus {
            self.focus_clock += 1;
            self.focus_stamps.insert(id.clone(), self.focus_clock);
        }
    }

    /// Distance tier with hysteresis against the previous tier.
    fn distance_tier(&self, distance: f32, previous: Option<DetailLevel>) -> DetailLevel {
        let plain = self.tier_at(distance, 0.0);
        let Some(previous) = previous else {
            return plain;
        };
        let eps = self.config.hysteresis;
        if plain > previous {
            previous.max(self.tier_at(distance, -eps))
        } else if plain < previous {
            previous.min(self.tier_at(distance, eps))
        } else {
            previous
        }
    }

    /// Near-radius membership with hysteresis: enter below `near_radius - ε`,
    /// leave above `near_radius + ε`. A region seen for the first time uses
    /// the plain radius.
    fn update_near(&mut self, id: &RegionId, distance: f32, seen: bool) -> bool {
        let radius = self.config.near_radius;
        let eps = self.config.hysteresis;
        let was_near = self.near.contains(id);
        let near = if !seen {
            distance <= radius
        } else if was_near {
            distance <= radius + eps
        } else {
            distance < radius - eps
        };
        if near {
            self.near.insert(id.clone());
        } else {
            self.near.remove(id);
        }
        near
    }

    fn tier_at(&self, distance: f32, offset: f32) -> DetailLevel {
        if distance < self.config.tissue_distance + offset {
            DetailLevel::Tissue
        } else if distance < self.config.organ_distance + offset {
            DetailLevel::Organ
        } else if distance < self.config.region_distance + offset {
            DetailLevel::Region
        } else {
            DetailLevel::Body
        }
    }

    fn shape(
        &self,
        tier: DetailLevel,
        near: bool,
        has_focus: bool,
        focused: bool,
    ) -> DetailLevel {
        if has_focus {
            if focused {
                tier
            } else {
                tier.coarser()
            }
        } else if near {
            tier
        } else {
            tier.min(DetailLevel::FINEST.coarser())
        }
    }

    /// Cap every target at `level` (set from the quality preset).
    pub fn set_max_detail(&mut self, level: DetailLevel) {
        let level = level.max(DetailLevel::Body);
        if level != self.max_detail {
            tracing::debug!(from = %self.max_detail, to = %level, "LOD detail ceiling changed");
            self.max_detail = level;
        }
    }

    pub fn max_detail(&self) -> DetailLevel {
        self.max_detail
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Forget hysteresis and transition memory.
    pub fn reset(&mut self) {
        self.distance_tiers.clear();
        self.near.clear();
        self.previous_targets.clear();
    }
}
