//! Asset stream manager: diff, admission, eviction, load, publish.
//!
//! # Transaction
//!
//! Every call that changes state runs one transaction from the update loop:
//!
//! ```text
//! reconcile(desired)                drain_completions()
//!   │ sync targets                    │ publish if it fits, else defer
//!   │                                 │ discard stale / record failure
//!   │ unload disabled regions         │
//!   └──────────────┬──────────────────┘
//!                  ▼
//!                pump
//!                  │ plan each region (target, fallback, retry timers)
//!                  │ highest priority first:
//!                  │   cancel obsolete request
//!                  │   republish resident asset, or
//!                  │   admit (evicting stale assets) and spawn, or defer
//!                  └ evict stale assets while used > target
//! ```
//!
//! Loads run as tokio tasks and report back over an unbounded channel. A
//! completion is published only if it carries its region's current
//! generation; anything else is discarded and its handle released.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::budget::MemoryBudget;
use super::config::StreamConfig;
use super::eviction::{eviction_order, select_victims, EvictionCandidate};
use super::loader::{AssetLoader, LoadError, LoadProgress, RendererHandle};
use super::request::{Completion, StreamRequest};
use super::snapshot::{
    EvictionReason, MemoryUsage, PendingLoad, PendingState, ReconcileReport, RegionStatus,
    StreamEvent, StreamSnapshot,
};
use crate::catalog::{AssetDescriptor, AssetKey, Catalog, DetailLevel, RegionDescriptor, RegionId};
use crate::lod::{DesiredState, RegionPriority};

/// A resident asset owned by the manager.
#[derive(Debug)]
struct LoadedAsset {
    descriptor: AssetDescriptor,
    handle: RendererHandle,
    last_access: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Deferral {
    level: DetailLevel,
    since: Instant,
    gave_up: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct FailureRecord {
    attempts: u32,
    /// `None` once retries are exhausted.
    retry_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct RegionSlot {
    generation: u64,
    target: DetailLevel,
    priority: RegionPriority,
    /// Level that is the current target of this region and must not be
    /// evicted.
    pinned: Option<DetailLevel>,
    /// Bytes of the pinned asset.
    demand: u64,
    published: Option<DetailLevel>,
    loaded: BTreeMap<DetailLevel, LoadedAsset>,
    request: Option<StreamRequest>,
    deferral: Option<Deferral>,
    failures: BTreeMap<DetailLevel, FailureRecord>,
    unavailable: bool,
}

impl RegionSlot {
    fn reset_target_state(&mut self) {
        self.failures.clear();
        self.deferral = None;
        self.unavailable = false;
    }

    /// Cancel the in-flight request, releasing its reservation immediately.
    fn cancel_request(&mut self, budget: &mut MemoryBudget) -> Option<AssetKey> {
        let request = self.request.take()?;
        request.cancel.cancel();
        budget.release_reservation(request.size_bytes());
        self.generation += 1;
        Some(request.key())
    }
}

#[derive(Debug, Clone)]
enum Plan {
    Satisfied(DetailLevel),
    Load {
        asset: AssetDescriptor,
        /// Desired level this load stands in for.
        fallback_from: Option<DetailLevel>,
    },
    Wait(DetailLevel),
    Unavailable,
}

impl Plan {
    fn pinned(&self) -> Option<DetailLevel> {
        match self {
            Plan::Satisfied(level) | Plan::Wait(level) => Some(*level),
            Plan::Load { asset, .. } => Some(asset.level),
            Plan::Unavailable => None,
        }
    }
}

/// Owns loaded assets, the memory budget and every in-flight request.
pub struct AssetStreamManager {
    config: StreamConfig,
    catalog: Arc<Catalog>,
    loader: Arc<dyn AssetLoader>,
    runtime: Handle,
    budget: MemoryBudget,
    regions: BTreeMap<RegionId, RegionSlot>,
    next_request_id: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    events: Vec<StreamEvent>,
}

impl std::fmt::Debug for AssetStreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStreamManager")
            .field("loader", &self.loader.name())
            .field("budget", &self.budget)
            .field("regions", &self.regions.len())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl AssetStreamManager {
    /// Create a manager that spawns loads on `runtime`.
    pub fn new(
        config: StreamConfig,
        catalog: Arc<Catalog>,
        loader: Arc<dyn AssetLoader>,
        runtime: Handle,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let budget = MemoryBudget::new(config.capacity_bytes);
        Self {
            config,
            catalog,
            loader,
            runtime,
            budget,
            regions: BTreeMap::new(),
            next_request_id: 0,
            completions_tx,
            completions_rx,
            events: Vec::new(),
        }
    }

    /// Apply a new desired state. Never blocks; loads are spawned.
    pub fn reconcile(&mut self, desired: &DesiredState) -> ReconcileReport {
        let now = Instant::now();
        let mut report = ReconcileReport::default();

        for (id, target) in desired.iter() {
            let slot = self.regions.entry(id.clone()).or_default();
            if slot.target != target.level {
                slot.reset_target_state();
                slot.target = target.level;
            }
            slot.priority = if target.level.is_loadable() {
                target.priority
            } else {
                RegionPriority::ZERO
            };
        }
        for (id, slot) in self.regions.iter_mut() {
            if desired.target(id.as_str()).is_none() && slot.target != DetailLevel::Unloaded {
                slot.reset_target_state();
                slot.target = DetailLevel::Unloaded;
                slot.priority = RegionPriority::ZERO;
            }
        }

        self.unload_disabled(&mut report);
        self.pump(now, &mut report);
        report.pressure = self.under_pressure();

        if !report.is_noop() || report.deferred > 0 {
            tracing::debug!(
                issued = report.issued,
                republished = report.republished,
                cancelled = report.cancelled,
                evicted = report.evicted,
                deferred = report.deferred,
                used = self.budget.used(),
                reserved = self.budget.reserved(),
                target = self.budget.target(),
                "Reconciled desired state"
            );
        }
        report
    }

    /// Process finished loads and service deferrals and retry timers.
    ///
    /// Returns every event recorded since the previous call, including those
    /// from `reconcile`.
    pub fn drain_completions(&mut self) -> Vec<StreamEvent> {
        let now = Instant::now();
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.handle_completion(completion, now);
        }
        let mut report = ReconcileReport::default();
        self.pump(now, &mut report);
        std::mem::take(&mut self.events)
    }

    /// Wait until no load is in flight, processing completions as they
    /// arrive. Returns the accumulated events.
    pub async fn settle(&mut self) -> Vec<StreamEvent> {
        while self.in_flight() > 0 {
            let Some(completion) = self.completions_rx.recv().await else {
                break;
            };
            let now = Instant::now();
            self.handle_completion(completion, now);
            let mut report = ReconcileReport::default();
            self.pump(now, &mut report);
        }
        self.drain_completions()
    }

    /// Drop every asset after renderer resources were lost and re-issue the
    /// current desired state from scratch. Returns the number of assets
    /// invalidated.
    pub fn invalidate_all(&mut self) -> usize {
        let now = Instant::now();
        let mut invalidated = 0;
        for slot in self.regions.values_mut() {
            if let Some(request) = slot.request.take() {
                request.cancel.cancel();
            }
            for (_, asset) in std::mem::take(&mut slot.loaded) {
                self.loader.release(asset.handle);
                invalidated += 1;
            }
            slot.published = None;
            slot.pinned = None;
            slot.generation += 1;
            slot.reset_target_state();
        }
        self.budget.reset();
        self.events.push(StreamEvent::Invalidated {
            assets: invalidated,
        });
        tracing::warn!(assets = invalidated, "Renderer resources lost, re-streaming");

        let mut report = ReconcileReport::default();
        self.pump(now, &mut report);
        invalidated
    }

    /// Change the budget target (preset change, memory reduction).
    pub fn set_capacity(&mut self, bytes: u64) {
        if bytes == self.budget.target() {
            return;
        }
        let now = Instant::now();
        tracing::info!(
            from = self.budget.target(),
            to = bytes,
            used = self.budget.used(),
            "Memory budget changed"
        );
        self.budget.set_target(bytes);
        for slot in self.regions.values_mut() {
            if let Some(deferral) = slot.deferral.as_mut() {
                deferral.gave_up = false;
                deferral.since = now;
            }
        }
        let mut report = ReconcileReport::default();
        self.pump(now, &mut report);
    }

    fn unload_disabled(&mut self, report: &mut ReconcileReport) {
        let mut evict = Vec::new();
        for (id, slot) in self.regions.iter_mut() {
            if slot.target.is_loadable() {
                continue;
            }
            if let Some(key) = slot.cancel_request(&mut self.budget) {
                tracing::debug!(asset = %key, "Cancelled load for unloaded region");
                self.events.push(StreamEvent::Cancelled { key });
                report.cancelled += 1;
            }
            slot.pinned = None;
            slot.demand = 0;
            evict.extend(
                slot.loaded
                    .keys()
                    .map(|level| AssetKey::new(id.clone(), *level)),
            );
        }
        self.evict(&evict, EvictionReason::Unloaded, report);
    }

    fn pump(&mut self, now: Instant, report: &mut ReconcileReport) {
        let catalog = Arc::clone(&self.catalog);
        let mut plans = Vec::new();

        for (id, slot) in self.regions.iter_mut() {
            if !slot.target.is_loadable() {
                continue;
            }
            let Some(region) = catalog.region(id.as_str()) else {
                continue;
            };
            let plan = plan_region(slot, region, now);
            slot.pinned = plan.pinned();
            slot.demand = slot
                .pinned
                .and_then(|level| region.assets.get(&level))
                .map(|asset| asset.size_bytes)
                .unwrap_or(0);

            let unavailable = matches!(plan, Plan::Unavailable);
            if unavailable && !slot.unavailable {
                tracing::warn!(region = %id, "Every detail level failed, region unavailable");
                self.events.push(StreamEvent::Unavailable { region: id.clone() });
            }
            slot.unavailable = unavailable;
            plans.push((id.clone(), slot.priority, plan));
        }

        plans.sort_by(|(a_id, a, _), (b_id, b, _)| b.cmp(a).then(a_id.cmp(b_id)));

        for (id, priority, plan) in plans {
            match plan {
                Plan::Load {
                    asset,
                    fallback_from,
                } => self.admit(&id, priority, asset, fallback_from, now, report),
                Plan::Satisfied(_) | Plan::Wait(_) | Plan::Unavailable => {
                    self.retire(&id, now, report)
                }
            }
        }

        self.enforce_target(report);
    }

    fn admit(
        &mut self,
        id: &RegionId,
        priority: RegionPriority,
        asset: AssetDescriptor,
        fallback_from: Option<DetailLevel>,
        now: Instant,
        report: &mut ReconcileReport,
    ) {
        let Some(slot) = self.regions.get_mut(id) else {
            return;
        };

        if let Some(request) = &slot.request {
            if request.asset.level == asset.level {
                return;
            }
            if let Some(key) = slot.cancel_request(&mut self.budget) {
                tracing::debug!(asset = %key, replacement = %asset.level, "Cancelled obsolete load");
                self.events.push(StreamEvent::Cancelled { key });
                report.cancelled += 1;
            }
        }

        if let Some(resident) = slot.loaded.get_mut(&asset.level) {
            resident.last_access = now;
            slot.published = Some(asset.level);
            slot.deferral = None;
            let key = asset.key();
            tracing::debug!(asset = %key, "Republished resident asset");
            self.events.push(StreamEvent::Republished { key });
            report.republished += 1;
            return;
        }

        if let Some(deferral) = slot.deferral {
            if deferral.gave_up && deferral.level == asset.level {
                return;
            }
        }

        let size = asset.size_bytes;
        if !self.budget.fits(size) {
            let shortfall = self.budget.shortfall(size);
            match self.plan_eviction(id, priority, shortfall) {
                Some(victims) => {
                    let keys: Vec<_> = victims.into_iter().map(|v| v.key).collect();
                    self.evict(&keys, EvictionReason::Admission, report);
                }
                None => {
                    self.defer(id, &asset, shortfall, now, report);
                    return;
                }
            }
        }

        self.issue(id, priority, asset, fallback_from, now, report);
    }

    /// Nothing to load: drop an obsolete request and any deferral.
    fn retire(&mut self, id: &RegionId, now: Instant, report: &mut ReconcileReport) {
        let Some(slot) = self.regions.get_mut(id) else {
            return;
        };
        slot.deferral = None;
        if let Some(key) = slot.cancel_request(&mut self.budget) {
            tracing::debug!(asset = %key, "Cancelled load, region already satisfied");
            self.events.push(StreamEvent::Cancelled { key });
            report.cancelled += 1;
        }
        if let Some(asset) = slot.published.and_then(|level| slot.loaded.get_mut(&level)) {
            asset.last_access = now;
        }
    }

    fn plan_eviction(
        &self,
        requester: &RegionId,
        requester_priority: RegionPriority,
        needed: u64,
    ) -> Option<Vec<EvictionCandidate>> {
        let mut candidates = Vec::new();
        for (id, slot) in &self.regions {
            for (level, asset) in &slot.loaded {
                if slot.pinned == Some(*level) {
                    continue;
                }
                let visible = slot.published == Some(*level);
                let priority = if visible {
                    slot.priority
                } else {
                    RegionPriority::ZERO
                };
                if visible && id != requester && priority >= requester_priority {
                    continue;
                }
                candidates.push(EvictionCandidate {
                    key: asset.descriptor.key(),
                    bytes: asset.descriptor.size_bytes,
                    priority,
                    last_access: asset.last_access,
                });
            }
        }
        select_victims(candidates, needed)
    }

    fn evict(&mut self, keys: &[AssetKey], reason: EvictionReason, report: &mut ReconcileReport) {
        for key in keys {
            let Some(slot) = self.regions.get_mut(&key.region) else {
                continue;
            };
            let Some(asset) = slot.loaded.remove(&key.level) else {
                continue;
            };
            if slot.published == Some(key.level) {
                slot.published = None;
            }
            let bytes = asset.descriptor.size_bytes;
            self.budget.free(bytes);
            self.loader.release(asset.handle);
            tracing::debug!(asset = %key, bytes, reason = ?reason, "Evicted asset");
            self.events.push(StreamEvent::Evicted {
                key: key.clone(),
                bytes,
                reason,
            });
            report.evicted += 1;
        }
    }

    fn defer(
        &mut self,
        id: &RegionId,
        asset: &AssetDescriptor,
        shortfall: u64,
        now: Instant,
        report: &mut ReconcileReport,
    ) {
        let Some(slot) = self.regions.get_mut(id) else {
            return;
        };
        report.deferred += 1;
        let key = asset.key();
        match slot.deferral.as_mut() {
            Some(deferral) if deferral.level == asset.level => {
                if !deferral.gave_up && now.duration_since(deferral.since) >= self.config.max_deferral
                {
                    deferral.gave_up = true;
                    tracing::warn!(
                        asset = %key,
                        needed = asset.size_bytes,
                        target = self.budget.target(),
                        deferred_secs = self.config.max_deferral.as_secs(),
                        "Budget cannot admit asset, giving up until the target changes"
                    );
                    self.events.push(StreamEvent::BudgetUnsatisfiable { key });
                }
            }
            _ => {
                slot.deferral = Some(Deferral {
                    level: asset.level,
                    since: now,
                    gave_up: false,
                });
                tracing::debug!(asset = %key, shortfall, "Deferred load, budget exhausted");
                self.events.push(StreamEvent::Deferred { key, shortfall });
            }
        }
    }

    fn issue(
        &mut self,
        id: &RegionId,
        priority: RegionPriority,
        asset: AssetDescriptor,
        fallback_from: Option<DetailLevel>,
        now: Instant,
        report: &mut ReconcileReport,
    ) {
        let Some(slot) = self.regions.get_mut(id) else {
            return;
        };

        self.budget.reserve(asset.size_bytes);
        slot.generation += 1;
        slot.deferral = None;
        self.next_request_id += 1;

        let request = StreamRequest {
            id: self.next_request_id,
            asset: asset.clone(),
            priority,
            generation: slot.generation,
            cancel: CancellationToken::new(),
            progress: LoadProgress::new(asset.size_bytes),
            issued_at: now,
            fallback: fallback_from.is_some(),
        };

        let completion = Completion {
            region: id.clone(),
            request_id: request.id,
            generation: request.generation,
            key: request.key(),
            result: Err(LoadError::Cancelled),
        };
        let loader = Arc::clone(&self.loader);
        let tx = self.completions_tx.clone();
        let timeout = self.config.load_timeout;
        let load = loader.load(asset.clone(), request.progress.clone(), request.cancel.clone());
        self.runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, load).await {
                Ok(result) => result,
                Err(_) => Err(LoadError::TimedOut),
            };
            if let Err(unsent) = tx.send(Completion {
                result,
                ..completion
            }) {
                // Manager is gone; nobody will publish this handle.
                if let Ok(handle) = unsent.0.result {
                    loader.release(handle);
                }
            }
        });

        let key = request.key();
        tracing::debug!(
            asset = %key,
            bytes = asset.size_bytes,
            generation = request.generation,
            priority = %priority,
            "Issued load"
        );
        if let Some(from) = fallback_from {
            tracing::info!(region = %id, from = %from, to = %asset.level, "Falling back to coarser detail");
            self.events.push(StreamEvent::FellBack {
                region: id.clone(),
                from,
                to: asset.level,
            });
        }
        self.events.push(StreamEvent::Issued {
            key,
            generation: request.generation,
        });
        slot.request = Some(request);
        report.issued += 1;
    }

    fn handle_completion(&mut self, completion: Completion, now: Instant) {
        let Completion {
            region,
            request_id,
            generation,
            key,
            result,
        } = completion;

        let Some(slot) = self.regions.get_mut(&region) else {
            if let Ok(handle) = result {
                self.loader.release(handle);
            }
            return;
        };

        let current = slot
            .request
            .as_ref()
            .is_some_and(|r| r.id == request_id && r.generation == generation)
            && slot.generation == generation;
        if !current {
            if let Ok(handle) = result {
                self.loader.release(handle);
            }
            tracing::debug!(asset = %key, generation, current = slot.generation, "Discarded stale completion");
            self.events.push(StreamEvent::Discarded { key, generation });
            return;
        }

        let Some(request) = slot.request.take() else {
            return;
        };
        let level = request.asset.level;
        let size = request.size_bytes();

        if let Ok(handle) = &result {
            if let Err(shortfall) = self.make_room_for_publish(&region, request.priority, size) {
                self.hold_back(&region, level, *handle, size, shortfall, key, now);
                return;
            }
        }
        let Some(slot) = self.regions.get_mut(&region) else {
            return;
        };

        match result {
            Ok(handle) => {
                self.budget.commit(size);
                if let Some(old) = slot.loaded.insert(
                    level,
                    LoadedAsset {
                        descriptor: request.asset,
                        handle,
                        last_access: now,
                    },
                ) {
                    self.budget.free(old.descriptor.size_bytes);
                    self.loader.release(old.handle);
                }
                let replaced = slot.published.replace(level);
                slot.failures.remove(&level);
                slot.unavailable = false;
                tracing::info!(
                    asset = %key,
                    generation,
                    replaced = replaced.map(|l| l.as_str()).unwrap_or("-"),
                    load_ms = now.duration_since(request.issued_at).as_millis() as u64,
                    "Published asset"
                );
                self.events.push(StreamEvent::Published { key, generation });
            }
            Err(error) if error.is_cancelled() => {
                self.budget.release_reservation(size);
            }
            Err(error) => {
                self.budget.release_reservation(size);
                let record = slot.failures.entry(level).or_default();
                record.attempts += 1;
                let retry_in = self.config.retry.delay_for_attempt(record.attempts);
                record.retry_at = retry_in.map(|delay| now + delay);
                tracing::warn!(
                    asset = %key,
                    error = %error,
                    attempt = record.attempts,
                    retry_in_ms = retry_in.map(|d| d.as_millis() as u64),
                    "Asset load failed"
                );
                self.events.push(StreamEvent::Failed {
                    key,
                    error: error.to_string(),
                    attempt: record.attempts,
                    retry_in,
                });
            }
        }
    }

    /// Evict stale assets until a finished load of `size` bytes fits the
    /// target. Returns the remaining shortfall when that is not possible.
    fn make_room_for_publish(
        &mut self,
        id: &RegionId,
        priority: RegionPriority,
        size: u64,
    ) -> Result<(), u64> {
        let overshoot = self.budget.publish_overshoot(size);
        if overshoot == 0 {
            return Ok(());
        }
        let victims = self.plan_eviction(id, priority, overshoot).ok_or(overshoot)?;
        let keys: Vec<_> = victims.into_iter().map(|v| v.key).collect();
        self.evict(&keys, EvictionReason::Admission, &mut ReconcileReport::default());
        Ok(())
    }

    /// Drop a finished load that no longer fits (the target shrank while it
    /// was in flight) and defer the level until budget frees up.
    #[allow(clippy::too_many_arguments)]
    fn hold_back(
        &mut self,
        id: &RegionId,
        level: DetailLevel,
        handle: RendererHandle,
        size: u64,
        shortfall: u64,
        key: AssetKey,
        now: Instant,
    ) {
        self.budget.release_reservation(size);
        self.loader.release(handle);
        if let Some(slot) = self.regions.get_mut(id) {
            slot.deferral = Some(Deferral {
                level,
                since: now,
                gave_up: false,
            });
        }
        tracing::debug!(
            asset = %key,
            shortfall,
            target = self.budget.target(),
            "Finished load exceeds the shrunk budget, deferred"
        );
        self.events.push(StreamEvent::Deferred { key, shortfall });
    }

    /// Evict stale assets while resident bytes exceed the target.
    fn enforce_target(&mut self, report: &mut ReconcileReport) {
        if !self.budget.over_target() {
            return;
        }
        let mut candidates = Vec::new();
        for slot in self.regions.values() {
            for (level, asset) in &slot.loaded {
                if slot.pinned == Some(*level) {
                    continue;
                }
                let priority = if slot.published == Some(*level) {
                    slot.priority
                } else {
                    RegionPriority::ZERO
                };
                candidates.push(EvictionCandidate {
                    key: asset.descriptor.key(),
                    bytes: asset.descriptor.size_bytes,
                    priority,
                    last_access: asset.last_access,
                });
            }
        }
        for candidate in eviction_order(candidates) {
            if !self.budget.over_target() {
                break;
            }
            self.evict(&[candidate.key], EvictionReason::BudgetShrink, report);
        }
        if self.budget.over_target() {
            tracing::warn!(
                used = self.budget.used(),
                target = self.budget.target(),
                "On-screen assets exceed the memory budget"
            );
        }
    }

    // -------------------------------------------------------------------------
    // Observability
    // -------------------------------------------------------------------------

    /// Visible detail level per known region (`Unloaded` when nothing shows).
    pub fn current_detail_levels(&self) -> BTreeMap<RegionId, DetailLevel> {
        self.regions
            .iter()
            .map(|(id, slot)| (id.clone(), slot.published.unwrap_or(DetailLevel::Unloaded)))
            .collect()
    }

    pub fn memory_usage(&self) -> MemoryUsage {
        let mut pinned_bytes = 0;
        let mut demand_bytes = 0;
        for slot in self.regions.values() {
            if !slot.target.is_loadable() {
                continue;
            }
            demand_bytes += slot.demand;
            if let Some(asset) = slot.pinned.and_then(|level| slot.loaded.get(&level)) {
                pinned_bytes += asset.descriptor.size_bytes;
            }
        }
        MemoryUsage {
            used_bytes: self.budget.used(),
            capacity_bytes: self.budget.target(),
            reserved_bytes: self.budget.reserved(),
            pinned_bytes,
            demand_bytes,
        }
    }

    /// The desired working set does not fit the budget target.
    pub fn under_pressure(&self) -> bool {
        self.memory_usage().under_pressure()
    }

    /// Pending loads, highest priority first.
    pub fn pending_loads(&self) -> Vec<PendingLoad> {
        let now = Instant::now();
        let mut pending: Vec<(RegionPriority, PendingLoad)> = Vec::new();
        for (id, slot) in &self.regions {
            let entry = if let Some(request) = &slot.request {
                Some(PendingLoad {
                    region: id.clone(),
                    level: request.asset.level,
                    progress: request.progress.fraction(),
                    state: PendingState::InFlight,
                })
            } else if let Some(deferral) = slot.deferral {
                Some(PendingLoad {
                    region: id.clone(),
                    level: deferral.level,
                    progress: 0.0,
                    state: if deferral.gave_up {
                        PendingState::Unsatisfiable
                    } else {
                        PendingState::Deferred
                    },
                })
            } else {
                slot.failures
                    .iter()
                    .rev()
                    .find(|(_, record)| record.retry_at.is_some_and(|at| at > now))
                    .map(|(level, _)| PendingLoad {
                        region: id.clone(),
                        level: *level,
                        progress: 0.0,
                        state: PendingState::RetryScheduled,
                    })
            };
            if let Some(entry) = entry {
                pending.push((slot.priority, entry));
            }
        }
        pending.sort_by(|(a, a_load), (b, b_load)| b.cmp(a).then(a_load.region.cmp(&b_load.region)));
        pending.into_iter().map(|(_, load)| load).collect()
    }

    pub fn region_status(&self, id: &str) -> RegionStatus {
        let Some(slot) = self.regions.get(id) else {
            return RegionStatus::Unloaded;
        };
        if !slot.target.is_loadable() {
            return RegionStatus::Unloaded;
        }
        if slot.unavailable {
            return RegionStatus::Unavailable;
        }
        let wanted = self
            .catalog
            .region(id)
            .and_then(|r| r.asset_for(slot.target))
            .map(|a| a.level)
            .unwrap_or(slot.target);

        if let Some(deferral) = slot.deferral {
            return if deferral.gave_up {
                RegionStatus::BudgetUnsatisfiable {
                    target: deferral.level,
                }
            } else {
                RegionStatus::Deferred {
                    target: deferral.level,
                    showing: slot.published,
                }
            };
        }
        if let Some(request) = &slot.request {
            return RegionStatus::Loading {
                target: request.asset.level,
                showing: slot.published,
            };
        }
        match slot.published {
            Some(level) if level == wanted => RegionStatus::Ready { level },
            Some(showing) if !slot.failures.is_empty() => RegionStatus::Degraded {
                target: wanted,
                showing,
            },
            Some(level) => RegionStatus::Ready { level },
            None => RegionStatus::Unloaded,
        }
    }

    pub fn unavailable_regions(&self) -> Vec<RegionId> {
        self.regions
            .iter()
            .filter(|(_, slot)| slot.unavailable && slot.target.is_loadable())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            detail_levels: self.current_detail_levels(),
            memory: self.memory_usage(),
            pending: self.pending_loads(),
            unavailable: self.unavailable_regions(),
        }
    }

    /// Handle of the asset the renderer should draw for a region.
    pub fn renderable(&self, id: &str) -> Option<(AssetKey, RendererHandle)> {
        let slot = self.regions.get(id)?;
        let level = slot.published?;
        let asset = slot.loaded.get(&level)?;
        Some((asset.descriptor.key(), asset.handle))
    }

    /// Keys of every resident asset (published and stale).
    pub fn resident(&self) -> BTreeSet<AssetKey> {
        self.regions
            .values()
            .flat_map(|slot| slot.loaded.values().map(|a| a.descriptor.key()))
            .collect()
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.regions
            .values()
            .filter(|slot| slot.request.is_some())
            .count()
    }

    /// Level of the in-flight request for a region.
    pub fn in_flight_level(&self, id: &str) -> Option<DetailLevel> {
        self.regions
            .get(id)?
            .request
            .as_ref()
            .map(|r| r.asset.level)
    }

    /// Current publish generation of a region.
    pub fn generation(&self, id: &str) -> Option<u64> {
        self.regions.get(id).map(|slot| slot.generation)
    }

    /// Earliest scheduled retry, if any.
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.regions
            .values()
            .flat_map(|slot| slot.failures.values())
            .filter_map(|record| record.retry_at)
            .min()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}

impl Drop for AssetStreamManager {
    fn drop(&mut self) {
        for slot in self.regions.values_mut() {
            if let Some(request) = slot.request.take() {
                request.cancel.cancel();
            }
            for (_, asset) in std::mem::take(&mut slot.loaded) {
                self.loader.release(asset.handle);
            }
        }
    }
}

/// Decide what a region should load next.
///
/// Walks from the desired asset towards coarser ones. A level whose last
/// attempt failed is skipped (unless its retry is due) only while nothing is
/// visible; otherwise the region keeps showing what it has.
fn plan_region(slot: &RegionSlot, region: &RegionDescriptor, now: Instant) -> Plan {
    let Some(desired) = region.asset_for(slot.target) else {
        return Plan::Unavailable;
    };

    // A fallback already in flight for an invisible region is kept.
    if slot.published.is_none() && !slot.failures.is_empty() {
        if let Some(request) = slot.request.as_ref().filter(|r| r.fallback) {
            return Plan::Load {
                asset: request.asset.clone(),
                fallback_from: None,
            };
        }
    }

    let mut candidate = Some(desired);
    while let Some(asset) = candidate {
        if slot.published == Some(asset.level) {
            return Plan::Satisfied(asset.level);
        }
        match slot.failures.get(&asset.level) {
            Some(record) if !record.retry_at.is_some_and(|at| now >= at) => {
                if let Some(showing) = slot.published {
                    return Plan::Wait(showing);
                }
                candidate = region.coarser_than(asset.level);
            }
            _ => {
                let fallback_from = (asset.level != desired.level).then_some(desired.level);
                return Plan::Load {
                    asset: asset.clone(),
                    fallback_from,
                };
            }
        }
    }

    match slot.published {
        Some(showing) => Plan::Wait(showing),
        None => Plan::Unavailable,
    }
}
