//! Memory budget accounting.
//!
//! ```text
//! |<─────────── used ───────────>|<── reserved ──>|<── free ──>|
//! |<──────────────────────── target ─────────────────────────>|
//! ```
//!
//! `used` counts published and stale-but-resident assets. `reserved` counts
//! admitted loads still in flight; a reservation becomes `used` on publish
//! and is released on cancellation or failure. Admission checks
//! `used + reserved + size <= target`.
//!
//! A finished load is published only if `used + size <= target` after
//! evicting stale assets. Lowering the target never drops pinned assets, so
//! `used` may stay above the target only while pinned assets alone exceed it,
//! which the manager reports as pressure.

/// Byte budget for decoded assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    target: u64,
    used: u64,
    reserved: u64,
}

impl MemoryBudget {
    pub fn new(target: u64) -> Self {
        Self {
            target,
            used: 0,
            reserved: 0,
        }
    }

    /// Whether `size` more bytes can be admitted without eviction.
    pub fn fits(&self, size: u64) -> bool {
        self.committed().saturating_add(size) <= self.target
    }

    /// Bytes that must be freed before `size` can be admitted.
    pub fn shortfall(&self, size: u64) -> u64 {
        self.committed()
            .saturating_add(size)
            .saturating_sub(self.target)
    }

    /// Reserve bytes for an admitted in-flight load.
    pub fn reserve(&mut self, size: u64) {
        self.reserved = self.reserved.saturating_add(size);
    }

    /// Drop a reservation (cancellation, failure).
    pub fn release_reservation(&mut self, size: u64) {
        self.reserved = self.reserved.saturating_sub(size);
    }

    /// Convert a reservation into used bytes (publish).
    pub fn commit(&mut self, size: u64) {
        self.release_reservation(size);
        self.used = self.used.saturating_add(size);
    }

    /// Free bytes of an evicted asset.
    pub fn free(&mut self, size: u64) {
        self.used = self.used.saturating_sub(size);
    }

    /// Zero everything (renderer resource loss).
    pub fn reset(&mut self) {
        self.used = 0;
        self.reserved = 0;
    }

    pub fn set_target(&mut self, target: u64) {
        self.target = target;
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    /// `used + reserved`.
    pub fn committed(&self) -> u64 {
        self.used.saturating_add(self.reserved)
    }

    pub fn over_target(&self) -> bool {
        self.used > self.target
    }

    /// Bytes by which publishing `size` more would exceed the target.
    pub fn publish_overshoot(&self, size: u64) -> u64 {
        self.used.saturating_add(size).saturating_sub(self.target)
    }
}
