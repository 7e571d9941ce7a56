//! Eviction victim selection.
//!
//! Candidates are ordered lowest priority first, then least recently
//! accessed. Selection is all-or-nothing: if the candidates together cannot
//! free the requested bytes, nothing is chosen and the caller defers.

use tokio::time::Instant;

use crate::catalog::AssetKey;
use crate::lod::RegionPriority;

/// A resident asset that may be evicted.
#[derive(Debug, Clone)]
pub(crate) struct EvictionCandidate {
    pub key: AssetKey,
    pub bytes: u64,
    /// Zero for invisible stale assets, the region priority for visible ones.
    pub priority: RegionPriority,
    pub last_access: Instant,
}

fn order(candidates: &mut [EvictionCandidate]) {
    candidates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.last_access.cmp(&b.last_access))
            .then(a.key.cmp(&b.key))
    });
}

/// Pick victims freeing at least `needed` bytes, or `None` if impossible.
pub(crate) fn select_victims(
    mut candidates: Vec<EvictionCandidate>,
    needed: u64,
) -> Option<Vec<EvictionCandidate>> {
    if needed == 0 {
        return Some(Vec::new());
    }
    let available: u64 = candidates.iter().map(|c| c.bytes).sum();
    if available < needed {
        return None;
    }
    order(&mut candidates);

    let mut freed = 0;
    let mut victims = Vec::new();
    for candidate in candidates {
        if freed >= needed {
            break;
        }
        freed += candidate.bytes;
        victims.push(candidate);
    }
    Some(victims)
}

/// Every candidate in eviction order (used when shrinking the budget).
pub(crate) fn eviction_order(mut candidates: Vec<EvictionCandidate>) -> Vec<EvictionCandidate> {
    order(&mut candidates);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DetailLevel, RegionId};
    use std::time::Duration;

    fn candidate(region: &str, bytes: u64, score: u32, age_ms: u64) -> EvictionCandidate {
        let base = Instant::now();
        EvictionCandidate {
            key: AssetKey::new(RegionId::new(region), DetailLevel::Body),
            bytes,
            priority: RegionPriority {
                score,
                focus_recency: 0,
            },
            last_access: base - Duration::from_millis(age_ms),
        }
    }

    #[test]
    fn test_lowest_priority_evicted_first() {
        let victims = select_victims(
            vec![candidate("a", 10, 5, 0), candidate("b", 10, 0, 0)],
            5,
        )
        .unwrap();
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].key.region.as_str(), "b");
    }

    #[test]
    fn test_least_recently_used_breaks_ties() {
        let victims = select_victims(
            vec![candidate("new", 10, 0, 10), candidate("old", 10, 0, 500)],
            10,
        )
        .unwrap();
        assert_eq!(victims[0].key.region.as_str(), "old");
    }

    #[test]
    fn test_insufficient_candidates_selects_nothing() {
        assert!(select_victims(vec![candidate("a", 10, 0, 0)], 11).is_none());
    }

    #[test]
    fn test_nothing_needed() {
        assert_eq!(select_victims(Vec::new(), 0).unwrap().len(), 0);
    }

    #[test]
    fn test_accumulates_until_enough() {
        let victims = select_victims(
            vec![
                candidate("a", 4, 0, 300),
                candidate("b", 4, 0, 200),
                candidate("c", 4, 0, 100),
            ],
            6,
        )
        .unwrap();
        let names: Vec<_> = victims.iter().map(|v| v.key.region.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
