//! Region priority.
//!
//! Priorities order both load issuance and eviction. They compare by score
//! first, then by how recently the region was focused.

use std::fmt;

/// Score scale for camera proximity. A region at the camera scores this.
pub const PROXIMITY_SCALE: f32 = 10_000.0;

/// Added to the score of the explicitly focused region.
pub const FOCUS_BONUS: u32 = 100_000;

/// Load/eviction priority of a region. Higher is more important.
///
/// `RegionPriority::ZERO` is reserved for regions that are not visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RegionPriority {
    pub score: u32,
    /// Focus clock value when the region was last focused (0 = never).
    pub focus_recency: u64,
}

impl RegionPriority {
    pub const ZERO: RegionPriority = RegionPriority {
        score: 0,
        focus_recency: 0,
    };

    /// Priority for a visible region at `distance` from the camera.
    ///
    /// Always at least 1 so visible regions outrank invisible ones.
    pub fn for_distance(distance: f32, focused: bool, focus_recency: u64) -> Self {
        let distance = if distance.is_finite() { distance.max(0.0) } else { f32::MAX };
        let proximity = (PROXIMITY_SCALE / (1.0 + distance)).round() as u32;
        let bonus = if focused { FOCUS_BONUS } else { 0 };
        Self {
            score: proximity.max(1).saturating_add(bonus),
            focus_recency,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.score == 0
    }
}

impl fmt::Display for RegionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.score)?;
        if self.focus_recency > 0 {
            write!(f, "@{}", self.focus_recency)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closer_is_higher() {
        let near = RegionPriority::for_distance(0.5, false, 0);
        let far = RegionPriority::for_distance(5.0, false, 0);
        assert!(near > far);
    }

    #[test]
    fn test_focus_dominates_distance() {
        let focused_far = RegionPriority::for_distance(50.0, true, 1);
        let near = RegionPriority::for_distance(0.0, false, 0);
        assert!(focused_far > near);
    }

    #[test]
    fn test_recency_breaks_ties() {
        let older = RegionPriority::for_distance(2.0, false, 1);
        let newer = RegionPriority::for_distance(2.0, false, 2);
        assert!(newer > older);
    }

    #[test]
    fn test_visible_never_zero() {
        let p = RegionPriority::for_distance(f32::INFINITY, false, 0);
        assert!(p > RegionPriority::ZERO);
    }
}
