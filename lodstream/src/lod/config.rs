//! Distance thresholds and shaping tunables for the LOD evaluator.

/// Camera distance below which a region reaches `Tissue` detail.
pub const DEFAULT_TISSUE_DISTANCE: f32 = 0.5;

/// Camera distance below which a region reaches `Organ` detail.
pub const DEFAULT_ORGAN_DISTANCE: f32 = 1.5;

/// Camera distance below which a region reaches `Region` detail.
pub const DEFAULT_REGION_DISTANCE: f32 = 4.0;

/// Hysteresis band around each threshold.
pub const DEFAULT_HYSTERESIS: f32 = 0.1;

/// Without a focus, regions closer than this may reach the finest tier.
pub const DEFAULT_NEAR_RADIUS: f32 = 1.0;

/// Evaluator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LodConfig {
    pub tissue_distance: f32,
    pub organ_distance: f32,
    pub region_distance: f32,
    /// Half-width of the dead band around each threshold (ε).
    pub hysteresis: f32,
    pub near_radius: f32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            tissue_distance: DEFAULT_TISSUE_DISTANCE,
            organ_distance: DEFAULT_ORGAN_DISTANCE,
            region_distance: DEFAULT_REGION_DISTANCE,
            hysteresis: DEFAULT_HYSTERESIS,
            near_radius: DEFAULT_NEAR_RADIUS,
        }
    }
}

impl LodConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, tissue: f32, organ: f32, region: f32) -> Self {
        self.tissue_distance = tissue;
        self.organ_distance = organ;
        self.region_distance = region;
        self
    }

    pub fn with_hysteresis(mut self, epsilon: f32) -> Self {
        self.hysteresis = epsilon;
        self
    }

    pub fn with_near_radius(mut self, radius: f32) -> Self {
        self.near_radius = radius;
        self
    }

    /// Thresholds must be strictly increasing and the hysteresis bands of
    /// neighbouring thresholds must not overlap.
    pub fn validate(&self) -> Result<(), String> {
        let all_finite = [
            self.tissue_distance,
            self.organ_distance,
            self.region_distance,
            self.hysteresis,
            self.near_radius,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0);
        if !all_finite {
            return Err("LOD distances must be finite and non-negative".to_string());
        }
        if !(self.tissue_distance < self.organ_distance
            && self.organ_distance < self.region_distance)
        {
            return Err(format!(
                "thresholds must satisfy tissue < organ < region (got {} / {} / {})",
                self.tissue_distance, self.organ_distance, self.region_distance
            ));
        }
        let min_gap = (self.organ_distance - self.tissue_distance)
            .min(self.region_distance - self.organ_distance);
        if 2.0 * self.hysteresis >= min_gap {
            return Err(format!(
                "hysteresis {} is too wide for threshold gap {}",
                self.hysteresis, min_gap
            ));
        }
        Ok(())
    }
}
