//! Level-of-detail evaluation.
//!
//! The [`LodEvaluator`] turns the camera position, the user's focus and the
//! set of enabled anatomical systems into a [`DesiredState`]: one target
//! [`DetailLevel`](crate::catalog::DetailLevel) and one [`RegionPriority`]
//! per region. It performs no I/O; the stream manager acts on its output.

mod config;
mod desired;
mod evaluator;
mod priority;

pub use config::{
    LodConfig, DEFAULT_HYSTERESIS, DEFAULT_NEAR_RADIUS, DEFAULT_ORGAN_DISTANCE,
    DEFAULT_REGION_DISTANCE, DEFAULT_TISSUE_DISTANCE,
};
pub use desired::{DesiredState, RegionTarget, TierTransition, TransitionKind};
pub use evaluator::LodEvaluator;
pub use priority::{RegionPriority, FOCUS_BONUS, PROXIMITY_SCALE};
