//! lodstream - adaptive level-of-detail streaming for the anatomy viewer
//!
//! This library decides, every frame, how much anatomical detail each body
//! region should show and keeps the matching assets resident within a fixed
//! memory budget. It combines four pieces:
//!
//! - [`device`]: one-shot capability probe that picks the starting preset
//! - [`quality`]: frame-time driven preset controller with hysteresis
//! - [`lod`]: per-region detail tiers from camera distance and focus
//! - [`stream`]: budgeted async loading, eviction and atomic publish
//!
//! [`session::LodSession`] wires them together behind a single `tick`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use glam::Vec3;
//! use lodstream::catalog::Catalog;
//! use lodstream::device::{DeviceCapabilityProfiler, StaticSignals};
//! use lodstream::stream::SimulatedLoader;
//! use lodstream::{FrameInput, LodSession, SessionConfig};
//!
//! # async fn run() -> Result<(), lodstream::LodError> {
//! let catalog = Arc::new(Catalog::load("catalog.json")?);
//! let profiler = DeviceCapabilityProfiler::with_defaults(Arc::new(StaticSignals::unavailable()));
//! let mut session = LodSession::new(
//!     SessionConfig::default(),
//!     catalog,
//!     Arc::new(SimulatedLoader::default()),
//!     profiler,
//!     tokio::runtime::Handle::current(),
//! );
//!
//! let outcome = session.tick(&FrameInput::new(16.7, Vec3::new(0.0, 1.0, 4.0)));
//! println!("preset: {}", session.current_preset());
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod device;
pub mod error;
pub mod lod;
pub mod logging;
pub mod quality;
pub mod session;
pub mod stream;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::LodError;
pub use session::{FrameInput, LodSession, SessionConfig, SessionSnapshot, TickOutcome};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
