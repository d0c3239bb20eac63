//! Graph-based two-step floating catchment accessibility.

mod affected;
mod decay;
mod model;
pub mod network;

pub use affected::{read_affected_facilities, write_affected_facilities};
pub use decay::DecayFunction;
pub use model::{AccessibilityConfig, AccessibilityModel, Scores};
pub use network::{EdgeRecord, NodePoints, NodeRecord, RoadNetwork, Scenario};
