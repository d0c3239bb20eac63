//! Raster → nearest-node aggregation.

mod admission;
mod aggregator;
mod cache;
mod index;

pub use admission::{AdmissionController, FixedMemory, MemoryProbe, Permit, SystemMemory};
pub use aggregator::{AggregatorConfig, BlockAggregator};
pub use cache::{AssignmentCache, AssignmentKey};
pub use index::{NodeIndex, UNASSIGNED};
