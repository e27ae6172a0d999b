//! Sampler core: pure stratified-sampling logic, no I/O.
mod planner;
mod range;

pub use planner::{SamplingPlanner, Stratum, StratumState};
pub use range::{partition, should_split, SizeRange};
