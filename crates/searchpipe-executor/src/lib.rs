pub mod compare;
pub mod executor;

pub use compare::{Comparison, ComparisonOutcome};
pub use executor::PipelineExecutor;
