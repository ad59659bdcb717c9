//! searchpipe-stages
//!
//! The four pipeline stages (keyword search, vector search, merge, rerank),
//! their typed configuration, the merge algorithms and the factory that builds
//! stages from a pipeline definition.

pub mod config;
pub mod factory;
pub mod keyword;
pub mod merge;
pub mod rerank;
mod search;
pub mod stage;
pub mod vector;

pub use factory::StageFactory;
pub use stage::Stage;
