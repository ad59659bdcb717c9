//! searchpipe-core
//!
//! Data model, error taxonomy, configuration and collaborator traits shared by
//! the stage library, the executor and the backend adapters.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
