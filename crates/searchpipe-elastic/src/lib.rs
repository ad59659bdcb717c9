//! Elasticsearch-compatible implementation of `SearchBackend`.
pub mod client;
pub mod response;

pub use client::{ElasticBackend, ElasticError};
pub use response::parse_search_response;
