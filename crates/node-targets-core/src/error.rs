//! Error types for node-targets core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Node object carried no name
    #[error("node has no name (namespace {namespace:?})")]
    MissingName { namespace: String },

    /// Node object carried no usable address
    #[error("node {identity} reports no addresses")]
    MissingAddress { identity: String },
}
