//! Cluster API errors

use crate::framing::FrameError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors talking to the cluster API
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Invalid client settings (bad URL, unusable credentials)
    #[error("configuration error: {0}")]
    Config(String),
    /// Credential or certificate file could not be read
    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success response or watch ERROR event
    #[error("API server returned {code}: {message}")]
    Status { code: u16, message: String },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("node list carried no resource version")]
    MissingResourceVersion,
    /// Requested resource version is no longer available upstream
    #[error("resource version expired: {0}")]
    Expired(String),
    #[error("watch stream error: {0}")]
    Stream(FrameError),
}

impl ClusterError {
    /// Startup configuration problem, as opposed to a retrieval failure
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::ReadFile { .. })
    }
}

impl From<FrameError> for ClusterError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Status { code: 410, message } => Self::Expired(message),
            FrameError::Status { code, message } => Self::Status { code, message },
            other => Self::Stream(other),
        }
    }
}
