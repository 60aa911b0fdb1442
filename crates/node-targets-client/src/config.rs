//! Client settings and credential loading

use crate::error::ClusterError;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings for [`crate::HttpClusterApi`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API server base URL
    pub master: String,
    /// API schema version (`v1`)
    pub api_version: String,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// File holding the bearer token; no Authorization header when unset
    pub bearer_token_file: Option<PathBuf>,
    /// PEM CA certificate trusted for the API server
    pub ca_cert_file: Option<PathBuf>,
    /// Connect timeout, and total timeout for list requests
    pub request_timeout: Duration,
    /// Server-side watch timeout
    pub watch_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            master: "https://kubernetes.default.svc.cluster.local".to_string(),
            api_version: "v1".to_string(),
            insecure: false,
            bearer_token_file: None,
            ca_cert_file: None,
            request_timeout: Duration::from_secs(30),
            watch_timeout: None,
        }
    }
}

/// Parse the API server URL, accepting only http(s)
pub fn validate_master(master: &str) -> Result<Url, ClusterError> {
    let url = Url::parse(master)
        .map_err(|e| ClusterError::Config(format!("invalid master URL {:?}: {}", master, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClusterError::Config(format!(
            "unsupported master URL scheme {:?}",
            other
        ))),
    }
}

/// Read a bearer token, trimming surrounding whitespace
pub fn load_bearer_token(path: &Path) -> Result<String, ClusterError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ClusterError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(ClusterError::Config(format!(
            "bearer token file {} is empty",
            path.display()
        )));
    }
    Ok(token.to_string())
}

/// Read and parse a PEM CA certificate
pub fn load_ca_certificate(path: &Path) -> Result<reqwest::Certificate, ClusterError> {
    let pem = std::fs::read(path).map_err(|source| ClusterError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    reqwest::Certificate::from_pem(&pem).map_err(|e| {
        ClusterError::Config(format!("invalid CA certificate {}: {}", path.display(), e))
    })
}
