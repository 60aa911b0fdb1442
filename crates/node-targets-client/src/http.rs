//! Kubernetes REST implementation of [`ClusterApi`]

use crate::api::{ClusterApi, EventStream};
use crate::config::{load_bearer_token, load_ca_certificate, validate_master, ClientConfig};
use crate::error::ClusterError;
use crate::framing::WatchEventCodec;
use crate::wire::{NodeList, Status};
use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use node_targets_core::{Snapshot, VersionToken};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

/// Probe interval for idle connections, so a vanished API server host
/// surfaces as a stream error on long-lived watches
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Node list/watch over the API server's REST interface
pub struct HttpClusterApi {
    client: reqwest::Client,
    nodes_url: String,
    token: Option<String>,
    request_timeout: Duration,
    watch_timeout: Option<Duration>,
}

impl HttpClusterApi {
    /// Build a client, loading credentials from disk.
    ///
    /// Every file named in `config` is read here, so unreadable credentials
    /// fail before any request is made.
    pub fn new(config: &ClientConfig) -> Result<Self, ClusterError> {
        let master = validate_master(&config.master)?;
        if config.api_version.is_empty() {
            return Err(ClusterError::Config("API version cannot be empty".to_string()));
        }

        let token = config
            .bearer_token_file
            .as_deref()
            .map(load_bearer_token)
            .transpose()?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .tcp_keepalive(TCP_KEEPALIVE)
            .no_proxy();

        if config.insecure {
            warn!("TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        } else if let Some(path) = &config.ca_cert_file {
            builder = builder.add_root_certificate(load_ca_certificate(path)?);
        }

        let client = builder
            .build()
            .map_err(|e| ClusterError::Config(format!("failed to build HTTP client: {}", e)))?;

        let nodes_url = format!(
            "{}/api/{}/nodes",
            master.as_str().trim_end_matches('/'),
            config.api_version
        );
        info!(url = %nodes_url, authenticated = token.is_some(), "Cluster API client ready");

        Ok(Self {
            client,
            nodes_url,
            token,
            request_timeout: config.request_timeout,
            watch_timeout: config.watch_timeout,
        })
    }

    /// Node collection URL
    pub fn nodes_url(&self) -> &str {
        &self.nodes_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Turn a non-success response into a [`ClusterError`]
async fn check_status(response: Response) -> Result<Response, ClusterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<Status>(&body) {
        Ok(s) => s.describe(),
        Err(_) => body,
    };

    if status == StatusCode::GONE {
        Err(ClusterError::Expired(message))
    } else {
        Err(ClusterError::Status {
            code: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn list_nodes(&self) -> Result<Snapshot, ClusterError> {
        let request = self
            .authorize(self.client.get(&self.nodes_url))
            .timeout(self.request_timeout);
        let response = check_status(request.send().await?).await?;
        let body = response.bytes().await?;
        let list: NodeList = serde_json::from_slice(&body)?;

        let version = list
            .metadata
            .resource_version
            .filter(|v| !v.is_empty())
            .ok_or(ClusterError::MissingResourceVersion)?;

        let mut records = Vec::with_capacity(list.items.len());
        for node in list.items {
            let identity = node.identity();
            match node.into_record() {
                Ok(record) => records.push(record),
                Err(e) => warn!(node = %identity, error = %e, "Skipping node in list"),
            }
        }

        debug!(nodes = records.len(), version = %version, "Listed nodes");
        Ok(Snapshot {
            records,
            version: VersionToken(version),
        })
    }

    async fn watch_nodes(&self, since: &VersionToken) -> Result<EventStream, ClusterError> {
        let mut query = vec![
            ("watch", "true".to_string()),
            ("resourceVersion", since.as_str().to_string()),
            ("allowWatchBookmarks", "true".to_string()),
        ];
        if let Some(timeout) = self.watch_timeout {
            query.push(("timeoutSeconds", timeout.as_secs().to_string()));
        }

        let request = self.authorize(self.client.get(&self.nodes_url).query(&query));
        let response = check_status(request.send().await?).await?;
        debug!(version = %since, "Watch opened");

        let body = response.bytes_stream().map_err(std::io::Error::other);
        let events = FramedRead::new(StreamReader::new(body), WatchEventCodec::new())
            .map_err(ClusterError::from);

        Ok(events.boxed())
    }
}
