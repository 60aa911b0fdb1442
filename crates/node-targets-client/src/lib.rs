//! Cluster API client for node-targets
//!
//! This crate provides:
//! - The [`ClusterApi`] capability (node snapshot + incremental watch)
//! - An HTTP implementation against the Kubernetes REST API
//! - Newline-delimited watch event framing
//! - Credential loading

pub mod api;
pub mod config;
pub mod error;
pub mod framing;
pub mod http;
pub mod wire;

pub use api::{ClusterApi, EventStream};
pub use config::ClientConfig;
pub use error::ClusterError;
pub use framing::{FrameError, WatchEventCodec};
pub use http::HttpClusterApi;
