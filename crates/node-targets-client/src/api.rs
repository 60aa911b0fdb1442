//! The capability the synchronization loop needs from the cluster

use crate::error::ClusterError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use node_targets_core::{MembershipEvent, Snapshot, VersionToken};

/// Incremental membership events, in upstream order.
///
/// The stream ends (`None`) when the server closes the watch, or yields an
/// error when the watch breaks; either way the caller must resync.
pub type EventStream = BoxStream<'static, Result<MembershipEvent, ClusterError>>;

/// Node listing and watching
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Complete node set plus the version to resume watching from
    async fn list_nodes(&self) -> Result<Snapshot, ClusterError>;

    /// Open a watch delivering every change after `since`
    async fn watch_nodes(&self, since: &VersionToken) -> Result<EventStream, ClusterError>;
}
