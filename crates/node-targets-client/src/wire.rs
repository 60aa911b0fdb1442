//! Kubernetes API objects, reduced to the fields node-targets reads

use node_targets_core::{NodeAddress, NodeIdentity, NodeRecord};
use serde::Deserialize;

/// `GET /api/{version}/nodes` response
#[derive(Debug, Deserialize)]
pub struct NodeList {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<Node>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default)]
    pub resource_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: Option<NodeStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
}

impl Node {
    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity::new(self.metadata.namespace.clone(), self.metadata.name.clone())
    }

    /// Convert into a membership record (needs a name and an address)
    pub fn into_record(self) -> node_targets_core::Result<NodeRecord> {
        let identity = self.identity();
        let addresses = self.status.map(|s| s.addresses).unwrap_or_default();
        NodeRecord::new(identity, addresses)
    }
}

/// One line of a watch response
#[derive(Debug, Deserialize)]
pub struct RawWatchEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub object: serde_json::Value,
}

/// `Status` object returned with API errors and watch ERROR events
#[derive(Debug, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Status {
    /// Best human-readable description available
    pub fn describe(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.reason.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}
