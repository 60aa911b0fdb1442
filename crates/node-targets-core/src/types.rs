//! Core membership types
//!
//! Everything the synchronization loop moves around: node identities and
//! records, the opaque version token, snapshots and watch events.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// IDENTITY
// =============================================================================

/// Stable identity of a node: (namespace, name).
///
/// Ordering is namespace first, then name; the membership store enumerates
/// in this order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdentity {
    pub namespace: String,
    pub name: String,
}

impl NodeIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

// =============================================================================
// NODE RECORD
// =============================================================================

/// One reported network address of a node
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeAddress {
    /// Address type as reported upstream (InternalIP, Hostname, ...)
    #[serde(rename = "type", default)]
    pub kind: String,
    pub address: String,
}

impl NodeAddress {
    pub fn new(kind: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            address: address.into(),
        }
    }
}

/// A cluster worker as seen by the membership store.
///
/// Always carries at least one address; the first one is used for scraping.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct NodeRecord {
    identity: NodeIdentity,
    addresses: Vec<NodeAddress>,
}

impl NodeRecord {
    /// Build a record, rejecting nameless or address-less nodes
    pub fn new(identity: NodeIdentity, addresses: Vec<NodeAddress>) -> Result<Self> {
        if identity.name.is_empty() {
            return Err(Error::MissingName {
                namespace: identity.namespace,
            });
        }
        if addresses.iter().all(|a| a.address.is_empty()) {
            return Err(Error::MissingAddress {
                identity: identity.to_string(),
            });
        }
        let addresses = addresses
            .into_iter()
            .filter(|a| !a.address.is_empty())
            .collect();
        Ok(Self {
            identity,
            addresses,
        })
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn addresses(&self) -> &[NodeAddress] {
        &self.addresses
    }

    /// Address used for scraping: the first reported one
    pub fn scrape_address(&self) -> &str {
        // non-empty by construction
        &self.addresses[0].address
    }
}

// =============================================================================
// SNAPSHOT / WATCH
// =============================================================================

/// Opaque resume marker paired with a snapshot
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VersionToken(pub String);

impl VersionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complete node set at a point in time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub records: Vec<NodeRecord>,
    pub version: VersionToken,
}

/// One membership change delivered by the watch stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipEvent {
    /// Node joined (or was re-announced)
    Added(NodeRecord),
    /// Node left; only the identity matters
    Removed(NodeIdentity),
    /// Event kind the membership view does not track (updates, bookmarks)
    Other { kind: String },
    /// Payload could not be interpreted as a node
    Malformed { reason: String },
}

impl MembershipEvent {
    /// Short label for logging
    pub fn kind(&self) -> &str {
        match self {
            Self::Added(_) => "added",
            Self::Removed(_) => "removed",
            Self::Other { kind } => kind,
            Self::Malformed { .. } => "malformed",
        }
    }
}
