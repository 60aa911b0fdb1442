//! In-memory membership store

use crate::types::{NodeIdentity, NodeRecord};
use std::collections::BTreeMap;

/// Nodes currently believed to exist, keyed by identity.
///
/// At most one record per identity. Enumeration is ordered by identity so two
/// stores with the same contents always enumerate identically.
#[derive(Debug, Default, Clone)]
pub struct MembershipStore {
    nodes: BTreeMap<NodeIdentity, NodeRecord>,
}

impl MembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record with the same identity.
    ///
    /// Returns the replaced record, if there was one.
    pub fn insert(&mut self, record: NodeRecord) -> Option<NodeRecord> {
        self.nodes.insert(record.identity().clone(), record)
    }

    /// Remove the record for `identity`. Absent identities are a no-op.
    pub fn remove_by_identity(&mut self, identity: &NodeIdentity) -> Option<NodeRecord> {
        self.nodes.remove(identity)
    }

    /// All records, ordered by (namespace, name)
    pub fn enumerate(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.nodes.values()
    }

    /// Discard every record and install `records`.
    ///
    /// Duplicate identities within `records` collapse to the last one.
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = NodeRecord>) {
        self.nodes = records
            .into_iter()
            .map(|r| (r.identity().clone(), r))
            .collect();
    }

    pub fn get(&self, identity: &NodeIdentity) -> Option<&NodeRecord> {
        self.nodes.get(identity)
    }

    pub fn contains(&self, identity: &NodeIdentity) -> bool {
        self.nodes.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
