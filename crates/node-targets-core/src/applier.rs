//! Applies watch events to the membership store

use crate::store::MembershipStore;
use crate::types::{MembershipEvent, NodeIdentity};

/// What applying one event did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// New identity inserted
    Inserted(NodeIdentity),
    /// Existing identity overwritten (possibly with an identical record)
    Replaced(NodeIdentity),
    /// Identity removed
    Removed(NodeIdentity),
    /// Removal of an identity that was not present
    Absent(NodeIdentity),
    /// Event kind not tracked
    Ignored { kind: String },
    /// Payload could not be interpreted
    Rejected { reason: String },
}

impl Applied {
    /// Whether the target file must be rendered after this outcome.
    ///
    /// No-op adds and removes still render so a previously failed write is
    /// repaired by the next membership event.
    pub fn requires_render(&self) -> bool {
        match self {
            Self::Inserted(_) | Self::Replaced(_) | Self::Removed(_) | Self::Absent(_) => true,
            Self::Ignored { .. } | Self::Rejected { .. } => false,
        }
    }
}

/// Apply a single event to `store`.
///
/// Safe to call again with the same event: re-adding an identical record and
/// removing an absent identity leave the store as it was.
pub fn apply(event: MembershipEvent, store: &mut MembershipStore) -> Applied {
    match event {
        MembershipEvent::Added(record) => {
            let identity = record.identity().clone();
            match store.insert(record) {
                Some(_) => Applied::Replaced(identity),
                None => Applied::Inserted(identity),
            }
        }
        MembershipEvent::Removed(identity) => match store.remove_by_identity(&identity) {
            Some(_) => Applied::Removed(identity),
            None => Applied::Absent(identity),
        },
        MembershipEvent::Other { kind } => Applied::Ignored { kind },
        MembershipEvent::Malformed { reason } => Applied::Rejected { reason },
    }
}
