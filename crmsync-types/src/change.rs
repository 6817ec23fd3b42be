//! Change notifications and the origin tag that drives echo suppression.
//!
//! Writes made on behalf of the remote system are tagged `RemoteSync` so the
//! dispatch layer can skip listeners that would export the change straight
//! back to where it came from. The tag lives in the call context, never on
//! the entity.

use crate::ids::LocalId;
use crate::mapping::ObjectType;
use serde::{Deserialize, Serialize};

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeOrigin {
    /// A user or local process edited the record.
    Local,
    /// The change was applied while reconciling a remote event.
    RemoteSync,
}

/// Per-call context handed to every store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeContext {
    origin: ChangeOrigin,
    integration: Option<String>,
}

impl ChangeContext {
    pub fn local() -> Self {
        Self {
            origin: ChangeOrigin::Local,
            integration: None,
        }
    }

    pub fn remote_sync(integration: impl Into<String>) -> Self {
        Self {
            origin: ChangeOrigin::RemoteSync,
            integration: Some(integration.into()),
        }
    }

    pub fn origin(&self) -> ChangeOrigin {
        self.origin
    }

    /// Name of the integration that originated a `RemoteSync` change.
    pub fn integration(&self) -> Option<&str> {
        self.integration.as_deref()
    }

    pub fn is_remote_sync(&self) -> bool {
        self.origin == ChangeOrigin::RemoteSync
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Saved,
    Deleted,
    MembershipChanged,
}

/// A committed change to a local entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChange {
    pub object_type: ObjectType,
    pub local_id: LocalId,
    pub kind: ChangeKind,
    pub origin: ChangeOrigin,
    /// Integration that applied a remote-sync change.
    pub integration: Option<String>,
}
