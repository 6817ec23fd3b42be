//! Remote owner → local user resolution.

use crmsync_types::{OwnerRef, RemoteId};
use std::collections::HashMap;

pub trait OwnerResolver: Send + Sync {
    fn resolve_owner(&self, remote_owner_id: &RemoteId) -> Option<OwnerRef>;
}

/// Lookup table filled from the integration's user mapping.
#[derive(Clone, Debug, Default)]
pub struct StaticOwnerResolver {
    owners: HashMap<RemoteId, OwnerRef>,
}

impl StaticOwnerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, remote: impl Into<RemoteId>, local: OwnerRef) -> Self {
        self.owners.insert(remote.into(), local);
        self
    }
}

impl OwnerResolver for StaticOwnerResolver {
    fn resolve_owner(&self, remote_owner_id: &RemoteId) -> Option<OwnerRef> {
        self.owners.get(remote_owner_id).copied()
    }
}
