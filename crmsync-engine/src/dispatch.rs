//! Change notification fan-out with echo suppression.
//!
//! Listeners typically export local changes back to the remote system. A
//! change that itself came from the remote system must not be exported
//! again, so remote-sync changes only reach listeners that opt in.

use crmsync_types::{ChangeOrigin, EntityChange};
use std::sync::Arc;
use tracing::debug;

pub trait ChangeListener: Send + Sync {
    fn on_change(&self, change: &EntityChange);

    /// Whether this listener wants changes applied by remote sync.
    /// Exporters must leave this `false`.
    fn observes_remote_sync(&self) -> bool {
        false
    }
}

#[derive(Clone, Default)]
pub struct ChangeDispatcher {
    listeners: Vec<Arc<dyn ChangeListener>>,
}

impl ChangeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers committed changes. Returns the number of deliveries made.
    pub fn publish(&self, changes: &[EntityChange]) -> usize {
        let mut delivered = 0;
        let mut suppressed = 0;
        for change in changes {
            for listener in &self.listeners {
                if change.origin == ChangeOrigin::RemoteSync && !listener.observes_remote_sync() {
                    suppressed += 1;
                    continue;
                }
                listener.on_change(change);
                delivered += 1;
            }
        }
        if suppressed > 0 {
            debug!(suppressed, delivered, "suppressed remote-sync change notifications");
        }
        delivered
    }
}
