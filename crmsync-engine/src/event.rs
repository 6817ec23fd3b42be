//! Inbound remote change events and their routing.

use crate::engine::{DeleteOutcome, MergeOutcome, ReconciliationEngine, UpdateOutcome};
use crate::error::{ReconcileError, ReconcileResult};
use crmsync_storage::SyncStore;
use crmsync_types::{ObjectType, RemoteId, RemoteRecord, TypesError};
use serde_json::Value;
use tracing::debug;

/// One change reported by the remote system.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Added(ObjectType, RemoteRecord),
    Updated(ObjectType, RemoteRecord),
    Deleted(ObjectType, RemoteId),
    /// Two remote persons were merged; `absorbed` no longer exists remotely.
    Merged {
        survivor: RemoteRecord,
        absorbed: RemoteRecord,
    },
}

impl RemoteEvent {
    /// Builds an event from a webhook name such as `"updated.person"` and
    /// its `current` / `previous` payloads.
    ///
    /// Deletions read the id from `previous`, falling back to `current`.
    /// Merges take `current` as the survivor and `previous` as the absorbed
    /// record.
    pub fn from_webhook(
        event: &str,
        current: Option<Value>,
        previous: Option<Value>,
    ) -> ReconcileResult<Self> {
        let (action, object) = event
            .split_once('.')
            .ok_or_else(|| ReconcileError::UnsupportedEvent(event.to_string()))?;
        let object_type = match object {
            "person" => ObjectType::Lead,
            "organization" => ObjectType::Company,
            _ => return Err(ReconcileError::UnsupportedEvent(event.to_string())),
        };
        let record = |payload: Option<Value>, name: &'static str| {
            payload
                .filter(|v| !v.is_null())
                .ok_or(TypesError::MissingField(name))
                .and_then(RemoteRecord::from_value)
        };

        match action {
            "added" => Ok(RemoteEvent::Added(object_type, record(current, "current")?)),
            "updated" => Ok(RemoteEvent::Updated(object_type, record(current, "current")?)),
            "deleted" => {
                let source = previous.filter(|v| !v.is_null()).or(current);
                let gone = record(source, "previous")?;
                Ok(RemoteEvent::Deleted(object_type, gone.id))
            }
            "merged" if object_type == ObjectType::Lead => Ok(RemoteEvent::Merged {
                survivor: record(current, "current")?,
                absorbed: record(previous, "previous")?,
            }),
            _ => Err(ReconcileError::UnsupportedEvent(event.to_string())),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            RemoteEvent::Added(object_type, _)
            | RemoteEvent::Updated(object_type, _)
            | RemoteEvent::Deleted(object_type, _) => *object_type,
            RemoteEvent::Merged { .. } => ObjectType::Lead,
        }
    }
}

/// What handling an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Created,
    Updated(UpdateOutcome),
    Deleted(DeleteOutcome),
    Merged(MergeOutcome),
    /// The integration is disabled or does not sync this object type.
    Ignored,
}

impl<S: SyncStore> ReconciliationEngine<S> {
    pub fn handle(&self, event: &RemoteEvent) -> ReconcileResult<EventOutcome> {
        let object_type = event.object_type();
        if !self.settings.is_published {
            debug!(object_type = %object_type, "integration disabled, ignoring event");
            return Ok(EventOutcome::Ignored);
        }
        if object_type == ObjectType::Company && !self.settings.is_company_support_enabled() {
            debug!("company sync disabled, ignoring organization event");
            return Ok(EventOutcome::Ignored);
        }

        match event {
            RemoteEvent::Added(ObjectType::Lead, record) => {
                self.create_lead(record).map(|_| EventOutcome::Created)
            }
            RemoteEvent::Added(ObjectType::Company, record) => {
                self.create_company(record).map(|_| EventOutcome::Created)
            }
            RemoteEvent::Updated(ObjectType::Lead, record) => {
                self.update_lead(record).map(EventOutcome::Updated)
            }
            RemoteEvent::Updated(ObjectType::Company, record) => {
                self.update_company(record).map(EventOutcome::Updated)
            }
            RemoteEvent::Deleted(ObjectType::Lead, remote_id) => {
                self.delete_lead(remote_id).map(EventOutcome::Deleted)
            }
            RemoteEvent::Deleted(ObjectType::Company, remote_id) => {
                self.delete_company(remote_id).map(EventOutcome::Deleted)
            }
            RemoteEvent::Merged { survivor, absorbed } => {
                self.merge_leads(survivor, absorbed).map(EventOutcome::Merged)
            }
        }
    }
}
