//! Reconciliation engine: wiring, outcomes and shared helpers.
//!
//! Every public operation opens one store transaction, performs all of its
//! entity and mapping writes through it and commits once. Committed changes
//! are then handed to the [`ChangeDispatcher`]. Writes are made under a
//! `RemoteSync` context so exporters never see their own echo.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncSettings;
use crate::dedup::{DuplicateResolver, UniqueFieldDuplicateResolver};
use crate::dispatch::{ChangeDispatcher, ChangeListener};
use crate::error::{ReconcileError, ReconcileResult};
use crate::merger::{EntityMerger, PrecedenceMerger};
use crate::owner::{OwnerResolver, StaticOwnerResolver};
use crate::translator::{FieldTranslator, RemoteFieldSchema, SchemaFieldTranslator};
use crmsync_storage::{DeletionQueue, LocalStore, MappingStore, StoreTx, SyncStore};
use crmsync_types::{
    Attributes, ChangeContext, IntegrationMapping, ObjectType, OwnerRef, RemoteId, RemoteRecord,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

static EMPTY_SCHEMA: RemoteFieldSchema = RemoteFieldSchema { fields: Vec::new() };

/// Result of an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The payload was newer than the last sync and has been applied.
    Applied,
    /// The payload was not newer than the last sync; nothing changed.
    Stale,
    /// The record was unknown and has been created instead.
    Created,
}

impl UpdateOutcome {
    /// False only for the stale short-circuit.
    pub fn is_applied(&self) -> bool {
        !matches!(self, UpdateOutcome::Stale)
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Queued for the sweep; mapping and entity untouched.
    Deferred,
    /// Entity soft-deleted and mapping removed.
    Deleted,
    /// The store reported no deletion, so the mapping was left in place.
    MappingRetained,
}

/// Result of a merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The absorbed lead was folded into the survivor and unmapped.
    Merged,
    /// Both records already denote one local lead.
    SameEntity,
    /// The absorbed record was never synced; the survivor was updated.
    Updated(UpdateOutcome),
}

/// Applies remote change events to the local store.
pub struct ReconciliationEngine<S: SyncStore> {
    pub(crate) store: S,
    pub(crate) settings: SyncSettings,
    pub(crate) schemas: BTreeMap<ObjectType, RemoteFieldSchema>,
    pub(crate) translator: Arc<dyn FieldTranslator>,
    pub(crate) duplicates: Arc<dyn DuplicateResolver>,
    pub(crate) owners: Arc<dyn OwnerResolver>,
    pub(crate) merger: Arc<dyn EntityMerger>,
    pub(crate) dispatcher: ChangeDispatcher,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<S: SyncStore> ReconciliationEngine<S> {
    /// Creates an engine with the default collaborators: schema-driven
    /// translation, email de-duplication, an empty owner table, newest-wins
    /// merging and the system clock.
    pub fn new(store: S, settings: SyncSettings) -> Self {
        Self {
            store,
            settings,
            schemas: BTreeMap::new(),
            translator: Arc::new(SchemaFieldTranslator::default()),
            duplicates: Arc::new(UniqueFieldDuplicateResolver::default()),
            owners: Arc::new(StaticOwnerResolver::default()),
            merger: Arc::new(PrecedenceMerger),
            dispatcher: ChangeDispatcher::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn FieldTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_duplicate_resolver(mut self, resolver: Arc<dyn DuplicateResolver>) -> Self {
        self.duplicates = resolver;
        self
    }

    pub fn with_owner_resolver(mut self, resolver: Arc<dyn OwnerResolver>) -> Self {
        self.owners = resolver;
        self
    }

    pub fn with_merger(mut self, merger: Arc<dyn EntityMerger>) -> Self {
        self.merger = merger;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ChangeListener>) -> Self {
        self.dispatcher.subscribe(listener);
        self
    }

    pub fn with_field_schema(mut self, object_type: ObjectType, schema: RemoteFieldSchema) -> Self {
        self.schemas.insert(object_type, schema);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn dispatcher(&self) -> &ChangeDispatcher {
        &self.dispatcher
    }

    /// Context for writes made on behalf of the remote system.
    pub(crate) fn context(&self) -> ChangeContext {
        ChangeContext::remote_sync(self.settings.integration.clone())
    }

    pub(crate) fn translate(&self, object_type: ObjectType, record: &RemoteRecord) -> Attributes {
        let schema = self.schemas.get(&object_type).unwrap_or(&EMPTY_SCHEMA);
        self.translator.translate(record, schema)
    }

    /// Resolves the payload owner. `None` when the payload carries none or
    /// it does not resolve.
    pub(crate) fn payload_owner(&self, record: &RemoteRecord) -> Option<OwnerRef> {
        record
            .owner_id
            .as_ref()
            .and_then(|owner| self.owners.resolve_owner(owner))
    }

    /// Commits and notifies listeners.
    pub(crate) fn finish(&self, tx: S::Tx<'_>) -> ReconcileResult<()> {
        let changes = tx.commit()?;
        self.dispatcher.publish(&changes);
        Ok(())
    }

    /// Deletes a mapped remote record, immediately or through the queue.
    pub(crate) fn delete_object(
        &self,
        object_type: ObjectType,
        remote_id: &RemoteId,
    ) -> ReconcileResult<DeleteOutcome> {
        let ctx = self.context();
        let mut tx = self.store.begin()?;
        let mapping = tx
            .find_mapping(object_type, remote_id)?
            .ok_or_else(|| ReconcileError::not_found(object_type, remote_id, "no mapping"))?;

        let outcome = if self.settings.deletes_via_queue() {
            let pending = tx.enqueue_deletion(object_type, mapping.id, &self.clock.now())?;
            info!(
                object_type = %object_type,
                remote_id = %remote_id,
                mapping_id = %mapping.id,
                pending_id = pending.id.0,
                "queued deletion"
            );
            DeleteOutcome::Deferred
        } else if self.delete_mapped_in(&mut tx, &mapping, &ctx)? {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::MappingRetained
        };

        self.finish(tx)?;
        Ok(outcome)
    }

    /// Soft-deletes the entity behind `mapping`, loading it directly so an
    /// already soft-deleted row is still found. Removes the mapping only
    /// when the store reports a deletion; returns whether it did.
    pub(crate) fn delete_mapped_in<T: LocalStore>(
        &self,
        tx: &mut T,
        mapping: &IntegrationMapping,
        ctx: &ChangeContext,
    ) -> ReconcileResult<bool> {
        let missing = || {
            ReconcileError::not_found(mapping.object_type, &mapping.remote_id, "no local entity")
        };
        let deleted = match mapping.object_type {
            ObjectType::Lead => {
                let lead = tx.find_lead_by_id(mapping.local_id)?.ok_or_else(missing)?;
                tx.delete_lead(&lead, ctx)?
            }
            ObjectType::Company => {
                let company = tx.find_company_by_id(mapping.local_id)?.ok_or_else(missing)?;
                tx.delete_company(&company, ctx)?
            }
        };

        match deleted {
            Some(local_id) => {
                tx.remove_mapping(mapping)?;
                info!(
                    object_type = %mapping.object_type,
                    remote_id = %mapping.remote_id,
                    local_id = %local_id,
                    "deleted"
                );
                Ok(true)
            }
            None => {
                // The mapping now points at nothing live; kept as-is.
                warn!(
                    object_type = %mapping.object_type,
                    remote_id = %mapping.remote_id,
                    local_id = %mapping.local_id,
                    "store reported no deletion, mapping retained"
                );
                Ok(false)
            }
        }
    }
}
