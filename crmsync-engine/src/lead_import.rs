//! Lead (remote person) reconciliation.

use crate::engine::{DeleteOutcome, MergeOutcome, ReconciliationEngine, UpdateOutcome};
use crate::error::{ReconcileError, ReconcileResult};
use crate::merger::MergeError;
use crmsync_storage::{LeadRepository, LocalStore, MappingStore, SyncStore};
use crmsync_types::{ChangeContext, LeadEntity, ObjectType, RemoteId, RemoteRecord};
use tracing::{debug, info, warn};

impl<S: SyncStore> ReconciliationEngine<S> {
    /// Creates the local lead for a remote person and maps it.
    ///
    /// An existing local lead matching the payload is reused instead of
    /// inserting a new one. Fails with [`ReconcileError::Conflict`] when the
    /// person is already mapped.
    pub fn create_lead(&self, record: &RemoteRecord) -> ReconcileResult<bool> {
        let ctx = self.context();
        let mut tx = self.store.begin()?;
        let lead = self.create_lead_in(&mut tx, record, &ctx)?;
        self.finish(tx)?;
        info!(
            object_type = "lead",
            remote_id = %record.id,
            local_id = ?lead.id,
            "created"
        );
        Ok(true)
    }

    /// Applies a remote person change if it is newer than the last sync.
    pub fn update_lead(&self, record: &RemoteRecord) -> ReconcileResult<UpdateOutcome> {
        let ctx = self.context();
        let mut tx = self.store.begin()?;
        let outcome = self.update_lead_in(&mut tx, record, &ctx)?;
        if outcome == UpdateOutcome::Stale {
            return Ok(outcome);
        }
        self.finish(tx)?;
        info!(object_type = "lead", remote_id = %record.id, ?outcome, "updated");
        Ok(outcome)
    }

    /// Deletes the lead mapped to a remote person.
    pub fn delete_lead(&self, remote_id: &RemoteId) -> ReconcileResult<DeleteOutcome> {
        self.delete_object(ObjectType::Lead, remote_id)
    }

    /// Folds the lead mapped from `absorbed` into the one mapped from
    /// `survivor`.
    pub fn merge_leads(
        &self,
        survivor: &RemoteRecord,
        absorbed: &RemoteRecord,
    ) -> ReconcileResult<MergeOutcome> {
        let ctx = self.context();
        let mut tx = self.store.begin()?;

        let Some(absorbed_mapping) = tx.find_mapping(ObjectType::Lead, &absorbed.id)? else {
            debug!(
                remote_id = %survivor.id,
                absorbed = %absorbed.id,
                "absorbed person never synced, updating survivor"
            );
            let outcome = self.update_lead_in(&mut tx, survivor, &ctx)?;
            if outcome != UpdateOutcome::Stale {
                self.finish(tx)?;
            }
            return Ok(MergeOutcome::Updated(outcome));
        };

        let mut survivor_mapping = match tx.find_mapping(ObjectType::Lead, &survivor.id)? {
            Some(mapping) => mapping,
            None => {
                self.create_lead_in(&mut tx, survivor, &ctx)?;
                tx.find_mapping(ObjectType::Lead, &survivor.id)?.ok_or_else(|| {
                    ReconcileError::not_found(
                        ObjectType::Lead,
                        &survivor.id,
                        "no mapping after create",
                    )
                })?
            }
        };

        let winner = tx.get_lead(survivor_mapping.local_id)?.ok_or_else(|| {
            ReconcileError::not_found(ObjectType::Lead, &survivor.id, "no local lead")
        })?;
        let loser = tx.get_lead(absorbed_mapping.local_id)?.ok_or_else(|| {
            ReconcileError::not_found(ObjectType::Lead, &absorbed.id, "no local lead")
        })?;

        let outcome = match self.merger.merge(&mut tx, winner, loser, &ctx) {
            Ok(_) => {
                tx.remove_mapping(&absorbed_mapping)?;
                MergeOutcome::Merged
            }
            Err(MergeError::SameEntity(local_id)) => {
                debug!(local_id = %local_id, "merge collapsed onto one lead");
                MergeOutcome::SameEntity
            }
            Err(MergeError::Store(err)) => return Err(err.into()),
        };

        tx.advance_mapping(&mut survivor_mapping, &self.clock.now())?;
        self.finish(tx)?;
        info!(
            object_type = "lead",
            remote_id = %survivor.id,
            absorbed = %absorbed.id,
            ?outcome,
            "merged"
        );
        Ok(outcome)
    }

    pub(crate) fn create_lead_in<T: LocalStore>(
        &self,
        tx: &mut T,
        record: &RemoteRecord,
        ctx: &ChangeContext,
    ) -> ReconcileResult<LeadEntity> {
        let conflict = || ReconcileError::Conflict {
            object_type: ObjectType::Lead,
            remote_id: record.id.clone(),
        };
        if tx.find_mapping(ObjectType::Lead, &record.id)?.is_some() {
            return Err(conflict());
        }

        let attributes = self.translate(ObjectType::Lead, record);
        let mut lead = LeadEntity::new();
        if let Some(existing) = self.duplicates.find_duplicate(&*tx, &attributes)? {
            let already_mapped = match existing.id {
                Some(id) => tx.find_mapping_for_local(ObjectType::Lead, id)?.is_some(),
                None => false,
            };
            if already_mapped {
                debug!(
                    local_id = ?existing.id,
                    "duplicate already mapped to another person, inserting new lead"
                );
            } else {
                debug!(local_id = ?existing.id, "reusing duplicate lead");
                lead = existing;
            }
        }

        let now = self.clock.now();
        lead.apply_attributes(&attributes);
        if record.owner_id.is_some() {
            lead.owner = self.payload_owner(record);
        }
        lead.date_modified = Some(now.clone());
        let local_id = tx.save_lead(&mut lead, ctx)?;

        // A concurrent create may have won the race.
        if tx.find_mapping(ObjectType::Lead, &record.id)?.is_some() {
            return Err(conflict());
        }
        tx.create_mapping(ObjectType::Lead, &record.id, local_id, &now)?;

        if let Some(org_id) = &record.org_id {
            if self.settings.is_company_support_enabled() {
                self.link_in(tx, org_id, &mut lead, ctx)?;
            }
        }
        Ok(lead)
    }

    pub(crate) fn update_lead_in<T: LocalStore>(
        &self,
        tx: &mut T,
        record: &RemoteRecord,
        ctx: &ChangeContext,
    ) -> ReconcileResult<UpdateOutcome> {
        let Some(mut mapping) = tx.find_mapping(ObjectType::Lead, &record.id)? else {
            self.create_lead_in(tx, record, ctx)?;
            return Ok(UpdateOutcome::Created);
        };
        let mut lead = tx.get_lead(mapping.local_id)?.ok_or_else(|| {
            ReconcileError::not_found(ObjectType::Lead, &record.id, "no local lead")
        })?;

        if !mapping.accepts_update(record.update_time.as_deref()) {
            if record.update_time.is_none() {
                warn!(remote_id = %record.id, "update without update_time rejected");
            } else {
                debug!(
                    remote_id = %record.id,
                    last_sync = %mapping.last_sync,
                    update_time = ?record.update_time,
                    "stale update rejected"
                );
            }
            return Ok(UpdateOutcome::Stale);
        }

        let attributes = self.translate(ObjectType::Lead, record);
        let now = self.clock.now();
        lead.date_modified = Some(now.clone());
        lead.apply_attributes(&attributes);
        lead.owner = self.payload_owner(record);
        tx.save_lead(&mut lead, ctx)?;
        tx.advance_mapping(&mut mapping, &now)?;

        if self.settings.is_company_support_enabled() {
            match &record.org_id {
                Some(org_id) => {
                    self.link_in(tx, org_id, &mut lead, ctx)?;
                }
                None => {
                    if let Some(name) = lead.company.clone() {
                        self.unlink_in(tx, &name, &mut lead, ctx)?;
                    }
                }
            }
        }
        Ok(UpdateOutcome::Applied)
    }
}
