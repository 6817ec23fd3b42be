//! Company (remote organization) reconciliation.
//!
//! Same rules as leads, minus duplicate detection and membership.

use crate::engine::{DeleteOutcome, ReconciliationEngine, UpdateOutcome};
use crate::error::{ReconcileError, ReconcileResult};
use crmsync_storage::{LocalStore, SyncStore};
use crmsync_types::{ChangeContext, CompanyEntity, ObjectType, RemoteId, RemoteRecord};
use tracing::{debug, info, warn};

impl<S: SyncStore> ReconciliationEngine<S> {
    pub fn create_company(&self, record: &RemoteRecord) -> ReconcileResult<bool> {
        let ctx = self.context();
        let mut tx = self.store.begin()?;
        let company = self.create_company_in(&mut tx, record, &ctx)?;
        self.finish(tx)?;
        info!(
            object_type = "company",
            remote_id = %record.id,
            local_id = ?company.id,
            name = %company.name,
            "created"
        );
        Ok(true)
    }

    pub fn update_company(&self, record: &RemoteRecord) -> ReconcileResult<UpdateOutcome> {
        let ctx = self.context();
        let mut tx = self.store.begin()?;
        let outcome = self.update_company_in(&mut tx, record, &ctx)?;
        if outcome == UpdateOutcome::Stale {
            return Ok(outcome);
        }
        self.finish(tx)?;
        info!(object_type = "company", remote_id = %record.id, ?outcome, "updated");
        Ok(outcome)
    }

    /// Deletes the company mapped to a remote organization. Its membership
    /// rows go with it.
    pub fn delete_company(&self, remote_id: &RemoteId) -> ReconcileResult<DeleteOutcome> {
        self.delete_object(ObjectType::Company, remote_id)
    }

    fn create_company_in<T: LocalStore>(
        &self,
        tx: &mut T,
        record: &RemoteRecord,
        ctx: &ChangeContext,
    ) -> ReconcileResult<CompanyEntity> {
        let conflict = || ReconcileError::Conflict {
            object_type: ObjectType::Company,
            remote_id: record.id.clone(),
        };
        if tx.find_mapping(ObjectType::Company, &record.id)?.is_some() {
            return Err(conflict());
        }

        let now = self.clock.now();
        let mut company = CompanyEntity::new();
        company.apply_attributes(&self.translate(ObjectType::Company, record));
        if record.owner_id.is_some() {
            company.owner = self.payload_owner(record);
        }
        company.date_modified = Some(now.clone());
        let local_id = tx.save_company(&mut company, ctx)?;

        if tx.find_mapping(ObjectType::Company, &record.id)?.is_some() {
            return Err(conflict());
        }
        tx.create_mapping(ObjectType::Company, &record.id, local_id, &now)?;
        Ok(company)
    }

    fn update_company_in<T: LocalStore>(
        &self,
        tx: &mut T,
        record: &RemoteRecord,
        ctx: &ChangeContext,
    ) -> ReconcileResult<UpdateOutcome> {
        let Some(mut mapping) = tx.find_mapping(ObjectType::Company, &record.id)? else {
            self.create_company_in(tx, record, ctx)?;
            return Ok(UpdateOutcome::Created);
        };
        let mut company = tx.get_company(mapping.local_id)?.ok_or_else(|| {
            ReconcileError::not_found(ObjectType::Company, &record.id, "no local company")
        })?;

        if !mapping.accepts_update(record.update_time.as_deref()) {
            if record.update_time.is_none() {
                warn!(remote_id = %record.id, "organization update without update_time rejected");
            } else {
                debug!(
                    remote_id = %record.id,
                    last_sync = %mapping.last_sync,
                    update_time = ?record.update_time,
                    "stale organization update rejected"
                );
            }
            return Ok(UpdateOutcome::Stale);
        }

        let now = self.clock.now();
        company.date_modified = Some(now.clone());
        company.apply_attributes(&self.translate(ObjectType::Company, record));
        company.owner = self.payload_owner(record);
        tx.save_company(&mut company, ctx)?;
        tx.advance_mapping(&mut mapping, &now)?;
        Ok(UpdateOutcome::Applied)
    }
}
