//! Persistence seams consumed by the reconciliation engine.
//!
//! Each trait covers one concern. A transaction implements all of them
//! (see [`LocalStore`]) so a single reconciliation call reads and writes
//! through one atomic unit.

use crate::error::StoreResult;
use crmsync_types::{
    ChangeContext, CompanyEntity, EntityChange, IntegrationMapping, LeadEntity, LocalId,
    MappingId, ObjectType, PendingDeletion, PendingDeletionId, RemoteId, SyncTimestamp,
};

/// Remote id ↔ local id links.
pub trait MappingStore {
    fn find_mapping(
        &self,
        object_type: ObjectType,
        remote_id: &RemoteId,
    ) -> StoreResult<Option<IntegrationMapping>>;

    fn find_mapping_by_id(&self, id: MappingId) -> StoreResult<Option<IntegrationMapping>>;

    /// The mapping currently pointing at a local entity, if any.
    fn find_mapping_for_local(
        &self,
        object_type: ObjectType,
        local_id: LocalId,
    ) -> StoreResult<Option<IntegrationMapping>>;

    /// Inserts a mapping. Fails with `StoreError::DuplicateMapping` when
    /// `(object_type, remote_id)` is already mapped.
    fn create_mapping(
        &mut self,
        object_type: ObjectType,
        remote_id: &RemoteId,
        local_id: LocalId,
        synced_at: &SyncTimestamp,
    ) -> StoreResult<IntegrationMapping>;

    /// Moves the last-sync stamp forward and persists it.
    fn advance_mapping(
        &mut self,
        mapping: &mut IntegrationMapping,
        synced_at: &SyncTimestamp,
    ) -> StoreResult<()>;

    fn remove_mapping(&mut self, mapping: &IntegrationMapping) -> StoreResult<()>;
}

/// Sink for deletions deferred to the out-of-band sweep.
pub trait DeletionQueue {
    fn enqueue_deletion(
        &mut self,
        object_type: ObjectType,
        mapping_id: MappingId,
        deleted_at: &SyncTimestamp,
    ) -> StoreResult<PendingDeletion>;

    /// Oldest first.
    fn pending_deletions(&self, limit: usize) -> StoreResult<Vec<PendingDeletion>>;

    fn complete_deletion(&mut self, id: PendingDeletionId) -> StoreResult<()>;
}

/// Local person records.
pub trait LeadRepository {
    /// Loads a live lead. Soft-deleted rows are invisible.
    fn get_lead(&self, id: LocalId) -> StoreResult<Option<LeadEntity>>;

    /// Loads a lead by primary key, soft-deleted or not.
    fn find_lead_by_id(&self, id: LocalId) -> StoreResult<Option<LeadEntity>>;

    /// Live leads whose `field` equals `value`, ignoring case.
    fn find_leads_by_field(&self, field: &str, value: &str) -> StoreResult<Vec<LeadEntity>>;

    /// Inserts or updates a lead, assigning `lead.id` on insert.
    fn save_lead(&mut self, lead: &mut LeadEntity, ctx: &ChangeContext) -> StoreResult<LocalId>;

    /// Soft-deletes a lead. Returns the deleted id, or `None` when nothing
    /// was deleted (the row was already gone).
    fn delete_lead(
        &mut self,
        lead: &LeadEntity,
        ctx: &ChangeContext,
    ) -> StoreResult<Option<LocalId>>;
}

/// Local organization records and their membership.
pub trait CompanyRepository {
    fn get_company(&self, id: LocalId) -> StoreResult<Option<CompanyEntity>>;

    fn find_company_by_id(&self, id: LocalId) -> StoreResult<Option<CompanyEntity>>;

    /// First live company with this display name, ignoring case.
    fn find_company_by_name(&self, name: &str) -> StoreResult<Option<CompanyEntity>>;

    fn save_company(
        &mut self,
        company: &mut CompanyEntity,
        ctx: &ChangeContext,
    ) -> StoreResult<LocalId>;

    /// Soft-deletes a company and drops its membership rows.
    fn delete_company(
        &mut self,
        company: &CompanyEntity,
        ctx: &ChangeContext,
    ) -> StoreResult<Option<LocalId>>;

    /// Adds `lead` to `company` and caches the company name on the lead.
    /// Returns false when the lead already was a member.
    fn add_lead_to_company(
        &mut self,
        company: &mut CompanyEntity,
        lead: &mut LeadEntity,
        ctx: &ChangeContext,
    ) -> StoreResult<bool>;

    /// Removes `lead` from `company`, clearing the cached name if it named
    /// this company. Returns false when nothing changed.
    fn remove_lead_from_company(
        &mut self,
        company: &mut CompanyEntity,
        lead: &mut LeadEntity,
        ctx: &ChangeContext,
    ) -> StoreResult<bool>;
}

/// Everything a reconciliation call may touch.
pub trait LocalStore: MappingStore + DeletionQueue + LeadRepository + CompanyRepository {}

impl<T> LocalStore for T where
    T: MappingStore + DeletionQueue + LeadRepository + CompanyRepository
{
}

/// An open unit of work. Dropping it without `commit` rolls back.
pub trait StoreTx: LocalStore {
    /// Commits and hands back the changes recorded during the transaction.
    fn commit(self) -> StoreResult<Vec<EntityChange>>
    where
        Self: Sized;
}

/// A store that can open transactions.
pub trait SyncStore: Send + Sync {
    type Tx<'a>: StoreTx
    where
        Self: 'a;

    fn begin(&self) -> StoreResult<Self::Tx<'_>>;
}
