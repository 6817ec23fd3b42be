//! Lead ↔ company membership bookkeeping.
//!
//! Linking is keyed by the remote organization id, which resolves through
//! the company mappings. Unlinking is keyed by the company name cached on
//! the lead, because that is all an update without an organization id
//! leaves to go on. Neither direction treats an unresolvable target as an
//! error.

use crate::engine::ReconciliationEngine;
use crate::error::ReconcileResult;
use crmsync_storage::{LeadRepository, LocalStore, SyncStore};
use crmsync_types::{ChangeContext, LeadEntity, LocalId, ObjectType, RemoteId};
use tracing::debug;

/// Why an association request changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The organization id has no company mapping yet.
    CompanyNotSynced,
    /// The mapped company no longer loads.
    CompanyMissing,
    /// No live company carries the cached name.
    NameUnresolved,
    /// The lead was not a member and did not cache the name.
    NotAMember,
    /// The local lead does not exist.
    LeadMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationOutcome {
    Linked,
    AlreadyLinked,
    Unlinked,
    Skipped(SkipReason),
}

impl AssociationOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, AssociationOutcome::Skipped(_))
    }
}

impl<S: SyncStore> ReconciliationEngine<S> {
    /// Adds a local lead to the company mapped from `org_id`.
    pub fn link_lead_to_company(
        &self,
        org_id: &RemoteId,
        lead_id: LocalId,
    ) -> ReconcileResult<AssociationOutcome> {
        let ctx = self.context();
        let mut tx = self.store.begin()?;
        let Some(mut lead) = tx.get_lead(lead_id)? else {
            return Ok(AssociationOutcome::Skipped(SkipReason::LeadMissing));
        };
        let outcome = self.link_in(&mut tx, org_id, &mut lead, &ctx)?;
        self.finish(tx)?;
        Ok(outcome)
    }

    /// Removes a local lead from the company named `company_name`.
    pub fn unlink_lead_from_company(
        &self,
        company_name: &str,
        lead_id: LocalId,
    ) -> ReconcileResult<AssociationOutcome> {
        let ctx = self.context();
        let mut tx = self.store.begin()?;
        let Some(mut lead) = tx.get_lead(lead_id)? else {
            return Ok(AssociationOutcome::Skipped(SkipReason::LeadMissing));
        };
        let outcome = self.unlink_in(&mut tx, company_name, &mut lead, &ctx)?;
        self.finish(tx)?;
        Ok(outcome)
    }

    pub(crate) fn link_in<T: LocalStore>(
        &self,
        tx: &mut T,
        org_id: &RemoteId,
        lead: &mut LeadEntity,
        ctx: &ChangeContext,
    ) -> ReconcileResult<AssociationOutcome> {
        let Some(mapping) = tx.find_mapping(ObjectType::Company, org_id)? else {
            debug!(org_id = %org_id, "organization not synced yet, skipping link");
            return Ok(AssociationOutcome::Skipped(SkipReason::CompanyNotSynced));
        };
        let Some(mut company) = tx.get_company(mapping.local_id)? else {
            debug!(
                org_id = %org_id,
                local_id = %mapping.local_id,
                "mapped company missing, skipping link"
            );
            return Ok(AssociationOutcome::Skipped(SkipReason::CompanyMissing));
        };

        if tx.add_lead_to_company(&mut company, lead, ctx)? {
            Ok(AssociationOutcome::Linked)
        } else {
            Ok(AssociationOutcome::AlreadyLinked)
        }
    }

    pub(crate) fn unlink_in<T: LocalStore>(
        &self,
        tx: &mut T,
        company_name: &str,
        lead: &mut LeadEntity,
        ctx: &ChangeContext,
    ) -> ReconcileResult<AssociationOutcome> {
        let Some(mut company) = tx.find_company_by_name(company_name)? else {
            debug!(company = company_name, "no company with cached name, skipping unlink");
            return Ok(AssociationOutcome::Skipped(SkipReason::NameUnresolved));
        };

        if tx.remove_lead_from_company(&mut company, lead, ctx)? {
            Ok(AssociationOutcome::Unlinked)
        } else {
            Ok(AssociationOutcome::Skipped(SkipReason::NotAMember))
        }
    }
}
