//! Collapsing two local leads into one.

use crmsync_storage::{LocalStore, StoreError};
use crmsync_types::{is_blank_value, ChangeContext, LeadEntity, LocalId};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MergeError {
    /// Both sides already denote the same local lead.
    #[error("lead {0} cannot be merged into itself")]
    SameEntity(LocalId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub trait EntityMerger: Send + Sync {
    /// Merges `loser` into `winner`, persisting through `store`. Returns the
    /// surviving lead.
    fn merge(
        &self,
        store: &mut dyn LocalStore,
        winner: LeadEntity,
        loser: LeadEntity,
        ctx: &ChangeContext,
    ) -> Result<LeadEntity, MergeError>;
}

/// Newest-wins field precedence.
///
/// The lead modified most recently supplies values; blank values fall back
/// to the other lead. The winner keeps its id and inherits the loser's
/// company memberships, and the loser is soft-deleted.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrecedenceMerger;

impl EntityMerger for PrecedenceMerger {
    fn merge(
        &self,
        store: &mut dyn LocalStore,
        winner: LeadEntity,
        loser: LeadEntity,
        ctx: &ChangeContext,
    ) -> Result<LeadEntity, MergeError> {
        let winner_id = winner.id.ok_or(StoreError::Unsaved("lead"))?;
        let loser_id = loser.id.ok_or(StoreError::Unsaved("lead"))?;
        if winner_id == loser_id {
            return Err(MergeError::SameEntity(winner_id));
        }

        let loser_is_newer = loser.date_modified > winner.date_modified;
        let (newer, older) = if loser_is_newer {
            (&loser, &winner)
        } else {
            (&winner, &loser)
        };

        let mut merged = winner.clone();
        merged.attributes.clear();
        for (field, value) in older.attributes.iter().chain(newer.attributes.iter()) {
            if field == "id" {
                continue;
            }
            let preferred = newer.attributes.get(field).filter(|v| !is_blank_value(v));
            let chosen = preferred
                .or_else(|| older.attributes.get(field).filter(|v| !is_blank_value(v)))
                .unwrap_or(value);
            merged.attributes.insert(field.clone(), chosen.clone());
        }
        merged.owner = winner.owner.or(loser.owner);
        merged.date_modified = newer.date_modified.clone().or_else(|| older.date_modified.clone());
        let company_name = newer.company.clone().or_else(|| older.company.clone());

        for company_id in loser.companies.difference(&winner.companies) {
            if let Some(mut company) = store.get_company(*company_id)? {
                store.add_lead_to_company(&mut company, &mut merged, ctx)?;
            }
        }
        merged.company = company_name;

        store.save_lead(&mut merged, ctx)?;
        store.delete_lead(&loser, ctx)?;
        debug!(winner = %winner_id, loser = %loser_id, "merged leads");
        Ok(merged)
    }
}
