//! Out-of-band processing of queued deletions.

use crate::engine::ReconciliationEngine;
use crate::error::ReconcileResult;
use crmsync_storage::{DeletionQueue, MappingStore, SyncStore};
use tracing::{debug, info};

/// Tally of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entities deleted with their mapping removed.
    pub deleted: usize,
    /// Entities the store declined to delete; mapping kept.
    pub retained: usize,
    /// Queue rows whose mapping or entity was already gone.
    pub skipped: usize,
}

impl SweepReport {
    pub fn processed(&self) -> usize {
        self.deleted + self.retained + self.skipped
    }
}

impl<S: SyncStore> ReconciliationEngine<S> {
    /// Executes up to `limit` queued deletions, oldest first. Each one
    /// commits on its own; a storage failure stops the run and leaves the
    /// remaining rows queued.
    pub fn process_pending_deletions(&self, limit: usize) -> ReconcileResult<SweepReport> {
        let pending = {
            let tx = self.store.begin()?;
            tx.pending_deletions(limit)?
        };

        let mut report = SweepReport::default();
        for item in pending {
            let ctx = self.context();
            let mut tx = self.store.begin()?;

            match tx.find_mapping_by_id(item.mapping_id)? {
                None => {
                    debug!(
                        pending_id = item.id.0,
                        mapping_id = %item.mapping_id,
                        "mapping already gone"
                    );
                    report.skipped += 1;
                }
                Some(mapping) => match self.delete_mapped_in(&mut tx, &mapping, &ctx) {
                    Ok(true) => report.deleted += 1,
                    Ok(false) => report.retained += 1,
                    Err(err) if err.is_not_found() => {
                        debug!(
                            object_type = %mapping.object_type,
                            remote_id = %mapping.remote_id,
                            "local entity already gone, dropping mapping"
                        );
                        tx.remove_mapping(&mapping)?;
                        report.skipped += 1;
                    }
                    Err(err) => return Err(err),
                },
            }

            tx.complete_deletion(item.id)?;
            self.finish(tx)?;
        }

        if report.processed() > 0 {
            info!(
                deleted = report.deleted,
                retained = report.retained,
                skipped = report.skipped,
                "processed pending deletions"
            );
        }
        Ok(report)
    }
}
