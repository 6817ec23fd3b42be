//! Reconciliation of remote CRM persons and organizations into local leads
//! and companies.
//!
//! # Architecture
//!
//! - [`ReconciliationEngine`] applies create, update, delete and merge
//!   events against a [`crmsync_storage::SyncStore`], one transaction per
//!   event
//! - collaborators are injected as traits: [`FieldTranslator`],
//!   [`DuplicateResolver`], [`OwnerResolver`], [`EntityMerger`], [`Clock`]
//! - committed changes fan out through [`ChangeDispatcher`]; changes made
//!   on behalf of the remote system are withheld from exporters
//! - stale events are detected by comparing the mapping's last sync stamp
//!   with the payload's `update_time`, lexically
//!
//! Events arrive at least once and possibly out of order; replays are
//! answered with `Conflict` (duplicate create) or `Stale` (old update).

mod association;
mod clock;
mod company_import;
mod config;
mod dedup;
mod dispatch;
mod engine;
mod error;
mod event;
mod lead_import;
mod merger;
mod owner;
mod sweep;
mod translator;

pub use association::{AssociationOutcome, SkipReason};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{FeatureSettings, SyncObject, SyncSettings};
pub use dedup::{DuplicateResolver, NoDuplicateResolver, UniqueFieldDuplicateResolver};
pub use dispatch::{ChangeDispatcher, ChangeListener};
pub use engine::{DeleteOutcome, MergeOutcome, ReconciliationEngine, UpdateOutcome};
pub use error::{ReconcileError, ReconcileResult};
pub use event::{EventOutcome, RemoteEvent};
pub use merger::{EntityMerger, MergeError, PrecedenceMerger};
pub use owner::{OwnerResolver, StaticOwnerResolver};
pub use sweep::SweepReport;
pub use translator::{
    FieldKind, FieldOption, FieldTranslator, RemoteField, RemoteFieldSchema, SchemaFieldTranslator,
};
