//! SQLite storage layer for crmsync.
//!
//! Holds everything one reconciliation call touches, in one database:
//! - integration mappings (remote id ↔ local id, last sync stamp)
//! - local leads and companies, with soft delete
//! - company membership rows
//! - the pending-deletion queue
//!
//! # Architecture
//!
//! The engine never talks to SQLite directly. It opens a [`StoreTx`] via
//! [`SyncStore::begin`], reads and writes through the repository traits and
//! commits once. Dropping an uncommitted transaction rolls it back, so a
//! failed reconciliation leaves no partial state behind.

mod error;
mod schema;
mod sqlite;
mod traits;

pub use error::{StoreError, StoreResult};
pub use schema::initialize_sync_schema;
pub use sqlite::{SqliteSyncStore, SqliteTx};
pub use traits::{
    CompanyRepository, DeletionQueue, LeadRepository, LocalStore, MappingStore, StoreTx,
    SyncStore,
};
