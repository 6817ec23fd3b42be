//! Shared types for crmsync.
//!
//! Everything the reconciliation engine and the storage layer pass between
//! each other lives here:
//! - identifiers for remote records, local entities and owners
//! - the canonical `SyncTimestamp` used for conflict detection
//! - the inbound `RemoteRecord` payload
//! - local `LeadEntity` / `CompanyEntity` records
//! - integration mappings and queued deletions
//! - change notifications tagged with their origin

mod change;
mod entity;
mod error;
mod ids;
mod mapping;
mod record;
mod timestamp;

pub use change::{ChangeContext, ChangeKind, ChangeOrigin, EntityChange};
pub use entity::{is_blank_value, Attributes, CompanyEntity, LeadEntity, COMPANY_NAME_FIELD};
pub use error::{TypesError, TypesResult};
pub use ids::{LocalId, OwnerRef, RemoteId};
pub use mapping::{IntegrationMapping, MappingId, ObjectType, PendingDeletion, PendingDeletionId};
pub use record::RemoteRecord;
pub use timestamp::{SyncTimestamp, CANONICAL_FORMAT};
