//! Integration mappings and queued deletions.

use crate::error::TypesError;
use crate::ids::{LocalId, RemoteId};
use crate::timestamp::SyncTimestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of record a mapping links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Lead,
    Company,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Lead => "lead",
            ObjectType::Company => "company",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead" => Ok(ObjectType::Lead),
            "company" => Ok(ObjectType::Company),
            other => Err(TypesError::UnknownObjectType(other.to_string())),
        }
    }
}

/// Surrogate key of a mapping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingId(pub i64);

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable link between a remote record and a local entity.
///
/// At most one mapping exists per `(object_type, remote_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationMapping {
    pub id: MappingId,
    pub object_type: ObjectType,
    pub remote_id: RemoteId,
    pub local_id: LocalId,
    pub last_sync: SyncTimestamp,
}

impl IntegrationMapping {
    /// Whether an incoming remote change stamped `update_time` is newer than
    /// the last synchronization. A missing stamp never wins.
    pub fn accepts_update(&self, update_time: Option<&str>) -> bool {
        match update_time {
            Some(incoming) => !self.last_sync.is_at_or_after(incoming),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingDeletionId(pub i64);

/// A deletion queued for the out-of-band sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeletion {
    pub id: PendingDeletionId,
    pub object_type: ObjectType,
    pub mapping_id: MappingId,
    pub deleted_date: SyncTimestamp,
}
