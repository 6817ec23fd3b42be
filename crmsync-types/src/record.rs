//! Inbound remote payload.

use crate::error::{TypesError, TypesResult};
use crate::ids::RemoteId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One remote person or organization as delivered by a change event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: RemoteId,
    /// Remote modification stamp, compared lexically against the last sync.
    pub update_time: Option<String>,
    pub owner_id: Option<RemoteId>,
    /// Remote organization id. Only meaningful for persons.
    pub org_id: Option<RemoteId>,
    /// Every other payload key, untranslated.
    pub fields: Map<String, Value>,
}

impl RemoteRecord {
    pub fn new(id: impl Into<RemoteId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_update_time(mut self, update_time: impl Into<String>) -> Self {
        self.update_time = Some(update_time.into());
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<RemoteId>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_org(mut self, org_id: impl Into<RemoteId>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Builds a record from a raw JSON object.
    ///
    /// `owner_id` may arrive as a scalar or as an object carrying `id` or
    /// `value`; `org_id` as a scalar or an object carrying `value`.
    pub fn from_value(value: Value) -> TypesResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(TypesError::InvalidPayload("expected a JSON object".into()));
        };

        let id = fields
            .remove("id")
            .as_ref()
            .and_then(RemoteId::from_json)
            .ok_or(TypesError::MissingField("id"))?;

        let update_time = match fields.remove("update_time") {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::Null) | None => None,
            Some(Value::String(_)) => None,
            Some(other) => {
                return Err(TypesError::InvalidPayload(format!(
                    "update_time must be a string, got {other}"
                )));
            }
        };

        let owner_id = fields
            .remove("owner_id")
            .and_then(|v| nested_id(&v, &["id", "value"]));
        let org_id = fields.remove("org_id").and_then(|v| nested_id(&v, &["value"]));

        Ok(Self {
            id,
            update_time,
            owner_id,
            org_id,
            fields,
        })
    }
}

fn nested_id(value: &Value, keys: &[&str]) -> Option<RemoteId> {
    match value {
        Value::Object(obj) => keys
            .iter()
            .find_map(|k| obj.get(*k).and_then(RemoteId::from_json)),
        scalar => RemoteId::from_json(scalar),
    }
}
