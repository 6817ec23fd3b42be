//! Remote field schema and payload translation.
//!
//! The remote CRM sends option fields as option ids and contact fields as
//! arrays of `{value, primary}` objects. Translation turns a payload into
//! canonical local attributes using the remote field schema.

use crmsync_types::{Attributes, RemoteRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How the remote system encodes a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Single choice, sent as an option id.
    Enum,
    /// Multiple choice, sent as comma-separated option ids.
    Set,
    Phone,
    Email,
    #[default]
    #[serde(other)]
    Text,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: Value,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteField {
    pub key: String,
    #[serde(default, rename = "field_type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    /// Local field the value lands in. Defaults to `key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_key: Option<String>,
}

impl RemoteField {
    pub fn new(key: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            kind,
            options: Vec::new(),
            local_key: None,
        }
    }

    pub fn mapped_to(mut self, local_key: impl Into<String>) -> Self {
        self.local_key = Some(local_key.into());
        self
    }

    pub fn with_option(mut self, id: impl Into<Value>, label: impl Into<String>) -> Self {
        self.options.push(FieldOption {
            id: id.into(),
            label: label.into(),
        });
        self
    }

    fn label_for(&self, id: &Value) -> Option<&str> {
        let wanted = scalar_text(id)?;
        self.options
            .iter()
            .find(|o| scalar_text(&o.id).as_deref() == Some(wanted.as_str()))
            .map(|o| o.label.as_str())
    }
}

/// Fields the remote system declares for one object type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFieldSchema {
    pub fields: Vec<RemoteField>,
}

impl RemoteFieldSchema {
    pub fn new(fields: Vec<RemoteField>) -> Self {
        Self { fields }
    }

    pub fn field(&self, key: &str) -> Option<&RemoteField> {
        self.fields.iter().find(|f| f.key == key)
    }
}

/// Turns a remote payload into canonical attributes. Must be pure.
pub trait FieldTranslator: Send + Sync {
    fn translate(&self, record: &RemoteRecord, schema: &RemoteFieldSchema) -> Attributes;
}

/// Schema-driven translator with optional key renaming.
#[derive(Clone, Debug)]
pub struct SchemaFieldTranslator {
    aliases: BTreeMap<String, String>,
    keep_unknown: bool,
}

impl Default for SchemaFieldTranslator {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            keep_unknown: true,
        }
    }
}

impl SchemaFieldTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops payload keys that are neither in the schema nor aliased.
    pub fn strict(mut self) -> Self {
        self.keep_unknown = false;
        self
    }

    /// Renames `remote_key` to `local_field` in the output.
    pub fn with_alias(
        mut self,
        remote_key: impl Into<String>,
        local_field: impl Into<String>,
    ) -> Self {
        self.aliases.insert(remote_key.into(), local_field.into());
        self
    }
}

impl FieldTranslator for SchemaFieldTranslator {
    fn translate(&self, record: &RemoteRecord, schema: &RemoteFieldSchema) -> Attributes {
        let mut attributes = Attributes::new();
        for (key, value) in &record.fields {
            let field = schema.field(key);
            let alias = self.aliases.get(key);
            if field.is_none() && alias.is_none() && !self.keep_unknown {
                continue;
            }
            let converted = match field {
                Some(field) => convert(field, value),
                None => value.clone(),
            };
            let target = field
                .and_then(|f| f.local_key.clone())
                .or_else(|| alias.cloned())
                .unwrap_or_else(|| key.clone());
            attributes.insert(target, converted);
        }
        attributes
    }
}

fn convert(field: &RemoteField, value: &Value) -> Value {
    match field.kind {
        FieldKind::Enum => field
            .label_for(value)
            .map(|label| Value::String(label.to_string()))
            .unwrap_or_else(|| value.clone()),
        FieldKind::Set => {
            let ids: Vec<Value> = match value {
                Value::String(s) => s
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .collect(),
                Value::Array(items) => items.clone(),
                Value::Null => return Value::Null,
                other => vec![other.clone()],
            };
            let labels: Vec<String> = ids
                .iter()
                .map(|id| {
                    field
                        .label_for(id)
                        .map(str::to_string)
                        .or_else(|| scalar_text(id))
                        .unwrap_or_default()
                })
                .collect();
            Value::String(labels.join("|"))
        }
        FieldKind::Phone | FieldKind::Email => primary_contact_value(value),
        FieldKind::Text => match value {
            Value::Object(obj) if obj.contains_key("value") => obj["value"].clone(),
            other => other.clone(),
        },
    }
}

/// `[{value, primary}, ...]` → the primary value, else the first one.
fn primary_contact_value(value: &Value) -> Value {
    let Value::Array(entries) = value else {
        return value.clone();
    };
    let primary = entries
        .iter()
        .find(|e| e.get("primary").and_then(Value::as_bool).unwrap_or(false))
        .or_else(|| entries.first());
    match primary {
        Some(Value::Object(obj)) => obj.get("value").cloned().unwrap_or(Value::Null),
        Some(scalar) => scalar.clone(),
        None => Value::Null,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.trim().to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
