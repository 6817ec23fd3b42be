//! Duplicate detection for incoming leads.

use crmsync_storage::{LocalStore, StoreResult};
use crmsync_types::{is_blank_value, Attributes, LeadEntity};
use serde_json::Value;

pub trait DuplicateResolver: Send + Sync {
    /// Returns an existing local lead matching `attributes`, if any.
    fn find_duplicate(
        &self,
        store: &dyn LocalStore,
        attributes: &Attributes,
    ) -> StoreResult<Option<LeadEntity>>;
}

/// Matches on unique identifier fields, in order. The first field present
/// in the attributes decides.
#[derive(Clone, Debug)]
pub struct UniqueFieldDuplicateResolver {
    fields: Vec<String>,
}

impl Default for UniqueFieldDuplicateResolver {
    fn default() -> Self {
        Self::new(["email"])
    }
}

impl UniqueFieldDuplicateResolver {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl DuplicateResolver for UniqueFieldDuplicateResolver {
    fn find_duplicate(
        &self,
        store: &dyn LocalStore,
        attributes: &Attributes,
    ) -> StoreResult<Option<LeadEntity>> {
        for field in &self.fields {
            let Some(value) = attributes.get(field).filter(|v| !is_blank_value(v)) else {
                continue;
            };
            let needle = match value {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            return Ok(store.find_leads_by_field(field, &needle)?.into_iter().next());
        }
        Ok(None)
    }
}

/// Never finds a duplicate.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDuplicateResolver;

impl DuplicateResolver for NoDuplicateResolver {
    fn find_duplicate(
        &self,
        _store: &dyn LocalStore,
        _attributes: &Attributes,
    ) -> StoreResult<Option<LeadEntity>> {
        Ok(None)
    }
}
