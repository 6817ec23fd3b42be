//! Local lead and company records.

use crate::ids::{LocalId, OwnerRef};
use crate::timestamp::SyncTimestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Canonical field name → value.
pub type Attributes = BTreeMap<String, Value>;

/// Canonical attribute carrying a company's display name.
pub const COMPANY_NAME_FIELD: &str = "companyname";

/// True for `null` and whitespace-only strings.
pub fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// A local person record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadEntity {
    /// `None` until the lead is first persisted.
    pub id: Option<LocalId>,
    pub attributes: Attributes,
    pub owner: Option<OwnerRef>,
    /// Display name of the primary company, as last cached on the lead.
    pub company: Option<String>,
    /// Companies this lead is a member of.
    pub companies: BTreeSet<LocalId>,
    pub date_modified: Option<SyncTimestamp>,
}

impl LeadEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Overwrites every provided field and keeps the rest.
    pub fn apply_attributes(&mut self, attributes: &Attributes) {
        for (field, value) in attributes {
            self.attributes.insert(field.clone(), value.clone());
        }
    }

    pub fn has_company_association(&self) -> bool {
        self.company.is_some() || !self.companies.is_empty()
    }
}

/// A local organization record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyEntity {
    pub id: Option<LocalId>,
    pub name: String,
    pub attributes: Attributes,
    pub owner: Option<OwnerRef>,
    pub date_modified: Option<SyncTimestamp>,
    pub member_leads: BTreeSet<LocalId>,
}

impl CompanyEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut company = Self::default();
        company
            .attributes
            .insert(COMPANY_NAME_FIELD.to_string(), Value::String(name.clone()));
        company.name = name;
        company
    }

    /// Overwrites every provided field and keeps the rest. A string
    /// `companyname` also renames the company.
    pub fn apply_attributes(&mut self, attributes: &Attributes) {
        for (field, value) in attributes {
            self.attributes.insert(field.clone(), value.clone());
        }
        if let Some(Value::String(name)) = attributes.get(COMPANY_NAME_FIELD) {
            self.name = name.clone();
        }
    }

    pub fn has_member(&self, lead: LocalId) -> bool {
        self.member_leads.contains(&lead)
    }
}
