mod support;

use crmsync_engine::ReconcileError;
use crmsync_types::{ChangeKind, ChangeOrigin, ObjectType, OwnerRef, RemoteRecord};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use support::*;

fn remote(payload: Value) -> RemoteRecord {
    RemoteRecord::from_value(payload).unwrap()
}

fn ann(id: i64) -> RemoteRecord {
    remote(json!({
        "id": id,
        "name": "Ann Lee",
        "email": [{ "value": "ann@example.com", "primary": true }],
        "update_time": "2024-02-28 08:00:00",
    }))
}

fn organization(id: i64, name: &str) -> RemoteRecord {
    remote(json!({ "id": id, "name": name, "update_time": "2024-02-28 08:00:00" }))
}

// ── Happy path ──────────────────────────────────────────────────

#[test]
fn create_inserts_lead_and_mapping() {
    let h = default_harness();

    assert!(h.engine.create_lead(&ann(1)).unwrap());

    let mapping = h.mapping(ObjectType::Lead, "1").unwrap();
    assert_eq!(mapping.last_sync, ts(NOW));
    let lead = h.lead_for("1");
    assert_eq!(lead.id, Some(mapping.local_id));
    assert_eq!(lead.attribute("name"), Some(&json!("Ann Lee")));
    assert_eq!(lead.attribute("email"), Some(&json!("ann@example.com")));
    assert_eq!(lead.date_modified, Some(ts(NOW)));
    assert_eq!(lead.owner, None);
    assert_eq!(h.store().live_lead_count().unwrap(), 1);
}

#[test]
fn create_translates_option_and_contact_fields() {
    let h = default_harness();
    let record = remote(json!({
        "id": 2,
        "industry": 2,
        "tags": "10,11",
        "phone": [
            { "value": "555-0100", "primary": false },
            { "value": "555-0199", "primary": true },
        ],
    }));

    h.engine.create_lead(&record).unwrap();

    let lead = h.lead_for("2");
    assert_eq!(lead.attribute("industry"), Some(&json!("Finance")));
    assert_eq!(lead.attribute("tags"), Some(&json!("vip|newsletter")));
    assert_eq!(lead.attribute("phone"), Some(&json!("555-0199")));
}

#[test]
fn create_resolves_owner() {
    let h = default_harness();
    let record = remote(json!({ "id": 3, "owner_id": { "id": 7, "name": "Sam" } }));

    h.engine.create_lead(&record).unwrap();

    assert_eq!(h.lead_for("3").owner, Some(OwnerRef(70)));
}

#[test]
fn create_with_unknown_owner_leaves_lead_unowned() {
    let h = default_harness();
    let record = remote(json!({ "id": 3, "owner_id": 999 }));

    h.engine.create_lead(&record).unwrap();

    assert_eq!(h.lead_for("3").owner, None);
}

// ── Idempotency ─────────────────────────────────────────────────

#[test]
fn second_create_conflicts_without_duplicating() {
    let h = default_harness();
    h.engine.create_lead(&ann(1)).unwrap();

    let err = h.engine.create_lead(&ann(1)).unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(err.status_code(), 409);
    assert!(!err.is_retryable());
    assert!(matches!(err, ReconcileError::Conflict { object_type: ObjectType::Lead, .. }));
    assert_eq!(h.store().mapping_count(ObjectType::Lead).unwrap(), 1);
    assert_eq!(h.store().live_lead_count().unwrap(), 1);
}

#[test]
fn numeric_and_string_ids_share_one_mapping() {
    let h = default_harness();
    h.engine.create_lead(&remote(json!({ "id": 42 }))).unwrap();

    let err = h.engine.create_lead(&remote(json!({ "id": "42" }))).unwrap_err();

    assert!(err.is_conflict());
}

// ── Duplicate detection ─────────────────────────────────────────

#[test]
fn create_reuses_local_duplicate_by_email() {
    let h = default_harness();
    let existing = seed_lead(
        h.store(),
        &[("email", json!("ANN@example.com")), ("city", json!("Oslo"))],
    );

    h.engine.create_lead(&ann(1)).unwrap();

    let mapping = h.mapping(ObjectType::Lead, "1").unwrap();
    assert_eq!(mapping.local_id, existing);
    let lead = h.lead_for("1");
    assert_eq!(lead.attribute("email"), Some(&json!("ann@example.com")));
    assert_eq!(lead.attribute("city"), Some(&json!("Oslo")));
    assert_eq!(h.store().live_lead_count().unwrap(), 1);
}

#[test]
fn duplicate_already_mapped_elsewhere_is_not_reused() {
    let h = default_harness();
    let existing = seed_lead(h.store(), &[("email", json!("ann@example.com"))]);
    seed_mapping(h.store(), ObjectType::Lead, "99", existing, EARLIER);

    h.engine.create_lead(&ann(1)).unwrap();

    let mapping = h.mapping(ObjectType::Lead, "1").unwrap();
    assert_ne!(mapping.local_id, existing);
    assert_eq!(h.store().live_lead_count().unwrap(), 2);
}

// ── Company association ─────────────────────────────────────────

#[test]
fn create_links_synced_organization() {
    let h = company_harness();
    h.engine.create_company(&organization(500, "Acme")).unwrap();
    let record = remote(json!({ "id": 1, "org_id": { "value": 500, "name": "Acme" } }));

    h.engine.create_lead(&record).unwrap();

    let lead = h.lead_for("1");
    let company = h.company_for("500");
    assert_eq!(lead.company.as_deref(), Some("Acme"));
    assert!(lead.companies.contains(&company.id.unwrap()));
    assert!(company.has_member(lead.id.unwrap()));
}

#[test]
fn create_skips_unsynced_organization() {
    let h = company_harness();
    let record = remote(json!({ "id": 1, "org_id": 600 }));

    h.engine.create_lead(&record).unwrap();

    let lead = h.lead_for("1");
    assert!(!lead.has_company_association());
}

#[test]
fn create_ignores_organization_when_company_sync_disabled() {
    let h = default_harness();
    h.engine.create_company(&organization(500, "Acme")).unwrap();
    let record = remote(json!({ "id": 1, "org_id": 500 }));

    h.engine.create_lead(&record).unwrap();

    assert!(!h.lead_for("1").has_company_association());
    assert!(h.company_for("500").member_leads.is_empty());
}

// ── Echo suppression ────────────────────────────────────────────

#[test]
fn created_lead_is_not_echoed_to_exporters() {
    let h = default_harness();

    h.engine.create_lead(&ann(1)).unwrap();

    assert!(h.exporter.seen().is_empty());
    let seen = h.auditor.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, ChangeKind::Saved);
    assert_eq!(seen[0].origin, ChangeOrigin::RemoteSync);
    assert_eq!(seen[0].integration.as_deref(), Some("pipedrive"));
    assert_eq!(Some(seen[0].local_id), h.lead_for("1").id);
}
