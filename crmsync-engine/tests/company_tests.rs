mod support;

use crmsync_engine::{AssociationOutcome, DeleteOutcome, SkipReason, UpdateOutcome};
use crmsync_types::{LocalId, ObjectType, OwnerRef, RemoteId, RemoteRecord};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use support::*;

fn remote(payload: Value) -> RemoteRecord {
    RemoteRecord::from_value(payload).unwrap()
}

fn acme() -> RemoteRecord {
    remote(json!({ "id": 500, "name": "Acme", "address": "1 Main St", "owner_id": 8 }))
}

// ── Company lifecycle ───────────────────────────────────────────

#[test]
fn create_company_maps_organization() {
    let h = company_harness();

    assert!(h.engine.create_company(&acme()).unwrap());

    let company = h.company_for("500");
    assert_eq!(company.name, "Acme");
    assert_eq!(company.attributes.get("companyname"), Some(&json!("Acme")));
    assert_eq!(company.attributes.get("address"), Some(&json!("1 Main St")));
    assert_eq!(company.owner, Some(OwnerRef(80)));
    assert_eq!(company.date_modified, Some(ts(NOW)));
    assert_eq!(h.mapping(ObjectType::Company, "500").unwrap().last_sync, ts(NOW));
}

#[test]
fn duplicate_company_create_conflicts() {
    let h = company_harness();
    h.engine.create_company(&acme()).unwrap();

    let err = h.engine.create_company(&acme()).unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(h.store().mapping_count(ObjectType::Company).unwrap(), 1);
}

#[test]
fn company_update_renames_and_merges_partially() {
    let h = company_harness();
    h.engine.create_company(&acme()).unwrap();

    let outcome = h
        .engine
        .update_company(&remote(json!({ "id": 500, "name": "Acme Corp", "update_time": LATER })))
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Applied);
    let company = h.company_for("500");
    assert_eq!(company.name, "Acme Corp");
    assert_eq!(company.attributes.get("address"), Some(&json!("1 Main St")));
    assert_eq!(company.owner, None);
}

#[test]
fn stale_company_update_is_rejected() {
    let h = company_harness();
    h.engine.create_company(&acme()).unwrap();

    let outcome = h
        .engine
        .update_company(&remote(json!({ "id": 500, "name": "Old", "update_time": EARLIER })))
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Stale);
    assert_eq!(h.company_for("500").name, "Acme");
}

#[test]
fn unknown_company_update_creates() {
    let h = company_harness();

    let outcome = h
        .engine
        .update_company(&remote(json!({ "id": 501, "name": "Globex", "update_time": NOW })))
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Created);
    assert_eq!(h.company_for("501").name, "Globex");
}

#[test]
fn deleting_company_drops_memberships() {
    let h = company_harness();
    h.engine.create_company(&acme()).unwrap();
    h.engine
        .create_lead(&remote(json!({ "id": 1, "org_id": 500 })))
        .unwrap();

    let outcome = h.engine.delete_company(&RemoteId::from("500")).unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert!(h.mapping(ObjectType::Company, "500").is_none());
    assert!(h.lead_for("1").companies.is_empty());
}

#[test]
fn deleting_unmapped_company_is_not_found() {
    let h = company_harness();

    let err = h.engine.delete_company(&RemoteId::from("500")).unwrap_err();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("company 500"));
}

// ── Association operations ──────────────────────────────────────

#[test]
fn link_is_idempotent() {
    let h = company_harness();
    h.engine.create_company(&acme()).unwrap();
    let lead = seed_lead(h.store(), &[]);

    let first = h
        .engine
        .link_lead_to_company(&RemoteId::from("500"), lead)
        .unwrap();
    let second = h
        .engine
        .link_lead_to_company(&RemoteId::from("500"), lead)
        .unwrap();

    assert_eq!(first, AssociationOutcome::Linked);
    assert_eq!(second, AssociationOutcome::AlreadyLinked);
    assert_eq!(h.company_for("500").member_leads.len(), 1);
}

#[test]
fn link_skips_unsynced_organization() {
    let h = company_harness();
    let lead = seed_lead(h.store(), &[]);

    let outcome = h
        .engine
        .link_lead_to_company(&RemoteId::from("999"), lead)
        .unwrap();

    assert_eq!(outcome, AssociationOutcome::Skipped(SkipReason::CompanyNotSynced));
    assert!(outcome.is_skipped());
}

#[test]
fn link_skips_company_that_no_longer_loads() {
    let h = company_harness();
    let lead = seed_lead(h.store(), &[]);
    seed_mapping(h.store(), ObjectType::Company, "500", LocalId(4242), EARLIER);

    let outcome = h
        .engine
        .link_lead_to_company(&RemoteId::from("500"), lead)
        .unwrap();

    assert_eq!(outcome, AssociationOutcome::Skipped(SkipReason::CompanyMissing));
}

#[test]
fn link_skips_missing_lead() {
    let h = company_harness();
    h.engine.create_company(&acme()).unwrap();

    let outcome = h
        .engine
        .link_lead_to_company(&RemoteId::from("500"), LocalId(999))
        .unwrap();

    assert_eq!(outcome, AssociationOutcome::Skipped(SkipReason::LeadMissing));
}

#[test]
fn unlink_by_name_ignores_case() {
    let h = company_harness();
    let company = seed_company(h.store(), "Acme");
    let lead = seed_lead(h.store(), &[]);
    link(h.store(), company, lead);

    let outcome = h.engine.unlink_lead_from_company("ACME", lead).unwrap();

    assert_eq!(outcome, AssociationOutcome::Unlinked);
    let stored = h.store().lead(lead).unwrap().unwrap();
    assert_eq!(stored.company, None);
    assert!(stored.companies.is_empty());
}

#[test]
fn unlink_skips_unknown_name() {
    let h = company_harness();
    let lead = seed_lead(h.store(), &[]);

    let outcome = h.engine.unlink_lead_from_company("Nobody Inc", lead).unwrap();

    assert_eq!(outcome, AssociationOutcome::Skipped(SkipReason::NameUnresolved));
}

#[test]
fn unlink_skips_non_member() {
    let h = company_harness();
    seed_company(h.store(), "Acme");
    let lead = seed_lead(h.store(), &[]);

    let outcome = h.engine.unlink_lead_from_company("Acme", lead).unwrap();

    assert_eq!(outcome, AssociationOutcome::Skipped(SkipReason::NotAMember));
}
