use crmsync_engine::{FeatureSettings, ReconcileError, SyncObject, SyncSettings};
use crmsync_storage::StoreError;
use crmsync_types::{ObjectType, RemoteId, TypesError};
use pretty_assertions::assert_eq;
use std::io::Write;

// ── Settings ────────────────────────────────────────────────────

#[test]
fn defaults_sync_leads_only_and_delete_immediately() {
    let settings = SyncSettings::default();

    assert_eq!(settings.integration, "pipedrive");
    assert!(settings.is_published);
    assert_eq!(settings.features, FeatureSettings::default());
    assert_eq!(settings.features.objects, vec![SyncObject::Lead]);
    assert!(!settings.deletes_via_queue());
    assert!(!settings.is_company_support_enabled());
}

#[test]
fn empty_json_yields_defaults() {
    assert_eq!(SyncSettings::from_json("{}").unwrap(), SyncSettings::default());
}

#[test]
fn json_settings_are_parsed() {
    let settings = SyncSettings::from_json(
        r#"{
            "integration": "crm-eu",
            "is_published": true,
            "features": { "cron_delete": true, "objects": ["lead", "company"] }
        }"#,
    )
    .unwrap();

    assert_eq!(settings.integration, "crm-eu");
    assert!(settings.deletes_via_queue());
    assert!(settings.is_company_support_enabled());
}

#[test]
fn deferred_delete_needs_both_flags() {
    let cases = [
        (true, true, true),
        (true, false, false),
        (false, true, false),
        (false, false, false),
    ];
    for (published, cron_delete, expected) in cases {
        let settings = SyncSettings::default()
            .with_published(published)
            .with_cron_delete(cron_delete);
        assert_eq!(
            settings.deletes_via_queue(),
            expected,
            "published={published} cron_delete={cron_delete}"
        );
    }
}

#[test]
fn company_support_toggle_is_idempotent() {
    let settings = SyncSettings::default()
        .with_company_support(true)
        .with_company_support(true);
    assert_eq!(settings.features.objects, vec![SyncObject::Lead, SyncObject::Company]);

    let settings = settings.with_company_support(false);
    assert!(!settings.is_company_support_enabled());
}

#[test]
fn invalid_json_is_a_config_error() {
    let err = SyncSettings::from_json(r#"{ "features": { "objects": ["deal"] } }"#).unwrap_err();

    assert!(matches!(err, ReconcileError::Config(_)));
    assert_eq!(err.status_code(), 500);
}

#[test]
fn settings_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "features": {{ "cron_delete": true }} }}"#).unwrap();

    let settings = SyncSettings::load(file.path()).unwrap();

    assert!(settings.features.cron_delete);
    assert!(settings.deletes_via_queue());
}

#[test]
fn missing_settings_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = SyncSettings::load(&dir.path().join("absent.json")).unwrap_err();

    assert!(matches!(err, ReconcileError::Config(msg) if msg.contains("absent.json")));
}

// ── Error mapping ───────────────────────────────────────────────

#[test]
fn duplicate_mapping_becomes_conflict() {
    let err: ReconcileError = StoreError::DuplicateMapping {
        object_type: ObjectType::Lead,
        remote_id: RemoteId::from("3"),
    }
    .into();

    assert!(err.is_conflict());
    assert_eq!(err.to_string(), "lead 3 is already synced");
}

#[test]
fn other_store_failures_are_retryable() {
    let err: ReconcileError = StoreError::LockPoisoned.into();

    assert!(err.is_retryable());
    assert!(!err.is_conflict());
    assert_eq!(err.status_code(), 500);
}

#[test]
fn payload_errors_are_unprocessable() {
    let err: ReconcileError = TypesError::MissingField("id").into();

    assert_eq!(err.status_code(), 422);
    assert!(!err.is_retryable());
}
