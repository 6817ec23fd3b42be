#![allow(dead_code)]

use crmsync_engine::{
    ChangeListener, FieldKind, FixedClock, ReconciliationEngine, RemoteField, RemoteFieldSchema,
    StaticOwnerResolver, SyncSettings,
};
use crmsync_storage::{
    CompanyRepository, LeadRepository, MappingStore, SqliteSyncStore, StoreTx, SyncStore,
};
use crmsync_types::{
    ChangeContext, CompanyEntity, EntityChange, IntegrationMapping, LeadEntity, LocalId,
    ObjectType, OwnerRef, RemoteId, SyncTimestamp,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Processing instant the test clock starts at.
pub const NOW: &str = "2024-03-01 10:00:00";
pub const EARLIER: &str = "2024-02-01 09:00:00";
pub const LATER: &str = "2024-03-05 12:30:00";

pub type Engine = ReconciliationEngine<SqliteSyncStore>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ts(s: &str) -> SyncTimestamp {
    SyncTimestamp::parse(s).unwrap()
}

/// Records every change it receives.
pub struct RecordingListener {
    observes_remote: bool,
    seen: Mutex<Vec<EntityChange>>,
}

impl RecordingListener {
    /// Behaves like an exporter: remote-sync changes are withheld.
    pub fn exporter() -> Arc<Self> {
        Arc::new(Self {
            observes_remote: false,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Sees everything, including remote-sync changes.
    pub fn auditor() -> Arc<Self> {
        Arc::new(Self {
            observes_remote: true,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<EntityChange> {
        self.seen.lock().unwrap().clone()
    }
}

impl ChangeListener for RecordingListener {
    fn on_change(&self, change: &EntityChange) {
        self.seen.lock().unwrap().push(change.clone());
    }

    fn observes_remote_sync(&self) -> bool {
        self.observes_remote
    }
}

pub struct Harness {
    pub engine: Engine,
    pub clock: Arc<FixedClock>,
    pub exporter: Arc<RecordingListener>,
    pub auditor: Arc<RecordingListener>,
}

impl Harness {
    pub fn store(&self) -> &SqliteSyncStore {
        self.engine.store()
    }

    pub fn mapping(&self, object_type: ObjectType, remote_id: &str) -> Option<IntegrationMapping> {
        self.store()
            .mapping(object_type, &RemoteId::from(remote_id))
            .unwrap()
    }

    pub fn lead_for(&self, remote_id: &str) -> LeadEntity {
        let mapping = self
            .mapping(ObjectType::Lead, remote_id)
            .expect("lead mapping");
        self.store().lead(mapping.local_id).unwrap().expect("lead row")
    }

    pub fn company_for(&self, remote_id: &str) -> CompanyEntity {
        let mapping = self
            .mapping(ObjectType::Company, remote_id)
            .expect("company mapping");
        self.store()
            .company(mapping.local_id)
            .unwrap()
            .expect("company row")
    }
}

pub fn lead_schema() -> RemoteFieldSchema {
    RemoteFieldSchema::new(vec![
        RemoteField::new("email", FieldKind::Email),
        RemoteField::new("phone", FieldKind::Phone),
        RemoteField::new("industry", FieldKind::Enum)
            .with_option(1, "Retail")
            .with_option(2, "Finance"),
        RemoteField::new("tags", FieldKind::Set)
            .with_option(10, "vip")
            .with_option(11, "newsletter"),
    ])
}

pub fn company_schema() -> RemoteFieldSchema {
    RemoteFieldSchema::new(vec![RemoteField::new("name", FieldKind::Text).mapped_to("companyname")])
}

pub fn owners() -> StaticOwnerResolver {
    StaticOwnerResolver::new()
        .with_owner("7", OwnerRef(70))
        .with_owner("8", OwnerRef(80))
}

pub fn harness(settings: SyncSettings) -> Harness {
    init_tracing();
    let store = SqliteSyncStore::open_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(ts(NOW)));
    let exporter = RecordingListener::exporter();
    let auditor = RecordingListener::auditor();
    let engine = ReconciliationEngine::new(store, settings)
        .with_clock(clock.clone())
        .with_owner_resolver(Arc::new(owners()))
        .with_field_schema(ObjectType::Lead, lead_schema())
        .with_field_schema(ObjectType::Company, company_schema())
        .with_listener(exporter.clone())
        .with_listener(auditor.clone());
    Harness {
        engine,
        clock,
        exporter,
        auditor,
    }
}

pub fn default_harness() -> Harness {
    harness(SyncSettings::default())
}

pub fn company_harness() -> Harness {
    harness(SyncSettings::default().with_company_support(true))
}

// ── Seeding local state directly ────────────────────────────────

pub fn seed_lead(store: &SqliteSyncStore, attributes: &[(&str, Value)]) -> LocalId {
    let mut lead = LeadEntity::new();
    for (field, value) in attributes {
        lead.attributes.insert((*field).to_string(), value.clone());
    }
    let mut tx = store.begin().unwrap();
    let id = tx.save_lead(&mut lead, &ChangeContext::local()).unwrap();
    tx.commit().unwrap();
    id
}

pub fn seed_company(store: &SqliteSyncStore, name: &str) -> LocalId {
    let mut company = CompanyEntity::named(name);
    let mut tx = store.begin().unwrap();
    let id = tx.save_company(&mut company, &ChangeContext::local()).unwrap();
    tx.commit().unwrap();
    id
}

pub fn seed_mapping(
    store: &SqliteSyncStore,
    object_type: ObjectType,
    remote_id: &str,
    local_id: LocalId,
    last_sync: &str,
) -> IntegrationMapping {
    let mut tx = store.begin().unwrap();
    let mapping = tx
        .create_mapping(object_type, &RemoteId::from(remote_id), local_id, &ts(last_sync))
        .unwrap();
    tx.commit().unwrap();
    mapping
}

/// Soft-deletes a lead behind the engine's back.
pub fn soft_delete_lead(store: &SqliteSyncStore, id: LocalId) {
    let mut tx = store.begin().unwrap();
    let lead = tx.find_lead_by_id(id).unwrap().unwrap();
    tx.delete_lead(&lead, &ChangeContext::local()).unwrap();
    tx.commit().unwrap();
}

pub fn link(store: &SqliteSyncStore, company_id: LocalId, lead_id: LocalId) {
    let mut tx = store.begin().unwrap();
    let mut company = tx.get_company(company_id).unwrap().unwrap();
    let mut lead = tx.get_lead(lead_id).unwrap().unwrap();
    tx.add_lead_to_company(&mut company, &mut lead, &ChangeContext::local())
        .unwrap();
    tx.commit().unwrap();
}
