//! SQLite-backed [`SyncStore`].

use crate::error::{StoreError, StoreResult};
use crate::schema::initialize_sync_schema;
use crate::traits::{
    CompanyRepository, DeletionQueue, LeadRepository, MappingStore, StoreTx, SyncStore,
};
use crmsync_types::{
    Attributes, ChangeContext, ChangeKind, CompanyEntity, EntityChange, IntegrationMapping,
    LeadEntity, LocalId, MappingId, ObjectType, OwnerRef, PendingDeletion, PendingDeletionId,
    RemoteId, SyncTimestamp,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Store backed by a single SQLite connection.
///
/// Cloning shares the connection. Transactions serialize on it.
#[derive(Clone)]
pub struct SqliteSyncStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSyncStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        initialize_sync_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_sync_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ── Read helpers outside a transaction ──────────────────────

    pub fn mapping(
        &self,
        object_type: ObjectType,
        remote_id: &RemoteId,
    ) -> StoreResult<Option<IntegrationMapping>> {
        let conn = self.lock()?;
        query_mapping(&conn, object_type, remote_id)
    }

    pub fn mapping_count(&self, object_type: ObjectType) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM integration_entity WHERE object_type = ?1",
            params![object_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Loads a lead regardless of soft delete.
    pub fn lead(&self, id: LocalId) -> StoreResult<Option<LeadEntity>> {
        let conn = self.lock()?;
        query_lead(&conn, id, true)
    }

    pub fn live_lead_count(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM leads WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Loads a company regardless of soft delete.
    pub fn company(&self, id: LocalId) -> StoreResult<Option<CompanyEntity>> {
        let conn = self.lock()?;
        query_company(&conn, id, true)
    }

    pub fn pending_deletion_list(&self) -> StoreResult<Vec<PendingDeletion>> {
        let conn = self.lock()?;
        query_pending(&conn, usize::MAX)
    }
}

impl SyncStore for SqliteSyncStore {
    type Tx<'a> = SqliteTx<'a>;

    fn begin(&self) -> StoreResult<SqliteTx<'_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(SqliteTx {
            conn,
            changes: Vec::new(),
            finished: false,
        })
    }
}

/// An open SQLite transaction holding the store's connection.
pub struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    changes: Vec<EntityChange>,
    finished: bool,
}

impl SqliteTx<'_> {
    fn record(
        &mut self,
        object_type: ObjectType,
        local_id: LocalId,
        kind: ChangeKind,
        ctx: &ChangeContext,
    ) {
        self.changes.push(EntityChange {
            object_type,
            local_id,
            kind,
            origin: ctx.origin(),
            integration: ctx.integration().map(str::to_string),
        });
    }
}

impl StoreTx for SqliteTx<'_> {
    fn commit(mut self) -> StoreResult<Vec<EntityChange>> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(std::mem::take(&mut self.changes))
    }
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(discarded_changes = self.changes.len(), "rolling back uncommitted transaction");
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

// ── MappingStore ────────────────────────────────────────────────

impl MappingStore for SqliteTx<'_> {
    fn find_mapping(
        &self,
        object_type: ObjectType,
        remote_id: &RemoteId,
    ) -> StoreResult<Option<IntegrationMapping>> {
        query_mapping(&self.conn, object_type, remote_id)
    }

    fn find_mapping_by_id(&self, id: MappingId) -> StoreResult<Option<IntegrationMapping>> {
        let mapping = self
            .conn
            .query_row(
                &format!("SELECT {MAPPING_COLUMNS} FROM integration_entity WHERE id = ?1"),
                params![id.0],
                mapping_from_row,
            )
            .optional()?;
        Ok(mapping)
    }

    fn find_mapping_for_local(
        &self,
        object_type: ObjectType,
        local_id: LocalId,
    ) -> StoreResult<Option<IntegrationMapping>> {
        let mapping = self
            .conn
            .query_row(
                &format!(
                    "SELECT {MAPPING_COLUMNS} FROM integration_entity
                     WHERE object_type = ?1 AND local_id = ?2
                     ORDER BY id LIMIT 1"
                ),
                params![object_type.as_str(), local_id.0],
                mapping_from_row,
            )
            .optional()?;
        Ok(mapping)
    }

    fn create_mapping(
        &mut self,
        object_type: ObjectType,
        remote_id: &RemoteId,
        local_id: LocalId,
        synced_at: &SyncTimestamp,
    ) -> StoreResult<IntegrationMapping> {
        let inserted = self.conn.execute(
            "INSERT INTO integration_entity (object_type, remote_id, local_id, last_sync_date)
             VALUES (?1, ?2, ?3, ?4)",
            params![object_type.as_str(), remote_id.as_str(), local_id.0, synced_at.as_str()],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicateMapping {
                    object_type,
                    remote_id: remote_id.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(IntegrationMapping {
            id: MappingId(self.conn.last_insert_rowid()),
            object_type,
            remote_id: remote_id.clone(),
            local_id,
            last_sync: synced_at.clone(),
        })
    }

    fn advance_mapping(
        &mut self,
        mapping: &mut IntegrationMapping,
        synced_at: &SyncTimestamp,
    ) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE integration_entity SET last_sync_date = ?1 WHERE id = ?2",
            params![synced_at.as_str(), mapping.id.0],
        )?;
        mapping.last_sync = synced_at.clone();
        Ok(())
    }

    fn remove_mapping(&mut self, mapping: &IntegrationMapping) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM integration_entity WHERE id = ?1",
            params![mapping.id.0],
        )?;
        Ok(())
    }
}

// ── DeletionQueue ───────────────────────────────────────────────

impl DeletionQueue for SqliteTx<'_> {
    fn enqueue_deletion(
        &mut self,
        object_type: ObjectType,
        mapping_id: MappingId,
        deleted_at: &SyncTimestamp,
    ) -> StoreResult<PendingDeletion> {
        self.conn.execute(
            "INSERT INTO pending_deletions (object_type, integration_entity_id, deleted_date)
             VALUES (?1, ?2, ?3)",
            params![object_type.as_str(), mapping_id.0, deleted_at.as_str()],
        )?;
        Ok(PendingDeletion {
            id: PendingDeletionId(self.conn.last_insert_rowid()),
            object_type,
            mapping_id,
            deleted_date: deleted_at.clone(),
        })
    }

    fn pending_deletions(&self, limit: usize) -> StoreResult<Vec<PendingDeletion>> {
        query_pending(&self.conn, limit)
    }

    fn complete_deletion(&mut self, id: PendingDeletionId) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM pending_deletions WHERE id = ?1", params![id.0])?;
        Ok(())
    }
}

// ── LeadRepository ──────────────────────────────────────────────

impl LeadRepository for SqliteTx<'_> {
    fn get_lead(&self, id: LocalId) -> StoreResult<Option<LeadEntity>> {
        query_lead(&self.conn, id, false)
    }

    fn find_lead_by_id(&self, id: LocalId) -> StoreResult<Option<LeadEntity>> {
        query_lead(&self.conn, id, true)
    }

    fn find_leads_by_field(&self, field: &str, value: &str) -> StoreResult<Vec<LeadEntity>> {
        let path = format!("$.\"{}\"", field.replace('"', ""));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE deleted_at IS NULL
               AND lower(json_extract(attributes_json, ?1)) = lower(?2)
             ORDER BY id"
        ))?;
        let leads = stmt
            .query_map(params![path, value], lead_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        leads
            .into_iter()
            .map(|lead| with_lead_memberships(&self.conn, lead))
            .collect()
    }

    fn save_lead(&mut self, lead: &mut LeadEntity, ctx: &ChangeContext) -> StoreResult<LocalId> {
        let attributes_json = serde_json::to_string(&lead.attributes)?;
        let owner = lead.owner.map(|o| o.0);
        let date_modified = lead.date_modified.as_ref().map(SyncTimestamp::as_str);

        let id = match lead.id {
            Some(id) => {
                self.conn.execute(
                    "UPDATE leads SET attributes_json = ?1, owner_id = ?2, company = ?3, date_modified = ?4
                     WHERE id = ?5",
                    params![attributes_json, owner, lead.company, date_modified, id.0],
                )?;
                id
            }
            None => {
                self.conn.execute(
                    "INSERT INTO leads (attributes_json, owner_id, company, date_modified)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![attributes_json, owner, lead.company, date_modified],
                )?;
                let id = LocalId(self.conn.last_insert_rowid());
                lead.id = Some(id);
                id
            }
        };

        self.record(ObjectType::Lead, id, ChangeKind::Saved, ctx);
        Ok(id)
    }

    fn delete_lead(
        &mut self,
        lead: &LeadEntity,
        ctx: &ChangeContext,
    ) -> StoreResult<Option<LocalId>> {
        let Some(id) = lead.id else {
            return Ok(None);
        };
        let deleted = self.conn.execute(
            "UPDATE leads SET deleted_at = datetime('now') WHERE id = ?1 AND deleted_at IS NULL",
            params![id.0],
        )?;
        if deleted == 0 {
            return Ok(None);
        }
        self.conn
            .execute("DELETE FROM company_leads WHERE lead_id = ?1", params![id.0])?;
        self.record(ObjectType::Lead, id, ChangeKind::Deleted, ctx);
        Ok(Some(id))
    }
}

// ── CompanyRepository ───────────────────────────────────────────

impl CompanyRepository for SqliteTx<'_> {
    fn get_company(&self, id: LocalId) -> StoreResult<Option<CompanyEntity>> {
        query_company(&self.conn, id, false)
    }

    fn find_company_by_id(&self, id: LocalId) -> StoreResult<Option<CompanyEntity>> {
        query_company(&self.conn, id, true)
    }

    fn find_company_by_name(&self, name: &str) -> StoreResult<Option<CompanyEntity>> {
        let company = self
            .conn
            .query_row(
                &format!(
                    "SELECT {COMPANY_COLUMNS} FROM companies
                     WHERE deleted_at IS NULL AND name = ?1 COLLATE NOCASE
                     ORDER BY id LIMIT 1"
                ),
                params![name],
                company_from_row,
            )
            .optional()?;
        company
            .map(|c| with_company_members(&self.conn, c))
            .transpose()
    }

    fn save_company(
        &mut self,
        company: &mut CompanyEntity,
        ctx: &ChangeContext,
    ) -> StoreResult<LocalId> {
        let attributes_json = serde_json::to_string(&company.attributes)?;
        let owner = company.owner.map(|o| o.0);
        let date_modified = company.date_modified.as_ref().map(SyncTimestamp::as_str);

        let id = match company.id {
            Some(id) => {
                self.conn.execute(
                    "UPDATE companies SET name = ?1, attributes_json = ?2, owner_id = ?3, date_modified = ?4
                     WHERE id = ?5",
                    params![company.name, attributes_json, owner, date_modified, id.0],
                )?;
                id
            }
            None => {
                self.conn.execute(
                    "INSERT INTO companies (name, attributes_json, owner_id, date_modified)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![company.name, attributes_json, owner, date_modified],
                )?;
                let id = LocalId(self.conn.last_insert_rowid());
                company.id = Some(id);
                id
            }
        };

        self.record(ObjectType::Company, id, ChangeKind::Saved, ctx);
        Ok(id)
    }

    fn delete_company(
        &mut self,
        company: &CompanyEntity,
        ctx: &ChangeContext,
    ) -> StoreResult<Option<LocalId>> {
        let Some(id) = company.id else {
            return Ok(None);
        };
        let deleted = self.conn.execute(
            "UPDATE companies SET deleted_at = datetime('now') WHERE id = ?1 AND deleted_at IS NULL",
            params![id.0],
        )?;
        if deleted == 0 {
            return Ok(None);
        }
        self.conn
            .execute("DELETE FROM company_leads WHERE company_id = ?1", params![id.0])?;
        self.record(ObjectType::Company, id, ChangeKind::Deleted, ctx);
        Ok(Some(id))
    }

    fn add_lead_to_company(
        &mut self,
        company: &mut CompanyEntity,
        lead: &mut LeadEntity,
        ctx: &ChangeContext,
    ) -> StoreResult<bool> {
        let company_id = company.id.ok_or(StoreError::Unsaved("company"))?;
        let lead_id = lead.id.ok_or(StoreError::Unsaved("lead"))?;

        let added = self.conn.execute(
            "INSERT OR IGNORE INTO company_leads (company_id, lead_id) VALUES (?1, ?2)",
            params![company_id.0, lead_id.0],
        )? == 1;
        company.member_leads.insert(lead_id);
        lead.companies.insert(company_id);

        let renamed = lead.company.as_deref() != Some(company.name.as_str());
        if renamed {
            lead.company = Some(company.name.clone());
            self.conn.execute(
                "UPDATE leads SET company = ?1 WHERE id = ?2",
                params![lead.company, lead_id.0],
            )?;
        }

        if added || renamed {
            self.record(ObjectType::Lead, lead_id, ChangeKind::MembershipChanged, ctx);
        }
        Ok(added)
    }

    fn remove_lead_from_company(
        &mut self,
        company: &mut CompanyEntity,
        lead: &mut LeadEntity,
        ctx: &ChangeContext,
    ) -> StoreResult<bool> {
        let company_id = company.id.ok_or(StoreError::Unsaved("company"))?;
        let lead_id = lead.id.ok_or(StoreError::Unsaved("lead"))?;

        let removed = self.conn.execute(
            "DELETE FROM company_leads WHERE company_id = ?1 AND lead_id = ?2",
            params![company_id.0, lead_id.0],
        )? == 1;
        company.member_leads.remove(&lead_id);
        lead.companies.remove(&company_id);

        let cleared = lead
            .company
            .as_deref()
            .is_some_and(|cached| cached.eq_ignore_ascii_case(&company.name));
        if cleared {
            lead.company = None;
            self.conn.execute(
                "UPDATE leads SET company = NULL WHERE id = ?1",
                params![lead_id.0],
            )?;
        }

        let changed = removed || cleared;
        if changed {
            self.record(ObjectType::Lead, lead_id, ChangeKind::MembershipChanged, ctx);
        }
        Ok(changed)
    }
}

// ── Row mapping ─────────────────────────────────────────────────

const MAPPING_COLUMNS: &str = "id, object_type, remote_id, local_id, last_sync_date";
const LEAD_COLUMNS: &str = "id, attributes_json, owner_id, company, date_modified";
const COMPANY_COLUMNS: &str = "id, name, attributes_json, owner_id, date_modified";

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<SyncTimestamp>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| SyncTimestamp::parse(&s))
        .transpose()
        .map_err(|e| conversion_error(idx, e))
}

fn attributes_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Attributes> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<IntegrationMapping> {
    let object_type: String = row.get(1)?;
    let object_type = object_type
        .parse::<ObjectType>()
        .map_err(|e| conversion_error(1, e))?;
    let last_sync = timestamp_at(row, 4)?.ok_or(rusqlite::Error::InvalidColumnType(
        4,
        "last_sync_date".into(),
        Type::Null,
    ))?;

    Ok(IntegrationMapping {
        id: MappingId(row.get(0)?),
        object_type,
        remote_id: RemoteId::new(row.get::<_, String>(2)?),
        local_id: LocalId(row.get(3)?),
        last_sync,
    })
}

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<LeadEntity> {
    Ok(LeadEntity {
        id: Some(LocalId(row.get(0)?)),
        attributes: attributes_at(row, 1)?,
        owner: row.get::<_, Option<i64>>(2)?.map(OwnerRef),
        company: row.get(3)?,
        companies: BTreeSet::new(),
        date_modified: timestamp_at(row, 4)?,
    })
}

fn company_from_row(row: &Row<'_>) -> rusqlite::Result<CompanyEntity> {
    Ok(CompanyEntity {
        id: Some(LocalId(row.get(0)?)),
        name: row.get(1)?,
        attributes: attributes_at(row, 2)?,
        owner: row.get::<_, Option<i64>>(3)?.map(OwnerRef),
        date_modified: timestamp_at(row, 4)?,
        member_leads: BTreeSet::new(),
    })
}

fn pending_from_row(row: &Row<'_>) -> rusqlite::Result<PendingDeletion> {
    let object_type: String = row.get(1)?;
    let object_type = object_type
        .parse::<ObjectType>()
        .map_err(|e| conversion_error(1, e))?;
    let deleted_date = timestamp_at(row, 3)?.ok_or(rusqlite::Error::InvalidColumnType(
        3,
        "deleted_date".into(),
        Type::Null,
    ))?;

    Ok(PendingDeletion {
        id: PendingDeletionId(row.get(0)?),
        object_type,
        mapping_id: MappingId(row.get(2)?),
        deleted_date,
    })
}

// ── Queries shared by the store and its transactions ────────────

fn query_mapping(
    conn: &Connection,
    object_type: ObjectType,
    remote_id: &RemoteId,
) -> StoreResult<Option<IntegrationMapping>> {
    let mapping = conn
        .query_row(
            &format!(
                "SELECT {MAPPING_COLUMNS} FROM integration_entity
                 WHERE object_type = ?1 AND remote_id = ?2"
            ),
            params![object_type.as_str(), remote_id.as_str()],
            mapping_from_row,
        )
        .optional()?;
    Ok(mapping)
}

fn query_lead(
    conn: &Connection,
    id: LocalId,
    include_deleted: bool,
) -> StoreResult<Option<LeadEntity>> {
    let filter = if include_deleted { "" } else { " AND deleted_at IS NULL" };
    let lead = conn
        .query_row(
            &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1{filter}"),
            params![id.0],
            lead_from_row,
        )
        .optional()?;
    lead.map(|l| with_lead_memberships(conn, l)).transpose()
}

fn query_company(
    conn: &Connection,
    id: LocalId,
    include_deleted: bool,
) -> StoreResult<Option<CompanyEntity>> {
    let filter = if include_deleted { "" } else { " AND deleted_at IS NULL" };
    let company = conn
        .query_row(
            &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1{filter}"),
            params![id.0],
            company_from_row,
        )
        .optional()?;
    company.map(|c| with_company_members(conn, c)).transpose()
}

fn query_pending(conn: &Connection, limit: usize) -> StoreResult<Vec<PendingDeletion>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(
        "SELECT id, object_type, integration_entity_id, deleted_date FROM pending_deletions
         ORDER BY deleted_date, id LIMIT ?1",
    )?;
    let pending = stmt
        .query_map(params![limit], pending_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pending)
}

fn with_lead_memberships(conn: &Connection, mut lead: LeadEntity) -> StoreResult<LeadEntity> {
    let Some(id) = lead.id else {
        return Ok(lead);
    };
    let mut stmt = conn.prepare(
        "SELECT company_id FROM company_leads WHERE lead_id = ?1 ORDER BY company_id",
    )?;
    lead.companies = stmt
        .query_map(params![id.0], |row| row.get::<_, i64>(0).map(LocalId))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(lead)
}

fn with_company_members(
    conn: &Connection,
    mut company: CompanyEntity,
) -> StoreResult<CompanyEntity> {
    let Some(id) = company.id else {
        return Ok(company);
    };
    let mut stmt =
        conn.prepare("SELECT lead_id FROM company_leads WHERE company_id = ?1 ORDER BY lead_id")?;
    company.member_leads = stmt
        .query_map(params![id.0], |row| row.get::<_, i64>(0).map(LocalId))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(company)
}
