//! Database schema.

use crate::error::StoreResult;
use rusqlite::Connection;

/// Creates all tables and indexes if they do not exist yet.
pub fn initialize_sync_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS integration_entity (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_type TEXT NOT NULL,
            remote_id TEXT NOT NULL,
            local_id INTEGER NOT NULL,
            last_sync_date TEXT NOT NULL,
            UNIQUE (object_type, remote_id)
        );
        CREATE INDEX IF NOT EXISTS idx_integration_entity_local
            ON integration_entity(object_type, local_id);

        CREATE TABLE IF NOT EXISTS leads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            attributes_json TEXT NOT NULL DEFAULT '{}',
            owner_id INTEGER,
            company TEXT,
            date_modified TEXT,
            deleted_at TEXT
        );

        CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL DEFAULT '',
            attributes_json TEXT NOT NULL DEFAULT '{}',
            owner_id INTEGER,
            date_modified TEXT,
            deleted_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_companies_name ON companies(name COLLATE NOCASE);

        CREATE TABLE IF NOT EXISTS company_leads (
            company_id INTEGER NOT NULL,
            lead_id INTEGER NOT NULL,
            date_added TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (company_id, lead_id)
        );
        CREATE INDEX IF NOT EXISTS idx_company_leads_lead ON company_leads(lead_id);

        CREATE TABLE IF NOT EXISTS pending_deletions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_type TEXT NOT NULL,
            integration_entity_id INTEGER NOT NULL,
            deleted_date TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}
