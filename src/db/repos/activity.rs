use rusqlite::{params, Row};

use crate::db::models::{ActivityRow, NewActivityEntry};
use crate::db::{now_timestamp, DbPool};
use crate::error::AppError;

// ---------------------------------------------------------------------------
// Insert (append-only: no update or delete functions)
// ---------------------------------------------------------------------------

/// Append a new entry to `team_activity`. Returns the new entry id.
pub fn insert(pool: &DbPool, entry: &NewActivityEntry) -> Result<String, AppError> {
    let conn = pool.get()?;
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO team_activity (id, user_id, action, entity_type, entity_id, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            entry.user_id,
            entry.action,
            entry.entity_type,
            entry.entity_id,
            entry.details,
            now_timestamp(),
        ],
    )?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Queries (through team_activity_view)
// ---------------------------------------------------------------------------

fn row_to_activity(row: &Row) -> rusqlite::Result<ActivityRow> {
    Ok(ActivityRow {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        user_name: row.get("user_name")?,
        action: row.get("action")?,
        entity_type: row.get("entity_type")?,
        entity_id: row.get("entity_id")?,
        details: row.get("details")?,
        created_at: row.get("created_at")?,
    })
}

/// Most recent entries first.
pub fn get_recent(pool: &DbPool, limit: u32) -> Result<Vec<ActivityRow>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM team_activity_view
         ORDER BY created_at DESC, seq DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], row_to_activity)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Entries for one entity, most recent first.
pub fn get_by_entity(
    pool: &DbPool,
    entity_type: &str,
    entity_id: &str,
    limit: u32,
) -> Result<Vec<ActivityRow>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM team_activity_view
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY created_at DESC, seq DESC
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![entity_type, entity_id, limit], row_to_activity)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}
