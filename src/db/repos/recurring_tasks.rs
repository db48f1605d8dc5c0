use rusqlite::{params, Row};

use super::{execute_update, not_found};
use crate::db::models::{CreateRecurringTaskInput, RecurringTaskRow, UpdateRecurringTaskInput};
use crate::db::{now_timestamp, DbPool};
use crate::error::AppError;

fn row_to_recurring(row: &Row) -> rusqlite::Result<RecurringTaskRow> {
    Ok(RecurringTaskRow {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        assignee_id: row.get("assignee_id")?,
        priority: row.get("priority")?,
        recurrence_type: row.get("recurrence_type")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        custom_days: row.get("custom_days")?,
        custom_months: row.get("custom_months")?,
        project_id: row.get("project_id")?,
        last_generated: row.get("last_generated")?,
        active: row.get::<_, Option<i32>>("active")?.map(|v| v != 0),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn encode_list(values: &Option<Vec<u32>>) -> Result<Option<String>, AppError> {
    match values {
        Some(v) => Ok(Some(serde_json::to_string(v)?)),
        None => Ok(None),
    }
}

pub fn get_all(pool: &DbPool) -> Result<Vec<RecurringTaskRow>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT * FROM recurring_tasks ORDER BY created_at ASC")?;
    let rows = stmt.query_map([], row_to_recurring)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn get_active(pool: &DbPool) -> Result<Vec<RecurringTaskRow>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM recurring_tasks WHERE active = 1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map([], row_to_recurring)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<RecurringTaskRow, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM recurring_tasks WHERE id = ?1",
        params![id],
        row_to_recurring,
    )
    .map_err(not_found(format!("Recurring task {id}")))
}

pub fn create(pool: &DbPool, input: CreateRecurringTaskInput) -> Result<RecurringTaskRow, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    let priority = input.priority.unwrap_or_default();
    let custom_days = encode_list(&input.custom_days)?;
    let custom_months = encode_list(&input.custom_months)?;

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO recurring_tasks
         (id, title, description, assignee_id, priority, recurrence_type, start_date, end_date,
          custom_days, custom_months, project_id, last_generated, active, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,NULL,1,?12,?12)",
        params![
            id,
            input.title,
            input.description,
            input.assignee_id,
            priority.as_str(),
            input.recurrence_type.as_str(),
            input.start_date,
            input.end_date,
            custom_days,
            custom_months,
            input.project_id,
            now,
        ],
    )?;

    get_by_id(pool, &id)
}

pub fn update(
    pool: &DbPool,
    id: &str,
    input: UpdateRecurringTaskInput,
) -> Result<RecurringTaskRow, AppError> {
    get_by_id(pool, id)?;

    let priority = input.priority.map(|p| p.as_str().to_string());
    let recurrence_type = input.recurrence_type.map(|r| r.as_str().to_string());
    let custom_days = match &input.custom_days {
        Some(days) => Some(encode_list(days)?),
        None => None,
    };
    let custom_months = match &input.custom_months {
        Some(months) => Some(encode_list(months)?),
        None => None,
    };

    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    push_field!(input.title, "title", sets, values);
    push_field!(input.description, "description", sets, values);
    push_field!(input.assignee_id, "assignee_id", sets, values);
    push_field!(priority, "priority", sets, values);
    push_field!(recurrence_type, "recurrence_type", sets, values);
    push_field!(input.start_date, "start_date", sets, values);
    push_field!(input.end_date, "end_date", sets, values);
    push_field!(custom_days, "custom_days", sets, values);
    push_field!(custom_months, "custom_months", sets, values);
    push_field!(input.project_id, "project_id", sets, values);
    push_field!(input.active, "active", sets, values);

    execute_update(pool, "recurring_tasks", id, sets, values)?;
    get_by_id(pool, id)
}

/// Record the end of the last fully generated window (`YYYY-MM-DD`).
pub fn set_last_generated(pool: &DbPool, id: &str, last_generated: &str) -> Result<(), AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE recurring_tasks SET last_generated = ?1, updated_at = ?2 WHERE id = ?3",
        params![last_generated, now_timestamp(), id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Recurring task {id}")));
    }
    Ok(())
}

/// Deleting a definition cascades to its instances.
pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM recurring_tasks WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
