use rusqlite::{params, Row};

use super::not_found;
use crate::db::models::{NewTaskInstance, TaskInstanceRow, TaskPriority, TaskStatus};
use crate::db::{now_timestamp, DbPool};
use crate::error::AppError;

fn row_to_instance(row: &Row) -> rusqlite::Result<TaskInstanceRow> {
    Ok(TaskInstanceRow {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: row.get("status")?,
        priority: row.get("priority")?,
        assignee_id: row.get("assignee_id")?,
        due_date: row.get("due_date")?,
        recurring_task_id: row.get("recurring_task_id")?,
        project_id: row.get("project_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Result of inserting one occurrence.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(TaskInstanceRow),
    /// An instance for the same (definition, due date) already exists.
    AlreadyPresent,
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<TaskInstanceRow, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM recurring_task_instances WHERE id = ?1",
        params![id],
        row_to_instance,
    )
    .map_err(not_found(format!("Task instance {id}")))
}

pub fn get_by_recurring(pool: &DbPool, recurring_task_id: &str) -> Result<Vec<TaskInstanceRow>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM recurring_task_instances WHERE recurring_task_id = ?1 ORDER BY due_date ASC",
    )?;
    let rows = stmt.query_map(params![recurring_task_id], row_to_instance)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Instances due within `[from, to]` (inclusive, `YYYY-MM-DD`) across all definitions.
pub fn get_due_between(pool: &DbPool, from: &str, to: &str) -> Result<Vec<TaskInstanceRow>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM recurring_task_instances
         WHERE due_date >= ?1 AND due_date <= ?2
         ORDER BY due_date ASC, title ASC",
    )?;
    let rows = stmt.query_map(params![from, to], row_to_instance)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Due dates (`YYYY-MM-DD`) that already have an instance for this definition.
pub fn existing_due_dates(pool: &DbPool, recurring_task_id: &str) -> Result<Vec<String>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT due_date FROM recurring_task_instances WHERE recurring_task_id = ?1 ORDER BY due_date ASC",
    )?;
    let rows = stmt.query_map(params![recurring_task_id], |row| row.get::<_, String>(0))?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Insert one occurrence; a duplicate (definition, due date) is not an error.
pub fn insert(pool: &DbPool, input: &NewTaskInstance) -> Result<InsertOutcome, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();

    let conn = pool.get()?;
    let rows = conn.execute(
        "INSERT INTO recurring_task_instances
         (id, title, description, status, priority, assignee_id, due_date, recurring_task_id, project_id, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?10)
         ON CONFLICT(recurring_task_id, due_date) DO NOTHING",
        params![
            id,
            input.title,
            input.description,
            input.status.as_str(),
            input.priority.as_str(),
            input.assignee_id,
            input.due_date,
            input.recurring_task_id,
            input.project_id,
            now,
        ],
    )?;
    drop(conn);

    if rows == 0 {
        return Ok(InsertOutcome::AlreadyPresent);
    }
    get_by_id(pool, &id).map(InsertOutcome::Inserted)
}

pub fn set_status(pool: &DbPool, id: &str, status: TaskStatus) -> Result<TaskInstanceRow, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE recurring_task_instances SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_timestamp(), id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Task instance {id}")));
    }
    drop(conn);
    get_by_id(pool, id)
}

pub fn set_priority(pool: &DbPool, id: &str, priority: TaskPriority) -> Result<TaskInstanceRow, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE recurring_task_instances SET priority = ?1, updated_at = ?2 WHERE id = ?3",
        params![priority.as_str(), now_timestamp(), id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Task instance {id}")));
    }
    drop(conn);
    get_by_id(pool, id)
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "DELETE FROM recurring_task_instances WHERE id = ?1",
        params![id],
    )?;
    Ok(rows > 0)
}
