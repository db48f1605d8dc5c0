pub mod activity;
pub mod customers;
pub mod departments;
pub mod profiles;
pub mod recurring_tasks;
pub mod settings;
pub mod task_instances;
pub mod tasks;

use rusqlite::types::ToSql;

use crate::db::{now_timestamp, DbPool};
use crate::error::AppError;

/// Map `QueryReturnedNoRows` to `AppError::NotFound(label)`.
pub(crate) fn not_found(label: String) -> impl FnOnce(rusqlite::Error) -> AppError {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(label),
        other => AppError::Database(other),
    }
}

/// Run `UPDATE {table} SET ... WHERE id = ?` built by `push_field!`.
///
/// Always bumps `updated_at`. Returns the number of rows changed.
pub(crate) fn execute_update(
    pool: &DbPool,
    table: &str,
    id: &str,
    mut sets: Vec<String>,
    mut values: Vec<Box<dyn ToSql>>,
) -> Result<usize, AppError> {
    values.push(Box::new(now_timestamp()));
    sets.push(format!("updated_at = ?{}", values.len()));
    values.push(Box::new(id.to_string()));

    let sql = format!(
        "UPDATE {table} SET {} WHERE id = ?{}",
        sets.join(", "),
        values.len()
    );

    let params_ref: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let conn = pool.get()?;
    Ok(conn.execute(&sql, params_ref.as_slice())?)
}
