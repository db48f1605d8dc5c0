use rusqlite::{params, Row};

use super::{execute_update, not_found};
use crate::db::models::{
    CreateTaskInput, TaskFilter, TaskRow, TaskStatus, TaskStatusCount, UpdateTaskInput,
};
use crate::db::{now_timestamp, DbPool};
use crate::error::AppError;

fn row_to_task(row: &Row) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: row.get("status")?,
        priority: row.get("priority")?,
        assignee_id: row.get("assignee_id")?,
        due_date: row.get("due_date")?,
        project_id: row.get("project_id")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// List tasks matching the filter, soonest due first (undated last).
pub fn list(pool: &DbPool, filter: &TaskFilter) -> Result<Vec<TaskRow>, AppError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref project_id) = filter.project_id {
        values.push(Box::new(project_id.clone()));
        clauses.push(format!("project_id = ?{}", values.len()));
    }
    if let Some(ref assignee_id) = filter.assignee_id {
        values.push(Box::new(assignee_id.clone()));
        clauses.push(format!("assignee_id = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", values.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT * FROM tasks {where_clause}
         ORDER BY due_date IS NULL, due_date ASC, created_at DESC"
    );

    let conn = pool.get()?;
    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_ref.as_slice(), row_to_task)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<TaskRow, AppError> {
    let conn = pool.get()?;
    conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
        .map_err(not_found(format!("Task {id}")))
}

pub fn create(pool: &DbPool, input: CreateTaskInput, created_by: &str) -> Result<TaskRow, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    let status = input.status.unwrap_or_default();
    let priority = input.priority.unwrap_or_default();

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO tasks
         (id, title, description, status, priority, assignee_id, due_date, project_id, created_by, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?10)",
        params![
            id,
            input.title,
            input.description,
            status.as_str(),
            priority.as_str(),
            input.assignee_id,
            input.due_date,
            input.project_id,
            created_by,
            now,
        ],
    )?;

    get_by_id(pool, &id)
}

pub fn update(pool: &DbPool, id: &str, input: UpdateTaskInput) -> Result<TaskRow, AppError> {
    get_by_id(pool, id)?;

    let status = input.status.map(|s| s.as_str().to_string());
    let priority = input.priority.map(|p| p.as_str().to_string());

    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    push_field!(input.title, "title", sets, values);
    push_field!(input.description, "description", sets, values);
    push_field!(status, "status", sets, values);
    push_field!(priority, "priority", sets, values);
    push_field!(input.assignee_id, "assignee_id", sets, values);
    push_field!(input.due_date, "due_date", sets, values);
    push_field!(input.project_id, "project_id", sets, values);

    execute_update(pool, "tasks", id, sets, values)?;
    get_by_id(pool, id)
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

/// Count tasks per status. Every status is present, unknown stored values count as `todo`.
pub fn status_counts(pool: &DbPool) -> Result<Vec<TaskStatusCount>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
    let grouped: Vec<(Option<String>, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();

    let mut counts: Vec<TaskStatusCount> = TaskStatus::ALL
        .iter()
        .map(|s| TaskStatusCount { status: *s, count: 0 })
        .collect();
    for (raw, n) in grouped {
        let status = raw.as_deref().and_then(TaskStatus::parse).unwrap_or_default();
        if let Some(entry) = counts.iter_mut().find(|c| c.status == status) {
            entry.count += n as u32;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;
    use crate::db::models::TaskPriority;

    fn task(title: &str, project: &str, due: Option<&str>) -> CreateTaskInput {
        CreateTaskInput {
            title: title.into(),
            project_id: Some(project.into()),
            due_date: due.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_task_crud() {
        let pool = init_test_db().unwrap();

        let created = create(&pool, task("Fix login bug", "web", Some("2024-02-01")), "u1").unwrap();
        assert_eq!(created.status.as_deref(), Some("todo"));
        assert_eq!(created.priority.as_deref(), Some("medium"));
        assert_eq!(created.created_by.as_deref(), Some("u1"));

        let updated = update(
            &pool,
            &created.id,
            UpdateTaskInput {
                status: Some(TaskStatus::InProgress),
                priority: Some(TaskPriority::High),
                due_date: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.status.as_deref(), Some("in-progress"));
        assert_eq!(updated.priority.as_deref(), Some("high"));
        assert_eq!(updated.due_date, None);
        assert_eq!(updated.title.as_deref(), Some("Fix login bug"));

        assert!(delete(&pool, &created.id).unwrap());
        assert!(matches!(get_by_id(&pool, &created.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_update_missing_task_is_not_found() {
        let pool = init_test_db().unwrap();
        let err = update(&pool, "missing", UpdateTaskInput::default()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_list_filter_and_order() {
        let pool = init_test_db().unwrap();
        create(&pool, task("Later", "web", Some("2024-03-01")), "u1").unwrap();
        create(&pool, task("Sooner", "web", Some("2024-01-15")), "u1").unwrap();
        create(&pool, task("Undated", "web", None), "u1").unwrap();
        create(&pool, task("Other project", "mobile", None), "u1").unwrap();

        let web = list(
            &pool,
            &TaskFilter {
                project_id: Some("web".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let titles: Vec<_> = web.iter().filter_map(|t| t.title.clone()).collect();
        assert_eq!(titles, vec!["Sooner", "Later", "Undated"]);

        let todo = list(
            &pool,
            &TaskFilter {
                status: Some(TaskStatus::Todo),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(todo.len(), 4);
    }

    #[test]
    fn test_status_counts() {
        let pool = init_test_db().unwrap();
        let a = create(&pool, task("A", "p", None), "u1").unwrap();
        create(&pool, task("B", "p", None), "u1").unwrap();
        update(
            &pool,
            &a.id,
            UpdateTaskInput {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
        )
        .unwrap();

        let counts = status_counts(&pool).unwrap();
        assert_eq!(counts.len(), 4);
        let get = |s: TaskStatus| counts.iter().find(|c| c.status == s).unwrap().count;
        assert_eq!(get(TaskStatus::Todo), 1);
        assert_eq!(get(TaskStatus::Completed), 1);
        assert_eq!(get(TaskStatus::Review), 0);
    }
}
