use rusqlite::{params, Row};

use super::{execute_update, not_found};
use crate::db::models::{CreateDepartmentInput, DepartmentRow, UpdateDepartmentInput};
use crate::db::{now_timestamp, DbPool};
use crate::error::AppError;

fn row_to_department(row: &Row) -> rusqlite::Result<DepartmentRow> {
    Ok(DepartmentRow {
        id: row.get("id")?,
        name: row.get("name")?,
        color: row.get("color")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_all(pool: &DbPool) -> Result<Vec<DepartmentRow>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT * FROM departamentos ORDER BY name COLLATE NOCASE ASC")?;
    let rows = stmt.query_map([], row_to_department)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<DepartmentRow, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM departamentos WHERE id = ?1",
        params![id],
        row_to_department,
    )
    .map_err(not_found(format!("Department {id}")))
}

pub fn create(pool: &DbPool, input: CreateDepartmentInput) -> Result<DepartmentRow, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO departamentos (id, name, color, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, input.name, input.color, input.description, now],
    )?;

    get_by_id(pool, &id)
}

pub fn update(
    pool: &DbPool,
    id: &str,
    input: UpdateDepartmentInput,
) -> Result<DepartmentRow, AppError> {
    get_by_id(pool, id)?;

    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    push_field!(input.name, "name", sets, values);
    push_field!(input.color, "color", sets, values);
    push_field!(input.description, "description", sets, values);

    execute_update(pool, "departamentos", id, sets, values)?;
    get_by_id(pool, id)
}

/// Members of the department keep their rows; the FK is set to NULL.
pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM departamentos WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;
    use crate::db::models::CreateProfileInput;
    use crate::db::repos::profiles;

    #[test]
    fn test_department_crud_and_member_detach() {
        let pool = init_test_db().unwrap();

        let dept = create(
            &pool,
            CreateDepartmentInput {
                name: "Marketing".into(),
                color: Some("#FF6347".into()),
                description: None,
            },
        )
        .unwrap();
        assert_eq!(dept.color.as_deref(), Some("#FF6347"));

        let renamed = update(
            &pool,
            &dept.id,
            UpdateDepartmentInput {
                name: Some("Growth".into()),
                color: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(renamed.name.as_deref(), Some("Growth"));
        assert_eq!(renamed.color, None);

        let member = profiles::create(
            &pool,
            CreateProfileInput {
                name: "Bruno".into(),
                department_id: Some(dept.id.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(profiles::get_by_department(&pool, &dept.id).unwrap().len(), 1);

        assert!(delete(&pool, &dept.id).unwrap());
        let detached = profiles::get_by_id(&pool, &member.id).unwrap();
        assert_eq!(detached.department_id, None);
    }
}
