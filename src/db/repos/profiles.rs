use rusqlite::{params, Row};

use super::{execute_update, not_found};
use crate::db::models::{AccessLevel, CreateProfileInput, ProfileRow, UpdateProfileInput};
use crate::db::{now_timestamp, DbPool};
use crate::error::AppError;

fn row_to_profile(row: &Row) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role: row.get("role")?,
        avatar: row.get("avatar")?,
        department_id: row.get("department_id")?,
        status: row.get("status")?,
        access_level: row.get("access_level")?,
        joined_at: row.get("joined_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_all(pool: &DbPool) -> Result<Vec<ProfileRow>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT * FROM profiles ORDER BY name COLLATE NOCASE ASC")?;
    let rows = stmt.query_map([], row_to_profile)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn get_by_department(pool: &DbPool, department_id: &str) -> Result<Vec<ProfileRow>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM profiles WHERE department_id = ?1 ORDER BY name COLLATE NOCASE ASC",
    )?;
    let rows = stmt.query_map(params![department_id], row_to_profile)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<ProfileRow, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM profiles WHERE id = ?1",
        params![id],
        row_to_profile,
    )
    .map_err(not_found(format!("Profile {id}")))
}

pub fn create(pool: &DbPool, input: CreateProfileInput) -> Result<ProfileRow, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    let access_level = input.access_level.unwrap_or(AccessLevel::User);
    let joined_at = input.joined_at.unwrap_or_else(|| now.clone());

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO profiles
         (id, name, email, role, avatar, department_id, status, access_level, joined_at, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?10)",
        params![
            id,
            input.name,
            input.email,
            input.role,
            input.avatar,
            input.department_id,
            input.status,
            access_level.as_str(),
            joined_at,
            now,
        ],
    )?;

    get_by_id(pool, &id)
}

pub fn update(pool: &DbPool, id: &str, input: UpdateProfileInput) -> Result<ProfileRow, AppError> {
    get_by_id(pool, id)?;

    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    push_field!(input.name, "name", sets, values);
    push_field!(input.email, "email", sets, values);
    push_field!(input.role, "role", sets, values);
    push_field!(input.avatar, "avatar", sets, values);
    push_field!(input.department_id, "department_id", sets, values);
    push_field!(input.status, "status", sets, values);

    execute_update(pool, "profiles", id, sets, values)?;
    get_by_id(pool, id)
}

pub fn set_access_level(pool: &DbPool, id: &str, level: AccessLevel) -> Result<ProfileRow, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE profiles SET access_level = ?1, updated_at = ?2 WHERE id = ?3",
        params![level.as_str(), now_timestamp(), id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Profile {id}")));
    }
    drop(conn);
    get_by_id(pool, id)
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM profiles WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
