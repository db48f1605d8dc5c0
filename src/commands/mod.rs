//! Front-end facing operations. Mutations take the acting user, check
//! permissions, write, then append to the activity log.

pub mod activity;
pub mod customers;
pub mod departments;
pub mod recurring;
pub mod settings;
pub mod tasks;
pub mod team;

use crate::db::repos::{departments as department_repo, profiles as profile_repo};
use crate::error::AppError;
use crate::AppState;

/// Turn a missing referenced row into a validation error on `field`.
fn require_reference<T>(field: &str, id: &str, lookup: Result<T, AppError>) -> Result<(), AppError> {
    match lookup {
        Ok(_) => Ok(()),
        Err(AppError::NotFound(_)) => Err(AppError::Validation(format!("{field}: '{id}' does not exist"))),
        Err(e) => Err(e),
    }
}

/// `user_id`, when set, must name an existing team member.
pub(crate) fn require_member(state: &AppState, field: &str, user_id: Option<&str>) -> Result<(), AppError> {
    match user_id {
        Some(id) => require_reference(field, id, profile_repo::get_by_id(&state.db, id)),
        None => Ok(()),
    }
}

pub(crate) fn require_department(state: &AppState, field: &str, department_id: Option<&str>) -> Result<(), AppError> {
    match department_id {
        Some(id) => require_reference(field, id, department_repo::get_by_id(&state.db, id)),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    let pool = crate::db::init_test_db().expect("test db");
    AppState::new(pool, crate::config::AppConfig::default())
}

/// Insert a profile with a fixed id so tests can use readable user ids.
#[cfg(test)]
pub(crate) fn seed_member(state: &AppState, id: &str) {
    let now = crate::db::now_timestamp();
    let conn = state.db.get().expect("test connection");
    conn.execute(
        "INSERT INTO profiles (id, name, access_level, created_at, updated_at)
         VALUES (?1, ?1, 'user', ?2, ?2)",
        rusqlite::params![id, now],
    )
    .expect("seed profile");
}
