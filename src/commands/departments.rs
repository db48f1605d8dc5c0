use crate::db::models::{CreateDepartmentInput, UpdateDepartmentInput};
use crate::db::repos::departments as repo;
use crate::engine::access::{self, ActorContext, EntityKind, Resource};
use crate::engine::activity::{self, ActivityAction};
use crate::engine::mapper;
use crate::engine::types::Department;
use crate::error::AppError;
use crate::validation;
use crate::AppState;

pub fn list_departments(state: &AppState) -> Result<Vec<Department>, AppError> {
    Ok(repo::get_all(&state.db)?.into_iter().map(mapper::to_department).collect())
}

pub fn create_department(
    state: &AppState,
    actor: &ActorContext,
    input: CreateDepartmentInput,
) -> Result<Department, AppError> {
    access::authorize_create(EntityKind::Department, actor)?;
    validation::require_non_empty("name", &input.name)?;

    let row = repo::create(&state.db, input)?;
    activity::record_for(&state.db, actor, ActivityAction::Create, EntityKind::Department, &row.id, row.name.clone());
    Ok(mapper::to_department(row))
}

pub fn update_department(
    state: &AppState,
    actor: &ActorContext,
    id: String,
    input: UpdateDepartmentInput,
) -> Result<Department, AppError> {
    access::authorize_edit(&Resource::Department, actor)?;
    if let Some(name) = input.name.as_deref() {
        validation::require_non_empty("name", name)?;
    }

    let row = repo::update(&state.db, &id, input)?;
    activity::record_for(&state.db, actor, ActivityAction::Update, EntityKind::Department, &id, row.name.clone());
    Ok(mapper::to_department(row))
}

pub fn delete_department(state: &AppState, actor: &ActorContext, id: String) -> Result<bool, AppError> {
    access::authorize_delete(&Resource::Department, actor)?;

    let deleted = repo::delete(&state.db, &id)?;
    if deleted {
        activity::record_for(&state.db, actor, ActivityAction::Delete, EntityKind::Department, &id, None);
    }
    Ok(deleted)
}
