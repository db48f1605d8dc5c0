use crate::db::models::{AccessLevel, CreateProfileInput, UpdateProfileInput};
use crate::db::repos::profiles as repo;
use crate::engine::access::{self, ActorContext, EntityKind, Resource};
use crate::engine::activity::{self, ActivityAction};
use crate::engine::mapper;
use crate::engine::types::TeamMember;
use crate::error::AppError;
use crate::validation;
use crate::AppState;

pub fn list_team(state: &AppState, department_id: Option<String>) -> Result<Vec<TeamMember>, AppError> {
    let rows = match department_id {
        Some(dept) => repo::get_by_department(&state.db, &dept)?,
        None => repo::get_all(&state.db)?,
    };
    Ok(rows.into_iter().map(mapper::to_team_member).collect())
}

pub fn get_member(state: &AppState, id: String) -> Result<TeamMember, AppError> {
    repo::get_by_id(&state.db, &id).map(mapper::to_team_member)
}

pub fn create_member(
    state: &AppState,
    actor: &ActorContext,
    input: CreateProfileInput,
) -> Result<TeamMember, AppError> {
    access::authorize_create(EntityKind::TeamMember, actor)?;
    validation::require_non_empty("name", &input.name)?;
    if let Some(email) = input.email.as_deref() {
        validation::require_email("email", email)?;
    }
    if let Some(level) = input.access_level {
        access::authorize_access_change(AccessLevel::User, level, actor)?;
    }
    super::require_department(state, "department_id", input.department_id.as_deref())?;

    let row = repo::create(&state.db, input)?;
    activity::record_for(
        &state.db,
        actor,
        ActivityAction::Create,
        EntityKind::TeamMember,
        &row.id,
        row.name.clone(),
    );
    Ok(mapper::to_team_member(row))
}

pub fn update_member(
    state: &AppState,
    actor: &ActorContext,
    id: String,
    input: UpdateProfileInput,
) -> Result<TeamMember, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    let level = AccessLevel::parse_or_default(current.access_level.as_deref());
    access::authorize_edit(&Resource::TeamMember { id: &id, access_level: level }, actor)?;

    if let Some(name) = input.name.as_deref() {
        validation::require_non_empty("name", name)?;
    }
    if let Some(Some(email)) = input.email.as_ref() {
        validation::require_email("email", email)?;
    }
    if let Some(department) = input.department_id.as_ref() {
        super::require_department(state, "department_id", department.as_deref())?;
    }

    let row = repo::update(&state.db, &id, input)?;
    activity::record_for(&state.db, actor, ActivityAction::Update, EntityKind::TeamMember, &id, row.name.clone());
    Ok(mapper::to_team_member(row))
}

pub fn delete_member(state: &AppState, actor: &ActorContext, id: String) -> Result<bool, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    let level = AccessLevel::parse_or_default(current.access_level.as_deref());
    access::authorize_delete(&Resource::TeamMember { id: &id, access_level: level }, actor)?;

    let deleted = repo::delete(&state.db, &id)?;
    if deleted {
        activity::record_for(&state.db, actor, ActivityAction::Delete, EntityKind::TeamMember, &id, current.name);
    }
    Ok(deleted)
}

pub fn set_access_level(
    state: &AppState,
    actor: &ActorContext,
    id: String,
    level: AccessLevel,
) -> Result<TeamMember, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    let current_level = AccessLevel::parse_or_default(current.access_level.as_deref());
    access::authorize_access_change(current_level, level, actor)?;

    let row = repo::set_access_level(&state.db, &id, level)?;
    activity::record_for(
        &state.db,
        actor,
        ActivityAction::AccessChange,
        EntityKind::TeamMember,
        &id,
        Some(format!("{} -> {}", current_level.as_str(), level.as_str())),
    );
    Ok(mapper::to_team_member(row))
}
