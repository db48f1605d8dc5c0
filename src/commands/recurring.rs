use crate::db::models::{
    CreateRecurringTaskInput, TaskPriority, TaskStatus, UpdateRecurringTaskInput,
};
use crate::db::repos::{recurring_tasks as repo, task_instances as instance_repo};
use crate::engine::access::{self, ActorContext, EntityKind, Resource};
use crate::engine::activity::{self, ActivityAction};
use crate::engine::mapper;
use crate::engine::recurrence::{self, MaterializeReport};
use crate::engine::types::{RecurringTask, TaskInstance};
use crate::error::AppError;
use crate::validation;
use crate::AppState;

// ============================================================================
// Definitions
// ============================================================================

pub fn list_recurring_tasks(state: &AppState) -> Result<Vec<RecurringTask>, AppError> {
    Ok(repo::get_all(&state.db)?.into_iter().map(mapper::to_recurring_task).collect())
}

pub fn get_recurring_task(state: &AppState, id: String) -> Result<RecurringTask, AppError> {
    repo::get_by_id(&state.db, &id).map(mapper::to_recurring_task)
}

pub fn create_recurring_task(
    state: &AppState,
    actor: &ActorContext,
    input: CreateRecurringTaskInput,
) -> Result<RecurringTask, AppError> {
    access::authorize_create(EntityKind::RecurringTask, actor)?;
    validation::require_non_empty("title", &input.title)?;
    let start = validation::require_date("start_date", &input.start_date)?;
    let end = input
        .end_date
        .as_deref()
        .map(|d| validation::require_date("end_date", d))
        .transpose()?;
    recurrence::check_rule(
        input.recurrence_type,
        start,
        end,
        input.custom_days.as_deref().unwrap_or_default(),
        input.custom_months.as_deref().unwrap_or_default(),
    )?;
    super::require_member(state, "assignee_id", input.assignee_id.as_deref())?;

    let row = repo::create(&state.db, input)?;
    activity::record_for(&state.db, actor, ActivityAction::Create, EntityKind::RecurringTask, &row.id, row.title.clone());
    Ok(mapper::to_recurring_task(row))
}

/// Patch a definition. The merged rule is validated before anything is written.
pub fn update_recurring_task(
    state: &AppState,
    actor: &ActorContext,
    id: String,
    input: UpdateRecurringTaskInput,
) -> Result<RecurringTask, AppError> {
    let current = mapper::to_recurring_task(repo::get_by_id(&state.db, &id)?);
    access::authorize_edit(&Resource::RecurringTask { assignee_id: current.assignee_id.as_deref() }, actor)?;

    if let Some(title) = input.title.as_deref() {
        validation::require_non_empty("title", title)?;
    }
    let start = match input.start_date.as_deref() {
        Some(raw) => validation::require_date("start_date", raw)?,
        None => current
            .start_date
            .ok_or_else(|| AppError::Validation(format!("recurring task {id} has no valid start date")))?,
    };
    let end = match input.end_date.as_ref() {
        Some(Some(raw)) => Some(validation::require_date("end_date", raw)?),
        Some(None) => None,
        None => current.end_date,
    };
    let days = match input.custom_days.as_ref() {
        Some(days) => days.clone().unwrap_or_default(),
        None => current.custom_days.clone(),
    };
    let months = match input.custom_months.as_ref() {
        Some(months) => months.clone().unwrap_or_default(),
        None => current.custom_months.clone(),
    };
    let kind = input.recurrence_type.unwrap_or(current.recurrence_type);
    recurrence::check_rule(kind, start, end, &days, &months)?;
    if let Some(assignee) = input.assignee_id.as_ref() {
        super::require_member(state, "assignee_id", assignee.as_deref())?;
    }

    let row = repo::update(&state.db, &id, input)?;
    activity::record_for(&state.db, actor, ActivityAction::Update, EntityKind::RecurringTask, &id, row.title.clone());
    Ok(mapper::to_recurring_task(row))
}

/// Removes the definition and, through the cascade, its instances.
pub fn delete_recurring_task(state: &AppState, actor: &ActorContext, id: String) -> Result<bool, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    access::authorize_delete(&Resource::RecurringTask { assignee_id: current.assignee_id.as_deref() }, actor)?;

    let deleted = repo::delete(&state.db, &id)?;
    if deleted {
        activity::record_for(&state.db, actor, ActivityAction::Delete, EntityKind::RecurringTask, &id, current.title);
    }
    Ok(deleted)
}

/// Materialize instances for `[from, to]` (`YYYY-MM-DD`, inclusive).
pub fn generate_instances(
    state: &AppState,
    actor: &ActorContext,
    id: String,
    from: String,
    to: String,
) -> Result<MaterializeReport, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    access::authorize_edit(&Resource::RecurringTask { assignee_id: current.assignee_id.as_deref() }, actor)?;

    let from = validation::require_date("from", &from)?;
    let to = validation::require_date("to", &to)?;
    recurrence::materialize(&state.db, &id, from, to, actor)
}

// ============================================================================
// Instances
// ============================================================================

pub fn list_instances(state: &AppState, recurring_task_id: String) -> Result<Vec<TaskInstance>, AppError> {
    Ok(instance_repo::get_by_recurring(&state.db, &recurring_task_id)?
        .into_iter()
        .map(mapper::to_task_instance)
        .collect())
}

/// Instances due within `[from, to]` across all definitions.
pub fn list_instances_due(state: &AppState, from: String, to: String) -> Result<Vec<TaskInstance>, AppError> {
    let from = validation::require_date("from", &from)?;
    let to = validation::require_date("to", &to)?;
    Ok(instance_repo::get_due_between(
        &state.db,
        &from.format("%Y-%m-%d").to_string(),
        &to.format("%Y-%m-%d").to_string(),
    )?
    .into_iter()
    .map(mapper::to_task_instance)
    .collect())
}

pub fn set_instance_status(
    state: &AppState,
    actor: &ActorContext,
    id: String,
    status: TaskStatus,
) -> Result<TaskInstance, AppError> {
    let current = mapper::to_task_instance(instance_repo::get_by_id(&state.db, &id)?);
    access::authorize_edit(&Resource::TaskInstance { assignee_id: current.assignee_id.as_deref() }, actor)?;

    let row = instance_repo::set_status(&state.db, &id, status)?;
    activity::record_for(
        &state.db,
        actor,
        ActivityAction::StatusChange,
        EntityKind::TaskInstance,
        &id,
        Some(format!("{} -> {}", current.status.as_str(), status.as_str())),
    );
    Ok(mapper::to_task_instance(row))
}

pub fn set_instance_priority(
    state: &AppState,
    actor: &ActorContext,
    id: String,
    priority: TaskPriority,
) -> Result<TaskInstance, AppError> {
    let current = instance_repo::get_by_id(&state.db, &id)?;
    access::authorize_edit(&Resource::TaskInstance { assignee_id: current.assignee_id.as_deref() }, actor)?;

    let row = instance_repo::set_priority(&state.db, &id, priority)?;
    activity::record_for(
        &state.db,
        actor,
        ActivityAction::Update,
        EntityKind::TaskInstance,
        &id,
        Some(format!("priority {}", priority.as_str())),
    );
    Ok(mapper::to_task_instance(row))
}

pub fn delete_instance(state: &AppState, actor: &ActorContext, id: String) -> Result<bool, AppError> {
    let current = instance_repo::get_by_id(&state.db, &id)?;
    access::authorize_delete(&Resource::TaskInstance { assignee_id: current.assignee_id.as_deref() }, actor)?;

    let deleted = instance_repo::delete(&state.db, &id)?;
    if deleted {
        activity::record_for(&state.db, actor, ActivityAction::Delete, EntityKind::TaskInstance, &id, current.due_date);
    }
    Ok(deleted)
}
