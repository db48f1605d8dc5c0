use crate::db::models::{CreateTaskInput, TaskFilter, TaskStatus, TaskStatusCount, UpdateTaskInput};
use crate::db::repos::tasks as repo;
use crate::engine::access::{self, ActorContext, EntityKind, Resource};
use crate::engine::activity::{self, ActivityAction};
use crate::engine::mapper;
use crate::engine::types::Task;
use crate::error::AppError;
use crate::validation;
use crate::AppState;

pub fn list_tasks(state: &AppState, filter: TaskFilter) -> Result<Vec<Task>, AppError> {
    Ok(repo::list(&state.db, &filter)?.into_iter().map(mapper::to_task).collect())
}

pub fn get_task(state: &AppState, id: String) -> Result<Task, AppError> {
    repo::get_by_id(&state.db, &id).map(mapper::to_task)
}

pub fn task_status_counts(state: &AppState) -> Result<Vec<TaskStatusCount>, AppError> {
    repo::status_counts(&state.db)
}

pub fn create_task(state: &AppState, actor: &ActorContext, input: CreateTaskInput) -> Result<Task, AppError> {
    access::authorize_create(EntityKind::Task, actor)?;
    validation::require_non_empty("title", &input.title)?;
    if let Some(due) = input.due_date.as_deref() {
        validation::require_date("due_date", due)?;
    }
    super::require_member(state, "assignee_id", input.assignee_id.as_deref())?;

    let row = repo::create(&state.db, input, &actor.user_id)?;
    activity::record_for(&state.db, actor, ActivityAction::Create, EntityKind::Task, &row.id, row.title.clone());
    Ok(mapper::to_task(row))
}

pub fn update_task(
    state: &AppState,
    actor: &ActorContext,
    id: String,
    input: UpdateTaskInput,
) -> Result<Task, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    access::authorize_edit(&Resource::Task { assignee_id: current.assignee_id.as_deref() }, actor)?;

    if let Some(title) = input.title.as_deref() {
        validation::require_non_empty("title", title)?;
    }
    if let Some(Some(due)) = input.due_date.as_ref() {
        validation::require_date("due_date", due)?;
    }
    if let Some(assignee) = input.assignee_id.as_ref() {
        super::require_member(state, "assignee_id", assignee.as_deref())?;
    }

    let row = repo::update(&state.db, &id, input)?;
    activity::record_for(&state.db, actor, ActivityAction::Update, EntityKind::Task, &id, row.title.clone());
    Ok(mapper::to_task(row))
}

/// Move a task across the board.
pub fn set_task_status(
    state: &AppState,
    actor: &ActorContext,
    id: String,
    status: TaskStatus,
) -> Result<Task, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    access::authorize_edit(&Resource::Task { assignee_id: current.assignee_id.as_deref() }, actor)?;

    let previous = mapper::to_task(current).status;
    let row = repo::update(
        &state.db,
        &id,
        UpdateTaskInput { status: Some(status), ..Default::default() },
    )?;
    activity::record_for(
        &state.db,
        actor,
        ActivityAction::StatusChange,
        EntityKind::Task,
        &id,
        Some(format!("{} -> {}", previous.as_str(), status.as_str())),
    );
    Ok(mapper::to_task(row))
}

pub fn delete_task(state: &AppState, actor: &ActorContext, id: String) -> Result<bool, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    access::authorize_delete(&Resource::Task { assignee_id: current.assignee_id.as_deref() }, actor)?;

    let deleted = repo::delete(&state.db, &id)?;
    if deleted {
        activity::record_for(&state.db, actor, ActivityAction::Delete, EntityKind::Task, &id, current.title);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AccessLevel;
    use crate::commands::{seed_member, test_state};

    fn new_task(title: &str, assignee: Option<&str>) -> CreateTaskInput {
        CreateTaskInput {
            title: title.into(),
            assignee_id: assignee.map(String::from),
            due_date: Some("2024-03-01".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_sets_creator_and_logs() {
        let state = test_state();
        seed_member(&state, "ana");
        let ana = ActorContext::new("ana", AccessLevel::User);
        let task = create_task(&state, &ana, new_task("Fix login bug", Some("ana"))).unwrap();

        assert_eq!(task.created_by.as_deref(), Some("ana"));
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.due_date.map(|d| d.to_string()).as_deref(), Some("2024-03-01"));

        let history = activity::get_entity_history(&state.db, EntityKind::Task, &task.id, 5).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].details.as_deref(), Some("Fix login bug"));
        assert_eq!(history[0].user_name, "ana");
    }

    #[test]
    fn test_assignee_may_move_own_task_only() {
        let state = test_state();
        seed_member(&state, "ana");
        let ana = ActorContext::new("ana", AccessLevel::User);
        let bia = ActorContext::new("bia", AccessLevel::User);
        let task = create_task(&state, &ana, new_task("Relatório", Some("ana"))).unwrap();

        let moved = set_task_status(&state, &ana, task.id.clone(), TaskStatus::InProgress).unwrap();
        assert_eq!(moved.status, TaskStatus::InProgress);

        assert!(matches!(
            set_task_status(&state, &bia, task.id.clone(), TaskStatus::Completed),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(delete_task(&state, &ana, task.id.clone()), Err(AppError::Forbidden(_))));

        let history = activity::get_entity_history(&state.db, EntityKind::Task, &task.id, 5).unwrap();
        assert_eq!(history[0].action, "status_change");
        assert_eq!(history[0].details.as_deref(), Some("todo -> in-progress"));
    }

    #[test]
    fn test_supervisor_deletes_and_counts_follow() {
        let state = test_state();
        let supervisor = ActorContext::new("sup", AccessLevel::Supervisor);
        let a = create_task(&state, &supervisor, new_task("A", None)).unwrap();
        create_task(&state, &supervisor, new_task("B", None)).unwrap();

        assert!(delete_task(&state, &supervisor, a.id).unwrap());
        assert_eq!(list_tasks(&state, TaskFilter::default()).unwrap().len(), 1);

        let counts = task_status_counts(&state).unwrap();
        let todo = counts.iter().find(|c| c.status == TaskStatus::Todo).unwrap();
        assert_eq!(todo.count, 1);
    }

    #[test]
    fn test_bad_due_date_rejected() {
        let state = test_state();
        let admin = ActorContext::new("adm", AccessLevel::Admin);
        let mut input = new_task("A", None);
        input.due_date = Some("01/03/2024".into());
        assert!(matches!(create_task(&state, &admin, input), Err(AppError::Validation(_))));
        assert!(matches!(get_task(&state, "missing".into()), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_unknown_assignee_rejected() {
        let state = test_state();
        seed_member(&state, "ana");
        let admin = ActorContext::new("adm", AccessLevel::Admin);
        assert!(matches!(
            create_task(&state, &admin, new_task("A", Some("ghost"))),
            Err(AppError::Validation(_))
        ));

        let task = create_task(&state, &admin, new_task("A", Some("ana"))).unwrap();
        let reassign = UpdateTaskInput { assignee_id: Some(Some("ghost".into())), ..Default::default() };
        assert!(matches!(
            update_task(&state, &admin, task.id.clone(), reassign),
            Err(AppError::Validation(_))
        ));

        let unassign = UpdateTaskInput { assignee_id: Some(None), ..Default::default() };
        assert!(update_task(&state, &admin, task.id, unassign).unwrap().assignee_id.is_none());
    }
}
