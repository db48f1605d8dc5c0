//! Best-effort activity log.
//!
//! Mutations append one entry after they succeed. A store without the
//! activity table is tolerated; every other failure is reported to the caller,
//! which logs it without undoing the mutation.

use super::access::{ActorContext, EntityKind};
use super::mapper;
use super::types::ActivityEntry;
use crate::db::models::NewActivityEntry;
use crate::db::repos::activity as repo;
use crate::db::DbPool;
use crate::error::AppError;

/// Verbs written to `team_activity.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
    StatusChange,
    AccessChange,
    Contact,
    Generate,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Create => "create",
            ActivityAction::Update => "update",
            ActivityAction::Delete => "delete",
            ActivityAction::StatusChange => "status_change",
            ActivityAction::AccessChange => "access_change",
            ActivityAction::Contact => "contact",
            ActivityAction::Generate => "generate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Appended with this id.
    Recorded(String),
    /// The activity table is not present in this store.
    Skipped,
}

fn validate(entry: &NewActivityEntry) -> Result<(), AppError> {
    for (field, value) in [
        ("user_id", &entry.user_id),
        ("action", &entry.action),
        ("entity_type", &entry.entity_type),
        ("entity_id", &entry.entity_id),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("activity {field} cannot be empty")));
        }
    }
    match EntityKind::parse(&entry.entity_type) {
        Some(EntityKind::Activity) | None => Err(AppError::Validation(format!(
            "unknown activity entity type '{}'",
            entry.entity_type
        ))),
        Some(_) => Ok(()),
    }
}

/// Append one entry.
pub fn record(pool: &DbPool, entry: &NewActivityEntry) -> Result<ActivityOutcome, AppError> {
    validate(entry)?;

    match repo::insert(pool, entry) {
        Ok(id) => {
            tracing::debug!(
                id = %id,
                action = %entry.action,
                entity_type = %entry.entity_type,
                entity_id = %entry.entity_id,
                "Activity recorded"
            );
            Ok(ActivityOutcome::Recorded(id))
        }
        Err(e) if e.is_missing_relation() => {
            tracing::warn!(error = %e, "Activity table missing, entry skipped");
            Ok(ActivityOutcome::Skipped)
        }
        Err(e) => Err(e),
    }
}

/// Record on behalf of `actor`, logging instead of returning failures.
pub fn record_for(
    pool: &DbPool,
    actor: &ActorContext,
    action: ActivityAction,
    kind: EntityKind,
    entity_id: &str,
    details: Option<String>,
) {
    let entry = NewActivityEntry {
        user_id: actor.user_id.clone(),
        action: action.as_str().to_string(),
        entity_type: kind.as_str().to_string(),
        entity_id: entity_id.to_string(),
        details,
    };
    if let Err(e) = record(pool, &entry) {
        tracing::error!(
            error = %e,
            action = action.as_str(),
            entity_type = kind.as_str(),
            entity_id,
            "Failed to record activity"
        );
    }
}

fn tolerate_missing(result: Result<Vec<ActivityEntry>, AppError>) -> Result<Vec<ActivityEntry>, AppError> {
    match result {
        Err(e) if e.is_missing_relation() => {
            tracing::warn!(error = %e, "Activity view missing, returning empty history");
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Most recent entries, newest first.
pub fn get_activity_history(pool: &DbPool, limit: u32) -> Result<Vec<ActivityEntry>, AppError> {
    tolerate_missing(
        repo::get_recent(pool, limit)
            .map(|rows| rows.into_iter().map(mapper::to_activity_entry).collect()),
    )
}

/// History of one entity, newest first.
pub fn get_entity_history(
    pool: &DbPool,
    kind: EntityKind,
    entity_id: &str,
    limit: u32,
) -> Result<Vec<ActivityEntry>, AppError> {
    tolerate_missing(
        repo::get_by_entity(pool, kind.as_str(), entity_id, limit)
            .map(|rows| rows.into_iter().map(mapper::to_activity_entry).collect()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    fn entry(entity_id: &str) -> NewActivityEntry {
        NewActivityEntry {
            user_id: "u1".into(),
            action: "create".into(),
            entity_type: "task".into(),
            entity_id: entity_id.into(),
            details: Some("Fix login bug".into()),
        }
    }

    #[test]
    fn test_record_and_history_order() {
        let pool = init_test_db().unwrap();
        for id in ["t1", "t2", "t3"] {
            assert!(matches!(record(&pool, &entry(id)).unwrap(), ActivityOutcome::Recorded(_)));
        }

        let history = get_activity_history(&pool, 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].entity_id, "t3");
        assert_eq!(history[1].entity_id, "t2");
        // No profile row for u1: the view yields no name.
        assert_eq!(history[0].user_name, "u1");

        let one = get_entity_history(&pool, EntityKind::Task, "t1", 10).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].details.as_deref(), Some("Fix login bug"));
    }

    #[test]
    fn test_missing_table_is_skipped() {
        let pool = init_test_db().unwrap();
        pool.get().unwrap().execute_batch("DROP TABLE team_activity;").unwrap();

        assert_eq!(record(&pool, &entry("t1")).unwrap(), ActivityOutcome::Skipped);
        assert!(get_activity_history(&pool, 10).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_entry_fails() {
        let pool = init_test_db().unwrap();

        let mut blank = entry("t1");
        blank.user_id = "  ".into();
        assert!(matches!(record(&pool, &blank), Err(AppError::Validation(_))));

        let mut unknown = entry("t1");
        unknown.entity_type = "planet".into();
        assert!(matches!(record(&pool, &unknown), Err(AppError::Validation(_))));

        assert!(get_activity_history(&pool, 10).unwrap().is_empty());
    }

    #[test]
    fn test_entries_are_immutable() {
        let pool = init_test_db().unwrap();
        record(&pool, &entry("t1")).unwrap();
        let conn = pool.get().unwrap();
        assert!(conn.execute("UPDATE team_activity SET action = 'x'", []).is_err());
        assert!(conn.execute("DELETE FROM team_activity", []).is_err());
    }
}
