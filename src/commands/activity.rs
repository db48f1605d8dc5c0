use crate::engine::access::EntityKind;
use crate::engine::activity;
use crate::engine::types::ActivityEntry;
use crate::error::AppError;
use crate::validation;
use crate::AppState;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub fn activity_history(state: &AppState, limit: Option<u32>) -> Result<Vec<ActivityEntry>, AppError> {
    activity::get_activity_history(&state.db, clamp_limit(limit))
}

pub fn entity_history(
    state: &AppState,
    entity_type: String,
    entity_id: String,
    limit: Option<u32>,
) -> Result<Vec<ActivityEntry>, AppError> {
    let kind = EntityKind::parse(&entity_type)
        .ok_or_else(|| AppError::Validation(format!("unknown entity type '{entity_type}'")))?;
    validation::require_valid_id("entity_id", &entity_id)?;
    activity::get_entity_history(&state.db, kind, &entity_id, clamp_limit(limit))
}
