use crate::db::models::{CreateCustomerInput, CustomerStatus, UpdateCustomerInput};
use crate::db::repos::customers as repo;
use crate::engine::access::{self, ActorContext, EntityKind, Resource};
use crate::engine::activity::{self, ActivityAction};
use crate::engine::mapper;
use crate::engine::types::Customer;
use crate::error::AppError;
use crate::validation;
use crate::AppState;

pub fn list_customers(state: &AppState, status: Option<CustomerStatus>) -> Result<Vec<Customer>, AppError> {
    Ok(repo::get_all(&state.db, status)?.into_iter().map(mapper::to_customer).collect())
}

pub fn get_customer(state: &AppState, id: String) -> Result<Customer, AppError> {
    repo::get_by_id(&state.db, &id).map(mapper::to_customer)
}

pub fn create_customer(
    state: &AppState,
    actor: &ActorContext,
    input: CreateCustomerInput,
) -> Result<Customer, AppError> {
    access::authorize_create(EntityKind::Customer, actor)?;
    validation::require_non_empty("name", &input.name)?;
    if let Some(email) = input.email.as_deref() {
        validation::require_email("email", email)?;
    }
    if let Some(value) = input.value {
        validation::require_non_negative("value", value)?;
    }
    super::require_member(state, "assigned_to", input.assigned_to.as_deref())?;

    let row = repo::create(&state.db, input)?;
    activity::record_for(&state.db, actor, ActivityAction::Create, EntityKind::Customer, &row.id, row.name.clone());
    Ok(mapper::to_customer(row))
}

pub fn update_customer(
    state: &AppState,
    actor: &ActorContext,
    id: String,
    input: UpdateCustomerInput,
) -> Result<Customer, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    access::authorize_edit(&Resource::Customer { assigned_to: current.assigned_to.as_deref() }, actor)?;

    if let Some(name) = input.name.as_deref() {
        validation::require_non_empty("name", name)?;
    }
    if let Some(Some(email)) = input.email.as_ref() {
        validation::require_email("email", email)?;
    }
    if let Some(value) = input.value {
        validation::require_non_negative("value", value)?;
    }
    if let Some(owner) = input.assigned_to.as_ref() {
        super::require_member(state, "assigned_to", owner.as_deref())?;
    }

    let previous = mapper::to_customer(current).status;
    let status_change = input
        .status
        .filter(|s| *s != previous)
        .map(|s| format!("{} -> {}", previous.as_str(), s.as_str()));

    let row = repo::update(&state.db, &id, input)?;
    match status_change {
        Some(details) => activity::record_for(
            &state.db,
            actor,
            ActivityAction::StatusChange,
            EntityKind::Customer,
            &id,
            Some(details),
        ),
        None => activity::record_for(&state.db, actor, ActivityAction::Update, EntityKind::Customer, &id, row.name.clone()),
    }
    Ok(mapper::to_customer(row))
}

/// Record that someone just got in touch with the customer.
pub fn touch_customer(state: &AppState, actor: &ActorContext, id: String) -> Result<Customer, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    access::authorize_edit(&Resource::Customer { assigned_to: current.assigned_to.as_deref() }, actor)?;

    let row = repo::touch_last_contact(&state.db, &id)?;
    activity::record_for(&state.db, actor, ActivityAction::Contact, EntityKind::Customer, &id, row.last_contact.clone());
    Ok(mapper::to_customer(row))
}

pub fn delete_customer(state: &AppState, actor: &ActorContext, id: String) -> Result<bool, AppError> {
    let current = repo::get_by_id(&state.db, &id)?;
    access::authorize_delete(&Resource::Customer { assigned_to: current.assigned_to.as_deref() }, actor)?;

    let deleted = repo::delete(&state.db, &id)?;
    if deleted {
        activity::record_for(&state.db, actor, ActivityAction::Delete, EntityKind::Customer, &id, current.name);
    }
    Ok(deleted)
}
