//! Recurring task materialization.
//!
//! Pure date logic ([`due_dates`], [`missing_dates`], [`next_window`]) plus the
//! store-facing [`materialize`] that inserts missing instances and advances
//! `last_generated` once a window is complete.

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use ts_rs::TS;

use super::access::{ActorContext, EntityKind};
use super::activity::{self, ActivityAction};
use super::mapper;
use super::types::{RecurringTask, TaskInstance};
use crate::db::models::{NewTaskInstance, RecurrenceType, TaskStatus};
use crate::db::repos::{recurring_tasks as recurring_repo, settings as settings_repo, task_instances as instance_repo};
use crate::db::repos::task_instances::InsertOutcome;
use crate::db::settings_keys;
use crate::db::DbPool;
use crate::error::AppError;

/// Largest window accepted in one pass (about ten years).
pub const MAX_WINDOW_DAYS: i64 = 3660;

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).map(|d| d.day()).unwrap_or(28)
}

fn check_range(label: &str, values: &[u32], min: u32, max: u32) -> Result<(), AppError> {
    match values.iter().find(|v| **v < min || **v > max) {
        Some(bad) => Err(AppError::Validation(format!(
            "{label} value {bad} out of range {min}-{max}"
        ))),
        None => Ok(()),
    }
}

/// Check a recurrence rule's shape: value ranges, required day/month sets and
/// an end date not before the start.
pub fn check_rule(
    kind: RecurrenceType,
    start: NaiveDate,
    end: Option<NaiveDate>,
    days: &[u32],
    months: &[u32],
) -> Result<(), AppError> {
    check_range("custom day", days, 0, 6)?;
    check_range("custom month", months, 1, 12)?;
    if let Some(end) = end.filter(|end| *end < start) {
        return Err(AppError::Validation(format!("end date {end} is before start date {start}")));
    }

    match kind {
        RecurrenceType::Weekly if days.is_empty() => {
            Err(AppError::Validation("weekly recurrence needs at least one weekday".into()))
        }
        RecurrenceType::Monthly if months.is_empty() => {
            Err(AppError::Validation("monthly recurrence needs at least one month".into()))
        }
        RecurrenceType::Custom if days.is_empty() && months.is_empty() => {
            Err(AppError::Validation("custom recurrence needs weekdays or months".into()))
        }
        _ => Ok(()),
    }
}

/// Check the definition's shape; returns its start date.
fn validate_definition(def: &RecurringTask) -> Result<NaiveDate, AppError> {
    let start = def.start_date.ok_or_else(|| {
        AppError::Validation(format!("recurring task {} has no valid start date", def.id))
    })?;
    check_rule(def.recurrence_type, start, def.end_date, &def.custom_days, &def.custom_months)?;
    Ok(start)
}

fn occurs_on(def: &RecurringTask, start: NaiveDate, date: NaiveDate) -> bool {
    let weekday = date.weekday().num_days_from_sunday(); // 0=Sun
    match def.recurrence_type {
        RecurrenceType::Daily => true,
        RecurrenceType::Weekly => def.custom_days.contains(&weekday),
        RecurrenceType::Monthly => {
            let anchor = start.day().min(days_in_month(date.year(), date.month()));
            def.custom_months.contains(&date.month()) && date.day() == anchor
        }
        RecurrenceType::Custom => {
            (def.custom_days.is_empty() || def.custom_days.contains(&weekday))
                && (def.custom_months.is_empty() || def.custom_months.contains(&date.month()))
        }
    }
}

/// Due dates of `def` within `[from, to]`, clipped to the definition's own
/// start/end. Ascending, without duplicates.
pub fn due_dates(def: &RecurringTask, from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, AppError> {
    if from > to {
        return Err(AppError::Validation(format!("window start {from} is after end {to}")));
    }
    if (to - from).num_days() > MAX_WINDOW_DAYS {
        return Err(AppError::Validation(format!(
            "window {from}..{to} exceeds {MAX_WINDOW_DAYS} days"
        )));
    }
    let start = validate_definition(def)?;

    let lo = from.max(start);
    let hi = match def.end_date {
        Some(end) => to.min(end),
        None => to,
    };
    if lo > hi {
        return Ok(Vec::new());
    }

    Ok(lo
        .iter_days()
        .take_while(|d| *d <= hi)
        .filter(|d| occurs_on(def, start, *d))
        .collect())
}

/// Due dates in the window that have no instance yet.
pub fn missing_dates(
    def: &RecurringTask,
    from: NaiveDate,
    to: NaiveDate,
    existing: &[NaiveDate],
) -> Result<Vec<NaiveDate>, AppError> {
    let existing: HashSet<&NaiveDate> = existing.iter().collect();
    Ok(due_dates(def, from, to)?
        .into_iter()
        .filter(|d| !existing.contains(d))
        .collect())
}

/// The window the scheduler should generate next: the day after
/// `last_generated` (or the start date) through `today + horizon_days`,
/// capped at the end date. `None` when nothing is left to produce.
pub fn next_window(def: &RecurringTask, today: NaiveDate, horizon_days: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = def.start_date?;
    let from = def
        .last_generated
        .and_then(|d| d.succ_opt())
        .map_or(start, |d| d.max(start));

    let mut to = today.checked_add_signed(Duration::days(i64::from(horizon_days)))?;
    if let Some(end) = def.end_date {
        to = to.min(end);
    }
    if let Some(cap) = from.checked_add_signed(Duration::days(MAX_WINDOW_DAYS)) {
        to = to.min(cap);
    }
    (from <= to).then_some((from, to))
}

// ============================================================================
// Materialization
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MaterializeFailure {
    pub due_date: NaiveDate,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MaterializeReport {
    pub recurring_task_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub created: Vec<TaskInstance>,
    /// Dates that turned out to exist already when inserting.
    pub already_present: usize,
    pub failures: Vec<MaterializeFailure>,
    /// Whether `last_generated` now covers this window.
    pub completed: bool,
}

/// Insert the missing instances of one definition for `[from, to]`.
///
/// Insert failures are collected in the report; instances already written stay.
/// `last_generated` only moves once the whole window exists.
pub fn materialize(
    pool: &DbPool,
    recurring_task_id: &str,
    from: NaiveDate,
    to: NaiveDate,
    actor: &ActorContext,
) -> Result<MaterializeReport, AppError> {
    let def = mapper::to_recurring_task(recurring_repo::get_by_id(pool, recurring_task_id)?);
    if !def.active {
        return Err(AppError::Validation(format!(
            "recurring task {recurring_task_id} is inactive"
        )));
    }

    let existing: Vec<NaiveDate> = instance_repo::existing_due_dates(pool, recurring_task_id)?
        .iter()
        .filter_map(|d| mapper::parse_date(Some(d.as_str())))
        .collect();
    let missing = missing_dates(&def, from, to, &existing)?;

    let mut report = MaterializeReport {
        recurring_task_id: recurring_task_id.to_string(),
        from,
        to,
        created: Vec::new(),
        already_present: 0,
        failures: Vec::new(),
        completed: false,
    };

    for date in missing {
        let instance = NewTaskInstance {
            recurring_task_id: def.id.clone(),
            title: def.title.clone(),
            description: Some(def.description.clone()).filter(|d| !d.is_empty()),
            status: TaskStatus::Todo,
            priority: def.priority,
            assignee_id: def.assignee_id.clone(),
            due_date: date.format("%Y-%m-%d").to_string(),
            project_id: def.project_id.clone(),
        };
        match instance_repo::insert(pool, &instance) {
            Ok(InsertOutcome::Inserted(row)) => report.created.push(mapper::to_task_instance(row)),
            Ok(InsertOutcome::AlreadyPresent) => report.already_present += 1,
            Err(e) => {
                tracing::warn!(
                    recurring_task_id,
                    due_date = %date,
                    error = %e,
                    "Failed to insert task instance"
                );
                report.failures.push(MaterializeFailure {
                    due_date: date,
                    message: e.to_string(),
                });
            }
        }
    }

    if report.failures.is_empty() {
        // Never move the marker backwards when an older window is re-run.
        if def.last_generated.map_or(true, |current| current < to) {
            recurring_repo::set_last_generated(pool, recurring_task_id, &to.format("%Y-%m-%d").to_string())?;
        }
        report.completed = true;
    }

    if !report.created.is_empty() {
        activity::record_for(
            pool,
            actor,
            ActivityAction::Generate,
            EntityKind::RecurringTask,
            recurring_task_id,
            Some(format!("{} instance(s) for {from}..{to}", report.created.len())),
        );
    }

    tracing::info!(
        recurring_task_id,
        %from,
        %to,
        created = report.created.len(),
        already_present = report.already_present,
        failed = report.failures.len(),
        "Materialized recurring task"
    );
    Ok(report)
}

/// Aggregate result of one scheduler sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub definitions: usize,
    pub instances_created: usize,
    pub failed_definitions: usize,
}

/// Horizon override from `app_settings`, falling back to `default_days`.
pub fn effective_horizon(pool: &DbPool, default_days: u32) -> u32 {
    match settings_repo::get(pool, settings_keys::RECURRENCE_HORIZON_DAYS) {
        Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "Ignoring invalid recurrence horizon setting");
            default_days
        }),
        Ok(None) => default_days,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read recurrence horizon setting");
            default_days
        }
    }
}

/// Run every active definition through its next window. A failing definition
/// is logged and does not stop the others.
pub fn materialize_all_due(pool: &DbPool, today: NaiveDate, horizon_days: u32) -> Result<SweepSummary, AppError> {
    let actor = ActorContext::system();
    let mut summary = SweepSummary::default();

    for row in recurring_repo::get_active(pool)? {
        let def = mapper::to_recurring_task(row);
        let Some((from, to)) = next_window(&def, today, horizon_days) else {
            continue;
        };
        summary.definitions += 1;

        match materialize(pool, &def.id, from, to, &actor) {
            Ok(report) => {
                summary.instances_created += report.created.len();
                if !report.completed {
                    summary.failed_definitions += 1;
                }
            }
            Err(e) => {
                tracing::error!(recurring_task_id = %def.id, error = %e, "Recurrence sweep failed for definition");
                summary.failed_definitions += 1;
            }
        }
    }
    Ok(summary)
}
