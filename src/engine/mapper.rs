//! Row → domain translation.
//!
//! Every function here is total: any combination of null or malformed columns
//! yields a usable value with documented defaults.

use chrono::{DateTime, NaiveDate};

use super::types::{
    ActivityEntry, Customer, Department, RecurringTask, Task, TaskInstance, TeamMember,
};
use crate::db::models::{
    AccessLevel, ActivityRow, CustomerRow, CustomerStatus, DepartmentRow, ProfileRow,
    RecurrenceType, RecurringTaskRow, TaskInstanceRow, TaskPriority, TaskRow, TaskStatus,
};

const UNNAMED: &str = "Sem nome";
const UNTITLED: &str = "Sem título";
const DEFAULT_ROLE: &str = "Colaborador";
const DEFAULT_MEMBER_STATUS: &str = "active";
const UNKNOWN_USER: &str = "Desconhecido";

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn text_or(value: Option<String>, fallback: &str) -> String {
    non_blank(value).unwrap_or_else(|| fallback.to_string())
}

/// Up to two uppercase initials: first letter of the first and last words.
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let first = words.first().and_then(|w| w.chars().next());
    let last = if words.len() > 1 {
        words.last().and_then(|w| w.chars().next())
    } else {
        None
    };
    first
        .into_iter()
        .chain(last)
        .flat_map(char::to_uppercase)
        .collect()
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Parse a stored list of small integers. JSON arrays are expected; a bare
/// comma-separated list is tolerated. Unparseable entries are dropped.
pub fn parse_number_list(raw: Option<&str>) -> Vec<u32> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Vec::new();
    };

    let mut values: Vec<u32> = match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(items) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect(),
        Err(_) => raw
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect(),
    };
    values.sort_unstable();
    values.dedup();
    values
}

fn status_of(raw: Option<&str>) -> TaskStatus {
    raw.and_then(TaskStatus::parse).unwrap_or_default()
}

fn priority_of(raw: Option<&str>) -> TaskPriority {
    raw.and_then(TaskPriority::parse).unwrap_or_default()
}

// ============================================================================
// Public mappers
// ============================================================================

pub fn to_team_member(row: ProfileRow) -> TeamMember {
    let name = text_or(row.name, UNNAMED);
    let avatar = non_blank(row.avatar).unwrap_or_else(|| initials(&name));
    TeamMember {
        access_level: AccessLevel::parse_or_default(row.access_level.as_deref()),
        joined_at: non_blank(row.joined_at).or_else(|| non_blank(row.created_at)),
        id: row.id,
        email: non_blank(row.email),
        role: text_or(row.role, DEFAULT_ROLE),
        avatar,
        department_id: non_blank(row.department_id),
        status: text_or(row.status, DEFAULT_MEMBER_STATUS),
        name,
    }
}

pub fn to_department(row: DepartmentRow) -> Department {
    Department {
        id: row.id,
        name: text_or(row.name, UNNAMED),
        color: non_blank(row.color),
        description: row.description.unwrap_or_default(),
    }
}

pub fn to_task(row: TaskRow) -> Task {
    Task {
        status: status_of(row.status.as_deref()),
        priority: priority_of(row.priority.as_deref()),
        due_date: parse_date(row.due_date.as_deref()),
        id: row.id,
        title: text_or(row.title, UNTITLED),
        description: row.description.unwrap_or_default(),
        assignee_id: non_blank(row.assignee_id),
        project_id: non_blank(row.project_id),
        created_by: non_blank(row.created_by),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn to_task_instance(row: TaskInstanceRow) -> TaskInstance {
    TaskInstance {
        status: status_of(row.status.as_deref()),
        priority: priority_of(row.priority.as_deref()),
        due_date: parse_date(row.due_date.as_deref()),
        id: row.id,
        recurring_task_id: non_blank(row.recurring_task_id),
        title: text_or(row.title, UNTITLED),
        description: row.description.unwrap_or_default(),
        assignee_id: non_blank(row.assignee_id),
        project_id: non_blank(row.project_id),
    }
}

pub fn to_recurring_task(row: RecurringTaskRow) -> RecurringTask {
    RecurringTask {
        priority: priority_of(row.priority.as_deref()),
        recurrence_type: row
            .recurrence_type
            .as_deref()
            .and_then(RecurrenceType::parse)
            .unwrap_or(RecurrenceType::Daily),
        start_date: parse_date(row.start_date.as_deref()),
        end_date: parse_date(row.end_date.as_deref()),
        custom_days: parse_number_list(row.custom_days.as_deref()),
        custom_months: parse_number_list(row.custom_months.as_deref()),
        last_generated: parse_date(row.last_generated.as_deref()),
        active: row.active.unwrap_or(true),
        id: row.id,
        title: text_or(row.title, UNTITLED),
        description: row.description.unwrap_or_default(),
        assignee_id: non_blank(row.assignee_id),
        project_id: non_blank(row.project_id),
    }
}

pub fn to_customer(row: CustomerRow) -> Customer {
    Customer {
        status: row
            .status
            .as_deref()
            .and_then(CustomerStatus::parse)
            .unwrap_or_default(),
        value: row.value.filter(|v| v.is_finite()).unwrap_or(0.0),
        id: row.id,
        name: text_or(row.name, UNNAMED),
        origin: row.origin.unwrap_or_default(),
        email: non_blank(row.email),
        phone: non_blank(row.phone),
        last_contact: non_blank(row.last_contact),
        notes: row.notes.unwrap_or_default(),
        assigned_to: non_blank(row.assigned_to),
    }
}

pub fn to_activity_entry(row: ActivityRow) -> ActivityEntry {
    let user_id = row.user_id.unwrap_or_default();
    let user_name = non_blank(row.user_name)
        .or_else(|| non_blank(Some(user_id.clone())))
        .unwrap_or_else(|| UNKNOWN_USER.to_string());
    ActivityEntry {
        id: row.id,
        user_id,
        user_name,
        action: row.action.unwrap_or_default(),
        entity_type: row.entity_type.unwrap_or_default(),
        entity_id: row.entity_id.unwrap_or_default(),
        details: non_blank(row.details),
        created_at: row.created_at,
    }
}
