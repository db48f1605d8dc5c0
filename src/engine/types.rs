use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::db::models::{AccessLevel, CustomerStatus, RecurrenceType, TaskPriority, TaskStatus};

// ============================================================================
// Domain types handed to the front-end
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    /// Image URL, or the member's initials when no image is set.
    pub avatar: String,
    pub department_id: Option<String>,
    pub status: String,
    pub joined_at: Option<String>,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub project_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaskInstance {
    pub id: String,
    pub recurring_task_id: Option<String>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecurringTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub assignee_id: Option<String>,
    pub priority: TaskPriority,
    pub recurrence_type: RecurrenceType,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Weekdays, 0 = Sunday.
    pub custom_days: Vec<u32>,
    /// Months, 1 = January.
    pub custom_months: Vec<u32>,
    pub project_id: Option<String>,
    pub last_generated: Option<NaiveDate>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub origin: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: CustomerStatus,
    pub last_contact: Option<String>,
    pub notes: String,
    pub assigned_to: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ActivityEntry {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Option<String>,
    pub created_at: Option<String>,
}
