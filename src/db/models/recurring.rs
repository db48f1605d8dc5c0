use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{RecurrenceType, TaskPriority, TaskStatus};

// ============================================================================
// Recurring task definitions
// ============================================================================

/// Raw `recurring_tasks` row. `custom_days` / `custom_months` hold JSON arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecurringTaskRow {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
    pub priority: Option<String>,
    pub recurrence_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub custom_days: Option<String>,
    pub custom_months: Option<String>,
    pub project_id: Option<String>,
    pub last_generated: Option<String>,
    pub active: Option<bool>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateRecurringTaskInput {
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
    pub priority: Option<TaskPriority>,
    pub recurrence_type: RecurrenceType,
    /// `YYYY-MM-DD`
    pub start_date: String,
    pub end_date: Option<String>,
    /// Weekdays, 0 = Sunday … 6 = Saturday.
    pub custom_days: Option<Vec<u32>>,
    /// Months, 1 = January … 12 = December.
    pub custom_months: Option<Vec<u32>>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateRecurringTaskInput {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub assignee_id: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub recurrence_type: Option<RecurrenceType>,
    pub start_date: Option<String>,
    pub end_date: Option<Option<String>>,
    pub custom_days: Option<Option<Vec<u32>>>,
    pub custom_months: Option<Option<Vec<u32>>>,
    pub project_id: Option<Option<String>>,
    pub active: Option<bool>,
}

// ============================================================================
// Instances
// ============================================================================

/// Raw `recurring_task_instances` row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInstanceRow {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<String>,
    pub due_date: Option<String>,
    pub recurring_task_id: Option<String>,
    pub project_id: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Values for one materialized occurrence.
#[derive(Debug, Clone)]
pub struct NewTaskInstance {
    pub recurring_task_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    /// `YYYY-MM-DD`
    pub due_date: String,
    pub project_id: Option<String>,
}
