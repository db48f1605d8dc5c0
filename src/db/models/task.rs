use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{TaskPriority, TaskStatus};

// ============================================================================
// Tasks
// ============================================================================

/// Raw `tasks` row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<String>,
    pub due_date: Option<String>,
    pub project_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateTaskInput {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<String>,
    /// `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
    pub project_id: Option<Option<String>>,
}

/// Optional list filters; unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub assignee_id: Option<String>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaskStatusCount {
    pub status: TaskStatus,
    pub count: u32,
}
