use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Normalize a stored label for lenient matching: lowercase, `_`/space → `-`.
fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect()
}

// ============================================================================
// Access level
// ============================================================================

/// Coarse role gating edit/delete capability. Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum AccessLevel {
    #[serde(rename = "user")]
    User,
    Supervisor,
    Admin,
    SuperAdmin,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::SuperAdmin => "SuperAdmin",
            AccessLevel::Admin => "Admin",
            AccessLevel::Supervisor => "Supervisor",
            AccessLevel::User => "user",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "superadmin" | "super-admin" => Some(AccessLevel::SuperAdmin),
            "admin" => Some(AccessLevel::Admin),
            "supervisor" => Some(AccessLevel::Supervisor),
            "user" => Some(AccessLevel::User),
            _ => None,
        }
    }

    /// Unrecognized or missing values degrade to `user`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or(AccessLevel::User)
    }
}

// ============================================================================
// Task status / priority
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "todo" | "to-do" | "pending" | "pendente" | "a-fazer" => Some(TaskStatus::Todo),
            "in-progress" | "inprogress" | "doing" | "em-andamento" => Some(TaskStatus::InProgress),
            "review" | "in-review" | "em-revisao" | "em-revisão" => Some(TaskStatus::Review),
            "completed" | "done" | "concluida" | "concluída" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "low" | "baixa" => Some(TaskPriority::Low),
            "medium" | "media" | "média" => Some(TaskPriority::Medium),
            "high" | "alta" => Some(TaskPriority::High),
            _ => None,
        }
    }
}

// ============================================================================
// Customer status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum CustomerStatus {
    #[default]
    Lead,
    Prospect,
    Customer,
    Churned,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Lead => "lead",
            CustomerStatus::Prospect => "prospect",
            CustomerStatus::Customer => "customer",
            CustomerStatus::Churned => "churned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "lead" => Some(CustomerStatus::Lead),
            "prospect" => Some(CustomerStatus::Prospect),
            "customer" | "cliente" => Some(CustomerStatus::Customer),
            "churned" | "perdido" => Some(CustomerStatus::Churned),
            _ => None,
        }
    }
}

// ============================================================================
// Recurrence kind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::Daily => "daily",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::Custom => "custom",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "daily" | "diaria" | "diária" => Some(RecurrenceType::Daily),
            "weekly" | "semanal" => Some(RecurrenceType::Weekly),
            "monthly" | "mensal" => Some(RecurrenceType::Monthly),
            "custom" | "personalizada" => Some(RecurrenceType::Custom),
            _ => None,
        }
    }
}
