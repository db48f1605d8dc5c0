use serde::{Deserialize, Serialize};

/// A row of `team_activity_view` (activity joined with the actor's name).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityRow {
    pub id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub created_at: Option<String>,
}

/// Payload appended to `team_activity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewActivityEntry {
    pub user_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Option<String>,
}
