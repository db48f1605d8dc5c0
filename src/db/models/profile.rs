use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::AccessLevel;

// ============================================================================
// Profiles (team members)
// ============================================================================

/// Raw `profiles` row. Everything except the id and timestamps may be null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub avatar: Option<String>,
    pub department_id: Option<String>,
    pub status: Option<String>,
    pub access_level: Option<String>,
    pub joined_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateProfileInput {
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub avatar: Option<String>,
    pub department_id: Option<String>,
    pub status: Option<String>,
    pub access_level: Option<AccessLevel>,
    pub joined_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub role: Option<String>,
    pub avatar: Option<Option<String>>,
    pub department_id: Option<Option<String>>,
    pub status: Option<String>,
}
