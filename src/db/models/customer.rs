use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::CustomerStatus;

// ============================================================================
// Customers
// ============================================================================

/// Raw `customers` row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerRow {
    pub id: String,
    pub name: Option<String>,
    pub origin: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
    pub last_contact: Option<String>,
    pub notes: Option<String>,
    pub assigned_to: Option<String>,
    pub value: Option<f64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCustomerInput {
    pub name: String,
    pub origin: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<CustomerStatus>,
    pub notes: Option<String>,
    pub assigned_to: Option<String>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateCustomerInput {
    pub name: Option<String>,
    pub origin: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub status: Option<CustomerStatus>,
    pub notes: Option<Option<String>>,
    pub assigned_to: Option<Option<String>>,
    pub value: Option<f64>,
}
