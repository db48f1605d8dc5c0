//! Keys used in the `app_settings` table.

/// JSON object of per-channel notification switches (`{"tasks": true, ...}`).
pub const NOTIFICATION_PREFS: &str = "notification_prefs";

/// Days ahead the recurrence scheduler materializes; overrides the env default.
pub const RECURRENCE_HORIZON_DAYS: &str = "recurrence_horizon_days";
