use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use ts_rs::TS;

use crate::db::repos::settings as settings_repo;
use crate::db::settings_keys;
use crate::db::DbPool;
use crate::error::AppError;

/// A short user-facing message produced by a realtime change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Notification {
    /// Realtime channel name (`tasks`, `profiles`, `customers`).
    pub channel: String,
    pub title: String,
    pub body: String,
}

/// Sink for notifications. Implementations must not block.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log. Used by the headless binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        tracing::info!(
            channel = %notification.channel,
            title = %notification.title,
            body = %notification.body,
            "Notification"
        );
    }
}

/// Forwards notifications to a channel, e.g. a UI bridge.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new(tx: UnboundedSender<Notification>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: &Notification) {
        if self.tx.send(notification.clone()).is_err() {
            tracing::warn!(channel = %notification.channel, "Notification receiver dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// Per-channel notification switches stored as JSON under `notification_prefs`.
/// A disabled channel still triggers refreshes; it only stays silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NotificationPrefs {
    #[serde(default = "default_true")]
    pub tasks: bool,
    #[serde(default = "default_true")]
    pub team: bool,
    #[serde(default = "default_true")]
    pub customers: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            tasks: true,
            team: true,
            customers: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn parse_prefs(json: Option<&str>) -> NotificationPrefs {
    match json {
        Some(json_str) => serde_json::from_str(json_str).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid notification preferences, using defaults");
            NotificationPrefs::default()
        }),
        None => NotificationPrefs::default(),
    }
}

impl NotificationPrefs {
    pub fn load(pool: &DbPool) -> Result<Self, AppError> {
        let raw = settings_repo::get(pool, settings_keys::NOTIFICATION_PREFS)?;
        Ok(parse_prefs(raw.as_deref()))
    }

    pub fn save(&self, pool: &DbPool) -> Result<(), AppError> {
        settings_repo::set(pool, settings_keys::NOTIFICATION_PREFS, &serde_json::to_string(self)?)
    }

    /// Whether notifications for this realtime channel name are on.
    pub fn allows(&self, channel: &str) -> bool {
        match channel {
            "tasks" => self.tasks,
            "profiles" => self.team,
            "customers" => self.customers,
            _ => true,
        }
    }
}

/// Live preferences shared by the settings commands and every running
/// subscription. Clones point at the same value.
#[derive(Debug, Clone, Default)]
pub struct SharedPrefs(Arc<RwLock<NotificationPrefs>>);

impl SharedPrefs {
    pub fn new(prefs: NotificationPrefs) -> Self {
        Self(Arc::new(RwLock::new(prefs)))
    }

    /// Stored preferences, or the defaults when they cannot be read.
    pub fn load_or_default(pool: &DbPool) -> Self {
        let prefs = NotificationPrefs::load(pool).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Notification preferences unavailable, using defaults");
            NotificationPrefs::default()
        });
        Self::new(prefs)
    }

    pub fn get(&self) -> NotificationPrefs {
        match self.0.read() {
            Ok(prefs) => *prefs,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, prefs: NotificationPrefs) {
        match self.0.write() {
            Ok(mut current) => *current = prefs,
            Err(poisoned) => *poisoned.into_inner() = prefs,
        }
    }

    pub fn allows(&self, channel: &str) -> bool {
        self.get().allows(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    #[test]
    fn test_prefs_default_and_partial_json() {
        assert_eq!(parse_prefs(None), NotificationPrefs::default());
        let partial = parse_prefs(Some(r#"{"customers": false}"#));
        assert!(partial.tasks);
        assert!(!partial.customers);
        assert!(!partial.allows("customers"));
        assert_eq!(parse_prefs(Some("not json")), NotificationPrefs::default());
    }

    #[test]
    fn test_prefs_roundtrip_through_settings() {
        let pool = init_test_db().unwrap();
        assert_eq!(NotificationPrefs::load(&pool).unwrap(), NotificationPrefs::default());

        let prefs = NotificationPrefs { team: false, ..Default::default() };
        prefs.save(&pool).unwrap();
        let loaded = NotificationPrefs::load(&pool).unwrap();
        assert!(!loaded.allows("profiles"));
        assert!(loaded.allows("tasks"));
    }

    #[test]
    fn test_shared_prefs_are_seen_by_clones() {
        let shared = SharedPrefs::default();
        let watcher = shared.clone();
        assert!(watcher.allows("customers"));
        shared.set(NotificationPrefs { customers: false, ..Default::default() });
        assert!(!watcher.allows("customers"));
        assert!(watcher.allows("tasks"));
    }

    #[test]
    fn test_channel_notifier_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let notifier = ChannelNotifier::new(tx);
        notifier.notify(&Notification {
            channel: "tasks".into(),
            title: "Nova tarefa".into(),
            body: "Fix login bug".into(),
        });
        assert_eq!(rx.try_recv().unwrap().body, "Fix login bug");
    }
}
