use crate::db::models::AccessLevel;
use crate::db::repos::settings as repo;
use crate::db::settings_keys;
use crate::engine::access::ActorContext;
use crate::engine::background::SchedulerStats;
use crate::engine::recurrence::{self, MAX_WINDOW_DAYS};
use crate::error::AppError;
use crate::notifications::NotificationPrefs;
use crate::AppState;

fn require_admin(actor: &ActorContext, what: &str) -> Result<(), AppError> {
    if actor.access_level >= AccessLevel::Admin {
        return Ok(());
    }
    tracing::warn!(user_id = %actor.user_id, level = actor.access_level.as_str(), what, "Settings change denied");
    Err(AppError::Forbidden(format!("{} may not change {what}", actor.access_level.as_str())))
}

pub fn get_notification_prefs(state: &AppState) -> Result<NotificationPrefs, AppError> {
    NotificationPrefs::load(&state.db)
}

/// Persist the switches and apply them to running subscriptions.
pub fn set_notification_prefs(
    state: &AppState,
    actor: &ActorContext,
    prefs: NotificationPrefs,
) -> Result<NotificationPrefs, AppError> {
    require_admin(actor, "notification preferences")?;
    prefs.save(&state.db)?;
    state.notification_prefs.set(prefs);
    tracing::info!(?prefs, "Notification preferences updated");
    Ok(prefs)
}

/// Horizon the scheduler currently uses: stored override or configured default.
pub fn get_recurrence_horizon(state: &AppState) -> u32 {
    recurrence::effective_horizon(&state.db, state.config.recurrence_horizon_days)
}

/// Store a horizon override, or clear it with `None`.
pub fn set_recurrence_horizon(
    state: &AppState,
    actor: &ActorContext,
    days: Option<u32>,
) -> Result<u32, AppError> {
    require_admin(actor, "the recurrence horizon")?;
    match days {
        Some(days) => {
            if days == 0 || i64::from(days) > MAX_WINDOW_DAYS {
                return Err(AppError::Validation(format!(
                    "horizon must be between 1 and {MAX_WINDOW_DAYS} days"
                )));
            }
            repo::set(&state.db, settings_keys::RECURRENCE_HORIZON_DAYS, &days.to_string())?;
        }
        None => {
            repo::delete(&state.db, settings_keys::RECURRENCE_HORIZON_DAYS)?;
        }
    }
    Ok(get_recurrence_horizon(state))
}

pub fn scheduler_stats(state: &AppState) -> SchedulerStats {
    state.scheduler.stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_state;

    #[test]
    fn test_prefs_roundtrip_and_gate() {
        let state = test_state();
        assert_eq!(get_notification_prefs(&state).unwrap(), NotificationPrefs::default());

        let quiet = NotificationPrefs { customers: false, ..Default::default() };
        let supervisor = ActorContext::new("sup", AccessLevel::Supervisor);
        assert!(matches!(
            set_notification_prefs(&state, &supervisor, quiet),
            Err(AppError::Forbidden(_))
        ));

        let admin = ActorContext::new("adm", AccessLevel::Admin);
        set_notification_prefs(&state, &admin, quiet).unwrap();
        assert!(!get_notification_prefs(&state).unwrap().customers);
    }

    #[tokio::test]
    async fn test_saved_prefs_silence_running_bridge() {
        use std::sync::Arc;

        use crate::engine::feed::{ChangeEvent, ChangeFeed, ChangeKind};
        use crate::engine::realtime::{refresh_fn, Channel, RealtimeBridge};
        use crate::notifications::ChannelNotifier;

        let state = test_state();
        let feed = ChangeFeed::new(8);
        let (tx, mut notes) = tokio::sync::mpsc::unbounded_channel();
        let bridge = RealtimeBridge::new(feed.clone(), Arc::new(ChannelNotifier::new(tx)))
            .with_prefs(state.notification_prefs.clone());
        let _sub = bridge.subscribe(Channel::Tasks, refresh_fn(|| async { Ok(()) }));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let admin = ActorContext::new("adm", AccessLevel::Admin);
        set_notification_prefs(&state, &admin, NotificationPrefs { tasks: false, ..Default::default() }).unwrap();

        feed.publish(ChangeEvent {
            table: "tasks".into(),
            event_type: ChangeKind::Insert,
            new: Some(serde_json::json!({"title": "Fix login bug"})),
            old: None,
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(notes.try_recv().is_err());
    }

    #[test]
    fn test_horizon_override() {
        let state = test_state();
        let admin = ActorContext::new("adm", AccessLevel::Admin);
        let default = state.config.recurrence_horizon_days;
        assert_eq!(get_recurrence_horizon(&state), default);

        assert_eq!(set_recurrence_horizon(&state, &admin, Some(7)).unwrap(), 7);
        assert!(matches!(
            set_recurrence_horizon(&state, &admin, Some(0)),
            Err(AppError::Validation(_))
        ));
        assert_eq!(set_recurrence_horizon(&state, &admin, None).unwrap(), default);
        assert!(!scheduler_stats(&state).running);
    }
}
