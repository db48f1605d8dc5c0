use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use ts_rs::TS;

use crate::db::DbPool;
use crate::engine::recurrence;
use crate::engine::subscription::{spawn_subscriptions, ReactiveSubscription};

/// Runtime state for the scheduler, shared across threads.
pub struct SchedulerState {
    running: AtomicBool,
    sweeps_run: AtomicU64,
    instances_created: AtomicU64,
    definitions_failed: AtomicU64,
    /// Cancelled by [`stop`]; replaced by the next [`start`].
    shutdown: Mutex<CancellationToken>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            sweeps_run: AtomicU64::new(0),
            instances_created: AtomicU64::new(0),
            definitions_failed: AtomicU64::new(0),
            shutdown: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn shutdown_slot(&self) -> MutexGuard<'_, CancellationToken> {
        match self.shutdown.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Token cancelled by the next [`stop`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_slot().clone()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            running: self.running.load(Ordering::Relaxed),
            sweeps_run: self.sweeps_run.load(Ordering::Relaxed),
            instances_created: self.instances_created.load(Ordering::Relaxed),
            definitions_failed: self.definitions_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SchedulerStats {
    pub running: bool,
    pub sweeps_run: u64,
    pub instances_created: u64,
    pub definitions_failed: u64,
}

/// Mark the scheduler running and spawn its subscriptions. Returns immediately
/// with one handle per subscription loop.
pub fn start(
    scheduler: Arc<SchedulerState>,
    subscriptions: Vec<Box<dyn ReactiveSubscription>>,
) -> Vec<JoinHandle<()>> {
    let cancel = {
        let mut slot = scheduler.shutdown_slot();
        if slot.is_cancelled() {
            *slot = CancellationToken::new();
        }
        slot.clone()
    };
    scheduler.running.store(true, Ordering::Relaxed);
    tracing::info!(subscriptions = subscriptions.len(), "Scheduler starting");
    spawn_subscriptions(subscriptions, cancel)
}

/// Clear the running flag and cancel every loop, including ones still waiting
/// for their next tick. A sweep already in progress finishes first.
pub fn stop(scheduler: &SchedulerState) {
    scheduler.running.store(false, Ordering::Relaxed);
    scheduler.shutdown_slot().cancel();
    tracing::info!("Scheduler stopped");
}

/// One recurrence sweep: materialize every active definition up to the horizon.
pub fn recurrence_tick(scheduler: &SchedulerState, pool: &DbPool, default_horizon_days: u32) {
    let horizon = recurrence::effective_horizon(pool, default_horizon_days);
    let today = chrono::Utc::now().date_naive();

    match recurrence::materialize_all_due(pool, today, horizon) {
        Ok(summary) => {
            scheduler.sweeps_run.fetch_add(1, Ordering::Relaxed);
            scheduler
                .instances_created
                .fetch_add(summary.instances_created as u64, Ordering::Relaxed);
            scheduler
                .definitions_failed
                .fetch_add(summary.failed_definitions as u64, Ordering::Relaxed);
            if summary.instances_created > 0 || summary.failed_definitions > 0 {
                tracing::info!(
                    definitions = summary.definitions,
                    created = summary.instances_created,
                    failed = summary.failed_definitions,
                    horizon_days = horizon,
                    "Recurrence sweep finished"
                );
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Recurrence sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;
    use crate::db::models::{CreateRecurringTaskInput, RecurrenceType};
    use crate::db::repos::{recurring_tasks, task_instances};

    #[test]
    fn test_start_stop_flag() {
        let state = SchedulerState::new();
        assert!(!state.is_running());
        state.running.store(true, Ordering::Relaxed);
        assert!(state.stats().running);
        stop(&state);
        assert!(!state.is_running());
        assert!(state.shutdown_token().is_cancelled());
    }

    #[test]
    fn test_recurrence_tick_counts_instances() {
        let pool = init_test_db().unwrap();
        let today = chrono::Utc::now().date_naive();
        let def = recurring_tasks::create(
            &pool,
            CreateRecurringTaskInput {
                title: "Backup check".into(),
                description: None,
                assignee_id: None,
                priority: None,
                recurrence_type: RecurrenceType::Daily,
                start_date: today.format("%Y-%m-%d").to_string(),
                end_date: None,
                custom_days: None,
                custom_months: None,
                project_id: None,
            },
        )
        .unwrap();

        let state = SchedulerState::new();
        recurrence_tick(&state, &pool, 2);

        // today, today+1, today+2
        assert_eq!(task_instances::get_by_recurring(&pool, &def.id).unwrap().len(), 3);
        let stats = state.stats();
        assert_eq!(stats.sweeps_run, 1);
        assert_eq!(stats.instances_created, 3);
        assert_eq!(stats.definitions_failed, 0);
    }
}
