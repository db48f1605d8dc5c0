pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use config::AppConfig;
use db::DbPool;
use engine::background::{self, SchedulerState};
use engine::feed::{self, ChangeFeed};
use engine::realtime::{refresh_fn, DashboardCallbacks, RealtimeBridge};
use engine::subscription::{ReactiveSubscription, RecurrenceSubscription};
use error::AppError;
use notifications::{SharedPrefs, TracingNotifier};

/// Shared application state handed to every command.
pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub scheduler: Arc<SchedulerState>,
    /// Notification switches read by the realtime bridge on every event.
    pub notification_prefs: SharedPrefs,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig) -> Self {
        let notification_prefs = SharedPrefs::load_or_default(&db);
        Self {
            db,
            config,
            scheduler: Arc::new(SchedulerState::new()),
            notification_prefs,
        }
    }
}

/// Refresh callbacks for the headless process: re-read each list and log its size.
fn headless_callbacks(state: Arc<AppState>) -> DashboardCallbacks {
    let tasks_state = state.clone();
    let team_state = state.clone();
    let customers_state = state;
    DashboardCallbacks {
        on_tasks_update: refresh_fn(move || {
            let state = tasks_state.clone();
            async move {
                let tasks = commands::tasks::list_tasks(&state, Default::default())?;
                tracing::debug!(count = tasks.len(), "Tasks refreshed");
                Ok(())
            }
        }),
        on_team_update: refresh_fn(move || {
            let state = team_state.clone();
            async move {
                let team = commands::team::list_team(&state, None)?;
                tracing::debug!(count = team.len(), "Team refreshed");
                Ok(())
            }
        }),
        on_customers_update: refresh_fn(move || {
            let state = customers_state.clone();
            async move {
                let customers = commands::customers::list_customers(&state, None)?;
                tracing::debug!(count = customers.len(), "Customers refreshed");
                Ok(())
            }
        }),
    }
}

async fn serve(config: AppConfig) -> Result<(), AppError> {
    let (changes_tx, changes_rx) = tokio::sync::mpsc::unbounded_channel();
    let pool = db::init_db(&config, Some(changes_tx))?;
    tracing::info!(pool_size = config.pool_size, "Database pool ready");

    let shutdown = CancellationToken::new();
    let change_feed = ChangeFeed::new(config.feed_capacity);
    let pump = feed::spawn_pump(pool.clone(), changes_rx, change_feed.clone(), shutdown.child_token());

    let state = Arc::new(AppState::new(pool.clone(), config.clone()));
    let bridge = RealtimeBridge::new(change_feed, Arc::new(TracingNotifier))
        .with_prefs(state.notification_prefs.clone());
    let mut dashboard = bridge.subscribe_dashboard(headless_callbacks(state.clone()));

    let subscriptions: Vec<Box<dyn ReactiveSubscription>> = vec![Box::new(RecurrenceSubscription {
        scheduler: state.scheduler.clone(),
        pool,
        horizon_days: config.recurrence_horizon_days,
        interval: Duration::from_secs(config.recurrence_interval_secs),
    })];
    let scheduler_loops = background::start(state.scheduler.clone(), subscriptions);
    tracing::info!("Teamboard running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    background::stop(&state.scheduler);
    for handle in scheduler_loops {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Scheduler loop ended abnormally");
        }
    }
    dashboard.unsubscribe_all();
    shutdown.cancel();
    if let Err(e) = pump.await {
        tracing::warn!(error = %e, "Change feed pump ended abnormally");
    }
    tracing::info!(stats = ?state.scheduler.stats(), "Teamboard stopped");
    Ok(())
}

/// Process entry point: logging, crash hook, runtime, then run until Ctrl+C.
pub fn run(config: AppConfig) -> Result<(), AppError> {
    let _log_guard = logging::init(&config);
    logging::install_crash_hook(&config.data_dir);

    tracing::info!("Starting Teamboard v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}
