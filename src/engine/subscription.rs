//! Polled background work.
//!
//! Each [`ReactiveSubscription`] declares its own poll interval and runs in
//! its own task until the scheduler's shutdown token is cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::DbPool;
use crate::engine::background::SchedulerState;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A reactive subscription that the scheduler loop will poll.
#[async_trait::async_trait]
pub trait ReactiveSubscription: Send + Sync + 'static {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// How often this subscription should be polled.
    fn interval(&self) -> Duration;

    /// Optional delay before the first poll.
    fn initial_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Execute one poll cycle. Errors are logged internally; the loop continues regardless.
    async fn tick(&self);
}

// ---------------------------------------------------------------------------
// Concrete subscriptions
// ---------------------------------------------------------------------------

/// Materializes recurring tasks up to the configured horizon.
pub struct RecurrenceSubscription {
    pub scheduler: Arc<SchedulerState>,
    pub pool: DbPool,
    pub horizon_days: u32,
    pub interval: Duration,
}

#[async_trait::async_trait]
impl ReactiveSubscription for RecurrenceSubscription {
    fn name(&self) -> &'static str {
        "recurrence"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn initial_delay(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn tick(&self) {
        super::background::recurrence_tick(&self.scheduler, &self.pool, self.horizon_days);
    }
}

// ---------------------------------------------------------------------------
// Scheduler loop
// ---------------------------------------------------------------------------

/// Poll one subscription until `cancel` fires. Waiting phases (the initial
/// delay and the gap between ticks) end early on cancellation.
async fn run_single(sub: Box<dyn ReactiveSubscription>, cancel: CancellationToken) {
    let name = sub.name();
    let delay = sub.initial_delay();
    if !delay.is_zero() {
        tracing::debug!(subscription = name, delay_secs = delay.as_secs(), "Delaying first poll");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {}
        }
    }

    let mut ticker = tokio::time::interval(sub.interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => sub.tick().await,
        }
    }
    tracing::info!(subscription = name, "Subscription loop exited");
}

/// Spawn each subscription on its own tokio task.
pub fn spawn_subscriptions(
    subscriptions: Vec<Box<dyn ReactiveSubscription>>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    subscriptions
        .into_iter()
        .map(|sub| tokio::spawn(run_single(sub, cancel.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct TestSubscription {
        tick_count: Arc<AtomicU32>,
        every: Duration,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl ReactiveSubscription for TestSubscription {
        fn name(&self) -> &'static str {
            "test"
        }

        fn interval(&self) -> Duration {
            self.every
        }

        fn initial_delay(&self) -> Duration {
            self.delay
        }

        async fn tick(&self) {
            self.tick_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_subscription_defaults() {
        let sub = TestSubscription {
            tick_count: Arc::new(AtomicU32::new(0)),
            every: Duration::from_millis(10),
            delay: Duration::ZERO,
        };
        assert_eq!(sub.name(), "test");
        assert_eq!(sub.interval(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_loop_ticks_until_stopped() {
        let count = Arc::new(AtomicU32::new(0));
        let scheduler = Arc::new(SchedulerState::new());
        let subs: Vec<Box<dyn ReactiveSubscription>> = vec![Box::new(TestSubscription {
            tick_count: count.clone(),
            every: Duration::from_millis(10),
            delay: Duration::ZERO,
        })];
        let handles = crate::engine::background::start(scheduler.clone(), subs);

        tokio::time::sleep(Duration::from_millis(60)).await;
        crate::engine::background::stop(&scheduler);
        let seen = count.load(Ordering::Relaxed);
        assert!(seen >= 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        // At most one tick can be in flight when the flag flips.
        assert!(count.load(Ordering::Relaxed) <= seen + 1);
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_stop_wakes_idle_loop() {
        let count = Arc::new(AtomicU32::new(0));
        let scheduler = Arc::new(SchedulerState::new());
        let subs: Vec<Box<dyn ReactiveSubscription>> = vec![Box::new(TestSubscription {
            tick_count: count.clone(),
            every: Duration::from_secs(3600),
            delay: Duration::ZERO,
        })];
        let handles = crate::engine::background::start(scheduler.clone(), subs);

        // First tick fires immediately, then the loop idles for an hour.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::Relaxed), 1);

        crate::engine::background::stop(&scheduler);
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("loop should exit promptly")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_stop_before_first_poll_is_not_lost() {
        let count = Arc::new(AtomicU32::new(0));
        let scheduler = Arc::new(SchedulerState::new());
        let subs: Vec<Box<dyn ReactiveSubscription>> = vec![Box::new(TestSubscription {
            tick_count: count.clone(),
            every: Duration::from_secs(3600),
            delay: Duration::from_secs(3600),
        })];
        let handles = crate::engine::background::start(scheduler.clone(), subs);
        // The loop task has not run yet.
        crate::engine::background::stop(&scheduler);

        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("loop should exit promptly")
                .unwrap();
        }
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let count = Arc::new(AtomicU32::new(0));
        let scheduler = Arc::new(SchedulerState::new());
        let sub = || -> Vec<Box<dyn ReactiveSubscription>> {
            vec![Box::new(TestSubscription {
                tick_count: count.clone(),
                every: Duration::from_millis(10),
                delay: Duration::ZERO,
            })]
        };

        let first = crate::engine::background::start(scheduler.clone(), sub());
        crate::engine::background::stop(&scheduler);
        for handle in first {
            handle.await.unwrap();
        }

        let second = crate::engine::background::start(scheduler.clone(), sub());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(count.load(Ordering::Relaxed) >= 1);
        crate::engine::background::stop(&scheduler);
        for handle in second {
            handle.await.unwrap();
        }
    }
}
