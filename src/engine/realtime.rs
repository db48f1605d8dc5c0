//! Realtime bridge between the change feed and the dashboard.
//!
//! Each subscription watches one channel, turns every event into a
//! [`Notification`] and fires the caller's refresh handler. Handlers run as
//! spawned tasks; their failures are logged and never reach the feed loop.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::feed::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::error::AppError;
use crate::notifications::{Notification, Notifier, SharedPrefs};

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `tasks` and `recurring_task_instances`.
    Tasks,
    Profiles,
    Customers,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Tasks => "tasks",
            Channel::Profiles => "profiles",
            Channel::Customers => "customers",
        }
    }

    pub fn tables(&self) -> &'static [&'static str] {
        match self {
            Channel::Tasks => &["tasks", "recurring_task_instances"],
            Channel::Profiles => &["profiles"],
            Channel::Customers => &["customers"],
        }
    }

    pub fn watches(&self, table: &str) -> bool {
        self.tables().contains(&table)
    }

    /// Fallback wording when the payload carries no title or name.
    fn generic_label(&self) -> &'static str {
        match self {
            Channel::Tasks => "Uma tarefa",
            Channel::Profiles => "Um membro da equipe",
            Channel::Customers => "Um cliente",
        }
    }

    fn title_for(&self, kind: ChangeKind) -> &'static str {
        match (self, kind) {
            (Channel::Tasks, ChangeKind::Insert) => "Nova tarefa",
            (Channel::Tasks, ChangeKind::Update) => "Tarefa atualizada",
            (Channel::Tasks, ChangeKind::Delete) => "Tarefa removida",
            (Channel::Profiles, ChangeKind::Insert) => "Novo membro",
            (Channel::Profiles, ChangeKind::Update) => "Membro atualizado",
            (Channel::Profiles, ChangeKind::Delete) => "Membro removido",
            (Channel::Customers, ChangeKind::Insert) => "Novo cliente",
            (Channel::Customers, ChangeKind::Update) => "Cliente atualizado",
            (Channel::Customers, ChangeKind::Delete) => "Cliente removido",
        }
    }
}

fn label_from(row: Option<&serde_json::Value>) -> Option<String> {
    let row = row?;
    ["title", "name"].iter().find_map(|key| {
        row.get(*key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Notification for one event: `new` row label, then `old`, then a generic label.
pub fn build_notification(channel: Channel, event: &ChangeEvent) -> Notification {
    let body = label_from(event.new.as_ref())
        .or_else(|| label_from(event.old.as_ref()))
        .unwrap_or_else(|| channel.generic_label().to_string());
    Notification {
        channel: channel.name().to_string(),
        title: channel.title_for(event.event_type).to_string(),
        body,
    }
}

// ---------------------------------------------------------------------------
// Refresh handlers
// ---------------------------------------------------------------------------

/// Re-reads whatever the dashboard shows for a channel.
#[async_trait::async_trait]
pub trait RefreshHandler: Send + Sync + 'static {
    async fn refresh(&self) -> Result<(), AppError>;
}

struct FnRefresh<F>(F);

#[async_trait::async_trait]
impl<F, Fut> RefreshHandler for FnRefresh<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    async fn refresh(&self) -> Result<(), AppError> {
        (self.0)().await
    }
}

/// Wrap a closure returning a future as a [`RefreshHandler`].
pub fn refresh_fn<F, Fut>(f: F) -> Arc<dyn RefreshHandler>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    Arc::new(FnRefresh(f))
}

/// The three refresh callbacks of a dashboard screen.
#[derive(Clone)]
pub struct DashboardCallbacks {
    pub on_tasks_update: Arc<dyn RefreshHandler>,
    pub on_team_update: Arc<dyn RefreshHandler>,
    pub on_customers_update: Arc<dyn RefreshHandler>,
}

fn spawn_refresh(channel: Channel, handler: Arc<dyn RefreshHandler>) {
    tokio::spawn(async move {
        if let Err(e) = handler.refresh().await {
            tracing::warn!(channel = channel.name(), error = %e, "Refresh callback failed");
        }
    });
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// A live channel subscription. Cancelled on [`Subscription::unsubscribe`] or drop.
pub struct Subscription {
    channel: Channel,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }

    /// Stop receiving events. Returns false when already cancelled.
    pub fn unsubscribe(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        tracing::debug!(channel = self.channel.name(), "Realtime subscription cancelled");
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The dashboard's three subscriptions, torn down together exactly once.
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn is_active(&self) -> bool {
        !self.subscriptions.is_empty() && self.subscriptions.iter().all(Subscription::is_active)
    }

    /// Cancel every subscription; returns how many were still live.
    /// Later calls are no-ops.
    pub fn unsubscribe_all(&mut self) -> usize {
        let cancelled = self
            .subscriptions
            .drain(..)
            .filter(|sub| sub.unsubscribe())
            .count();
        if cancelled > 0 {
            tracing::info!(cancelled, "Realtime subscriptions closed");
        }
        cancelled
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Connects the change feed to notifications and refresh callbacks.
#[derive(Clone)]
pub struct RealtimeBridge {
    feed: ChangeFeed,
    notifier: Arc<dyn Notifier>,
    prefs: SharedPrefs,
}

impl RealtimeBridge {
    pub fn new(feed: ChangeFeed, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            feed,
            notifier,
            prefs: SharedPrefs::default(),
        }
    }

    /// Read the switches from `prefs` on every event, so later changes apply
    /// to live subscriptions.
    pub fn with_prefs(self, prefs: SharedPrefs) -> Self {
        Self { prefs, ..self }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Watch one channel. Events are handled one at a time in arrival order.
    pub fn subscribe(&self, channel: Channel, handler: Arc<dyn RefreshHandler>) -> Subscription {
        let token = CancellationToken::new();
        let mut rx = self.feed.subscribe();
        let notifier = self.notifier.clone();
        let prefs = self.prefs.clone();
        let cancel = token.clone();

        let handle = tokio::spawn(async move {
            tracing::debug!(channel = channel.name(), "Realtime subscription started");
            loop {
                let received = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => received,
                };
                match received {
                    Ok(event) => {
                        if !channel.watches(&event.table) {
                            continue;
                        }
                        let notification = build_notification(channel, &event);
                        if prefs.allows(channel.name()) {
                            notifier.notify(&notification);
                        }
                        spawn_refresh(channel, handler.clone());
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(channel = channel.name(), missed, "Realtime subscriber lagged, refreshing");
                        spawn_refresh(channel, handler.clone());
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!(channel = channel.name(), "Realtime subscription stopped");
        });

        Subscription {
            channel,
            token,
            handle,
        }
    }

    /// Open the tasks, profiles and customers subscriptions together.
    pub fn subscribe_dashboard(&self, callbacks: DashboardCallbacks) -> SubscriptionSet {
        SubscriptionSet {
            subscriptions: vec![
                self.subscribe(Channel::Tasks, callbacks.on_tasks_update),
                self.subscribe(Channel::Profiles, callbacks.on_team_update),
                self.subscribe(Channel::Customers, callbacks.on_customers_update),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::notifications::{ChannelNotifier, NotificationPrefs};

    fn counting_handler(count: Arc<AtomicU32>) -> Arc<dyn RefreshHandler> {
        refresh_fn(move || {
            let count = count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn event(table: &str, kind: ChangeKind, new: Option<serde_json::Value>) -> ChangeEvent {
        ChangeEvent {
            table: table.into(),
            event_type: kind,
            new,
            old: None,
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[test]
    fn test_notification_labels() {
        let insert = event("tasks", ChangeKind::Insert, Some(serde_json::json!({"title": "Fix login bug"})));
        let n = build_notification(Channel::Tasks, &insert);
        assert_eq!(n.title, "Nova tarefa");
        assert_eq!(n.body, "Fix login bug");

        let deleted = ChangeEvent {
            old: Some(serde_json::json!({"name": "Padaria Central"})),
            ..event("customers", ChangeKind::Delete, None)
        };
        assert_eq!(build_notification(Channel::Customers, &deleted).body, "Padaria Central");

        let bare = event("profiles", ChangeKind::Update, None);
        let n = build_notification(Channel::Profiles, &bare);
        assert_eq!(n.title, "Membro atualizado");
        assert_eq!(n.body, "Um membro da equipe");
    }

    #[tokio::test]
    async fn test_insert_event_notifies_and_refreshes_once() {
        let feed = ChangeFeed::new(16);
        let (tx, mut notes) = tokio::sync::mpsc::unbounded_channel();
        let bridge = RealtimeBridge::new(feed.clone(), Arc::new(ChannelNotifier::new(tx)));

        let tasks = Arc::new(AtomicU32::new(0));
        let team = Arc::new(AtomicU32::new(0));
        let customers = Arc::new(AtomicU32::new(0));
        let mut set = bridge.subscribe_dashboard(DashboardCallbacks {
            on_tasks_update: counting_handler(tasks.clone()),
            on_team_update: counting_handler(team.clone()),
            on_customers_update: counting_handler(customers.clone()),
        });
        assert_eq!(set.len(), 3);
        settle().await;

        feed.publish(event("tasks", ChangeKind::Insert, Some(serde_json::json!({"title": "Fix login bug"}))));
        settle().await;

        let note = notes.try_recv().unwrap();
        assert!(note.body.contains("Fix login bug"));
        assert!(notes.try_recv().is_err());
        assert_eq!(tasks.load(Ordering::SeqCst), 1);
        assert_eq!(team.load(Ordering::SeqCst), 0);
        assert_eq!(customers.load(Ordering::SeqCst), 0);

        assert_eq!(set.unsubscribe_all(), 3);
        assert_eq!(set.unsubscribe_all(), 0);
    }

    #[tokio::test]
    async fn test_event_without_payload_uses_generic_label() {
        let feed = ChangeFeed::new(16);
        let (tx, mut notes) = tokio::sync::mpsc::unbounded_channel();
        let bridge = RealtimeBridge::new(feed.clone(), Arc::new(ChannelNotifier::new(tx)));
        let count = Arc::new(AtomicU32::new(0));
        let sub = bridge.subscribe(Channel::Customers, counting_handler(count.clone()));
        settle().await;

        feed.publish(event("customers", ChangeKind::Delete, None));
        settle().await;

        assert_eq!(notes.try_recv().unwrap().body, "Um cliente");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
    }

    #[tokio::test]
    async fn test_failing_refresh_is_swallowed() {
        let feed = ChangeFeed::new(16);
        let (tx, mut notes) = tokio::sync::mpsc::unbounded_channel();
        let bridge = RealtimeBridge::new(feed.clone(), Arc::new(ChannelNotifier::new(tx)));
        let failing = refresh_fn(|| async { Err(AppError::Internal("refetch failed".into())) });
        let sub = bridge.subscribe(Channel::Tasks, failing);
        settle().await;

        feed.publish(event("recurring_task_instances", ChangeKind::Update, None));
        feed.publish(event("tasks", ChangeKind::Insert, Some(serde_json::json!({"title": "Second"}))));
        settle().await;

        assert_eq!(notes.try_recv().unwrap().body, "Uma tarefa");
        assert_eq!(notes.try_recv().unwrap().body, "Second");
        assert!(sub.is_active());
    }

    #[tokio::test]
    async fn test_disabled_channel_still_refreshes() {
        let feed = ChangeFeed::new(16);
        let (tx, mut notes) = tokio::sync::mpsc::unbounded_channel();
        let bridge = RealtimeBridge::new(feed.clone(), Arc::new(ChannelNotifier::new(tx)))
            .with_prefs(SharedPrefs::new(NotificationPrefs { tasks: false, ..Default::default() }));
        let count = Arc::new(AtomicU32::new(0));
        let _sub = bridge.subscribe(Channel::Tasks, counting_handler(count.clone()));
        settle().await;

        feed.publish(event("tasks", ChangeKind::Update, None));
        settle().await;

        assert!(notes.try_recv().is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prefs_change_applies_to_live_subscription() {
        let feed = ChangeFeed::new(16);
        let (tx, mut notes) = tokio::sync::mpsc::unbounded_channel();
        let prefs = SharedPrefs::default();
        let bridge = RealtimeBridge::new(feed.clone(), Arc::new(ChannelNotifier::new(tx))).with_prefs(prefs.clone());
        let count = Arc::new(AtomicU32::new(0));
        let _sub = bridge.subscribe(Channel::Customers, counting_handler(count.clone()));
        settle().await;

        feed.publish(event("customers", ChangeKind::Insert, Some(serde_json::json!({"name": "Acme"}))));
        settle().await;
        assert_eq!(notes.try_recv().unwrap().body, "Acme");

        prefs.set(NotificationPrefs { customers: false, ..Default::default() });
        feed.publish(event("customers", ChangeKind::Update, Some(serde_json::json!({"name": "Acme"}))));
        settle().await;
        assert!(notes.try_recv().is_err());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropping_set_stops_delivery() {
        let feed = ChangeFeed::new(16);
        let bridge = RealtimeBridge::new(feed.clone(), Arc::new(crate::notifications::TracingNotifier));
        let count = Arc::new(AtomicU32::new(0));
        let set = bridge.subscribe_dashboard(DashboardCallbacks {
            on_tasks_update: counting_handler(count.clone()),
            on_team_update: counting_handler(count.clone()),
            on_customers_update: counting_handler(count.clone()),
        });
        settle().await;
        drop(set);
        settle().await;

        feed.publish(event("tasks", ChangeKind::Insert, None));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
