//! Store change feed.
//!
//! The connection hooks report `(action, table, rowid)` on an unbounded channel
//! once the owning transaction commits. [`spawn_pump`] turns those into [`ChangeEvent`]s carrying the row
//! as JSON and publishes them on a broadcast channel.

use std::collections::HashMap;

use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use ts_rs::TS;

use crate::db::{DbPool, RowAction, RowChange};
use crate::error::AppError;

/// Tables whose changes are published.
pub const WATCHED_TABLES: [&str; 4] = ["tasks", "recurring_task_instances", "profiles", "customers"];

/// Rows remembered for `old` payloads before the cache is reset.
const ROW_CACHE_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl From<RowAction> for ChangeKind {
    fn from(action: RowAction) -> Self {
        match action {
            RowAction::Insert => ChangeKind::Insert,
            RowAction::Update => ChangeKind::Update,
            RowAction::Delete => ChangeKind::Delete,
        }
    }
}

/// One row-level change, shaped like a hosted realtime payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChangeEvent {
    pub table: String,
    pub event_type: ChangeKind,
    #[ts(type = "Record<string, unknown> | null")]
    pub new: Option<Value>,
    #[ts(type = "Record<string, unknown> | null")]
    pub old: Option<Value>,
}

/// Broadcast fan-out of change events. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Row reading
// ---------------------------------------------------------------------------

fn value_ref_to_json(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

fn row_as_json(conn: &rusqlite::Connection, table: &str, rowid: i64) -> Result<Option<Value>, AppError> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {table} WHERE rowid = ?1"))?;
    let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
    let mut rows = stmt.query([rowid])?;
    match rows.next()? {
        Some(row) => {
            let mut object = Map::new();
            for (i, name) in names.iter().enumerate() {
                object.insert(name.clone(), value_ref_to_json(row.get_ref(i)?));
            }
            Ok(Some(Value::Object(object)))
        }
        None => Ok(None),
    }
}

/// Read one row of a watched table as a JSON object.
///
/// Changes arrive from the commit hook while the writer still holds its lock.
/// Taking the write lock first makes the read wait for that commit to land.
fn read_row(pool: &DbPool, table: &str, rowid: i64) -> Result<Option<Value>, AppError> {
    if !WATCHED_TABLES.contains(&table) {
        return Ok(None);
    }
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let row = row_as_json(&tx, table, rowid)?;
    tx.commit()?;
    Ok(row)
}

/// Last seen snapshot per `(table, rowid)`, used to fill `old`.
#[derive(Default)]
struct RowCache {
    rows: HashMap<(String, i64), Value>,
}

impl RowCache {
    fn remember(&mut self, table: &str, rowid: i64, row: Value) -> Option<Value> {
        if self.rows.len() >= ROW_CACHE_LIMIT {
            self.rows.clear();
        }
        self.rows.insert((table.to_string(), rowid), row)
    }

    fn forget(&mut self, table: &str, rowid: i64) -> Option<Value> {
        self.rows.remove(&(table.to_string(), rowid))
    }
}

fn to_event(pool: &DbPool, cache: &mut RowCache, change: RowChange) -> ChangeEvent {
    let kind = ChangeKind::from(change.action);
    let (new, old) = match kind {
        ChangeKind::Delete => (None, cache.forget(&change.table, change.rowid)),
        ChangeKind::Insert | ChangeKind::Update => match read_row(pool, &change.table, change.rowid) {
            Ok(Some(row)) => {
                let old = cache.remember(&change.table, change.rowid, row.clone());
                (Some(row), old)
            }
            // Deleted again by a later transaction.
            Ok(None) => (None, None),
            Err(e) => {
                tracing::warn!(table = %change.table, rowid = change.rowid, error = %e, "Could not read changed row");
                (None, None)
            }
        },
    };
    ChangeEvent {
        table: change.table,
        event_type: kind,
        new,
        old,
    }
}

/// Forward hook notifications for watched tables into `feed` until cancelled
/// or until every hook sender is gone.
pub fn spawn_pump(
    pool: DbPool,
    mut changes: UnboundedReceiver<RowChange>,
    feed: ChangeFeed,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cache = RowCache::default();
        tracing::info!("Change feed pump started");
        loop {
            let change = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                change = changes.recv() => match change {
                    Some(change) => change,
                    None => break,
                },
            };
            if !WATCHED_TABLES.contains(&change.table.as_str()) {
                continue;
            }
            let event = to_event(&pool, &mut cache, change);
            let receivers = feed.publish(event);
            tracing::trace!(receivers, "Change event published");
        }
        tracing::info!("Change feed pump stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db_with_changes;
    use crate::db::models::{CreateTaskInput, UpdateTaskInput};
    use crate::db::repos::tasks as task_repo;

    #[test]
    fn test_event_wire_shape() {
        let event = ChangeEvent {
            table: "tasks".into(),
            event_type: ChangeKind::Insert,
            new: Some(serde_json::json!({"title": "Fix login bug"})),
            old: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "INSERT");
        assert_eq!(json["new"]["title"], "Fix login bug");
        assert!(json["old"].is_null());
    }

    #[tokio::test]
    async fn test_pump_publishes_row_changes() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let pool = init_test_db_with_changes(Some(tx)).unwrap();
        let feed = ChangeFeed::new(16);
        let mut events = feed.subscribe();
        let cancel = CancellationToken::new();
        let pump = spawn_pump(pool.clone(), rx, feed.clone(), cancel.clone());

        let task = task_repo::create(
            &pool,
            CreateTaskInput {
                title: "Fix login bug".into(),
                ..Default::default()
            },
            "u1",
        )
        .unwrap();

        let inserted = events.recv().await.unwrap();
        assert_eq!(inserted.table, "tasks");
        assert_eq!(inserted.event_type, ChangeKind::Insert);
        assert_eq!(inserted.new.as_ref().unwrap()["title"], "Fix login bug");

        task_repo::delete(&pool, &task.id).unwrap();
        let deleted = events.recv().await.unwrap();
        assert_eq!(deleted.event_type, ChangeKind::Delete);
        assert!(deleted.new.is_none());
        assert_eq!(deleted.old.as_ref().unwrap()["id"], task.id.as_str());

        cancel.cancel();
        pump.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_update_events_carry_committed_row() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let pool = init_test_db_with_changes(Some(tx)).unwrap();
        let feed = ChangeFeed::new(16);
        let mut events = feed.subscribe();
        let cancel = CancellationToken::new();
        let pump = spawn_pump(pool.clone(), rx, feed.clone(), cancel.clone());

        let task = task_repo::create(
            &pool,
            CreateTaskInput { title: "v0".into(), ..Default::default() },
            "u1",
        )
        .unwrap();
        events.recv().await.unwrap();

        for i in 1..=100 {
            let title = format!("v{i}");
            task_repo::update(
                &pool,
                &task.id,
                UpdateTaskInput { title: Some(title.clone()), ..Default::default() },
            )
            .unwrap();

            let event = events.recv().await.unwrap();
            assert_eq!(event.event_type, ChangeKind::Update);
            assert_eq!(event.new.as_ref().unwrap()["title"], title.as_str());
            assert_eq!(event.old.as_ref().unwrap()["title"], format!("v{}", i - 1).as_str());
        }

        cancel.cancel();
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn test_changes_wait_for_commit() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let pool = init_test_db_with_changes(Some(tx)).unwrap();
        let feed = ChangeFeed::new(16);
        let mut events = feed.subscribe();
        let cancel = CancellationToken::new();
        let pump = spawn_pump(pool.clone(), rx, feed.clone(), cancel.clone());

        let now = crate::db::now_timestamp();
        {
            let mut conn = pool.get().unwrap();
            let discarded = conn.transaction().unwrap();
            discarded
                .execute(
                    "INSERT INTO tasks (id, title, created_at, updated_at) VALUES ('t0', 'Draft', ?1, ?1)",
                    [&now],
                )
                .unwrap();
            discarded.rollback().unwrap();

            let kept = conn.transaction().unwrap();
            kept.execute(
                "INSERT INTO tasks (id, title, created_at, updated_at) VALUES ('t1', 'Planned', ?1, ?1)",
                [&now],
            )
            .unwrap();
            kept.execute("UPDATE tasks SET title = 'Scheduled' WHERE id = 't1'", []).unwrap();
            kept.commit().unwrap();
        }

        let inserted = events.recv().await.unwrap();
        assert_eq!(inserted.event_type, ChangeKind::Insert);
        assert_eq!(inserted.new.as_ref().unwrap()["id"], "t1");
        assert_eq!(inserted.new.as_ref().unwrap()["title"], "Scheduled");

        let updated = events.recv().await.unwrap();
        assert_eq!(updated.event_type, ChangeKind::Update);
        assert_eq!(updated.new.as_ref().unwrap()["title"], "Scheduled");
        assert!(events.try_recv().is_err());

        cancel.cancel();
        pump.await.unwrap();
    }
}
