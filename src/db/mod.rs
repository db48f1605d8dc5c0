#[macro_use]
pub mod macros;
pub mod migrations;
pub mod models;
pub mod repos;
pub mod settings_keys;

use std::sync::{Arc, Mutex};

use r2d2::{CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::hooks::Action;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppConfig;
use crate::error::AppError;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Kind of row mutation reported by the SQLite update hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Insert,
    Update,
    Delete,
}

/// Raw change notification: which row of which table was touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChange {
    pub action: RowAction,
    pub table: String,
    pub rowid: i64,
}

pub type RowChangeSender = UnboundedSender<RowChange>;

/// Connection customizer that sets per-connection SQLite pragmas and, when a
/// change sender is present, installs the hooks feeding the realtime feed.
#[derive(Debug)]
struct SqlitePragmaCustomizer {
    changes: Option<RowChangeSender>,
}

impl CustomizeConnection<rusqlite::Connection, rusqlite::Error> for SqlitePragmaCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -8000;",
        )?;

        if let Some(tx) = &self.changes {
            install_change_hooks(conn, tx.clone())?;
        }
        Ok(())
    }
}

/// Report row changes only once their transaction commits.
///
/// The update hook fires mid-statement, so changes are held per connection and
/// flushed by the commit hook. A rollback discards them. The commit hook still
/// runs before the commit lands, so readers of these changes must wait for the
/// write lock (see `engine::feed`).
fn install_change_hooks(conn: &rusqlite::Connection, tx: RowChangeSender) -> Result<(), rusqlite::Error> {
    let pending: Arc<Mutex<Vec<RowChange>>> = Arc::default();

    let buffer = Arc::clone(&pending);
    conn.update_hook(Some(
        move |action: Action, _db: &str, table: &str, rowid: i64| {
            let action = match action {
                Action::SQLITE_INSERT => RowAction::Insert,
                Action::SQLITE_UPDATE => RowAction::Update,
                Action::SQLITE_DELETE => RowAction::Delete,
                _ => return,
            };
            if let Ok(mut pending) = buffer.lock() {
                pending.push(RowChange {
                    action,
                    table: table.to_string(),
                    rowid,
                });
            }
        },
    ))?;

    let committed = Arc::clone(&pending);
    conn.commit_hook(Some(move || {
        if let Ok(mut pending) = committed.lock() {
            for change in pending.drain(..) {
                // Receiver gone means the feed was shut down.
                let _ = tx.send(change);
            }
        }
        false
    }))?;

    conn.rollback_hook(Some(move || {
        if let Ok(mut pending) = pending.lock() {
            pending.clear();
        }
    }))?;
    Ok(())
}

/// Initialize the database: create file, enable WAL + foreign keys, run migrations.
pub fn init_db(config: &AppConfig, changes: Option<RowChangeSender>) -> Result<DbPool, AppError> {
    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = config.db_path();

    tracing::info!(path = %db_path.display(), "Initializing database");

    let manager = SqliteConnectionManager::file(&db_path);
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_customizer(Box::new(SqlitePragmaCustomizer { changes }))
        .build(manager)?;

    // Database-wide, only needs to run once
    {
        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        tracing::debug!("SQLite pragmas configured (WAL, FK, busy_timeout)");
    }

    {
        let conn = pool.get()?;
        migrations::run(&conn)?;
        migrations::run_incremental(&conn)?;
    }

    tracing::info!(pool_size = config.pool_size, "Database initialized successfully");
    Ok(pool)
}

/// Current time in the single timestamp format used by every table.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
pub fn init_test_db() -> Result<DbPool, AppError> {
    init_test_db_with_changes(None)
}

#[cfg(test)]
pub fn init_test_db_with_changes(changes: Option<RowChangeSender>) -> Result<DbPool, AppError> {
    use std::time::Duration;

    // Unique temp file per test; in-memory databases are per-connection under r2d2.
    let tmp = std::env::temp_dir().join(format!("teamboard_test_{}.db", uuid::Uuid::new_v4()));
    let manager = SqliteConnectionManager::file(&tmp);
    let pool = Pool::builder()
        .max_size(2)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(SqlitePragmaCustomizer { changes }))
        .build(manager)?;

    let conn = pool.get()?;
    migrations::run(&conn)?;
    migrations::run_incremental(&conn)?;
    drop(conn);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db_in_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().join("nested"),
            pool_size: 2,
            ..AppConfig::default()
        };
        let pool = init_db(&config, None).unwrap();
        assert!(config.db_path().exists());

        let conn = pool.get().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('profiles', 'departamentos', 'customers', 'tasks', 'recurring_tasks',
                  'recurring_task_instances', 'team_activity', 'app_settings')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 8);
    }

    #[test]
    fn test_update_hook_reports_changes() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let pool = init_test_db_with_changes(Some(tx)).unwrap();
        // Drain anything produced by migrations.
        while rx.try_recv().is_ok() {}

        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO app_settings (key, value, updated_at) VALUES ('k', 'v', 'now')",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM app_settings WHERE key = 'k'", []).unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.action, RowAction::Insert);
        assert_eq!(first.table, "app_settings");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.action, RowAction::Delete);
        assert_eq!(second.rowid, first.rowid);
    }

    #[test]
    fn test_changes_are_released_on_commit_only() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let pool = init_test_db_with_changes(Some(tx)).unwrap();
        while rx.try_recv().is_ok() {}

        let mut conn = pool.get().unwrap();
        let txn = conn.transaction().unwrap();
        txn.execute("INSERT INTO app_settings (key, value, updated_at) VALUES ('a', '1', 'now')", [])
            .unwrap();
        assert!(rx.try_recv().is_err());
        txn.rollback().unwrap();
        assert!(rx.try_recv().is_err());

        let txn = conn.transaction().unwrap();
        txn.execute("INSERT INTO app_settings (key, value, updated_at) VALUES ('b', '2', 'now')", [])
            .unwrap();
        assert!(rx.try_recv().is_err());
        txn.commit().unwrap();
        assert_eq!(rx.try_recv().unwrap().action, RowAction::Insert);
        assert!(rx.try_recv().is_err());
    }
}
