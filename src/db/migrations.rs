use rusqlite::Connection;

use crate::error::AppError;

/// Run the idempotent base schema.
pub fn run(conn: &Connection) -> Result<(), AppError> {
    tracing::debug!("Running database migrations");

    conn.execute_batch(SCHEMA)?;

    tracing::info!("Database migrations complete");
    Ok(())
}

const SCHEMA: &str = r#"

-- ============================================================================
-- Departments (must precede profiles due to FK)
-- ============================================================================

CREATE TABLE IF NOT EXISTS departamentos (
    id          TEXT PRIMARY KEY,
    name        TEXT,
    description TEXT,
    color       TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- ============================================================================
-- Profiles (team members)
-- ============================================================================

CREATE TABLE IF NOT EXISTS profiles (
    id              TEXT PRIMARY KEY,
    name            TEXT,
    email           TEXT,
    role            TEXT,
    avatar          TEXT,
    department_id   TEXT REFERENCES departamentos(id) ON DELETE SET NULL,
    status          TEXT,
    access_level    TEXT,
    joined_at       TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_profiles_department ON profiles(department_id);

-- ============================================================================
-- Tasks
-- ============================================================================

CREATE TABLE IF NOT EXISTS tasks (
    id           TEXT PRIMARY KEY,
    title        TEXT,
    description  TEXT,
    status       TEXT,
    priority     TEXT,
    assignee_id  TEXT REFERENCES profiles(id) ON DELETE SET NULL,
    due_date     TEXT,
    project_id   TEXT,
    created_by   TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assignee_id);
CREATE INDEX IF NOT EXISTS idx_tasks_project  ON tasks(project_id);

-- ============================================================================
-- Recurring task definitions
-- ============================================================================

CREATE TABLE IF NOT EXISTS recurring_tasks (
    id               TEXT PRIMARY KEY,
    title            TEXT NOT NULL,
    description      TEXT,
    assignee_id      TEXT REFERENCES profiles(id) ON DELETE SET NULL,
    priority         TEXT,
    recurrence_type  TEXT NOT NULL,
    start_date       TEXT NOT NULL,
    end_date         TEXT,
    custom_days      TEXT,
    custom_months    TEXT,
    project_id       TEXT,
    last_generated   TEXT,
    active           INTEGER NOT NULL DEFAULT 1,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_recurring_active ON recurring_tasks(active);

-- ============================================================================
-- Recurring task instances
-- ============================================================================

CREATE TABLE IF NOT EXISTS recurring_task_instances (
    id                 TEXT PRIMARY KEY,
    title              TEXT,
    description        TEXT,
    status             TEXT,
    priority           TEXT,
    assignee_id        TEXT REFERENCES profiles(id) ON DELETE SET NULL,
    due_date           TEXT NOT NULL,
    recurring_task_id  TEXT NOT NULL REFERENCES recurring_tasks(id) ON DELETE CASCADE,
    project_id         TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_instances_recurring ON recurring_task_instances(recurring_task_id);

-- ============================================================================
-- Customers (CRM)
-- ============================================================================

CREATE TABLE IF NOT EXISTS customers (
    id            TEXT PRIMARY KEY,
    name          TEXT,
    origin        TEXT,
    email         TEXT,
    phone         TEXT,
    status        TEXT,
    last_contact  TEXT,
    notes         TEXT,
    assigned_to   TEXT REFERENCES profiles(id) ON DELETE SET NULL,
    value         REAL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_customers_status ON customers(status);

-- ============================================================================
-- Team activity (append-only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS team_activity (
    id           TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL CHECK(length(trim(user_id)) > 0),
    action       TEXT NOT NULL CHECK(length(trim(action)) > 0),
    entity_type  TEXT NOT NULL
                 CHECK(entity_type IN ('team_member', 'department', 'task', 'task_instance',
                                       'recurring_task', 'customer')),
    entity_id    TEXT NOT NULL CHECK(length(trim(entity_id)) > 0),
    details      TEXT,
    created_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_team_activity_created ON team_activity(created_at);
CREATE INDEX IF NOT EXISTS idx_team_activity_entity  ON team_activity(entity_type, entity_id);

CREATE TRIGGER IF NOT EXISTS team_activity_no_update
BEFORE UPDATE ON team_activity
BEGIN
    SELECT RAISE(ABORT, 'team_activity is append-only');
END;

CREATE TRIGGER IF NOT EXISTS team_activity_no_delete
BEFORE DELETE ON team_activity
BEGIN
    SELECT RAISE(ABORT, 'team_activity is append-only');
END;

CREATE VIEW IF NOT EXISTS team_activity_view AS
SELECT a.rowid       AS seq,
       a.id          AS id,
       a.user_id     AS user_id,
       p.name        AS user_name,
       a.action      AS action,
       a.entity_type AS entity_type,
       a.entity_id   AS entity_id,
       a.details     AS details,
       a.created_at  AS created_at
FROM team_activity a
LEFT JOIN profiles p ON p.id = a.user_id;

-- ============================================================================
-- App settings (key/value)
-- ============================================================================

CREATE TABLE IF NOT EXISTS app_settings (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
"#;

/// Index additions for databases created before the instance dedup index existed.
pub fn run_incremental(conn: &Connection) -> Result<(), AppError> {
    // One instance per (definition, due date); retried generation relies on it.
    let has_unique: bool = conn
        .prepare(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'index' AND name = 'uq_instances_recurring_due'",
        )?
        .query_row([], |row| row.get::<_, i64>(0))
        .map(|c| c > 0)?;

    if !has_unique {
        conn.execute_batch(
            "DELETE FROM recurring_task_instances
             WHERE rowid NOT IN (
                 SELECT MIN(rowid) FROM recurring_task_instances
                 GROUP BY recurring_task_id, due_date
             );
             CREATE UNIQUE INDEX uq_instances_recurring_due
                 ON recurring_task_instances(recurring_task_id, due_date);",
        )?;
        tracing::info!("Added unique (recurring_task_id, due_date) index");
    }

    Ok(())
}
