//! SQLite database connection and schema management for progress tracking
//!
//! Manages the progress database with automatic schema migration. One
//! connection shared behind a mutex; the aggregate update and the unlock
//! ledger each wrap their multi-step sequences in a transaction on it.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Database wrapper shared by all engine components
#[derive(Clone)]
pub struct ProgressDb {
    conn: Arc<Mutex<Connection>>,
}

impl ProgressDb {
    /// Open or create the progress database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create progress dir: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open progress db: {}", path.display()))?;

        // WAL for concurrent request-scoped units of work
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (tests, ephemeral deployments)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory progress db")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Get a reference to the connection (for queries and transactions)
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("Progress DB lock poisoned")
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA_SQL)?;
        drop(conn);
        self.run_migrations()?;
        Ok(())
    }

    /// Run any pending migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();

        let version: i32 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
            .unwrap_or(0);

        // Migration 2: gamification tables (unlock ledger + engagement counters)
        if version < 2 {
            conn.execute_batch(
                r#"
                -- Unlock ledger: at most one row per (user_id, achievement_type)
                CREATE TABLE IF NOT EXISTS achievements (
                    user_id TEXT NOT NULL,
                    achievement_type TEXT NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    points INTEGER NOT NULL DEFAULT 0,
                    unlocked_at INTEGER NOT NULL,
                    PRIMARY KEY (user_id, achievement_type)
                );

                -- Search usage / review counters per user
                CREATE TABLE IF NOT EXISTS engagement_counters (
                    user_id TEXT NOT NULL,
                    counter TEXT NOT NULL,
                    count INTEGER NOT NULL DEFAULT 0,
                    updated_at INTEGER,
                    PRIMARY KEY (user_id, counter)
                );
                "#,
            )?;
            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (2)", [])?;
        }

        Ok(())
    }

    /// Delete all progress data for every user (content tables are kept)
    pub fn reset_progress(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            r#"
            DELETE FROM lesson_progress;
            DELETE FROM learning_progress;
            DELETE FROM learning_sessions;
            DELETE FROM quiz_attempts;
            DELETE FROM engagement_counters;
            "#,
        )?;
        Ok(())
    }

    /// Delete all unlock records (progress data is kept)
    pub fn reset_achievements(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch("DELETE FROM achievements;")?;
        Ok(())
    }
}

/// SQL schema for the progress database
const SCHEMA_SQL: &str = r#"
-- Course modules (read-only to the engine, seeded by the content service)
CREATE TABLE IF NOT EXISTS modules (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    tier TEXT NOT NULL,
    order_index INTEGER NOT NULL DEFAULT 0,
    prerequisites TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_modules_category ON modules(category);
CREATE INDEX IF NOT EXISTS idx_modules_tier ON modules(tier);

-- Lessons (read-only to the engine)
CREATE TABLE IF NOT EXISTS lessons (
    id TEXT PRIMARY KEY,
    module_id TEXT NOT NULL,
    order_index INTEGER NOT NULL DEFAULT 0,
    estimated_minutes INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (module_id) REFERENCES modules(id)
);
CREATE INDEX IF NOT EXISTS idx_lessons_module ON lessons(module_id);

-- Per-user-per-module aggregate progress
CREATE TABLE IF NOT EXISTS learning_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    module_id TEXT NOT NULL,
    time_spent_minutes INTEGER NOT NULL DEFAULT 0,
    score REAL,
    completed_at INTEGER,
    started_at INTEGER NOT NULL,
    UNIQUE (user_id, module_id)
);
CREATE INDEX IF NOT EXISTS idx_progress_user ON learning_progress(user_id);

-- Per-user-per-lesson progress (leaf rows aggregated into learning_progress)
CREATE TABLE IF NOT EXISTS lesson_progress (
    progress_id INTEGER NOT NULL,
    lesson_id TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    time_spent_minutes INTEGER NOT NULL DEFAULT 0,
    progress REAL NOT NULL DEFAULT 0,
    score REAL,
    last_accessed INTEGER,
    PRIMARY KEY (progress_id, lesson_id),
    FOREIGN KEY (progress_id) REFERENCES learning_progress(id)
);

-- One session row per user per calendar day; id is "user:YYYY-MM-DD"
CREATE TABLE IF NOT EXISTS learning_sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    lessons_viewed INTEGER NOT NULL DEFAULT 0,
    quizzes_taken INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON learning_sessions(user_id);

-- Quiz attempts, append-only
CREATE TABLE IF NOT EXISTS quiz_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    quiz_id TEXT NOT NULL,
    is_correct INTEGER NOT NULL,
    attempted_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attempts_user ON quiz_attempts(user_id, attempted_at);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (1);
"#;
