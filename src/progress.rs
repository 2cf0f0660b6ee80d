//! Progress aggregation
//!
//! Applies a lesson-level delta and recomputes the module-level aggregate
//! (time spent, average score, completion) in a single transaction, so a
//! torn write between lesson row and aggregate is never observable.

use chrono::Utc;
use rusqlite::{OptionalExtension, Transaction};
use tracing::debug;

use crate::db::ProgressDb;
use crate::models::{LearningProgress, LessonProgress, LessonProgressDelta, ModuleProgress};

/// Error taxonomy for lesson progress updates.
///
/// Validation and not-found failures are rejected before any write and
/// indicate a caller bug or stale client state; storage failures mean the
/// aggregate could not be guaranteed and the transaction was rolled back.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("lesson not found: {0}")]
    LessonNotFound(String),

    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Applies lesson updates and keeps module aggregates consistent
#[derive(Clone)]
pub struct ProgressTracker {
    db: ProgressDb,
}

impl ProgressTracker {
    pub fn new(db: ProgressDb) -> Self {
        Self { db }
    }

    /// Merge `delta` onto the user's progress for `lesson_id` and recompute
    /// the owning module's aggregate, atomically.
    ///
    /// Returns the refreshed aggregate with all of its lesson rows. Fields
    /// absent from the delta are preserved; `time_spent_delta` is additive.
    pub fn update_lesson_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        delta: &LessonProgressDelta,
    ) -> Result<ModuleProgress, ProgressError> {
        validate_delta(delta)?;
        let now = Utc::now().timestamp_millis();

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let module_id: String = tx
            .query_row(
                "SELECT module_id FROM lessons WHERE id = ?1",
                [lesson_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or_else(|| ProgressError::LessonNotFound(lesson_id.to_string()))?;

        let progress_id = Self::ensure_module_row(&tx, user_id, &module_id, now)?;
        Self::merge_lesson_row(&tx, progress_id, lesson_id, delta, now)?;

        let was_completed: bool = tx.query_row(
            "SELECT completed_at IS NOT NULL FROM learning_progress WHERE id = ?1",
            [progress_id],
            |r| r.get(0),
        )?;
        Self::recompute_aggregate(&tx, progress_id, &module_id, now)?;

        let progress = Self::load_progress(&tx, progress_id)?;
        let lessons = Self::load_lessons(&tx, progress_id)?;
        tx.commit()?;

        let newly_completed = progress.is_completed() && !was_completed;
        if newly_completed {
            debug!(user = user_id, module = %module_id, "module completed");
        }

        Ok(ModuleProgress {
            progress,
            lessons,
            newly_completed,
        })
    }

    /// Load a user's aggregate for one module with its lesson rows, if any
    pub fn module_progress(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> Result<Option<ModuleProgress>, ProgressError> {
        let conn = self.db.conn();
        let row: Option<i64> = conn
            .query_row(
                "SELECT id FROM learning_progress WHERE user_id = ?1 AND module_id = ?2",
                [user_id, module_id],
                |r| r.get(0),
            )
            .optional()?;
        let Some(progress_id) = row else {
            return Ok(None);
        };
        let progress = Self::load_progress(&conn, progress_id)?;
        let lessons = Self::load_lessons(&conn, progress_id)?;
        Ok(Some(ModuleProgress {
            progress,
            lessons,
            newly_completed: false,
        }))
    }

    /// Lazily create the `(user, module)` aggregate row; return its id
    fn ensure_module_row(
        tx: &Transaction<'_>,
        user_id: &str,
        module_id: &str,
        now: i64,
    ) -> Result<i64, rusqlite::Error> {
        tx.execute(
            r#"INSERT INTO learning_progress (user_id, module_id, started_at)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(user_id, module_id) DO NOTHING"#,
            rusqlite::params![user_id, module_id, now],
        )?;
        tx.query_row(
            "SELECT id FROM learning_progress WHERE user_id = ?1 AND module_id = ?2",
            [user_id, module_id],
            |r| r.get(0),
        )
    }

    /// Merge the delta onto the lesson row, creating it on first access
    fn merge_lesson_row(
        tx: &Transaction<'_>,
        progress_id: i64,
        lesson_id: &str,
        delta: &LessonProgressDelta,
        now: i64,
    ) -> Result<(), rusqlite::Error> {
        let existing: Option<(bool, i64, f64, Option<f64>, Option<i64>)> = tx
            .query_row(
                "SELECT completed, time_spent_minutes, progress, score, last_accessed
                 FROM lesson_progress WHERE progress_id = ?1 AND lesson_id = ?2",
                rusqlite::params![progress_id, lesson_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .optional()?;

        let (completed, time_spent, progress, score, last_accessed) =
            existing.unwrap_or((false, 0, 0.0, None, None));

        let completed = delta.completed.unwrap_or(completed);
        let time_spent = time_spent + delta.time_spent_delta.unwrap_or(0);
        let progress = delta.progress.unwrap_or(progress);
        let score = delta.score.or(score);
        // An empty delta leaves last_accessed alone; otherwise default to now
        let last_accessed = if delta.is_empty() {
            last_accessed
        } else {
            Some(delta.last_accessed.unwrap_or(now))
        };

        tx.execute(
            r#"INSERT INTO lesson_progress
                   (progress_id, lesson_id, completed, time_spent_minutes, progress, score, last_accessed)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT(progress_id, lesson_id) DO UPDATE SET
                   completed = ?3, time_spent_minutes = ?4, progress = ?5,
                   score = ?6, last_accessed = ?7"#,
            rusqlite::params![
                progress_id,
                lesson_id,
                completed as i32,
                time_spent,
                progress,
                score,
                last_accessed,
            ],
        )?;
        Ok(())
    }

    /// Recompute the module aggregate from all lesson rows under it.
    ///
    /// `completed_at` is set when every lesson of the module is complete and
    /// is never cleared afterwards (no de-leveling).
    fn recompute_aggregate(
        tx: &Transaction<'_>,
        progress_id: i64,
        module_id: &str,
        now: i64,
    ) -> Result<(), rusqlite::Error> {
        let (total_time, avg_score): (i64, Option<f64>) = tx.query_row(
            "SELECT COALESCE(SUM(time_spent_minutes), 0), AVG(score)
             FROM lesson_progress WHERE progress_id = ?1",
            [progress_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        let total_lessons: i64 = tx.query_row(
            "SELECT COUNT(*) FROM lessons WHERE module_id = ?1",
            [module_id],
            |r| r.get(0),
        )?;
        let completed_lessons: i64 = tx.query_row(
            "SELECT COUNT(*) FROM lesson_progress lp
             JOIN lessons l ON l.id = lp.lesson_id
             WHERE lp.progress_id = ?1 AND l.module_id = ?2 AND lp.completed = 1",
            rusqlite::params![progress_id, module_id],
            |r| r.get(0),
        )?;
        let all_complete = total_lessons > 0 && completed_lessons == total_lessons;

        tx.execute(
            r#"UPDATE learning_progress
               SET time_spent_minutes = ?2,
                   score = ?3,
                   completed_at = CASE
                       WHEN completed_at IS NOT NULL THEN completed_at
                       WHEN ?4 THEN ?5
                       ELSE NULL
                   END
               WHERE id = ?1"#,
            rusqlite::params![progress_id, total_time, avg_score, all_complete, now],
        )?;
        Ok(())
    }

    fn load_progress(
        conn: &rusqlite::Connection,
        progress_id: i64,
    ) -> Result<LearningProgress, rusqlite::Error> {
        conn.query_row(
            "SELECT id, user_id, module_id, time_spent_minutes, score, completed_at, started_at
             FROM learning_progress WHERE id = ?1",
            [progress_id],
            |r| {
                Ok(LearningProgress {
                    id: r.get(0)?,
                    user_id: r.get(1)?,
                    module_id: r.get(2)?,
                    time_spent_minutes: r.get(3)?,
                    score: r.get(4)?,
                    completed_at: r.get(5)?,
                    started_at: r.get(6)?,
                })
            },
        )
    }

    fn load_lessons(
        conn: &rusqlite::Connection,
        progress_id: i64,
    ) -> Result<Vec<LessonProgress>, rusqlite::Error> {
        let mut stmt = conn.prepare(
            "SELECT progress_id, lesson_id, completed, time_spent_minutes, progress, score, last_accessed
             FROM lesson_progress WHERE progress_id = ?1 ORDER BY lesson_id ASC",
        )?;
        let rows = stmt.query_map([progress_id], |r| {
            Ok(LessonProgress {
                progress_id: r.get(0)?,
                lesson_id: r.get(1)?,
                completed: r.get::<_, i32>(2)? != 0,
                time_spent_minutes: r.get(3)?,
                progress: r.get(4)?,
                score: r.get(5)?,
                last_accessed: r.get(6)?,
            })
        })?;
        rows.collect()
    }
}

/// Reject malformed deltas before any write
fn validate_delta(delta: &LessonProgressDelta) -> Result<(), ProgressError> {
    if let Some(p) = delta.progress {
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(ProgressError::InvalidDelta(format!(
                "progress must be within [0, 1], got {p}"
            )));
        }
    }
    if let Some(t) = delta.time_spent_delta {
        if t < 0 {
            return Err(ProgressError::InvalidDelta(format!(
                "time_spent_delta must be non-negative, got {t}"
            )));
        }
    }
    if let Some(s) = delta.score {
        if !s.is_finite() {
            return Err(ProgressError::InvalidDelta("score must be finite".into()));
        }
    }
    Ok(())
}
