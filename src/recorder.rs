//! Session recorder - writes activity history to the database
//!
//! Handles recording of daily sessions, quiz attempts and engagement
//! counters. These rows are the inputs for streak, consistency and
//! engagement achievement checks.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::db::ProgressDb;
use crate::models::QuizAttempt;

/// Counter name for search usage
pub const COUNTER_SEARCH: &str = "search";
/// Counter name for post-completion lesson reviews
pub const COUNTER_REVIEW: &str = "review";

/// Records activity history to the database
#[derive(Clone)]
pub struct SessionRecorder {
    db: ProgressDb,
}

impl SessionRecorder {
    pub fn new(db: ProgressDb) -> Self {
        Self { db }
    }

    /// Ensure a session row exists for the user's calendar day.
    ///
    /// The row id is `user:YYYY-MM-DD`, so repeated logins on the same day
    /// collapse into one session. Returns the session id.
    pub fn record_login(&self, user_id: &str, login_time_ms: i64) -> Result<String> {
        let id = session_id(user_id, login_time_ms);
        let conn = self.db.conn();
        conn.execute(
            r#"INSERT INTO learning_sessions (id, user_id, start_time)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(id) DO NOTHING"#,
            rusqlite::params![id, user_id, login_time_ms],
        )?;
        Ok(id)
    }

    /// Count a lesson view against today's session (creating it if needed)
    pub fn note_lesson_viewed(&self, user_id: &str, now_ms: i64) -> Result<()> {
        let id = session_id(user_id, now_ms);
        let conn = self.db.conn();
        conn.execute(
            r#"INSERT INTO learning_sessions (id, user_id, start_time, lessons_viewed)
               VALUES (?1, ?2, ?3, 1)
               ON CONFLICT(id) DO UPDATE SET lessons_viewed = lessons_viewed + 1"#,
            rusqlite::params![id, user_id, now_ms],
        )?;
        Ok(())
    }

    /// Append a quiz attempt and count it against today's session
    pub fn record_quiz_attempt(&self, attempt: &QuizAttempt) -> Result<()> {
        let id = session_id(&attempt.user_id, attempt.attempted_at);
        let conn = self.db.conn();
        conn.execute(
            r#"INSERT INTO quiz_attempts (user_id, quiz_id, is_correct, attempted_at)
               VALUES (?1, ?2, ?3, ?4)"#,
            rusqlite::params![
                attempt.user_id,
                attempt.quiz_id,
                attempt.is_correct as i32,
                attempt.attempted_at,
            ],
        )?;
        conn.execute(
            r#"INSERT INTO learning_sessions (id, user_id, start_time, quizzes_taken)
               VALUES (?1, ?2, ?3, 1)
               ON CONFLICT(id) DO UPDATE SET quizzes_taken = quizzes_taken + 1"#,
            rusqlite::params![id, attempt.user_id, attempt.attempted_at],
        )?;
        Ok(())
    }

    /// Increment a named engagement counter for the user
    pub fn bump_counter(&self, user_id: &str, counter: &str, now_ms: i64) -> Result<()> {
        let conn = self.db.conn();
        conn.execute(
            r#"INSERT INTO engagement_counters (user_id, counter, count, updated_at)
               VALUES (?1, ?2, 1, ?3)
               ON CONFLICT(user_id, counter) DO UPDATE SET
                   count = count + 1, updated_at = ?3"#,
            rusqlite::params![user_id, counter, now_ms],
        )?;
        Ok(())
    }

    /// Read a named engagement counter (0 if never bumped)
    pub fn counter(&self, user_id: &str, counter: &str) -> Result<i64> {
        let conn = self.db.conn();
        let count: i64 = conn
            .query_row(
                "SELECT count FROM engagement_counters WHERE user_id = ?1 AND counter = ?2",
                [user_id, counter],
                |r| r.get(0),
            )
            .unwrap_or(0);
        Ok(count)
    }

    /// Session start timestamps for a user, most recent first
    pub fn session_start_times(&self, user_id: &str) -> Result<Vec<i64>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT start_time FROM learning_sessions WHERE user_id = ?1 ORDER BY start_time DESC",
        )?;
        let rows = stmt.query_map([user_id], |row| row.get(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Most recent quiz results for a user, newest first
    pub fn recent_quiz_results(&self, user_id: &str, limit: usize) -> Result<Vec<bool>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT is_correct FROM quiz_attempts WHERE user_id = ?1
             ORDER BY attempted_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![user_id, limit as i64], |row| {
            row.get::<_, i32>(0).map(|v| v != 0)
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

/// Derive the per-day session id for a user and timestamp
pub fn session_id(user_id: &str, timestamp_ms: i64) -> String {
    let dt = DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now);
    format!("{}:{}", user_id, dt.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> SessionRecorder {
        SessionRecorder::new(ProgressDb::open_in_memory().unwrap())
    }

    #[test]
    fn test_one_session_per_day() {
        let rec = recorder();
        // 2023-11-15 01:00:00 UTC — safely inside a single UTC day
        let morning = 1_700_010_000_000i64;
        let later = morning + 3 * 60 * 60 * 1000;
        rec.record_login("u1", morning).unwrap();
        rec.record_login("u1", later).unwrap();
        let times = rec.session_start_times("u1").unwrap();
        assert_eq!(times.len(), 1);
        // First login of the day wins the start time
        assert_eq!(times[0], morning);
    }

    #[test]
    fn test_quiz_attempts_are_append_only() {
        let rec = recorder();
        for (i, correct) in [true, false, true].into_iter().enumerate() {
            rec.record_quiz_attempt(&QuizAttempt {
                user_id: "u1".into(),
                quiz_id: "q1".into(),
                is_correct: correct,
                attempted_at: 1000 + i as i64,
            })
            .unwrap();
        }
        let recent = rec.recent_quiz_results("u1", 5).unwrap();
        assert_eq!(recent, vec![true, false, true]);
        let recent2 = rec.recent_quiz_results("u1", 2).unwrap();
        assert_eq!(recent2, vec![true, false]);
    }

    #[test]
    fn test_counters_accumulate() {
        let rec = recorder();
        assert_eq!(rec.counter("u1", COUNTER_SEARCH).unwrap(), 0);
        rec.bump_counter("u1", COUNTER_SEARCH, 1).unwrap();
        rec.bump_counter("u1", COUNTER_SEARCH, 2).unwrap();
        rec.bump_counter("u1", COUNTER_REVIEW, 3).unwrap();
        assert_eq!(rec.counter("u1", COUNTER_SEARCH).unwrap(), 2);
        assert_eq!(rec.counter("u1", COUNTER_REVIEW).unwrap(), 1);
    }

    #[test]
    fn test_session_id_format() {
        // 2023-12-28 12:34:56 UTC
        assert_eq!(session_id("u1", 1703766896000), "u1:2023-12-28");
    }
}
