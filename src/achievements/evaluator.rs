//! Achievement rule evaluation
//!
//! Maps an event to the rule categories it can affect via a declarative
//! table, queries an aggregate snapshot per category, and runs the pure
//! checkers. A failure in one category never blocks the others; evaluation
//! is advisory, so partial results are logged and returned.

use anyhow::{Context, Result};
use chrono::{DateTime, Timelike};
use tracing::warn;

use super::catalog::{
    AchievementId, MORNING_CUTOFF_HOUR, NIGHT_CUTOFF_HOUR, QUIZ_STREAK_WINDOW, RuleCategory,
};
use super::checker::{
    ConsistencySnapshot, EngagementSnapshot, ExcellenceSnapshot, ExplorationSnapshot,
    MilestoneSnapshot, check_consistency, check_engagement, check_excellence, check_exploration,
    check_milestones,
};
use crate::db::ProgressDb;
use crate::models::{DifficultyTier, EventPayload, EventType};
use crate::recorder::{COUNTER_REVIEW, COUNTER_SEARCH, SessionRecorder};
use crate::streak::compute_streak;

/// Which rule categories each event type can plausibly affect.
///
/// Adding an event type only requires an entry here.
static EVENT_RULES: &[(EventType, &[RuleCategory])] = &[
    (
        EventType::LessonCompleted,
        &[
            RuleCategory::Exploration,
            RuleCategory::Milestone,
            RuleCategory::Excellence,
        ],
    ),
    (
        EventType::LessonAccessed,
        &[RuleCategory::Exploration, RuleCategory::Engagement],
    ),
    (
        EventType::ModuleCompleted,
        &[
            RuleCategory::Exploration,
            RuleCategory::Milestone,
            RuleCategory::Excellence,
        ],
    ),
    (
        EventType::QuizCompleted,
        &[RuleCategory::Excellence],
    ),
    (
        EventType::DailyLogin,
        &[RuleCategory::Consistency],
    ),
    (
        EventType::SearchUsed,
        &[RuleCategory::Engagement],
    ),
    (
        EventType::FeedbackSubmitted,
        &[RuleCategory::Engagement],
    ),
    (
        EventType::LessonReviewed,
        &[RuleCategory::Engagement],
    ),
];

/// Rule categories relevant to an event type
pub fn categories_for(event: EventType) -> &'static [RuleCategory] {
    EVENT_RULES
        .iter()
        .find(|(e, _)| *e == event)
        .map(|(_, cats)| *cats)
        .unwrap_or(&[])
}

/// Evaluates achievement conditions against a user's aggregate state
#[derive(Clone)]
pub struct RuleEvaluator {
    db: ProgressDb,
    recorder: SessionRecorder,
}

impl RuleEvaluator {
    pub fn new(db: ProgressDb) -> Self {
        let recorder = SessionRecorder::new(db.clone());
        Self { db, recorder }
    }

    /// Return every achievement id whose condition is currently true for the
    /// user, restricted to the categories the event can affect.
    ///
    /// Prior unlock status is deliberately ignored here; the ledger
    /// deduplicates. Category failures are logged and skipped.
    pub fn evaluate(
        &self,
        user_id: &str,
        event: EventType,
        payload: &EventPayload,
    ) -> Vec<AchievementId> {
        let mut candidates = Vec::new();
        for &category in categories_for(event) {
            match self.eval_category(user_id, category, payload) {
                Ok(ids) => candidates.extend(ids),
                Err(e) => {
                    warn!(
                        user = user_id,
                        category = category.label(),
                        error = %e,
                        "achievement category evaluation failed; skipping"
                    );
                }
            }
        }
        candidates.dedup();
        candidates
    }

    fn eval_category(
        &self,
        user_id: &str,
        category: RuleCategory,
        payload: &EventPayload,
    ) -> Result<Vec<AchievementId>> {
        let ids = match category {
            RuleCategory::Exploration => {
                check_exploration(&self.exploration_snapshot(user_id, payload)?)
            }
            RuleCategory::Milestone => check_milestones(&self.milestone_snapshot(user_id, payload)?),
            RuleCategory::Consistency => check_consistency(&self.consistency_snapshot(user_id)?),
            RuleCategory::Excellence => check_excellence(&self.excellence_snapshot(user_id)?),
            RuleCategory::Engagement => {
                check_engagement(&self.engagement_snapshot(user_id, payload)?)
            }
        };
        Ok(ids)
    }

    // ========================================
    // SNAPSHOT QUERIES
    // ========================================

    pub fn exploration_snapshot(
        &self,
        user_id: &str,
        payload: &EventPayload,
    ) -> Result<ExplorationSnapshot> {
        let conn = self.db.conn();
        let lessons_completed: u64 = conn.query_row(
            "SELECT COUNT(*) FROM lesson_progress lp
             JOIN learning_progress p ON p.id = lp.progress_id
             WHERE p.user_id = ?1 AND lp.completed = 1",
            [user_id],
            |r| r.get(0),
        )?;
        let lessons_accessed: u64 = conn.query_row(
            "SELECT COUNT(DISTINCT lp.lesson_id) FROM lesson_progress lp
             JOIN learning_progress p ON p.id = lp.progress_id
             WHERE p.user_id = ?1 AND lp.last_accessed IS NOT NULL",
            [user_id],
            |r| r.get(0),
        )?;
        let modules_completed = Self::folded_modules_completed(&conn, user_id, payload)?;
        Ok(ExplorationSnapshot {
            lessons_completed,
            modules_completed,
            lessons_accessed,
        })
    }

    pub fn milestone_snapshot(
        &self,
        user_id: &str,
        payload: &EventPayload,
    ) -> Result<MilestoneSnapshot> {
        let conn = self.db.conn();
        let lessons_completed: u64 = conn.query_row(
            "SELECT COUNT(*) FROM lesson_progress lp
             JOIN learning_progress p ON p.id = lp.progress_id
             WHERE p.user_id = ?1 AND lp.completed = 1",
            [user_id],
            |r| r.get(0),
        )?;
        let modules_completed = Self::folded_modules_completed(&conn, user_id, payload)?;

        let mut stmt = conn.prepare(
            "SELECT DISTINCT m.category FROM learning_progress p
             JOIN modules m ON m.id = p.module_id
             WHERE p.user_id = ?1 AND p.completed_at IS NOT NULL",
        )?;
        let completed_categories: Vec<String> = stmt
            .query_map([user_id], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(MilestoneSnapshot {
            lessons_completed,
            modules_completed,
            completed_categories,
        })
    }

    pub fn consistency_snapshot(&self, user_id: &str) -> Result<ConsistencySnapshot> {
        let starts = self
            .recorder
            .session_start_times(user_id)
            .context("failed to load session history")?;

        let mut has_morning_session = false;
        let mut has_night_session = false;
        for &ts in &starts {
            if let Some(dt) = DateTime::from_timestamp_millis(ts) {
                let hour = dt.hour();
                if hour < MORNING_CUTOFF_HOUR {
                    has_morning_session = true;
                }
                if hour >= NIGHT_CUTOFF_HOUR {
                    has_night_session = true;
                }
            }
        }

        Ok(ConsistencySnapshot {
            current_streak: compute_streak(&starts),
            has_morning_session,
            has_night_session,
            total_sessions: starts.len() as u64,
        })
    }

    pub fn excellence_snapshot(&self, user_id: &str) -> Result<ExcellenceSnapshot> {
        let recent_quiz_results = self
            .recorder
            .recent_quiz_results(user_id, QUIZ_STREAK_WINDOW)
            .context("failed to load quiz history")?;

        let conn = self.db.conn();
        let has_perfect_quiz: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM quiz_attempts WHERE user_id = ?1 AND is_correct = 1)",
            [user_id],
            |r| r.get(0),
        )?;

        let mut completed_tiers = Vec::new();
        let mut any_modules = false;
        let mut all_modules_completed = true;
        for &tier in DifficultyTier::all() {
            let (total, done): (u64, u64) = conn.query_row(
                "SELECT COUNT(*),
                        COUNT(p.id)
                 FROM modules m
                 LEFT JOIN learning_progress p
                     ON p.module_id = m.id AND p.user_id = ?1 AND p.completed_at IS NOT NULL
                 WHERE m.tier = ?2",
                rusqlite::params![user_id, tier.as_str()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            if total > 0 {
                any_modules = true;
                if done == total {
                    completed_tiers.push(tier);
                } else {
                    all_modules_completed = false;
                }
            }
        }
        let all_modules_completed = any_modules && all_modules_completed;

        // Zero-minute completions are untracked time, not speed
        let fast_lessons: u64 = conn.query_row(
            "SELECT COUNT(*) FROM lesson_progress lp
             JOIN learning_progress p ON p.id = lp.progress_id
             JOIN lessons l ON l.id = lp.lesson_id
             WHERE p.user_id = ?1 AND lp.completed = 1
               AND lp.time_spent_minutes > 0
               AND lp.time_spent_minutes < l.estimated_minutes",
            [user_id],
            |r| r.get(0),
        )?;

        Ok(ExcellenceSnapshot {
            has_perfect_quiz,
            recent_quiz_results,
            completed_tiers,
            all_modules_completed,
            fast_lessons,
        })
    }

    pub fn engagement_snapshot(
        &self,
        user_id: &str,
        payload: &EventPayload,
    ) -> Result<EngagementSnapshot> {
        Ok(EngagementSnapshot {
            review_count: self.recorder.counter(user_id, COUNTER_REVIEW)? as u64,
            search_count: self.recorder.counter(user_id, COUNTER_SEARCH)? as u64,
            feedback_submitted: payload.feedback_submitted,
        })
    }

    /// Completed-module count straight from the store (for the dispatcher's
    /// payload fold)
    pub fn modules_completed_count(&self, user_id: &str) -> Result<u64> {
        let conn = self.db.conn();
        Self::modules_completed(&conn, user_id)
    }

    /// Completed-module count, preferring state the dispatcher folded into
    /// the payload over a fresh query.
    fn folded_modules_completed(
        conn: &rusqlite::Connection,
        user_id: &str,
        payload: &EventPayload,
    ) -> Result<u64> {
        if let Some(count) = payload.modules_completed_count {
            return Ok(count);
        }
        let count = Self::modules_completed(conn, user_id)?;
        // The completion flag comes out of the update transaction; honor it
        // even when the count itself was not folded
        if payload.module_completed == Some(true) {
            return Ok(count.max(1));
        }
        Ok(count)
    }

    fn modules_completed(conn: &rusqlite::Connection, user_id: &str) -> Result<u64> {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM learning_progress
             WHERE user_id = ?1 AND completed_at IS NOT NULL",
            [user_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentStore;
    use crate::models::{LessonProgressDelta, LessonRecord, ModuleRecord, QuizAttempt};
    use crate::progress::ProgressTracker;

    fn fixture() -> (ProgressDb, RuleEvaluator) {
        let db = ProgressDb::open_in_memory().unwrap();
        let content = ContentStore::new(db.clone());
        content
            .upsert_module(&ModuleRecord {
                id: "m1".into(),
                category: "fundamentals".into(),
                tier: DifficultyTier::Beginner,
                order_index: 0,
                prerequisites: vec![],
            })
            .unwrap();
        content
            .upsert_lesson(&LessonRecord {
                id: "l1".into(),
                module_id: "m1".into(),
                order_index: 0,
                estimated_minutes: 10,
            })
            .unwrap();
        let evaluator = RuleEvaluator::new(db.clone());
        (db, evaluator)
    }

    #[test]
    fn test_event_table_covers_all_event_types() {
        for &event in &[
            EventType::LessonCompleted,
            EventType::LessonAccessed,
            EventType::ModuleCompleted,
            EventType::QuizCompleted,
            EventType::DailyLogin,
            EventType::SearchUsed,
            EventType::FeedbackSubmitted,
            EventType::LessonReviewed,
        ] {
            assert!(
                !categories_for(event).is_empty(),
                "no categories for {}",
                event.as_str()
            );
        }
    }

    #[test]
    fn test_quiz_events_skip_consistency() {
        assert!(!categories_for(EventType::QuizCompleted).contains(&RuleCategory::Consistency));
        assert!(categories_for(EventType::DailyLogin).contains(&RuleCategory::Consistency));
    }

    #[test]
    fn test_first_lesson_candidate_after_completion() {
        let (db, evaluator) = fixture();
        let tracker = ProgressTracker::new(db);
        tracker
            .update_lesson_progress(
                "u1",
                "l1",
                &LessonProgressDelta {
                    completed: Some(true),
                    time_spent_delta: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();

        let got = evaluator.evaluate("u1", EventType::LessonCompleted, &EventPayload::default());
        assert!(got.contains(&AchievementId::FirstLesson));
        // Single-lesson module is now complete, so module milestones fire too
        assert!(got.contains(&AchievementId::FirstModule));
        assert!(got.contains(&AchievementId::ModuleChampion));
        assert!(got.contains(&AchievementId::FundamentalsComplete));
        // Evaluation ignores unlock status: a second run reports them again
        let again = evaluator.evaluate("u1", EventType::LessonCompleted, &EventPayload::default());
        assert_eq!(got, again);
    }

    #[test]
    fn test_snapshots_prefer_folded_payload_state() {
        let (_db, evaluator) = fixture();

        // The folded count replaces the store query
        let with_count = EventPayload {
            modules_completed_count: Some(3),
            ..Default::default()
        };
        let snap = evaluator.milestone_snapshot("u1", &with_count).unwrap();
        assert_eq!(snap.modules_completed, 3);
        assert!(check_milestones(&snap).contains(&AchievementId::ModuleChampion));

        // The completion flag alone still guarantees at least one module
        let flag_only = EventPayload {
            module_completed: Some(true),
            ..Default::default()
        };
        let snap = evaluator.exploration_snapshot("u1", &flag_only).unwrap();
        assert_eq!(snap.modules_completed, 1);

        // Without folded state the store is the source of truth
        let snap = evaluator
            .exploration_snapshot("u1", &EventPayload::default())
            .unwrap();
        assert_eq!(snap.modules_completed, 0);
    }

    #[test]
    fn test_excellence_snapshot_quiz_state() {
        let (db, evaluator) = fixture();
        let recorder = SessionRecorder::new(db);
        for i in 0..5 {
            recorder
                .record_quiz_attempt(&QuizAttempt {
                    user_id: "u1".into(),
                    quiz_id: format!("q{i}"),
                    is_correct: true,
                    attempted_at: 1000 + i,
                })
                .unwrap();
        }
        let snap = evaluator.excellence_snapshot("u1").unwrap();
        assert!(snap.has_perfect_quiz);
        assert_eq!(snap.recent_quiz_results.len(), 5);
        let got = evaluator.evaluate("u1", EventType::QuizCompleted, &EventPayload::default());
        assert!(got.contains(&AchievementId::PerfectQuiz));
        assert!(got.contains(&AchievementId::QuizStreak5));
    }

    #[test]
    fn test_tier_completion_requires_every_module() {
        let (db, evaluator) = fixture();
        let content = ContentStore::new(db.clone());
        content
            .upsert_module(&ModuleRecord {
                id: "m2".into(),
                category: "data".into(),
                tier: DifficultyTier::Beginner,
                order_index: 1,
                prerequisites: vec![],
            })
            .unwrap();
        content
            .upsert_lesson(&LessonRecord {
                id: "l2".into(),
                module_id: "m2".into(),
                order_index: 0,
                estimated_minutes: 10,
            })
            .unwrap();

        let tracker = ProgressTracker::new(db);
        let done = LessonProgressDelta {
            completed: Some(true),
            time_spent_delta: Some(5),
            ..Default::default()
        };
        tracker.update_lesson_progress("u1", "l1", &done).unwrap();

        let snap = evaluator.excellence_snapshot("u1").unwrap();
        assert!(snap.completed_tiers.is_empty());
        assert!(!snap.all_modules_completed);

        tracker.update_lesson_progress("u1", "l2", &done).unwrap();
        let snap = evaluator.excellence_snapshot("u1").unwrap();
        assert_eq!(snap.completed_tiers, vec![DifficultyTier::Beginner]);
        assert!(snap.all_modules_completed);
    }
}
