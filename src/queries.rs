//! Read-only dashboard queries
//!
//! Progress-toward-threshold is computed by re-running the category counting
//! queries and comparing against the catalog targets; nothing here mutates
//! state.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::achievements::catalog::QUIZ_STREAK_WINDOW;
use crate::achievements::{AchievementCatalog, AchievementId, AchievementLedger, RuleEvaluator};
use crate::db::ProgressDb;
use crate::models::{EventPayload, ProgressSummary};
use crate::streak::compute_streak;

/// One catalog entry with the user's unlock status and progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementStatus {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub points: u32,
    pub unlocked: bool,
    pub unlocked_at: Option<i64>,
    /// Current value of the underlying counter
    pub current: u64,
    /// Threshold to unlock, when the achievement is progressive
    pub target: Option<u64>,
}

/// Query interface for dashboard endpoints
#[derive(Clone)]
pub struct ProgressQuery {
    db: ProgressDb,
    catalog: Arc<AchievementCatalog>,
    evaluator: RuleEvaluator,
    ledger: AchievementLedger,
}

impl ProgressQuery {
    pub fn new(db: ProgressDb, catalog: Arc<AchievementCatalog>) -> Self {
        let evaluator = RuleEvaluator::new(db.clone());
        let ledger = AchievementLedger::new(db.clone(), catalog.clone());
        Self {
            db,
            catalog,
            evaluator,
            ledger,
        }
    }

    /// Per-user progress totals
    pub fn summary(&self, user_id: &str) -> Result<ProgressSummary> {
        let exploration = self
            .evaluator
            .exploration_snapshot(user_id, &EventPayload::default())?;
        let consistency = self.evaluator.consistency_snapshot(user_id)?;

        let conn = self.db.conn();
        let total_minutes: i64 = conn.query_row(
            "SELECT COALESCE(SUM(time_spent_minutes), 0) FROM learning_progress WHERE user_id = ?1",
            [user_id],
            |r| r.get(0),
        )?;
        let (achievements_unlocked, total_points): (u64, u64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(points), 0) FROM achievements WHERE user_id = ?1",
            [user_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        Ok(ProgressSummary {
            lessons_completed: exploration.lessons_completed,
            modules_completed: exploration.modules_completed,
            total_minutes,
            total_sessions: consistency.total_sessions,
            current_streak: consistency.current_streak,
            achievements_unlocked,
            total_points,
        })
    }

    /// A user's unlocked achievements, newest first
    pub fn unlocked(&self, user_id: &str) -> Result<Vec<crate::models::AchievementRecord>> {
        self.ledger.unlocked(user_id)
    }

    /// Every catalog achievement with unlock status and progress toward its
    /// threshold, for the achievements dashboard.
    pub fn achievement_overview(&self, user_id: &str) -> Result<Vec<AchievementStatus>> {
        let unlocked = self.ledger.unlocked(user_id)?;

        let no_event = EventPayload::default();
        let exploration = self.evaluator.exploration_snapshot(user_id, &no_event)?;
        let milestones = self.evaluator.milestone_snapshot(user_id, &no_event)?;
        let consistency = self.evaluator.consistency_snapshot(user_id)?;
        let excellence = self.evaluator.excellence_snapshot(user_id)?;
        let engagement = self.evaluator.engagement_snapshot(user_id, &no_event)?;

        let quiz_run = excellence
            .recent_quiz_results
            .iter()
            .take(QUIZ_STREAK_WINDOW)
            .take_while(|&&c| c)
            .count() as u64;

        let mut overview = Vec::with_capacity(self.catalog.len());
        for def in self.catalog.iter() {
            let unlocked_at = unlocked
                .iter()
                .find(|a| a.achievement_type == def.id.as_str())
                .map(|a| a.unlocked_at);

            let current = match def.id {
                AchievementId::FirstLesson => exploration.lessons_completed,
                AchievementId::FirstModule => exploration.modules_completed,
                AchievementId::Explorer => exploration.lessons_accessed,
                AchievementId::Lessons10 | AchievementId::Lessons25 | AchievementId::Lessons50 => {
                    milestones.lessons_completed
                }
                AchievementId::ModuleChampion => milestones.modules_completed,
                AchievementId::FundamentalsComplete => {
                    category_done(&milestones.completed_categories, "fundamentals")
                }
                AchievementId::FrameworksComplete => {
                    category_done(&milestones.completed_categories, "frameworks")
                }
                AchievementId::DataComplete => {
                    category_done(&milestones.completed_categories, "data")
                }
                AchievementId::Streak3 | AchievementId::Streak7 | AchievementId::Streak30 => {
                    consistency.current_streak as u64
                }
                AchievementId::EarlyBird => consistency.has_morning_session as u64,
                AchievementId::NightOwl => consistency.has_night_session as u64,
                AchievementId::Dedicated => consistency.total_sessions,
                AchievementId::PerfectQuiz => excellence.has_perfect_quiz as u64,
                AchievementId::QuizStreak5 => quiz_run,
                AchievementId::TierBeginner => {
                    tier_done(&excellence.completed_tiers, crate::models::DifficultyTier::Beginner)
                }
                AchievementId::TierIntermediate => tier_done(
                    &excellence.completed_tiers,
                    crate::models::DifficultyTier::Intermediate,
                ),
                AchievementId::TierAdvanced => {
                    tier_done(&excellence.completed_tiers, crate::models::DifficultyTier::Advanced)
                }
                AchievementId::CompleteKnowledge => excellence.all_modules_completed as u64,
                AchievementId::SpeedLearner => excellence.fast_lessons,
                AchievementId::Reviewer => engagement.review_count,
                AchievementId::SearchPro => engagement.search_count,
                AchievementId::FeedbackFriend => unlocked_at.is_some() as u64,
            };

            overview.push(AchievementStatus {
                id: def.id.as_str().to_string(),
                title: def.title.to_string(),
                description: def.description.to_string(),
                category: def.category.label().to_string(),
                points: def.points,
                unlocked: unlocked_at.is_some(),
                unlocked_at,
                current,
                target: def.target.map(u64::from),
            });
        }
        Ok(overview)
    }

    /// Current streak for a user (dashboard widget)
    pub fn current_streak(&self, user_id: &str) -> Result<u32> {
        let recorder = crate::recorder::SessionRecorder::new(self.db.clone());
        let starts = recorder.session_start_times(user_id)?;
        Ok(compute_streak(&starts))
    }
}

fn category_done(completed: &[String], category: &str) -> u64 {
    completed.iter().any(|c| c == category) as u64
}

fn tier_done(completed: &[crate::models::DifficultyTier], tier: crate::models::DifficultyTier) -> u64 {
    completed.contains(&tier) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentStore;
    use crate::dispatcher::{EventDispatcher, completion_delta};
    use crate::models::{
        DifficultyTier, EventPayload, EventType, LessonRecord, ModuleRecord,
    };

    fn fixture() -> (ProgressQuery, EventDispatcher) {
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
        for (i, id) in ["l1", "l2"].iter().enumerate() {
            content
                .upsert_lesson(&LessonRecord {
                    id: id.to_string(),
                    module_id: "m1".into(),
                    order_index: i as u32,
                    estimated_minutes: 10,
                })
                .unwrap();
        }
        let catalog = Arc::new(AchievementCatalog::default_catalog());
        (
            ProgressQuery::new(db.clone(), catalog.clone()),
            EventDispatcher::new(db, catalog),
        )
    }

    #[test]
    fn test_overview_covers_whole_catalog() {
        let (query, _) = fixture();
        let overview = query.achievement_overview("u1").unwrap();
        assert_eq!(overview.len(), AchievementCatalog::default_catalog().len());
        assert!(overview.iter().all(|s| !s.unlocked && s.current == 0));
    }

    #[test]
    fn test_overview_tracks_progress_and_unlocks() {
        let (query, dispatcher) = fixture();
        dispatcher
            .handle_event(
                "u1",
                EventType::LessonCompleted,
                &EventPayload {
                    lesson_id: Some("l1".into()),
                    delta: Some(completion_delta(5)),
                    ..Default::default()
                },
            )
            .unwrap();

        let overview = query.achievement_overview("u1").unwrap();
        let first = overview.iter().find(|s| s.id == "first_lesson").unwrap();
        assert!(first.unlocked);
        assert_eq!(first.current, 1);

        let ten = overview.iter().find(|s| s.id == "lessons_10").unwrap();
        assert!(!ten.unlocked);
        assert_eq!(ten.current, 1);
        assert_eq!(ten.target, Some(10));
    }

    #[test]
    fn test_summary_totals() {
        let (query, dispatcher) = fixture();
        for id in ["l1", "l2"] {
            dispatcher
                .handle_event(
                    "u1",
                    EventType::LessonCompleted,
                    &EventPayload {
                        lesson_id: Some(id.into()),
                        delta: Some(completion_delta(10)),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        let summary = query.summary("u1").unwrap();
        assert_eq!(summary.lessons_completed, 2);
        assert_eq!(summary.modules_completed, 1);
        assert_eq!(summary.total_minutes, 20);
        assert!(summary.achievements_unlocked >= 2);
        assert!(summary.total_points > 0);
    }
}
