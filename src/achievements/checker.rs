//! Per-category achievement checks
//!
//! Pure functions over snapshot structs queried by the evaluator. Each
//! returns every id whose condition is currently satisfied; deduplication
//! against already-unlocked achievements is the ledger's job.

use super::catalog::{
    AchievementId, DEDICATED_SESSIONS, EXPLORER_TARGET, LESSON_MILESTONES, QUIZ_STREAK_WINDOW,
    REVIEW_TARGET, SEARCH_TARGET, SPEED_LESSON_TARGET, STREAK_MILESTONES,
};
use crate::models::DifficultyTier;

/// Aggregate state for exploration checks
#[derive(Debug, Clone, Default)]
pub struct ExplorationSnapshot {
    pub lessons_completed: u64,
    pub modules_completed: u64,
    pub lessons_accessed: u64,
}

/// Check first-lesson / first-module / explorer achievements
pub fn check_exploration(snap: &ExplorationSnapshot) -> Vec<AchievementId> {
    let mut satisfied = Vec::new();
    if snap.lessons_completed >= 1 {
        satisfied.push(AchievementId::FirstLesson);
    }
    if snap.modules_completed >= 1 {
        satisfied.push(AchievementId::FirstModule);
    }
    if snap.lessons_accessed >= EXPLORER_TARGET {
        satisfied.push(AchievementId::Explorer);
    }
    satisfied
}

/// Aggregate state for milestone checks
#[derive(Debug, Clone, Default)]
pub struct MilestoneSnapshot {
    pub lessons_completed: u64,
    pub modules_completed: u64,
    /// Module categories in which the user completed at least one module
    pub completed_categories: Vec<String>,
}

/// Check lesson-count, any-module and per-category milestones
pub fn check_milestones(snap: &MilestoneSnapshot) -> Vec<AchievementId> {
    let mut satisfied = Vec::new();

    for &(threshold, id) in LESSON_MILESTONES {
        if snap.lessons_completed >= threshold {
            satisfied.push(id);
        }
    }

    if snap.modules_completed >= 1 {
        satisfied.push(AchievementId::ModuleChampion);
    }

    for &(category, id) in super::catalog::CATEGORY_GOALS {
        if snap.completed_categories.iter().any(|c| c == category) {
            satisfied.push(id);
        }
    }

    satisfied
}

/// Aggregate state for consistency checks
#[derive(Debug, Clone, Default)]
pub struct ConsistencySnapshot {
    pub current_streak: u32,
    pub has_morning_session: bool,
    pub has_night_session: bool,
    pub total_sessions: u64,
}

/// Check streak, time-of-day and session-count achievements
pub fn check_consistency(snap: &ConsistencySnapshot) -> Vec<AchievementId> {
    let mut satisfied = Vec::new();

    for &(threshold, id) in STREAK_MILESTONES {
        if snap.current_streak >= threshold {
            satisfied.push(id);
        }
    }

    if snap.has_morning_session {
        satisfied.push(AchievementId::EarlyBird);
    }
    if snap.has_night_session {
        satisfied.push(AchievementId::NightOwl);
    }
    if snap.total_sessions >= DEDICATED_SESSIONS {
        satisfied.push(AchievementId::Dedicated);
    }

    satisfied
}

/// Aggregate state for excellence checks
#[derive(Debug, Clone, Default)]
pub struct ExcellenceSnapshot {
    pub has_perfect_quiz: bool,
    /// Most recent quiz results, newest first
    pub recent_quiz_results: Vec<bool>,
    /// Tiers in which every module is completed
    pub completed_tiers: Vec<DifficultyTier>,
    /// Every module of every tier completed
    pub all_modules_completed: bool,
    /// Lessons finished under their estimated time
    pub fast_lessons: u64,
}

/// Check quiz, tier-completion and speed achievements
pub fn check_excellence(snap: &ExcellenceSnapshot) -> Vec<AchievementId> {
    let mut satisfied = Vec::new();

    if snap.has_perfect_quiz {
        satisfied.push(AchievementId::PerfectQuiz);
    }
    if snap.recent_quiz_results.len() >= QUIZ_STREAK_WINDOW
        && snap.recent_quiz_results[..QUIZ_STREAK_WINDOW].iter().all(|&c| c)
    {
        satisfied.push(AchievementId::QuizStreak5);
    }

    for &(tier, id) in super::catalog::TIER_GOALS {
        if snap.completed_tiers.contains(&tier) {
            satisfied.push(id);
        }
    }
    if snap.all_modules_completed {
        satisfied.push(AchievementId::CompleteKnowledge);
    }

    if snap.fast_lessons >= SPEED_LESSON_TARGET {
        satisfied.push(AchievementId::SpeedLearner);
    }

    satisfied
}

/// Aggregate state for engagement checks
#[derive(Debug, Clone, Default)]
pub struct EngagementSnapshot {
    pub review_count: u64,
    pub search_count: u64,
    pub feedback_submitted: bool,
}

/// Check review, search and feedback achievements
pub fn check_engagement(snap: &EngagementSnapshot) -> Vec<AchievementId> {
    let mut satisfied = Vec::new();

    if snap.review_count >= REVIEW_TARGET {
        satisfied.push(AchievementId::Reviewer);
    }
    if snap.search_count >= SEARCH_TARGET {
        satisfied.push(AchievementId::SearchPro);
    }
    if snap.feedback_submitted {
        satisfied.push(AchievementId::FeedbackFriend);
    }

    satisfied
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exploration_firsts() {
        let none = check_exploration(&ExplorationSnapshot::default());
        assert!(none.is_empty());

        let snap = ExplorationSnapshot {
            lessons_completed: 1,
            modules_completed: 0,
            lessons_accessed: 5,
        };
        let got = check_exploration(&snap);
        assert!(got.contains(&AchievementId::FirstLesson));
        assert!(got.contains(&AchievementId::Explorer));
        assert!(!got.contains(&AchievementId::FirstModule));
    }

    #[test]
    fn test_milestones_cross_multiple_thresholds() {
        let snap = MilestoneSnapshot {
            lessons_completed: 25,
            modules_completed: 1,
            completed_categories: vec!["fundamentals".into()],
        };
        let got = check_milestones(&snap);
        assert!(got.contains(&AchievementId::Lessons10));
        assert!(got.contains(&AchievementId::Lessons25));
        assert!(!got.contains(&AchievementId::Lessons50));
        assert!(got.contains(&AchievementId::ModuleChampion));
        assert!(got.contains(&AchievementId::FundamentalsComplete));
        assert!(!got.contains(&AchievementId::DataComplete));
    }

    #[test]
    fn test_consistency_streaks_and_hours() {
        let snap = ConsistencySnapshot {
            current_streak: 7,
            has_morning_session: true,
            has_night_session: false,
            total_sessions: 30,
        };
        let got = check_consistency(&snap);
        assert!(got.contains(&AchievementId::Streak3));
        assert!(got.contains(&AchievementId::Streak7));
        assert!(!got.contains(&AchievementId::Streak30));
        assert!(got.contains(&AchievementId::EarlyBird));
        assert!(!got.contains(&AchievementId::NightOwl));
        assert!(got.contains(&AchievementId::Dedicated));
    }

    #[test]
    fn test_quiz_streak_requires_full_window() {
        let short = ExcellenceSnapshot {
            has_perfect_quiz: true,
            recent_quiz_results: vec![true, true, true],
            ..Default::default()
        };
        let got = check_excellence(&short);
        assert!(got.contains(&AchievementId::PerfectQuiz));
        assert!(!got.contains(&AchievementId::QuizStreak5));

        let full = ExcellenceSnapshot {
            recent_quiz_results: vec![true, true, true, true, true, false],
            ..Default::default()
        };
        // Only the newest five count; the stale sixth result is ignored
        assert!(check_excellence(&full).contains(&AchievementId::QuizStreak5));

        let broken = ExcellenceSnapshot {
            recent_quiz_results: vec![true, false, true, true, true],
            ..Default::default()
        };
        assert!(!check_excellence(&broken).contains(&AchievementId::QuizStreak5));
    }

    #[test]
    fn test_tier_and_complete_knowledge() {
        let snap = ExcellenceSnapshot {
            completed_tiers: vec![DifficultyTier::Beginner, DifficultyTier::Advanced],
            all_modules_completed: true,
            fast_lessons: 5,
            ..Default::default()
        };
        let got = check_excellence(&snap);
        assert!(got.contains(&AchievementId::TierBeginner));
        assert!(!got.contains(&AchievementId::TierIntermediate));
        assert!(got.contains(&AchievementId::TierAdvanced));
        assert!(got.contains(&AchievementId::CompleteKnowledge));
        assert!(got.contains(&AchievementId::SpeedLearner));
    }

    #[test]
    fn test_engagement_counters() {
        let snap = EngagementSnapshot {
            review_count: 5,
            search_count: 19,
            feedback_submitted: true,
        };
        let got = check_engagement(&snap);
        assert!(got.contains(&AchievementId::Reviewer));
        assert!(!got.contains(&AchievementId::SearchPro));
        assert!(got.contains(&AchievementId::FeedbackFriend));
    }
}
