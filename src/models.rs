//! Data models for learning progress tracking
//!
//! These structures represent the data stored in and queried from the
//! progress database.

use serde::{Deserialize, Serialize};

/// Difficulty tier of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Beginner,
    Intermediate,
    Advanced,
}

impl DifficultyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }

    pub fn all() -> &'static [DifficultyTier] {
        &[Self::Beginner, Self::Intermediate, Self::Advanced]
    }
}

/// A course module. Read-only to the engine; seeded by the content service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: String,
    pub category: String,
    pub tier: DifficultyTier,
    pub order_index: u32,
    /// Module ids that must be completed before this one
    pub prerequisites: Vec<String>,
}

/// A lesson belonging to a module. Read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonRecord {
    pub id: String,
    pub module_id: String,
    pub order_index: u32,
    /// Estimated time to complete, in minutes
    pub estimated_minutes: u32,
}

/// Per-user-per-module aggregate progress (one row per `(user_id, module_id)`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningProgress {
    /// Row id, referenced by [`LessonProgress::progress_id`]
    pub id: i64,
    pub user_id: String,
    pub module_id: String,
    /// Sum of lesson time across the module, in minutes
    pub time_spent_minutes: i64,
    /// Average of lesson scores that exist, if any
    pub score: Option<f64>,
    /// Set exactly when every lesson of the module is complete; never cleared
    pub completed_at: Option<i64>,
    pub started_at: i64,
}

impl LearningProgress {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Per-user-per-lesson progress, the leaf unit aggregated into
/// [`LearningProgress`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonProgress {
    pub progress_id: i64,
    pub lesson_id: String,
    pub completed: bool,
    /// Monotonically non-decreasing, in minutes
    pub time_spent_minutes: i64,
    /// Fraction in [0, 1]
    pub progress: f64,
    pub score: Option<f64>,
    pub last_accessed: Option<i64>,
}

/// Partial update applied to a lesson's progress row.
///
/// Fields left as `None` preserve the stored value. `time_spent_delta` is
/// additive; all other fields are absolute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonProgressDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<i64>,
}

impl LessonProgressDelta {
    /// True if no field is present (nothing to merge)
    pub fn is_empty(&self) -> bool {
        self.progress.is_none()
            && self.completed.is_none()
            && self.time_spent_delta.is_none()
            && self.score.is_none()
            && self.last_accessed.is_none()
    }
}

/// Refreshed module-level state returned by a lesson progress update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleProgress {
    pub progress: LearningProgress,
    pub lessons: Vec<LessonProgress>,
    /// True when this update transitioned the module to completed
    pub newly_completed: bool,
}

/// One row per user per calendar day (id derived from user + day)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSession {
    pub id: String,
    pub user_id: String,
    pub start_time: i64,
    pub lessons_viewed: u32,
    pub quizzes_taken: u32,
}

/// Append-only record of a single quiz submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub user_id: String,
    pub quiz_id: String,
    pub is_correct: bool,
    pub attempted_at: i64,
}

/// Unlock ledger row (unique per `(user_id, achievement_type)`).
///
/// Title, description and points are copied from the catalog at unlock time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementRecord {
    pub user_id: String,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    pub points: u32,
    pub unlocked_at: i64,
}

/// External triggers recognized by the event dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    LessonCompleted,
    LessonAccessed,
    ModuleCompleted,
    QuizCompleted,
    DailyLogin,
    SearchUsed,
    FeedbackSubmitted,
    LessonReviewed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LessonCompleted => "LESSON_COMPLETED",
            Self::LessonAccessed => "LESSON_ACCESSED",
            Self::ModuleCompleted => "MODULE_COMPLETED",
            Self::QuizCompleted => "QUIZ_COMPLETED",
            Self::DailyLogin => "DAILY_LOGIN",
            Self::SearchUsed => "SEARCH_USED",
            Self::FeedbackSubmitted => "FEEDBACK_SUBMITTED",
            Self::LessonReviewed => "LESSON_REVIEWED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "LESSON_COMPLETED" => Some(Self::LessonCompleted),
            "LESSON_ACCESSED" => Some(Self::LessonAccessed),
            "MODULE_COMPLETED" => Some(Self::ModuleCompleted),
            "QUIZ_COMPLETED" => Some(Self::QuizCompleted),
            "DAILY_LOGIN" => Some(Self::DailyLogin),
            "SEARCH_USED" => Some(Self::SearchUsed),
            "FEEDBACK_SUBMITTED" => Some(Self::FeedbackSubmitted),
            "LESSON_REVIEWED" => Some(Self::LessonReviewed),
            _ => None,
        }
    }
}

/// Event payload accompanying a trigger.
///
/// Fields vary by event type; unknown fields from the transport layer are
/// ignored. The dispatcher folds fresh aggregate state (`module_completed`,
/// `modules_completed_count`) into the payload before rule evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<LessonProgressDelta>,
    /// Login timestamp in ms; defaults to "now" when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_time: Option<i64>,
    #[serde(default)]
    pub feedback_submitted: bool,

    // Folded in by the dispatcher after a progress update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules_completed_count: Option<u64>,
}

/// Per-user progress totals for the dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub lessons_completed: u64,
    pub modules_completed: u64,
    pub total_minutes: i64,
    pub total_sessions: u64,
    pub current_streak: u32,
    pub achievements_unlocked: u64,
    pub total_points: u64,
}
