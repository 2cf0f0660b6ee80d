//! Achievement catalog and threshold tables
//!
//! The catalog is immutable configuration injected into the evaluator and
//! ledger at construction time, never process-wide mutable state. Unlock
//! conditions live in the threshold tables below; the checkers only walk
//! them.

use serde::{Deserialize, Serialize};

use crate::models::DifficultyTier;

/// Unique identifier for each achievement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    // Exploration
    FirstLesson,
    FirstModule,
    Explorer,

    // Milestones
    Lessons10,
    Lessons25,
    Lessons50,
    ModuleChampion,
    FundamentalsComplete,
    FrameworksComplete,
    DataComplete,

    // Consistency
    Streak3,
    Streak7,
    Streak30,
    EarlyBird,
    NightOwl,
    Dedicated,

    // Excellence
    PerfectQuiz,
    QuizStreak5,
    TierBeginner,
    TierIntermediate,
    TierAdvanced,
    CompleteKnowledge,
    SpeedLearner,

    // Engagement
    Reviewer,
    SearchPro,
    FeedbackFriend,
}

impl AchievementId {
    /// Get the string id for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstLesson => "first_lesson",
            Self::FirstModule => "first_module",
            Self::Explorer => "explorer",
            Self::Lessons10 => "lessons_10",
            Self::Lessons25 => "lessons_25",
            Self::Lessons50 => "lessons_50",
            Self::ModuleChampion => "module_champion",
            Self::FundamentalsComplete => "fundamentals_complete",
            Self::FrameworksComplete => "frameworks_complete",
            Self::DataComplete => "data_complete",
            Self::Streak3 => "streak_3",
            Self::Streak7 => "streak_7",
            Self::Streak30 => "streak_30",
            Self::EarlyBird => "early_bird",
            Self::NightOwl => "night_owl",
            Self::Dedicated => "dedicated",
            Self::PerfectQuiz => "perfect_quiz",
            Self::QuizStreak5 => "quiz_streak_5",
            Self::TierBeginner => "tier_beginner",
            Self::TierIntermediate => "tier_intermediate",
            Self::TierAdvanced => "tier_advanced",
            Self::CompleteKnowledge => "complete_knowledge",
            Self::SpeedLearner => "speed_learner",
            Self::Reviewer => "reviewer",
            Self::SearchPro => "search_pro",
            Self::FeedbackFriend => "feedback_friend",
        }
    }

    /// Parse from database string
    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|id| id.as_str() == s)
    }

    /// Get all achievement ids
    pub fn all() -> &'static [AchievementId] {
        &[
            Self::FirstLesson,
            Self::FirstModule,
            Self::Explorer,
            Self::Lessons10,
            Self::Lessons25,
            Self::Lessons50,
            Self::ModuleChampion,
            Self::FundamentalsComplete,
            Self::FrameworksComplete,
            Self::DataComplete,
            Self::Streak3,
            Self::Streak7,
            Self::Streak30,
            Self::EarlyBird,
            Self::NightOwl,
            Self::Dedicated,
            Self::PerfectQuiz,
            Self::QuizStreak5,
            Self::TierBeginner,
            Self::TierIntermediate,
            Self::TierAdvanced,
            Self::CompleteKnowledge,
            Self::SpeedLearner,
            Self::Reviewer,
            Self::SearchPro,
            Self::FeedbackFriend,
        ]
    }
}

/// Rule categories; each consults a different slice of aggregate state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Exploration,
    Milestone,
    Consistency,
    Excellence,
    Engagement,
}

impl RuleCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exploration => "Exploration",
            Self::Milestone => "Milestones",
            Self::Consistency => "Consistency",
            Self::Excellence => "Excellence",
            Self::Engagement => "Engagement",
        }
    }
}

/// Achievement definition with display metadata
#[derive(Debug, Clone)]
pub struct AchievementDef {
    pub id: AchievementId,
    pub title: &'static str,
    pub description: &'static str,
    pub category: RuleCategory,
    pub points: u32,
    /// For progressive achievements, the target count
    pub target: Option<u32>,
}

// ============================================
// THRESHOLD TABLES (data, not branching logic)
// ============================================

/// Cumulative completed-lesson milestones
pub const LESSON_MILESTONES: &[(u64, AchievementId)] = &[
    (10, AchievementId::Lessons10),
    (25, AchievementId::Lessons25),
    (50, AchievementId::Lessons50),
];

/// Daily streak milestones
pub const STREAK_MILESTONES: &[(u32, AchievementId)] = &[
    (3, AchievementId::Streak3),
    (7, AchievementId::Streak7),
    (30, AchievementId::Streak30),
];

/// Module categories with a completion achievement
pub const CATEGORY_GOALS: &[(&str, AchievementId)] = &[
    ("fundamentals", AchievementId::FundamentalsComplete),
    ("frameworks", AchievementId::FrameworksComplete),
    ("data", AchievementId::DataComplete),
];

/// Difficulty tiers with a completion achievement
pub const TIER_GOALS: &[(DifficultyTier, AchievementId)] = &[
    (DifficultyTier::Beginner, AchievementId::TierBeginner),
    (DifficultyTier::Intermediate, AchievementId::TierIntermediate),
    (DifficultyTier::Advanced, AchievementId::TierAdvanced),
];

/// Distinct lessons accessed for the explorer achievement
pub const EXPLORER_TARGET: u64 = 5;
/// Sessions starting before this hour count as morning
pub const MORNING_CUTOFF_HOUR: u32 = 8;
/// Sessions starting at or after this hour count as night
pub const NIGHT_CUTOFF_HOUR: u32 = 22;
/// Total session count for the dedicated achievement
pub const DEDICATED_SESSIONS: u64 = 30;
/// Window of most recent quiz attempts that must all be correct
pub const QUIZ_STREAK_WINDOW: usize = 5;
/// Lessons completed under their estimate for the speed learner achievement
pub const SPEED_LESSON_TARGET: u64 = 5;
/// Post-completion re-accesses for the reviewer achievement
pub const REVIEW_TARGET: u64 = 5;
/// Searches for the search pro achievement
pub const SEARCH_TARGET: u64 = 20;

/// Immutable, injected achievement catalog
#[derive(Debug, Clone)]
pub struct AchievementCatalog {
    defs: Vec<AchievementDef>,
}

impl AchievementCatalog {
    /// Catalog with a caller-provided definition set
    pub fn new(defs: Vec<AchievementDef>) -> Self {
        Self { defs }
    }

    /// The built-in definition set
    pub fn default_catalog() -> Self {
        Self::new(DEFAULT_DEFS.to_vec())
    }

    pub fn get(&self, id: AchievementId) -> Option<&AchievementDef> {
        self.defs.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AchievementDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Total possible points across the catalog
    pub fn total_points(&self) -> u64 {
        self.defs.iter().map(|d| d.points as u64).sum()
    }
}

impl Default for AchievementCatalog {
    fn default() -> Self {
        Self::default_catalog()
    }
}

/// Built-in achievement definitions
static DEFAULT_DEFS: &[AchievementDef] = &[
    // === EXPLORATION ===
    AchievementDef {
        id: AchievementId::FirstLesson,
        title: "First Steps",
        description: "Complete your first lesson",
        category: RuleCategory::Exploration,
        points: 10,
        target: Some(1),
    },
    AchievementDef {
        id: AchievementId::FirstModule,
        title: "Module One Down",
        description: "Complete your first module",
        category: RuleCategory::Exploration,
        points: 25,
        target: Some(1),
    },
    AchievementDef {
        id: AchievementId::Explorer,
        title: "Explorer",
        description: "Open five different lessons",
        category: RuleCategory::Exploration,
        points: 15,
        target: Some(5),
    },
    // === MILESTONES ===
    AchievementDef {
        id: AchievementId::Lessons10,
        title: "Getting Started",
        description: "Complete 10 lessons",
        category: RuleCategory::Milestone,
        points: 25,
        target: Some(10),
    },
    AchievementDef {
        id: AchievementId::Lessons25,
        title: "Committed",
        description: "Complete 25 lessons",
        category: RuleCategory::Milestone,
        points: 50,
        target: Some(25),
    },
    AchievementDef {
        id: AchievementId::Lessons50,
        title: "Half Century",
        description: "Complete 50 lessons",
        category: RuleCategory::Milestone,
        points: 100,
        target: Some(50),
    },
    AchievementDef {
        id: AchievementId::ModuleChampion,
        title: "Module Champion",
        description: "Complete any module",
        category: RuleCategory::Milestone,
        points: 30,
        target: Some(1),
    },
    AchievementDef {
        id: AchievementId::FundamentalsComplete,
        title: "Solid Foundations",
        description: "Complete a module in the fundamentals category",
        category: RuleCategory::Milestone,
        points: 40,
        target: Some(1),
    },
    AchievementDef {
        id: AchievementId::FrameworksComplete,
        title: "Framework Fluent",
        description: "Complete a module in the frameworks category",
        category: RuleCategory::Milestone,
        points: 40,
        target: Some(1),
    },
    AchievementDef {
        id: AchievementId::DataComplete,
        title: "Data Driven",
        description: "Complete a module in the data category",
        category: RuleCategory::Milestone,
        points: 40,
        target: Some(1),
    },
    // === CONSISTENCY ===
    AchievementDef {
        id: AchievementId::Streak3,
        title: "On Fire",
        description: "Learn three days in a row",
        category: RuleCategory::Consistency,
        points: 30,
        target: Some(3),
    },
    AchievementDef {
        id: AchievementId::Streak7,
        title: "Week Warrior",
        description: "Learn seven days in a row",
        category: RuleCategory::Consistency,
        points: 75,
        target: Some(7),
    },
    AchievementDef {
        id: AchievementId::Streak30,
        title: "Monthly Master",
        description: "Learn thirty days in a row",
        category: RuleCategory::Consistency,
        points: 300,
        target: Some(30),
    },
    AchievementDef {
        id: AchievementId::EarlyBird,
        title: "Early Bird",
        description: "Start a session before 8 AM",
        category: RuleCategory::Consistency,
        points: 15,
        target: None,
    },
    AchievementDef {
        id: AchievementId::NightOwl,
        title: "Night Owl",
        description: "Start a session after 10 PM",
        category: RuleCategory::Consistency,
        points: 15,
        target: None,
    },
    AchievementDef {
        id: AchievementId::Dedicated,
        title: "Dedicated",
        description: "Log 30 learning sessions",
        category: RuleCategory::Consistency,
        points: 100,
        target: Some(30),
    },
    // === EXCELLENCE ===
    AchievementDef {
        id: AchievementId::PerfectQuiz,
        title: "Bullseye",
        description: "Answer a quiz perfectly",
        category: RuleCategory::Excellence,
        points: 20,
        target: Some(1),
    },
    AchievementDef {
        id: AchievementId::QuizStreak5,
        title: "Sharpshooter",
        description: "Answer five quizzes in a row correctly",
        category: RuleCategory::Excellence,
        points: 60,
        target: Some(5),
    },
    AchievementDef {
        id: AchievementId::TierBeginner,
        title: "Apprentice No More",
        description: "Complete every beginner module",
        category: RuleCategory::Excellence,
        points: 80,
        target: Some(1),
    },
    AchievementDef {
        id: AchievementId::TierIntermediate,
        title: "Journeyman",
        description: "Complete every intermediate module",
        category: RuleCategory::Excellence,
        points: 120,
        target: Some(1),
    },
    AchievementDef {
        id: AchievementId::TierAdvanced,
        title: "Expert",
        description: "Complete every advanced module",
        category: RuleCategory::Excellence,
        points: 200,
        target: Some(1),
    },
    AchievementDef {
        id: AchievementId::CompleteKnowledge,
        title: "Complete Knowledge",
        description: "Complete every module of every tier",
        category: RuleCategory::Excellence,
        points: 500,
        target: Some(1),
    },
    AchievementDef {
        id: AchievementId::SpeedLearner,
        title: "Speed Learner",
        description: "Finish five lessons faster than their estimated time",
        category: RuleCategory::Excellence,
        points: 50,
        target: Some(5),
    },
    // === ENGAGEMENT ===
    AchievementDef {
        id: AchievementId::Reviewer,
        title: "Back for More",
        description: "Revisit five lessons after completing them",
        category: RuleCategory::Engagement,
        points: 30,
        target: Some(5),
    },
    AchievementDef {
        id: AchievementId::SearchPro,
        title: "Search Pro",
        description: "Use search twenty times",
        category: RuleCategory::Engagement,
        points: 20,
        target: Some(20),
    },
    AchievementDef {
        id: AchievementId::FeedbackFriend,
        title: "Feedback Friend",
        description: "Submit feedback",
        category: RuleCategory::Engagement,
        points: 10,
        target: Some(1),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_id_has_a_default_def() {
        let catalog = AchievementCatalog::default_catalog();
        for &id in AchievementId::all() {
            assert!(catalog.get(id).is_some(), "missing def for {}", id.as_str());
        }
        assert_eq!(catalog.len(), AchievementId::all().len());
    }

    #[test]
    fn test_id_string_roundtrip() {
        for &id in AchievementId::all() {
            assert_eq!(AchievementId::from_str(id.as_str()), Some(id));
        }
        assert!(AchievementId::from_str("no_such_thing").is_none());
    }

    #[test]
    fn test_threshold_tables_reference_cataloged_ids() {
        let catalog = AchievementCatalog::default_catalog();
        for &(_, id) in LESSON_MILESTONES {
            assert!(catalog.get(id).is_some());
        }
        for &(_, id) in STREAK_MILESTONES {
            assert!(catalog.get(id).is_some());
        }
        for &(_, id) in CATEGORY_GOALS {
            assert!(catalog.get(id).is_some());
        }
        for &(_, id) in TIER_GOALS {
            assert!(catalog.get(id).is_some());
        }
    }
}
