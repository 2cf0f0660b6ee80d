//! studyflow - learning-progress aggregation and achievement engine
//!
//! Keeps per-user, per-lesson and per-module completion state consistent
//! under concurrent updates, and evaluates a fixed catalog of gamification
//! rules against that state on every relevant event, unlocking rewards
//! exactly once per user per rule.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐
//! │ Lesson/quiz/login│      │ Dashboard reads  │
//! │ flows (external) │      │ (external)       │
//! └────────┬─────────┘      └────────┬─────────┘
//!          │ HandleEvent             │ ProgressQuery
//!          ▼                         ▼
//!   EventDispatcher ──► ProgressTracker ──► progress.db
//!          │                                   ▲
//!          ├──► RuleEvaluator ── snapshots ────┤
//!          └──► AchievementLedger ── unlocks ──┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = LearningEngine::open(&path)?;
//!
//! // Lesson completion flow
//! let unlocked = engine.dispatcher().handle_event(
//!     "user-1",
//!     EventType::LessonCompleted,
//!     &payload,
//! )?;
//!
//! // Achievements dashboard
//! let overview = engine.query().achievement_overview("user-1")?;
//! ```

pub mod achievements;
pub mod content;
pub mod db;
pub mod dispatcher;
pub mod models;
pub mod progress;
pub mod queries;
pub mod recorder;
pub mod streak;

pub use achievements::{
    AchievementCatalog, AchievementDef, AchievementId, AchievementLedger, RuleCategory,
    RuleEvaluator,
};
pub use content::ContentStore;
pub use db::ProgressDb;
pub use dispatcher::EventDispatcher;
pub use models::{
    AchievementRecord, DifficultyTier, EventPayload, EventType, LearningProgress, LearningSession,
    LessonProgress, LessonProgressDelta, LessonRecord, ModuleProgress, ModuleRecord,
    ProgressSummary, QuizAttempt,
};
pub use progress::{ProgressError, ProgressTracker};
pub use queries::{AchievementStatus, ProgressQuery};
pub use recorder::SessionRecorder;
pub use streak::{compute_streak, compute_streak_at};

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

/// Central facade wiring the engine components over one database.
///
/// Cheap to clone; all components share the underlying connection.
#[derive(Clone)]
pub struct LearningEngine {
    db: ProgressDb,
    catalog: Arc<AchievementCatalog>,
}

impl LearningEngine {
    /// Open or create the engine database at a path, with the built-in
    /// achievement catalog
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::with_catalog(
            ProgressDb::open(path)?,
            AchievementCatalog::default_catalog(),
        ))
    }

    /// In-memory engine (tests, ephemeral deployments)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::with_catalog(
            ProgressDb::open_in_memory()?,
            AchievementCatalog::default_catalog(),
        ))
    }

    /// Engine over an existing database with an injected catalog
    pub fn with_catalog(db: ProgressDb, catalog: AchievementCatalog) -> Self {
        Self {
            db,
            catalog: Arc::new(catalog),
        }
    }

    /// Curriculum read accessor (and seeding upserts)
    pub fn content(&self) -> ContentStore {
        ContentStore::new(self.db.clone())
    }

    /// Activity history recorder
    pub fn recorder(&self) -> SessionRecorder {
        SessionRecorder::new(self.db.clone())
    }

    /// Lesson progress updates (the `UpdateLessonProgress` surface)
    pub fn tracker(&self) -> ProgressTracker {
        ProgressTracker::new(self.db.clone())
    }

    /// Event entry point (the `HandleEvent` surface)
    pub fn dispatcher(&self) -> EventDispatcher {
        EventDispatcher::new(self.db.clone(), self.catalog.clone())
    }

    /// Read-only dashboard queries
    pub fn query(&self) -> ProgressQuery {
        ProgressQuery::new(self.db.clone(), self.catalog.clone())
    }

    pub fn catalog(&self) -> &AchievementCatalog {
        &self.catalog
    }

    /// Delete all progress data (curriculum tables are kept)
    pub fn reset_progress(&self) -> Result<()> {
        self.db.reset_progress()
    }

    /// Delete all unlock records
    pub fn reset_achievements(&self) -> Result<()> {
        self.db.reset_achievements()
    }
}
