//! Event dispatch
//!
//! The only entry point external flows call. Translates a trigger into the
//! applicable progress update, records activity history, then runs rule
//! evaluation and the unlock ledger. The achievement path is advisory: its
//! failures are logged and reported as "zero new achievements", never
//! propagated to abort the primary action.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::achievements::{AchievementCatalog, AchievementLedger, RuleEvaluator};
use crate::db::ProgressDb;
use crate::models::{
    AchievementRecord, EventPayload, EventType, LessonProgressDelta, QuizAttempt,
};
use crate::progress::{ProgressError, ProgressTracker};
use crate::recorder::{COUNTER_REVIEW, COUNTER_SEARCH, SessionRecorder};

/// Orchestrates progress updates and achievement evaluation per event
#[derive(Clone)]
pub struct EventDispatcher {
    tracker: ProgressTracker,
    recorder: SessionRecorder,
    evaluator: RuleEvaluator,
    ledger: AchievementLedger,
}

impl EventDispatcher {
    pub fn new(db: ProgressDb, catalog: Arc<AchievementCatalog>) -> Self {
        Self {
            tracker: ProgressTracker::new(db.clone()),
            recorder: SessionRecorder::new(db.clone()),
            evaluator: RuleEvaluator::new(db.clone()),
            ledger: AchievementLedger::new(db, catalog),
        }
    }

    /// Handle an external trigger and return the newly unlocked achievements.
    ///
    /// Progress-affecting events run the aggregate update first and fold its
    /// result into the payload so rules see fresh state; an error there
    /// propagates. Everything downstream is advisory.
    pub fn handle_event(
        &self,
        user_id: &str,
        event: EventType,
        payload: &EventPayload,
    ) -> Result<Vec<AchievementRecord>, ProgressError> {
        let now = payload.login_time.unwrap_or_else(|| Utc::now().timestamp_millis());
        let mut payload = payload.clone();

        match event {
            EventType::LessonCompleted | EventType::LessonAccessed => {
                self.apply_lesson_update(user_id, event, &mut payload, now)?;
            }
            EventType::QuizCompleted => {
                self.record_quiz(user_id, &payload, now);
            }
            EventType::DailyLogin => {
                if let Err(e) = self.recorder.record_login(user_id, now) {
                    warn!(user = user_id, error = %e, "failed to record login session");
                }
            }
            EventType::SearchUsed => {
                if let Err(e) = self.recorder.bump_counter(user_id, COUNTER_SEARCH, now) {
                    warn!(user = user_id, error = %e, "failed to bump search counter");
                }
            }
            EventType::LessonReviewed => {
                if let Err(e) = self.recorder.bump_counter(user_id, COUNTER_REVIEW, now) {
                    warn!(user = user_id, error = %e, "failed to bump review counter");
                }
            }
            EventType::ModuleCompleted | EventType::FeedbackSubmitted => {}
        }

        let candidates = self.evaluator.evaluate(user_id, event, &payload);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        match self.ledger.unlock_eligible(user_id, &candidates) {
            Ok(unlocked) => {
                if !unlocked.is_empty() {
                    debug!(
                        user = user_id,
                        event = event.as_str(),
                        count = unlocked.len(),
                        "achievements unlocked"
                    );
                }
                Ok(unlocked)
            }
            Err(e) => {
                warn!(user = user_id, error = %e, "achievement unlock failed; reporting none");
                Ok(Vec::new())
            }
        }
    }

    /// Fire-and-forget variant for flows that must not wait on the
    /// achievement path (login). Failures are logged, never surfaced.
    pub fn dispatch_background(&self, user_id: &str, event: EventType, payload: &EventPayload) {
        let dispatcher = self.clone();
        let user = user_id.to_string();
        let payload = payload.clone();
        tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || dispatcher.handle_event(&user, event, &payload))
                    .await;
            match result {
                Ok(Ok(unlocked)) => {
                    if !unlocked.is_empty() {
                        debug!(count = unlocked.len(), "background dispatch unlocked achievements");
                    }
                }
                Ok(Err(e)) => warn!(error = %e, "background event dispatch failed"),
                Err(e) => warn!(error = %e, "background dispatch task panicked"),
            }
        });
    }

    /// Run the progress update for a lesson event and fold the refreshed
    /// module state into the payload.
    fn apply_lesson_update(
        &self,
        user_id: &str,
        event: EventType,
        payload: &mut EventPayload,
        now: i64,
    ) -> Result<(), ProgressError> {
        let lesson_id = payload
            .lesson_id
            .clone()
            .ok_or_else(|| ProgressError::InvalidDelta("lesson event without lesson_id".into()))?;

        let mut delta = payload.delta.clone().unwrap_or_default();
        if event == EventType::LessonCompleted && delta.completed.is_none() {
            delta.completed = Some(true);
        }
        // An access always touches last_accessed, even with an empty delta
        if delta.last_accessed.is_none() {
            delta.last_accessed = Some(now);
        }

        let updated = self.tracker.update_lesson_progress(user_id, &lesson_id, &delta)?;

        payload.module_id = Some(updated.progress.module_id.clone());
        payload.module_completed = Some(updated.progress.is_completed());
        match self.evaluator.modules_completed_count(user_id) {
            Ok(count) => payload.modules_completed_count = Some(count),
            Err(e) => warn!(user = user_id, error = %e, "failed to fold module count into payload"),
        }

        if let Err(e) = self.recorder.note_lesson_viewed(user_id, now) {
            warn!(user = user_id, error = %e, "failed to count lesson view");
        }
        Ok(())
    }

    fn record_quiz(&self, user_id: &str, payload: &EventPayload, now: i64) {
        let Some(quiz_id) = payload.quiz_id.clone() else {
            warn!(user = user_id, "quiz event without quiz_id; skipping attempt record");
            return;
        };
        let attempt = QuizAttempt {
            user_id: user_id.to_string(),
            quiz_id,
            is_correct: payload.is_correct.unwrap_or(false),
            attempted_at: now,
        };
        if let Err(e) = self.recorder.record_quiz_attempt(&attempt) {
            warn!(user = user_id, error = %e, "failed to record quiz attempt");
        }
    }
}

/// Build a completion delta for the common lesson-finished flow
pub fn completion_delta(time_spent_minutes: i64) -> LessonProgressDelta {
    LessonProgressDelta {
        completed: Some(true),
        progress: Some(1.0),
        time_spent_delta: Some(time_spent_minutes),
        ..Default::default()
    }
}
