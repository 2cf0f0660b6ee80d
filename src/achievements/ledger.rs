//! Achievement unlock ledger
//!
//! Deduplicates candidates against already-unlocked achievements and inserts
//! the new ones inside one transaction. A given `(user, type)` pair is
//! unlocked at most once for the lifetime of the user: the in-transaction
//! re-check closes the race window between overlapping events, and the
//! primary-key constraint backs it so a missed race fails safely as a no-op.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use super::catalog::{AchievementCatalog, AchievementId};
use crate::db::ProgressDb;
use crate::models::AchievementRecord;

/// Idempotent, transactional unlock store
#[derive(Clone)]
pub struct AchievementLedger {
    db: ProgressDb,
    catalog: Arc<AchievementCatalog>,
}

impl AchievementLedger {
    pub fn new(db: ProgressDb, catalog: Arc<AchievementCatalog>) -> Self {
        Self { db, catalog }
    }

    /// Already-unlocked achievement type strings for a user
    pub fn unlocked_types(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.db.conn();
        let mut stmt =
            conn.prepare("SELECT achievement_type FROM achievements WHERE user_id = ?1")?;
        let types: Vec<String> = stmt
            .query_map([user_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(types)
    }

    /// All unlock rows for a user, newest first
    pub fn unlocked(&self, user_id: &str) -> Result<Vec<AchievementRecord>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, achievement_type, title, description, points, unlocked_at
             FROM achievements WHERE user_id = ?1 ORDER BY unlocked_at DESC",
        )?;
        let rows = stmt.query_map([user_id], |r| {
            Ok(AchievementRecord {
                user_id: r.get(0)?,
                achievement_type: r.get(1)?,
                title: r.get(2)?,
                description: r.get(3)?,
                points: r.get(4)?,
                unlocked_at: r.get(5)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Insert unlock rows for every candidate not yet unlocked.
    ///
    /// Returns only the rows actually inserted by this call; calling twice in
    /// immediate succession yields an empty result the second time.
    pub fn unlock_eligible(
        &self,
        user_id: &str,
        candidates: &[AchievementId],
    ) -> Result<Vec<AchievementRecord>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let already = self.unlocked_types(user_id)?;
        let to_insert: Vec<AchievementId> = candidates
            .iter()
            .copied()
            .filter(|id| !already.iter().any(|t| t == id.as_str()))
            .collect();
        if to_insert.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now().timestamp_millis();
        let mut inserted = Vec::new();

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        for id in to_insert {
            let Some(def) = self.catalog.get(id) else {
                // Candidate outside the injected catalog; nothing to denormalize
                continue;
            };
            // Re-check inside the transaction; a concurrent event may have
            // unlocked the same id since the prefetch above.
            let changed = tx.execute(
                r#"INSERT OR IGNORE INTO achievements
                       (user_id, achievement_type, title, description, points, unlocked_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                rusqlite::params![user_id, id.as_str(), def.title, def.description, def.points, now],
            )?;
            if changed == 1 {
                debug!(user = user_id, achievement = id.as_str(), "achievement unlocked");
                inserted.push(AchievementRecord {
                    user_id: user_id.to_string(),
                    achievement_type: id.as_str().to_string(),
                    title: def.title.to_string(),
                    description: def.description.to_string(),
                    points: def.points,
                    unlocked_at: now,
                });
            }
        }
        tx.commit()?;

        Ok(inserted)
    }
}
