//! Module/lesson read accessors
//!
//! The engine never mutates curriculum data except through the seeding
//! upserts, which exist so the consuming service can load its catalog.

use anyhow::{Context, Result};

use crate::db::ProgressDb;
use crate::models::{DifficultyTier, LessonRecord, ModuleRecord};

/// Read accessor over the curriculum tables
#[derive(Clone)]
pub struct ContentStore {
    db: ProgressDb,
}

impl ContentStore {
    pub fn new(db: ProgressDb) -> Self {
        Self { db }
    }

    /// Insert or replace a module definition
    pub fn upsert_module(&self, module: &ModuleRecord) -> Result<()> {
        let prereqs = serde_json::to_string(&module.prerequisites)
            .context("Failed to serialize module prerequisites")?;
        let conn = self.db.conn();
        conn.execute(
            r#"INSERT INTO modules (id, category, tier, order_index, prerequisites)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(id) DO UPDATE SET
                   category = ?2, tier = ?3, order_index = ?4, prerequisites = ?5"#,
            rusqlite::params![
                module.id,
                module.category,
                module.tier.as_str(),
                module.order_index,
                prereqs,
            ],
        )?;
        Ok(())
    }

    /// Insert or replace a lesson definition
    pub fn upsert_lesson(&self, lesson: &LessonRecord) -> Result<()> {
        let conn = self.db.conn();
        conn.execute(
            r#"INSERT INTO lessons (id, module_id, order_index, estimated_minutes)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(id) DO UPDATE SET
                   module_id = ?2, order_index = ?3, estimated_minutes = ?4"#,
            rusqlite::params![
                lesson.id,
                lesson.module_id,
                lesson.order_index,
                lesson.estimated_minutes,
            ],
        )?;
        Ok(())
    }

    /// Resolve a lesson to its owning module id
    pub fn module_of_lesson(&self, lesson_id: &str) -> Result<Option<String>> {
        let conn = self.db.conn();
        let module = conn
            .query_row(
                "SELECT module_id FROM lessons WHERE id = ?1",
                [lesson_id],
                |r| r.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(module)
    }

    pub fn module(&self, module_id: &str) -> Result<Option<ModuleRecord>> {
        let conn = self.db.conn();
        let row = conn
            .query_row(
                "SELECT id, category, tier, order_index, prerequisites FROM modules WHERE id = ?1",
                [module_id],
                Self::map_module,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(row)
    }

    /// All lessons of a module, in order
    pub fn lessons_of_module(&self, module_id: &str) -> Result<Vec<LessonRecord>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, module_id, order_index, estimated_minutes
             FROM lessons WHERE module_id = ?1 ORDER BY order_index ASC",
        )?;
        let rows = stmt.query_map([module_id], |row| {
            Ok(LessonRecord {
                id: row.get(0)?,
                module_id: row.get(1)?,
                order_index: row.get(2)?,
                estimated_minutes: row.get(3)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn all_modules(&self) -> Result<Vec<ModuleRecord>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, category, tier, order_index, prerequisites
             FROM modules ORDER BY order_index ASC",
        )?;
        let rows = stmt.query_map([], Self::map_module)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn modules_in_category(&self, category: &str) -> Result<Vec<ModuleRecord>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, category, tier, order_index, prerequisites
             FROM modules WHERE category = ?1 ORDER BY order_index ASC",
        )?;
        let rows = stmt.query_map([category], Self::map_module)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn modules_by_tier(&self, tier: DifficultyTier) -> Result<Vec<ModuleRecord>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, category, tier, order_index, prerequisites
             FROM modules WHERE tier = ?1 ORDER BY order_index ASC",
        )?;
        let rows = stmt.query_map([tier.as_str()], Self::map_module)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn map_module(row: &rusqlite::Row<'_>) -> rusqlite::Result<ModuleRecord> {
        let tier_str: String = row.get(2)?;
        let prereqs_str: String = row.get(4)?;
        Ok(ModuleRecord {
            id: row.get(0)?,
            category: row.get(1)?,
            tier: DifficultyTier::from_str(&tier_str).unwrap_or(DifficultyTier::Beginner),
            order_index: row.get(3)?,
            prerequisites: serde_json::from_str(&prereqs_str).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ContentStore {
        ContentStore::new(ProgressDb::open_in_memory().unwrap())
    }

    #[test]
    fn test_seed_and_resolve() {
        let content = store();
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
                estimated_minutes: 15,
            })
            .unwrap();

        assert_eq!(content.module_of_lesson("l1").unwrap().as_deref(), Some("m1"));
        assert!(content.module_of_lesson("nope").unwrap().is_none());
        assert_eq!(content.lessons_of_module("m1").unwrap().len(), 1);
    }

    #[test]
    fn test_prerequisites_roundtrip() {
        let content = store();
        content
            .upsert_module(&ModuleRecord {
                id: "m2".into(),
                category: "frameworks".into(),
                tier: DifficultyTier::Intermediate,
                order_index: 1,
                prerequisites: vec!["m1".into()],
            })
            .unwrap();
        let m = content.module("m2").unwrap().unwrap();
        assert_eq!(m.prerequisites, vec!["m1".to_string()]);
        assert_eq!(m.tier, DifficultyTier::Intermediate);
    }

    #[test]
    fn test_tier_and_category_filters() {
        let content = store();
        for (id, cat, tier) in [
            ("m1", "fundamentals", DifficultyTier::Beginner),
            ("m2", "fundamentals", DifficultyTier::Intermediate),
            ("m3", "data", DifficultyTier::Beginner),
        ] {
            content
                .upsert_module(&ModuleRecord {
                    id: id.into(),
                    category: cat.into(),
                    tier,
                    order_index: 0,
                    prerequisites: vec![],
                })
                .unwrap();
        }
        assert_eq!(content.modules_in_category("fundamentals").unwrap().len(), 2);
        assert_eq!(content.modules_by_tier(DifficultyTier::Beginner).unwrap().len(), 2);
        assert_eq!(content.all_modules().unwrap().len(), 3);
    }
}
