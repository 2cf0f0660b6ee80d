//! Gamification engine: catalog, rule evaluation and the unlock ledger

pub mod catalog;
pub mod checker;
pub mod evaluator;
pub mod ledger;

pub use catalog::{AchievementCatalog, AchievementDef, AchievementId, RuleCategory};
pub use evaluator::RuleEvaluator;
pub use ledger::AchievementLedger;
