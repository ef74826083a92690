//! Achievement catalog and unlock rules.
//!
//! Achievements unlock when a progress metric crosses a fixed threshold
//! between two snapshots. The catalog is a static table; the rule set is a
//! pure function over (before, after, already unlocked).

pub mod catalog;
pub mod rules;

pub use catalog::{AchievementRule, Metric, CATALOG};
pub use rules::RuleSet;
