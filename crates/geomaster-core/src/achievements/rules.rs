//! Threshold-crossing evaluation.

use std::collections::BTreeSet;

use super::catalog::{AchievementRule, CATALOG};
use crate::progress::UserProgress;

/// Evaluates achievement rules against a before/after progress pair.
///
/// Stateless; one instance can be shared across threads.
#[derive(Debug, Clone, Copy)]
pub struct RuleSet {
    rules: &'static [AchievementRule],
}

impl Default for RuleSet {
    fn default() -> Self {
        Self { rules: CATALOG }
    }
}

impl RuleSet {
    /// Rule set over the built-in catalog.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &'static [AchievementRule] {
        self.rules
    }

    /// Ids newly crossed between `before` and `after`, in catalog order.
    ///
    /// The result never contains an id from `already_unlocked`. A metric
    /// that jumps across several thresholds yields every crossed id. The
    /// caller merges the result into the stored set with a union.
    pub fn evaluate(
        &self,
        before: &UserProgress,
        after: &UserProgress,
        already_unlocked: &BTreeSet<String>,
    ) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|rule| rule.is_crossed(before, after))
            .filter(|rule| !already_unlocked.contains(rule.id))
            .map(|rule| rule.id)
            .collect()
    }

    /// Ids whose threshold `progress` already meets but which are not in
    /// its unlocked set. Used to backfill documents written before a rule
    /// existed, where no crossing will ever be observed.
    pub fn missing(&self, progress: &UserProgress) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|rule| rule.is_satisfied(progress))
            .filter(|rule| !progress.has_unlocked(rule.id))
            .map(|rule| rule.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn quizzes(n: u32) -> UserProgress {
        UserProgress {
            quizzes_completed: n,
            ..UserProgress::default()
        }
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_crossing_unlocks_one_id() {
        let unlocked = RuleSet::new().evaluate(&quizzes(9), &quizzes(10), &BTreeSet::new());
        assert_eq!(unlocked, vec!["quiz_master_10"]);
    }

    #[test]
    fn multi_threshold_jump_unlocks_every_crossed_id() {
        let unlocked = RuleSet::new().evaluate(&quizzes(0), &quizzes(100), &BTreeSet::new());
        assert_eq!(
            unlocked,
            vec!["first_quiz", "quiz_master_10", "quiz_master_50", "quiz_master_100"]
        );
    }

    #[test]
    fn partial_jump_stops_at_highest_crossed() {
        let unlocked = RuleSet::new().evaluate(&quizzes(0), &quizzes(15), &BTreeSet::new());
        assert_eq!(unlocked, vec!["first_quiz", "quiz_master_10"]);
    }

    #[test]
    fn already_unlocked_ids_are_excluded() {
        let unlocked =
            RuleSet::new().evaluate(&quizzes(0), &quizzes(15), &set(&["first_quiz"]));
        assert_eq!(unlocked, vec!["quiz_master_10"]);
    }

    #[test]
    fn no_change_unlocks_nothing() {
        let unlocked = RuleSet::new().evaluate(&quizzes(50), &quizzes(50), &BTreeSet::new());
        assert!(unlocked.is_empty());
    }

    #[test]
    fn default_level_does_not_unlock_level_rules() {
        let before = UserProgress::default();
        let after = UserProgress {
            level: 5,
            ..UserProgress::default()
        };
        assert_eq!(RuleSet::new().evaluate(&before, &before, &BTreeSet::new()), Vec::<&str>::new());
        assert_eq!(RuleSet::new().evaluate(&before, &after, &BTreeSet::new()), vec!["level_5"]);
    }

    #[test]
    fn metrics_are_evaluated_independently() {
        let before = UserProgress::default();
        let after = UserProgress {
            countries_learned: 12,
            current_streak: 7,
            level: 10,
            ..UserProgress::default()
        };
        let unlocked = RuleSet::new().evaluate(&before, &after, &BTreeSet::new());
        assert_eq!(unlocked, vec!["explorer_10", "streak_7", "level_5", "level_10"]);
    }

    #[test]
    fn missing_reports_satisfied_but_not_unlocked() {
        let mut progress = quizzes(12);
        progress.unlocked_achievements = set(&["first_quiz"]);
        assert_eq!(RuleSet::new().missing(&progress), vec!["quiz_master_10"]);
    }

    fn arb_progress() -> impl Strategy<Value = UserProgress> {
        (0u32..150, 0u32..150, 0u32..150, 1u32..60).prop_map(|(q, c, s, l)| UserProgress {
            quizzes_completed: q,
            countries_learned: c,
            current_streak: s,
            level: l,
            ..UserProgress::default()
        })
    }

    fn arb_unlocked() -> impl Strategy<Value = BTreeSet<String>> {
        proptest::sample::subsequence(
            CATALOG.iter().map(|r| r.id.to_string()).collect::<Vec<_>>(),
            0..CATALOG.len(),
        )
        .prop_map(|ids| ids.into_iter().collect())
    }

    proptest! {
        #[test]
        fn prop_result_is_disjoint_from_unlocked(
            before in arb_progress(),
            after in arb_progress(),
            unlocked in arb_unlocked(),
        ) {
            let delta = RuleSet::new().evaluate(&before, &after, &unlocked);
            prop_assert!(delta.iter().all(|id| !unlocked.contains(*id)));
        }

        #[test]
        fn prop_union_is_idempotent(
            before in arb_progress(),
            after in arb_progress(),
            unlocked in arb_unlocked(),
        ) {
            let rules = RuleSet::new();
            let mut merged = unlocked.clone();
            merged.extend(rules.evaluate(&before, &after, &unlocked).into_iter().map(String::from));

            let mut again = merged.clone();
            again.extend(rules.evaluate(&before, &after, &merged).into_iter().map(String::from));

            prop_assert_eq!(merged, again);
        }
    }
}
