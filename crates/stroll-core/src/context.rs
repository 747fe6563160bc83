//! Explicit engine context.
//!
//! Every engine call receives an [`EngineContext`] carrying the configured
//! exercise constants and the round in progress. Nothing inside the engine
//! reads process-wide state.

use serde::{Deserialize, Serialize};

use crate::constants::{
    CAPTURE_ID_COLUMN, DEFAULT_MEAN_REPS_PER_CLASS, DEFAULT_MIN_ROWS_PER_CAPTURE,
    DEFAULT_NB_CLASSES, DEFAULT_NB_TRACES_TO_CLASSIFY, DEFAULT_REP_DEVIATION, DEFAULT_ROUND,
    PROBABILITY_COLUMN_PREFIX, TEAM_ID_COLUMN,
};
use crate::types::{ClassId, Round};

/// Configured constants for one evaluation.
///
/// # Examples
///
/// ```
/// use stroll_core::context::EngineContext;
/// let ctx = EngineContext::default();
/// assert_eq!(ctx.nb_classes, 100);
/// assert_eq!(ctx.expected_attack_rows(3), 900);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineContext {
    /// Number of classes every defence must cover (`NB_CLASSES`).
    pub nb_classes: usize,
    /// Captures in each published test set (`NB_TRACES_TO_CLASSIFY`).
    pub nb_traces_to_classify: usize,
    /// Expected repetitions per class (`MEAN_REPS_PER_CLASS`).
    pub mean_reps_per_class: f64,
    /// Exclusive deviation around the mean (`REP_DEVIATION`).
    pub rep_deviation: f64,
    /// A capture needs strictly more rows than this (`MIN_ROWS_PER_CAPTURE`).
    pub min_rows_per_capture: usize,
    /// Round uploads are attributed to (`CURRENT_ROUND`).
    pub current_round: Round,
    /// Defence uploads are accepted.
    pub defence_phase: bool,
    /// Attack uploads are accepted.
    pub attack_phase: bool,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self {
            nb_classes: DEFAULT_NB_CLASSES,
            nb_traces_to_classify: DEFAULT_NB_TRACES_TO_CLASSIFY,
            mean_reps_per_class: DEFAULT_MEAN_REPS_PER_CLASS,
            rep_deviation: DEFAULT_REP_DEVIATION,
            min_rows_per_capture: DEFAULT_MIN_ROWS_PER_CAPTURE,
            current_round: DEFAULT_ROUND,
            defence_phase: true,
            attack_phase: true,
        }
    }
}

impl EngineContext {
    /// Exclusive `(lower, upper)` bounds on repetitions per class.
    pub fn repetition_bounds(&self) -> (f64, f64) {
        (
            self.mean_reps_per_class - self.rep_deviation,
            self.mean_reps_per_class + self.rep_deviation,
        )
    }

    /// Whether a class with `count` repetitions is inside the bounds.
    pub fn repetitions_in_bounds(&self, count: usize) -> bool {
        (count as f64 - self.mean_reps_per_class).abs() < self.rep_deviation
    }

    /// Whether `class_id` belongs to the configured class range `1..=nb_classes`.
    pub fn is_known_class(&self, class_id: ClassId) -> bool {
        class_id >= 1 && (class_id as usize) <= self.nb_classes
    }

    /// Name of the probability column holding `class_id`.
    pub fn probability_column(class_id: ClassId) -> String {
        format!("{PROBABILITY_COLUMN_PREFIX}{class_id}")
    }

    /// Full attack schema: `team_id`, `capture_id`, then one probability column per class.
    pub fn attack_columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.nb_classes + 2);
        columns.push(TEAM_ID_COLUMN.to_string());
        columns.push(CAPTURE_ID_COLUMN.to_string());
        columns.extend((1..=self.nb_classes as ClassId).map(Self::probability_column));
        columns
    }

    /// Rows an attack file must contain for a team assigned `matches` matches.
    pub fn expected_attack_rows(&self, matches: usize) -> usize {
        self.nb_traces_to_classify * matches
    }

    /// Open exactly the phases named by `phase`.
    pub fn with_phase(&self, phase: Phase) -> Self {
        Self {
            defence_phase: matches!(phase, Phase::Defence | Phase::Both),
            attack_phase: matches!(phase, Phase::Attack | Phase::Both),
            ..self.clone()
        }
    }

    /// Same constants, different round.
    pub fn for_round(&self, round: Round) -> Self {
        Self {
            current_round: round,
            ..self.clone()
        }
    }
}

/// Which uploads the exercise accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Defence,
    Attack,
    Both,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_matches_constants() {
        let ctx = EngineContext::default();
        assert_eq!(ctx.nb_classes, DEFAULT_NB_CLASSES);
        assert_eq!(ctx.nb_traces_to_classify, DEFAULT_NB_TRACES_TO_CLASSIFY);
        assert_eq!(ctx.current_round, DEFAULT_ROUND);
    }

    #[test]
    fn repetition_bounds_are_exclusive() {
        let ctx = EngineContext::default();
        assert_eq!(ctx.repetition_bounds(), (30.0, 40.0));
        assert!(!ctx.repetitions_in_bounds(30));
        assert!(ctx.repetitions_in_bounds(31));
        assert!(ctx.repetitions_in_bounds(39));
        assert!(!ctx.repetitions_in_bounds(40));
    }

    #[test]
    fn class_range_is_one_based() {
        let ctx = EngineContext::default();
        assert!(!ctx.is_known_class(0));
        assert!(ctx.is_known_class(1));
        assert!(ctx.is_known_class(100));
        assert!(!ctx.is_known_class(101));
    }

    #[test]
    fn attack_columns_layout() {
        let ctx = EngineContext {
            nb_classes: 3,
            ..EngineContext::default()
        };
        assert_eq!(
            ctx.attack_columns(),
            vec![
                "team_id",
                "capture_id",
                "probability_class_1",
                "probability_class_2",
                "probability_class_3"
            ]
        );
    }

    #[test]
    fn phases_open_independently() {
        let ctx = EngineContext::default();
        assert!(ctx.defence_phase && ctx.attack_phase);

        let attack = ctx.with_phase(Phase::Attack);
        assert!(!attack.defence_phase && attack.attack_phase);
        let closed = attack.with_phase(Phase::None);
        assert!(!closed.defence_phase && !closed.attack_phase);
        assert_eq!(closed.with_phase(Phase::Both), ctx);
        assert_eq!(closed.nb_classes, ctx.nb_classes);
    }

    #[test]
    fn for_round_keeps_constants() {
        let ctx = EngineContext::default().for_round(4);
        assert_eq!(ctx.current_round, 4);
        assert_eq!(ctx.nb_classes, DEFAULT_NB_CLASSES);
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let ctx: EngineContext =
            serde_json::from_str(r#"{"nb_classes": 10, "current_round": 2}"#).unwrap();
        assert_eq!(ctx.nb_classes, 10);
        assert_eq!(ctx.current_round, 2);
        assert_eq!(ctx.min_rows_per_capture, DEFAULT_MIN_ROWS_PER_CAPTURE);
    }

    #[test]
    fn phase_flags_deserialize() {
        let ctx: EngineContext = serde_json::from_str(r#"{"attack_phase": false}"#).unwrap();
        assert!(ctx.defence_phase);
        assert!(!ctx.attack_phase);
    }

    proptest! {
        #[test]
        fn in_bounds_iff_strictly_between_bounds(
            mean_halves in 2u32..400,
            deviation_halves in 1u32..100,
            count in 0usize..300,
        ) {
            let ctx = EngineContext {
                mean_reps_per_class: f64::from(mean_halves) / 2.0,
                rep_deviation: f64::from(deviation_halves) / 2.0,
                ..EngineContext::default()
            };
            let (low, high) = ctx.repetition_bounds();
            let c = count as f64;
            prop_assert_eq!(ctx.repetitions_in_bounds(count), low < c && c < high);
        }

        #[test]
        fn attack_columns_name_every_class_once(nb_classes in 1usize..300) {
            let ctx = EngineContext { nb_classes, ..EngineContext::default() };
            let columns = ctx.attack_columns();
            prop_assert_eq!(columns.len(), nb_classes + 2);
            let last = EngineContext::probability_column(nb_classes as ClassId);
            prop_assert_eq!(columns.last(), Some(&last));
            let distinct: std::collections::BTreeSet<&String> = columns.iter().collect();
            prop_assert_eq!(distinct.len(), columns.len());
        }
    }
}
