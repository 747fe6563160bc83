//! Attack evaluation: accuracy and discrimination per attacked defender.

use std::collections::HashMap;

use stroll_core::error::{EvalError, StrollError};
use stroll_core::traits::MatchRegistry;
use stroll_core::types::{AttackResult, ClassId, Match, Round, TeamId};
use tracing::debug;

use crate::attack::TargetTruth;
use crate::auc::one_vs_rest_auc;
use crate::table::AttackTable;

/// Result of an attack against one defender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetResult {
    pub defender: TeamId,
    pub result: AttackResult,
}

/// Score a validated attack against every assigned target.
///
/// Rows are joined to the verification set by `capture_id`, so their order
/// in the upload does not matter. Yields one result per target.
pub fn evaluate_attack(
    table: &AttackTable,
    truth: &TargetTruth,
) -> Result<Vec<TargetResult>, EvalError> {
    let mut results = Vec::with_capacity(truth.targets.len());
    for (&defender, verification) in &truth.targets {
        let labels_by_capture: HashMap<u64, ClassId> = verification
            .iter()
            .map(|v| (v.capture_id, v.class_id))
            .collect();

        let mut probabilities = Vec::new();
        let mut labels = Vec::new();
        let mut correct = 0usize;
        for row in table.rows.iter().filter(|r| r.team_id == defender) {
            let &label = labels_by_capture
                .get(&row.capture_id)
                .ok_or(EvalError::UnknownCapture {
                    team_id: defender,
                    capture_id: row.capture_id,
                })?;
            if row.predicted_class() == Some(label) {
                correct += 1;
            }
            probabilities.push(row.probabilities.clone());
            labels.push(label);
        }

        let discrimination_score = one_vs_rest_auc(&probabilities, &labels)
            .ok_or(EvalError::UndefinedDiscrimination { team_id: defender })?;
        let accuracy = correct as f64 / labels.len() as f64;
        debug!(
            attacker = truth.attacker,
            defender,
            accuracy,
            discrimination_score,
            "attack evaluated"
        );
        results.push(TargetResult {
            defender,
            result: AttackResult {
                accuracy,
                discrimination_score,
            },
        });
    }
    Ok(results)
}

/// Attach each result to its scheduled match.
///
/// Every `(round, attacker, defender)` must already have a match.
pub fn bind_to_matches(
    results: &[TargetResult],
    round: Round,
    attacker: TeamId,
    registry: &dyn MatchRegistry,
) -> Result<Vec<(Match, AttackResult)>, StrollError> {
    results
        .iter()
        .map(|r| -> Result<_, StrollError> {
            let m = registry
                .resolve_match(round, attacker, r.defender)?
                .ok_or(EvalError::UnknownMatch {
                    round,
                    attacker,
                    defender: r.defender,
                })?;
            Ok((m, r.result))
        })
        .collect()
}
