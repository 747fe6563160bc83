//! Attack submission validation.
//!
//! Checks run in order and stop at the first failure:
//!
//! 1. Column set equals `team_id`, `capture_id`, `probability_class_1..N`.
//! 2. Row count equals `nb_traces_to_classify * matches_in_round`.
//! 3. Target teams present equal the assigned targets.
//! 4. Per target, the capture ids equal those of its verification file.
//! 5. Every probability lies in `[0, 1]` and each row sums to one.
//!
//! Checks 1 to 3 need only the [`AttackAssignment`]. Verification files are
//! read into a [`TargetTruth`] after they pass, so a missing file never hides
//! a shape error.

use std::collections::{BTreeMap, BTreeSet};

use stroll_core::constants::PROBABILITY_SUM_TOLERANCE;
use stroll_core::context::EngineContext;
use stroll_core::error::{AttackError, StrollError};
use stroll_core::traits::{DatasetStore, MatchRegistry};
use stroll_core::types::{CaptureId, Round, TeamId, VerificationRow};

use crate::table::AttackTable;

/// Targets of one attacking team in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackAssignment {
    pub team_id: TeamId,
    pub round: Round,
    pub matches_in_round: usize,
    pub targets: BTreeSet<TeamId>,
}

impl AttackAssignment {
    /// Look up the targets of `team` in the match registry.
    pub fn resolve(
        team: TeamId,
        round: Round,
        registry: &dyn MatchRegistry,
    ) -> Result<Self, StrollError> {
        Ok(Self {
            team_id: team,
            round,
            matches_in_round: registry.matches_in_round(team, round)?,
            targets: registry.assigned_targets(team, round)?.into_iter().collect(),
        })
    }
}

/// Published verification rows of every assigned target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTruth {
    pub attacker: TeamId,
    pub targets: BTreeMap<TeamId, Vec<VerificationRow>>,
}

impl TargetTruth {
    /// Read the verification file of each target in `assignment`.
    pub fn load(
        assignment: &AttackAssignment,
        datasets: &dyn DatasetStore,
    ) -> Result<Self, StrollError> {
        let mut targets = BTreeMap::new();
        for &defender in &assignment.targets {
            targets.insert(defender, datasets.read_verification(defender)?);
        }
        Ok(Self {
            attacker: assignment.team_id,
            targets,
        })
    }

    /// Capture ids published for `target`.
    pub fn capture_ids(&self, target: TeamId) -> BTreeSet<CaptureId> {
        self.targets
            .get(&target)
            .map(|rows| rows.iter().map(|v| v.capture_id).collect())
            .unwrap_or_default()
    }
}

/// Run all five checks, reading verification files only once checks 1 to 3
/// pass.
///
/// A violated check comes back as [`StrollError::Attack`]; any other error is
/// a fault while loading the verification files.
pub fn validate_attack(
    table: &AttackTable,
    assignment: &AttackAssignment,
    ctx: &EngineContext,
    datasets: &dyn DatasetStore,
) -> Result<TargetTruth, StrollError> {
    check_coverage(table, assignment, ctx)?;
    let truth = TargetTruth::load(assignment, datasets)?;
    check_predictions(table, &truth)?;
    Ok(truth)
}

/// Checks 1 to 3: columns, row count, target set.
pub fn check_coverage(
    table: &AttackTable,
    assignment: &AttackAssignment,
    ctx: &EngineContext,
) -> Result<(), AttackError> {
    if !table.has_attack_schema(ctx) {
        return Err(AttackError::SchemaMismatch {
            expected: ctx.nb_classes + 2,
            found: table.columns.join(", "),
        });
    }

    let expected = ctx.expected_attack_rows(assignment.matches_in_round);
    if table.rows.len() != expected {
        return Err(AttackError::RowCountMismatch {
            expected,
            found: table.rows.len(),
        });
    }

    let submitted: BTreeSet<TeamId> = table.rows.iter().map(|r| r.team_id).collect();
    let missing: Vec<TeamId> = assignment.targets.difference(&submitted).copied().collect();
    let unexpected: Vec<TeamId> = submitted.difference(&assignment.targets).copied().collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(AttackError::TargetMismatch {
            missing,
            unexpected,
        });
    }
    Ok(())
}

/// Checks 4 and 5: capture ids per target, probability rows.
pub fn check_predictions(table: &AttackTable, truth: &TargetTruth) -> Result<(), AttackError> {
    let mut submitted: BTreeMap<TeamId, BTreeSet<CaptureId>> = BTreeMap::new();
    for row in &table.rows {
        submitted.entry(row.team_id).or_default().insert(row.capture_id);
    }
    for (&team_id, captures) in &submitted {
        if *captures != truth.capture_ids(team_id) {
            return Err(AttackError::InvalidCaptureSet { team_id });
        }
    }

    for (i, row) in table.rows.iter().enumerate() {
        check_distribution(&row.probabilities).map_err(|detail| {
            AttackError::InvalidProbabilityDistribution { row: i + 1, detail }
        })?;
    }

    Ok(())
}

fn check_distribution(probabilities: &[f64]) -> Result<(), String> {
    if let Some(p) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(format!("probability {p} is outside [0, 1]"));
    }
    let sum: f64 = probabilities.iter().sum();
    // One ulp of slack so a sum written as 1 - tolerance in decimal still passes.
    if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE + f64::EPSILON {
        return Err(format!("probabilities sum to {sum}, not 1"));
    }
    Ok(())
}
