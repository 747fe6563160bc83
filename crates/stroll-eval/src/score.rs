//! Score aggregation and leaderboard ranking.
//!
//! Per team and round:
//! - utility score: aggregated score of the latest defence, if any;
//! - attack performance: mean aggregated result of the latest attack of every
//!   assigned match, only once every match has one;
//! - total: attack performance times utility, with a fixed fallback
//!   performance while attacks are incomplete.

use std::cmp::Reverse;
use std::fmt;

use ordered_float::OrderedFloat;
use stroll_core::constants::INCOMPLETE_ATTACK_PERFORMANCE;
use stroll_core::error::{EvalError, StrollError};
use stroll_core::traits::{MatchRegistry, RecordStore, TeamDirectory};
use stroll_core::types::{AttackResult, Round, TeamContact, TeamId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UtilityScore {
    Available(f64),
    NotYetAvailable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackPerformance {
    Complete(f64),
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TotalScore {
    Computed(f64),
    NotComputable,
}

impl AttackPerformance {
    /// Mean aggregated result when every match has a result.
    ///
    /// A team with no assigned match is incomplete.
    pub fn from_latest(latest: &[Option<AttackResult>]) -> Self {
        if latest.is_empty() {
            return Self::Incomplete;
        }
        let mut sum = 0.0;
        for result in latest {
            match result {
                Some(r) => sum += r.aggregated_result(),
                None => return Self::Incomplete,
            }
        }
        Self::Complete(sum / latest.len() as f64)
    }
}

impl TotalScore {
    pub fn combine(utility: UtilityScore, attack: AttackPerformance) -> Self {
        match utility {
            UtilityScore::Available(u) => {
                let performance = match attack {
                    AttackPerformance::Complete(p) => p,
                    AttackPerformance::Incomplete => INCOMPLETE_ATTACK_PERFORMANCE,
                };
                Self::Computed(performance * u)
            }
            UtilityScore::NotYetAvailable => Self::NotComputable,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Computed(v) => Some(*v),
            Self::NotComputable => None,
        }
    }
}

impl fmt::Display for UtilityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available(v) => write!(f, "{v:.3}"),
            Self::NotYetAvailable => f.write_str("No defence uploaded yet"),
        }
    }
}

impl fmt::Display for AttackPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete(v) => write!(f, "{v:.3}"),
            Self::Incomplete => f.write_str("Some attacks remain to do"),
        }
    }
}

impl fmt::Display for TotalScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Computed(v) => write!(f, "{v:.3}"),
            Self::NotComputable => f.write_str("Cannot compute full score yet"),
        }
    }
}

/// Scores of one team in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamStanding {
    pub team_id: TeamId,
    pub team_name: String,
    pub utility: UtilityScore,
    pub attack: AttackPerformance,
    pub total: TotalScore,
}

pub fn utility_score(
    team: TeamId,
    round: Round,
    records: &dyn RecordStore,
) -> Result<UtilityScore, StrollError> {
    Ok(match records.latest_defence(team, round)? {
        Some(defence) => UtilityScore::Available(defence.utility.aggregated_score()),
        None => UtilityScore::NotYetAvailable,
    })
}

pub fn attack_performance(
    team: TeamId,
    round: Round,
    registry: &dyn MatchRegistry,
    records: &dyn RecordStore,
) -> Result<AttackPerformance, StrollError> {
    let mut latest = Vec::new();
    for defender in registry.assigned_targets(team, round)? {
        let m = registry
            .resolve_match(round, team, defender)?
            .ok_or(EvalError::UnknownMatch {
                round,
                attacker: team,
                defender,
            })?;
        latest.push(records.latest_attack(m.id)?.map(|a| a.result));
    }
    Ok(AttackPerformance::from_latest(&latest))
}

pub fn standing(
    team: &TeamContact,
    round: Round,
    registry: &dyn MatchRegistry,
    records: &dyn RecordStore,
) -> Result<TeamStanding, StrollError> {
    let utility = utility_score(team.team_id, round, records)?;
    let attack = attack_performance(team.team_id, round, registry, records)?;
    Ok(TeamStanding {
        team_id: team.team_id,
        team_name: team.name.clone(),
        utility,
        attack,
        total: TotalScore::combine(utility, attack),
    })
}

/// Standings of every team: computable totals first, highest first; the
/// rest by team id.
pub fn leaderboard(
    teams: &dyn TeamDirectory,
    round: Round,
    registry: &dyn MatchRegistry,
    records: &dyn RecordStore,
) -> Result<Vec<TeamStanding>, StrollError> {
    let mut standings = teams
        .teams()?
        .iter()
        .map(|team| standing(team, round, registry, records))
        .collect::<Result<Vec<_>, _>>()?;
    rank(&mut standings);
    Ok(standings)
}

fn rank(standings: &mut [TeamStanding]) {
    standings.sort_by_key(|s| match s.total.value() {
        Some(total) => (0, Reverse(OrderedFloat(total)), s.team_id),
        None => (1, Reverse(OrderedFloat(0.0)), s.team_id),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn result(accuracy: f64, discrimination_score: f64) -> Option<AttackResult> {
        Some(AttackResult {
            accuracy,
            discrimination_score,
        })
    }

    #[test]
    fn perfect_attack_scores_scale() {
        assert_eq!(
            AttackPerformance::from_latest(&[result(1.0, 1.0)]),
            AttackPerformance::Complete(1000.0)
        );
    }

    #[test]
    fn two_of_three_matches_is_incomplete() {
        let latest = [result(0.5, 0.8), None, result(0.9, 0.9)];
        assert_eq!(
            AttackPerformance::from_latest(&latest),
            AttackPerformance::Incomplete
        );
    }

    #[test]
    fn no_assigned_matches_is_incomplete() {
        assert_eq!(AttackPerformance::from_latest(&[]), AttackPerformance::Incomplete);
    }

    #[test]
    fn mean_over_matches() {
        let latest = [result(0.5, 0.8), result(1.0, 0.6)];
        let AttackPerformance::Complete(p) = AttackPerformance::from_latest(&latest) else {
            panic!("expected complete");
        };
        assert!((p - 500.0).abs() < 1e-9);
    }

    #[test]
    fn total_falls_back_while_incomplete() {
        assert_eq!(
            TotalScore::combine(UtilityScore::Available(11.5), AttackPerformance::Incomplete),
            TotalScore::Computed(11.5)
        );
        assert_eq!(
            TotalScore::combine(UtilityScore::Available(2.0), AttackPerformance::Complete(300.0)),
            TotalScore::Computed(600.0)
        );
        assert_eq!(
            TotalScore::combine(UtilityScore::NotYetAvailable, AttackPerformance::Complete(300.0)),
            TotalScore::NotComputable
        );
    }

    #[test]
    fn markers_display_as_messages() {
        assert_eq!(UtilityScore::NotYetAvailable.to_string(), "No defence uploaded yet");
        assert_eq!(AttackPerformance::Incomplete.to_string(), "Some attacks remain to do");
        assert_eq!(TotalScore::NotComputable.to_string(), "Cannot compute full score yet");
    }

    fn standing_with(team_id: TeamId, total: TotalScore) -> TeamStanding {
        TeamStanding {
            team_id,
            team_name: format!("team {team_id}"),
            utility: UtilityScore::NotYetAvailable,
            attack: AttackPerformance::Incomplete,
            total,
        }
    }

    #[test]
    fn ranking_puts_missing_totals_last() {
        let mut standings = vec![
            standing_with(4, TotalScore::NotComputable),
            standing_with(1, TotalScore::Computed(5.0)),
            standing_with(3, TotalScore::Computed(9.0)),
            standing_with(2, TotalScore::NotComputable),
        ];
        rank(&mut standings);
        let order: Vec<TeamId> = standings.iter().map(|s| s.team_id).collect();
        assert_eq!(order, vec![3, 1, 2, 4]);
    }

    proptest! {
        #[test]
        fn complete_performance_is_bounded(
            results in prop::collection::vec((0.0f64..=1.0, 0.0f64..=1.0), 1..10),
        ) {
            let latest: Vec<_> = results.iter().map(|&(a, d)| result(a, d)).collect();
            match AttackPerformance::from_latest(&latest) {
                AttackPerformance::Complete(p) => prop_assert!((0.0..=1000.0 + 1e-9).contains(&p)),
                AttackPerformance::Incomplete => prop_assert!(false, "all matches have results"),
            }
        }
    }
}
