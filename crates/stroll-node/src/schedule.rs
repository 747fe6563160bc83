//! Round generation.
//!
//! Every registered team is shuffled into a circle and attacks the
//! `matches_per_team` teams that follow it, so each team also defends exactly
//! that many times and never meets itself. Rounds are generated once each
//! and in order.

use rand::seq::SliceRandom;
use rand::Rng;
use stroll_core::error::{ScheduleError, StrollError};
use stroll_core::traits::TeamDirectory;
use stroll_core::types::{Match, Round, TeamId};
use tracing::info;

use crate::storage::RocksStore;

/// `(attacker, defender)` pairs: each team against the next
/// `min(matches_per_team, n - 1)` teams around the circle.
pub fn circular_pairings(teams: &[TeamId], matches_per_team: usize) -> Vec<(TeamId, TeamId)> {
    let n = teams.len();
    let per_team = matches_per_team.min(n.saturating_sub(1));
    (0..n)
        .flat_map(|i| (1..=per_team).map(move |k| (teams[i], teams[(i + k) % n])))
        .collect()
}

/// Generate the matches of `round` over every registered team.
///
/// Refuses a round that already has matches and a round whose predecessor
/// has none.
pub fn generate_matches<R: Rng + ?Sized>(
    store: &RocksStore,
    round: Round,
    matches_per_team: usize,
    rng: &mut R,
) -> Result<Vec<Match>, StrollError> {
    if round == 0 {
        return Err(ScheduleError::InvalidRound.into());
    }
    let existing = store.matches()?;
    if existing.iter().any(|m| m.round == round) {
        return Err(ScheduleError::AlreadyGenerated(round).into());
    }
    if round > 1 && !existing.iter().any(|m| m.round == round - 1) {
        return Err(ScheduleError::PreviousRoundMissing {
            round,
            previous: round - 1,
        }
        .into());
    }

    let mut teams: Vec<TeamId> = store.teams()?.into_iter().map(|t| t.team_id).collect();
    if teams.len() < 2 {
        return Err(ScheduleError::NotEnoughTeams(teams.len()).into());
    }
    teams.shuffle(rng);

    let scheduled = store.schedule_round(round, &circular_pairings(&teams, matches_per_team))?;
    info!(round, teams = teams.len(), matches = scheduled.len(), "round generated");
    Ok(scheduled)
}
