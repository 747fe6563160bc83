//! Trait interfaces between the engine and its collaborators.
//!
//! The engine itself is a set of pure functions (stroll-eval). Everything it
//! reads or writes outside a dataset goes through these traits:
//! - [`MatchRegistry`] — which teams attack whom in a round (external scheduler)
//! - [`TeamDirectory`] — team names and notification addresses
//! - [`DatasetStore`] — published split files
//! - [`RecordStore`] — append-only defence/attack records
//! - [`Notifier`] — outcome messages to teams
//!
//! stroll-node implements all of them.

use crate::error::StrollError;
use crate::types::{
    AttackRecord, DefenceRecord, Match, MatchId, Round, SplitOutput, TeamContact, TeamId,
    VerificationRow,
};

/// Read access to the match schedule.
pub trait MatchRegistry: Send + Sync {
    /// Defender teams `team` must attack during `round`, without duplicates.
    fn assigned_targets(&self, team: TeamId, round: Round) -> Result<Vec<TeamId>, StrollError>;

    /// Number of matches `team` plays as attacker during `round`.
    ///
    /// Default implementation counts [`assigned_targets`](Self::assigned_targets).
    fn matches_in_round(&self, team: TeamId, round: Round) -> Result<usize, StrollError> {
        Ok(self.assigned_targets(team, round)?.len())
    }

    /// The match for `(round, attacker, defender)`, if scheduled.
    fn resolve_match(
        &self,
        round: Round,
        attacker: TeamId,
        defender: TeamId,
    ) -> Result<Option<Match>, StrollError>;
}

/// Team names and members' addresses.
pub trait TeamDirectory: Send + Sync {
    fn team(&self, team: TeamId) -> Result<Option<TeamContact>, StrollError>;

    /// Every registered team, ordered by id.
    fn teams(&self) -> Result<Vec<TeamContact>, StrollError>;
}

/// Storage for the per-team split files.
pub trait DatasetStore: Send + Sync {
    /// Write (or overwrite) the test, train, and verification files of `team`.
    fn write_split(&self, team: TeamId, split: &SplitOutput) -> Result<(), StrollError>;

    /// Read back the verification file of `team`.
    fn read_verification(&self, team: TeamId) -> Result<Vec<VerificationRow>, StrollError>;
}

/// Append-only store for engine records.
pub trait RecordStore: Send + Sync {
    fn insert_defence(&self, record: &DefenceRecord) -> Result<(), StrollError>;

    fn insert_attack(&self, record: &AttackRecord) -> Result<(), StrollError>;

    /// Most recently inserted defence of `team` for `round`.
    fn latest_defence(
        &self,
        team: TeamId,
        round: Round,
    ) -> Result<Option<DefenceRecord>, StrollError>;

    /// Most recently inserted attack for `match_id`.
    fn latest_attack(&self, match_id: MatchId) -> Result<Option<AttackRecord>, StrollError>;
}

/// Outbound messages to teams.
pub trait Notifier: Send + Sync {
    fn send(&self, subject: &str, recipients: &[String], body: &str) -> Result<(), StrollError>;
}
