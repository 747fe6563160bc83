//! Error types for the stroll evaluation engine.
//!
//! Validation errors carry the single message shown to the uploading team:
//! their `Display` text is what ends up in the failure notification.
use thiserror::Error;

use crate::types::{CaptureId, ClassId, Round, TeamId};

/// Defence trace rejected by the Schema & Shape Validator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefenceError {
    #[error("your dataset does not have the correct columns (expected {expected}, found {found}); please follow the upload instructions")]
    SchemaMismatch { expected: String, found: String },
    #[error("your dataset must contain captures for exactly the class ids 1 to {expected}: {covered} of them covered, {distinct} distinct class_id values found")]
    IncompleteClassCoverage { expected: usize, covered: usize, distinct: usize },
    #[error("class {class_id} has {count} repetitions; every class needs more than {min} and fewer than {max}")]
    RepetitionCountOutOfBounds { class_id: ClassId, count: usize, min: f64, max: f64 },
    #[error("capture (class {class_id}, repetition {repetition_id}) has {rows} rows; every capture needs more than {min}")]
    CaptureTooShort { class_id: ClassId, repetition_id: u64, rows: usize, min: usize },
    #[error("you cannot upload your defence trace now: the defence phase is closed")]
    PhaseClosed,
}

/// Attack submission rejected by the Attack Submission Validator.
///
/// `RowCountMismatch` and `TargetMismatch` are the two coverage failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttackError {
    #[error("your file does not have the correct columns (expected {expected} columns, found {found}); please follow the upload instructions")]
    SchemaMismatch { expected: usize, found: String },
    #[error("your file does not contain a classification for every trace you should attack: expected {expected} rows, found {found}")]
    RowCountMismatch { expected: usize, found: usize },
    #[error("your file does not attack exactly the teams assigned to you: missing {missing:?}, unexpected {unexpected:?}")]
    TargetMismatch { missing: Vec<TeamId>, unexpected: Vec<TeamId> },
    #[error("your file contains invalid capture_id values for team {team_id}")]
    InvalidCaptureSet { team_id: TeamId },
    #[error("your output probabilities are not a valid distribution on row {row}: {detail}")]
    InvalidProbabilityDistribution { row: usize, detail: String },
    #[error("you cannot attack others now: the attack phase is closed")]
    PhaseClosed,
}

/// Precondition faults of the Leak-Resistant Split Engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("insufficient captures for split: have {available}, need {required}")]
    InsufficientCaptures { available: usize, required: usize },
    #[error("{classes} classes cannot all fit in a test set of {test_size} captures")]
    ClassesExceedTestSize { classes: usize, test_size: usize },
    #[error("relabeling collided on every one of {attempts} salts")]
    RelabelCollision { attempts: u32 },
}

/// Match generation refused for a round.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("rounds are numbered from 1")]
    InvalidRound,
    #[error("matches for round {0} were already generated")]
    AlreadyGenerated(Round),
    #[error("matches for round {previous} have not been generated; generate them before round {round}")]
    PreviousRoundMissing { round: Round, previous: Round },
    #[error("at least two teams are needed to generate matches, found {0}")]
    NotEnoughTeams(usize),
}

/// Faults raised while scoring an already validated attack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("no match for round {round}: attacker {attacker}, defender {defender}")]
    UnknownMatch { round: Round, attacker: TeamId, defender: TeamId },
    #[error("capture {capture_id} is not in the verification set of team {team_id}")]
    UnknownCapture { team_id: TeamId, capture_id: CaptureId },
    #[error("discrimination score undefined for team {team_id}: fewer than two classes in the verification set")]
    UndefinedDiscrimination { team_id: TeamId },
}

/// Uploaded file could not be decoded into a table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("your file could not be read: {0}")]
    Unreadable(String),
    #[error("your file could not be parsed at row {row}: {message}")]
    Malformed { row: usize, message: String },
}

#[derive(Error, Debug)]
pub enum StrollError {
    #[error(transparent)] Defence(#[from] DefenceError),
    #[error(transparent)] Attack(#[from] AttackError),
    #[error(transparent)] Split(#[from] SplitError),
    #[error(transparent)] Eval(#[from] EvalError),
    #[error(transparent)] Table(#[from] TableError),
    #[error(transparent)] Schedule(#[from] ScheduleError),
    #[error("storage: {0}")] Storage(String),
    #[error("io: {0}")] Io(String),
    #[error("config: {0}")] Config(String),
    #[error("notify: {0}")] Notify(String),
    #[error("unknown team: {0}")] UnknownTeam(TeamId),
    #[error("job queue closed")] QueueClosed,
}

impl From<std::io::Error> for StrollError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_name_the_constraint() {
        let e = DefenceError::CaptureTooShort {
            class_id: 7,
            repetition_id: 3,
            rows: 4,
            min: 5,
        };
        assert_eq!(
            e.to_string(),
            "capture (class 7, repetition 3) has 4 rows; every capture needs more than 5"
        );

        let e = AttackError::RowCountMismatch {
            expected: 900,
            found: 899,
        };
        assert!(e.to_string().contains("expected 900 rows, found 899"));
    }

    #[test]
    fn stroll_error_is_transparent_over_validation() {
        let inner = SplitError::InsufficientCaptures {
            available: 10,
            required: 300,
        };
        let outer: StrollError = inner.clone().into();
        assert_eq!(outer.to_string(), inner.to_string());
    }

    #[test]
    fn io_error_converts() {
        let e: StrollError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(e, StrollError::Io(ref m) if m.contains("gone")));
    }
}
