//! Core domain types: trace rows, split outputs, attack rows, and the
//! immutable records produced by the engine.
//!
//! Identifiers are plain integers. Records derive both `serde` (for CSV and
//! display surfaces) and `bincode` (for the record store).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{ATTACK_RESULT_SCALE, UTILITY_SCORE_NUMERATOR};

/// Destination class identifier, `1..=nb_classes`.
pub type ClassId = u32;
/// Team identifier assigned by the external team registry.
pub type TeamId = u32;
/// Exercise round number.
pub type Round = u32;
/// Match identifier assigned when the scheduler creates a match.
pub type MatchId = u64;
/// Randomized identifier of a published test capture.
pub type CaptureId = u64;

/// One packet observation of a defence trace.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TraceRow {
    pub class_id: ClassId,
    pub repetition_id: u64,
    /// Negative for inbound packets, non-negative for outbound.
    pub signed_byte_count: i64,
    /// Seconds since the start of the capture.
    pub timestamp: f64,
}

impl TraceRow {
    /// The capture this row belongs to.
    pub fn capture(&self) -> CaptureKey {
        CaptureKey {
            class_id: self.class_id,
            repetition_id: self.repetition_id,
        }
    }

    pub fn is_inbound(&self) -> bool {
        self.signed_byte_count < 0
    }
}

/// Identity of a capture: one simulated browsing session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaptureKey {
    pub class_id: ClassId,
    pub repetition_id: u64,
}

/// A published test row: no class label, randomized capture id.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TestRow {
    pub capture_id: CaptureId,
    pub signed_byte_count: i64,
    pub timestamp: f64,
}

/// Ground truth for one test capture. Never published to attackers.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VerificationRow {
    pub capture_id: CaptureId,
    pub class_id: ClassId,
}

/// The three disjoint datasets derived from one defence trace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SplitOutput {
    /// Sorted by `(capture_id, timestamp)`.
    pub test: Vec<TestRow>,
    /// Sorted by `capture_id`, one row per test capture.
    pub verification: Vec<VerificationRow>,
    /// Sorted by `(class_id, repetition_id)` with relabeled repetition ids.
    pub train: Vec<TraceRow>,
}

impl SplitOutput {
    /// Distinct capture ids present in the test set.
    pub fn test_capture_ids(&self) -> BTreeSet<CaptureId> {
        self.test.iter().map(|r| r.capture_id).collect()
    }

    /// Capture ids present in the verification set.
    pub fn verification_capture_ids(&self) -> BTreeSet<CaptureId> {
        self.verification.iter().map(|r| r.capture_id).collect()
    }
}

/// Files published for each defending team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitFile {
    Test,
    Train,
    Verification,
}

impl SplitFile {
    pub const ALL: [SplitFile; 3] = [Self::Test, Self::Train, Self::Verification];

    /// File stem for a team, e.g. `team_4_verif`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stroll_core::types::SplitFile;
    /// assert_eq!(SplitFile::Test.file_stem(4), "team_4_test");
    /// assert_eq!(SplitFile::Verification.file_stem(4), "team_4_verif");
    /// ```
    pub fn file_stem(&self, team_id: TeamId) -> String {
        let suffix = match self {
            Self::Test => "test",
            Self::Train => "train",
            Self::Verification => "verif",
        };
        format!("team_{team_id}_{suffix}")
    }
}

/// One row of an attack submission.
#[derive(Clone, Debug, PartialEq)]
pub struct AttackRow {
    pub team_id: TeamId,
    pub capture_id: CaptureId,
    /// `probabilities[k]` is the submitted probability of class `k + 1`.
    pub probabilities: Vec<f64>,
}

impl AttackRow {
    /// Hard classification: class with the highest probability, first one on ties.
    pub fn predicted_class(&self) -> Option<ClassId> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &p) in self.probabilities.iter().enumerate() {
            match best {
                Some((_, b)) if p <= b => {}
                _ => best = Some((i, p)),
            }
        }
        best.map(|(i, _)| i as ClassId + 1)
    }
}

/// Bandwidth and time cost of a defence: max/mean/median of the per-capture
/// inbound volume, outbound volume, and duration.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct UtilityRecord {
    /// Inbound volumes are negative byte totals.
    pub max_inbound_volume: i64,
    pub mean_inbound_volume: f64,
    pub median_inbound_volume: f64,
    pub max_outbound_volume: i64,
    pub mean_outbound_volume: f64,
    pub median_outbound_volume: f64,
    pub max_duration: f64,
    pub mean_duration: f64,
    pub median_duration: f64,
}

impl UtilityRecord {
    /// Leaderboard utility score, `64 / log10(|median_in * median_out * median_duration|)`.
    ///
    /// Higher is better. Degenerate traces whose product magnitude is at most
    /// one produce a non-finite or negative score; callers treat that as-is.
    ///
    /// # Examples
    ///
    /// ```
    /// use stroll_core::types::UtilityRecord;
    /// let u = UtilityRecord {
    ///     max_inbound_volume: -400, mean_inbound_volume: -500.0, median_inbound_volume: -500.0,
    ///     max_outbound_volume: 400, mean_outbound_volume: 300.0, median_outbound_volume: 300.0,
    ///     max_duration: 3.0, mean_duration: 2.0, median_duration: 2.0,
    /// };
    /// assert!((u.aggregated_score() - 11.684970447723954).abs() < 1e-9);
    /// ```
    pub fn aggregated_score(&self) -> f64 {
        let product =
            self.median_inbound_volume * self.median_outbound_volume * self.median_duration;
        UTILITY_SCORE_NUMERATOR / product.abs().log10()
    }
}

impl fmt::Display for UtilityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "median inbound volume: {:.0} bytes, median outbound volume: {:.0} bytes, median duration: {:.3} seconds",
            self.median_inbound_volume.abs(),
            self.median_outbound_volume,
            self.median_duration
        )
    }
}

/// Performance of one attack against one defender.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct AttackResult {
    /// Fraction of captures whose hard classification is correct, in `[0, 1]`.
    pub accuracy: f64,
    /// Macro one-vs-rest ROC AUC of the submitted probabilities.
    pub discrimination_score: f64,
}

impl AttackResult {
    /// `1000 * discrimination_score * accuracy`.
    pub fn aggregated_result(&self) -> f64 {
        ATTACK_RESULT_SCALE * self.discrimination_score * self.accuracy
    }
}

impl fmt::Display for AttackResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy: {:.4}, discrimination score: {:.5}",
            self.accuracy, self.discrimination_score
        )
    }
}

/// Accepted defence upload. Append-only; the latest per team and round counts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct DefenceRecord {
    pub team_id: TeamId,
    pub round: Round,
    pub utility: UtilityRecord,
    /// Hex SHA-256 of the uploaded file.
    pub upload_digest: String,
    /// Unix milliseconds.
    pub created_at_ms: i64,
}

/// Accepted attack against one match. Append-only; the latest per match counts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct AttackRecord {
    pub match_id: MatchId,
    pub result: AttackResult,
    /// Unix milliseconds.
    pub created_at_ms: i64,
}

/// A scheduled pairing: `attacker` attacks `defender` during `round`.
///
/// Unique per `(round, attacker, defender)`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, bincode::Encode, bincode::Decode)]
pub struct Match {
    pub id: MatchId,
    pub round: Round,
    pub attacker: TeamId,
    pub defender: TeamId,
}

/// Name and notification addresses of a team.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct TeamContact {
    pub team_id: TeamId,
    pub name: String,
    pub emails: Vec<String>,
}
