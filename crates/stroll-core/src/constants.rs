//! Exercise constants: schema column names, scoring scale factors, and the
//! defaults for every [`EngineContext`](crate::context::EngineContext) option.

/// Number of destination classes a defence trace must cover.
pub const DEFAULT_NB_CLASSES: usize = 100;

/// Number of captures published in every test set.
pub const DEFAULT_NB_TRACES_TO_CLASSIFY: usize = 300;

/// Expected number of repetitions recorded for each class.
pub const DEFAULT_MEAN_REPS_PER_CLASS: f64 = 35.0;

/// Allowed (exclusive) deviation from [`DEFAULT_MEAN_REPS_PER_CLASS`].
pub const DEFAULT_REP_DEVIATION: f64 = 5.0;

/// A capture must contain strictly more rows than this.
pub const DEFAULT_MIN_ROWS_PER_CAPTURE: usize = 5;

/// Round in progress when nothing else is configured.
pub const DEFAULT_ROUND: u32 = 1;

/// Defenders assigned to each attacker when a round is generated.
pub const DEFAULT_MATCHES_PER_TEAM: usize = 3;

// --- Defence schema ---

pub const CLASS_ID_COLUMN: &str = "class_id";
pub const REPETITION_ID_COLUMN: &str = "repetition_id";
pub const SIGNED_BYTE_COUNT_COLUMN: &str = "signed_byte_count";
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Columns of an uploaded defence trace (order-independent).
pub const DEFENCE_COLUMNS: [&str; 4] = [
    CLASS_ID_COLUMN,
    REPETITION_ID_COLUMN,
    SIGNED_BYTE_COUNT_COLUMN,
    TIMESTAMP_COLUMN,
];

// --- Attack schema ---

pub const TEAM_ID_COLUMN: &str = "team_id";
pub const CAPTURE_ID_COLUMN: &str = "capture_id";

/// Probability columns are named `probability_class_1 ... probability_class_N`.
pub const PROBABILITY_COLUMN_PREFIX: &str = "probability_class_";

/// Maximum `|sum(probabilities) - 1|` accepted for one submitted row.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-10;

// --- Scoring ---

/// Numerator of the utility score: `64 / log10(|in * out * duration|)`.
pub const UTILITY_SCORE_NUMERATOR: f64 = 64.0;

/// Scale applied to `discrimination * accuracy` for display.
pub const ATTACK_RESULT_SCALE: f64 = 1000.0;

/// Attack performance used for teams that have not finished every match.
///
/// Sits below what an uninformed classifier scores on a 100-class test set
/// (`1000 * 0.5 * 0.01 = 5`), so unfinished attackers are never rewarded.
pub const INCOMPLETE_ATTACK_PERFORMANCE: f64 = 1.0;

// --- Relabeling ---

/// Bytes of the keyed hash kept for a relabeled identifier (48-bit ids).
pub const RELABEL_ID_BYTES: usize = 6;

/// Salt redraws allowed before a relabeling collision becomes fatal.
pub const MAX_RELABEL_ATTEMPTS: u32 = 4;

// --- Notifications ---

pub const EXERCISE_NAME: &str = "Secret Race Strolling";
