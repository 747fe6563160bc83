//! # stroll-eval — Trace evaluation engine.
//!
//! Pure functions from decoded tables to verdicts and records:
//! - **Schema & shape validation** of defence traces ([`schema`]).
//! - **Utility scoring**: per-capture volume and duration statistics ([`utility`]).
//! - **Leak-resistant split** into test, verification, and train sets with
//!   keyed relabeling of repetition and capture ids ([`split`], [`relabel`]).
//! - **Attack validation and evaluation**: coverage checks, accuracy, and
//!   macro one-vs-rest ROC AUC ([`attack`], [`evaluate`], [`auc`]).
//! - **Score aggregation** into standings and the leaderboard ([`score`]).
//!
//! Nothing here touches the filesystem, the record store, or global state;
//! collaborators are passed in through the `stroll_core::traits` interfaces.

pub mod attack;
pub mod auc;
pub mod evaluate;
pub mod relabel;
pub mod schema;
pub mod score;
pub mod split;
pub mod table;
pub mod utility;

pub use attack::{validate_attack, AttackAssignment, TargetTruth};
pub use evaluate::{bind_to_matches, evaluate_attack, TargetResult};
pub use schema::validate_defence;
pub use score::{leaderboard, standing, TeamStanding};
pub use split::SplitEngine;
pub use table::{AttackTable, DefenceTable};
pub use utility::evaluate_utility;
