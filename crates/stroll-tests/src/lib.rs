//! End-to-end test suite for the stroll evaluation engine.
//!
//! The tests in `tests/` drive whole rounds through the upload pipeline:
//! defences, match scheduling, attacks, and the resulting leaderboard.

pub mod helpers;
