//! Property-based tests over whole upload rounds.
//!
//! Every case builds a fresh harness (RocksDB, dataset directory, pipeline)
//! and drives randomly generated but well-formed uploads through it, so the
//! case counts stay small.
//!
//! Properties:
//! - Any valid defence is accepted with a finite, positive utility
//! - Any valid attack on valid defences is accepted with every result in range
//! - Row order in an attack file never changes its score
//! - Dropping any row of a valid attack is a rejection, never a fault

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use stroll_core::types::TeamId;
use stroll_node_lib::{JobOutcome, UploadKind};
use stroll_tests::helpers::*;

const TEAMS: [TeamId; 3] = [1, 2, 3];

/// Harness with every team's defence from `seeds` accepted and a round robin
/// scheduled.
fn round_with_defences(seeds: [u64; 3]) -> Harness {
    let h = Harness::new(test_context(), &TEAMS);
    for (team, seed) in TEAMS.into_iter().zip(seeds) {
        let csv = defence_csv(&h.ctx, seed);
        match h.upload(team, UploadKind::Defence, "defence.csv", &csv).unwrap() {
            JobOutcome::DefenceAccepted(record) => {
                let utility = record.utility.aggregated_score();
                assert!(utility.is_finite() && utility > 0.0, "utility {utility}");
            }
            other => panic!("defence of team {team} not accepted: {other:?}"),
        }
    }
    h.schedule_round_robin(&TEAMS);
    h
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn valid_attacks_score_within_range(
        seeds in any::<[u64; 3]>(),
        attacker_index in 0usize..3,
        prediction_seed in any::<u64>(),
    ) {
        let h = round_with_defences(seeds);
        let attacker = TEAMS[attacker_index];
        let csv = attack_csv(&h.ctx, &h.targets_of(attacker), Prediction::Random(prediction_seed));

        let scored = match h.upload(attacker, UploadKind::Attack, "attack.csv", &csv).unwrap() {
            JobOutcome::AttackAccepted(scored) => scored,
            other => return Err(TestCaseError::fail(format!("attack rejected: {other:?}"))),
        };
        prop_assert_eq!(scored.len(), TEAMS.len() - 1);
        for s in &scored {
            let r = s.record.result;
            prop_assert!((0.0..=1.0).contains(&r.accuracy), "accuracy {}", r.accuracy);
            prop_assert!(
                (0.0..=1.0).contains(&r.discrimination_score),
                "discrimination {}",
                r.discrimination_score
            );
            prop_assert!(
                (0.0..=1000.0).contains(&r.aggregated_result()),
                "aggregated {}",
                r.aggregated_result()
            );
        }
    }

    #[test]
    fn row_order_does_not_change_the_score(seeds in any::<[u64; 3]>(), shuffle_seed in any::<u64>()) {
        let h = round_with_defences(seeds);
        let csv = attack_csv(&h.ctx, &h.targets_of(1), Prediction::Random(shuffle_seed));
        let mut lines: Vec<&str> = csv.lines().collect();
        let header = lines.remove(0);
        lines.shuffle(&mut StdRng::seed_from_u64(shuffle_seed));
        let shuffled = format!("{header}\n{}\n", lines.join("\n"));

        let score = |name: &str, contents: &str| match h.upload(1, UploadKind::Attack, name, contents) {
            Ok(JobOutcome::AttackAccepted(scored)) => scored
                .iter()
                .map(|s| (s.defender, s.record.result))
                .collect::<Vec<_>>(),
            other => panic!("attack {name} not accepted: {other:?}"),
        };
        prop_assert_eq!(score("ordered", &csv), score("shuffled", &shuffled));
    }

    #[test]
    fn dropping_a_row_is_always_rejected(seeds in any::<[u64; 3]>(), dropped in any::<prop::sample::Index>()) {
        let h = round_with_defences(seeds);
        let csv = attack_csv(&h.ctx, &h.targets_of(2), Prediction::Perfect);
        let mut lines: Vec<&str> = csv.lines().collect();
        let row = 1 + dropped.index(lines.len() - 1);
        lines.remove(row);
        let truncated = format!("{}\n", lines.join("\n"));

        let outcome = h.upload(2, UploadKind::Attack, "short.csv", &truncated).unwrap();
        let JobOutcome::Rejected(message) = outcome else {
            return Err(TestCaseError::fail("truncated attack accepted"));
        };
        let expected = h.ctx.nb_traces_to_classify * 2;
        prop_assert!(
            message.contains(&format!("expected {expected} rows, found {}", expected - 1)),
            "{message}"
        );
    }
}
