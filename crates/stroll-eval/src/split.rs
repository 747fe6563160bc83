//! Leak-resistant train/test/verification split.
//!
//! Splitting a validated defence trace:
//!
//! 1. Every distinct capture gets a new repetition id from a keyed
//!    relabeling (fresh salt per split), so the train set no longer shows
//!    which original repetitions went missing.
//! 2. The first capture of each class (original row order) is always put in
//!    the test set so every class can be scored.
//! 3. The rest of the test set is sampled uniformly without replacement from
//!    the remaining captures, up to `nb_traces_to_classify` captures.
//! 4. Test captures are relabeled a second time (new salt, over the already
//!    relabeled repetition ids) to get their published `capture_id`.
//!
//! Inputs with fewer distinct captures than the test size are rejected.

use std::collections::{BTreeSet, HashMap, HashSet};

use ordered_float::OrderedFloat;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use stroll_core::constants::RELABEL_ID_BYTES;
use stroll_core::context::EngineContext;
use stroll_core::error::SplitError;
use stroll_core::types::{
    CaptureKey, ClassId, SplitOutput, TestRow, TraceRow, VerificationRow,
};
use tracing::debug;

use crate::relabel::relabel_captures;

/// Splits defence traces into the three published datasets.
#[derive(Debug, Clone)]
pub struct SplitEngine {
    nb_traces_to_classify: usize,
    id_bytes: usize,
}

impl SplitEngine {
    pub fn new(ctx: &EngineContext) -> Self {
        Self {
            nb_traces_to_classify: ctx.nb_traces_to_classify,
            id_bytes: RELABEL_ID_BYTES,
        }
    }

    /// Override the relabeled id width (bytes, clamped to `1..=8`).
    pub fn with_id_bytes(mut self, id_bytes: usize) -> Self {
        self.id_bytes = id_bytes.clamp(1, 8);
        self
    }

    /// Split with salts and sampling drawn from the OS generator.
    pub fn split(&self, rows: &[TraceRow]) -> Result<SplitOutput, SplitError> {
        self.split_with_rng(rows, &mut OsRng)
    }

    /// Split using `rng` for both salts and sampling.
    pub fn split_with_rng<R: RngCore + CryptoRng>(
        &self,
        rows: &[TraceRow],
        rng: &mut R,
    ) -> Result<SplitOutput, SplitError> {
        let captures = distinct_captures(rows);
        if captures.len() < self.nb_traces_to_classify {
            return Err(SplitError::InsufficientCaptures {
                available: captures.len(),
                required: self.nb_traces_to_classify,
            });
        }

        let (guaranteed, remaining) = first_capture_per_class(&captures);
        if guaranteed.len() > self.nb_traces_to_classify {
            return Err(SplitError::ClassesExceedTestSize {
                classes: guaranteed.len(),
                test_size: self.nb_traces_to_classify,
            });
        }

        let new_reps = relabel_captures(&captures, rng, self.id_bytes)?;

        let to_sample = self.nb_traces_to_classify - guaranteed.len();
        let mut sampled: Vec<usize> =
            rand::seq::index::sample(rng, remaining.len(), to_sample).into_vec();
        sampled.sort_unstable();

        let mut test_captures = guaranteed;
        test_captures.extend(sampled.into_iter().map(|i| remaining[i]));

        // Second relabeling runs over (class_id, relabeled repetition id).
        let relabeled: Vec<CaptureKey> = test_captures
            .iter()
            .map(|key| CaptureKey {
                class_id: key.class_id,
                repetition_id: new_reps[key],
            })
            .collect();
        let second = relabel_captures(&relabeled, rng, self.id_bytes)?;
        let capture_ids: HashMap<CaptureKey, u64> = test_captures
            .iter()
            .zip(&relabeled)
            .map(|(original, relabeled)| (*original, second[relabeled]))
            .collect();

        let mut test = Vec::new();
        let mut verification = BTreeSet::new();
        let mut train = Vec::with_capacity(rows.len());
        for row in rows {
            let key = row.capture();
            match capture_ids.get(&key) {
                Some(&capture_id) => {
                    test.push(TestRow {
                        capture_id,
                        signed_byte_count: row.signed_byte_count,
                        timestamp: row.timestamp,
                    });
                    verification.insert(VerificationRow {
                        capture_id,
                        class_id: row.class_id,
                    });
                }
                None => train.push(TraceRow {
                    repetition_id: new_reps[&key],
                    ..*row
                }),
            }
        }

        test.sort_by_key(|r| (r.capture_id, OrderedFloat(r.timestamp)));
        train.sort_by_key(|r| (r.class_id, r.repetition_id));

        debug!(
            captures = captures.len(),
            test_rows = test.len(),
            train_rows = train.len(),
            "trace split"
        );

        Ok(SplitOutput {
            test,
            verification: verification.into_iter().collect(),
            train,
        })
    }
}

/// Distinct captures in order of first appearance.
fn distinct_captures(rows: &[TraceRow]) -> Vec<CaptureKey> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(TraceRow::capture)
        .filter(|key| seen.insert(*key))
        .collect()
}

/// Split captures into the first one of each class and all the others.
fn first_capture_per_class(captures: &[CaptureKey]) -> (Vec<CaptureKey>, Vec<CaptureKey>) {
    let mut classes: HashSet<ClassId> = HashSet::new();
    captures
        .iter()
        .copied()
        .partition(|key| classes.insert(key.class_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    /// `reps[c]` repetitions for class `c + 1`, `rows` rows each.
    fn trace(reps: &[u64], rows: usize) -> Vec<TraceRow> {
        let mut out = Vec::new();
        for (c, &n) in reps.iter().enumerate() {
            for rep in 0..n {
                for i in 0..rows {
                    out.push(TraceRow {
                        class_id: c as ClassId + 1,
                        repetition_id: rep,
                        signed_byte_count: (i as i64 + 1) * if i % 2 == 0 { -100 } else { 60 },
                        timestamp: (rows - i) as f64 * 0.01,
                    });
                }
            }
        }
        out
    }

    fn engine(test_size: usize) -> SplitEngine {
        SplitEngine::new(&EngineContext {
            nb_traces_to_classify: test_size,
            ..EngineContext::default()
        })
    }

    fn captures_per_class_in_train(out: &SplitOutput) -> BTreeMap<ClassId, usize> {
        let mut reps: BTreeMap<ClassId, HashSet<u64>> = BTreeMap::new();
        for row in &out.train {
            reps.entry(row.class_id).or_default().insert(row.repetition_id);
        }
        reps.into_iter().map(|(c, r)| (c, r.len())).collect()
    }

    fn captures_per_class_in_test(out: &SplitOutput) -> BTreeMap<ClassId, usize> {
        let mut counts = BTreeMap::new();
        for v in &out.verification {
            *counts.entry(v.class_id).or_default() += 1;
        }
        counts
    }

    #[test]
    fn reference_scenario_row_counts() {
        let reps: Vec<u64> = (0..100).map(|c| 32 + (c % 8)).collect();
        let rows = trace(&reps, 6);
        let out = engine(300)
            .split_with_rng(&rows, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(out.test.len() + out.train.len(), rows.len());
        assert_eq!(out.test.len(), 300 * 6);
        assert_eq!(out.verification.len(), 300);
        assert_eq!(out.test_capture_ids(), out.verification_capture_ids());
        assert_eq!(captures_per_class_in_test(&out).len(), 100);
    }

    #[test]
    fn every_class_in_test_even_when_test_size_equals_classes() {
        let rows = trace(&[5, 5, 5, 5], 3);
        let out = engine(4)
            .split_with_rng(&rows, &mut StdRng::seed_from_u64(8))
            .unwrap();
        let counts = captures_per_class_in_test(&out);
        assert_eq!(counts.values().copied().collect::<Vec<_>>(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn insufficient_captures_fail_fast() {
        let rows = trace(&[2, 2], 3);
        let err = engine(5)
            .split_with_rng(&rows, &mut StdRng::seed_from_u64(9))
            .unwrap_err();
        assert_eq!(
            err,
            SplitError::InsufficientCaptures {
                available: 4,
                required: 5
            }
        );
    }

    #[test]
    fn too_many_classes_for_test_size() {
        let rows = trace(&[2, 2, 2], 3);
        let err = engine(2)
            .split_with_rng(&rows, &mut StdRng::seed_from_u64(10))
            .unwrap_err();
        assert_eq!(
            err,
            SplitError::ClassesExceedTestSize {
                classes: 3,
                test_size: 2
            }
        );
    }

    #[test]
    fn outputs_are_sorted() {
        let rows = trace(&[6, 6, 6], 4);
        let out = engine(7)
            .split_with_rng(&rows, &mut StdRng::seed_from_u64(11))
            .unwrap();
        assert!(out.test.windows(2).all(|w| {
            (w[0].capture_id, OrderedFloat(w[0].timestamp))
                <= (w[1].capture_id, OrderedFloat(w[1].timestamp))
        }));
        assert!(out.verification.windows(2).all(|w| w[0].capture_id < w[1].capture_id));
        assert!(out
            .train
            .windows(2)
            .all(|w| (w[0].class_id, w[0].repetition_id) <= (w[1].class_id, w[1].repetition_id)));
    }

    #[test]
    fn train_repetition_ids_are_relabeled() {
        let rows = trace(&[10, 10], 3);
        let out = engine(4)
            .split_with_rng(&rows, &mut StdRng::seed_from_u64(12))
            .unwrap();
        // Original ids are 0..10; 48-bit labels landing there is vanishingly unlikely.
        assert!(out.train.iter().any(|r| r.repetition_id >= 10));
        let original: HashSet<u64> = (0..10).collect();
        let relabeled: HashSet<u64> = out.train.iter().map(|r| r.repetition_id).collect();
        assert!(relabeled.is_disjoint(&original));
    }

    #[test]
    fn different_runs_relabel_differently() {
        let rows = trace(&[8, 8, 8], 3);
        let e = engine(6);
        let a = e.split_with_rng(&rows, &mut StdRng::seed_from_u64(13)).unwrap();
        let b = e.split_with_rng(&rows, &mut StdRng::seed_from_u64(14)).unwrap();
        assert_ne!(a.verification_capture_ids(), b.verification_capture_ids());
    }

    #[test]
    fn same_seed_is_reproducible() {
        let rows = trace(&[8, 8, 8], 3);
        let e = engine(6);
        let a = e.split_with_rng(&rows, &mut StdRng::seed_from_u64(15)).unwrap();
        let b = e.split_with_rng(&rows, &mut StdRng::seed_from_u64(15)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn narrow_ids_surface_collisions() {
        let reps = vec![30u64; 10];
        let rows = trace(&reps, 2);
        let err = engine(20)
            .with_id_bytes(1)
            .split_with_rng(&rows, &mut StdRng::seed_from_u64(16))
            .unwrap_err();
        assert!(matches!(err, SplitError::RelabelCollision { .. }));
    }

    #[test]
    fn os_rng_split_works() {
        let rows = trace(&[4, 4], 3);
        let out = engine(3).split(&rows).unwrap();
        assert_eq!(out.verification.len(), 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn split_invariants(
            seed in any::<u64>(),
            reps in prop::collection::vec(1u64..8, 1..12),
            rows_per_capture in 1usize..5,
            extra in 0usize..20,
        ) {
            let rows = trace(&reps, rows_per_capture);
            let total: usize = reps.iter().sum::<u64>() as usize;
            let test_size = (reps.len() + extra).min(total);
            let out = engine(test_size)
                .split_with_rng(&rows, &mut StdRng::seed_from_u64(seed))
                .unwrap();

            // Exact test size, matching verification, row-level partition.
            prop_assert_eq!(out.verification.len(), test_size);
            prop_assert_eq!(out.test_capture_ids(), out.verification_capture_ids());
            prop_assert_eq!(out.test.len(), test_size * rows_per_capture);
            prop_assert_eq!(out.test.len() + out.train.len(), rows.len());

            // Every class is in the test set; per class, train and test captures
            // add up to the original repetitions.
            let test_counts = captures_per_class_in_test(&out);
            let train_counts = captures_per_class_in_train(&out);
            prop_assert_eq!(test_counts.len(), reps.len());
            for (c, &n) in reps.iter().enumerate() {
                let class_id = c as ClassId + 1;
                let in_test = test_counts.get(&class_id).copied().unwrap_or(0);
                let in_train = train_counts.get(&class_id).copied().unwrap_or(0);
                prop_assert!(in_test >= 1);
                prop_assert_eq!(in_test + in_train, n as usize);
            }

            // Each test capture id carries exactly one capture's rows.
            let mut rows_per_id: HashMap<u64, usize> = HashMap::new();
            for r in &out.test {
                *rows_per_id.entry(r.capture_id).or_default() += 1;
            }
            prop_assert!(rows_per_id.values().all(|&n| n == rows_per_capture));
        }
    }
}
