//! Shared helpers for the end-to-end tests.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stroll_core::context::EngineContext;
use stroll_core::error::StrollError;
use stroll_core::traits::{DatasetStore, MatchRegistry, TeamDirectory};
use stroll_core::types::{TeamContact, TeamId, VerificationRow};
use stroll_node_lib::{
    stage_upload, CsvDatasetStore, JobOutcome, Outbox, Pipeline, RocksStore, UploadJob, UploadKind,
};

/// Small exercise: 4 classes, 8 traces to classify, 5 to 7 repetitions per
/// class, captures of more than 3 rows.
pub fn test_context() -> EngineContext {
    EngineContext {
        nb_classes: 4,
        nb_traces_to_classify: 8,
        mean_reps_per_class: 6.0,
        rep_deviation: 2.0,
        min_rows_per_capture: 3,
        current_round: 1,
        ..EngineContext::default()
    }
}

/// A valid defence CSV for `ctx`, generated from `seed`.
///
/// Repetition counts fall strictly inside the allowed bounds and every
/// capture has two rows more than the minimum.
pub fn defence_csv(ctx: &EngineContext, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let (low, high) = ctx.repetition_bounds();
    let min_reps = low.floor() as u64 + 1;
    let max_reps = high.ceil() as u64 - 1;
    let rows = ctx.min_rows_per_capture + 2;

    let mut csv = String::from("class_id,repetition_id,signed_byte_count,timestamp\n");
    for class_id in 1..=ctx.nb_classes as u32 {
        let reps = rng.gen_range(min_reps..=max_reps);
        for rep in 0..reps {
            let mut timestamp = 0.0;
            for i in 0..rows {
                let magnitude = rng.gen_range(200i64..1500) * i64::from(class_id);
                let bytes = if i % 2 == 0 { -magnitude } else { magnitude };
                timestamp += rng.gen_range(0.05..0.5);
                writeln!(csv, "{class_id},{rep},{bytes},{timestamp}").unwrap();
            }
        }
    }
    csv
}

/// How a synthetic attacker assigns probabilities.
#[derive(Debug, Clone, Copy)]
pub enum Prediction {
    /// All mass on the true class.
    Perfect,
    /// All mass on the class after the true one.
    Shifted,
    /// Random distribution from the given seed.
    Random(u64),
}

/// An attack CSV covering every capture of every target.
pub fn attack_csv(
    ctx: &EngineContext,
    targets: &BTreeMap<TeamId, Vec<VerificationRow>>,
    prediction: Prediction,
) -> String {
    let n = ctx.nb_classes;
    let mut csv = String::from("team_id,capture_id");
    for column in ctx.attack_columns().iter().skip(2) {
        write!(csv, ",{column}").unwrap();
    }
    csv.push('\n');

    let seed = match prediction {
        Prediction::Random(seed) => seed,
        _ => 0,
    };
    let mut rng = StdRng::seed_from_u64(seed);
    for (&team, rows) in targets {
        for v in rows {
            let truth = v.class_id as usize - 1;
            let probabilities: Vec<f64> = match prediction {
                Prediction::Perfect => one_hot(n, truth),
                Prediction::Shifted => one_hot(n, (truth + 1) % n),
                Prediction::Random(_) => {
                    let weights: Vec<f64> = (0..n).map(|_| rng.gen_range(0.01..1.0)).collect();
                    let total: f64 = weights.iter().sum();
                    weights.iter().map(|w| w / total).collect()
                }
            };
            write!(csv, "{team},{}", v.capture_id).unwrap();
            for p in probabilities {
                write!(csv, ",{p}").unwrap();
            }
            csv.push('\n');
        }
    }
    csv
}

fn one_hot(n: usize, hot: usize) -> Vec<f64> {
    (0..n).map(|k| if k == hot { 1.0 } else { 0.0 }).collect()
}

/// Display name given to every registered team.
pub fn team_name(team: TeamId) -> String {
    format!("Walkers{team}")
}

/// A worker's storage, dataset directory, and pipeline in a temp directory.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub ctx: EngineContext,
    pub store: Arc<RocksStore>,
    pub datasets: Arc<CsvDatasetStore>,
    pub outbox: Arc<Outbox>,
    pub pipeline: Arc<Pipeline>,
}

impl Harness {
    /// Fresh harness with `teams` registered.
    pub fn new(ctx: EngineContext, teams: &[TeamId]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RocksStore::open(dir.path().join("records")).unwrap());
        let datasets = Arc::new(CsvDatasetStore::open(dir.path().join("datasets")).unwrap());
        let outbox = Arc::new(Outbox::new());
        for &team_id in teams {
            store
                .put_team(&TeamContact {
                    team_id,
                    name: team_name(team_id),
                    emails: vec![format!("team{team_id}@example.org")],
                })
                .unwrap();
        }
        let pipeline = Arc::new(Pipeline::with_store(
            ctx.clone(),
            store.clone(),
            datasets.clone(),
            outbox.clone(),
        ));
        Self {
            dir,
            ctx,
            store,
            datasets,
            outbox,
            pipeline,
        }
    }

    /// Write `contents` to a file named `name` and stage it as an upload.
    pub fn stage(&self, team: TeamId, kind: UploadKind, name: &str, contents: &str) -> UploadJob {
        let source = self.dir.path().join(name);
        fs::write(&source, contents).unwrap();
        stage_upload(&self.upload_dir(), &source, kind, team).unwrap()
    }

    /// Stage and process one upload synchronously.
    pub fn upload(
        &self,
        team: TeamId,
        kind: UploadKind,
        name: &str,
        contents: &str,
    ) -> Result<JobOutcome, StrollError> {
        self.pipeline.process(self.stage(team, kind, name, contents))
    }

    /// Contact details of a registered team.
    pub fn contact(&self, team: TeamId) -> TeamContact {
        self.store.team(team).unwrap().unwrap()
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    /// Published verification rows of every target of `attacker`.
    pub fn targets_of(&self, attacker: TeamId) -> BTreeMap<TeamId, Vec<VerificationRow>> {
        self.store
            .assigned_targets(attacker, self.ctx.current_round)
            .unwrap()
            .into_iter()
            .map(|defender| (defender, self.datasets.read_verification(defender).unwrap()))
            .collect()
    }

    /// Schedule every ordered pair of distinct `teams` for the current round.
    pub fn schedule_round_robin(&self, teams: &[TeamId]) {
        for &attacker in teams {
            for &defender in teams.iter().filter(|&&d| d != attacker) {
                self.store
                    .schedule_match(self.ctx.current_round, attacker, defender)
                    .unwrap();
            }
        }
    }
}
