//! Upload jobs: one uploaded file evaluated end to end.
//!
//! A job runs strictly in order: decode, validate, compute, write the split
//! files, persist the records, notify the team. Every [`UploadJob`] owns a
//! [`StagedUpload`] guard, so the staged file is removed when the job is
//! dropped: after processing, or unprocessed when the queue is gone.
//!
//! Validation failures are not errors: they end the job with
//! [`JobOutcome::Rejected`] and a failure notification carrying the first
//! violated constraint. Storage and precondition faults are returned as
//! [`StrollError`] without notifying the team.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use stroll_core::constants::EXERCISE_NAME;
use stroll_core::context::EngineContext;
use stroll_core::error::{AttackError, DefenceError, StrollError};
use stroll_core::traits::{DatasetStore, MatchRegistry, Notifier, RecordStore, TeamDirectory};
use stroll_core::types::{AttackRecord, DefenceRecord, TeamContact, TeamId};
use stroll_eval::{
    bind_to_matches, evaluate_attack, evaluate_utility, validate_attack, validate_defence,
    AttackAssignment, AttackTable, DefenceTable, SplitEngine,
};
use tracing::{info, warn};

use crate::storage::RocksStore;

/// What an uploaded file claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Defence,
    Attack,
}

/// A staged upload waiting to be evaluated.
#[derive(Debug)]
pub struct UploadJob {
    pub kind: UploadKind,
    pub team: TeamId,
    /// Name of the upload as the team knows it, without extension.
    pub name: String,
    staged: StagedUpload,
}

impl UploadJob {
    /// Job for a file already in the upload directory. Takes ownership of
    /// the file: it is deleted when the job is dropped.
    pub fn new(
        kind: UploadKind,
        team: TeamId,
        path: impl Into<PathBuf>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            team,
            name: name.into(),
            staged: StagedUpload::new(path),
        }
    }

    /// Staged copy of the upload.
    pub fn path(&self) -> &Path {
        self.staged.path()
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    DefenceAccepted(DefenceRecord),
    AttackAccepted(Vec<ScoredMatch>),
    /// The upload broke a constraint; the message was sent to the team.
    Rejected(String),
}

/// Attack record of one match, with the attacked team.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub defender: TeamId,
    pub record: AttackRecord,
}

/// Deletes the staged file when dropped.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove upload"),
        }
    }
}

/// Copy `source` into `upload_dir` and describe the job that evaluates it.
///
/// The staged name is prefixed with the current time so two uploads of the
/// same file never collide.
pub fn stage_upload(
    upload_dir: &Path,
    source: &Path,
    kind: UploadKind,
    team: TeamId,
) -> Result<UploadJob, StrollError> {
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StrollError::Io(format!("invalid upload path: {}", source.display())))?;
    let name = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string();

    fs::create_dir_all(upload_dir)?;
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f");
    let path = upload_dir.join(format!("{stamp}_team{team}_{file_name}"));
    let job = UploadJob::new(kind, team, path, name);
    // A partial copy is removed with the job.
    fs::copy(source, job.path())?;
    Ok(job)
}

/// Runs upload jobs against the engine and its collaborators.
pub struct Pipeline {
    ctx: EngineContext,
    records: Arc<dyn RecordStore>,
    registry: Arc<dyn MatchRegistry>,
    teams: Arc<dyn TeamDirectory>,
    datasets: Arc<dyn DatasetStore>,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    pub fn new(
        ctx: EngineContext,
        records: Arc<dyn RecordStore>,
        registry: Arc<dyn MatchRegistry>,
        teams: Arc<dyn TeamDirectory>,
        datasets: Arc<dyn DatasetStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            ctx,
            records,
            registry,
            teams,
            datasets,
            notifier,
        }
    }

    /// Pipeline whose records, matches, and teams all live in `store`.
    pub fn with_store(
        ctx: EngineContext,
        store: Arc<RocksStore>,
        datasets: Arc<dyn DatasetStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new(ctx, store.clone(), store.clone(), store, datasets, notifier)
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Evaluate one upload. The staged file is removed on every path.
    pub fn process(&self, job: UploadJob) -> Result<JobOutcome, StrollError> {
        let team = self
            .teams
            .team(job.team)?
            .ok_or(StrollError::UnknownTeam(job.team))?;
        let bytes = fs::read(job.path())?;

        let outcome = match job.kind {
            UploadKind::Defence => self.process_defence(&team, &bytes)?,
            UploadKind::Attack => self.process_attack(&team, &bytes)?,
        };

        let (subject, body) = match &outcome {
            JobOutcome::DefenceAccepted(record) => (
                subject_line(true),
                format!(
                    "Hey Team {},\nYour upload {} succeeded. Here are your utility results:\n{}\n",
                    team.name, job.name, record.utility
                ),
            ),
            JobOutcome::AttackAccepted(records) => (
                subject_line(true),
                format!(
                    "Hey Team {},\nYour upload {} succeeded. Here are your attack results:\n{}",
                    team.name,
                    job.name,
                    describe_attacks(records)
                ),
            ),
            JobOutcome::Rejected(message) => {
                warn!(team = team.team_id, upload = %job.name, reason = %message, "upload rejected");
                (
                    subject_line(false),
                    format!(
                        "Hey Team {},\nYour upload {} failed.\n{}\n",
                        team.name, job.name, message
                    ),
                )
            }
        };
        self.notifier.send(&subject, &team.emails, &body)?;
        Ok(outcome)
    }

    fn process_defence(&self, team: &TeamContact, bytes: &[u8]) -> Result<JobOutcome, StrollError> {
        if !self.ctx.defence_phase {
            return Ok(JobOutcome::Rejected(DefenceError::PhaseClosed.to_string()));
        }
        let table = match DefenceTable::read_csv(bytes) {
            Ok(table) => table,
            Err(e) => return Ok(JobOutcome::Rejected(e.to_string())),
        };
        if let Err(e) = validate_defence(&table, &self.ctx) {
            return Ok(JobOutcome::Rejected(e.to_string()));
        }

        let utility = evaluate_utility(&table.rows);
        let split = SplitEngine::new(&self.ctx).split(&table.rows)?;
        self.datasets.write_split(team.team_id, &split)?;

        let record = DefenceRecord {
            team_id: team.team_id,
            round: self.ctx.current_round,
            utility,
            upload_digest: hex::encode(Sha256::digest(bytes)),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        self.records.insert_defence(&record)?;
        info!(
            team = team.team_id,
            round = record.round,
            score = utility.aggregated_score(),
            "defence accepted"
        );
        Ok(JobOutcome::DefenceAccepted(record))
    }

    fn process_attack(&self, team: &TeamContact, bytes: &[u8]) -> Result<JobOutcome, StrollError> {
        if !self.ctx.attack_phase {
            return Ok(JobOutcome::Rejected(AttackError::PhaseClosed.to_string()));
        }
        let table = match AttackTable::read_csv(bytes, &self.ctx) {
            Ok(table) => table,
            Err(e) => return Ok(JobOutcome::Rejected(e.to_string())),
        };
        let round = self.ctx.current_round;
        let assignment = AttackAssignment::resolve(team.team_id, round, self.registry.as_ref())?;
        let truth = match validate_attack(&table, &assignment, &self.ctx, self.datasets.as_ref()) {
            Ok(truth) => truth,
            Err(StrollError::Attack(e)) => return Ok(JobOutcome::Rejected(e.to_string())),
            Err(e) => return Err(e),
        };

        let results = evaluate_attack(&table, &truth)?;
        let bound = bind_to_matches(&results, round, team.team_id, self.registry.as_ref())?;

        let created_at_ms = chrono::Utc::now().timestamp_millis();
        let mut scored = Vec::with_capacity(bound.len());
        for (m, result) in bound {
            let record = AttackRecord {
                match_id: m.id,
                result,
                created_at_ms,
            };
            self.records.insert_attack(&record)?;
            scored.push(ScoredMatch {
                defender: m.defender,
                record,
            });
        }
        info!(team = team.team_id, round, matches = scored.len(), "attack accepted");
        Ok(JobOutcome::AttackAccepted(scored))
    }
}

fn describe_attacks(scored: &[ScoredMatch]) -> String {
    scored
        .iter()
        .map(|s| format!("against team {}: {}\n", s.defender, s.record.result))
        .collect()
}

fn subject_line(succeeded: bool) -> String {
    let verdict = if succeeded { "succeeded" } else { "failed" };
    format!("Your upload for {EXERCISE_NAME} {verdict}")
}
