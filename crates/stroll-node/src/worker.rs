//! Background job queue.
//!
//! [`spawn_worker`] starts one task that pulls [`UploadJob`]s off an unbounded
//! channel and runs them one at a time on the blocking pool. A failed job is
//! logged and dropped; nothing is retried. The worker stops once every
//! [`JobQueue`] handle is gone and the channel is drained.

use std::sync::Arc;

use stroll_core::error::StrollError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::jobs::{JobOutcome, Pipeline, UploadJob};

/// Sending side of the job queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<UploadJob>,
}

impl JobQueue {
    /// Enqueue a job. Fails only once the worker has stopped.
    pub fn submit(&self, job: UploadJob) -> Result<(), StrollError> {
        self.tx.send(job).map_err(|_| StrollError::QueueClosed)
    }
}

/// Counts of how the worker's jobs ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// Start the worker task. Must be called inside a tokio runtime.
pub fn spawn_worker(pipeline: Arc<Pipeline>) -> (JobQueue, JoinHandle<WorkerStats>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<UploadJob>();

    let handle = tokio::spawn(async move {
        let mut stats = WorkerStats::default();
        while let Some(job) = rx.recv().await {
            let team = job.team;
            let kind = job.kind;
            let pipeline = pipeline.clone();
            match tokio::task::spawn_blocking(move || pipeline.process(job)).await {
                Ok(Ok(JobOutcome::Rejected(_))) => stats.rejected += 1,
                Ok(Ok(_)) => stats.accepted += 1,
                Ok(Err(e)) => {
                    error!(team, ?kind, error = %e, "upload job failed");
                    stats.failed += 1;
                }
                Err(e) => {
                    error!(team, ?kind, error = %e, "upload job panicked");
                    stats.failed += 1;
                }
            }
        }
        info!(?stats, "job queue closed");
        stats
    });

    (JobQueue { tx }, handle)
}
