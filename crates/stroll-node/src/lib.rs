//! # stroll-node — Storage, upload jobs, and orchestration.
//!
//! Wires the pure evaluation engine to its collaborators:
//! - [`storage::RocksStore`] — records, matches, and teams in RocksDB
//! - [`datasets::CsvDatasetStore`] — published split files as CSV
//! - [`jobs::Pipeline`] — one upload evaluated end to end
//! - [`worker`] — background queue running jobs one at a time
//! - [`notify`] — outcome notifications
//! - [`schedule`] — shuffled circular match generation per round
//! - [`config::NodeConfig`] — layered configuration

pub mod config;
pub mod datasets;
pub mod jobs;
pub mod notify;
pub mod schedule;
pub mod storage;
pub mod worker;

pub use config::NodeConfig;
pub use datasets::CsvDatasetStore;
pub use jobs::{stage_upload, JobOutcome, Pipeline, ScoredMatch, UploadJob, UploadKind};
pub use notify::{LogNotifier, Outbox, SentMessage};
pub use schedule::generate_matches;
pub use storage::RocksStore;
pub use worker::{spawn_worker, JobQueue, WorkerStats};
