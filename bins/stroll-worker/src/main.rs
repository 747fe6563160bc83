//! stroll-worker — Evaluation worker for the Secret Race Strolling exercise.
//!
//! Stages uploaded defence and attack files, evaluates them on a background
//! job queue, and reports standings. Team registration and match scheduling
//! are exposed for the administrators of a round.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use stroll_core::context::Phase;
use stroll_core::traits::TeamDirectory;
use stroll_core::types::{Round, TeamContact, TeamId};
use stroll_eval::{leaderboard, standing, TeamStanding};
use stroll_node_lib::{
    generate_matches, spawn_worker, stage_upload, CsvDatasetStore, LogNotifier, NodeConfig,
    Pipeline, RocksStore, UploadKind,
};
use tracing::info;

/// Secret Race Strolling evaluation worker.
#[derive(Parser, Debug)]
#[command(name = "stroll-worker", version, about = "Trace evaluation worker")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Configuration file (TOML). Environment variables prefixed with
    /// `STROLL_` override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for records, datasets, and staged uploads
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Round to evaluate and report (defaults to the configured round)
    #[arg(long, global = true)]
    round: Option<Round>,

    /// Uploads to accept (defaults to the configured phase flags)
    #[arg(long, global = true, value_enum)]
    phase: Option<PhaseArg>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate defence trace uploads.
    Defence(UploadArgs),
    /// Evaluate attack prediction uploads.
    Attack(UploadArgs),
    /// Register a team or replace its contact details.
    RegisterTeam {
        /// Team id
        #[arg(long)]
        id: TeamId,
        /// Display name
        #[arg(long)]
        name: String,
        /// Notification addresses (comma-separated)
        #[arg(long, value_delimiter = ',')]
        emails: Vec<String>,
    },
    /// Schedule an attacker against a defender for the round.
    ScheduleMatch {
        #[arg(long)]
        attacker: TeamId,
        #[arg(long)]
        defender: TeamId,
    },
    /// Generate the matches of the round: every registered team attacks
    /// the next teams of a shuffled circle.
    GenerateMatches {
        /// Defenders per attacker (defaults to the configured value)
        #[arg(long)]
        matches_per_team: Option<usize>,
    },
    /// Show the scores of one team.
    Standing {
        #[arg(long)]
        team: TeamId,
    },
    /// Show every team's scores, best total first.
    Leaderboard,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PhaseArg {
    Defence,
    Attack,
    Both,
    None,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Defence => Phase::Defence,
            PhaseArg::Attack => Phase::Attack,
            PhaseArg::Both => Phase::Both,
            PhaseArg::None => Phase::None,
        }
    }
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Uploading team
    #[arg(long)]
    team: TeamId,

    /// CSV files to evaluate, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl GlobalArgs {
    fn into_config(self) -> Result<NodeConfig> {
        let mut config = NodeConfig::load(self.config.as_deref())
            .context("failed to load configuration")?;
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(round) = self.round {
            config.engine = config.engine.for_round(round);
        }
        if let Some(phase) = self.phase {
            config.engine = config.engine.with_phase(phase.into());
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.global.into_config()?;
    init_logging(&config.log_level, &config.log_format);

    info!("stroll-worker v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("round: {}", config.engine.current_round);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;
    let store = Arc::new(RocksStore::open(config.db_path()).context("failed to open record store")?);
    let round = config.engine.current_round;

    match cli.command {
        Command::Defence(args) => run_uploads(&config, store, UploadKind::Defence, args).await,
        Command::Attack(args) => run_uploads(&config, store, UploadKind::Attack, args).await,
        Command::RegisterTeam { id, name, emails } => {
            store.put_team(&TeamContact {
                team_id: id,
                name,
                emails,
            })?;
            println!("Registered team {id}");
            Ok(())
        }
        Command::ScheduleMatch { attacker, defender } => {
            if attacker == defender {
                bail!("a team cannot attack itself");
            }
            ensure_registered(store.as_ref(), &[attacker, defender])?;
            let m = store.schedule_match(round, attacker, defender)?;
            println!("Match {}: team {attacker} attacks team {defender} in round {round}", m.id);
            Ok(())
        }
        Command::GenerateMatches { matches_per_team } => {
            let per_team = matches_per_team.unwrap_or(config.matches_per_team);
            let scheduled =
                generate_matches(store.as_ref(), round, per_team, &mut rand::thread_rng())?;
            println!("Generated {} matches for round {round}", scheduled.len());
            Ok(())
        }
        Command::Standing { team } => {
            let contact = store
                .team(team)?
                .with_context(|| format!("team {team} is not registered"))?;
            let s = standing(&contact, round, store.as_ref(), store.as_ref())?;
            print_standings(&[s]);
            Ok(())
        }
        Command::Leaderboard => {
            let standings = leaderboard(store.as_ref(), round, store.as_ref(), store.as_ref())?;
            print_standings(&standings);
            Ok(())
        }
    }
}

/// Stage every file, run them through the job queue, and wait for the queue
/// to drain.
///
/// Staging stops at the first file that cannot be copied; files staged
/// before it are still evaluated.
async fn run_uploads(
    config: &NodeConfig,
    store: Arc<RocksStore>,
    kind: UploadKind,
    args: UploadArgs,
) -> Result<()> {
    ensure_registered(store.as_ref(), &[args.team])?;
    let datasets = Arc::new(
        CsvDatasetStore::open(config.dataset_dir()).context("failed to open dataset directory")?,
    );
    let pipeline = Arc::new(Pipeline::with_store(
        config.engine.clone(),
        store,
        datasets,
        Arc::new(LogNotifier),
    ));

    let (queue, handle) = spawn_worker(pipeline);
    let mut staging: Result<()> = Ok(());
    for file in &args.files {
        match stage_upload(&config.upload_dir(), file, kind, args.team) {
            Ok(job) => queue.submit(job)?,
            Err(e) => {
                staging = Err(e).with_context(|| format!("failed to stage {}", file.display()));
                break;
            }
        }
    }
    drop(queue);

    let stats = handle.await.context("worker task failed")?;
    println!(
        "{} accepted, {} rejected, {} failed",
        stats.accepted, stats.rejected, stats.failed
    );
    staging?;
    if stats.failed > 0 {
        bail!("{} upload(s) could not be evaluated", stats.failed);
    }
    Ok(())
}

fn ensure_registered(teams: &dyn TeamDirectory, ids: &[TeamId]) -> Result<()> {
    for &id in ids {
        if teams.team(id)?.is_none() {
            bail!("team {id} is not registered");
        }
    }
    Ok(())
}

fn print_standings(standings: &[TeamStanding]) {
    println!(
        "{:<6} {:<24} {:>28} {:>28} {:>30}",
        "team", "name", "utility", "attack", "total"
    );
    for s in standings {
        println!(
            "{:<6} {:<24} {:>28} {:>28} {:>30}",
            s.team_id,
            s.team_name,
            s.utility.to_string(),
            s.attack.to_string(),
            s.total.to_string()
        );
    }
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG`, when set, takes precedence over `level_str`.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn upload_requires_files() {
        assert!(Cli::try_parse_from(["stroll-worker", "defence", "--team", "1"]).is_err());
    }

    #[test]
    fn phase_flag_overrides_config() {
        let cli = Cli::try_parse_from(["stroll-worker", "leaderboard", "--phase", "attack"]).unwrap();
        assert_eq!(cli.global.phase, Some(PhaseArg::Attack));
        let config = GlobalArgs {
            config: None,
            data_dir: Some(PathBuf::from("/tmp/stroll-cli")),
            round: None,
            phase: Some(PhaseArg::None),
            log_level: None,
            log_format: None,
        }
        .into_config()
        .unwrap();
        assert!(!config.engine.defence_phase && !config.engine.attack_phase);
    }

    #[test]
    fn generate_matches_takes_optional_count() {
        let cli = Cli::try_parse_from(["stroll-worker", "generate-matches", "--round", "2"]).unwrap();
        assert!(matches!(cli.command, Command::GenerateMatches { matches_per_team: None }));
        let cli =
            Cli::try_parse_from(["stroll-worker", "generate-matches", "--matches-per-team", "5"])
                .unwrap();
        assert!(matches!(cli.command, Command::GenerateMatches { matches_per_team: Some(5) }));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stroll-worker",
            "attack",
            "--team",
            "3",
            "a.csv",
            "b.csv",
            "--round",
            "2",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.global.round, Some(2));
        assert_eq!(cli.global.log_format.as_deref(), Some("json"));
        match cli.command {
            Command::Attack(args) => {
                assert_eq!(args.team, 3);
                assert_eq!(args.files, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
