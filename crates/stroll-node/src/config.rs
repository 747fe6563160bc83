//! Node configuration for the stroll evaluation worker.
//!
//! [`NodeConfig`] carries the data directory layout, logging settings, and the
//! [`EngineContext`] handed to every engine call. It is layered with the
//! `config` crate: built-in defaults, then an optional TOML file, then
//! `STROLL_`-prefixed environment variables with `__` between nested keys
//! (`STROLL_ENGINE__NB_CLASSES=50`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stroll_core::constants::DEFAULT_MATCHES_PER_TEAM;
use stroll_core::context::EngineContext;
use stroll_core::error::StrollError;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "STROLL";

/// Configuration for a worker instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Log level filter string (e.g. "info", "debug", "stroll_node_lib=trace").
    pub log_level: String,
    /// Log output format, "text" or "json".
    pub log_format: String,
    /// Defenders each team attacks in a generated round.
    pub matches_per_team: usize,
    /// Exercise constants for the current round.
    pub engine: EngineContext,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stroll");

        Self {
            data_dir,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            matches_per_team: DEFAULT_MATCHES_PER_TEAM,
            engine: EngineContext::default(),
        }
    }
}

impl NodeConfig {
    /// Load defaults, then `file` if given, then the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, StrollError> {
        Self::load_with_env(file, env_source())
    }

    /// Same as [`load`](Self::load) with an explicit environment source.
    pub fn load_with_env(
        file: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, StrollError> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| StrollError::Config(e.to_string()))?;
        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| StrollError::Config(e.to_string()))
    }

    /// Path to the RocksDB record store.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("records")
    }

    /// Directory holding the published split files.
    pub fn dataset_dir(&self) -> PathBuf {
        self.data_dir.join("datasets")
    }

    /// Directory uploads are staged in before evaluation.
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

/// `STROLL_`-prefixed environment variables, `__` between nested keys.
pub fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        env_source().source(Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    #[test]
    fn default_log_level_is_info() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.log_format, "text");
    }

    #[test]
    fn default_data_dir_ends_with_stroll() {
        let cfg = NodeConfig::default();
        assert!(
            cfg.data_dir.ends_with("stroll"),
            "data_dir should end with 'stroll': {:?}",
            cfg.data_dir
        );
    }

    #[test]
    fn paths_are_under_data_dir() {
        let cfg = NodeConfig {
            data_dir: PathBuf::from("/tmp/stroll-test"),
            ..NodeConfig::default()
        };
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/stroll-test/records"));
        assert_eq!(cfg.dataset_dir(), PathBuf::from("/tmp/stroll-test/datasets"));
        assert_eq!(cfg.upload_dir(), PathBuf::from("/tmp/stroll-test/uploads"));
    }

    #[test]
    fn load_without_sources_gives_defaults() {
        let cfg = NodeConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(cfg, NodeConfig::default());
    }

    #[test]
    fn file_then_env_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "data_dir = \"/srv/stroll\"\nlog_format = \"json\"\n\n[engine]\nnb_classes = 20\ncurrent_round = 2\n"
        )
        .unwrap();

        let cfg = NodeConfig::load_with_env(
            Some(file.path()),
            env(&[("STROLL_ENGINE__NB_CLASSES", "40"), ("STROLL_LOG_LEVEL", "debug")]),
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/stroll"));
        assert_eq!(cfg.log_format, "json");
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.engine.nb_classes, 40);
        assert_eq!(cfg.engine.current_round, 2);
        assert_eq!(cfg.engine.nb_traces_to_classify, 300);
    }

    #[test]
    fn phases_and_match_count_from_env() {
        let cfg = NodeConfig::load_with_env(
            None,
            env(&[
                ("STROLL_ENGINE__DEFENCE_PHASE", "false"),
                ("STROLL_MATCHES_PER_TEAM", "5"),
            ]),
        )
        .unwrap();
        assert!(!cfg.engine.defence_phase);
        assert!(cfg.engine.attack_phase);
        assert_eq!(cfg.matches_per_team, 5);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = NodeConfig::load_with_env(Some(Path::new("/nonexistent/stroll.toml")), env(&[]))
            .unwrap_err();
        assert!(matches!(err, StrollError::Config(_)));
    }
}
