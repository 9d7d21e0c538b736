//! Configuration system for the `tunekit` binary.
//!
//! Settings load hierarchically:
//! - `tunekit.toml` (project configuration)
//! - Environment variables (`TUNEKIT_*` prefix, `__` as separator)
//! - Command-line flags (applied by the binary on top)
//!
//! ## Example
//!
//! ```toml
//! # tunekit.toml
//! [tuning]
//! technique = "auc-bandit"
//! max_evaluations = 500
//! seed = 42
//!
//! [log]
//! file = "tuning_log.json"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! TUNEKIT_TUNING__TECHNIQUE=random
//! TUNEKIT_LOG__SILENT=true
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tuning: TuningConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Search and termination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Search technique: auc-bandit, round-robin, random, exhaustive,
    /// simulated-annealing, pattern-search, torczon, or
    /// differential-evolution
    #[serde(default = "default_technique")]
    pub technique: String,

    /// Evaluation budget (0 = one evaluation per configuration)
    #[serde(default)]
    pub max_evaluations: u64,

    /// Wall-clock budget in seconds (0 = unlimited)
    #[serde(default)]
    pub max_seconds: u64,

    /// Stop as soon as the best cost reaches this value
    #[serde(default)]
    pub target_cost: Option<f64>,

    /// PRNG seed for reproducible runs (unset = entropy)
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Run-log settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log file path (unset = no log file)
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Suppress per-evaluation progress events
    #[serde(default)]
    pub silent: bool,
}

fn default_technique() -> String {
    "auc-bandit".to_string()
}

impl Default for TuningConfig {
    fn default() -> Self {
        TuningConfig {
            technique: default_technique(),
            max_evaluations: 0,
            max_seconds: 0,
            target_cost: None,
            seed: None,
        }
    }
}

impl Config {
    /// Loads `tunekit.toml` with `TUNEKIT_*` environment overrides.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("tunekit.toml"))
            .merge(Env::prefixed("TUNEKIT_").split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tuning.technique, "auc-bandit");
        assert_eq!(config.tuning.max_evaluations, 0);
        assert_eq!(config.tuning.seed, None);
        assert!(config.log.file.is_none());
        assert!(!config.log.silent);
    }

    #[test]
    fn test_toml_round_trip() {
        let config: Config = Figment::from(Toml::string(
            r#"
            [tuning]
            technique = "random"
            max_evaluations = 100
            seed = 7

            [log]
            file = "runs/log.json"
            silent = true
            "#,
        ))
        .extract()
        .unwrap();
        assert_eq!(config.tuning.technique, "random");
        assert_eq!(config.tuning.max_evaluations, 100);
        assert_eq!(config.tuning.seed, Some(7));
        assert_eq!(config.log.file, Some(PathBuf::from("runs/log.json")));
        assert!(config.log.silent);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = Figment::from(Toml::string(
            r#"
            [tuning]
            max_seconds = 60
            "#,
        ))
        .extract()
        .unwrap();
        assert_eq!(config.tuning.technique, "auc-bandit");
        assert_eq!(config.tuning.max_seconds, 60);
        assert!(!config.log.silent);
    }
}
