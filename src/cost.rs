//! # Cost Functions
//!
//! The tuner's only external dependency: something that maps a
//! [`Configuration`] to a cost. Costs are finite positive floats,
//! smaller is better. A cost function distinguishes two failure modes:
//!
//! * [`CostError::InvalidConfiguration`]: this configuration cannot
//!   be evaluated (it is recorded as invalid and tuning continues);
//! * [`CostError::Fatal`]: anything else (the run is aborted and the
//!   error propagates to the caller).
//!
//! [`CommandCostFunction`] is the shell back-end: it runs a command
//! (optionally preceded by a compile command) with every parameter
//! exported into the environment and uses the run duration (or a cost
//! file's contents) as the cost.

use crate::tuning_data::{Cost, MetaData};
use crate::value::Configuration;
use anyhow::Context;
use serde_json::json;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// A successful evaluation: the cost plus optional meta-data that is
/// carried into the tuning log.
#[derive(Debug, Clone)]
pub struct CostOutcome {
    pub cost: Cost,
    pub meta_data: Option<MetaData>,
}

impl CostOutcome {
    pub fn new(cost: Cost) -> Self {
        CostOutcome {
            cost,
            meta_data: None,
        }
    }

    pub fn with_meta_data(cost: Cost, meta_data: MetaData) -> Self {
        CostOutcome {
            cost,
            meta_data: Some(meta_data),
        }
    }
}

impl From<Cost> for CostOutcome {
    fn from(cost: Cost) -> Self {
        CostOutcome::new(cost)
    }
}

/// Failure modes of a cost function.
#[derive(Error, Debug)]
pub enum CostError {
    /// The configuration is unusable; meta-data is preserved in the
    /// log entry. Tuning continues.
    #[error("invalid configuration")]
    InvalidConfiguration { meta_data: Option<MetaData> },

    /// Any other failure; aborts the tuning run.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

/// Maps configurations to costs. Implemented for `FnMut` closures, so
/// plain functions work directly:
///
/// ```
/// use tunekit::cost::{CostError, CostFunction, CostOutcome};
/// use tunekit::value::Configuration;
///
/// let mut cost_function = |config: &Configuration| -> Result<CostOutcome, CostError> {
///     let x = config["x"].as_int().unwrap() as f64;
///     Ok(CostOutcome::new((x - 3.0).powi(2) + 1.0))
/// };
/// # let _ = &mut cost_function;
/// ```
pub trait CostFunction {
    fn evaluate(&mut self, configuration: &Configuration) -> Result<CostOutcome, CostError>;
}

impl<F> CostFunction for F
where
    F: FnMut(&Configuration) -> Result<CostOutcome, CostError>,
{
    fn evaluate(&mut self, configuration: &Configuration) -> Result<CostOutcome, CostError> {
        self(configuration)
    }
}

/// Shell-command cost function.
///
/// Both commands run with the environment extended by one variable per
/// parameter (`name → value string`). A non-zero exit status of either
/// command marks the configuration invalid, with exit codes and
/// nanosecond durations preserved as meta-data. Without a cost file
/// the cost is the run command's duration in nanoseconds.
#[derive(Debug, Clone)]
pub struct CommandCostFunction {
    run_command: Vec<String>,
    compile_command: Option<Vec<String>>,
    cost_file: Option<PathBuf>,
}

impl CommandCostFunction {
    pub fn new(run_command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let run_command: Vec<String> = run_command.into_iter().map(Into::into).collect();
        assert!(!run_command.is_empty(), "expecting a non-empty run command");
        CommandCostFunction {
            run_command,
            compile_command: None,
            cost_file: None,
        }
    }

    /// Command to run before each measurement, e.g. a compiler
    /// invocation picking up the parameter environment variables.
    pub fn compile_command(
        mut self,
        compile_command: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.compile_command = Some(compile_command.into_iter().map(Into::into).collect());
        self
    }

    /// File the run command writes its cost into; its contents replace
    /// the run duration as the cost.
    pub fn cost_file(mut self, cost_file: impl Into<PathBuf>) -> Self {
        self.cost_file = Some(cost_file.into());
        self
    }

    fn run(
        command: &[String],
        configuration: &Configuration,
    ) -> Result<(i64, u128), CostError> {
        let start = Instant::now();
        let status = Command::new(&command[0])
            .args(&command[1..])
            .envs(
                configuration
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_string())),
            )
            .status()
            .with_context(|| format!("error while executing command: {}", command.join(" ")))?;
        let elapsed = start.elapsed().as_nanos();
        debug!(command = %command.join(" "), code = status.code(), elapsed_ns = elapsed as u64, "command finished");
        Ok((i64::from(status.code().unwrap_or(-1)), elapsed))
    }
}

impl CostFunction for CommandCostFunction {
    fn evaluate(&mut self, configuration: &Configuration) -> Result<CostOutcome, CostError> {
        let mut meta_data = serde_json::Map::new();

        if let Some(compile_command) = &self.compile_command {
            let (code, elapsed) = Self::run(compile_command, configuration)?;
            meta_data.insert("compile_command_exit_code".into(), json!(code));
            meta_data.insert("compile_command_ns".into(), json!(elapsed));
            if code != 0 {
                return Err(CostError::InvalidConfiguration {
                    meta_data: Some(meta_data.into()),
                });
            }
        }

        let (code, elapsed) = Self::run(&self.run_command, configuration)?;
        meta_data.insert("run_command_exit_code".into(), json!(code));
        meta_data.insert("run_command_ns".into(), json!(elapsed));
        if code != 0 {
            return Err(CostError::InvalidConfiguration {
                meta_data: Some(meta_data.into()),
            });
        }

        let cost = match &self.cost_file {
            None => elapsed as Cost,
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read cost file {}", path.display()))?;
                contents
                    .trim()
                    .parse::<Cost>()
                    .with_context(|| format!("failed to parse cost file {}", path.display()))?
            }
        };
        Ok(CostOutcome::with_meta_data(cost, meta_data.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn config(pairs: &[(&str, Value)]) -> Configuration {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_closures_are_cost_functions() {
        let mut f = |c: &Configuration| -> Result<CostOutcome, CostError> {
            Ok(CostOutcome::new(c["x"].as_int().unwrap() as f64))
        };
        let outcome = f.evaluate(&config(&[("x", Value::Int(4))])).unwrap();
        assert_eq!(outcome.cost, 4.0);
        assert!(outcome.meta_data.is_none());
    }

    #[test]
    fn test_command_success_records_meta_data() {
        let mut f = CommandCostFunction::new(["true"]);
        let outcome = f.evaluate(&config(&[])).unwrap();
        assert!(outcome.cost > 0.0);
        let meta = outcome.meta_data.unwrap();
        assert_eq!(meta["run_command_exit_code"], json!(0));
        assert!(meta["run_command_ns"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_failing_command_is_invalid_configuration() {
        let mut f = CommandCostFunction::new(["false"]);
        match f.evaluate(&config(&[])) {
            Err(CostError::InvalidConfiguration { meta_data }) => {
                let meta = meta_data.unwrap();
                assert_eq!(meta["run_command_exit_code"], json!(1));
            }
            other => panic!("expecting invalid configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_parameters_are_exported_into_environment() {
        let mut f = CommandCostFunction::new(["sh", "-c", "test \"$threads\" = 8"]);
        let outcome = f.evaluate(&config(&[("threads", Value::Int(8))]));
        assert!(outcome.is_ok());

        let mut f = CommandCostFunction::new(["sh", "-c", "test \"$threads\" = 9"]);
        assert!(matches!(
            f.evaluate(&config(&[("threads", Value::Int(8))])),
            Err(CostError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_missing_binary_is_fatal() {
        let mut f = CommandCostFunction::new(["tunekit-no-such-binary"]);
        assert!(matches!(
            f.evaluate(&config(&[])),
            Err(CostError::Fatal(_))
        ));
    }

    #[test]
    fn test_cost_file_overrides_duration() {
        let dir = tempfile::tempdir().unwrap();
        let cost_path = dir.path().join("cost.txt");
        let mut f = CommandCostFunction::new([
            "sh".to_string(),
            "-c".to_string(),
            format!("echo 42.5 > {}", cost_path.display()),
        ])
        .cost_file(&cost_path);
        let outcome = f.evaluate(&config(&[])).unwrap();
        assert_eq!(outcome.cost, 42.5);
    }

    #[test]
    fn test_failing_compile_skips_run() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let mut f = CommandCostFunction::new([
            "sh".to_string(),
            "-c".to_string(),
            format!("touch {}", marker.display()),
        ])
        .compile_command(["false"]);
        match f.evaluate(&config(&[])) {
            Err(CostError::InvalidConfiguration { meta_data }) => {
                let meta = meta_data.unwrap();
                assert_eq!(meta["compile_command_exit_code"], json!(1));
                assert!(meta.get("run_command_exit_code").is_none());
            }
            other => panic!("expecting invalid configuration, got {other:?}"),
        }
        assert!(!marker.exists());
    }
}
