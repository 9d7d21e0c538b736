//! # Tuner
//!
//! Orchestrates one tuning run: ask the search technique for a
//! proposal, decode it through the search space, evaluate the cost
//! function, record the outcome, and feed the cost back to the
//! technique.
//!
//! ```text
//! Technique ──proposal──► SearchSpace ──configuration──► CostFunction
//!     ▲                                                      │
//!     └──────costs◄────── TuningData ◄──────outcome──────────┘
//! ```
//!
//! [`Tuner`] is the run builder; [`Tuner::tune`] drives the loop until
//! the abort condition (or an interrupt) fires, while [`Tuner::start`]
//! hands out a [`TuningRun`] for program-guided stepping. The run
//! builder is consumed on start, so a run's parameters, technique, and
//! log sink cannot change mid-flight.
//!
//! The loop is strictly sequential and single-threaded; the cost
//! function call is its only blocking operation. Interrupts are
//! observed between steps only; an in-flight evaluation always
//! completes and is recorded before the run winds down with
//! `terminated_early = true`.

use crate::abort::{AbortCondition, Evaluations};
use crate::cost::{CostError, CostFunction};
use crate::error::DomainError;
use crate::interrupt::InterruptGuard;
use crate::parameter::Parameter;
use crate::search_space::SearchSpace;
use crate::techniques::{AucBandit, Coordinates, Technique};
use crate::tuning_data::{Cost, Proposal, RecordError, TuningData};
use crate::value::Configuration;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

/// Minimum time between two rewrites of the log file during a run.
const LOG_FLUSH_INTERVAL: Duration = Duration::from_secs(300);

/// Errors that end a tuning run (or prevent it from starting).
#[derive(Error, Debug)]
pub enum TuningError {
    #[error("no tuning parameters defined")]
    NoParameters,

    #[error(transparent)]
    Configuration(#[from] crate::error::ConfigurationError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Record(#[from] RecordError),

    /// The cost function failed in a way that is not an invalid
    /// configuration; the failing evaluation is recorded and the log
    /// flushed before this propagates.
    #[error("cost function failed")]
    FatalEvaluation(#[source] anyhow::Error),

    #[error("search technique returned no proposals")]
    EmptyProposal,

    #[error("failed to write tuning log {path}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// Outcome of a finished run.
#[derive(Debug)]
pub struct TuningResult {
    /// Best configuration found, if any evaluation was valid.
    pub configuration: Option<Configuration>,
    /// Cost of the best configuration.
    pub min_cost: Option<Cost>,
    /// The complete evaluation record.
    pub tuning_data: TuningData,
}

/// Builder for a tuning run.
///
/// ```no_run
/// use tunekit::cost::{CostError, CostOutcome};
/// use tunekit::parameter::Parameter;
/// use tunekit::range::Range;
/// use tunekit::tuner::Tuner;
/// use tunekit::value::Configuration;
///
/// # fn main() -> Result<(), tunekit::tuner::TuningError> {
/// let result = Tuner::new()
///     .tuning_parameters(vec![Parameter::new("threads", Range::interval(1, 16)?)])
///     .log_file("tuning_log.json")
///     .tune(
///         &mut |config: &Configuration| -> Result<CostOutcome, CostError> {
///             let threads = config["threads"].as_int().unwrap() as f64;
///             Ok(CostOutcome::new(1.0 / threads))
///         },
///         None,
///     )?;
/// println!("best: {:?}", result.configuration);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Tuner {
    parameters: Option<Vec<Parameter>>,
    search_space: Option<SearchSpace>,
    technique: Option<Technique>,
    silent: bool,
    log_file: Option<PathBuf>,
}

impl Tuner {
    pub fn new() -> Self {
        Tuner::default()
    }

    /// Declares the tuning parameters; the search space is built at
    /// run start.
    pub fn tuning_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters = Some(parameters.into_iter().collect());
        self
    }

    /// Uses a pre-built search space instead of building one.
    pub fn search_space(mut self, search_space: SearchSpace) -> Self {
        self.search_space = Some(search_space);
        self
    }

    /// Overrides the search technique (default: AUC bandit).
    pub fn search_technique(mut self, technique: impl Into<Technique>) -> Self {
        self.technique = Some(technique.into());
        self
    }

    /// Suppresses per-evaluation progress events.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Writes the run log (JSON) to this path, rewritten atomically on
    /// every flush.
    pub fn log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = Some(log_file.into());
        self
    }

    /// Runs the full tuning loop until the abort condition fires
    /// (default: one evaluation per feasible configuration) or the
    /// process is interrupted.
    pub fn tune<C>(
        self,
        cost_function: &mut C,
        abort_condition: Option<Box<dyn AbortCondition + Send>>,
    ) -> Result<TuningResult, TuningError>
    where
        C: CostFunction + ?Sized,
    {
        let mut run = self.start(abort_condition)?;
        let guard = InterruptGuard::register();
        while !run.should_stop() && !guard.interrupted() {
            run.make_step(cost_function)?;
        }
        run.finalize_with(guard.interrupted())
    }

    /// Starts a run for program-guided stepping: the caller drives
    /// [`TuningRun::make_step`] and finishes with
    /// [`TuningRun::finalize`]. The abort condition is not consulted
    /// in this mode, but its descriptor still lands in the log.
    pub fn start(
        self,
        abort_condition: Option<Box<dyn AbortCondition + Send>>,
    ) -> Result<TuningRun, TuningError> {
        let technique = self
            .technique
            .unwrap_or_else(|| Technique::Coordinate(Box::new(AucBandit::new())));
        let wants_index_access = matches!(technique, Technique::Index(_));

        let (search_space, generation) = match (self.search_space, self.parameters) {
            (Some(space), _) => {
                if wants_index_access && !space.index_access_enabled() {
                    return Err(DomainError::IndexAccessDisabled.into());
                }
                (space, Duration::ZERO)
            }
            (None, Some(parameters)) => {
                let build_start = Instant::now();
                let space = SearchSpace::build(parameters, wants_index_access)?;
                (space, build_start.elapsed())
            }
            (None, None) => return Err(TuningError::NoParameters),
        };

        let abort_condition = abort_condition.unwrap_or_else(|| {
            Box::new(Evaluations(
                u64::try_from(search_space.constrained_size()).unwrap_or(u64::MAX),
            ))
        });

        let log_sink = match &self.log_file {
            Some(path) => Some(LogSink::create(path)?),
            None => None,
        };

        let tuning_data = TuningData::new(
            search_space.parameter_descriptors(),
            search_space.constrained_size(),
            search_space.unconstrained_size(),
            generation,
            technique.descriptor(),
            abort_condition.descriptor(),
        );

        let mut run = TuningRun {
            search_space,
            technique,
            abort_condition,
            tuning_data,
            pending_proposals: Vec::new(),
            pending_costs: Vec::new(),
            log_sink,
            last_log_flush: None,
            silent: self.silent,
        };

        match &mut run.technique {
            Technique::Coordinate(t) => t.initialize(run.search_space.num_parameters()),
            Technique::Index(t) => t.initialize(
                u64::try_from(run.search_space.constrained_size()).unwrap_or(u64::MAX),
            ),
        }
        run.flush_log()?;
        Ok(run)
    }
}

/// An in-progress tuning run.
pub struct TuningRun {
    search_space: SearchSpace,
    technique: Technique,
    abort_condition: Box<dyn AbortCondition + Send>,
    tuning_data: TuningData,
    pending_proposals: Vec<Proposal>,
    pending_costs: Vec<(Proposal, Option<Cost>)>,
    log_sink: Option<LogSink>,
    last_log_flush: Option<Instant>,
    silent: bool,
}

impl TuningRun {
    pub fn tuning_data(&self) -> &TuningData {
        &self.tuning_data
    }

    pub fn search_space(&self) -> &SearchSpace {
        &self.search_space
    }

    /// Whether the abort condition is satisfied.
    pub fn should_stop(&self) -> bool {
        self.abort_condition.stop(&self.tuning_data)
    }

    /// Performs one evaluation: deliver buffered cost reports, fetch a
    /// proposal, decode it, evaluate, record.
    pub fn make_step<C>(&mut self, cost_function: &mut C) -> Result<(), TuningError>
    where
        C: CostFunction + ?Sized,
    {
        if self.pending_proposals.is_empty() {
            self.deliver_cost_reports();
            self.request_proposals();
        }
        let proposal = self
            .pending_proposals
            .pop()
            .ok_or(TuningError::EmptyProposal)?;

        let configuration = match &proposal {
            Proposal::Coordinates(coordinates) => self
                .search_space
                .configuration_by_coordinates(coordinates.as_slice())?,
            Proposal::Index(index) => self.search_space.configuration_by_index(*index)?,
        };

        let (valid, cost, meta_data) = match cost_function.evaluate(&configuration) {
            Ok(outcome) => (true, Some(outcome.cost), outcome.meta_data),
            Err(CostError::InvalidConfiguration { meta_data }) => (false, None, meta_data),
            Err(CostError::Fatal(error)) => {
                self.tuning_data.record_evaluation(
                    configuration,
                    false,
                    None,
                    None,
                    Some(proposal),
                )?;
                self.flush_log()?;
                return Err(TuningError::FatalEvaluation(error));
            }
        };

        let timestamp = self.tuning_data.record_evaluation(
            configuration,
            valid,
            cost,
            meta_data,
            Some(proposal.clone()),
        )?;
        self.pending_costs.push((proposal, cost));

        if !self.silent {
            self.emit_progress(timestamp, cost);
        }
        if self.log_sink.is_some()
            && self
                .last_log_flush
                .map_or(true, |last| last.elapsed() > LOG_FLUSH_INTERVAL)
        {
            self.flush_log()?;
        }
        Ok(())
    }

    /// Finishes a program-guided run.
    pub fn finalize(self) -> Result<TuningResult, TuningError> {
        self.finalize_with(false)
    }

    fn finalize_with(mut self, terminated_early: bool) -> Result<TuningResult, TuningError> {
        match &mut self.technique {
            Technique::Coordinate(t) => t.finalize(),
            Technique::Index(t) => t.finalize(),
        }
        self.tuning_data.record_tuning_finished(terminated_early);
        self.flush_log()?;

        if !self.silent {
            if let Some(best) = self.tuning_data.configuration_of_min_cost() {
                for (name, value) in best {
                    info!(parameter = %name, value = %value, "best configuration");
                }
            }
            info!(
                min_cost = self.tuning_data.min_cost(),
                evaluations = self.tuning_data.evaluations(),
                terminated_early,
                "finished tuning"
            );
        }

        Ok(TuningResult {
            configuration: self.tuning_data.configuration_of_min_cost().cloned(),
            min_cost: self.tuning_data.min_cost(),
            tuning_data: self.tuning_data,
        })
    }

    /// Forwards all buffered costs to the technique, keyed the way the
    /// technique proposed them.
    fn deliver_cost_reports(&mut self) {
        if self.pending_costs.is_empty() {
            return;
        }
        match &mut self.technique {
            Technique::Coordinate(technique) => {
                let costs: HashMap<Coordinates, Option<Cost>> = self
                    .pending_costs
                    .drain(..)
                    .filter_map(|(proposal, cost)| match proposal {
                        Proposal::Coordinates(coordinates) => Some((coordinates, cost)),
                        Proposal::Index(_) => None,
                    })
                    .collect();
                technique.report_costs(&costs);
            }
            Technique::Index(technique) => {
                let costs: HashMap<u64, Option<Cost>> = self
                    .pending_costs
                    .drain(..)
                    .filter_map(|(proposal, cost)| match proposal {
                        Proposal::Index(index) => Some((index, cost)),
                        Proposal::Coordinates(_) => None,
                    })
                    .collect();
                technique.report_costs(&costs);
            }
        }
    }

    fn request_proposals(&mut self) {
        match &mut self.technique {
            Technique::Coordinate(technique) => self.pending_proposals.extend(
                technique
                    .next_coordinates()
                    .into_iter()
                    .map(Proposal::Coordinates),
            ),
            Technique::Index(technique) => self
                .pending_proposals
                .extend(technique.next_indices().into_iter().map(Proposal::Index)),
        }
    }

    fn emit_progress(&self, timestamp: DateTime<Local>, cost: Option<Cost>) {
        let elapsed = self.tuning_data.total_tuning_duration();
        match self.abort_condition.progress(&self.tuning_data) {
            Some(progress) if progress > 0.0 => {
                let eta_seconds =
                    (elapsed.as_secs_f64() / progress * (1.0 - progress)).ceil() as u64;
                info!(
                    timestamp = %timestamp.format("%Y-%m-%dT%H:%M:%S"),
                    evaluations = self.tuning_data.evaluations(),
                    valid_evaluations = self.tuning_data.valid_evaluations(),
                    min_cost = self.tuning_data.min_cost(),
                    valid = cost.is_some(),
                    cost,
                    progress_percent = format!("{:.2}", progress * 100.0),
                    eta_seconds,
                    "evaluated configuration"
                );
            }
            _ => {
                info!(
                    timestamp = %timestamp.format("%Y-%m-%dT%H:%M:%S"),
                    evaluations = self.tuning_data.evaluations(),
                    valid_evaluations = self.tuning_data.valid_evaluations(),
                    min_cost = self.tuning_data.min_cost(),
                    valid = cost.is_some(),
                    cost,
                    "evaluated configuration"
                );
            }
        }
    }

    fn flush_log(&mut self) -> Result<(), TuningError> {
        if let Some(sink) = &mut self.log_sink {
            sink.dump(&self.tuning_data.to_json())?;
            self.last_log_flush = Some(Instant::now());
        }
        Ok(())
    }
}

/// Log file handle; every dump truncates and rewrites the whole run
/// document so readers never see a partially appended file.
struct LogSink {
    path: PathBuf,
    file: File,
}

impl LogSink {
    fn create(path: &Path) -> Result<Self, TuningError> {
        let log_write = |source: anyhow::Error| TuningError::LogWrite {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| log_write(e.into()))?;
            }
        }
        let file = File::create(path).map_err(|e| log_write(e.into()))?;
        Ok(LogSink {
            path: path.to_path_buf(),
            file,
        })
    }

    fn dump(&mut self, log: &serde_json::Value) -> Result<(), TuningError> {
        let log_write = |source: anyhow::Error| TuningError::LogWrite {
            path: self.path.clone(),
            source,
        };
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| log_write(e.into()))?;
        self.file.set_len(0).map_err(|e| log_write(e.into()))?;
        serde_json::to_writer_pretty(&mut self.file, log).map_err(|e| log_write(e.into()))?;
        self.file.flush().map_err(|e| log_write(e.into()))?;
        Ok(())
    }
}
