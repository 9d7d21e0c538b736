//! # Tuning Data
//!
//! The append-only record of one tuning run: every evaluation with its
//! timestamp, counters, configuration, validity, and cost, plus the
//! strict-decrease subsequence of valid evaluations (the improvement
//! history). [`TuningData::to_json`] renders the whole run in the log
//! format; entries are immutable once recorded.

use crate::techniques::Coordinates;
use crate::value::Configuration;
use chrono::{DateTime, Local};
use serde_json::json;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Evaluation cost; finite, positive, smaller is better. `+∞` is used
/// internally as "worse than anything" and never appears in the log.
pub type Cost = f64;

/// Free-form meta-data a cost function may attach to an evaluation.
pub type MetaData = serde_json::Value;

/// The addressing form a technique used to propose a configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Coordinates(Coordinates),
    Index(u64),
}

/// Misuse of the recording API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("expecting a cost if valid is true")]
    MissingCost,

    #[error("cannot record evaluations after tuning finish has been recorded")]
    AlreadyFinished,
}

/// Renders a duration as `H:MM:SS.ffffff`, microseconds rounded up.
pub(crate) fn format_duration(duration: Duration) -> String {
    let micros = (duration.as_nanos() + 999) / 1000;
    format!(
        "{}:{:02}:{:02}.{:06}",
        micros / 3_600_000_000,
        micros / 60_000_000 % 60,
        micros / 1_000_000 % 60,
        micros % 1_000_000
    )
}

fn format_timestamp(timestamp: DateTime<Local>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// One recorded evaluation.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    timestamp: DateTime<Local>,
    duration_since_tuning_start: Duration,
    evaluations: u64,
    valid_evaluations: u64,
    configuration: Configuration,
    valid: bool,
    cost: Option<Cost>,
    meta_data: Option<MetaData>,
    proposal: Option<Proposal>,
}

impl HistoryEntry {
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn duration_since_tuning_start(&self) -> Duration {
        self.duration_since_tuning_start
    }

    /// Cumulative evaluation count at recording time.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Cumulative valid-evaluation count at recording time.
    pub fn valid_evaluations(&self) -> u64 {
        self.valid_evaluations
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn cost(&self) -> Option<Cost> {
        self.cost
    }

    pub fn meta_data(&self) -> Option<&MetaData> {
        self.meta_data.as_ref()
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        self.proposal.as_ref()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut entry = json!({
            "timestamp": format_timestamp(self.timestamp),
            "timedelta_since_tuning_start": format_duration(self.duration_since_tuning_start),
            "evaluations": self.evaluations,
            "valid_evaluations": self.valid_evaluations,
            "configuration": self.configuration,
            "valid": self.valid,
            "cost": self.cost,
        });
        if let Some(meta_data) = &self.meta_data {
            entry["meta_data"] = meta_data.clone();
        }
        match &self.proposal {
            Some(Proposal::Coordinates(coordinates)) => {
                entry["search_space_coordinates"] = json!(coordinates.as_slice());
            }
            Some(Proposal::Index(index)) => {
                entry["search_space_index"] = json!(index);
            }
            None => {}
        }
        entry
    }
}

/// Append-only evaluation log.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!(self
            .entries
            .iter()
            .map(HistoryEntry::to_json)
            .collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// All data of one tuning run. Owned exclusively by the running tuner
/// and mutated only on the tuning thread.
#[derive(Debug)]
pub struct TuningData {
    parameter_descriptors: Vec<serde_json::Value>,
    constrained_search_space_size: u128,
    unconstrained_search_space_size: u128,
    search_space_generation: Duration,
    technique_descriptor: serde_json::Value,
    abort_condition_descriptor: serde_json::Value,
    tuning_start_timestamp: DateTime<Local>,
    tuning_start_instant: Instant,
    total_tuning_duration: Option<Duration>,
    terminated_early: bool,
    history: History,
    improvement_history: History,
    evaluations: u64,
    valid_evaluations: u64,
    invalid_evaluations: u64,
}

impl TuningData {
    pub fn new(
        parameter_descriptors: Vec<serde_json::Value>,
        constrained_search_space_size: u128,
        unconstrained_search_space_size: u128,
        search_space_generation: Duration,
        technique_descriptor: serde_json::Value,
        abort_condition_descriptor: serde_json::Value,
    ) -> Self {
        TuningData {
            parameter_descriptors,
            constrained_search_space_size,
            unconstrained_search_space_size,
            search_space_generation,
            technique_descriptor,
            abort_condition_descriptor,
            tuning_start_timestamp: Local::now(),
            tuning_start_instant: Instant::now(),
            total_tuning_duration: None,
            terminated_early: false,
            history: History::default(),
            improvement_history: History::default(),
            evaluations: 0,
            valid_evaluations: 0,
            invalid_evaluations: 0,
        }
    }

    pub fn tuning_start_timestamp(&self) -> DateTime<Local> {
        self.tuning_start_timestamp
    }

    /// Elapsed tuning time; live while the run is in progress, frozen
    /// once the finish has been recorded.
    pub fn total_tuning_duration(&self) -> Duration {
        self.total_tuning_duration
            .unwrap_or_else(|| self.tuning_start_instant.elapsed())
    }

    pub fn constrained_search_space_size(&self) -> u128 {
        self.constrained_search_space_size
    }

    pub fn unconstrained_search_space_size(&self) -> u128 {
        self.unconstrained_search_space_size
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn valid_evaluations(&self) -> u64 {
        self.valid_evaluations
    }

    pub fn invalid_evaluations(&self) -> u64 {
        self.invalid_evaluations
    }

    pub fn terminated_early(&self) -> bool {
        self.terminated_early
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The strict-decrease subsequence of valid evaluations.
    pub fn improvement_history(&self) -> &History {
        &self.improvement_history
    }

    pub fn min_cost(&self) -> Option<Cost> {
        self.improvement_history.last().and_then(HistoryEntry::cost)
    }

    pub fn configuration_of_min_cost(&self) -> Option<&Configuration> {
        self.improvement_history
            .last()
            .map(HistoryEntry::configuration)
    }

    pub fn meta_data_of_min_cost(&self) -> Option<&MetaData> {
        self.improvement_history
            .last()
            .and_then(HistoryEntry::meta_data)
    }

    pub fn proposal_of_min_cost(&self) -> Option<&Proposal> {
        self.improvement_history
            .last()
            .and_then(HistoryEntry::proposal)
    }

    pub fn timestamp_of_min_cost(&self) -> Option<DateTime<Local>> {
        self.improvement_history.last().map(HistoryEntry::timestamp)
    }

    pub fn duration_to_min_cost(&self) -> Option<Duration> {
        self.improvement_history
            .last()
            .map(HistoryEntry::duration_since_tuning_start)
    }

    pub fn evaluations_to_min_cost(&self) -> Option<u64> {
        self.improvement_history
            .last()
            .map(HistoryEntry::evaluations)
    }

    pub fn valid_evaluations_to_min_cost(&self) -> Option<u64> {
        self.improvement_history
            .last()
            .map(HistoryEntry::valid_evaluations)
    }

    /// Records one evaluation and returns its timestamp. The entry
    /// joins the improvement history iff it is valid and its cost is
    /// strictly below the best recorded so far.
    pub fn record_evaluation(
        &mut self,
        configuration: Configuration,
        valid: bool,
        cost: Option<Cost>,
        meta_data: Option<MetaData>,
        proposal: Option<Proposal>,
    ) -> Result<DateTime<Local>, RecordError> {
        if valid && cost.is_none() {
            return Err(RecordError::MissingCost);
        }
        if self.total_tuning_duration.is_some() {
            return Err(RecordError::AlreadyFinished);
        }

        let elapsed = self.tuning_start_instant.elapsed();
        let timestamp = self.tuning_start_timestamp
            + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::MAX);

        self.evaluations += 1;
        if valid {
            self.valid_evaluations += 1;
        } else {
            self.invalid_evaluations += 1;
        }

        let entry = HistoryEntry {
            timestamp,
            duration_since_tuning_start: elapsed,
            evaluations: self.evaluations,
            valid_evaluations: self.valid_evaluations,
            configuration,
            valid,
            cost,
            meta_data,
            proposal,
        };
        let new_best = valid
            && self
                .improvement_history
                .last()
                .and_then(HistoryEntry::cost)
                .map_or(true, |best| cost.is_some_and(|c| c < best));
        if new_best {
            self.improvement_history.entries.push(entry.clone());
        }
        self.history.entries.push(entry);
        Ok(timestamp)
    }

    /// Freezes the run duration and marks early termination.
    pub fn record_tuning_finished(&mut self, terminated_early: bool) {
        self.total_tuning_duration = Some(self.tuning_start_instant.elapsed());
        self.terminated_early = terminated_early;
    }

    /// The complete run in log form.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "tuning_parameters": self.parameter_descriptors,
            "constrained_search_space_size": self.constrained_search_space_size,
            "unconstrained_search_space_size": self.unconstrained_search_space_size,
            "search_space_generation_ns": self.search_space_generation.as_nanos(),
            "search_technique": self.technique_descriptor,
            "abort_condition": self.abort_condition_descriptor,
            "tuning_start_timestamp": format_timestamp(self.tuning_start_timestamp),
            "total_tuning_duration": format_duration(self.total_tuning_duration()),
            "terminated_early": self.terminated_early,
            "history": self.history.to_json(),
            "improvement_history": self.improvement_history.to_json(),
            "number_of_evaluated_configurations": self.evaluations,
            "number_of_evaluated_valid_configurations": self.valid_evaluations,
            "number_of_evaluated_invalid_configurations": self.invalid_evaluations,
            "min_cost": self.min_cost(),
            "configuration_of_min_cost": self.configuration_of_min_cost(),
            "meta_data_of_min_cost": self.meta_data_of_min_cost(),
            "search_space_coordinates_of_min_cost": match self.proposal_of_min_cost() {
                Some(Proposal::Coordinates(c)) => json!(c.as_slice()),
                _ => serde_json::Value::Null,
            },
            "search_space_index_of_min_cost": match self.proposal_of_min_cost() {
                Some(Proposal::Index(i)) => json!(i),
                _ => serde_json::Value::Null,
            },
            "timestamp_of_min_cost": self.timestamp_of_min_cost().map(format_timestamp),
            "duration_to_min_cost": self.duration_to_min_cost().map(format_duration),
            "evaluations_to_min_cost": self.evaluations_to_min_cost(),
            "valid_evaluations_to_min_cost": self.valid_evaluations_to_min_cost(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn data() -> TuningData {
        TuningData::new(
            vec![json!({"name": "tp1"})],
            10,
            10,
            Duration::from_millis(1),
            json!({"kind": "RandomSearch"}),
            json!({"kind": "Evaluations", "evaluations": 10}),
        )
    }

    fn config(v: i64) -> Configuration {
        let mut c = Configuration::new();
        c.insert("tp1".into(), Value::Int(v));
        c
    }

    #[test]
    fn test_counters_and_improvement_history() {
        let mut data = data();
        data.record_evaluation(config(1), true, Some(5.0), None, None)
            .unwrap();
        data.record_evaluation(config(2), false, None, None, None)
            .unwrap();
        data.record_evaluation(config(3), true, Some(7.0), None, None)
            .unwrap();
        data.record_evaluation(config(4), true, Some(3.0), None, None)
            .unwrap();

        assert_eq!(data.evaluations(), 4);
        assert_eq!(data.valid_evaluations(), 3);
        assert_eq!(data.invalid_evaluations(), 1);
        assert_eq!(data.history().len(), 4);
        assert_eq!(data.improvement_history().len(), 2);
        assert_eq!(data.min_cost(), Some(3.0));
        assert_eq!(data.configuration_of_min_cost(), Some(&config(4)));

        let costs: Vec<Cost> = data
            .improvement_history()
            .iter()
            .filter_map(HistoryEntry::cost)
            .collect();
        assert!(costs.windows(2).all(|pair| pair[1] < pair[0]));
    }

    #[test]
    fn test_valid_without_cost_is_rejected() {
        let mut data = data();
        assert_eq!(
            data.record_evaluation(config(1), true, None, None, None)
                .unwrap_err(),
            RecordError::MissingCost
        );
    }

    #[test]
    fn test_recording_after_finish_is_rejected() {
        let mut data = data();
        data.record_tuning_finished(false);
        assert_eq!(
            data.record_evaluation(config(1), true, Some(1.0), None, None)
                .unwrap_err(),
            RecordError::AlreadyFinished
        );
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(format_duration(Duration::ZERO), "0:00:00.000000");
        assert_eq!(
            format_duration(Duration::from_micros(1_500_000)),
            "0:00:01.500000"
        );
        assert_eq!(
            format_duration(Duration::from_secs(3600 + 23 * 60 + 45)),
            "1:23:45.000000"
        );
        // sub-microsecond remainders round up
        assert_eq!(format_duration(Duration::from_nanos(1)), "0:00:00.000001");
    }

    #[test]
    fn test_log_json_shape() {
        let mut data = data();
        data.record_evaluation(
            config(1),
            true,
            Some(2.5),
            Some(json!({"run_command_exit_code": 0})),
            Some(Proposal::Index(3)),
        )
        .unwrap();
        data.record_tuning_finished(true);

        let log = data.to_json();
        assert_eq!(log["terminated_early"], json!(true));
        assert_eq!(log["min_cost"], json!(2.5));
        assert_eq!(log["search_space_index_of_min_cost"], json!(3));
        assert_eq!(log["history"].as_array().unwrap().len(), 1);
        let entry = &log["history"][0];
        assert_eq!(entry["valid"], json!(true));
        assert_eq!(entry["configuration"]["tp1"], json!(1));
        assert_eq!(entry["meta_data"]["run_command_exit_code"], json!(0));
        assert_eq!(entry["search_space_index"], json!(3));
        assert!(entry["timedelta_since_tuning_start"]
            .as_str()
            .unwrap()
            .starts_with("0:00:"));
    }

    #[test]
    fn test_invalid_entries_never_enter_improvement_history() {
        let mut data = data();
        data.record_evaluation(config(1), false, None, None, None)
            .unwrap();
        assert!(data.improvement_history().is_empty());
        assert_eq!(data.min_cost(), None);
    }
}
