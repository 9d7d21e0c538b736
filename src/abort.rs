//! # Abort Conditions
//!
//! Termination predicates for the tuning loop. Every condition answers
//! [`stop`](AbortCondition::stop) from the current [`TuningData`] and
//! optionally reports a progress fraction; [`All`] and [`Any`] compose
//! conditions with min/max progress semantics. Progress is unknown
//! (`None`) whenever any participating condition cannot quantify it.

use crate::tuning_data::{format_duration, Cost as CostValue, TuningData};
use chrono::Local;
use serde_json::json;
use std::time::Duration as StdDuration;

/// Termination predicate with optional progress reporting.
pub trait AbortCondition {
    /// Whether the tuning run should stop.
    fn stop(&self, tuning_data: &TuningData) -> bool;

    /// Progress towards the condition in `[0, 1]`, or `None` when it
    /// cannot be determined.
    fn progress(&self, _tuning_data: &TuningData) -> Option<f64> {
        None
    }

    /// JSON descriptor for the tuning log.
    fn descriptor(&self) -> serde_json::Value;
}

/// Stops after a fixed number of evaluations, valid or not.
#[derive(Debug, Clone)]
pub struct Evaluations(pub u64);

impl AbortCondition for Evaluations {
    fn stop(&self, tuning_data: &TuningData) -> bool {
        tuning_data.evaluations() >= self.0
    }

    fn progress(&self, tuning_data: &TuningData) -> Option<f64> {
        Some((tuning_data.evaluations() as f64 / self.0 as f64).min(1.0))
    }

    fn descriptor(&self) -> serde_json::Value {
        json!({ "kind": "Evaluations", "evaluations": self.0 })
    }
}

/// Stops after a fixed number of valid evaluations.
#[derive(Debug, Clone)]
pub struct ValidEvaluations(pub u64);

impl AbortCondition for ValidEvaluations {
    fn stop(&self, tuning_data: &TuningData) -> bool {
        tuning_data.valid_evaluations() >= self.0
    }

    fn progress(&self, tuning_data: &TuningData) -> Option<f64> {
        Some((tuning_data.valid_evaluations() as f64 / self.0 as f64).min(1.0))
    }

    fn descriptor(&self) -> serde_json::Value {
        json!({ "kind": "ValidEvaluations", "valid_evaluations": self.0 })
    }
}

/// Stops once the run has lasted a given wall-clock duration.
#[derive(Debug, Clone)]
pub struct Duration(pub StdDuration);

impl AbortCondition for Duration {
    fn stop(&self, tuning_data: &TuningData) -> bool {
        tuning_data.total_tuning_duration() >= self.0
    }

    fn progress(&self, tuning_data: &TuningData) -> Option<f64> {
        let elapsed = tuning_data.total_tuning_duration().as_secs_f64();
        Some((elapsed / self.0.as_secs_f64()).min(1.0))
    }

    fn descriptor(&self) -> serde_json::Value {
        json!({ "kind": "Duration", "duration": format_duration(self.0) })
    }
}

/// Stops once a fraction of the constrained space has been evaluated.
#[derive(Debug, Clone)]
pub struct Fraction(pub f64);

impl AbortCondition for Fraction {
    fn stop(&self, tuning_data: &TuningData) -> bool {
        tuning_data.evaluations() as f64
            >= self.0 * tuning_data.constrained_search_space_size() as f64
    }

    fn progress(&self, tuning_data: &TuningData) -> Option<f64> {
        Some(
            tuning_data.evaluations() as f64
                / tuning_data.constrained_search_space_size() as f64
                / self.0,
        )
    }

    fn descriptor(&self) -> serde_json::Value {
        json!({ "kind": "Fraction", "fraction": self.0 })
    }
}

/// Stops once valid evaluations cover a fraction of the constrained
/// space.
#[derive(Debug, Clone)]
pub struct ValidFraction(pub f64);

impl AbortCondition for ValidFraction {
    fn stop(&self, tuning_data: &TuningData) -> bool {
        tuning_data.valid_evaluations() as f64
            >= self.0 * tuning_data.constrained_search_space_size() as f64
    }

    fn progress(&self, tuning_data: &TuningData) -> Option<f64> {
        Some(
            tuning_data.valid_evaluations() as f64
                / tuning_data.constrained_search_space_size() as f64
                / self.0,
        )
    }

    fn descriptor(&self) -> serde_json::Value {
        json!({ "kind": "ValidFraction", "fraction": self.0 })
    }
}

/// Stops once the best cost drops to the threshold or below.
#[derive(Debug, Clone)]
pub struct CostBelow(pub CostValue);

impl AbortCondition for CostBelow {
    fn stop(&self, tuning_data: &TuningData) -> bool {
        tuning_data
            .min_cost()
            .is_some_and(|best| best <= self.0)
    }

    fn descriptor(&self) -> serde_json::Value {
        json!({ "kind": "Cost", "cost": self.0 })
    }
}

/// The window a [`Speedup`] condition measures improvement over.
#[derive(Debug, Clone)]
pub enum SpeedupWindow {
    Duration(StdDuration),
    Evaluations(u64),
    ValidEvaluations(u64),
}

/// Stops when the best cost has not improved by at least the given
/// factor over the most recent window.
///
/// The speedup is the cost at the window start divided by the current
/// best cost; an empty improvement history falls back to the plain
/// window bound.
#[derive(Debug, Clone)]
pub struct Speedup {
    min_speedup: f64,
    window: SpeedupWindow,
}

impl Speedup {
    pub fn new(min_speedup: f64, window: SpeedupWindow) -> Self {
        Speedup { min_speedup, window }
    }
}

impl AbortCondition for Speedup {
    fn stop(&self, tuning_data: &TuningData) -> bool {
        let history = tuning_data.improvement_history();
        let Some(best) = tuning_data.min_cost() else {
            // nothing improved yet; stop once the window has passed
            return match &self.window {
                SpeedupWindow::Duration(d) => tuning_data.total_tuning_duration() >= *d,
                SpeedupWindow::Evaluations(n) => tuning_data.evaluations() >= *n,
                SpeedupWindow::ValidEvaluations(n) => tuning_data.valid_evaluations() >= *n,
            };
        };

        let mut speedup = 0.0;
        match &self.window {
            SpeedupWindow::Duration(d) => {
                let cutoff = Local::now()
                    - chrono::Duration::from_std(*d).unwrap_or(chrono::Duration::MAX);
                for entry in history.iter().rev() {
                    if entry.timestamp() < cutoff {
                        break;
                    }
                    if let Some(cost) = entry.cost() {
                        speedup = cost / best;
                    }
                }
            }
            SpeedupWindow::Evaluations(n) => {
                let cutoff = tuning_data.evaluations().saturating_sub(*n);
                for entry in history.iter().rev() {
                    if entry.evaluations() < cutoff {
                        break;
                    }
                    if let Some(cost) = entry.cost() {
                        speedup = cost / best;
                    }
                }
            }
            SpeedupWindow::ValidEvaluations(n) => {
                let cutoff = tuning_data.valid_evaluations().saturating_sub(*n);
                for entry in history.iter().rev() {
                    if entry.valid_evaluations() < cutoff {
                        break;
                    }
                    if let Some(cost) = entry.cost() {
                        speedup = cost / best;
                    }
                }
            }
        }
        speedup >= self.min_speedup
    }

    fn descriptor(&self) -> serde_json::Value {
        let mut descriptor = json!({ "kind": "Speedup", "speedup": self.min_speedup });
        match &self.window {
            SpeedupWindow::Duration(d) => descriptor["time"] = json!(format_duration(*d)),
            SpeedupWindow::Evaluations(n) => descriptor["evaluations"] = json!(n),
            SpeedupWindow::ValidEvaluations(n) => {
                descriptor["valid_evaluations"] = json!(n);
            }
        }
        descriptor
    }
}

/// Stops when every sub-condition stops; progress is the minimum.
pub struct All(pub Vec<Box<dyn AbortCondition + Send>>);

impl AbortCondition for All {
    fn stop(&self, tuning_data: &TuningData) -> bool {
        self.0.iter().all(|c| c.stop(tuning_data))
    }

    fn progress(&self, tuning_data: &TuningData) -> Option<f64> {
        if self.0.is_empty() {
            return None;
        }
        let mut min_progress = 1.0f64;
        for condition in &self.0 {
            min_progress = min_progress.min(condition.progress(tuning_data)?);
        }
        Some(min_progress)
    }

    fn descriptor(&self) -> serde_json::Value {
        json!({
            "kind": "And",
            "conditions": self.0.iter().map(|c| c.descriptor()).collect::<Vec<_>>(),
        })
    }
}

/// Stops when any sub-condition stops; progress is the maximum.
pub struct Any(pub Vec<Box<dyn AbortCondition + Send>>);

impl AbortCondition for Any {
    fn stop(&self, tuning_data: &TuningData) -> bool {
        if self.0.is_empty() {
            return true;
        }
        self.0.iter().any(|c| c.stop(tuning_data))
    }

    fn progress(&self, tuning_data: &TuningData) -> Option<f64> {
        if self.0.is_empty() {
            return None;
        }
        let mut max_progress = 0.0f64;
        for condition in &self.0 {
            max_progress = max_progress.max(condition.progress(tuning_data)?);
        }
        Some(max_progress)
    }

    fn descriptor(&self) -> serde_json::Value {
        json!({
            "kind": "Or",
            "conditions": self.0.iter().map(|c| c.descriptor()).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Configuration, Value};
    use serde_json::json;

    fn data_with(evaluations: u64, costs: &[CostValue]) -> TuningData {
        let mut data = TuningData::new(vec![], 100, 100, StdDuration::ZERO, json!({}), json!({}));
        let mut recorded = 0;
        for &cost in costs {
            let mut config = Configuration::new();
            config.insert("tp1".into(), Value::Int(recorded));
            data.record_evaluation(config, true, Some(cost), None, None)
                .unwrap();
            recorded += 1;
        }
        for i in recorded..evaluations as i64 {
            let mut config = Configuration::new();
            config.insert("tp1".into(), Value::Int(i));
            data.record_evaluation(config, false, None, None, None)
                .unwrap();
        }
        data
    }

    #[test]
    fn test_evaluations() {
        let data = data_with(5, &[3.0]);
        assert!(!Evaluations(6).stop(&data));
        assert!(Evaluations(5).stop(&data));
        assert_eq!(Evaluations(10).progress(&data), Some(0.5));
        assert_eq!(Evaluations(2).progress(&data), Some(1.0));
    }

    #[test]
    fn test_valid_evaluations() {
        let data = data_with(5, &[3.0, 2.0]);
        assert!(!ValidEvaluations(3).stop(&data));
        assert!(ValidEvaluations(2).stop(&data));
        assert_eq!(ValidEvaluations(4).progress(&data), Some(0.5));
    }

    #[test]
    fn test_fractions() {
        // constrained size is 100
        let data = data_with(10, &[1.0, 2.0]);
        assert!(Fraction(0.1).stop(&data));
        assert!(!Fraction(0.2).stop(&data));
        assert_eq!(Fraction(0.2).progress(&data), Some(0.5));
        assert!(ValidFraction(0.02).stop(&data));
        assert!(!ValidFraction(0.05).stop(&data));
    }

    #[test]
    fn test_cost_threshold() {
        let data = data_with(3, &[5.0, 2.5]);
        assert!(CostBelow(2.5).stop(&data));
        assert!(CostBelow(3.0).stop(&data));
        assert!(!CostBelow(1.0).stop(&data));
        assert!(!CostBelow(1.0).stop(&data_with(3, &[])));
        assert_eq!(CostBelow(1.0).progress(&data), None);
    }

    #[test]
    fn test_speedup_over_evaluations() {
        // costs 10 -> 2 within the window: speedup 5
        let data = data_with(2, &[10.0, 2.0]);
        assert!(Speedup::new(4.0, SpeedupWindow::Evaluations(10)).stop(&data));
        assert!(!Speedup::new(6.0, SpeedupWindow::Evaluations(10)).stop(&data));
        // no improvements at all: the evaluation bound applies
        let stale = data_with(5, &[]);
        assert!(Speedup::new(2.0, SpeedupWindow::Evaluations(5)).stop(&stale));
        assert!(!Speedup::new(2.0, SpeedupWindow::Evaluations(6)).stop(&stale));
    }

    #[test]
    fn test_composites() {
        let data = data_with(5, &[3.0]);
        let both = All(vec![
            Box::new(Evaluations(5)),
            Box::new(ValidEvaluations(1)),
        ]);
        assert!(both.stop(&data));
        assert_eq!(both.progress(&data), Some(1.0));

        let either = Any(vec![
            Box::new(Evaluations(100)),
            Box::new(ValidEvaluations(1)),
        ]);
        assert!(either.stop(&data));
        assert_eq!(either.progress(&data), Some(1.0));

        // unknown progress propagates
        let with_unknown = All(vec![Box::new(Evaluations(5)), Box::new(CostBelow(1.0))]);
        assert_eq!(with_unknown.progress(&data), None);

        assert!(All(vec![]).stop(&data));
        assert!(Any(vec![]).stop(&data));
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(
            Evaluations(7).descriptor(),
            json!({"kind": "Evaluations", "evaluations": 7})
        );
        assert_eq!(
            Speedup::new(2.0, SpeedupWindow::ValidEvaluations(3)).descriptor(),
            json!({"kind": "Speedup", "speedup": 2.0, "valid_evaluations": 3})
        );
        let composite = Any(vec![Box::new(Evaluations(1)), Box::new(CostBelow(0.5))]);
        assert_eq!(composite.descriptor()["kind"], json!("Or"));
        assert_eq!(
            composite.descriptor()["conditions"].as_array().unwrap().len(),
            2
        );
    }
}
