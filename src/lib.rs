//! # TuneKit Auto-Tuner
//!
//! Declare tuning parameters with value ranges and inter-parameter
//! constraints, plug in a cost function, and let a search technique
//! find the cheapest feasible configuration.
//!
//! ## Pipeline
//!
//! ```text
//! Parameters (ranges + constraints)
//!     ↓
//! [SearchSpace]       → constrained feasible space (chain of trees)
//!     ↓
//! [Tuner]             → orchestration loop
//!     ↓            ↖
//! [SearchTechnique]   → proposes coordinates / indices
//!     ↓            ↗
//! [CostFunction]      → evaluates one configuration (external)
//!     ↓
//! [TuningData]        → history, improvement history, JSON log
//!     ↓
//! [AbortCondition]    → stop?
//! ```
//!
//! ## Usage
//!
//! ```
//! use tunekit::abort::Evaluations;
//! use tunekit::cost::{CostError, CostOutcome};
//! use tunekit::parameter::{Constraint, Parameter};
//! use tunekit::range::Range;
//! use tunekit::techniques::RandomSearch;
//! use tunekit::tuner::Tuner;
//! use tunekit::value::Configuration;
//!
//! # fn main() -> Result<(), tunekit::tuner::TuningError> {
//! let cache_kb = Parameter::new("cache_kb", Range::interval(1, 64)?);
//! let line_kb = Parameter::constrained(
//!     "line_kb",
//!     Range::interval(1, 64)?,
//!     Constraint::new(["line_kb", "cache_kb"], |config: &Configuration| {
//!         config["cache_kb"].as_int().unwrap() % config["line_kb"].as_int().unwrap() == 0
//!     }),
//! );
//!
//! let result = Tuner::new()
//!     .tuning_parameters(vec![cache_kb, line_kb])
//!     .search_technique(RandomSearch::with_seed(42))
//!     .silent(true)
//!     .tune(
//!         &mut |config: &Configuration| -> Result<CostOutcome, CostError> {
//!             let cache = config["cache_kb"].as_int().unwrap() as f64;
//!             let line = config["line_kb"].as_int().unwrap() as f64;
//!             Ok(CostOutcome::new(cache / line + line))
//!         },
//!         Some(Box::new(Evaluations(100))),
//!     )?;
//! assert!(result.configuration.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `value` | Parameter values and configurations |
//! | `range` | Intervals and value sets |
//! | `parameter` | Named parameters with constraints |
//! | `search_space` | Constrained space construction and addressing |
//! | `techniques` | Search techniques and the two proposer contracts |
//! | `abort` | Termination predicates |
//! | `tuning_data` | Evaluation history and the JSON run log |
//! | `cost` | Cost-function contract and the shell back-end |
//! | `tuner` | Run builder and orchestration loop |
//! | `config` | Configuration for the CLI binary |

pub mod abort;
pub mod config;
pub mod cost;
pub mod error;
pub mod parameter;
pub mod range;
pub mod search_space;
pub mod techniques;
pub mod tuner;
pub mod tuning_data;
pub mod value;

mod interrupt;

// Re-export the types most callers touch
pub use cost::{CommandCostFunction, CostError, CostFunction, CostOutcome};
pub use error::{ConfigurationError, DomainError};
pub use parameter::{Constraint, Parameter};
pub use range::{Generator, Range};
pub use search_space::SearchSpace;
pub use techniques::{SearchTechnique, SearchTechnique1D, Technique};
pub use tuner::{Tuner, TuningError, TuningResult};
pub use tuning_data::{Cost, MetaData, TuningData};
pub use value::{Configuration, Value};
