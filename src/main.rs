//! # tunekit CLI
//!
//! Auto-tunes a shell command: declared parameters are exported as
//! environment variables for every run, and the command's wall-clock
//! time (or a cost file it writes) is the cost being minimized.
//!
//! ## Usage
//!
//! ```bash
//! # find the gcc optimization level with the fastest build
//! tunekit --param O=0:3 --max-evaluations 4 -- \
//!     sh -c 'gcc -O$O -o bench bench.c'
//!
//! # tune tile sizes for a benchmark that writes its runtime to a file
//! tunekit --param TILE=1,2,4,8,16 --param THREADS=1:16 \
//!     --cost-file cost.txt -- ./bench
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tunekit::abort::{AbortCondition, Any, CostBelow, Duration as DurationCondition, Evaluations};
use tunekit::config::Config;
use tunekit::cost::CommandCostFunction;
use tunekit::parameter::Parameter;
use tunekit::range::Range;
use tunekit::techniques::{
    AucBandit, DifferentialEvolution, Exhaustive, PatternSearch, RandomSearch, RoundRobin,
    SimulatedAnnealing, Technique, Torczon,
};
use tunekit::tuner::Tuner;
use tunekit::value::Value;

#[derive(ClapParser, Debug)]
#[command(version, about = "Auto-tune a shell command over declared parameters")]
struct Args {
    /// Parameter declaration: NAME=START:END[:STEP] for an interval or
    /// NAME=v1,v2,... for an explicit value set. May be repeated.
    #[arg(long = "param", value_name = "SPEC", required = true)]
    params: Vec<String>,

    /// Command run for each configuration; parameters are exported as
    /// environment variables
    #[arg(required = true, last = true)]
    command: Vec<String>,

    /// Command run before each measurement (e.g. a compile step)
    #[arg(long, value_name = "CMD")]
    compile: Option<String>,

    /// Read the cost from this file instead of timing the command
    #[arg(long, value_name = "FILE")]
    cost_file: Option<PathBuf>,

    /// Search technique (overrides the config file)
    #[arg(long)]
    technique: Option<String>,

    /// Evaluation budget (overrides the config file)
    #[arg(long)]
    max_evaluations: Option<u64>,

    /// Wall-clock budget in seconds (overrides the config file)
    #[arg(long)]
    max_seconds: Option<u64>,

    /// Log file path (overrides the config file)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// PRNG seed for a reproducible run (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(technique) = &args.technique {
        config.tuning.technique = technique.clone();
    }
    if let Some(max_evaluations) = args.max_evaluations {
        config.tuning.max_evaluations = max_evaluations;
    }
    if let Some(max_seconds) = args.max_seconds {
        config.tuning.max_seconds = max_seconds;
    }
    if let Some(seed) = args.seed {
        config.tuning.seed = Some(seed);
    }
    if let Some(log_file) = &args.log_file {
        config.log.file = Some(log_file.clone());
    }

    let parameters = args
        .params
        .iter()
        .map(|spec| parse_parameter(spec))
        .collect::<Result<Vec<_>>>()?;

    let mut cost_function = CommandCostFunction::new(args.command);
    if let Some(compile) = &args.compile {
        cost_function = cost_function.compile_command(compile.split_whitespace());
    }
    if let Some(cost_file) = &args.cost_file {
        cost_function = cost_function.cost_file(cost_file);
    }

    let mut tuner = Tuner::new()
        .tuning_parameters(parameters)
        .search_technique(build_technique(
            &config.tuning.technique,
            config.tuning.seed,
        )?)
        .silent(config.log.silent);
    if let Some(log_file) = &config.log.file {
        tuner = tuner.log_file(log_file);
    }

    let result = tuner.tune(&mut cost_function, build_abort_condition(&config))?;
    match &result.configuration {
        Some(configuration) => {
            println!("best configuration:");
            for (name, value) in configuration {
                println!("    {name} = {value}");
            }
            println!("min cost: {}", result.min_cost.unwrap_or(f64::INFINITY));
        }
        None => println!("no valid configuration found"),
    }
    Ok(())
}

/// Parses `NAME=START:END[:STEP]` or `NAME=v1,v2,...` into a
/// parameter. Interval bounds may be integers or floats; set values
/// fall back to strings when they are not numeric.
fn parse_parameter(spec: &str) -> Result<Parameter> {
    let (name, values) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid parameter spec (expecting NAME=...): {spec}"))?;
    if name.is_empty() {
        bail!("invalid parameter spec (empty name): {spec}");
    }

    if values.contains(',') {
        let range = Range::set(values.split(',').map(parse_value));
        return Ok(Parameter::new(name, range));
    }

    let bounds: Vec<&str> = values.split(':').collect();
    let range = match bounds.as_slice() {
        [start, end] => interval(start, end, "1")?,
        [start, end, step] => interval(start, end, step)?,
        _ => bail!("invalid parameter spec (expecting START:END[:STEP] or v1,v2,...): {spec}"),
    };
    Ok(Parameter::new(name, range))
}

fn interval(start: &str, end: &str, step: &str) -> Result<Range> {
    let range = if [start, end, step].iter().all(|s| s.parse::<i64>().is_ok()) {
        Range::interval_with_step(
            start.parse::<i64>()?,
            end.parse::<i64>()?,
            step.parse::<i64>()?,
        )
    } else {
        Range::interval_with_step(
            start
                .parse::<f64>()
                .with_context(|| format!("invalid interval bound: {start}"))?,
            end.parse::<f64>()
                .with_context(|| format!("invalid interval bound: {end}"))?,
            step.parse::<f64>()
                .with_context(|| format!("invalid interval step: {step}"))?,
        )
    };
    Ok(range?)
}

fn parse_value(text: &str) -> Value {
    if let Ok(int) = text.parse::<i64>() {
        Value::Int(int)
    } else if let Ok(float) = text.parse::<f64>() {
        Value::Float(float)
    } else {
        Value::from(text)
    }
}

fn build_technique(name: &str, seed: Option<u64>) -> Result<Technique> {
    let technique = match (name, seed) {
        ("auc-bandit", None) => AucBandit::new().into(),
        ("auc-bandit", Some(seed)) => AucBandit::with_seed(seed).into(),
        ("round-robin", None) => RoundRobin::new().into(),
        ("round-robin", Some(seed)) => RoundRobin::with_seed(seed).into(),
        ("random", None) => RandomSearch::new().into(),
        ("random", Some(seed)) => RandomSearch::with_seed(seed).into(),
        ("simulated-annealing", None) => SimulatedAnnealing::new().into(),
        ("simulated-annealing", Some(seed)) => SimulatedAnnealing::with_seed(seed).into(),
        ("pattern-search", None) => PatternSearch::new().into(),
        ("pattern-search", Some(seed)) => PatternSearch::with_seed(seed).into(),
        ("torczon", None) => Torczon::new().into(),
        ("torczon", Some(seed)) => Torczon::with_seed(seed).into(),
        ("differential-evolution", None) => DifferentialEvolution::new().into(),
        ("differential-evolution", Some(seed)) => DifferentialEvolution::with_seed(seed).into(),
        ("exhaustive", _) => Exhaustive::new().into(),
        (other, _) => bail!("unknown search technique: {other}"),
    };
    Ok(technique)
}

fn build_abort_condition(config: &Config) -> Option<Box<dyn AbortCondition + Send>> {
    let mut conditions: Vec<Box<dyn AbortCondition + Send>> = Vec::new();
    if config.tuning.max_evaluations > 0 {
        conditions.push(Box::new(Evaluations(config.tuning.max_evaluations)));
    }
    if config.tuning.max_seconds > 0 {
        conditions.push(Box::new(DurationCondition(Duration::from_secs(
            config.tuning.max_seconds,
        ))));
    }
    if let Some(target_cost) = config.tuning.target_cost {
        conditions.push(Box::new(CostBelow(target_cost)));
    }
    match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(Box::new(Any(conditions))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval_parameter() {
        let param = parse_parameter("threads=1:16").unwrap();
        assert_eq!(param.name(), "threads");
        assert_eq!(param.range().len(), 16);
        assert_eq!(param.range().get(0).unwrap(), Value::Int(1));

        let param = parse_parameter("alpha=0.0:1.0:0.25").unwrap();
        assert_eq!(param.range().len(), 5);
    }

    #[test]
    fn test_parse_set_parameter() {
        let param = parse_parameter("opt=fast,small,2").unwrap();
        assert_eq!(param.range().len(), 3);
        assert_eq!(param.range().get(0).unwrap(), Value::from("fast"));
        assert_eq!(param.range().get(2).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_parse_rejects_malformed_specs() {
        assert!(parse_parameter("threads").is_err());
        assert!(parse_parameter("=1:4").is_err());
        assert!(parse_parameter("threads=1:2:3:4").is_err());
        assert!(parse_parameter("threads=a:b").is_err());
    }

    #[test]
    fn test_build_technique_names() {
        for name in [
            "auc-bandit",
            "round-robin",
            "random",
            "simulated-annealing",
            "pattern-search",
            "torczon",
            "differential-evolution",
            "exhaustive",
        ] {
            assert!(build_technique(name, Some(1)).is_ok(), "{name}");
        }
        assert!(build_technique("gradient-descent", None).is_err());
    }
}
