//! Search-space construction and addressing scenarios.

use std::collections::HashSet;
use tunekit::parameter::{Constraint, Parameter};
use tunekit::range::Range;
use tunekit::search_space::SearchSpace;
use tunekit::value::{Configuration, Value};

fn interval(start: i64, end: i64) -> Range {
    Range::interval(start, end).unwrap()
}

fn config(pairs: &[(&str, Value)]) -> Configuration {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

/// tp1 ∈ 1..10, tp2 ∈ 5..10 with tp2 % tp1 == 0, tp3 ∈ 2..3 with
/// tp1 % tp3 == 0: one dependent group with 11 feasible assignments.
fn dependent_group() -> Vec<Parameter> {
    vec![
        Parameter::new("tp1", interval(1, 10)),
        Parameter::constrained(
            "tp2",
            interval(5, 10),
            Constraint::new(["tp2", "tp1"], |c: &Configuration| {
                c["tp2"].as_int().unwrap() % c["tp1"].as_int().unwrap() == 0
            }),
        ),
        Parameter::constrained(
            "tp3",
            interval(2, 3),
            Constraint::new(["tp3", "tp1"], |c: &Configuration| {
                c["tp1"].as_int().unwrap() % c["tp3"].as_int().unwrap() == 0
            }),
        ),
    ]
}

/// The dependent group plus an independent one: tp4 ∈ {min, max},
/// tp5, tp6 ∈ 1..10 with tp4(tp5, tp6) == 10.
fn two_groups() -> Vec<Parameter> {
    let mut params = dependent_group();
    params.push(Parameter::new("tp4", Range::set(["min", "max"])));
    params.push(Parameter::new("tp5", interval(1, 10)));
    params.push(Parameter::constrained(
        "tp6",
        interval(1, 10),
        Constraint::new(["tp6", "tp4", "tp5"], |c: &Configuration| {
            let tp5 = c["tp5"].as_int().unwrap();
            let tp6 = c["tp6"].as_int().unwrap();
            match c["tp4"].as_str().unwrap() {
                "min" => tp5.min(tp6) == 10,
                _ => tp5.max(tp6) == 10,
            }
        }),
    ));
    params
}

#[test]
fn single_interval_parameter() {
    let space = SearchSpace::build(vec![Parameter::new("tp1", interval(1, 10))], true).unwrap();
    assert_eq!(space.constrained_size(), 10);
    assert_eq!(space.unconstrained_size(), 10);

    for (coordinate, expected) in [
        (0.00001, 1),
        (0.10000, 1),
        (0.70001, 8),
        (0.72351, 8),
        (0.80000, 8),
        (1.00000, 10),
    ] {
        assert_eq!(
            space.configuration_by_coordinates(&[coordinate]).unwrap(),
            config(&[("tp1", Value::Int(expected))]),
            "coordinate {coordinate}"
        );
    }

    let by_index: Vec<i64> = (0..10)
        .map(|i| space.configuration_by_index(i).unwrap()["tp1"].as_int().unwrap())
        .collect();
    assert_eq!(by_index, (1..=10).collect::<Vec<_>>());
}

#[test]
fn independent_parameters() {
    let space = SearchSpace::build(
        vec![
            Parameter::new("tp1", interval(1, 10)),
            Parameter::new("tp2", interval(5, 10)),
        ],
        false,
    )
    .unwrap();
    assert_eq!(space.constrained_size(), 60);
    assert_eq!(
        space
            .configuration_by_coordinates(&[0.00001, 0.00001])
            .unwrap(),
        config(&[("tp1", Value::Int(1)), ("tp2", Value::Int(5))])
    );
    assert_eq!(
        space
            .configuration_by_coordinates(&[0.30001, 0.50001])
            .unwrap(),
        config(&[("tp1", Value::Int(4)), ("tp2", Value::Int(8))])
    );
    assert_eq!(
        space
            .configuration_by_coordinates(&[0.30001, 1.0])
            .unwrap(),
        config(&[("tp1", Value::Int(4)), ("tp2", Value::Int(10))])
    );
}

#[test]
fn constrained_group_size_and_canonical_order() {
    let space = SearchSpace::build(dependent_group(), true).unwrap();
    assert_eq!(space.constrained_size(), 11);
    assert_eq!(space.unconstrained_size(), 120);

    assert_eq!(
        space.configuration_by_index(0).unwrap(),
        config(&[
            ("tp1", Value::Int(2)),
            ("tp2", Value::Int(6)),
            ("tp3", Value::Int(2)),
        ])
    );
    assert_eq!(
        space.configuration_by_index(10).unwrap(),
        config(&[
            ("tp1", Value::Int(10)),
            ("tp2", Value::Int(10)),
            ("tp3", Value::Int(2)),
        ])
    );

    assert_eq!(
        space
            .configuration_by_coordinates(&[0.00001, 0.00001, 0.00001])
            .unwrap(),
        config(&[
            ("tp1", Value::Int(2)),
            ("tp2", Value::Int(6)),
            ("tp3", Value::Int(2)),
        ])
    );
    assert_eq!(
        space
            .configuration_by_coordinates(&[0.60000, 1.00000, 0.50001])
            .unwrap(),
        config(&[
            ("tp1", Value::Int(6)),
            ("tp2", Value::Int(6)),
            ("tp3", Value::Int(3)),
        ])
    );
}

#[test]
fn multi_group_space() {
    let space = SearchSpace::build(two_groups(), true).unwrap();
    assert_eq!(space.constrained_size(), 11 * 20);

    // the last group is the least-significant index digit
    assert_eq!(
        space.configuration_by_index(0).unwrap(),
        config(&[
            ("tp1", Value::Int(2)),
            ("tp2", Value::Int(6)),
            ("tp3", Value::Int(2)),
            ("tp4", Value::from("min")),
            ("tp5", Value::Int(10)),
            ("tp6", Value::Int(10)),
        ])
    );
    assert_eq!(
        space.configuration_by_index(1).unwrap(),
        config(&[
            ("tp1", Value::Int(2)),
            ("tp2", Value::Int(6)),
            ("tp3", Value::Int(2)),
            ("tp4", Value::from("max")),
            ("tp5", Value::Int(1)),
            ("tp6", Value::Int(10)),
        ])
    );
    assert_eq!(
        space.configuration_by_index(20).unwrap(),
        config(&[
            ("tp1", Value::Int(2)),
            ("tp2", Value::Int(8)),
            ("tp3", Value::Int(2)),
            ("tp4", Value::from("min")),
            ("tp5", Value::Int(10)),
            ("tp6", Value::Int(10)),
        ])
    );
    assert_eq!(
        space.configuration_by_index(21).unwrap(),
        config(&[
            ("tp1", Value::Int(2)),
            ("tp2", Value::Int(8)),
            ("tp3", Value::Int(2)),
            ("tp4", Value::from("max")),
            ("tp5", Value::Int(1)),
            ("tp6", Value::Int(10)),
        ])
    );

    assert_eq!(
        space
            .configuration_by_coordinates(&[0.27273, 0.00001, 0.00001, 0.00001, 0.00001, 0.00001])
            .unwrap(),
        config(&[
            ("tp1", Value::Int(3)),
            ("tp2", Value::Int(6)),
            ("tp3", Value::Int(3)),
            ("tp4", Value::from("min")),
            ("tp5", Value::Int(10)),
            ("tp6", Value::Int(10)),
        ])
    );
    assert_eq!(
        space
            .configuration_by_coordinates(&[0.45455, 0.65410, 0.50001, 1.00000, 0.47369, 0.68753])
            .unwrap(),
        config(&[
            ("tp1", Value::Int(4)),
            ("tp2", Value::Int(8)),
            ("tp3", Value::Int(2)),
            ("tp4", Value::from("max")),
            ("tp5", Value::Int(10)),
            ("tp6", Value::Int(7)),
        ])
    );
}

#[test]
fn index_enumeration_yields_the_feasible_set_without_duplicates() {
    let params = two_groups();
    let space = SearchSpace::build(params, true).unwrap();
    let size = space.constrained_size() as u64;

    let mut seen = HashSet::new();
    for index in 0..size {
        let configuration = space.configuration_by_index(index).unwrap();

        let tp1 = configuration["tp1"].as_int().unwrap();
        let tp2 = configuration["tp2"].as_int().unwrap();
        let tp3 = configuration["tp3"].as_int().unwrap();
        let tp5 = configuration["tp5"].as_int().unwrap();
        let tp6 = configuration["tp6"].as_int().unwrap();
        assert_eq!(tp2 % tp1, 0, "index {index}");
        assert_eq!(tp1 % tp3, 0, "index {index}");
        match configuration["tp4"].as_str().unwrap() {
            "min" => assert_eq!(tp5.min(tp6), 10, "index {index}"),
            _ => assert_eq!(tp5.max(tp6), 10, "index {index}"),
        }

        assert!(seen.insert(serde_json::to_string(&configuration).unwrap()));
    }
    assert_eq!(seen.len() as u64, size);
}

#[test]
fn coordinates_always_resolve_to_a_feasible_configuration() {
    let space = SearchSpace::build(dependent_group(), false).unwrap();
    for i in 0..500 {
        let c = (i as f64 + 1.0) / 500.0;
        let coords = [c, 1.0 - c + 0.001, (c * 7.3) % 1.0 + 0.0001];
        let coords: Vec<f64> = coords.iter().map(|x| x.min(1.0)).collect();
        let configuration = space.configuration_by_coordinates(&coords).unwrap();
        let tp1 = configuration["tp1"].as_int().unwrap();
        let tp2 = configuration["tp2"].as_int().unwrap();
        let tp3 = configuration["tp3"].as_int().unwrap();
        assert_eq!(tp2 % tp1, 0);
        assert_eq!(tp1 % tp3, 0);
    }
}

/// A single unconstrained parameter is stored compressed (the range in
/// one child node); with an always-true constraint the same values
/// materialize as ordinary child nodes. Both layouts must partition
/// the coordinate axis identically.
#[test]
fn compressed_and_materialized_layouts_agree() {
    let compressed =
        SearchSpace::build(vec![Parameter::new("tp1", interval(1, 10))], false).unwrap();
    let materialized = SearchSpace::build(
        vec![Parameter::constrained(
            "tp1",
            interval(1, 10),
            Constraint::new(["tp1"], |_| true),
        )],
        false,
    )
    .unwrap();
    assert_eq!(compressed.constrained_size(), 10);
    assert_eq!(materialized.constrained_size(), 10);

    let mut counts = [0u32; 10];
    for i in 0..1000 {
        let c = (i as f64 + 1.0) / 1000.0;
        let a = compressed.configuration_by_coordinates(&[c]).unwrap();
        let b = materialized.configuration_by_coordinates(&[c]).unwrap();
        assert_eq!(a, b, "coordinate {c}");
        counts[(a["tp1"].as_int().unwrap() - 1) as usize] += 1;
    }
    // uniform partition: 1000 probes over 10 values
    assert!(counts.iter().all(|&n| n == 100), "{counts:?}");
}
