mod common;

use std::collections::BTreeMap;
use std::fs;

use common::two_function_agent;
use simdag::errors::SimError;
use simdag::io::{read_population, write_population};
use simdag::model::Value;
use simdag::sim::Simulation;

const POP: &str = "\
<states>
  <itno>0</itno>
  <xagent>
    <name>A</name>
    <x>7</x>
  </xagent>
  <xagent>
    <name>A</name>
    <x>-3</x>
  </xagent>
</states>
";

#[test]
fn population_survives_a_read_write_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let model = two_function_agent();

    let input = dir.path().join("in.xml");
    fs::write(&input, POP).unwrap();
    let population = read_population(&input, &model).unwrap();
    assert_eq!(population.itno, 0);
    assert_eq!(population.rows.len(), 2);

    // Rebuild the persisted-column shape the writer consumes.
    let mut columns: BTreeMap<(String, String), Vec<Value>> = BTreeMap::new();
    for row in &population.rows {
        for (var, value) in &row.values {
            columns
                .entry((row.agent.clone(), var.clone()))
                .or_default()
                .push(value.clone());
        }
    }

    let prefix = dir.path().join("out_");
    let written = write_population(&prefix, 0, &model, &columns).unwrap();
    let reread = read_population(&written, &model).unwrap();
    assert_eq!(reread, population);
}

#[test]
fn a_full_run_emits_numbered_population_documents() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.xml");
    fs::write(&input, POP).unwrap();

    let mut sim = Simulation::new(two_function_agent());
    sim.load_population(&input).unwrap();
    let prefix = dir.path().join("pop_");
    sim.set_output_prefix(&prefix);

    sim.run(2, 2).unwrap();

    // Input carried itno 0, so iterations emit 1 and 2.
    let first = dir.path().join("pop_1.xml");
    let second = dir.path().join("pop_2.xml");
    assert!(first.exists());
    assert!(second.exists());

    let population = read_population(&second, &two_function_agent()).unwrap();
    assert_eq!(population.itno, 2);
    let xs: Vec<i64> = population
        .rows
        .iter()
        .map(|r| r.values["x"].as_int().unwrap())
        .collect();
    // No callbacks registered, so memory is untouched.
    assert_eq!(xs, vec![7, -3]);
}

#[test]
fn unknown_agent_is_invalid_population() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.xml");
    fs::write(
        &input,
        "<states><itno>0</itno><xagent><name>Ghost</name></xagent></states>",
    )
    .unwrap();

    let err = read_population(&input, &two_function_agent()).unwrap_err();
    match err {
        SimError::InvalidPopulation(message) => assert!(message.contains("Ghost")),
        other => panic!("expected InvalidPopulation, got {other:?}"),
    }
}

#[test]
fn unknown_variable_is_invalid_population() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.xml");
    fs::write(
        &input,
        "<states><itno>0</itno><xagent><name>A</name><warp>1</warp></xagent></states>",
    )
    .unwrap();

    let err = read_population(&input, &two_function_agent()).unwrap_err();
    match err {
        SimError::InvalidPopulation(message) => assert!(message.contains("warp")),
        other => panic!("expected InvalidPopulation, got {other:?}"),
    }
}

#[test]
fn uncastable_value_is_invalid_population() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.xml");
    fs::write(
        &input,
        "<states><itno>0</itno><xagent><name>A</name><x>seven</x></xagent></states>",
    )
    .unwrap();

    let err = read_population(&input, &two_function_agent()).unwrap_err();
    match err {
        SimError::InvalidPopulation(message) => assert!(message.contains("seven")),
        other => panic!("expected InvalidPopulation, got {other:?}"),
    }
}

#[test]
fn missing_variables_default_when_loading() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.xml");
    fs::write(
        &input,
        "<states><itno>4</itno><xagent><name>A</name></xagent></states>",
    )
    .unwrap();

    let mut sim = Simulation::new(two_function_agent());
    sim.load_population(&input).unwrap();
    assert_eq!(
        sim.store("A").unwrap().column("x").unwrap(),
        vec![Value::Int(0)]
    );
}
