// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for process definition parsing and model queries

use meridian_core::domain::process::{NodeKind, ParseError, ProcessModel};
use meridian_core::infrastructure::process_parser::ProcessParser;
use std::io::Write;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

#[test]
fn test_parse_review_fixture() {
    let model = ProcessParser::parse_file(fixture("inclusive_review.yaml"))
        .expect("Failed to parse inclusive_review.yaml");

    assert_eq!(model.metadata.name, "inclusive-review");
    assert_eq!(model.metadata.version.as_deref(), Some("1.0.0"));
    assert_eq!(model.node_count(), 9);
    assert_eq!(model.flow_count(), 11);

    assert!(model.is_gateway("split"));
    assert!(model.is_activity("finalize"));
    assert!(model.is_event("end"));
    assert_eq!(model.outgoing_flows("split").len(), 4);
    assert_eq!(model.incoming_flows("join").len(), 4);
    assert_eq!(model.default_flow("split").map(|f| f.target.as_str()), Some("taskDefault"));
    assert_eq!(model.elements_of_kind(NodeKind::InclusiveGateway).len(), 2);
    assert_eq!(model.get_flow("f_a").and_then(|f| f.condition.as_deref()), Some("conditionA"));
}

#[test]
fn test_boundary_index_and_mixed_case_kinds() {
    let model = ProcessParser::parse_file(fixture("parallel_with_error_boundary.yaml")).unwrap();

    assert_eq!(model.boundary_events("lint"), ["lint_failed".to_string()]);
    assert!(model.boundary_events("compile").is_empty());
    assert_eq!(model.get_node("fork").map(|n| n.kind), Some(NodeKind::ParallelGateway));
    assert_eq!(model.get_node("sync").map(|n| n.kind), Some(NodeKind::ParallelGateway));
    let boundary = model.get_node("lint_failed").unwrap();
    assert!(boundary.cancel_activity);
    assert_eq!(boundary.event_trigger.as_deref(), Some("error"));
    assert_eq!(model.get_node("publish").and_then(|n| n.loop_cardinality), Some(3));
}

#[test]
fn test_parse_file_from_temp_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "processes:\n  - id: tiny\n    elements:\n      - {{ id: s, type: startEvent }}"
    )
    .unwrap();

    let model = ProcessParser::parse_file(&path).unwrap();
    assert_eq!(model.process_ids().collect::<Vec<_>>(), vec!["tiny"]);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ProcessParser::parse_file(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ParseError::Io { .. })));
}

#[test]
fn test_zero_processes_rejected() {
    let result = ProcessModel::load("apiVersion: meridian/v1\nkind: ProcessDefinition\nprocesses: []\n");
    assert!(matches!(result, Err(ParseError::NoProcesses)));

    let result = ProcessModel::load("metadata:\n  name: nothing\n");
    assert!(matches!(result, Err(ParseError::NoProcesses)));
}

#[test]
fn test_wrong_kind_rejected() {
    let yaml = r#"
kind: Workflow
processes:
  - id: p
    elements:
      - { id: s, type: startEvent }
"#;
    assert!(matches!(
        ProcessModel::load(yaml),
        Err(ParseError::InvalidKind { .. })
    ));
}

#[test]
fn test_structural_violations_rejected() {
    let cases = [
        (
            "unknown kind",
            "processes:\n  - id: p\n    elements:\n      - { id: s, type: startEvent }\n      - { id: x, type: timerThing }\n",
        ),
        (
            "dangling flow",
            "processes:\n  - id: p\n    elements:\n      - { id: s, type: startEvent }\n    flows:\n      - { id: f, source: s, target: ghost }\n",
        ),
        (
            "duplicate id",
            "processes:\n  - id: p\n    elements:\n      - { id: s, type: startEvent }\n      - { id: s, type: task }\n",
        ),
        (
            "unattached boundary",
            "processes:\n  - id: p\n    elements:\n      - { id: s, type: startEvent }\n      - { id: b, type: boundaryEvent }\n",
        ),
        (
            "boundary on event",
            "processes:\n  - id: p\n    elements:\n      - { id: s, type: startEvent }\n      - { id: b, type: boundaryEvent, attachedTo: s }\n",
        ),
        (
            "default on task",
            "processes:\n  - id: p\n    elements:\n      - { id: s, type: startEvent }\n      - { id: t, type: task, default: f }\n    flows:\n      - { id: f, source: t, target: s }\n",
        ),
        (
            "no start event",
            "processes:\n  - id: p\n    elements:\n      - { id: t, type: task }\n",
        ),
    ];

    for (label, yaml) in cases {
        assert!(ProcessModel::load(yaml).is_err(), "{label} should be rejected");
    }
}

#[test]
fn test_subprocess_scope_is_enforced() {
    let yaml = r#"
processes:
  - id: p
    elements:
      - { id: s, type: startEvent }
      - id: sub
        type: subProcess
        elements:
          - { id: inner_start, type: startEvent }
          - { id: inner, type: task }
        flows:
          - { id: f_inner, source: inner_start, target: inner }
      - { id: e, type: endEvent }
    flows:
      - { id: f1, source: s, target: sub }
      - { id: f2, source: sub, target: e }
      - { id: leak, source: inner, target: e }
"#;
    assert!(matches!(
        ProcessModel::load(yaml),
        Err(ParseError::CrossScopeFlow(id)) if id == "leak"
    ));

    let valid = yaml.replace("      - { id: leak, source: inner, target: e }\n", "");
    let model = ProcessModel::load(&valid).unwrap();
    assert_eq!(model.children_of("sub").len(), 2);
    assert_eq!(model.subprocess_start_events("sub")[0].id, "inner_start");
    assert!(model.start_events("p").iter().all(|n| n.id == "s"));
}
