//! Every operation in the fixed enumeration must dispatch to a well-formed
//! outcome (a result or a typed error), never an unhandled fault, no
//! matter how little of the expected argument mapping is present.

use resolve_mcp::host::sim::SimulatedEditor;
use resolve_mcp::ops::{OpError, Operation, Session};
use serde_json::json;

#[test]
fn every_operation_dispatches_with_empty_arguments() {
    let mut session = Session::new(Some(SimulatedEditor::with_demo_project()), false);

    for op in Operation::ALL {
        let outcome = session.dispatch(*op, &json!({}));
        match outcome {
            Ok(value) => {
                assert!(
                    value.is_object(),
                    "{} returned a non-object result",
                    op.name()
                );
            }
            Err(error) => {
                assert!(
                    !error.to_string().is_empty(),
                    "{} produced an empty error message",
                    op.name()
                );
            }
        }
    }
}

#[test]
fn every_operation_errors_cleanly_without_an_editor() {
    let mut session = Session::new(None, false);

    for op in Operation::ALL {
        let error = session
            .dispatch(*op, &json!({}))
            .expect_err("dispatch without an editor must fail");
        assert!(
            matches!(error, OpError::NotConnected(_)),
            "{} did not report not-connected",
            op.name()
        );
    }
}

#[test]
fn every_operation_errors_cleanly_with_junk_arguments() {
    let mut session = Session::new(Some(SimulatedEditor::with_demo_project()), false);
    let junk = json!({
        "frame": "not-a-number",
        "name": 42,
        "clip_name": { "nested": true },
        "path": [],
        "file_paths": "not-a-list",
    });

    for op in Operation::ALL {
        // Must not panic; any outcome that is Ok or a typed error is fine.
        let _ = session.dispatch(*op, &junk);
    }
}

#[test]
fn operations_listing_matches_parse() {
    for op in Operation::ALL {
        assert_eq!(Operation::parse(op.name()), Some(*op));
    }
    assert!(Operation::parse("").is_none());
    assert!(Operation::parse("get_projects ").is_none());
}
