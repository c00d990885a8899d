//! The capability map is a per-project snapshot: entries probed against one
//! project's handles must not survive a project switch.

use resolve_mcp::host::sim::SimulatedEditor;
use resolve_mcp::ops::Session;
use serde_json::json;

#[test]
fn capabilities_rebuild_after_create_project() {
    // No project open: timeline and media accessors probe as unavailable.
    let editor = SimulatedEditor::empty();
    let mut session = Session::new(Some(editor), false);
    assert!(session.capabilities().supports("get_project_manager"));
    assert!(!session.capabilities().supports("get_timeline_names"));
    assert!(!session.capabilities().supports("get_clip_list"));

    session
        .dispatch_named("create_project", &json!({"name": "Fresh Cut"}))
        .unwrap();

    // The new project has a default timeline, so the rebuilt map must see
    // the timeline accessors that were unavailable a moment ago.
    assert!(session.capabilities().supports("get_timeline_names"));
    assert!(session.capabilities().supports("get_current_timeline"));
    assert!(session.capabilities().supports("get_markers"));
}

#[test]
fn capabilities_rebuild_after_open_project() {
    let editor = SimulatedEditor::with_demo_project();
    let mut session = Session::new(Some(editor), false);
    assert!(session.capabilities().supports("get_node_graph"));

    // Switch to a project whose timeline is empty: the node graph probe
    // needs a clip under the playhead, which the new project lacks.
    session
        .dispatch_named("create_project", &json!({"name": "Empty"}))
        .unwrap();
    assert!(!session.capabilities().supports("get_node_graph"));
    assert!(session.capabilities().supports("get_markers"));

    // And back again.
    session
        .dispatch_named("open_project", &json!({"name": "Demo Project"}))
        .unwrap();
    assert!(session.capabilities().supports("get_node_graph"));
}

#[test]
fn failed_switch_keeps_the_map() {
    let editor = SimulatedEditor::with_demo_project();
    let mut session = Session::new(Some(editor), false);
    let before = session.capabilities().to_value();

    let err = session
        .dispatch_named("open_project", &json!({"name": "No Such Project"}))
        .unwrap_err();
    assert!(err.to_string().contains("Failed to open project"));
    assert_eq!(session.capabilities().to_value(), before);
}

#[test]
fn non_switching_operations_do_not_reprobe() {
    let editor = SimulatedEditor::with_demo_project();
    let mut session = Session::new(Some(editor), false);
    let before = session.capabilities().to_value();

    session
        .dispatch_named("get_timeline_markers", &json!({}))
        .unwrap();
    session
        .dispatch_named("add_timeline_marker", &json!({"frame": 10}))
        .unwrap();

    assert_eq!(session.capabilities().to_value(), before);
}
