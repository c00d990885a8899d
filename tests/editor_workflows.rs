//! End-to-end workflows through the dispatch layer, the way an LLM client
//! would drive the shim: organise media, cut a timeline, mark it up, grade
//! a clip, queue a render.

use resolve_mcp::host::sim::SimulatedEditor;
use resolve_mcp::ops::Session;
use serde_json::json;

fn demo_session() -> Session {
    Session::new(Some(SimulatedEditor::with_demo_project()), false)
}

#[test]
fn organise_media_then_cut_timeline() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["scene1_take1.mov", "scene1_take2.mov"] {
        std::fs::write(dir.path().join(name), b"stub").unwrap();
    }

    let mut session = demo_session();

    session
        .dispatch_named("create_folder_path", &json!({"path": "Scenes/Scene 1"}))
        .unwrap();

    let imported = session
        .dispatch_named(
            "import_files_to_folder",
            &json!({
                "file_paths": [
                    dir.path().join("scene1_take1.mov").to_str().unwrap(),
                    dir.path().join("scene1_take2.mov").to_str().unwrap(),
                ],
                "folder_path": "Scenes/Scene 1",
            }),
        )
        .unwrap();
    assert_eq!(imported["imported_clip_count"], 2);

    let folder = session
        .dispatch_named(
            "get_folder_by_path",
            &json!({"path": "Scenes/Scene 1", "include_clips": true}),
        )
        .unwrap();
    assert_eq!(folder["folder"]["clip_count"], 2);

    // The timeline still cuts from the root-folder clips.
    session
        .dispatch_named("add_clip_to_timeline", &json!({"clip_name": "Interview A"}))
        .unwrap();
    let clips = session
        .dispatch_named("get_timeline_clips", &json!({}))
        .unwrap();
    assert_eq!(clips["clips"].as_array().unwrap().len(), 3);
}

#[test]
fn mark_up_review_pass() {
    let mut session = demo_session();

    for (frame, color, note) in [
        (0, "Red", "flash frame"),
        (60, "Yellow", "check continuity"),
        (120, "Red", "audio pop"),
    ] {
        session
            .dispatch_named(
                "add_timeline_marker",
                &json!({"frame": frame, "color": color, "note": note}),
            )
            .unwrap();
    }

    // Resolve one of the red notes, then clear the rest of the colour.
    session
        .dispatch_named(
            "update_marker",
            &json!({"frame": 0, "color": "Green", "note": "fixed"}),
        )
        .unwrap();
    let removed = session
        .dispatch_named("delete_markers_by_color", &json!({"color": "Red"}))
        .unwrap();
    assert_eq!(removed["deleted_count"], 1);

    let markers = session
        .dispatch_named("get_timeline_markers", &json!({}))
        .unwrap();
    let remaining: Vec<(u64, String)> = markers["markers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| {
            (
                m["frame"].as_u64().unwrap(),
                m["color"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        remaining,
        vec![(0, "Green".to_string()), (60, "Yellow".to_string())]
    );
}

#[test]
fn grade_the_current_clip() {
    let mut session = demo_session();

    session.dispatch_named("add_serial_node", &json!({})).unwrap();
    session
        .dispatch_named("set_node_label", &json!({"label": "Warm Look"}))
        .unwrap();
    session
        .dispatch_named(
            "set_primary_correction",
            &json!({
                "lift": {"red": 0.02},
                "gain": {"red": 1.05, "blue": 0.95},
                "saturation": 1.1,
            }),
        )
        .unwrap();

    let nodes = session.dispatch_named("get_node_list", &json!({})).unwrap();
    assert_eq!(nodes["node_count"], 2);
    assert_eq!(nodes["nodes"][1]["label"], "Warm Look");
    assert_eq!(nodes["nodes"][1]["is_current"], true);

    let grade = session
        .dispatch_named("get_primary_correction", &json!({}))
        .unwrap();
    assert!((grade["gain"]["red"].as_f64().unwrap() - 1.05).abs() < 1e-9);

    // Node 1 keeps its neutral grade.
    session
        .dispatch_named("set_current_node_index", &json!({"index": 1}))
        .unwrap();
    let grade = session
        .dispatch_named("get_primary_correction", &json!({}))
        .unwrap();
    assert!(grade["gain"]["red"].as_f64().unwrap().abs() < 1e-9);
}

#[test]
fn queue_and_run_a_render() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = demo_session();

    let job = session
        .dispatch_named(
            "add_render_job",
            &json!({
                "preset_name": "H.264 Master",
                "output_directory": dir.path().to_str().unwrap(),
            }),
        )
        .unwrap();
    let job_id = job["job_id"].as_str().unwrap().to_string();

    session.dispatch_named("start_rendering", &json!({})).unwrap();

    let status = session
        .dispatch_named("get_render_job_status", &json!({"job_id": job_id}))
        .unwrap();
    assert_eq!(status["status"]["status"], "Complete");
}

#[test]
fn export_timeline_and_timecode_report() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = demo_session();

    let xml_path = dir.path().join("cut.fcpxml");
    session
        .dispatch_named(
            "export_timeline_xml",
            &json!({"output_path": xml_path.to_str().unwrap(), "format_type": "fcpxml"}),
        )
        .unwrap();
    assert!(xml_path.exists());

    let report_path = dir.path().join("timecodes.json");
    let result = session
        .dispatch_named(
            "export_source_timecode_report",
            &json!({
                "export_path": report_path.to_str().unwrap(),
                "format": "json",
                "video_tracks_only": true,
            }),
        )
        .unwrap();
    assert_eq!(result["clip_count"], 2);

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["timeline_name"], "Timeline 1");
    assert_eq!(report["clips"][0]["timeline_source_in_tc"], "01:00:00:00");
}
