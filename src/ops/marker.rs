//! Timeline marker operations.
//!
//! Markers live inside the editor's timeline object; every operation here
//! reads or writes through the timeline handle and nothing is cached.

use serde_json::{json, Value};

use crate::host::{Marker, MarkerColor};

use super::{optional_str, optional_u64, require_u64, OpContext, OpError, OpResult};

fn parse_color(name: &str) -> OpResult<MarkerColor> {
    MarkerColor::parse(name).ok_or_else(|| {
        OpError::InvalidRequest(format!(
            "Invalid marker color. Valid colors are: {}",
            MarkerColor::valid_names()
        ))
    })
}

fn marker_json(marker: &Marker) -> Value {
    json!({
        "frame": marker.frame,
        "color": marker.color.name(),
        "name": marker.name,
        "note": marker.note,
        "duration": marker.duration,
        "customData": marker.custom_data,
    })
}

/// Lists all markers in the current timeline, ordered by frame.
pub fn get_timeline_markers(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require("get_markers")?;
    let timeline = cx.require_timeline()?;
    let markers: Vec<Value> = timeline.markers()?.iter().map(marker_json).collect();
    Ok(json!({ "markers": markers }))
}

/// Adds a marker at the given frame (or the playhead frame when omitted).
pub fn add_timeline_marker(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    cx.require("get_markers")?;
    let timeline = cx.require_timeline()?;

    let frame = match optional_u64(data, "frame") {
        Some(frame) => frame,
        // No frame given: fall back to the start of the timeline.
        None => timeline.start_frame()?,
    };
    let color = parse_color(optional_str(data, "color").unwrap_or("Blue"))?;
    let duration = optional_u64(data, "duration").unwrap_or(1).max(1);

    let marker = Marker {
        frame,
        color,
        name: optional_str(data, "name").unwrap_or_default().to_string(),
        note: optional_str(data, "note").unwrap_or_default().to_string(),
        duration,
        custom_data: optional_str(data, "custom_data")
            .unwrap_or_default()
            .to_string(),
    };

    if timeline.add_marker(&marker)? {
        Ok(json!({ "marker": marker_json(&marker) }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to add marker at frame {frame}"
        )))
    }
}

/// Updates fields of the marker at a frame, leaving omitted fields alone.
///
/// The editor has no in-place marker update, so this deletes the old marker
/// and re-adds it with the merged attributes; if the re-add fails the delete
/// is reported as the step that succeeded.
pub fn update_marker(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    cx.require("get_markers")?;
    let frame = require_u64(data, "frame")?;
    let timeline = cx.require_timeline()?;

    let existing = timeline
        .markers()?
        .into_iter()
        .find(|marker| marker.frame == frame)
        .ok_or_else(|| OpError::Failed(format!("No marker found at frame {frame}")))?;

    let color = match optional_str(data, "color") {
        Some(name) => parse_color(name)?,
        None => existing.color,
    };
    let merged = Marker {
        frame,
        color,
        name: optional_str(data, "name").map_or(existing.name, str::to_string),
        note: optional_str(data, "note").map_or(existing.note, str::to_string),
        duration: optional_u64(data, "duration").unwrap_or(existing.duration).max(1),
        custom_data: optional_str(data, "custom_data").map_or(existing.custom_data, str::to_string),
    };

    if !timeline.delete_marker_at_frame(frame)? {
        return Err(OpError::Failed(format!(
            "Failed to update marker at frame {frame} (could not delete old marker)"
        )));
    }
    if !timeline.add_marker(&merged)? {
        return Err(OpError::Failed(format!(
            "Failed to update marker at frame {frame} (could not add new marker)"
        )));
    }

    Ok(json!({ "marker": marker_json(&merged) }))
}

/// Deletes the marker at a frame.
pub fn delete_marker(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    cx.require("get_markers")?;
    let frame = require_u64(data, "frame")?;
    let timeline = cx.require_timeline()?;

    let exists = timeline
        .markers()?
        .iter()
        .any(|marker| marker.frame == frame);
    if !exists {
        return Err(OpError::Failed(format!("No marker found at frame {frame}")));
    }

    if timeline.delete_marker_at_frame(frame)? {
        Ok(json!({ "frame": frame }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to delete marker at frame {frame}"
        )))
    }
}

/// Deletes every marker of a colour, reporting how many were removed.
pub fn delete_markers_by_color(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    cx.require("get_markers")?;
    let color = parse_color(optional_str(data, "color").ok_or_else(|| OpError::missing("color"))?)?;
    let timeline = cx.require_timeline()?;

    let before = timeline.markers()?.len();
    if before == 0 {
        return Ok(json!({ "deleted_count": 0, "color": color.name() }));
    }

    if timeline.delete_markers_by_color(color)? {
        let after = timeline.markers()?.len();
        Ok(json!({
            "deleted_count": before - after,
            "color": color.name(),
        }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to delete markers with color {color}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::SimulatedEditor;
    use crate::ops::Session;
    use serde_json::json;

    fn demo_session() -> Session {
        Session::new(Some(SimulatedEditor::with_demo_project()), false)
    }

    #[test]
    fn marker_add_fetch_delete_round_trip() {
        let mut session = demo_session();
        session
            .dispatch_named(
                "add_timeline_marker",
                &json!({"frame": 48, "color": "Red", "name": "Fix audio", "note": "pop", "duration": 3}),
            )
            .unwrap();

        let fetched = session
            .dispatch_named("get_timeline_markers", &json!({}))
            .unwrap();
        let markers = fetched["markers"].as_array().unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0]["frame"], 48);
        assert_eq!(markers[0]["color"], "Red");
        assert_eq!(markers[0]["name"], "Fix audio");
        assert_eq!(markers[0]["duration"], 3);

        session
            .dispatch_named("delete_marker", &json!({"frame": 48}))
            .unwrap();
        let fetched = session
            .dispatch_named("get_timeline_markers", &json!({}))
            .unwrap();
        assert!(fetched["markers"].as_array().unwrap().is_empty());
    }

    #[test]
    fn markers_come_back_sorted_by_frame() {
        let mut session = demo_session();
        for frame in [90, 10, 50] {
            session
                .dispatch_named("add_timeline_marker", &json!({"frame": frame}))
                .unwrap();
        }
        let fetched = session
            .dispatch_named("get_timeline_markers", &json!({}))
            .unwrap();
        let frames: Vec<u64> = fetched["markers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["frame"].as_u64().unwrap())
            .collect();
        assert_eq!(frames, vec![10, 50, 90]);
    }

    #[test]
    fn duplicate_frame_is_rejected() {
        let mut session = demo_session();
        session
            .dispatch_named("add_timeline_marker", &json!({"frame": 12}))
            .unwrap();
        let err = session
            .dispatch_named("add_timeline_marker", &json!({"frame": 12}))
            .unwrap_err();
        assert!(err.to_string().contains("frame 12"));
    }

    #[test]
    fn invalid_color_is_rejected_with_palette() {
        let mut session = demo_session();
        let err = session
            .dispatch_named(
                "add_timeline_marker",
                &json!({"frame": 5, "color": "Taupe"}),
            )
            .unwrap_err();
        assert!(err.to_string().contains("Lavender"));
    }

    #[test]
    fn update_merges_only_given_fields() {
        let mut session = demo_session();
        session
            .dispatch_named(
                "add_timeline_marker",
                &json!({"frame": 30, "color": "Green", "name": "Scene 2", "note": "check"}),
            )
            .unwrap();
        session
            .dispatch_named("update_marker", &json!({"frame": 30, "color": "Sky"}))
            .unwrap();

        let fetched = session
            .dispatch_named("get_timeline_markers", &json!({}))
            .unwrap();
        let marker = &fetched["markers"][0];
        assert_eq!(marker["color"], "Sky");
        assert_eq!(marker["name"], "Scene 2");
        assert_eq!(marker["note"], "check");
    }

    #[test]
    fn update_missing_marker_fails() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("update_marker", &json!({"frame": 999, "color": "Red"}))
            .unwrap_err();
        assert!(err.to_string().contains("No marker found"));
    }

    #[test]
    fn delete_by_color_counts_removed_markers() {
        let mut session = demo_session();
        for (frame, color) in [(1, "Red"), (2, "Red"), (3, "Blue")] {
            session
                .dispatch_named(
                    "add_timeline_marker",
                    &json!({"frame": frame, "color": color}),
                )
                .unwrap();
        }
        let result = session
            .dispatch_named("delete_markers_by_color", &json!({"color": "red"}))
            .unwrap();
        assert_eq!(result["deleted_count"], 2);

        let fetched = session
            .dispatch_named("get_timeline_markers", &json!({}))
            .unwrap();
        assert_eq!(fetched["markers"].as_array().unwrap().len(), 1);
    }
}
