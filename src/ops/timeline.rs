//! Timeline operations: info, clips, selection, export, playback.

use std::path::PathBuf;

use serde_json::{json, Value};

use crate::host::{ExportFormat, Handle, Timeline, TimelineItem, TrackKind};

use super::{optional_str, require_str, OpContext, OpError, OpResult};

/// Playback commands accepted by `control_playback`.
const PLAYBACK_COMMANDS: [&str; 12] = [
    "play",
    "stop",
    "pause",
    "forward",
    "reverse",
    "next_frame",
    "prev_frame",
    "next_clip",
    "prev_clip",
    "to_in",
    "to_out",
    "toggle_play",
];

/// Collects every item across all tracks of a kind, in track order.
pub(crate) fn items_across_tracks(
    timeline: &Handle<dyn Timeline>,
    kind: TrackKind,
) -> OpResult<Vec<Handle<dyn TimelineItem>>> {
    let mut all = Vec::new();
    let track_count = timeline.track_count(kind)?;
    for track in 1..=track_count {
        match timeline.items_in_track(kind, track) {
            Ok(items) => all.extend(items),
            Err(error) => {
                tracing::error!(%error, track, "error getting items from track");
            }
        }
    }
    Ok(all)
}

/// Summarises the current timeline.
pub fn get_timeline_info(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    let timeline = cx.require_timeline()?;
    let name = timeline.name()?;
    let video_track_count = timeline.track_count(TrackKind::Video).unwrap_or(0);
    let audio_track_count = timeline.track_count(TrackKind::Audio).unwrap_or(0);
    let item_count = items_across_tracks(&timeline, TrackKind::Video)
        .map(|items| items.len())
        .unwrap_or(0);

    Ok(json!({
        "name": name,
        "video_track_count": video_track_count,
        "audio_track_count": audio_track_count,
        "item_count": item_count,
    }))
}

/// Lists the clips on the current timeline's video tracks.
pub fn get_timeline_clips(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    let timeline = cx.require_timeline()?;
    let mut clips = Vec::new();
    for item in items_across_tracks(&timeline, TrackKind::Video)? {
        let name = item.name().unwrap_or_else(|_| "Unknown".to_string());
        let duration = item.duration().unwrap_or(0);
        clips.push(json!({ "name": name, "duration": duration }));
    }
    Ok(json!({ "clips": clips }))
}

/// Appends a media pool clip to the end of the current timeline.
pub fn add_clip_to_timeline(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let clip_name = require_str(data, "clip_name")?;
    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    cx.require("get_root_folder")?;

    // The timeline must exist before the append is attempted.
    let _timeline = cx.require_timeline()?;

    let pool = cx.media_pool()?;
    let root = pool.root_folder()?;
    let target = root
        .clips()?
        .into_iter()
        .find(|clip| clip.name().is_ok_and(|name| name == clip_name));

    let Some(target) = target else {
        return Err(OpError::Failed(format!("Clip not found: {clip_name}")));
    };

    if pool.append_to_timeline(&[target])? {
        Ok(json!({ "success": true, "clip_name": clip_name }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to append '{clip_name}' to the timeline"
        )))
    }
}

/// Selects timeline clips whose names contain the given text.
///
/// Selection is attempted with the timeline selection API first and falls
/// back to flagging each clip individually; the response reports how many
/// clips matched and how many were selected.
pub fn select_clips_by_name(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let clip_name = require_str(data, "clip_name")?;
    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    let timeline = cx.require_timeline()?;

    let items = items_across_tracks(&timeline, TrackKind::Video)?;
    if items.is_empty() {
        return Err(OpError::Failed("No clips found in timeline".to_string()));
    }

    let needle = clip_name.to_lowercase();
    let matching: Vec<Handle<dyn TimelineItem>> = items
        .into_iter()
        .filter(|item| {
            item.name()
                .is_ok_and(|name| name.to_lowercase().contains(&needle))
        })
        .collect();

    if matching.is_empty() {
        return Err(OpError::Failed(format!(
            "No clips found matching '{clip_name}'"
        )));
    }

    let selected = match timeline.set_selection(&matching) {
        Ok(true) => true,
        Ok(false) | Err(_) => {
            tracing::warn!("timeline selection API failed, falling back to flags");
            let mut flagged = 0usize;
            for item in &matching {
                if item.add_flag("Selected").unwrap_or(false) {
                    flagged += 1;
                }
            }
            flagged == matching.len()
        }
    };

    Ok(json!({
        "success": selected,
        "items_found": matching.len(),
        "items_selected": if selected { matching.len() } else { 0 },
    }))
}

/// Exports the current timeline as XML/EDL/AAF/FCPXML.
pub fn export_timeline_xml(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let format_name = optional_str(data, "format_type").unwrap_or("xml");
    let format = ExportFormat::parse(format_name).ok_or_else(|| {
        OpError::InvalidRequest(format!(
            "Unsupported format: {format_name}. Use 'xml', 'edl', 'aaf', or 'fcpxml'"
        ))
    })?;

    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    let timeline = cx.require_timeline()?;
    let timeline_name = timeline.name()?;

    let output_path = match optional_str(data, "output_path") {
        Some(path) => PathBuf::from(path),
        None => {
            let home = dirs::home_dir().ok_or_else(|| {
                OpError::Failed("Could not determine home directory for default export path".to_string())
            })?;
            home.join("resolve-mcp")
                .join("exports")
                .join(format!("{timeline_name}.{}", format.extension()))
        }
    };

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            OpError::Failed(format!(
                "Could not create export directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    if timeline.export(&output_path, format)? {
        Ok(json!({
            "timeline": timeline_name,
            "output_path": output_path.to_string_lossy(),
            "format": format.as_str(),
        }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to export timeline as {format_name}"
        )))
    }
}

/// Reports the playhead position as a timecode plus the frame of the clip
/// under it.
pub fn get_playhead_position(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    let timeline = cx.require_timeline()?;
    let timecode = timeline.current_timecode()?;
    let frame_position = timeline
        .current_video_item()?
        .and_then(|item| item.start().ok());
    Ok(json!({
        "timecode": timecode,
        "frame_position": frame_position,
    }))
}

/// Acknowledges a playback transport command.
///
/// The scripting API exposes no real transport control, so valid commands
/// are acknowledged without effect, exactly as the editor's own scripting
/// console behaves.
pub fn control_playback(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let command = optional_str(data, "command").unwrap_or("play");
    if !PLAYBACK_COMMANDS.contains(&command) {
        return Err(OpError::InvalidRequest(format!(
            "Unknown playback command: {command}"
        )));
    }
    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    let _timeline = cx.require_timeline()?;
    Ok(json!({
        "command": command,
        "message": format!("Playback command '{command}' acknowledged"),
    }))
}

/// Reads one timeline setting, or all requested settings fall back to the
/// project defaults when unset.
pub fn get_timeline_setting(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    let key = require_str(data, "setting_name")?;
    let timeline = cx.require_timeline()?;
    let value = timeline.setting(key)?;
    Ok(json!({ "setting": key, "value": value }))
}

/// Writes one timeline setting.
pub fn set_timeline_setting(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    let key = require_str(data, "setting_name")?;
    let value = require_str(data, "setting_value")?;
    let timeline = cx.require_timeline()?;
    if timeline.set_setting(key, value)? {
        Ok(json!({ "setting": key, "value": value, "success": true }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to set timeline setting '{key}'"
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
    fn timeline_info_counts_demo_clips() {
        let mut session = demo_session();
        let info = session
            .dispatch_named("get_timeline_info", &json!({}))
            .unwrap();
        assert_eq!(info["name"], "Timeline 1");
        assert_eq!(info["item_count"], 2);
        assert_eq!(info["video_track_count"], 2);
    }

    #[test]
    fn timeline_clips_include_durations() {
        let mut session = demo_session();
        let result = session
            .dispatch_named("get_timeline_clips", &json!({}))
            .unwrap();
        let clips = result["clips"].as_array().unwrap();
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0]["name"], "Interview A");
        assert_eq!(clips[0]["duration"], 120);
    }

    #[test]
    fn add_clip_appends_to_timeline() {
        let mut session = demo_session();
        session
            .dispatch_named("add_clip_to_timeline", &json!({"clip_name": "B-Roll 01"}))
            .unwrap();
        let result = session
            .dispatch_named("get_timeline_clips", &json!({}))
            .unwrap();
        assert_eq!(result["clips"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn add_clip_unknown_name_fails() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("add_clip_to_timeline", &json!({"clip_name": "Nope"}))
            .unwrap_err();
        assert!(err.to_string().contains("Clip not found"));
    }

    #[test]
    fn select_clips_matches_case_insensitively() {
        let mut session = demo_session();
        let result = session
            .dispatch_named("select_clips_by_name", &json!({"clip_name": "interview"}))
            .unwrap();
        assert_eq!(result["items_found"], 1);
        assert_eq!(result["items_selected"], 1);
        assert_eq!(result["success"], true);
    }

    #[test]
    fn select_clips_no_match_is_failure() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("select_clips_by_name", &json!({"clip_name": "zzz"}))
            .unwrap_err();
        assert!(err.to_string().contains("No clips found matching"));
    }

    #[test]
    fn export_writes_edl_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.edl");
        let mut session = demo_session();
        let result = session
            .dispatch_named(
                "export_timeline_xml",
                &json!({"output_path": path.to_str().unwrap(), "format_type": "edl"}),
            )
            .unwrap();
        assert_eq!(result["format"], "edl");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("TITLE: Timeline 1"));
    }

    #[test]
    fn export_rejects_unknown_format() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("export_timeline_xml", &json!({"format_type": "mov"}))
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidRequest(_)));
    }

    #[test]
    fn playback_command_is_validated() {
        let mut session = demo_session();
        let ok = session
            .dispatch_named("control_playback", &json!({"command": "to_in"}))
            .unwrap();
        assert_eq!(ok["command"], "to_in");
        let err = session
            .dispatch_named("control_playback", &json!({"command": "rewind_fast"}))
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidRequest(_)));
    }

    #[test]
    fn timeline_setting_inherits_project_default() {
        let mut session = demo_session();
        let result = session
            .dispatch_named(
                "get_timeline_setting",
                &json!({"setting_name": "timelineFrameRate"}),
            )
            .unwrap();
        assert_eq!(result["value"], "24");
        session
            .dispatch_named(
                "set_timeline_setting",
                &json!({"setting_name": "timelineFrameRate", "setting_value": "30"}),
            )
            .unwrap();
        let result = session
            .dispatch_named(
                "get_timeline_setting",
                &json!({"setting_name": "timelineFrameRate"}),
            )
            .unwrap();
        assert_eq!(result["value"], "30");
    }
}
