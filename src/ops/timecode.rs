//! Source-timecode operations and `HH:MM:SS:FF` conversion helpers.
//!
//! All conversions are non-drop-frame: fractional rates are truncated to
//! their integer frame count, matching how the editor labels NDF timelines.

use std::path::Path;

use serde_json::{json, Value};

use crate::host::{Handle, TimelineItem, TrackKind};

use super::{optional_bool, optional_u64, require_str, OpContext, OpError, OpResult};

/// Converts an `HH:MM:SS:FF` timecode to a frame count.
///
/// Malformed timecodes convert to 0, mirroring the editor's own lenient
/// handling of missing source metadata.
#[must_use]
pub fn timecode_to_frames(timecode: &str, fps: f64) -> u64 {
    let parts: Vec<&str> = timecode.split(':').collect();
    if parts.len() != 4 {
        return 0;
    }
    let mut values = [0u64; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        match part.parse() {
            Ok(value) => *slot = value,
            Err(_) => return 0,
        }
    }
    let [hours, minutes, seconds, frames] = values;
    let int_fps = fps as u64;
    (hours * 3600 + minutes * 60 + seconds) * int_fps + frames
}

/// Converts a frame count to an `HH:MM:SS:FF` timecode.
#[must_use]
pub fn frames_to_timecode(frame_count: u64, fps: f64) -> String {
    let int_fps = (fps as u64).max(1);
    let total_seconds = frame_count / int_fps;
    let frames = frame_count % int_fps;
    format!(
        "{:02}:{:02}:{:02}:{:02}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
        frames
    )
}

/// Offsets a starting timecode by a frame count.
#[must_use]
pub fn offset_timecode(start_tc: &str, offset_frames: u64, fps: f64) -> String {
    frames_to_timecode(timecode_to_frames(start_tc, fps) + offset_frames, fps)
}

/// Source-timecode details of one timeline clip.
fn clip_timecode_json(
    item: &Handle<dyn TimelineItem>,
    kind: TrackKind,
    track_index: usize,
    clip_index: usize,
) -> Value {
    let mut info = json!({
        "name": item.name().unwrap_or_else(|_| "Unknown".to_string()),
        "duration": item.duration().unwrap_or(0),
        "track": format!("{}{track_index}", kind.as_str()[..1].to_uppercase()),
        "track_type": kind.as_str(),
        "track_index": track_index,
        "clip_index": clip_index,
    });

    if let Ok(start) = item.start() {
        info["start_frame"] = json!(start);
    }
    if let Ok(end) = item.end() {
        info["end_frame"] = json!(end);
    }

    match item.media_pool_item() {
        Ok(Some(media)) => {
            info["media_pool_item"] = json!(true);
            let start_tc = media.clip_property("Start TC").unwrap_or_default();
            let fps = media
                .clip_property("FPS")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(24.0);
            let source_in = item.left_offset().unwrap_or(0);
            let source_out = source_in + item.duration().unwrap_or(0);

            info["source_start_tc"] = json!(start_tc);
            info["source_end_tc"] = json!(media.clip_property("End TC").unwrap_or_default());
            info["fps"] = json!(fps);
            info["source_in"] = json!(source_in);
            info["source_out"] = json!(source_out);
            if !start_tc.is_empty() {
                info["timeline_source_in_tc"] = json!(offset_timecode(&start_tc, source_in, fps));
                info["timeline_source_out_tc"] = json!(offset_timecode(&start_tc, source_out, fps));
            }
            if let Ok(path) = media.clip_property("File Path") {
                if !path.is_empty() {
                    info["file_path"] = json!(path);
                }
            }
        }
        Ok(None) => {
            info["media_pool_item"] = json!(false);
        }
        Err(error) => {
            info["media_pool_error"] = json!(error.to_string());
        }
    }

    info
}

/// Detailed source timecode for one clip addressed by track and index.
pub fn get_clip_source_timecode(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let kind_name = data
        .get("track_type")
        .and_then(Value::as_str)
        .unwrap_or("video");
    let kind = TrackKind::parse(kind_name).ok_or_else(|| {
        OpError::InvalidRequest("Track type must be 'video' or 'audio'".to_string())
    })?;
    let track_index = optional_u64(data, "track_index").unwrap_or(1) as usize;
    let clip_index = optional_u64(data, "clip_index").unwrap_or(0) as usize;

    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    let timeline = cx.require_timeline()?;

    let track_count = timeline.track_count(kind)?;
    if track_index < 1 || track_index > track_count {
        return Err(OpError::InvalidRequest(format!(
            "Track index must be between 1 and {track_count}"
        )));
    }

    let items = timeline.items_in_track(kind, track_index)?;
    let Some(item) = items.get(clip_index) else {
        return Err(OpError::Failed(format!(
            "Clip index {clip_index} not found in {} track {track_index}",
            kind.as_str()
        )));
    };

    Ok(clip_timecode_json(item, kind, track_index, clip_index))
}

/// Collects source-timecode details for every clip in the timeline.
pub fn get_source_timecode_report(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require_any(&["get_current_timeline", "get_timeline_by_index"])?;
    let timeline = cx.require_timeline()?;

    let mut clips = Vec::new();
    for kind in [TrackKind::Video, TrackKind::Audio] {
        let track_count = timeline.track_count(kind)?;
        for track_index in 1..=track_count {
            for (clip_index, item) in timeline.items_in_track(kind, track_index)?.iter().enumerate()
            {
                clips.push(clip_timecode_json(item, kind, track_index, clip_index));
            }
        }
    }

    Ok(json!({
        "timeline_name": timeline.name()?,
        "clips": clips,
    }))
}

/// Writes the source-timecode report to disk as CSV or JSON.
pub fn export_source_timecode_report(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let export_path = require_str(data, "export_path")?;
    let format = data
        .get("format")
        .and_then(Value::as_str)
        .unwrap_or("csv")
        .to_lowercase();
    let video_tracks_only = optional_bool(data, "video_tracks_only").unwrap_or(false);

    let mut report = get_source_timecode_report(cx)?;
    if video_tracks_only {
        if let Some(clips) = report["clips"].as_array() {
            let filtered: Vec<Value> = clips
                .iter()
                .filter(|clip| clip["track_type"] == "video")
                .cloned()
                .collect();
            report["clips"] = Value::Array(filtered);
        }
    }
    report["generated_at"] = json!(chrono::Local::now().to_rfc3339());

    let path = Path::new(export_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OpError::Failed(format!("Could not create {}: {e}", parent.display()))
            })?;
        }
    }

    let clip_count = report["clips"].as_array().map_or(0, Vec::len);
    match format.as_str() {
        "csv" => write_csv_report(path, &report)?,
        "json" => {
            let text = serde_json::to_string_pretty(&report)
                .map_err(|e| OpError::Failed(format!("Could not serialise report: {e}")))?;
            std::fs::write(path, text)
                .map_err(|e| OpError::Failed(format!("Could not write report: {e}")))?;
        }
        other => {
            return Err(OpError::InvalidRequest(format!(
                "Unsupported report format: {other}. Use 'csv' or 'json'"
            )))
        }
    }

    Ok(json!({
        "export_path": export_path,
        "format": format,
        "clip_count": clip_count,
    }))
}

fn write_csv_report(path: &Path, report: &Value) -> OpResult<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| OpError::Failed(format!("Could not write report: {e}")))?;
    writer
        .write_record([
            "Name",
            "Track",
            "Timeline Start",
            "Timeline End",
            "Duration",
            "Source In TC",
            "Source Out TC",
            "File Path",
        ])
        .map_err(|e| OpError::Failed(format!("Could not write report: {e}")))?;

    let text = |clip: &Value, key: &str| -> String {
        match &clip[key] {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    };

    if let Some(clips) = report["clips"].as_array() {
        for clip in clips {
            writer
                .write_record([
                    text(clip, "name"),
                    text(clip, "track"),
                    text(clip, "start_frame"),
                    text(clip, "end_frame"),
                    text(clip, "duration"),
                    text(clip, "timeline_source_in_tc"),
                    text(clip, "timeline_source_out_tc"),
                    text(clip, "file_path"),
                ])
                .map_err(|e| OpError::Failed(format!("Could not write report: {e}")))?;
        }
    }

    writer
        .flush()
        .map_err(|e| OpError::Failed(format!("Could not write report: {e}")))?;
    Ok(())
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
    fn timecode_conversion_round_trips() {
        for frames in [0, 1, 23, 24, 86_399, 123_456] {
            let tc = frames_to_timecode(frames, 24.0);
            assert_eq!(timecode_to_frames(&tc, 24.0), frames, "tc was {tc}");
        }
    }

    #[test]
    fn timecode_formats_as_expected() {
        assert_eq!(frames_to_timecode(0, 24.0), "00:00:00:00");
        assert_eq!(frames_to_timecode(24, 24.0), "00:00:01:00");
        assert_eq!(frames_to_timecode(25, 25.0), "00:00:01:00");
        assert_eq!(frames_to_timecode(3661 * 24 + 5, 24.0), "01:01:01:05");
    }

    #[test]
    fn malformed_timecode_converts_to_zero() {
        assert_eq!(timecode_to_frames("garbage", 24.0), 0);
        assert_eq!(timecode_to_frames("01:02:03", 24.0), 0);
        assert_eq!(timecode_to_frames("aa:bb:cc:dd", 24.0), 0);
    }

    #[test]
    fn offset_adds_frames() {
        assert_eq!(offset_timecode("01:00:00:00", 48, 24.0), "01:00:02:00");
    }

    #[test]
    fn clip_source_timecode_resolves_media_link() {
        let mut session = demo_session();
        let info = session
            .dispatch_named(
                "get_clip_source_timecode",
                &json!({"track_type": "video", "track_index": 1, "clip_index": 0}),
            )
            .unwrap();
        assert_eq!(info["name"], "Interview A");
        assert_eq!(info["media_pool_item"], true);
        assert_eq!(info["source_start_tc"], "01:00:00:00");
        assert_eq!(info["timeline_source_in_tc"], "01:00:00:00");
        assert_eq!(info["timeline_source_out_tc"], "01:00:05:00");
    }

    #[test]
    fn out_of_range_track_is_rejected() {
        let mut session = demo_session();
        let err = session
            .dispatch_named(
                "get_clip_source_timecode",
                &json!({"track_type": "video", "track_index": 9}),
            )
            .unwrap_err();
        assert!(err.to_string().contains("between 1 and"));
    }

    #[test]
    fn report_covers_all_clips() {
        let mut session = demo_session();
        let report = session
            .dispatch_named("get_source_timecode_report", &json!({}))
            .unwrap();
        assert_eq!(report["timeline_name"], "Timeline 1");
        assert_eq!(report["clips"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let mut session = demo_session();
        let result = session
            .dispatch_named(
                "export_source_timecode_report",
                &json!({"export_path": path.to_str().unwrap(), "format": "csv"}),
            )
            .unwrap();
        assert_eq!(result["clip_count"], 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert!(lines.next().unwrap().starts_with("Name,Track"));
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn unknown_report_format_is_rejected() {
        let mut session = demo_session();
        let err = session
            .dispatch_named(
                "export_source_timecode_report",
                &json!({"export_path": "/tmp/report.xyz", "format": "edl"}),
            )
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidRequest(_)));
    }
}
