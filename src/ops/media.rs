//! Media pool operations: folder hierarchy, clip moves, smart bins, import.
//!
//! The convenience operations here each run a short fixed sequence of
//! editor calls. Bulk operations report success counts rather than failing
//! atomically; nothing is rolled back for the steps that already succeeded.

use std::path::Path;

use serde_json::{json, Value};

use crate::host::{Folder, Handle, MediaPool, MediaPoolItem};

use super::{
    optional_bool, optional_str, optional_str_list, require_str, OpContext, OpError, OpResult,
};

/// Smart bins the editor creates by default; there is no API to enumerate
/// user-created ones, so listing probes these known names.
const DEFAULT_SMART_BINS: [&str; 6] = [
    "All Clips",
    "All Video Clips",
    "All Audio Clips",
    "Timelines",
    "Favorites",
    "Recently Added",
];

/// Walks a `Master/Scenes/Scene 1` style path from the root folder,
/// optionally creating missing segments.
fn folder_by_path(
    pool: &Handle<dyn MediaPool>,
    path: &str,
    create_if_missing: bool,
) -> OpResult<Option<Handle<dyn Folder>>> {
    let root = pool.root_folder()?;

    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed == "Root" || trimmed == "Master" {
        return Ok(Some(root));
    }

    let mut current = root;
    for segment in trimmed.split('/') {
        // A leading "Master" addresses the root folder itself.
        if segment == "Master" && current.name()? == "Master" {
            continue;
        }
        let mut found = None;
        for subfolder in current.subfolders()? {
            if subfolder.name()? == segment {
                found = Some(subfolder);
                break;
            }
        }
        match found {
            Some(folder) => current = folder,
            None => {
                if !create_if_missing {
                    return Ok(None);
                }
                match pool.add_subfolder(&current, segment)? {
                    Some(folder) => current = folder,
                    None => return Ok(None),
                }
            }
        }
    }
    Ok(Some(current))
}

fn clip_json(clip: &Handle<dyn MediaPoolItem>) -> Value {
    let name = clip.name().unwrap_or_else(|_| "Unknown".to_string());
    let duration = clip.duration().unwrap_or(0);
    let mut entry = json!({ "name": name, "duration": duration });
    if let Ok(kind) = clip.clip_property("Type") {
        entry["type"] = Value::String(kind);
    }
    entry
}

fn folder_json(
    folder: &Handle<dyn Folder>,
    include_clips: bool,
    include_subfolders: bool,
    recursive: bool,
) -> OpResult<Value> {
    let name = folder.name()?;
    let mut result = json!({
        "name": name,
        "is_root": name == "Master",
    });

    if include_clips {
        let clips: Vec<Value> = folder.clips()?.iter().map(clip_json).collect();
        result["clip_count"] = json!(clips.len());
        result["clips"] = Value::Array(clips);
    }

    if include_subfolders {
        let mut subfolders = Vec::new();
        for subfolder in folder.subfolders()? {
            if recursive {
                subfolders.push(folder_json(&subfolder, include_clips, true, true)?);
            } else {
                subfolders.push(json!({ "name": subfolder.name()? }));
            }
        }
        result["subfolder_count"] = json!(subfolders.len());
        result["subfolders"] = Value::Array(subfolders);
    }

    Ok(result)
}

fn require_pool(cx: &OpContext<'_>) -> OpResult<Handle<dyn MediaPool>> {
    cx.require("get_media_pool")?;
    cx.media_pool()
}

/// Lists the clips in the media pool's root folder.
pub fn get_media_pool_items(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require("get_media_pool")?;
    cx.require("get_root_folder")?;
    cx.require("get_clip_list")?;

    let pool = cx.media_pool()?;
    let root = pool.root_folder()?;
    let items: Vec<Value> = root.clips()?.iter().map(clip_json).collect();
    Ok(json!({ "items": items }))
}

/// Returns the complete folder tree, optionally with clips.
pub fn get_folder_hierarchy(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let include_clips = optional_bool(data, "include_clips").unwrap_or(false);
    let pool = require_pool(cx)?;
    let root = pool.root_folder()?;
    let hierarchy = folder_json(&root, include_clips, true, true)?;
    Ok(json!({ "hierarchy": hierarchy }))
}

/// Looks up one folder by path.
pub fn get_folder_by_path(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let path = require_str(data, "path")?;
    let include_clips = optional_bool(data, "include_clips").unwrap_or(false);
    let include_subfolders = optional_bool(data, "include_subfolders").unwrap_or(false);

    let pool = require_pool(cx)?;
    let folder = folder_by_path(&pool, path, false)?
        .ok_or_else(|| OpError::Failed(format!("Folder not found: {path}")))?;
    let folder = folder_json(&folder, include_clips, include_subfolders, false)?;
    Ok(json!({ "folder": folder }))
}

/// Creates a folder path segment by segment, creating what is missing.
pub fn create_folder_path(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let path = require_str(data, "path")?;
    let pool = require_pool(cx)?;
    let folder = folder_by_path(&pool, path, true)?
        .ok_or_else(|| OpError::Failed(format!("Failed to create folder path: {path}")))?;
    let folder = folder_json(&folder, false, false, false)?;
    Ok(json!({
        "message": format!("Created folder path: {path}"),
        "folder": folder,
    }))
}

/// Makes a folder the media pool's current folder.
pub fn set_current_folder(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let path = require_str(data, "path")?;
    let pool = require_pool(cx)?;
    let folder = folder_by_path(&pool, path, false)?
        .ok_or_else(|| OpError::Failed(format!("Folder not found: {path}")))?;
    if pool.set_current_folder(&folder)? {
        Ok(json!({ "message": format!("Current folder set to: {path}") }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to set current folder to: {path}"
        )))
    }
}

/// Describes the media pool's current folder with clips and subfolders.
pub fn get_current_folder(cx: &OpContext<'_>) -> OpResult<Value> {
    let pool = require_pool(cx)?;
    let folder = pool
        .current_folder()?
        .ok_or_else(|| OpError::Failed("Could not get current folder".to_string()))?;
    let folder = folder_json(&folder, true, true, false)?;
    Ok(json!({ "folder": folder }))
}

/// Moves clips between folders, one at a time, and reports verified counts.
///
/// Each clip is moved individually so one refusal does not abort the rest;
/// the reported count comes from re-reading the destination folder, so a
/// clip is never counted as moved unless it is actually there.
pub fn move_clips_between_folders(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let source_path = require_str(data, "source_path")?;
    let destination_path = require_str(data, "destination_path")?;
    let clip_names = optional_str_list(data, "clip_names");

    let pool = require_pool(cx)?;
    let source = folder_by_path(&pool, source_path, false)?
        .ok_or_else(|| OpError::Failed(format!("Source folder not found: {source_path}")))?;
    let destination = folder_by_path(&pool, destination_path, false)?.ok_or_else(|| {
        OpError::Failed(format!("Destination folder not found: {destination_path}"))
    })?;

    let all_clips = source.clips()?;
    if all_clips.is_empty() {
        return Err(OpError::Failed(format!(
            "No clips found in source folder: {source_path}"
        )));
    }

    let to_move: Vec<Handle<dyn MediaPoolItem>> = match &clip_names {
        Some(names) => all_clips
            .into_iter()
            .filter(|clip| clip.name().is_ok_and(|name| names.contains(&name)))
            .collect(),
        None => all_clips,
    };
    if to_move.is_empty() {
        return Err(OpError::Failed(
            "None of the specified clips found in source folder".to_string(),
        ));
    }

    let requested = to_move.len();
    let mut moved_names = Vec::new();
    for clip in &to_move {
        let name = clip.name().unwrap_or_default();
        match pool.move_clips(std::slice::from_ref(clip), &destination) {
            Ok(true) => moved_names.push(name),
            Ok(false) => tracing::warn!(clip = %name, "editor refused to move clip"),
            Err(error) => tracing::error!(clip = %name, %error, "error moving clip"),
        }
    }

    // Verify against the destination; only clips actually present count.
    let dest_names: Vec<String> = destination
        .clips()?
        .iter()
        .filter_map(|clip| clip.name().ok())
        .collect();
    let moved = moved_names
        .iter()
        .filter(|name| dest_names.contains(name))
        .count();

    Ok(json!({
        "requested": requested,
        "moved": moved,
        "message": format!(
            "Moved {moved} of {requested} clips from {source_path} to {destination_path}"
        ),
    }))
}

/// Creates a smart bin from a criteria map.
pub fn create_smart_bin(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let name = require_str(data, "name")?;
    let criteria = data
        .get("search_criteria")
        .and_then(Value::as_object)
        .ok_or_else(|| OpError::missing("search_criteria"))?;

    // The editor takes criteria as a "Key:value" query string.
    let query = criteria
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{key}:{value}")
        })
        .collect::<Vec<_>>()
        .join(" ");

    let pool = require_pool(cx)?;
    if pool.create_smart_bin(name, &query)? {
        Ok(json!({
            "message": format!("Created smart bin: {name}"),
            "search_criteria": criteria,
        }))
    } else {
        Err(OpError::Failed(format!("Failed to create smart bin: {name}")))
    }
}

/// Lists the default smart bins that respond to a name lookup.
pub fn get_smart_bins(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require("get_folder_by_name")?;
    let pool = require_pool(cx)?;

    let mut smart_bins = Vec::new();
    for bin_name in DEFAULT_SMART_BINS {
        if let Some(bin) = pool.folder_by_name(bin_name)? {
            let clip_count = bin.clips().map(|clips| clips.len()).unwrap_or(0);
            smart_bins.push(json!({
                "name": bin_name,
                "is_default": true,
                "clip_count": clip_count,
            }));
        }
    }

    Ok(json!({ "smart_bins": smart_bins }))
}

/// Deletes a smart bin by name.
pub fn delete_smart_bin(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let name = require_str(data, "name")?;
    cx.require("get_folder_by_name")?;
    let pool = require_pool(cx)?;

    if pool.folder_by_name(name)?.is_none() {
        return Err(OpError::Failed(format!("Smart bin not found: {name}")));
    }

    if pool.delete_smart_bin(name)? {
        Ok(json!({ "message": format!("Deleted smart bin: {name}") }))
    } else {
        Err(OpError::Failed(format!("Failed to delete smart bin: {name}")))
    }
}

/// Sets a clip property across a folder, reporting the success count.
pub fn bulk_set_clip_property(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let folder_path = require_str(data, "folder_path")?;
    let property_name = require_str(data, "property_name")?;
    let property_value = require_str(data, "property_value")?;
    let clip_names = optional_str_list(data, "clip_names");

    let pool = require_pool(cx)?;
    let folder = folder_by_path(&pool, folder_path, false)?
        .ok_or_else(|| OpError::Failed(format!("Folder not found: {folder_path}")))?;

    let all_clips = folder.clips()?;
    if all_clips.is_empty() {
        return Err(OpError::Failed(format!(
            "No clips found in folder: {folder_path}"
        )));
    }

    let targets: Vec<Handle<dyn MediaPoolItem>> = match &clip_names {
        Some(names) => all_clips
            .into_iter()
            .filter(|clip| clip.name().is_ok_and(|name| names.contains(&name)))
            .collect(),
        None => all_clips,
    };
    if targets.is_empty() {
        return Err(OpError::Failed(
            "None of the specified clips found in folder".to_string(),
        ));
    }

    let mut success_count = 0usize;
    for clip in &targets {
        // Some properties are read-only; keep going past refusals.
        match clip.set_clip_property(property_name, property_value) {
            Ok(true) => success_count += 1,
            Ok(false) => {}
            Err(error) => tracing::debug!(%error, "clip property not settable"),
        }
    }

    if success_count == 0 {
        return Err(OpError::Failed(format!(
            "Failed to set property {property_name} on any clips"
        )));
    }

    Ok(json!({
        "updated": success_count,
        "requested": targets.len(),
        "message": format!(
            "Set {property_name} to '{property_value}' on {success_count} of {} clips",
            targets.len()
        ),
    }))
}

/// Imports media files into a folder (or the current folder).
pub fn import_files_to_folder(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let file_paths = optional_str_list(data, "file_paths")
        .ok_or_else(|| OpError::missing("file_paths"))?;

    let pool = require_pool(cx)?;
    if let Some(folder_path) = optional_str(data, "folder_path") {
        let folder = folder_by_path(&pool, folder_path, false)?.ok_or_else(|| {
            OpError::Failed(format!("Destination folder not found: {folder_path}"))
        })?;
        pool.set_current_folder(&folder)?;
    }

    let valid: Vec<&Path> = file_paths
        .iter()
        .map(Path::new)
        .filter(|path| path.exists())
        .collect();
    if valid.is_empty() {
        return Err(OpError::Failed(
            "None of the specified files exist".to_string(),
        ));
    }

    let imported = pool.import_media(&valid)?;
    if imported.is_empty() {
        return Err(OpError::Failed("Failed to import files".to_string()));
    }

    let names: Vec<String> = imported
        .iter()
        .filter_map(|clip| clip.name().ok())
        .collect();
    Ok(json!({
        "imported_clip_count": imported.len(),
        "imported_clip_names": names,
        "message": format!("Imported {} of {} files", imported.len(), file_paths.len()),
    }))
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
    fn media_pool_items_lists_root_clips() {
        let mut session = demo_session();
        let result = session
            .dispatch_named("get_media_pool_items", &json!({}))
            .unwrap();
        let items = result["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "Interview A");
    }

    #[test]
    fn folder_hierarchy_is_recursive() {
        let mut session = demo_session();
        let result = session
            .dispatch_named("get_folder_hierarchy", &json!({"include_clips": true}))
            .unwrap();
        let hierarchy = &result["hierarchy"];
        assert_eq!(hierarchy["name"], "Master");
        assert_eq!(hierarchy["is_root"], true);
        assert_eq!(hierarchy["subfolders"][0]["name"], "Aerials");
        assert_eq!(hierarchy["subfolders"][0]["clip_count"], 1);
    }

    #[test]
    fn create_folder_path_builds_missing_segments() {
        let mut session = demo_session();
        session
            .dispatch_named(
                "create_folder_path",
                &json!({"path": "Scenes/Scene 1/Takes"}),
            )
            .unwrap();
        let result = session
            .dispatch_named(
                "get_folder_by_path",
                &json!({"path": "Scenes/Scene 1/Takes"}),
            )
            .unwrap();
        assert_eq!(result["folder"]["name"], "Takes");
    }

    #[test]
    fn folder_lookup_missing_path_fails() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("get_folder_by_path", &json!({"path": "Nowhere/At All"}))
            .unwrap_err();
        assert!(err.to_string().contains("Folder not found"));
    }

    #[test]
    fn move_clips_reports_verified_count() {
        let mut session = demo_session();
        let result = session
            .dispatch_named(
                "move_clips_between_folders",
                &json!({
                    "source_path": "Master",
                    "destination_path": "Aerials",
                    "clip_names": ["Interview A"],
                }),
            )
            .unwrap();
        assert_eq!(result["moved"], 1);
        assert_eq!(result["requested"], 1);

        let dest = session
            .dispatch_named(
                "get_folder_by_path",
                &json!({"path": "Aerials", "include_clips": true}),
            )
            .unwrap();
        assert_eq!(dest["folder"]["clip_count"], 2);
    }

    #[test]
    fn move_clips_missing_names_fails() {
        let mut session = demo_session();
        let err = session
            .dispatch_named(
                "move_clips_between_folders",
                &json!({
                    "source_path": "Master",
                    "destination_path": "Aerials",
                    "clip_names": ["Ghost Clip"],
                }),
            )
            .unwrap_err();
        assert!(err.to_string().contains("None of the specified clips"));
    }

    #[test]
    fn current_folder_round_trip() {
        let mut session = demo_session();
        session
            .dispatch_named("set_current_folder", &json!({"path": "Aerials"}))
            .unwrap();
        let result = session
            .dispatch_named("get_current_folder", &json!({}))
            .unwrap();
        assert_eq!(result["folder"]["name"], "Aerials");
    }

    #[test]
    fn smart_bin_create_list_delete() {
        let mut session = demo_session();
        session
            .dispatch_named(
                "create_smart_bin",
                &json!({
                    "name": "Interviews",
                    "search_criteria": {"Keywords": "interview", "Clip Type": "video"},
                }),
            )
            .unwrap();

        let bins = session.dispatch_named("get_smart_bins", &json!({})).unwrap();
        let names: Vec<&str> = bins["smart_bins"]
            .as_array()
            .unwrap()
            .iter()
            .map(|bin| bin["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"All Clips"));

        session
            .dispatch_named("delete_smart_bin", &json!({"name": "Interviews"}))
            .unwrap();
        let err = session
            .dispatch_named("delete_smart_bin", &json!({"name": "Interviews"}))
            .unwrap_err();
        assert!(err.to_string().contains("Smart bin not found"));
    }

    #[test]
    fn bulk_property_set_counts_successes() {
        let mut session = demo_session();
        let result = session
            .dispatch_named(
                "bulk_set_clip_property",
                &json!({
                    "folder_path": "Master",
                    "property_name": "Keyword",
                    "property_value": "day-1",
                }),
            )
            .unwrap();
        assert_eq!(result["updated"], 2);
        assert_eq!(result["requested"], 2);
    }

    #[test]
    fn import_files_skips_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("take_07.mov");
        std::fs::write(&real, b"stub").unwrap();
        let missing = dir.path().join("gone.mov");

        let mut session = demo_session();
        let result = session
            .dispatch_named(
                "import_files_to_folder",
                &json!({
                    "file_paths": [real.to_str().unwrap(), missing.to_str().unwrap()],
                    "folder_path": "Aerials",
                }),
            )
            .unwrap();
        assert_eq!(result["imported_clip_count"], 1);
        assert_eq!(result["imported_clip_names"][0], "take_07");
    }

    #[test]
    fn import_with_no_existing_files_fails() {
        let mut session = demo_session();
        let err = session
            .dispatch_named(
                "import_files_to_folder",
                &json!({"file_paths": ["/no/such/file.mov"]}),
            )
            .unwrap_err();
        assert!(err.to_string().contains("None of the specified files"));
    }
}
