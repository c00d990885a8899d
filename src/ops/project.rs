//! Project operations: listing, info, creation, opening, settings.

use serde_json::{json, Value};

use super::{optional_str, require_str, OpContext, OpError, OpResult};

/// Lists the projects in the editor's current database folder.
pub fn get_projects(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require("get_project_list")?;
    let manager = cx.project_manager()?;
    let projects = manager.project_list()?;
    Ok(json!({ "projects": projects }))
}

/// Summarises the open project: timelines, current timeline, media count.
///
/// Each optional section is attempted only when the capability map says the
/// accessor works; a section that still fails is logged and left at its
/// default rather than failing the whole operation.
pub fn get_project_info(cx: &OpContext<'_>) -> OpResult<Value> {
    let project = cx.require_project()?;
    let name = project.name()?;

    let mut timelines: Vec<String> = Vec::new();
    let mut current_timeline: Option<String> = None;
    let mut media_pool_item_count = 0usize;

    if cx.caps.supports("get_timeline_names") {
        match project.timeline_names() {
            Ok(names) => timelines = names,
            Err(error) => tracing::error!(%error, "error getting timeline list"),
        }
    }

    if cx.caps.supports("get_current_timeline") {
        match project.current_timeline() {
            Ok(Some(timeline)) => current_timeline = timeline.name().ok(),
            Ok(None) => {}
            Err(error) => tracing::error!(%error, "error getting current timeline"),
        }
    }

    // Fall back to the index accessor when the name list came back empty.
    if timelines.is_empty() && cx.caps.supports("get_timeline_by_index") {
        match project.timeline_by_index(0) {
            Ok(Some(timeline)) => {
                if let Ok(name) = timeline.name() {
                    if current_timeline.is_none() {
                        current_timeline = Some(name.clone());
                    }
                    timelines.push(name);
                }
            }
            Ok(None) => {}
            Err(error) => tracing::error!(%error, "error getting timeline by index"),
        }
    }

    if cx.caps.supports("get_media_pool")
        && cx.caps.supports("get_root_folder")
        && cx.caps.supports("get_clip_list")
    {
        match project.media_pool().and_then(|pool| {
            let root = pool.root_folder()?;
            root.clips()
        }) {
            Ok(clips) => media_pool_item_count = clips.len(),
            Err(error) => tracing::error!(%error, "error counting media pool items"),
        }
    }

    let mut info = json!({
        "name": name,
        "timelines": timelines,
        "current_timeline": current_timeline,
        "media_pool_item_count": media_pool_item_count,
    });

    // Frame rate and resolution are best-effort extras.
    if cx.caps.supports("get_current_project") {
        if let Ok(fps) = project.setting("timelineFrameRate") {
            if !fps.is_empty() {
                info["fps"] = Value::String(fps);
            }
        }
        let width = project.setting("timelineResolutionWidth").unwrap_or_default();
        let height = project
            .setting("timelineResolutionHeight")
            .unwrap_or_default();
        if !width.is_empty() || !height.is_empty() {
            info["resolution"] = json!({ "width": width, "height": height });
        }
    }

    Ok(info)
}

/// Creates a project and makes it current.
pub fn create_project(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let name = require_str(data, "name")?;
    let manager = cx.project_manager()?;
    if manager.create_project(name)? {
        Ok(json!({ "success": true, "project_name": name }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to create project '{name}' (a project with that name may already exist)"
        )))
    }
}

/// Opens an existing project by name.
pub fn open_project(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let name = require_str(data, "name")?;
    let manager = cx.project_manager()?;
    if manager.load_project(name)? {
        Ok(json!({ "success": true, "project_name": name }))
    } else {
        Err(OpError::Failed(format!("Failed to open project '{name}'")))
    }
}

/// Reads one project setting, or all of them when no key is given.
pub fn get_project_setting(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    cx.require("get_current_project")?;
    let project = cx.require_project()?;
    match optional_str(data, "setting_name") {
        Some(key) => {
            let value = project.setting(key)?;
            Ok(json!({ "setting": key, "value": value }))
        }
        None => {
            let settings = project.all_settings()?;
            Ok(json!({ "settings": settings }))
        }
    }
}

/// Writes one project setting.
pub fn set_project_setting(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    cx.require("get_current_project")?;
    let key = require_str(data, "setting_name")?;
    let value = data
        .get("setting_value")
        .ok_or_else(|| OpError::missing("setting_value"))?;
    // The editor takes every setting as a string; coerce scalars.
    let value = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => {
            return Err(OpError::InvalidRequest(
                "setting_value must be a string, number or boolean".to_string(),
            ))
        }
    };

    let project = cx.require_project()?;
    if project.set_setting(key, &value)? {
        Ok(json!({ "setting": key, "value": value, "success": true }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to set project setting '{key}'"
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
    fn get_projects_lists_demo_project() {
        let mut session = demo_session();
        let result = session.dispatch_named("get_projects", &json!({})).unwrap();
        assert_eq!(result["projects"], json!(["Demo Project"]));
    }

    #[test]
    fn get_project_info_reports_timelines() {
        let mut session = demo_session();
        let info = session
            .dispatch_named("get_project_info", &json!({}))
            .unwrap();
        assert_eq!(info["name"], "Demo Project");
        assert_eq!(info["current_timeline"], "Timeline 1");
        assert_eq!(info["media_pool_item_count"], 2);
    }

    #[test]
    fn get_project_info_without_project_is_an_error() {
        let mut session = Session::new(Some(SimulatedEditor::empty()), false);
        let err = session
            .dispatch_named("get_project_info", &json!({}))
            .unwrap_err();
        assert!(matches!(err, OpError::NotConnected(_)));
    }

    #[test]
    fn create_project_requires_name() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("create_project", &json!({}))
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidRequest(_)));
    }

    #[test]
    fn create_project_rejects_duplicate_name() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("create_project", &json!({"name": "Demo Project"}))
            .unwrap_err();
        assert!(matches!(err, OpError::Failed(_)));
    }

    #[test]
    fn open_project_switches_current() {
        let mut session = demo_session();
        session
            .dispatch_named("create_project", &json!({"name": "Second"}))
            .unwrap();
        let result = session
            .dispatch_named("open_project", &json!({"name": "Demo Project"}))
            .unwrap();
        assert_eq!(result["success"], true);
        let info = session
            .dispatch_named("get_project_info", &json!({}))
            .unwrap();
        assert_eq!(info["name"], "Demo Project");
    }

    #[test]
    fn project_setting_round_trip() {
        let mut session = demo_session();
        session
            .dispatch_named(
                "set_project_setting",
                &json!({"setting_name": "timelineFrameRate", "setting_value": 25}),
            )
            .unwrap();
        let result = session
            .dispatch_named(
                "get_project_setting",
                &json!({"setting_name": "timelineFrameRate"}),
            )
            .unwrap();
        assert_eq!(result["value"], "25");
    }

    #[test]
    fn auto_open_recovers_when_no_project_is_current() {
        let editor = SimulatedEditor::with_demo_project();
        editor.close_current_project();
        let mut session = Session::new(Some(editor), true);
        let info = session
            .dispatch_named("get_project_info", &json!({}))
            .unwrap();
        assert_eq!(info["name"], "Demo Project");
    }

    #[test]
    fn without_auto_open_a_closed_project_stays_an_error() {
        let editor = SimulatedEditor::with_demo_project();
        editor.close_current_project();
        let mut session = Session::new(Some(editor), false);
        let err = session
            .dispatch_named("get_project_info", &json!({}))
            .unwrap_err();
        assert!(matches!(err, OpError::NotConnected(_)));
    }
}
