//! Render-queue operations.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::{optional_bool, optional_str, optional_str_list, require_str, OpContext, OpError, OpResult};

/// Lists the available render presets.
pub fn get_render_presets(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require("get_render_presets")?;
    let project = cx.require_project()?;
    Ok(json!({ "presets": project.render_presets()? }))
}

/// Lists the available render formats.
pub fn get_render_formats(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require("get_render_presets")?;
    let project = cx.require_project()?;
    Ok(json!({ "formats": project.render_formats()? }))
}

/// Lists the codecs available for one render format.
pub fn get_render_codecs(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let format = require_str(data, "format_name")?;
    cx.require("get_render_presets")?;
    let project = cx.require_project()?;
    Ok(json!({
        "format": format,
        "codecs": project.render_codecs(format)?,
    }))
}

/// Lists the render queue.
pub fn get_render_jobs(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require("get_render_job_list")?;
    let project = cx.require_project()?;
    Ok(json!({ "jobs": project.render_jobs()? }))
}

/// Queues a render job, optionally loading a preset and applying target
/// directory / custom name settings first.
pub fn add_render_job(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    cx.require("get_render_job_list")?;
    let project = cx.require_project()?;

    if let Some(preset) = optional_str(data, "preset_name") {
        let presets = project.render_presets()?;
        if !presets.iter().any(|p| p == preset) {
            return Err(OpError::Failed(format!(
                "Render preset '{preset}' not found"
            )));
        }
        if !project.load_render_preset(preset)? {
            return Err(OpError::Failed(format!(
                "Failed to load render preset '{preset}'"
            )));
        }
    }

    let mut settings = BTreeMap::new();
    if let Some(dir) = optional_str(data, "output_directory") {
        settings.insert("TargetDir".to_string(), dir.to_string());
    }
    if let Some(name) = optional_str(data, "custom_name") {
        settings.insert("CustomName".to_string(), name.to_string());
    }
    if !settings.is_empty() {
        project.set_render_settings(&settings)?;
    }

    let job_id = project.add_render_job()?;
    if job_id.is_empty() {
        return Err(OpError::Failed("Failed to add render job".to_string()));
    }
    Ok(json!({
        "message": "Render job added successfully",
        "job_id": job_id,
    }))
}

/// Removes a job from the render queue.
pub fn delete_render_job(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let job_id = require_str(data, "job_id")?;
    cx.require("get_render_job_list")?;
    let project = cx.require_project()?;
    if project.delete_render_job(job_id)? {
        Ok(json!({ "message": format!("Render job '{job_id}' deleted successfully") }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to delete render job '{job_id}'"
        )))
    }
}

/// Starts rendering the given jobs, or every queued job when none are named.
pub fn start_rendering(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    cx.require("get_render_job_list")?;
    let interactive = optional_bool(data, "interactive").unwrap_or(false);
    let project = cx.require_project()?;

    let job_ids = match optional_str_list(data, "job_ids") {
        Some(ids) if !ids.is_empty() => ids,
        _ => project
            .render_jobs()?
            .into_iter()
            .map(|job| job.id)
            .collect(),
    };
    if job_ids.is_empty() {
        return Err(OpError::Failed("No render jobs to start".to_string()));
    }

    if project.start_rendering(&job_ids, interactive)? {
        Ok(json!({
            "message": "Rendering started successfully",
            "job_ids": job_ids,
            "interactive": interactive,
        }))
    } else {
        Err(OpError::Failed("Failed to start rendering".to_string()))
    }
}

/// Stops any in-progress render.
pub fn stop_rendering(cx: &OpContext<'_>) -> OpResult<Value> {
    cx.require("get_render_job_list")?;
    let project = cx.require_project()?;
    if project.stop_rendering()? {
        Ok(json!({ "message": "Rendering stopped successfully" }))
    } else {
        Err(OpError::Failed("Failed to stop rendering".to_string()))
    }
}

/// Reports the status of one render job.
pub fn get_render_job_status(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let job_id = require_str(data, "job_id")?;
    cx.require("get_render_job_list")?;
    let project = cx.require_project()?;
    let status = project.render_job_status(job_id)?;
    Ok(json!({ "job_id": job_id, "status": status }))
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
    fn presets_and_formats_are_listed() {
        let mut session = demo_session();
        let presets = session
            .dispatch_named("get_render_presets", &json!({}))
            .unwrap();
        assert!(presets["presets"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p == "YouTube 1080p"));

        let formats = session
            .dispatch_named("get_render_formats", &json!({}))
            .unwrap();
        assert!(formats["formats"].as_array().unwrap().iter().any(|f| f == "mov"));
    }

    #[test]
    fn codecs_follow_the_format() {
        let mut session = demo_session();
        let result = session
            .dispatch_named("get_render_codecs", &json!({"format_name": "mp4"}))
            .unwrap();
        assert!(result["codecs"].as_array().unwrap().iter().any(|c| c == "H.264"));
    }

    #[test]
    fn job_lifecycle_queue_start_status_delete() {
        let mut session = demo_session();
        let added = session
            .dispatch_named(
                "add_render_job",
                &json!({
                    "preset_name": "YouTube 1080p",
                    "output_directory": "/tmp/renders",
                    "custom_name": "promo_final",
                }),
            )
            .unwrap();
        let job_id = added["job_id"].as_str().unwrap().to_string();

        let jobs = session.dispatch_named("get_render_jobs", &json!({})).unwrap();
        assert_eq!(jobs["jobs"].as_array().unwrap().len(), 1);
        assert_eq!(jobs["jobs"][0]["name"], "promo_final");
        assert_eq!(jobs["jobs"][0]["target_dir"], "/tmp/renders");

        session
            .dispatch_named("start_rendering", &json!({"job_ids": [job_id.clone()]}))
            .unwrap();
        let status = session
            .dispatch_named("get_render_job_status", &json!({"job_id": job_id.clone()}))
            .unwrap();
        assert_eq!(status["status"]["status"], "Complete");
        assert_eq!(status["status"]["completion_percentage"], 100);

        session
            .dispatch_named("delete_render_job", &json!({"job_id": job_id.clone()}))
            .unwrap();
        let err = session
            .dispatch_named("delete_render_job", &json!({"job_id": job_id}))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to delete render job"));
    }

    #[test]
    fn unknown_preset_is_refused() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("add_render_job", &json!({"preset_name": "Betamax"}))
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn start_with_empty_queue_fails() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("start_rendering", &json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("No render jobs"));
    }

    #[test]
    fn status_of_unknown_job_is_an_editor_error() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("get_render_job_status", &json!({"job_id": "job-404"}))
            .unwrap_err();
        assert!(matches!(err, OpError::Editor(_)));
    }
}
