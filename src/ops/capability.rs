//! Runtime capability probing.
//!
//! The vendor scripting API drifts between editor versions: methods appear,
//! vanish, or return nothing depending on version and on which page the
//! editor is showing. Rather than discovering this mid-operation, the
//! session probes each known accessor once against the live object graph
//! and records a boolean per probe name.
//!
//! Probing never fails: a probe that errors is recorded as unavailable.
//! The map is rebuilt wholesale after every project switch; entries probed
//! against a previous project's handles must not survive.

use indexmap::IndexMap;
use serde_json::Value;

use crate::host::{Editor, Handle};

/// Names of every probe, in the order they run and serialise.
pub const PROBE_NAMES: [&str; 16] = [
    "get_project_manager",
    "get_project_list",
    "get_current_project",
    "get_project_name",
    "get_timeline_names",
    "get_current_timeline",
    "get_timeline_by_index",
    "get_media_pool",
    "get_root_folder",
    "get_clip_list",
    "get_folder_by_name",
    "get_markers",
    "get_node_graph",
    "get_render_presets",
    "get_render_job_list",
    "get_current_page",
];

/// The probed availability of the editor's scripting methods.
#[derive(Debug, Clone)]
pub struct CapabilityMap {
    entries: IndexMap<&'static str, bool>,
}

impl CapabilityMap {
    /// A map with every probe recorded as unavailable, used when no editor
    /// host is attached.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            entries: PROBE_NAMES.iter().map(|name| (*name, false)).collect(),
        }
    }

    /// Probes the live editor object graph.
    ///
    /// Walks the accessors top-down: a parent object that cannot be reached
    /// leaves its children recorded as unavailable, the same way a missing
    /// method does.
    #[must_use]
    pub fn probe(editor: &Handle<dyn Editor>) -> Self {
        let mut map = Self::unavailable();

        map.set("get_current_page", editor.current_page().is_ok());

        let Ok(manager) = editor.project_manager() else {
            tracing::warn!("project manager not reachable during capability probe");
            return map;
        };
        map.set("get_project_manager", true);
        map.set("get_project_list", manager.project_list().is_ok());

        let project = match manager.current_project() {
            Ok(Some(project)) => {
                map.set("get_current_project", true);
                project
            }
            Ok(None) => {
                // The accessor works even with nothing open.
                map.set("get_current_project", true);
                return map;
            }
            Err(error) => {
                tracing::warn!(%error, "current project not reachable during capability probe");
                return map;
            }
        };

        map.set("get_project_name", project.name().is_ok());
        map.set("get_timeline_names", project.timeline_names().is_ok());
        map.set(
            "get_timeline_by_index",
            project.timeline_by_index(0).is_ok(),
        );
        map.set("get_render_presets", project.render_presets().is_ok());
        map.set("get_render_job_list", project.render_jobs().is_ok());

        match project.current_timeline() {
            Ok(Some(timeline)) => {
                map.set("get_current_timeline", true);
                map.set("get_markers", timeline.markers().is_ok());
                let graph_reachable = timeline
                    .current_video_item()
                    .ok()
                    .flatten()
                    .is_some_and(|item| item.node_graph().is_ok());
                map.set("get_node_graph", graph_reachable);
            }
            Ok(None) => map.set("get_current_timeline", true),
            Err(error) => {
                tracing::debug!(%error, "current timeline probe failed");
            }
        }

        match project.media_pool() {
            Ok(pool) => {
                map.set("get_media_pool", true);
                map.set(
                    "get_folder_by_name",
                    pool.folder_by_name("All Clips").is_ok(),
                );
                match pool.root_folder() {
                    Ok(root) => {
                        map.set("get_root_folder", true);
                        map.set("get_clip_list", root.clips().is_ok());
                    }
                    Err(error) => {
                        tracing::debug!(%error, "root folder probe failed");
                    }
                }
            }
            Err(error) => {
                tracing::debug!(%error, "media pool probe failed");
            }
        }

        tracing::info!(capabilities = ?map.entries, "editor capability probe complete");
        map
    }

    fn set(&mut self, name: &'static str, available: bool) {
        self.entries.insert(name, available);
    }

    /// Whether a probe found its method available.
    #[must_use]
    pub fn supports(&self, name: &str) -> bool {
        self.entries.get(name).copied().unwrap_or(false)
    }

    /// The map as a JSON object, in probe order.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(name, available)| ((*name).to_string(), Value::Bool(*available)))
                .collect(),
        )
    }
}
