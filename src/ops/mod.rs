//! Operation dispatch.
//!
//! This is the crate's core: a fixed enumeration of operations, each mapping
//! to one capability check plus one short sequence of forwarding calls into
//! the editor host. The [`Session`] owns the editor handle and the probed
//! [`CapabilityMap`]; every request from every transport serialises through
//! it.
//!
//! Unknown operation names are rejected before dispatch. Editor failures are
//! translated into [`OpError`] values whose taxonomy the transports render
//! into error envelopes; no call is ever retried.

pub mod capability;
pub mod color;
pub mod marker;
pub mod media;
pub mod project;
pub mod render;
pub mod timecode;
pub mod timeline;

pub use capability::CapabilityMap;

use serde_json::Value;
use thiserror::Error;

use crate::host::{
    Editor, Handle, HostError, MediaPool, NodeGraph, Project, ProjectManager, Timeline,
};

/// Errors produced while handling an operation.
#[derive(Debug, Error)]
pub enum OpError {
    /// The editor is unreachable or no project is open.
    #[error("{0}")]
    NotConnected(String),

    /// The capability map says the required editor method is missing.
    #[error("operation requires editor method '{0}' which is not available in this session")]
    Unsupported(&'static str),

    /// The editor raised an error during the call.
    #[error("editor call failed: {0}")]
    Editor(String),

    /// The request was malformed (missing or mistyped arguments).
    #[error("{0}")]
    InvalidRequest(String),

    /// The editor refused the operation (a vendor method returned failure).
    #[error("{0}")]
    Failed(String),
}

impl From<HostError> for OpError {
    fn from(error: HostError) -> Self {
        match error {
            HostError::NotConnected => Self::NotConnected(error.to_string()),
            HostError::Unsupported { method } => Self::Unsupported(method),
            HostError::Call(message) => Self::Editor(message),
        }
    }
}

impl OpError {
    /// Missing-parameter error with the conventional message shape.
    pub fn missing(parameter: &str) -> Self {
        Self::InvalidRequest(format!("Missing required parameter: {parameter}"))
    }
}

/// Result alias for operation handlers.
pub type OpResult<T> = Result<T, OpError>;

macro_rules! operations {
    ($( $variant:ident => $name:literal ),+ $(,)?) => {
        /// The fixed set of operations the dispatcher accepts.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Operation {
            $( $variant, )+
        }

        impl Operation {
            /// Every operation, in the order advertised by `/operations`.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )+ ];

            /// The wire name of the operation.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )+
                }
            }

            /// Looks up an operation by wire name.
            #[must_use]
            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

operations! {
    // Capabilities
    GetApiCapabilities => "get_api_capabilities",
    // Projects
    GetProjects => "get_projects",
    GetProjectInfo => "get_project_info",
    CreateProject => "create_project",
    OpenProject => "open_project",
    GetProjectSetting => "get_project_setting",
    SetProjectSetting => "set_project_setting",
    // Timelines
    GetTimelineInfo => "get_timeline_info",
    GetTimelineClips => "get_timeline_clips",
    AddClipToTimeline => "add_clip_to_timeline",
    SelectClipsByName => "select_clips_by_name",
    ExportTimelineXml => "export_timeline_xml",
    GetPlayheadPosition => "get_playhead_position",
    ControlPlayback => "control_playback",
    GetTimelineSetting => "get_timeline_setting",
    SetTimelineSetting => "set_timeline_setting",
    // Markers
    GetTimelineMarkers => "get_timeline_markers",
    AddTimelineMarker => "add_timeline_marker",
    UpdateMarker => "update_marker",
    DeleteMarker => "delete_marker",
    DeleteMarkersByColor => "delete_markers_by_color",
    // Media pool
    GetMediaPoolItems => "get_media_pool_items",
    GetFolderHierarchy => "get_folder_hierarchy",
    GetFolderByPath => "get_folder_by_path",
    CreateFolderPath => "create_folder_path",
    SetCurrentFolder => "set_current_folder",
    GetCurrentFolder => "get_current_folder",
    MoveClipsBetweenFolders => "move_clips_between_folders",
    CreateSmartBin => "create_smart_bin",
    GetSmartBins => "get_smart_bins",
    DeleteSmartBin => "delete_smart_bin",
    BulkSetClipProperty => "bulk_set_clip_property",
    ImportFilesToFolder => "import_files_to_folder",
    // Colour nodes
    GetCurrentNodeIndex => "get_current_node_index",
    SetCurrentNodeIndex => "set_current_node_index",
    AddSerialNode => "add_serial_node",
    AddParallelNode => "add_parallel_node",
    AddLayerNode => "add_layer_node",
    DeleteCurrentNode => "delete_current_node",
    ResetCurrentNode => "reset_current_node",
    GetNodeList => "get_node_list",
    GetPrimaryCorrection => "get_primary_correction",
    SetPrimaryCorrection => "set_primary_correction",
    GetNodeLabel => "get_node_label",
    SetNodeLabel => "set_node_label",
    GetNodeColor => "get_node_color",
    SetNodeColor => "set_node_color",
    ImportLut => "import_lut",
    ApplyLutToCurrentNode => "apply_lut_to_current_node",
    // Render queue
    GetRenderPresets => "get_render_presets",
    GetRenderFormats => "get_render_formats",
    GetRenderCodecs => "get_render_codecs",
    GetRenderJobs => "get_render_jobs",
    AddRenderJob => "add_render_job",
    DeleteRenderJob => "delete_render_job",
    StartRendering => "start_rendering",
    StopRendering => "stop_rendering",
    GetRenderJobStatus => "get_render_job_status",
    // Source timecode
    GetClipSourceTimecode => "get_clip_source_timecode",
    GetSourceTimecodeReport => "get_source_timecode_report",
    ExportSourceTimecodeReport => "export_source_timecode_report",
}

impl Operation {
    /// `true` for operations that switch the open project and therefore
    /// invalidate the capability map.
    #[must_use]
    pub const fn switches_project(self) -> bool {
        matches!(self, Self::CreateProject | Self::OpenProject)
    }
}

/// Borrowed context handed to operation handlers.
pub struct OpContext<'a> {
    /// The live editor handle.
    pub editor: &'a Handle<dyn Editor>,
    /// Capabilities probed for the current project.
    pub caps: &'a CapabilityMap,
    /// Whether to open the first available project when none is open.
    pub auto_open_project: bool,
}

impl OpContext<'_> {
    /// Fails with [`OpError::Unsupported`] unless the capability was probed
    /// as available.
    pub fn require(&self, capability: &'static str) -> OpResult<()> {
        if self.caps.supports(capability) {
            Ok(())
        } else {
            Err(OpError::Unsupported(capability))
        }
    }

    /// Like [`Self::require`], but satisfied by any one of the named
    /// capabilities.
    pub fn require_any(&self, capabilities: &[&'static str]) -> OpResult<()> {
        if capabilities.iter().any(|cap| self.caps.supports(cap)) {
            Ok(())
        } else {
            Err(OpError::Unsupported(capabilities[0]))
        }
    }

    /// The editor's project manager.
    pub fn project_manager(&self) -> OpResult<Handle<dyn ProjectManager>> {
        Ok(self.editor.project_manager()?)
    }

    /// The open project, auto-opening the first one when configured to.
    pub fn require_project(&self) -> OpResult<Handle<dyn Project>> {
        let manager = self.project_manager()?;
        if let Some(project) = manager.current_project()? {
            return Ok(project);
        }
        if self.auto_open_project {
            let projects = manager.project_list()?;
            if let Some(first) = projects.first() {
                tracing::info!(project = %first, "no project open, opening first available");
                if manager.load_project(first)? {
                    if let Some(project) = manager.current_project()? {
                        return Ok(project);
                    }
                }
            }
        }
        Err(OpError::NotConnected(
            "No project is open in DaVinci Resolve and none could be opened automatically"
                .to_string(),
        ))
    }

    /// The current timeline, falling back to the timeline at index 0 when
    /// the editor reports none as current.
    pub fn require_timeline(&self) -> OpResult<Handle<dyn Timeline>> {
        let project = self.require_project()?;
        if let Some(timeline) = project.current_timeline()? {
            return Ok(timeline);
        }
        tracing::info!("no current timeline, trying timeline by index");
        if let Some(timeline) = project.timeline_by_index(0)? {
            return Ok(timeline);
        }
        Err(OpError::Failed("No timeline available".to_string()))
    }

    /// The open project's media pool.
    pub fn media_pool(&self) -> OpResult<Handle<dyn MediaPool>> {
        Ok(self.require_project()?.media_pool()?)
    }

    /// The node graph of the clip under the playhead.
    pub fn current_node_graph(&self) -> OpResult<Handle<dyn NodeGraph>> {
        self.require("get_node_graph")?;
        let timeline = self.require_timeline()?;
        let item = timeline.current_video_item()?.ok_or_else(|| {
            OpError::Failed("No clip under the playhead in the current timeline".to_string())
        })?;
        Ok(item.node_graph()?)
    }
}

/// One editor connection plus its probed capabilities.
///
/// All dispatch is request-at-a-time; the server wraps the session in an
/// async mutex so calls into the editor binding never interleave.
pub struct Session {
    editor: Option<Handle<dyn Editor>>,
    capabilities: CapabilityMap,
    auto_open_project: bool,
}

impl Session {
    /// Creates a session and runs the initial capability probe.
    #[must_use]
    pub fn new(editor: Option<Handle<dyn Editor>>, auto_open_project: bool) -> Self {
        let capabilities = editor
            .as_ref()
            .map_or_else(CapabilityMap::unavailable, CapabilityMap::probe);
        Self {
            editor,
            capabilities,
            auto_open_project,
        }
    }

    /// Whether an editor host is attached.
    #[must_use]
    pub const fn connected(&self) -> bool {
        self.editor.is_some()
    }

    /// The current capability map.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilityMap {
        &self.capabilities
    }

    /// Rebuilds the capability map from scratch against the current editor
    /// handles. Called after project switches; never patched incrementally.
    pub fn refresh_capabilities(&mut self) {
        self.capabilities = self
            .editor
            .as_ref()
            .map_or_else(CapabilityMap::unavailable, CapabilityMap::probe);
    }

    /// Dispatches an operation by wire name.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::InvalidRequest`] for names outside the fixed
    /// enumeration, plus whatever the operation itself produces.
    pub fn dispatch_named(&mut self, name: &str, data: &Value) -> OpResult<Value> {
        let Some(operation) = Operation::parse(name) else {
            return Err(OpError::InvalidRequest(format!(
                "Unsupported operation: {name}"
            )));
        };
        self.dispatch(operation, data)
    }

    /// Dispatches a validated operation.
    ///
    /// # Errors
    ///
    /// Returns an [`OpError`] per the §7 taxonomy; never panics on editor
    /// failures.
    pub fn dispatch(&mut self, operation: Operation, data: &Value) -> OpResult<Value> {
        let Some(editor) = self.editor.as_ref() else {
            return Err(OpError::NotConnected(
                "Not connected to DaVinci Resolve. Make sure it's running with a project open."
                    .to_string(),
            ));
        };

        let cx = OpContext {
            editor,
            caps: &self.capabilities,
            auto_open_project: self.auto_open_project,
        };

        let result = match operation {
            // The capability map itself rides on every response; the
            // dedicated operation exists so clients can fetch it alone.
            Operation::GetApiCapabilities => Ok(serde_json::json!({})),
            // Projects
            Operation::GetProjects => project::get_projects(&cx),
            Operation::GetProjectInfo => project::get_project_info(&cx),
            Operation::CreateProject => project::create_project(&cx, data),
            Operation::OpenProject => project::open_project(&cx, data),
            Operation::GetProjectSetting => project::get_project_setting(&cx, data),
            Operation::SetProjectSetting => project::set_project_setting(&cx, data),
            // Timelines
            Operation::GetTimelineInfo => timeline::get_timeline_info(&cx),
            Operation::GetTimelineClips => timeline::get_timeline_clips(&cx),
            Operation::AddClipToTimeline => timeline::add_clip_to_timeline(&cx, data),
            Operation::SelectClipsByName => timeline::select_clips_by_name(&cx, data),
            Operation::ExportTimelineXml => timeline::export_timeline_xml(&cx, data),
            Operation::GetPlayheadPosition => timeline::get_playhead_position(&cx),
            Operation::ControlPlayback => timeline::control_playback(&cx, data),
            Operation::GetTimelineSetting => timeline::get_timeline_setting(&cx, data),
            Operation::SetTimelineSetting => timeline::set_timeline_setting(&cx, data),
            // Markers
            Operation::GetTimelineMarkers => marker::get_timeline_markers(&cx),
            Operation::AddTimelineMarker => marker::add_timeline_marker(&cx, data),
            Operation::UpdateMarker => marker::update_marker(&cx, data),
            Operation::DeleteMarker => marker::delete_marker(&cx, data),
            Operation::DeleteMarkersByColor => marker::delete_markers_by_color(&cx, data),
            // Media pool
            Operation::GetMediaPoolItems => media::get_media_pool_items(&cx),
            Operation::GetFolderHierarchy => media::get_folder_hierarchy(&cx, data),
            Operation::GetFolderByPath => media::get_folder_by_path(&cx, data),
            Operation::CreateFolderPath => media::create_folder_path(&cx, data),
            Operation::SetCurrentFolder => media::set_current_folder(&cx, data),
            Operation::GetCurrentFolder => media::get_current_folder(&cx),
            Operation::MoveClipsBetweenFolders => media::move_clips_between_folders(&cx, data),
            Operation::CreateSmartBin => media::create_smart_bin(&cx, data),
            Operation::GetSmartBins => media::get_smart_bins(&cx),
            Operation::DeleteSmartBin => media::delete_smart_bin(&cx, data),
            Operation::BulkSetClipProperty => media::bulk_set_clip_property(&cx, data),
            Operation::ImportFilesToFolder => media::import_files_to_folder(&cx, data),
            // Colour nodes
            Operation::GetCurrentNodeIndex => color::get_current_node_index(&cx),
            Operation::SetCurrentNodeIndex => color::set_current_node_index(&cx, data),
            Operation::AddSerialNode => color::add_serial_node(&cx),
            Operation::AddParallelNode => color::add_parallel_node(&cx),
            Operation::AddLayerNode => color::add_layer_node(&cx),
            Operation::DeleteCurrentNode => color::delete_current_node(&cx),
            Operation::ResetCurrentNode => color::reset_current_node(&cx),
            Operation::GetNodeList => color::get_node_list(&cx),
            Operation::GetPrimaryCorrection => color::get_primary_correction(&cx),
            Operation::SetPrimaryCorrection => color::set_primary_correction(&cx, data),
            Operation::GetNodeLabel => color::get_node_label(&cx),
            Operation::SetNodeLabel => color::set_node_label(&cx, data),
            Operation::GetNodeColor => color::get_node_color(&cx),
            Operation::SetNodeColor => color::set_node_color(&cx, data),
            Operation::ImportLut => color::import_lut(&cx, data),
            Operation::ApplyLutToCurrentNode => color::apply_lut_to_current_node(&cx, data),
            // Render queue
            Operation::GetRenderPresets => render::get_render_presets(&cx),
            Operation::GetRenderFormats => render::get_render_formats(&cx),
            Operation::GetRenderCodecs => render::get_render_codecs(&cx, data),
            Operation::GetRenderJobs => render::get_render_jobs(&cx),
            Operation::AddRenderJob => render::add_render_job(&cx, data),
            Operation::DeleteRenderJob => render::delete_render_job(&cx, data),
            Operation::StartRendering => render::start_rendering(&cx, data),
            Operation::StopRendering => render::stop_rendering(&cx),
            Operation::GetRenderJobStatus => render::get_render_job_status(&cx, data),
            // Source timecode
            Operation::GetClipSourceTimecode => timecode::get_clip_source_timecode(&cx, data),
            Operation::GetSourceTimecodeReport => timecode::get_source_timecode_report(&cx),
            Operation::ExportSourceTimecodeReport => {
                timecode::export_source_timecode_report(&cx, data)
            }
        };

        if result.is_ok() && operation.switches_project() {
            // Capability entries probed against the previous project's
            // handles would be stale; rebuild the whole map.
            self.refresh_capabilities();
        }

        result
    }
}

// ---------------------------------------------------------------------------
// Argument extraction helpers shared by the op modules
// ---------------------------------------------------------------------------

pub(crate) fn require_str<'a>(data: &'a Value, key: &str) -> OpResult<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| OpError::missing(key))
}

pub(crate) fn optional_str<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

pub(crate) fn require_u64(data: &Value, key: &str) -> OpResult<u64> {
    data.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| OpError::missing(key))
}

pub(crate) fn optional_u64(data: &Value, key: &str) -> Option<u64> {
    data.get(key).and_then(Value::as_u64)
}

pub(crate) fn optional_bool(data: &Value, key: &str) -> Option<bool> {
    data.get(key).and_then(Value::as_bool)
}

pub(crate) fn optional_str_list(data: &Value, key: &str) -> Option<Vec<String>> {
    data.get(key).and_then(Value::as_array).map(|values| {
        values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}
