//! The editor-host seam.
//!
//! DaVinci Resolve exposes its scripting object model through a closed,
//! vendor-supplied binding. Everything this crate needs from that model is
//! expressed here as one trait per scripting object, so the dispatch layer
//! never touches the binding directly:
//!
//! - [`Editor`] — the application handle
//! - [`ProjectManager`] / [`Project`] — project database and open project
//! - [`Timeline`] / [`TimelineItem`] — edit timelines and their clips
//! - [`MediaPool`] / [`Folder`] / [`MediaPoolItem`] — the asset tree
//! - [`NodeGraph`] — the colour-correction graph of a timeline clip
//!
//! Every method returns `Result<_, HostError>`. A method that is absent
//! from the running editor version surfaces as [`HostError::Unsupported`];
//! the capability prober records those without retrying.
//!
//! The in-memory implementation in [`sim`] backs tests and `--simulate`
//! runs. A live binding is attached out of tree behind these same traits.

pub mod env;
pub mod sim;
mod types;

pub use types::{
    Channel, ExportFormat, Marker, MarkerColor, NodeKind, RenderJob, RenderJobStatus, Rgba,
    TrackKind, Wheel,
};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by the editor binding.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The editor is not running or the scripting host is unreachable.
    #[error("not connected to DaVinci Resolve; make sure it is running with a project open")]
    NotConnected,

    /// The method does not exist in the running editor version.
    #[error("{method} is not available in this editor version")]
    Unsupported {
        /// Name of the missing scripting method.
        method: &'static str,
    },

    /// The editor raised an error while executing the call.
    #[error("{0}")]
    Call(String),
}

impl HostError {
    /// Shorthand for an editor-raised error with a formatted message.
    pub fn call(message: impl Into<String>) -> Self {
        Self::Call(message.into())
    }
}

/// Result alias used throughout the host seam.
pub type HostResult<T> = Result<T, HostError>;

/// Shared handle to an editor-side object.
pub type Handle<T> = Arc<T>;

/// The running editor application.
pub trait Editor: Send + Sync {
    /// Product name as reported by the editor.
    fn product_name(&self) -> HostResult<String>;

    /// Product version string.
    fn product_version(&self) -> HostResult<String>;

    /// Name of the page currently shown in the UI (edit, color, deliver, ...).
    fn current_page(&self) -> HostResult<String>;

    /// The project manager object.
    fn project_manager(&self) -> HostResult<Handle<dyn ProjectManager>>;
}

/// The editor's project database.
pub trait ProjectManager: Send + Sync {
    /// Names of the projects in the current database folder.
    fn project_list(&self) -> HostResult<Vec<String>>;

    /// The currently open project, if any.
    fn current_project(&self) -> HostResult<Option<Handle<dyn Project>>>;

    /// Creates a project and opens it. Returns `false` when the name is taken.
    fn create_project(&self, name: &str) -> HostResult<bool>;

    /// Opens an existing project by name.
    fn load_project(&self, name: &str) -> HostResult<bool>;
}

/// An open project.
pub trait Project: Send + Sync {
    fn name(&self) -> HostResult<String>;

    /// Names of all timelines in the project.
    fn timeline_names(&self) -> HostResult<Vec<String>>;

    /// The timeline currently open in the edit page, if any.
    fn current_timeline(&self) -> HostResult<Option<Handle<dyn Timeline>>>;

    /// Timeline lookup by zero-based index; `None` past the end.
    fn timeline_by_index(&self, index: usize) -> HostResult<Option<Handle<dyn Timeline>>>;

    /// The project's media pool.
    fn media_pool(&self) -> HostResult<Handle<dyn MediaPool>>;

    /// Reads a single project setting by key.
    fn setting(&self, key: &str) -> HostResult<String>;

    /// Writes a single project setting.
    fn set_setting(&self, key: &str, value: &str) -> HostResult<bool>;

    /// All project settings as a key/value map.
    fn all_settings(&self) -> HostResult<BTreeMap<String, String>>;

    // Render queue -----------------------------------------------------

    /// Names of the available render presets.
    fn render_presets(&self) -> HostResult<Vec<String>>;

    /// Names of the available render formats.
    fn render_formats(&self) -> HostResult<Vec<String>>;

    /// Codecs available for a render format.
    fn render_codecs(&self, format: &str) -> HostResult<Vec<String>>;

    /// The current render queue.
    fn render_jobs(&self) -> HostResult<Vec<RenderJob>>;

    /// Loads a render preset into the current render settings.
    fn load_render_preset(&self, name: &str) -> HostResult<bool>;

    /// Applies render settings (target directory, custom name, ...).
    fn set_render_settings(&self, settings: &BTreeMap<String, String>) -> HostResult<bool>;

    /// Queues a render job from the current settings; returns the job id.
    fn add_render_job(&self) -> HostResult<String>;

    /// Removes a job from the render queue.
    fn delete_render_job(&self, job_id: &str) -> HostResult<bool>;

    /// Starts rendering the given jobs.
    fn start_rendering(&self, job_ids: &[String], interactive: bool) -> HostResult<bool>;

    /// Stops any in-progress render.
    fn stop_rendering(&self) -> HostResult<bool>;

    /// Status of a single render job.
    fn render_job_status(&self, job_id: &str) -> HostResult<RenderJobStatus>;
}

/// An edit timeline.
pub trait Timeline: Send + Sync {
    fn name(&self) -> HostResult<String>;

    /// Number of tracks of the given kind.
    fn track_count(&self, kind: TrackKind) -> HostResult<usize>;

    /// Items in a track. Track indices are one-based, as in the editor.
    fn items_in_track(
        &self,
        kind: TrackKind,
        index: usize,
    ) -> HostResult<Vec<Handle<dyn TimelineItem>>>;

    /// First frame of the timeline.
    fn start_frame(&self) -> HostResult<u64>;

    /// Playhead position as a timecode string.
    fn current_timecode(&self) -> HostResult<String>;

    /// Moves the playhead.
    fn set_current_timecode(&self, timecode: &str) -> HostResult<bool>;

    /// The video item under the playhead, if any.
    fn current_video_item(&self) -> HostResult<Option<Handle<dyn TimelineItem>>>;

    /// Replaces the timeline selection with the given items.
    fn set_selection(&self, items: &[Handle<dyn TimelineItem>]) -> HostResult<bool>;

    /// Exports the timeline to an interchange file.
    fn export(&self, path: &Path, format: ExportFormat) -> HostResult<bool>;

    /// Reads a single timeline setting by key.
    fn setting(&self, key: &str) -> HostResult<String>;

    /// Writes a single timeline setting.
    fn set_setting(&self, key: &str, value: &str) -> HostResult<bool>;

    // Markers ----------------------------------------------------------

    /// All markers, ordered by frame.
    fn markers(&self) -> HostResult<Vec<Marker>>;

    /// Places a marker. Returns `false` if a marker already sits at the frame.
    fn add_marker(&self, marker: &Marker) -> HostResult<bool>;

    /// Removes the marker at a frame. Returns `false` when none exists.
    fn delete_marker_at_frame(&self, frame: u64) -> HostResult<bool>;

    /// Removes every marker of a colour.
    fn delete_markers_by_color(&self, color: MarkerColor) -> HostResult<bool>;
}

/// A clip placed on a timeline track.
pub trait TimelineItem: Send + Sync {
    fn name(&self) -> HostResult<String>;

    /// Duration in frames.
    fn duration(&self) -> HostResult<u64>;

    /// Timeline frame where the item starts.
    fn start(&self) -> HostResult<u64>;

    /// Timeline frame just past the item's end.
    fn end(&self) -> HostResult<u64>;

    /// Frames trimmed from the head of the source clip.
    fn left_offset(&self) -> HostResult<u64>;

    /// Adds a coloured flag to the item.
    fn add_flag(&self, color: &str) -> HostResult<bool>;

    /// The media pool item this clip was cut from, if still linked.
    fn media_pool_item(&self) -> HostResult<Option<Handle<dyn MediaPoolItem>>>;

    /// The item's colour-correction graph.
    fn node_graph(&self) -> HostResult<Handle<dyn NodeGraph>>;
}

/// The project's asset-organisation tree.
pub trait MediaPool: Send + Sync {
    /// The root ("Master") folder.
    fn root_folder(&self) -> HostResult<Handle<dyn Folder>>;

    /// The folder currently open in the media pool UI.
    fn current_folder(&self) -> HostResult<Option<Handle<dyn Folder>>>;

    /// Makes a folder the current one.
    fn set_current_folder(&self, folder: &Handle<dyn Folder>) -> HostResult<bool>;

    /// Creates a subfolder. Returns the new folder, or `None` on refusal.
    fn add_subfolder(
        &self,
        parent: &Handle<dyn Folder>,
        name: &str,
    ) -> HostResult<Option<Handle<dyn Folder>>>;

    /// Moves clips into a destination folder.
    fn move_clips(
        &self,
        clips: &[Handle<dyn MediaPoolItem>],
        destination: &Handle<dyn Folder>,
    ) -> HostResult<bool>;

    /// Appends clips to the end of the current timeline.
    fn append_to_timeline(&self, clips: &[Handle<dyn MediaPoolItem>]) -> HostResult<bool>;

    /// Imports media files into the current folder.
    fn import_media(&self, paths: &[&Path]) -> HostResult<Vec<Handle<dyn MediaPoolItem>>>;

    /// Looks up a folder or smart bin by display name.
    fn folder_by_name(&self, name: &str) -> HostResult<Option<Handle<dyn Folder>>>;

    /// Creates a smart bin from a query string.
    fn create_smart_bin(&self, name: &str, query: &str) -> HostResult<bool>;

    /// Deletes a smart bin by name.
    fn delete_smart_bin(&self, name: &str) -> HostResult<bool>;
}

/// A folder (bin) in the media pool.
pub trait Folder: Send + Sync {
    /// Identity hook so a media pool can recognise its own handles.
    fn as_any(&self) -> &dyn std::any::Any;

    fn name(&self) -> HostResult<String>;

    /// Clips directly in this folder.
    fn clips(&self) -> HostResult<Vec<Handle<dyn MediaPoolItem>>>;

    /// Immediate subfolders.
    fn subfolders(&self) -> HostResult<Vec<Handle<dyn Folder>>>;
}

/// A clip in the media pool.
pub trait MediaPoolItem: Send + Sync {
    /// Identity hook so a media pool can recognise its own handles.
    fn as_any(&self) -> &dyn std::any::Any;

    fn name(&self) -> HostResult<String>;

    /// Duration in frames.
    fn duration(&self) -> HostResult<u64>;

    /// Reads a clip property ("Type", "FPS", "Start TC", ...).
    fn clip_property(&self, key: &str) -> HostResult<String>;

    /// Writes a clip property.
    fn set_clip_property(&self, key: &str, value: &str) -> HostResult<bool>;
}

/// The colour-correction graph of a timeline item.
///
/// Node indices are one-based, matching the editor's node numbering.
pub trait NodeGraph: Send + Sync {
    fn node_count(&self) -> HostResult<usize>;

    /// Index of the selected node.
    fn current_node_index(&self) -> HostResult<usize>;

    /// Selects a node by index.
    fn set_current_node_index(&self, index: usize) -> HostResult<bool>;

    fn node_label(&self, index: usize) -> HostResult<String>;

    fn set_node_label(&self, index: usize, label: &str) -> HostResult<bool>;

    fn node_kind(&self, index: usize) -> HostResult<NodeKind>;

    /// Adds a serial node after the current one; returns its index.
    fn add_serial_node(&self) -> HostResult<usize>;

    /// Adds a parallel node alongside the current one; returns its index.
    fn add_parallel_node(&self) -> HostResult<usize>;

    /// Adds a layer node under the current one; returns its index.
    fn add_layer_node(&self) -> HostResult<usize>;

    /// Deletes the selected node. Node 1 cannot be deleted.
    fn delete_current_node(&self) -> HostResult<bool>;

    /// Clears all grades on the selected node.
    fn reset_current_node(&self) -> HostResult<bool>;

    /// Reads one channel of a primary-correction wheel on the selected node.
    fn wheel(&self, wheel: Wheel, channel: Channel) -> HostResult<f64>;

    /// Writes one channel of a primary-correction wheel on the selected node.
    fn set_wheel(&self, wheel: Wheel, channel: Channel, value: f64) -> HostResult<bool>;

    /// Saturation of the selected node.
    fn saturation(&self) -> HostResult<f64>;

    fn set_saturation(&self, value: f64) -> HostResult<bool>;

    /// Tile colour of the selected node in the graph view.
    fn tile_color(&self) -> HostResult<Rgba>;

    fn set_tile_color(&self, color: Rgba) -> HostResult<bool>;

    /// Registers a LUT file with the graph.
    fn import_lut(&self, path: &Path) -> HostResult<bool>;

    /// Applies a LUT file to the selected node.
    fn apply_lut(&self, path: &Path) -> HostResult<bool>;
}

/// How the binary attaches to an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// Attach to the live editor through the vendor scripting binding.
    Live,
    /// Use the in-memory simulated editor.
    Simulated,
}

/// Attaches to an editor host.
///
/// In [`HostMode::Live`] the vendor environment is verified first
/// (see [`env::discover`]); without a reachable scripting binding this
/// returns [`HostError::NotConnected`], which the server surfaces per
/// request until an editor becomes available.
///
/// # Errors
///
/// Returns [`HostError::NotConnected`] when no live binding is reachable.
pub fn connect(mode: HostMode) -> HostResult<Handle<dyn Editor>> {
    match mode {
        HostMode::Simulated => Ok(sim::SimulatedEditor::with_demo_project()),
        HostMode::Live => {
            let discovered = env::discover();
            if !discovered.library_present {
                tracing::warn!(
                    script_lib = %discovered.script_lib.display(),
                    "editor scripting library not found"
                );
                return Err(HostError::NotConnected);
            }
            env::prepare(&discovered);
            // The in-process vendor binding is attached out of tree behind
            // the Editor trait; with none registered the editor is treated
            // as unreachable.
            Err(HostError::NotConnected)
        }
    }
}
