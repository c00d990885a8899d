//! In-memory editor host.
//!
//! Implements every trait in [`crate::host`] against plain data structures
//! so the dispatch layer can be exercised without a running editor. This
//! backs the test suite and `--simulate` runs.
//!
//! Handles address their object by project/timeline/path rather than by
//! reference, the same way the vendor binding hands out opaque object ids;
//! a handle whose target has been removed reports an editor-raised error
//! on the next call.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;

use super::{
    Channel, Editor, ExportFormat, Folder, Handle, HostError, HostResult, Marker, MarkerColor,
    MediaPool, MediaPoolItem, NodeGraph, NodeKind, Project, ProjectManager, RenderJob,
    RenderJobStatus, Rgba, Timeline, TimelineItem, TrackKind, Wheel,
};

/// Default smart bins the editor creates for every project.
pub const DEFAULT_SMART_BINS: [&str; 3] = ["All Clips", "All Video Clips", "Timelines"];

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SimState {
    projects: IndexMap<String, ProjectState>,
    current_project: Option<String>,
    current_page: String,
}

#[derive(Debug)]
struct ProjectState {
    settings: BTreeMap<String, String>,
    timelines: IndexMap<String, TimelineState>,
    current_timeline: Option<String>,
    root: FolderState,
    current_folder_path: Vec<String>,
    smart_bins: IndexMap<String, String>,
    render: RenderState,
}

impl ProjectState {
    fn new() -> Self {
        let mut settings = BTreeMap::new();
        settings.insert("timelineFrameRate".to_string(), "24".to_string());
        settings.insert("timelineResolutionWidth".to_string(), "1920".to_string());
        settings.insert("timelineResolutionHeight".to_string(), "1080".to_string());

        let mut smart_bins = IndexMap::new();
        for name in DEFAULT_SMART_BINS {
            smart_bins.insert(name.to_string(), String::new());
        }

        let mut timelines = IndexMap::new();
        timelines.insert("Timeline 1".to_string(), TimelineState::new());

        Self {
            settings,
            timelines,
            current_timeline: Some("Timeline 1".to_string()),
            root: FolderState::new("Master"),
            current_folder_path: Vec::new(),
            smart_bins,
            render: RenderState::new(),
        }
    }
}

#[derive(Debug)]
struct TimelineState {
    start_frame: u64,
    playhead: u64,
    settings: BTreeMap<String, String>,
    markers: BTreeMap<u64, Marker>,
    video_tracks: Vec<Vec<ItemState>>,
    audio_tracks: Vec<Vec<ItemState>>,
    selection: Vec<String>,
}

impl TimelineState {
    fn new() -> Self {
        Self {
            start_frame: 0,
            playhead: 0,
            settings: BTreeMap::new(),
            markers: BTreeMap::new(),
            video_tracks: vec![Vec::new(), Vec::new()],
            audio_tracks: vec![Vec::new(), Vec::new()],
            selection: Vec::new(),
        }
    }

    fn tracks(&self, kind: TrackKind) -> &Vec<Vec<ItemState>> {
        match kind {
            TrackKind::Video => &self.video_tracks,
            TrackKind::Audio => &self.audio_tracks,
        }
    }

    fn tracks_mut(&mut self, kind: TrackKind) -> &mut Vec<Vec<ItemState>> {
        match kind {
            TrackKind::Video => &mut self.video_tracks,
            TrackKind::Audio => &mut self.audio_tracks,
        }
    }
}

#[derive(Debug)]
struct ItemState {
    name: String,
    start: u64,
    duration: u64,
    left_offset: u64,
    flags: Vec<String>,
    source: Option<String>,
    graph: GraphState,
}

impl ItemState {
    fn new(name: &str, start: u64, duration: u64) -> Self {
        Self {
            name: name.to_string(),
            start,
            duration,
            left_offset: 0,
            flags: Vec::new(),
            source: None,
            graph: GraphState::new(),
        }
    }
}

#[derive(Debug)]
struct GraphState {
    nodes: Vec<NodeState>,
    /// One-based index of the selected node.
    current: usize,
}

impl GraphState {
    fn new() -> Self {
        Self {
            nodes: vec![NodeState::new(NodeKind::Serial)],
            current: 1,
        }
    }
}

#[derive(Debug)]
struct NodeState {
    label: String,
    kind: NodeKind,
    /// Wheel values indexed by [wheel][channel].
    wheels: [[f64; 4]; 4],
    saturation: f64,
    tile: Rgba,
    lut: Option<String>,
}

impl NodeState {
    fn new(kind: NodeKind) -> Self {
        Self {
            label: String::new(),
            kind,
            wheels: [[0.0; 4]; 4],
            saturation: 1.0,
            tile: Rgba {
                red: 0.0,
                green: 0.0,
                blue: 0.0,
                alpha: 0.0,
            },
            lut: None,
        }
    }
}

const fn wheel_index(wheel: Wheel) -> usize {
    match wheel {
        Wheel::Lift => 0,
        Wheel::Gamma => 1,
        Wheel::Gain => 2,
        Wheel::Contrast => 3,
    }
}

const fn channel_index(channel: Channel) -> usize {
    match channel {
        Channel::Red => 0,
        Channel::Green => 1,
        Channel::Blue => 2,
        Channel::Master => 3,
    }
}

#[derive(Debug)]
struct FolderState {
    name: String,
    clips: IndexMap<String, ClipState>,
    subfolders: IndexMap<String, FolderState>,
}

impl FolderState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            clips: IndexMap::new(),
            subfolders: IndexMap::new(),
        }
    }

    fn descend(&self, path: &[String]) -> Option<&Self> {
        let mut folder = self;
        for segment in path {
            folder = folder.subfolders.get(segment)?;
        }
        Some(folder)
    }

    fn descend_mut(&mut self, path: &[String]) -> Option<&mut Self> {
        let mut folder = self;
        for segment in path {
            folder = folder.subfolders.get_mut(segment)?;
        }
        Some(folder)
    }

    fn collect_clip_names(&self, into: &mut Vec<(Vec<String>, String)>, prefix: &[String]) {
        for name in self.clips.keys() {
            into.push((prefix.to_vec(), name.clone()));
        }
        for (sub_name, sub) in &self.subfolders {
            let mut sub_prefix = prefix.to_vec();
            sub_prefix.push(sub_name.clone());
            sub.collect_clip_names(into, &sub_prefix);
        }
    }

    fn find_by_name(&self, name: &str, prefix: &[String]) -> Option<Vec<String>> {
        if self.name == name {
            return Some(prefix.to_vec());
        }
        for (sub_name, sub) in &self.subfolders {
            let mut sub_prefix = prefix.to_vec();
            sub_prefix.push(sub_name.clone());
            if let Some(found) = sub.find_by_name(name, &sub_prefix) {
                return Some(found);
            }
        }
        None
    }
}

#[derive(Debug)]
struct ClipState {
    duration: u64,
    properties: BTreeMap<String, String>,
}

impl ClipState {
    fn new(duration: u64) -> Self {
        Self {
            duration,
            properties: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
struct RenderState {
    presets: Vec<String>,
    formats: IndexMap<String, Vec<String>>,
    jobs: IndexMap<String, JobState>,
    settings: BTreeMap<String, String>,
    next_job: u32,
}

impl RenderState {
    fn new() -> Self {
        let mut formats = IndexMap::new();
        formats.insert(
            "mp4".to_string(),
            vec!["H.264".to_string(), "H.265".to_string()],
        );
        formats.insert(
            "mov".to_string(),
            vec!["ProRes 422 HQ".to_string(), "DNxHR".to_string()],
        );
        formats.insert("mxf".to_string(), vec!["DNxHD".to_string()]);

        Self {
            presets: vec![
                "YouTube 1080p".to_string(),
                "H.264 Master".to_string(),
                "ProRes Master".to_string(),
            ],
            formats,
            jobs: IndexMap::new(),
            settings: BTreeMap::new(),
            next_job: 1,
        }
    }
}

#[derive(Debug)]
struct JobState {
    name: String,
    timeline: String,
    target_dir: String,
    status: String,
    completion: u8,
}

// ---------------------------------------------------------------------------
// State access helpers
// ---------------------------------------------------------------------------

type Shared = Arc<Mutex<SimState>>;

fn lock(state: &Shared) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl SimState {
    fn project(&self, name: &str) -> HostResult<&ProjectState> {
        self.projects
            .get(name)
            .ok_or_else(|| HostError::call(format!("project '{name}' no longer exists")))
    }

    fn project_mut(&mut self, name: &str) -> HostResult<&mut ProjectState> {
        self.projects
            .get_mut(name)
            .ok_or_else(|| HostError::call(format!("project '{name}' no longer exists")))
    }

    fn timeline(&self, project: &str, timeline: &str) -> HostResult<&TimelineState> {
        self.project(project)?
            .timelines
            .get(timeline)
            .ok_or_else(|| HostError::call(format!("timeline '{timeline}' no longer exists")))
    }

    fn timeline_mut(&mut self, project: &str, timeline: &str) -> HostResult<&mut TimelineState> {
        self.project_mut(project)?
            .timelines
            .get_mut(timeline)
            .ok_or_else(|| HostError::call(format!("timeline '{timeline}' no longer exists")))
    }

    fn item(
        &self,
        project: &str,
        timeline: &str,
        kind: TrackKind,
        track: usize,
        index: usize,
    ) -> HostResult<&ItemState> {
        let tl = self.timeline(project, timeline)?;
        tl.tracks(kind)
            .get(track.wrapping_sub(1))
            .and_then(|items| items.get(index))
            .ok_or_else(|| HostError::call("timeline item no longer exists"))
    }

    fn item_mut(
        &mut self,
        project: &str,
        timeline: &str,
        kind: TrackKind,
        track: usize,
        index: usize,
    ) -> HostResult<&mut ItemState> {
        let tl = self.timeline_mut(project, timeline)?;
        tl.tracks_mut(kind)
            .get_mut(track.wrapping_sub(1))
            .and_then(|items| items.get_mut(index))
            .ok_or_else(|| HostError::call("timeline item no longer exists"))
    }
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

/// The simulated editor application.
pub struct SimulatedEditor {
    state: Shared,
}

impl SimulatedEditor {
    /// An editor with an empty project database and nothing open.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(SimState {
                projects: IndexMap::new(),
                current_project: None,
                current_page: "edit".to_string(),
            })),
        })
    }

    /// Closes the current project, leaving the project database intact.
    pub fn close_current_project(&self) {
        lock(&self.state).current_project = None;
    }

    /// An editor seeded with a demo project, timeline and media, so
    /// `--simulate` runs have something to operate on.
    #[must_use]
    pub fn with_demo_project() -> Arc<Self> {
        let editor = Self::empty();
        {
            let mut state = lock(&editor.state);
            let mut project = ProjectState::new();

            let mut interview = ClipState::new(240);
            interview
                .properties
                .insert("Type".to_string(), "Video".to_string());
            interview
                .properties
                .insert("FPS".to_string(), "24".to_string());
            interview
                .properties
                .insert("Start TC".to_string(), "01:00:00:00".to_string());
            interview
                .properties
                .insert("End TC".to_string(), "01:00:10:00".to_string());
            interview
                .properties
                .insert("File Path".to_string(), "/media/interview_a.mov".to_string());
            project.root.clips.insert("Interview A".to_string(), interview);

            let mut broll = ClipState::new(96);
            broll
                .properties
                .insert("Type".to_string(), "Video".to_string());
            broll.properties.insert("FPS".to_string(), "24".to_string());
            broll
                .properties
                .insert("Start TC".to_string(), "02:00:00:00".to_string());
            project.root.clips.insert("B-Roll 01".to_string(), broll);

            let mut aerials = FolderState::new("Aerials");
            aerials
                .clips
                .insert("Drone Pass".to_string(), ClipState::new(150));
            project.root.subfolders.insert("Aerials".to_string(), aerials);

            if let Some(timeline) = project.timelines.get_mut("Timeline 1") {
                let mut first = ItemState::new("Interview A", 0, 120);
                first.source = Some("Interview A".to_string());
                let mut second = ItemState::new("B-Roll 01", 120, 96);
                second.source = Some("B-Roll 01".to_string());
                timeline.video_tracks[0].push(first);
                timeline.video_tracks[0].push(second);
            }

            state.projects.insert("Demo Project".to_string(), project);
            state.current_project = Some("Demo Project".to_string());
        }
        editor
    }
}

impl Editor for SimulatedEditor {
    fn product_name(&self) -> HostResult<String> {
        Ok("DaVinci Resolve (simulated)".to_string())
    }

    fn product_version(&self) -> HostResult<String> {
        Ok("19.0".to_string())
    }

    fn current_page(&self) -> HostResult<String> {
        Ok(lock(&self.state).current_page.clone())
    }

    fn project_manager(&self) -> HostResult<Handle<dyn ProjectManager>> {
        Ok(Arc::new(SimProjectManager {
            state: Arc::clone(&self.state),
        }))
    }
}

// ---------------------------------------------------------------------------
// Project manager and project
// ---------------------------------------------------------------------------

struct SimProjectManager {
    state: Shared,
}

impl ProjectManager for SimProjectManager {
    fn project_list(&self) -> HostResult<Vec<String>> {
        Ok(lock(&self.state).projects.keys().cloned().collect())
    }

    fn current_project(&self) -> HostResult<Option<Handle<dyn Project>>> {
        let state = lock(&self.state);
        Ok(state.current_project.clone().map(|name| {
            Arc::new(SimProject {
                state: Arc::clone(&self.state),
                project: name,
            }) as Handle<dyn Project>
        }))
    }

    fn create_project(&self, name: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        if state.projects.contains_key(name) {
            return Ok(false);
        }
        state.projects.insert(name.to_string(), ProjectState::new());
        state.current_project = Some(name.to_string());
        Ok(true)
    }

    fn load_project(&self, name: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        if !state.projects.contains_key(name) {
            return Ok(false);
        }
        state.current_project = Some(name.to_string());
        Ok(true)
    }
}

struct SimProject {
    state: Shared,
    project: String,
}

impl SimProject {
    fn timeline_handle(&self, name: String) -> Handle<dyn Timeline> {
        Arc::new(SimTimeline {
            state: Arc::clone(&self.state),
            project: self.project.clone(),
            timeline: name,
        })
    }
}

impl Project for SimProject {
    fn name(&self) -> HostResult<String> {
        lock(&self.state).project(&self.project)?;
        Ok(self.project.clone())
    }

    fn timeline_names(&self) -> HostResult<Vec<String>> {
        let state = lock(&self.state);
        Ok(state.project(&self.project)?.timelines.keys().cloned().collect())
    }

    fn current_timeline(&self) -> HostResult<Option<Handle<dyn Timeline>>> {
        let current = {
            let state = lock(&self.state);
            state.project(&self.project)?.current_timeline.clone()
        };
        Ok(current.map(|name| self.timeline_handle(name)))
    }

    fn timeline_by_index(&self, index: usize) -> HostResult<Option<Handle<dyn Timeline>>> {
        let name = {
            let state = lock(&self.state);
            state
                .project(&self.project)?
                .timelines
                .get_index(index)
                .map(|(name, _)| name.clone())
        };
        Ok(name.map(|name| self.timeline_handle(name)))
    }

    fn media_pool(&self) -> HostResult<Handle<dyn MediaPool>> {
        lock(&self.state).project(&self.project)?;
        Ok(Arc::new(SimMediaPool {
            state: Arc::clone(&self.state),
            project: self.project.clone(),
        }))
    }

    fn setting(&self, key: &str) -> HostResult<String> {
        let state = lock(&self.state);
        Ok(state
            .project(&self.project)?
            .settings
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    fn set_setting(&self, key: &str, value: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        state
            .project_mut(&self.project)?
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn all_settings(&self) -> HostResult<BTreeMap<String, String>> {
        let state = lock(&self.state);
        Ok(state.project(&self.project)?.settings.clone())
    }

    fn render_presets(&self) -> HostResult<Vec<String>> {
        let state = lock(&self.state);
        Ok(state.project(&self.project)?.render.presets.clone())
    }

    fn render_formats(&self) -> HostResult<Vec<String>> {
        let state = lock(&self.state);
        Ok(state
            .project(&self.project)?
            .render
            .formats
            .keys()
            .cloned()
            .collect())
    }

    fn render_codecs(&self, format: &str) -> HostResult<Vec<String>> {
        let state = lock(&self.state);
        Ok(state
            .project(&self.project)?
            .render
            .formats
            .get(format)
            .cloned()
            .unwrap_or_default())
    }

    fn render_jobs(&self) -> HostResult<Vec<RenderJob>> {
        let state = lock(&self.state);
        Ok(state
            .project(&self.project)?
            .render
            .jobs
            .iter()
            .map(|(id, job)| RenderJob {
                id: id.clone(),
                name: job.name.clone(),
                timeline: job.timeline.clone(),
                target_dir: job.target_dir.clone(),
                status: job.status.clone(),
            })
            .collect())
    }

    fn load_render_preset(&self, name: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let render = &mut state.project_mut(&self.project)?.render;
        if !render.presets.iter().any(|p| p == name) {
            return Ok(false);
        }
        render.settings.insert("Preset".to_string(), name.to_string());
        Ok(true)
    }

    fn set_render_settings(&self, settings: &BTreeMap<String, String>) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let render = &mut state.project_mut(&self.project)?.render;
        for (key, value) in settings {
            render.settings.insert(key.clone(), value.clone());
        }
        Ok(true)
    }

    fn add_render_job(&self) -> HostResult<String> {
        let mut state = lock(&self.state);
        let project = state.project_mut(&self.project)?;
        let timeline = project
            .current_timeline
            .clone()
            .ok_or_else(|| HostError::call("no timeline to render"))?;
        let id = format!("job-{}", project.render.next_job);
        project.render.next_job += 1;
        let name = project
            .render
            .settings
            .get("CustomName")
            .cloned()
            .unwrap_or_else(|| timeline.clone());
        let target_dir = project
            .render
            .settings
            .get("TargetDir")
            .cloned()
            .unwrap_or_default();
        project.render.jobs.insert(
            id.clone(),
            JobState {
                name,
                timeline,
                target_dir,
                status: "Ready".to_string(),
                completion: 0,
            },
        );
        Ok(id)
    }

    fn delete_render_job(&self, job_id: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let render = &mut state.project_mut(&self.project)?.render;
        Ok(render.jobs.shift_remove(job_id).is_some())
    }

    fn start_rendering(&self, job_ids: &[String], _interactive: bool) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let render = &mut state.project_mut(&self.project)?.render;
        let mut any = false;
        for id in job_ids {
            if let Some(job) = render.jobs.get_mut(id) {
                // The simulated render completes immediately.
                job.status = "Complete".to_string();
                job.completion = 100;
                any = true;
            }
        }
        Ok(any)
    }

    fn stop_rendering(&self) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let render = &mut state.project_mut(&self.project)?.render;
        for job in render.jobs.values_mut() {
            if job.status == "Rendering" {
                job.status = "Ready".to_string();
            }
        }
        Ok(true)
    }

    fn render_job_status(&self, job_id: &str) -> HostResult<RenderJobStatus> {
        let state = lock(&self.state);
        let render = &state.project(&self.project)?.render;
        render.jobs.get(job_id).map_or_else(
            || Err(HostError::call(format!("render job '{job_id}' not found"))),
            |job| {
                Ok(RenderJobStatus {
                    status: job.status.clone(),
                    completion_percentage: job.completion,
                })
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Timeline and items
// ---------------------------------------------------------------------------

struct SimTimeline {
    state: Shared,
    project: String,
    timeline: String,
}

impl SimTimeline {
    fn item_handle(&self, kind: TrackKind, track: usize, index: usize) -> Handle<dyn TimelineItem> {
        Arc::new(SimTimelineItem {
            state: Arc::clone(&self.state),
            project: self.project.clone(),
            timeline: self.timeline.clone(),
            kind,
            track,
            index,
        })
    }
}

impl Timeline for SimTimeline {
    fn name(&self) -> HostResult<String> {
        lock(&self.state).timeline(&self.project, &self.timeline)?;
        Ok(self.timeline.clone())
    }

    fn track_count(&self, kind: TrackKind) -> HostResult<usize> {
        let state = lock(&self.state);
        Ok(state.timeline(&self.project, &self.timeline)?.tracks(kind).len())
    }

    fn items_in_track(
        &self,
        kind: TrackKind,
        index: usize,
    ) -> HostResult<Vec<Handle<dyn TimelineItem>>> {
        let count = {
            let state = lock(&self.state);
            let tl = state.timeline(&self.project, &self.timeline)?;
            tl.tracks(kind).get(index.wrapping_sub(1)).map_or(0, Vec::len)
        };
        Ok((0..count).map(|i| self.item_handle(kind, index, i)).collect())
    }

    fn start_frame(&self) -> HostResult<u64> {
        let state = lock(&self.state);
        Ok(state.timeline(&self.project, &self.timeline)?.start_frame)
    }

    fn current_timecode(&self) -> HostResult<String> {
        let state = lock(&self.state);
        let tl = state.timeline(&self.project, &self.timeline)?;
        let fps: u64 = state
            .project(&self.project)?
            .settings
            .get("timelineFrameRate")
            .and_then(|v| v.parse().ok())
            .unwrap_or(24);
        let total_seconds = tl.playhead / fps;
        Ok(format!(
            "{:02}:{:02}:{:02}:{:02}",
            total_seconds / 3600,
            (total_seconds % 3600) / 60,
            total_seconds % 60,
            tl.playhead % fps
        ))
    }

    fn set_current_timecode(&self, timecode: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let fps: u64 = state
            .project(&self.project)?
            .settings
            .get("timelineFrameRate")
            .and_then(|v| v.parse().ok())
            .unwrap_or(24);
        let parts: Vec<u64> = timecode.split(':').filter_map(|p| p.parse().ok()).collect();
        if parts.len() != 4 {
            return Ok(false);
        }
        let frames = (parts[0] * 3600 + parts[1] * 60 + parts[2]) * fps + parts[3];
        state.timeline_mut(&self.project, &self.timeline)?.playhead = frames;
        Ok(true)
    }

    fn current_video_item(&self) -> HostResult<Option<Handle<dyn TimelineItem>>> {
        let found = {
            let state = lock(&self.state);
            let tl = state.timeline(&self.project, &self.timeline)?;
            let track = tl.video_tracks.first();
            track.and_then(|items| {
                items
                    .iter()
                    .position(|item| {
                        item.start <= tl.playhead && tl.playhead < item.start + item.duration
                    })
                    .or_else(|| if items.is_empty() { None } else { Some(0) })
            })
        };
        Ok(found.map(|index| self.item_handle(TrackKind::Video, 1, index)))
    }

    fn set_selection(&self, items: &[Handle<dyn TimelineItem>]) -> HostResult<bool> {
        let names: Vec<String> = items
            .iter()
            .map(|item| item.name())
            .collect::<HostResult<_>>()?;
        let mut state = lock(&self.state);
        state.timeline_mut(&self.project, &self.timeline)?.selection = names;
        Ok(true)
    }

    fn export(&self, path: &Path, format: ExportFormat) -> HostResult<bool> {
        let contents = {
            let state = lock(&self.state);
            let tl = state.timeline(&self.project, &self.timeline)?;
            match format {
                ExportFormat::Edl => {
                    let mut text = format!("TITLE: {}\nFCM: NON-DROP FRAME\n\n", self.timeline);
                    for (i, item) in tl.video_tracks.iter().flatten().enumerate() {
                        text.push_str(&format!("{:03}  {}  V  C\n", i + 1, item.name));
                    }
                    text
                }
                ExportFormat::Xml | ExportFormat::Fcpxml => format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<timeline name=\"{}\"/>\n",
                    self.timeline
                ),
                ExportFormat::Aaf => format!("AAF {}\n", self.timeline),
            }
        };
        std::fs::write(path, contents)
            .map_err(|e| HostError::call(format!("export failed: {e}")))?;
        Ok(true)
    }

    fn setting(&self, key: &str) -> HostResult<String> {
        let state = lock(&self.state);
        let tl = state.timeline(&self.project, &self.timeline)?;
        if let Some(value) = tl.settings.get(key) {
            return Ok(value.clone());
        }
        // Unset timeline settings inherit from the project.
        Ok(state
            .project(&self.project)?
            .settings
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    fn set_setting(&self, key: &str, value: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        state
            .timeline_mut(&self.project, &self.timeline)?
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn markers(&self) -> HostResult<Vec<Marker>> {
        let state = lock(&self.state);
        let tl = state.timeline(&self.project, &self.timeline)?;
        Ok(tl.markers.values().cloned().collect())
    }

    fn add_marker(&self, marker: &Marker) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let tl = state.timeline_mut(&self.project, &self.timeline)?;
        if tl.markers.contains_key(&marker.frame) {
            return Ok(false);
        }
        tl.markers.insert(marker.frame, marker.clone());
        Ok(true)
    }

    fn delete_marker_at_frame(&self, frame: u64) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let tl = state.timeline_mut(&self.project, &self.timeline)?;
        Ok(tl.markers.remove(&frame).is_some())
    }

    fn delete_markers_by_color(&self, color: MarkerColor) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let tl = state.timeline_mut(&self.project, &self.timeline)?;
        tl.markers.retain(|_, marker| marker.color != color);
        Ok(true)
    }
}

struct SimTimelineItem {
    state: Shared,
    project: String,
    timeline: String,
    kind: TrackKind,
    track: usize,
    index: usize,
}

impl SimTimelineItem {
    fn read<T>(&self, f: impl FnOnce(&ItemState) -> T) -> HostResult<T> {
        let state = lock(&self.state);
        let item = state.item(&self.project, &self.timeline, self.kind, self.track, self.index)?;
        Ok(f(item))
    }
}

impl TimelineItem for SimTimelineItem {
    fn name(&self) -> HostResult<String> {
        self.read(|item| item.name.clone())
    }

    fn duration(&self) -> HostResult<u64> {
        self.read(|item| item.duration)
    }

    fn start(&self) -> HostResult<u64> {
        self.read(|item| item.start)
    }

    fn end(&self) -> HostResult<u64> {
        self.read(|item| item.start + item.duration)
    }

    fn left_offset(&self) -> HostResult<u64> {
        self.read(|item| item.left_offset)
    }

    fn add_flag(&self, color: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let item =
            state.item_mut(&self.project, &self.timeline, self.kind, self.track, self.index)?;
        if !item.flags.iter().any(|f| f == color) {
            item.flags.push(color.to_string());
        }
        Ok(true)
    }

    fn media_pool_item(&self) -> HostResult<Option<Handle<dyn MediaPoolItem>>> {
        let source = self.read(|item| item.source.clone())?;
        let Some(name) = source else {
            return Ok(None);
        };
        // Resolve the linked clip to its current folder.
        let path = {
            let state = lock(&self.state);
            let project = state.project(&self.project)?;
            let mut clips = Vec::new();
            project.root.collect_clip_names(&mut clips, &[]);
            clips.into_iter().find(|(_, clip)| *clip == name)
        };
        Ok(path.map(|(folder, clip)| {
            Arc::new(SimMediaClip {
                state: Arc::clone(&self.state),
                project: self.project.clone(),
                folder,
                clip,
            }) as Handle<dyn MediaPoolItem>
        }))
    }

    fn node_graph(&self) -> HostResult<Handle<dyn NodeGraph>> {
        self.read(|_| ())?;
        Ok(Arc::new(SimNodeGraph {
            state: Arc::clone(&self.state),
            project: self.project.clone(),
            timeline: self.timeline.clone(),
            kind: self.kind,
            track: self.track,
            index: self.index,
        }))
    }
}

// ---------------------------------------------------------------------------
// Media pool
// ---------------------------------------------------------------------------

struct SimMediaPool {
    state: Shared,
    project: String,
}

impl SimMediaPool {
    fn folder_handle(&self, path: Vec<String>) -> Handle<dyn Folder> {
        Arc::new(SimFolder {
            state: Arc::clone(&self.state),
            project: self.project.clone(),
            path,
            smart_bin: None,
        })
    }

    fn clip_handle(&self, folder: Vec<String>, clip: String) -> Handle<dyn MediaPoolItem> {
        Arc::new(SimMediaClip {
            state: Arc::clone(&self.state),
            project: self.project.clone(),
            folder,
            clip,
        })
    }
}

/// Recovers the sim path of a folder handle created by this pool.
///
/// Smart-bin handles have no tree path and are rejected, matching the
/// editor's refusal to treat smart bins as real folders.
fn folder_path(folder: &Handle<dyn Folder>) -> HostResult<Vec<String>> {
    folder
        .as_any()
        .downcast_ref::<SimFolder>()
        .and_then(SimFolder::sim_path_inner)
        .ok_or_else(|| HostError::call("folder handle does not belong to this media pool"))
}

/// Recovers the sim location of a clip handle created by this pool.
fn clip_location(clip: &Handle<dyn MediaPoolItem>) -> Option<(Vec<String>, String)> {
    clip.as_any()
        .downcast_ref::<SimMediaClip>()
        .map(|clip| (clip.folder.clone(), clip.clip.clone()))
}

impl MediaPool for SimMediaPool {
    fn root_folder(&self) -> HostResult<Handle<dyn Folder>> {
        lock(&self.state).project(&self.project)?;
        Ok(self.folder_handle(Vec::new()))
    }

    fn current_folder(&self) -> HostResult<Option<Handle<dyn Folder>>> {
        let path = {
            let state = lock(&self.state);
            state.project(&self.project)?.current_folder_path.clone()
        };
        Ok(Some(self.folder_handle(path)))
    }

    fn set_current_folder(&self, folder: &Handle<dyn Folder>) -> HostResult<bool> {
        let path = folder_path(folder)?;
        let mut state = lock(&self.state);
        let project = state.project_mut(&self.project)?;
        if project.root.descend(&path).is_none() {
            return Ok(false);
        }
        project.current_folder_path = path;
        Ok(true)
    }

    fn add_subfolder(
        &self,
        parent: &Handle<dyn Folder>,
        name: &str,
    ) -> HostResult<Option<Handle<dyn Folder>>> {
        let parent_path = folder_path(parent)?;
        let mut state = lock(&self.state);
        let project = state.project_mut(&self.project)?;
        let Some(folder) = project.root.descend_mut(&parent_path) else {
            return Ok(None);
        };
        if folder.subfolders.contains_key(name) {
            return Ok(None);
        }
        folder
            .subfolders
            .insert(name.to_string(), FolderState::new(name));
        drop(state);
        let mut path = parent_path;
        path.push(name.to_string());
        Ok(Some(self.folder_handle(path)))
    }

    fn move_clips(
        &self,
        clips: &[Handle<dyn MediaPoolItem>],
        destination: &Handle<dyn Folder>,
    ) -> HostResult<bool> {
        let dest_path = folder_path(destination)?;
        let sources: Vec<(Vec<String>, String)> = clips.iter().filter_map(clip_location).collect();
        if sources.len() != clips.len() {
            return Err(HostError::call(
                "clip handle does not belong to this media pool",
            ));
        }
        let mut state = lock(&self.state);
        let project = state.project_mut(&self.project)?;
        if project.root.descend(&dest_path).is_none() {
            return Ok(false);
        }
        let mut moved = Vec::new();
        for (folder, clip) in sources {
            let Some(source_folder) = project.root.descend_mut(&folder) else {
                continue;
            };
            if let Some(clip_state) = source_folder.clips.shift_remove(&clip) {
                moved.push((clip, clip_state));
            }
        }
        if moved.is_empty() {
            return Ok(false);
        }
        let dest = project
            .root
            .descend_mut(&dest_path)
            .ok_or_else(|| HostError::call("destination folder no longer exists"))?;
        for (name, clip_state) in moved {
            dest.clips.insert(name, clip_state);
        }
        Ok(true)
    }

    fn append_to_timeline(&self, clips: &[Handle<dyn MediaPoolItem>]) -> HostResult<bool> {
        let additions: Vec<(String, u64)> = clips
            .iter()
            .map(|clip| Ok((clip.name()?, clip.duration()?)))
            .collect::<HostResult<_>>()?;
        let mut state = lock(&self.state);
        let project = state.project_mut(&self.project)?;
        let Some(timeline_name) = project.current_timeline.clone() else {
            return Ok(false);
        };
        let timeline = project
            .timelines
            .get_mut(&timeline_name)
            .ok_or_else(|| HostError::call("current timeline no longer exists"))?;
        let track = timeline
            .video_tracks
            .first_mut()
            .ok_or_else(|| HostError::call("timeline has no video tracks"))?;
        let mut cursor = track.last().map_or(0, |item| item.start + item.duration);
        for (name, duration) in additions {
            let mut item = ItemState::new(&name, cursor, duration);
            item.source = Some(name);
            cursor += duration;
            track.push(item);
        }
        Ok(true)
    }

    fn import_media(&self, paths: &[&Path]) -> HostResult<Vec<Handle<dyn MediaPoolItem>>> {
        let mut state = lock(&self.state);
        let project = state.project_mut(&self.project)?;
        let current = project.current_folder_path.clone();
        let fps = project
            .settings
            .get("timelineFrameRate")
            .cloned()
            .unwrap_or_else(|| "24".to_string());
        let folder = project
            .root
            .descend_mut(&current)
            .ok_or_else(|| HostError::call("current folder no longer exists"))?;
        let mut imported = Vec::new();
        for path in paths {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());
            let mut clip = ClipState::new(100);
            clip.properties
                .insert("File Path".to_string(), path.to_string_lossy().into_owned());
            clip.properties.insert("Type".to_string(), "Video".to_string());
            clip.properties.insert("FPS".to_string(), fps.clone());
            folder.clips.insert(name.clone(), clip);
            imported.push(name);
        }
        drop(state);
        Ok(imported
            .into_iter()
            .map(|name| self.clip_handle(current.clone(), name))
            .collect())
    }

    fn folder_by_name(&self, name: &str) -> HostResult<Option<Handle<dyn Folder>>> {
        let state = lock(&self.state);
        let project = state.project(&self.project)?;
        if project.smart_bins.contains_key(name) {
            return Ok(Some(Arc::new(SimFolder {
                state: Arc::clone(&self.state),
                project: self.project.clone(),
                path: Vec::new(),
                smart_bin: Some(name.to_string()),
            })));
        }
        let found = if project.root.name == name {
            Some(Vec::new())
        } else {
            project.root.find_by_name(name, &[])
        };
        drop(state);
        Ok(found.map(|path| self.folder_handle(path)))
    }

    fn create_smart_bin(&self, name: &str, query: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let project = state.project_mut(&self.project)?;
        if project.smart_bins.contains_key(name) {
            return Ok(false);
        }
        project.smart_bins.insert(name.to_string(), query.to_string());
        Ok(true)
    }

    fn delete_smart_bin(&self, name: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let project = state.project_mut(&self.project)?;
        Ok(project.smart_bins.shift_remove(name).is_some())
    }
}

struct SimFolder {
    state: Shared,
    project: String,
    path: Vec<String>,
    /// When set, this handle is a smart bin rather than a real folder.
    smart_bin: Option<String>,
}

impl SimFolder {
    fn sim_path_inner(&self) -> Option<Vec<String>> {
        if self.smart_bin.is_some() {
            None
        } else {
            Some(self.path.clone())
        }
    }
}

impl Folder for SimFolder {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn name(&self) -> HostResult<String> {
        if let Some(bin) = &self.smart_bin {
            return Ok(bin.clone());
        }
        let state = lock(&self.state);
        let project = state.project(&self.project)?;
        let folder = project
            .root
            .descend(&self.path)
            .ok_or_else(|| HostError::call("folder no longer exists"))?;
        Ok(folder.name.clone())
    }

    fn clips(&self) -> HostResult<Vec<Handle<dyn MediaPoolItem>>> {
        let state = lock(&self.state);
        let project = state.project(&self.project)?;
        let locations: Vec<(Vec<String>, String)> = if self.smart_bin.is_some() {
            // Smart bins match across the whole pool.
            let mut clips = Vec::new();
            project.root.collect_clip_names(&mut clips, &[]);
            clips
        } else {
            let folder = project
                .root
                .descend(&self.path)
                .ok_or_else(|| HostError::call("folder no longer exists"))?;
            folder
                .clips
                .keys()
                .map(|name| (self.path.clone(), name.clone()))
                .collect()
        };
        drop(state);
        Ok(locations
            .into_iter()
            .map(|(folder, clip)| {
                Arc::new(SimMediaClip {
                    state: Arc::clone(&self.state),
                    project: self.project.clone(),
                    folder,
                    clip,
                }) as Handle<dyn MediaPoolItem>
            })
            .collect())
    }

    fn subfolders(&self) -> HostResult<Vec<Handle<dyn Folder>>> {
        if self.smart_bin.is_some() {
            return Ok(Vec::new());
        }
        let names = {
            let state = lock(&self.state);
            let project = state.project(&self.project)?;
            let folder = project
                .root
                .descend(&self.path)
                .ok_or_else(|| HostError::call("folder no longer exists"))?;
            folder.subfolders.keys().cloned().collect::<Vec<_>>()
        };
        Ok(names
            .into_iter()
            .map(|name| {
                let mut path = self.path.clone();
                path.push(name);
                Arc::new(SimFolder {
                    state: Arc::clone(&self.state),
                    project: self.project.clone(),
                    path,
                    smart_bin: None,
                }) as Handle<dyn Folder>
            })
            .collect())
    }
}

struct SimMediaClip {
    state: Shared,
    project: String,
    folder: Vec<String>,
    clip: String,
}

impl SimMediaClip {
    fn read<T>(&self, f: impl FnOnce(&ClipState) -> T) -> HostResult<T> {
        let state = lock(&self.state);
        let project = state.project(&self.project)?;
        let folder = project
            .root
            .descend(&self.folder)
            .ok_or_else(|| HostError::call("folder no longer exists"))?;
        let clip = folder
            .clips
            .get(&self.clip)
            .ok_or_else(|| HostError::call(format!("clip '{}' no longer exists", self.clip)))?;
        Ok(f(clip))
    }
}

impl MediaPoolItem for SimMediaClip {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn name(&self) -> HostResult<String> {
        self.read(|_| ())?;
        Ok(self.clip.clone())
    }

    fn duration(&self) -> HostResult<u64> {
        self.read(|clip| clip.duration)
    }

    fn clip_property(&self, key: &str) -> HostResult<String> {
        self.read(|clip| clip.properties.get(key).cloned().unwrap_or_default())
    }

    fn set_clip_property(&self, key: &str, value: &str) -> HostResult<bool> {
        let mut state = lock(&self.state);
        let project = state.project_mut(&self.project)?;
        let folder = project
            .root
            .descend_mut(&self.folder)
            .ok_or_else(|| HostError::call("folder no longer exists"))?;
        let clip = folder
            .clips
            .get_mut(&self.clip)
            .ok_or_else(|| HostError::call(format!("clip '{}' no longer exists", self.clip)))?;
        clip.properties.insert(key.to_string(), value.to_string());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Node graph
// ---------------------------------------------------------------------------

struct SimNodeGraph {
    state: Shared,
    project: String,
    timeline: String,
    kind: TrackKind,
    track: usize,
    index: usize,
}

impl SimNodeGraph {
    fn read<T>(&self, f: impl FnOnce(&GraphState) -> HostResult<T>) -> HostResult<T> {
        let state = lock(&self.state);
        let item = state.item(&self.project, &self.timeline, self.kind, self.track, self.index)?;
        f(&item.graph)
    }

    fn write<T>(&self, f: impl FnOnce(&mut GraphState) -> HostResult<T>) -> HostResult<T> {
        let mut state = lock(&self.state);
        let item =
            state.item_mut(&self.project, &self.timeline, self.kind, self.track, self.index)?;
        f(&mut item.graph)
    }
}

fn node_at(graph: &GraphState, index: usize) -> HostResult<&NodeState> {
    graph
        .nodes
        .get(index.wrapping_sub(1))
        .ok_or_else(|| HostError::call(format!("no node at index {index}")))
}

fn node_at_mut(graph: &mut GraphState, index: usize) -> HostResult<&mut NodeState> {
    graph
        .nodes
        .get_mut(index.wrapping_sub(1))
        .ok_or_else(|| HostError::call(format!("no node at index {index}")))
}

impl NodeGraph for SimNodeGraph {
    fn node_count(&self) -> HostResult<usize> {
        self.read(|graph| Ok(graph.nodes.len()))
    }

    fn current_node_index(&self) -> HostResult<usize> {
        self.read(|graph| Ok(graph.current))
    }

    fn set_current_node_index(&self, index: usize) -> HostResult<bool> {
        self.write(|graph| {
            if index == 0 || index > graph.nodes.len() {
                return Ok(false);
            }
            graph.current = index;
            Ok(true)
        })
    }

    fn node_label(&self, index: usize) -> HostResult<String> {
        self.read(|graph| Ok(node_at(graph, index)?.label.clone()))
    }

    fn set_node_label(&self, index: usize, label: &str) -> HostResult<bool> {
        self.write(|graph| {
            node_at_mut(graph, index)?.label = label.to_string();
            Ok(true)
        })
    }

    fn node_kind(&self, index: usize) -> HostResult<NodeKind> {
        self.read(|graph| Ok(node_at(graph, index)?.kind))
    }

    fn add_serial_node(&self) -> HostResult<usize> {
        self.write(|graph| {
            let at = graph.current;
            graph.nodes.insert(at, NodeState::new(NodeKind::Serial));
            graph.current = at + 1;
            Ok(graph.current)
        })
    }

    fn add_parallel_node(&self) -> HostResult<usize> {
        self.write(|graph| {
            graph.nodes.push(NodeState::new(NodeKind::Parallel));
            graph.current = graph.nodes.len();
            Ok(graph.current)
        })
    }

    fn add_layer_node(&self) -> HostResult<usize> {
        self.write(|graph| {
            graph.nodes.push(NodeState::new(NodeKind::Layer));
            graph.current = graph.nodes.len();
            Ok(graph.current)
        })
    }

    fn delete_current_node(&self) -> HostResult<bool> {
        self.write(|graph| {
            if graph.current <= 1 || graph.current > graph.nodes.len() {
                return Ok(false);
            }
            graph.nodes.remove(graph.current - 1);
            graph.current = graph.current.min(graph.nodes.len()).max(1);
            Ok(true)
        })
    }

    fn reset_current_node(&self) -> HostResult<bool> {
        self.write(|graph| {
            let current = graph.current;
            let node = node_at_mut(graph, current)?;
            let kind = node.kind;
            *node = NodeState::new(kind);
            Ok(true)
        })
    }

    fn wheel(&self, wheel: Wheel, channel: Channel) -> HostResult<f64> {
        self.read(|graph| {
            let node = node_at(graph, graph.current)?;
            Ok(node.wheels[wheel_index(wheel)][channel_index(channel)])
        })
    }

    fn set_wheel(&self, wheel: Wheel, channel: Channel, value: f64) -> HostResult<bool> {
        self.write(|graph| {
            let current = graph.current;
            let node = node_at_mut(graph, current)?;
            node.wheels[wheel_index(wheel)][channel_index(channel)] = value;
            Ok(true)
        })
    }

    fn saturation(&self) -> HostResult<f64> {
        self.read(|graph| Ok(node_at(graph, graph.current)?.saturation))
    }

    fn set_saturation(&self, value: f64) -> HostResult<bool> {
        self.write(|graph| {
            let current = graph.current;
            node_at_mut(graph, current)?.saturation = value;
            Ok(true)
        })
    }

    fn tile_color(&self) -> HostResult<Rgba> {
        self.read(|graph| Ok(node_at(graph, graph.current)?.tile))
    }

    fn set_tile_color(&self, color: Rgba) -> HostResult<bool> {
        self.write(|graph| {
            let current = graph.current;
            node_at_mut(graph, current)?.tile = color.clamped();
            Ok(true)
        })
    }

    fn import_lut(&self, path: &Path) -> HostResult<bool> {
        self.write(|graph| {
            let current = graph.current;
            node_at_mut(graph, current)?.lut = Some(path.to_string_lossy().into_owned());
            Ok(true)
        })
    }

    fn apply_lut(&self, path: &Path) -> HostResult<bool> {
        self.import_lut(path)
    }
}
