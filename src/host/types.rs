//! Value types shared across the host seam.

use serde::{Deserialize, Serialize};

/// The sixteen marker colours the editor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerColor {
    Blue,
    Cyan,
    Green,
    Yellow,
    Red,
    Pink,
    Purple,
    Fuchsia,
    Rose,
    Lavender,
    Sky,
    Mint,
    Lemon,
    Sand,
    Cocoa,
    Cream,
}

impl MarkerColor {
    /// Every valid marker colour, in the editor's palette order.
    pub const ALL: [Self; 16] = [
        Self::Blue,
        Self::Cyan,
        Self::Green,
        Self::Yellow,
        Self::Red,
        Self::Pink,
        Self::Purple,
        Self::Fuchsia,
        Self::Rose,
        Self::Lavender,
        Self::Sky,
        Self::Mint,
        Self::Lemon,
        Self::Sand,
        Self::Cocoa,
        Self::Cream,
    ];

    /// The colour's display name as the editor spells it.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Blue => "Blue",
            Self::Cyan => "Cyan",
            Self::Green => "Green",
            Self::Yellow => "Yellow",
            Self::Red => "Red",
            Self::Pink => "Pink",
            Self::Purple => "Purple",
            Self::Fuchsia => "Fuchsia",
            Self::Rose => "Rose",
            Self::Lavender => "Lavender",
            Self::Sky => "Sky",
            Self::Mint => "Mint",
            Self::Lemon => "Lemon",
            Self::Sand => "Sand",
            Self::Cocoa => "Cocoa",
            Self::Cream => "Cream",
        }
    }

    /// Case-insensitive lookup ("blue", "BLUE" and "Blue" all match).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Comma-separated list of valid colour names for error messages.
    #[must_use]
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A timeline marker.
///
/// Markers live inside the editor's timeline object; this layer never
/// caches them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// Frame the marker sits on.
    pub frame: u64,
    /// Marker colour.
    pub color: MarkerColor,
    /// Short display name.
    #[serde(default)]
    pub name: String,
    /// Free-form note text.
    #[serde(default)]
    pub note: String,
    /// Duration in frames, at least 1.
    #[serde(default = "default_marker_duration")]
    pub duration: u64,
    /// Opaque client data carried with the marker.
    #[serde(rename = "customData", default)]
    pub custom_data: String,
}

const fn default_marker_duration() -> u64 {
    1
}

/// Timeline track kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// Timeline interchange formats the editor can export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xml,
    Edl,
    Aaf,
    Fcpxml,
}

impl ExportFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Edl => "edl",
            Self::Aaf => "aaf",
            Self::Fcpxml => "fcpxml",
        }
    }

    /// File extension for the format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        self.as_str()
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "xml" => Some(Self::Xml),
            "edl" => Some(Self::Edl),
            "aaf" => Some(Self::Aaf),
            "fcpxml" => Some(Self::Fcpxml),
            _ => None,
        }
    }
}

/// Colour-graph node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Serial,
    Parallel,
    Layer,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serial => "Serial",
            Self::Parallel => "Parallel",
            Self::Layer => "Layer",
        }
    }
}

/// The four primary-correction wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    Lift,
    Gamma,
    Gain,
    Contrast,
}

impl Wheel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lift => "lift",
            Self::Gamma => "gamma",
            Self::Gain => "gain",
            Self::Contrast => "contrast",
        }
    }
}

/// Per-wheel colour channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Master,
}

impl Channel {
    /// All channels, in serialisation order.
    pub const ALL: [Self; 4] = [Self::Red, Self::Green, Self::Blue, Self::Master];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Master => "master",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "red" => Some(Self::Red),
            "green" => Some(Self::Green),
            "blue" => Some(Self::Blue),
            "master" => Some(Self::Master),
            _ => None,
        }
    }
}

/// An RGBA tile colour, each component in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Rgba {
    /// Clamps each component into `0.0..=1.0`.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            red: self.red.clamp(0.0, 1.0),
            green: self.green.clamp(0.0, 1.0),
            blue: self.blue.clamp(0.0, 1.0),
            alpha: self.alpha.clamp(0.0, 1.0),
        }
    }
}

/// A queued render job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    /// Job identifier assigned by the editor.
    pub id: String,
    /// Display name of the job.
    pub name: String,
    /// Timeline the job renders.
    pub timeline: String,
    /// Target directory for the output file.
    pub target_dir: String,
    /// Current status string.
    pub status: String,
}

/// Progress of a render job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJobStatus {
    /// Status string ("Ready", "Rendering", "Complete", "Failed").
    pub status: String,
    /// Completion percentage, 0-100.
    pub completion_percentage: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_color_parse_is_case_insensitive() {
        assert_eq!(MarkerColor::parse("blue"), Some(MarkerColor::Blue));
        assert_eq!(MarkerColor::parse("FUCHSIA"), Some(MarkerColor::Fuchsia));
        assert_eq!(MarkerColor::parse("Cocoa"), Some(MarkerColor::Cocoa));
        assert_eq!(MarkerColor::parse("teal"), None);
    }

    #[test]
    fn marker_color_name_round_trips() {
        for color in MarkerColor::ALL {
            assert_eq!(MarkerColor::parse(color.name()), Some(color));
        }
    }

    #[test]
    fn marker_deserialises_with_defaults() {
        let marker: Marker = serde_json::from_str(r#"{"frame": 10, "color": "Sky"}"#).unwrap();
        assert_eq!(marker.frame, 10);
        assert_eq!(marker.color, MarkerColor::Sky);
        assert_eq!(marker.duration, 1);
        assert!(marker.name.is_empty());
        assert!(marker.custom_data.is_empty());
    }

    #[test]
    fn export_format_parse_accepts_any_case() {
        assert_eq!(ExportFormat::parse("XML"), Some(ExportFormat::Xml));
        assert_eq!(ExportFormat::parse("fcpxml"), Some(ExportFormat::Fcpxml));
        assert_eq!(ExportFormat::parse("mov"), None);
    }

    #[test]
    fn rgba_clamps_out_of_range_components() {
        let color = Rgba {
            red: 1.5,
            green: -0.2,
            blue: 0.5,
            alpha: 2.0,
        }
        .clamped();
        assert!((color.red - 1.0).abs() < f64::EPSILON);
        assert!(color.green.abs() < f64::EPSILON);
        assert!((color.blue - 0.5).abs() < f64::EPSILON);
        assert!((color.alpha - 1.0).abs() < f64::EPSILON);
    }
}
