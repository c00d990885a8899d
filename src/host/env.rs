//! Vendor environment contract for the editor's scripting binding.
//!
//! The editor locates its scripting support through two environment
//! variables, `RESOLVE_SCRIPT_API` and `RESOLVE_SCRIPT_LIB`, whose default
//! values are OS-dependent install paths. This module resolves those
//! defaults, honours values already present in the environment, and checks
//! whether the scripting library actually exists on disk.

use std::path::{Path, PathBuf};

/// Environment variable naming the scripting API directory.
pub const SCRIPT_API_VAR: &str = "RESOLVE_SCRIPT_API";

/// Environment variable naming the scripting library file.
pub const SCRIPT_LIB_VAR: &str = "RESOLVE_SCRIPT_LIB";

/// Resolved locations of the vendor scripting support.
#[derive(Debug, Clone)]
pub struct Discovered {
    /// Directory containing the scripting API modules.
    pub script_api: PathBuf,
    /// The scripting library file.
    pub script_lib: PathBuf,
    /// Whether the library file exists on disk.
    pub library_present: bool,
}

/// Platform-default install locations for the scripting support.
#[must_use]
pub fn default_paths() -> (PathBuf, PathBuf) {
    #[cfg(target_os = "macos")]
    {
        (
            PathBuf::from(
                "/Library/Application Support/Blackmagic Design/DaVinci Resolve/Developer/Scripting",
            ),
            PathBuf::from(
                "/Applications/DaVinci Resolve/DaVinci Resolve.app/Contents/Libraries/Fusion/fusionscript.so",
            ),
        )
    }

    #[cfg(target_os = "windows")]
    {
        let program_data =
            std::env::var_os("PROGRAMDATA").map_or_else(|| PathBuf::from(r"C:\ProgramData"), PathBuf::from);
        (
            program_data.join(r"Blackmagic Design\DaVinci Resolve\Support\Developer\Scripting"),
            PathBuf::from(r"C:\Program Files\Blackmagic Design\DaVinci Resolve\fusionscript.dll"),
        )
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        // Standard Linux install, falling back to the ISO-image layout.
        let standard = Path::new("/opt/resolve/Developer/Scripting");
        if standard.exists() {
            (
                standard.to_path_buf(),
                PathBuf::from("/opt/resolve/libs/Fusion/fusionscript.so"),
            )
        } else {
            (
                PathBuf::from("/home/resolve/Developer/Scripting"),
                PathBuf::from("/home/resolve/libs/Fusion/fusionscript.so"),
            )
        }
    }
}

/// Resolves the scripting locations, preferring explicit environment
/// variables over the platform defaults.
#[must_use]
pub fn discover() -> Discovered {
    let (default_api, default_lib) = default_paths();

    let script_api = std::env::var_os(SCRIPT_API_VAR).map_or(default_api, PathBuf::from);
    let script_lib = std::env::var_os(SCRIPT_LIB_VAR).map_or(default_lib, PathBuf::from);
    let library_present = script_lib.exists();

    Discovered {
        script_api,
        script_lib,
        library_present,
    }
}

/// Publishes the discovered locations into the process environment so a
/// vendor binding loaded later finds them where it expects.
pub fn prepare(discovered: &Discovered) {
    if std::env::var_os(SCRIPT_API_VAR).is_none() {
        std::env::set_var(SCRIPT_API_VAR, &discovered.script_api);
    }
    if std::env::var_os(SCRIPT_LIB_VAR).is_none() {
        std::env::set_var(SCRIPT_LIB_VAR, &discovered.script_lib);
    }
}
