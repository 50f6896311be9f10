//! Application path management for portable and installed modes.
//!
//! - **Dev mode** (debug builds): `midifx.yaml` in the current directory puts
//!   everything next to it.
//! - **Portable mode**: a `.portable` marker next to the executable keeps the
//!   config, document store and logs in the executable's directory.
//! - **Installed mode** (default): data lives under the platform data
//!   directory (`%APPDATA%\MidiFX GW`, `~/.local/share/MidiFX GW`, ...).

use std::path::{Path, PathBuf};

/// Application name used for directories in installed mode
const APP_NAME: &str = "MidiFX GW";

/// Default configuration file name
pub const CONFIG_FILE: &str = "midifx.yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config: PathBuf,
    /// Root of the JSON document store
    pub store_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join(CONFIG_FILE).exists() {
                eprintln!("[paths] Running in DEV mode ({} found in {})", CONFIG_FILE, cwd.display());
                return Self::rooted_at(&cwd, true);
            }
        }

        if exe_dir.join(".portable").exists() {
            return Self::rooted_at(&exe_dir, true);
        }

        let app_data = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no platform data directory, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);
        Self::rooted_at(&app_data, false)
    }

    /// Every path under one base directory
    pub fn rooted_at(base: &Path, is_portable: bool) -> Self {
        Self {
            config: base.join(CONFIG_FILE),
            store_dir: base.join("store"),
            logs_dir: base.join("logs"),
            is_portable,
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
