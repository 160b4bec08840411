//! Platform-specific data directory paths.
//!
//! Layout under the data directory (spec §6):
//!   alarms.db   — Alarm Store (SQLite)
//!   tts_cache/  — TTS cache (binary + sidecar index)
//!   logs/       — rotated text logs
//!
//! Resolution:
//!   Windows: %APPDATA%/voxd
//!   macOS:   ~/Library/Application Support/voxd
//!   Linux:   $XDG_DATA_HOME/voxd (default ~/.local/share/voxd)

use std::path::PathBuf;

/// Get the voxd data directory (cross-platform).
pub fn get_data_dir() -> PathBuf {
    get_data_base().join("voxd")
}

pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

pub fn get_alarm_db_path() -> PathBuf {
    get_data_dir().join("alarms.db")
}

pub fn get_tts_cache_dir() -> PathBuf {
    get_data_dir().join("tts_cache")
}

pub fn get_logs_dir() -> PathBuf {
    get_data_dir().join("logs")
}

fn get_data_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::data_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("AppData")
                .join("Roaming")
        })
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
            return PathBuf::from(xdg);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("share")
    }
}
