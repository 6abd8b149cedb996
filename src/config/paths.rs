//! Platform-specific data directory paths.
//!
//!   Windows: %APPDATA%/pacs-voice/data
//!   macOS:   ~/Library/Application Support/pacs-voice/data
//!   Linux:   $XDG_CONFIG_HOME/pacs-voice/data (default ~/.config)

use std::path::PathBuf;

const APP_DIR: &str = "pacs-voice";

/// Directory holding `engine_config.json` and the log folder.
pub fn get_data_dir() -> PathBuf {
    get_config_base().join(APP_DIR).join("data")
}

pub fn get_log_dir() -> PathBuf {
    get_data_dir().join("logs")
}

fn get_config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::config_dir().unwrap_or_else(|| home().join("AppData").join("Roaming"))
    }

    #[cfg(target_os = "macos")]
    {
        home().join("Library").join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg);
        }
        home().join(".config")
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
