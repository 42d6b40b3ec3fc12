//! Filesystem layout under the XDG data directory.
//!
//! `TAALSYNC_DATA_DIR` overrides everything; otherwise `XDG_DATA_HOME`
//! (or `~/.local/share`) with a `taalsync` subdirectory.

use std::env;
use std::path::PathBuf;

pub fn data_dir() -> PathBuf {
    resolve_data_dir(
        env::var("TAALSYNC_DATA_DIR").ok().as_deref(),
        env::var("XDG_DATA_HOME").ok().as_deref(),
        env::var("HOME").ok().as_deref(),
    )
}

/// The local SQLite database file.
pub fn db_path() -> PathBuf {
    data_dir().join("taalsync.db")
}

/// Final home of downloaded project audio.
pub fn audio_dir() -> PathBuf {
    data_dir().join("audio")
}

/// Staging area for in-flight downloads.
pub fn staging_dir() -> PathBuf {
    data_dir().join("downloads")
}

fn resolve_data_dir(
    explicit: Option<&str>,
    xdg_data_home: Option<&str>,
    home: Option<&str>,
) -> PathBuf {
    if let Some(dir) = explicit.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    if let Some(xdg) = xdg_data_home.filter(|d| !d.is_empty()) {
        return PathBuf::from(xdg).join("taalsync");
    }
    let home = home.filter(|h| !h.is_empty()).unwrap_or(".");
    PathBuf::from(home).join(".local/share/taalsync")
}
