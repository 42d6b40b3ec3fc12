//! Runtime configuration: an optional JSON config file with environment
//! overrides on top.
//!
//! File location: `$XDG_CONFIG_HOME/taalsync/config.json` (or
//! `~/.config/taalsync/config.json`). Environment always wins:
//! `TAALSYNC_API_URL`, `TAALSYNC_TOKEN`, `TAALSYNC_ROOT_FOLDER`,
//! `TAALSYNC_DATA_DIR`.

use std::env;
use std::path::PathBuf;

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::sync::paths;

#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    #[diagnostic(code(taalsync::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    #[diagnostic(code(taalsync::config::parse))]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No remote API URL configured")]
    #[diagnostic(
        code(taalsync::config::missing_api_url),
        help("Set TAALSYNC_API_URL or add \"api_url\" to the config file")
    )]
    MissingApiUrl,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    root_folder: Option<String>,
    #[serde(default)]
    data_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub root_folder: Option<String>,
    pub data_dir: PathBuf,
}

impl SyncConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        let file = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using environment only");
                FileConfig::default()
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        resolve(file, |var| env::var(var).ok())
    }
}

fn config_file_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("taalsync/config.json");
        }
    }
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config/taalsync/config.json")
}

fn resolve(
    file: FileConfig,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<SyncConfig, ConfigError> {
    let pick = |var: &str, from_file: Option<String>| {
        env_lookup(var).filter(|v| !v.is_empty()).or(from_file)
    };
    let api_url = pick("TAALSYNC_API_URL", file.api_url).ok_or(ConfigError::MissingApiUrl)?;
    let data_dir = pick("TAALSYNC_DATA_DIR", file.data_dir)
        .map(PathBuf::from)
        .unwrap_or_else(paths::data_dir);
    Ok(SyncConfig {
        api_url,
        token: pick("TAALSYNC_TOKEN", file.token),
        root_folder: pick("TAALSYNC_ROOT_FOLDER", file.root_folder),
        data_dir,
    })
}
