//! Definition file discovery

pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

const APP_DIR: &str = "stratus";
const CANDIDATES: [&str; 4] = [
    "stratus.local.kdl",
    ".stratus.local.kdl",
    "stratus.kdl",
    ".stratus.kdl",
];

/// Stratus config directory (`~/.config/stratus`), created on demand
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(APP_DIR);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

fn first_candidate(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Find the definition file
///
/// Search order:
/// 1. `STRATUS_CONFIG_PATH`
/// 2. current directory: stratus.local.kdl, .stratus.local.kdl, stratus.kdl, .stratus.kdl
/// 3. `./.stratus/`, same order
/// 4. `~/.config/stratus/stratus.kdl`
pub fn find_definition_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("STRATUS_CONFIG_PATH")
        && !config_path.is_empty()
    {
        let path = PathBuf::from(&config_path);
        if path.is_file() {
            return Ok(path);
        }
        return Err(ConfigError::ConfigPathMissing(config_path));
    }

    let current_dir = std::env::current_dir()?;

    if let Some(path) = first_candidate(&current_dir) {
        return Ok(path);
    }

    let state_dir = current_dir.join(".stratus");
    if state_dir.is_dir()
        && let Some(path) = first_candidate(&state_dir)
    {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join(APP_DIR).join("stratus.kdl");
        if global.is_file() {
            return Ok(global);
        }
    }

    Err(ConfigError::DefinitionNotFound)
}

/// Project root for a definition file: the directory holding it, or the
/// parent of `.stratus/`
pub fn project_root(definition: &Path) -> PathBuf {
    let dir = definition
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if dir.file_name().and_then(|n| n.to_str()) == Some(".stratus")
        && let Some(parent) = dir.parent()
    {
        return parent.to_path_buf();
    }
    if dir.as_os_str().is_empty() {
        return PathBuf::from(".");
    }
    dir
}
