pub mod ask;
pub mod check_reply;
pub mod classify;
pub mod doctor;
pub mod skills;

use std::path::PathBuf;
use switchyard_config::{AppConfig, ConfigError};

/// The `--dir` override, or the configured skills directory.
pub fn skills_dir(dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match dir {
        Some(dir) => Ok(dir),
        None => Ok(AppConfig::load()?.playbooks.skills_dir()),
    }
}
