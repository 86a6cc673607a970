//! File-based skill bundles.
//!
//! Layout: `<skills_dir>/<name>/SKILL.md`, YAML frontmatter followed by a
//! Markdown body that becomes the playbook's instructions.
//!
//! ```text
//! ---
//! name: daily-briefing
//! description: Morning summary of mail and calendar
//! playbook:
//!   keywords: [daily briefing, morning summary]
//!   priority: 5
//!   required_tools: [mail.search, calendar.list_events]
//!   trigger_config: { cron: "0 8 * * 1-5" }
//!   max_steps: 6
//! ---
//! Summarize unread mail, then list today's events.
//! ```

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use switchyard_core::error::PlaybookError;
use tracing::{debug, info, warn};

use crate::model::{CachedPlaybook, PlaybookSource, normalize_keywords};

/// File name looked up in every skill directory.
pub const SKILL_FILE: &str = "SKILL.md";

#[derive(Debug, Deserialize)]
struct SkillFrontmatter {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    playbook: PlaybookExtension,
}

#[derive(Debug, Default, Deserialize)]
struct PlaybookExtension {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    required_tools: Vec<String>,
    trigger_config: Option<serde_json::Value>,
    max_steps: Option<u32>,
    execution_plan: Option<serde_json::Value>,
}

/// Result of one directory scan. Rejected bundles are reported, not fatal.
#[derive(Debug, Default)]
pub struct SkillScan {
    pub playbooks: Vec<CachedPlaybook>,
    pub errors: Vec<PlaybookError>,
}

/// Scans a skills directory for bundles.
#[derive(Debug, Clone)]
pub struct SkillLoader {
    dir: PathBuf,
}

impl SkillLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Parse every bundle in the directory, in directory-name order.
    ///
    /// A missing directory yields an empty scan. Only failing to list an
    /// existing directory is an error.
    pub fn scan(&self) -> Result<SkillScan, PlaybookError> {
        let mut scan = SkillScan::default();
        if !self.dir.exists() {
            debug!("Skills directory {} does not exist", self.dir.display());
            return Ok(scan);
        }

        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| PlaybookError::Io(format!("{}: {e}", self.dir.display())))?;

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.join(SKILL_FILE).is_file())
            .collect();
        dirs.sort();

        for dir in dirs {
            match load_skill(&dir) {
                Ok(playbook) => scan.playbooks.push(playbook),
                Err(e) => {
                    warn!("Skipping skill bundle {}: {e}", dir.display());
                    scan.errors.push(e);
                }
            }
        }

        info!(
            loaded = scan.playbooks.len(),
            rejected = scan.errors.len(),
            "Scanned skills in {}",
            self.dir.display()
        );
        Ok(scan)
    }
}

fn load_skill(dir: &Path) -> Result<CachedPlaybook, PlaybookError> {
    let path = dir.join(SKILL_FILE);
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| PlaybookError::Io(format!("{}: {e}", path.display())))?;
    let directory = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    parse_skill(&contents, &path, directory)
}

/// Parse one `SKILL.md`. `directory` is the bundle's directory name, which
/// the declared `name` must equal.
pub fn parse_skill(contents: &str, path: &Path, directory: &str) -> Result<CachedPlaybook, PlaybookError> {
    let parse_error = |reason: String| PlaybookError::SkillParse {
        path: path.display().to_string(),
        reason,
    };

    let (frontmatter, body) = split_frontmatter(contents).ok_or_else(|| parse_error("missing frontmatter".into()))?;
    let meta: SkillFrontmatter = serde_yaml::from_str(&frontmatter).map_err(|e| parse_error(e.to_string()))?;

    let name = meta
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| parse_error("missing name".into()))?;
    let description = meta
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| parse_error("missing description".into()))?;

    if name != directory {
        return Err(PlaybookError::NameMismatch {
            name,
            directory: directory.to_string(),
        });
    }

    let ext = meta.playbook;
    Ok(CachedPlaybook {
        id: file_playbook_id(&name),
        name,
        description,
        instructions: body.trim().to_string(),
        keywords: normalize_keywords(&ext.keywords),
        priority: ext.priority,
        required_tools: ext.required_tools,
        source: PlaybookSource::File,
        trigger_config: ext.trigger_config,
        max_steps: ext.max_steps,
        execution_plan: ext.execution_plan,
    })
}

/// Split `---` delimited YAML frontmatter from the Markdown body.
fn split_frontmatter(contents: &str) -> Option<(String, String)> {
    let mut lines = contents.lines();
    if lines.next()?.trim() != "---" {
        return None;
    }

    let mut yaml_lines = Vec::new();
    for line in lines.by_ref() {
        if line.trim() == "---" {
            let body = lines.collect::<Vec<_>>().join("\n");
            return Some((yaml_lines.join("\n"), body));
        }
        yaml_lines.push(line);
    }
    None
}

/// Stable negative id for a file-backed playbook, derived from its name.
pub fn file_playbook_id(name: &str) -> i64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let n = u64::from_be_bytes(bytes) >> 1;
    -(n as i64) - 1
}
