//! Configuration loading, validation, and management for Switchyard.
//!
//! Loads configuration from `~/.switchyard/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use switchyard_core::scanner::FailMode;

/// The root configuration structure.
///
/// Maps directly to `~/.switchyard/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tool discovery and dispatch
    #[serde(default)]
    pub router: RouterConfig,

    /// Content-safety gating
    #[serde(default)]
    pub security: SecurityConfig,

    /// Per-session conversation history
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Per-agent circuit breaker
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Playbook / skill sources
    #[serde(default)]
    pub playbooks: PlaybookConfig,

    /// Embedding-based tool selection
    #[serde(default)]
    pub embeddings: EmbeddingConfig,

    /// Model loop settings
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Prefix every tool with its provider id, even without collisions
    #[serde(default)]
    pub force_prefix: bool,

    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,

    /// Budget for multi-step skill execution
    #[serde(default = "default_skill_timeout_ms")]
    pub skill_timeout_ms: u64,

    /// Provider id → label used in prefixed descriptions
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

fn default_call_timeout_ms() -> u64 {
    30_000
}
fn default_health_timeout_ms() -> u64 {
    5_000
}
fn default_skill_timeout_ms() -> u64 {
    300_000
}

impl RouterConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn skill_timeout(&self) -> Duration {
        Duration::from_millis(self.skill_timeout_ms)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            force_prefix: false,
            call_timeout_ms: default_call_timeout_ms(),
            health_timeout_ms: default_health_timeout_ms(),
            skill_timeout_ms: default_skill_timeout_ms(),
            labels: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Scan incoming user messages
    #[serde(default = "default_true")]
    pub input_enabled: bool,

    #[serde(default)]
    pub input_fail_mode: FailMode,

    #[serde(default)]
    pub output_fail_mode: FailMode,

    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,

    /// Per tool-provider output policy
    #[serde(default)]
    pub providers: HashMap<String, ProviderSecurityConfig>,

    /// Per-agent partial overrides
    #[serde(default)]
    pub agents: HashMap<String, AgentSecurityOverride>,
}

fn default_scan_timeout_ms() -> u64 {
    10_000
}

impl SecurityConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            input_enabled: true,
            input_fail_mode: FailMode::Closed,
            output_fail_mode: FailMode::Closed,
            scan_timeout_ms: default_scan_timeout_ms(),
            providers: HashMap::new(),
            agents: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSecurityConfig {
    #[serde(default)]
    pub fail_mode: FailMode,
}

/// Partial security settings for one agent. Unset fields inherit the globals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSecurityOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_fail_mode: Option<FailMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_fail_mode: Option<FailMode>,

    /// Provider id → output fail mode
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub providers: HashMap<String, FailMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_max_history() -> usize {
    20
}
fn default_idle_timeout_secs() -> u64 {
    30 * 60
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,

    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_max_errors() -> u32 {
    5
}
fn default_cooldown_ms() -> u64 {
    60_000
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_errors: default_max_errors(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookConfig {
    /// Directory of skill bundles (defaults to `~/.switchyard/skills`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_dir: Option<PathBuf>,

    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,

    /// Restrict store-backed playbooks to one agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

fn default_staleness_secs() -> u64 {
    5 * 60
}

impl PlaybookConfig {
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    /// Resolved skills directory.
    pub fn skills_dir(&self) -> PathBuf {
        self.skills_dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("skills"))
    }
}

impl Default for PlaybookConfig {
    fn default() -> Self {
        Self {
            skills_dir: None,
            staleness_secs: default_staleness_secs(),
            agent_id: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_embedding_provider")]
    pub provider_id: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Persistent vector cache (defaults to `~/.switchyard/embedding-cache.json`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,

    /// Minimum cosine similarity for a tool to be selected
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_min_tools")]
    pub min_tools: usize,

    /// Tools always in scope regardless of similarity
    #[serde(default)]
    pub core_tools: Vec<String>,
}

fn default_embedding_provider() -> String {
    "openai".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_threshold() -> f32 {
    0.3
}
fn default_top_k() -> usize {
    15
}
fn default_min_tools() -> usize {
    3
}

impl EmbeddingConfig {
    /// Resolved cache file path.
    pub fn cache_path(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("embedding-cache.json"))
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider_id: default_embedding_provider(),
            model: default_embedding_model(),
            api_url: default_embedding_url(),
            api_key: None,
            cache_path: None,
            threshold: default_threshold(),
            top_k: default_top_k(),
            min_tools: default_min_tools(),
            core_tools: vec![],
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("enabled", &self.enabled)
            .field("provider_id", &self.provider_id)
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("cache_path", &self.cache_path)
            .field("threshold", &self.threshold)
            .field("top_k", &self.top_k)
            .field("min_tools", &self.min_tools)
            .field("core_tools", &self.core_tools)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible chat endpoint
    #[serde(default = "default_embedding_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Model/tool round trips per message
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_iterations() -> u32 {
    8
}
fn default_system_prompt() -> String {
    "You are a helpful assistant. Use the provided tools to act; never claim an action you did not perform with a tool.".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_url: default_embedding_url(),
            api_key: None,
            temperature: default_temperature(),
            max_iterations: default_max_iterations(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_iterations", &self.max_iterations)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.switchyard/config.toml).
    ///
    /// Environment overrides:
    /// - `SWITCHYARD_SKILLS_DIR`
    /// - `SWITCHYARD_EMBEDDING_MODEL`
    /// - `SWITCHYARD_EMBEDDING_API_KEY`, then `OPENAI_API_KEY`
    /// - `SWITCHYARD_API_KEY`, then `OPENAI_API_KEY` (chat model)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(dir) = std::env::var("SWITCHYARD_SKILLS_DIR") {
            config.playbooks.skills_dir = Some(PathBuf::from(dir));
        }

        if let Ok(model) = std::env::var("SWITCHYARD_EMBEDDING_MODEL") {
            config.embeddings.model = model;
        }

        if config.embeddings.api_key.is_none() {
            config.embeddings.api_key = std::env::var("SWITCHYARD_EMBEDDING_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if config.agent.api_key.is_none() {
            config.agent.api_key = std::env::var("SWITCHYARD_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".switchyard")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sessions.max_history == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.max_history must be at least 1".into(),
            ));
        }

        if self.circuit_breaker.max_errors == 0 {
            return Err(ConfigError::ValidationError(
                "circuit_breaker.max_errors must be at least 1".into(),
            ));
        }

        if !(-1.0..=1.0).contains(&self.embeddings.threshold) {
            return Err(ConfigError::ValidationError(
                "embeddings.threshold must be between -1.0 and 1.0".into(),
            ));
        }

        if self.embeddings.min_tools > self.embeddings.top_k {
            return Err(ConfigError::ValidationError(
                "embeddings.min_tools must not exceed embeddings.top_k".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
