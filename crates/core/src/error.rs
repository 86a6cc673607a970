//! Error types for the Switchyard domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; [`Error`] unifies them.

use thiserror::Error;

use crate::scanner::RiskLevel;

/// The top-level error type for all Switchyard operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Routing errors ---
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    // --- Security ---
    #[error("{0}")]
    Security(#[from] SecurityViolation),

    // --- Language model errors ---
    #[error("Model error: {0}")]
    Provider(#[from] ProviderError),

    // --- Embedding errors ---
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- Playbook errors ---
    #[error("Playbook error: {0}")]
    Playbook(#[from] PlaybookError),

    // --- Circuit breaker ---
    #[error("Agent '{agent_id}' is temporarily unavailable (circuit open)")]
    CircuitOpen { agent_id: String },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool provider unavailable: {0}")]
    Unavailable(String),

    #[error("Tool discovery failed for provider {provider}: {reason}")]
    DiscoveryFailed { provider: String, reason: String },
}

/// A tool call addressed a name that is not in the routing table.
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("Unknown tool '{name}'. Available tools: {}", format_available(.available))]
    UnknownTool { name: String, available: Vec<String> },
}

fn format_available(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

/// Content was blocked by the safety scanner (or by the fail-closed policy).
#[derive(Debug, Clone, Error)]
#[error("Security violation in {context}: {reason} (risk: {risk}, threats: [{}])", .threats.join(", "))]
pub struct SecurityViolation {
    pub context: String,
    pub risk: RiskLevel,
    pub threats: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Error)]
pub enum ScannerError {
    #[error("Safety scanner unavailable: {0}")]
    Unavailable(String),
}

/// Failures talking to the language model backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Tool selector not initialized; call initialize() first")]
    NotInitialized,

    #[error("Embedding backend failed: {0}")]
    Backend(String),

    #[error("Embedding backend returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("Embedding cache error: {0}")]
    Cache(String),
}

#[derive(Debug, Clone, Error)]
pub enum PlaybookError {
    #[error("Playbook store error: {0}")]
    Store(String),

    #[error("Invalid skill at {path}: {reason}")]
    SkillParse { path: String, reason: String },

    #[error("Skill name '{name}' does not match its directory '{directory}'")]
    NameMismatch { name: String, directory: String },

    #[error("I/O error reading skills: {0}")]
    Io(String),
}
