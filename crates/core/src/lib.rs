//! # Switchyard Core
//!
//! Domain types, collaborator traits, and error definitions for the Switchyard
//! tool orchestration runtime. This crate has **no framework dependencies**; it
//! defines the boundary every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (tool providers, the safety scanner, the
//! playbook store, the embedding backend, the language model) is a trait here.
//! Implementations live in their respective crates or in the host application.
//! This enables:
//! - Swapping collaborators without touching the orchestration layer
//! - Testing every component against hand-written stubs
//! - A clean dependency graph (all crates depend inward on core)

pub mod embedding;
pub mod error;
pub mod event;
pub mod message;
pub mod model;
pub mod playbook;
pub mod scanner;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use embedding::EmbeddingBackend;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role};
pub use model::{LanguageModel, ModelRequest, ModelResponse, ToolDefinition};
pub use playbook::{NewSkill, PlaybookStore, SkillRecord};
pub use scanner::{FailMode, RiskLevel, SafetyScanner, ScanResult, ScanVerdict};
pub use tool::{Tool, ToolDescriptor, ToolExecutor, ToolOutcome, ToolProvider, ToolRegistry};
