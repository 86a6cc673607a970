//! HTTP collaborators for Switchyard.
//!
//! Both clients speak the OpenAI-compatible wire format, so they work with
//! OpenAI, OpenRouter, Ollama, vLLM and similar endpoints.

pub mod chat;
pub mod embeddings;

pub use chat::OpenAiChat;
pub use embeddings::OpenAiEmbeddings;
