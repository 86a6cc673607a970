//! Security gating for Switchyard: content-safety scanning of inbound and
//! outbound text with an explicit policy for when the scanner is unreachable.
//!
//! Provides:
//! - **Coordinator**: input/output scans, violation assertion, per-agent scoping
//! - **Policy**: immutable global defaults plus a pure override merge
//! - **Events**: bounded log of recent scans, forwarded to pluggable sinks

pub mod coordinator;
pub mod events;
pub mod policy;

pub use coordinator::SecurityCoordinator;
pub use events::{SecurityEvent, SecurityEventKind, SecurityEventLog, SecuritySink, TracingSink};
pub use policy::{InputPolicy, OutputPolicy, PolicyOverride, SecurityPolicy, merge_overrides};
