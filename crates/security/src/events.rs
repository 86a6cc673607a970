//! Security event log, a bounded record of recent scans.
//!
//! Keeps the most recent events in memory for status endpoints and forwards
//! each one to any configured sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use switchyard_core::scanner::ScanResult;

/// Events retained in memory.
pub const DEFAULT_CAPACITY: usize = 100;

/// Characters of scanned content kept in an event.
pub const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    InputScan,
    OutputScan,
    Blocked,
}

/// A single scan record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: SecurityEventKind,
    /// Leading slice of the scanned content
    pub excerpt: String,
    pub result: ScanResult,
}

/// Where security events are written besides the in-memory buffer.
pub trait SecuritySink: Send + Sync {
    fn record(&self, event: &SecurityEvent);
}

/// Ring buffer of the most recent security events.
pub struct SecurityEventLog {
    entries: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
    sinks: Vec<Box<dyn SecuritySink>>,
}

impl std::fmt::Debug for SecurityEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityEventLog")
            .field("entry_count", &self.count())
            .field("capacity", &self.capacity)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

/// Default capacity, forwarding to [`TracingSink`].
impl Default for SecurityEventLog {
    fn default() -> Self {
        Self::with_sinks(DEFAULT_CAPACITY, vec![Box::new(TracingSink)])
    }
}

impl SecurityEventLog {
    /// A log without sinks.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            sinks: Vec::new(),
        }
    }

    /// Create a log that also forwards to the given sinks.
    pub fn with_sinks(capacity: usize, sinks: Vec<Box<dyn SecuritySink>>) -> Self {
        Self {
            sinks,
            ..Self::new(capacity)
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<SecurityEvent>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a scan of `content`.
    pub fn log(&self, kind: SecurityEventKind, content: &str, result: &ScanResult) {
        let event = SecurityEvent {
            timestamp: Utc::now(),
            kind,
            excerpt: content.chars().take(EXCERPT_CHARS).collect(),
            result: result.clone(),
        };

        for sink in &self.sinks {
            sink.record(&event);
        }

        let mut entries = self.entries();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    /// Up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<SecurityEvent> {
        self.entries().iter().rev().take(limit).cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.entries().len()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

/// Logs security events through `tracing`; blocks at `warn`.
pub struct TracingSink;

impl SecuritySink for TracingSink {
    fn record(&self, event: &SecurityEvent) {
        if event.kind == SecurityEventKind::Blocked {
            tracing::warn!(
                risk = %event.result.risk,
                threats = ?event.result.threats,
                reason = %event.result.reason,
                "SECURITY BLOCKED"
            );
        } else {
            tracing::info!(
                kind = ?event.kind,
                allowed = event.result.allowed,
                risk = %event.result.risk,
                "SECURITY SCAN"
            );
        }
    }
}
