//! Domain events for decoupled observability across bounded contexts.
//!
//! Events are published when something interesting happens in the runtime.
//! Other components can subscribe to react without tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A discovery pass published a new routing table
    ToolsDiscovered {
        tool_count: usize,
        providers: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was forwarded to its provider
    ToolExecuted {
        tool_name: String,
        provider: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Content was blocked by the security layer
    SecurityBlocked {
        direction: String, // "input", "output"
        risk: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent's circuit breaker changed state
    CircuitStateChanged {
        agent_id: String,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// The playbook cache published a new snapshot
    PlaybooksRefreshed {
        count: usize,
        synced: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool call leaked into reply text was executed on the model's behalf
    LeakedToolCallRecovered {
        tool_name: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
