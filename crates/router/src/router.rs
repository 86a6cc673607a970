//! Tool router: discovers tools across providers and dispatches calls.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use switchyard_config::RouterConfig;
use switchyard_core::error::{RoutingError, ToolError};
use switchyard_core::event::{DomainEvent, EventBus};
use switchyard_core::model::ToolDefinition;
use switchyard_core::tool::{ToolExecutor, ToolOutcome, ToolProvider};
use tracing::{debug, info, warn};

use crate::table::{ProviderListing, RoutedTool, RoutingTable};

/// Router behaviour knobs.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Expose every tool as `{provider}.{tool}`
    pub force_prefix: bool,
    pub call_timeout: Duration,
    /// Bounds `list_tools` during discovery and `health_check`
    pub health_timeout: Duration,
    /// Provider id → label for prefixed descriptions
    pub labels: HashMap<String, String>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

impl RouterOptions {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            force_prefix: config.force_prefix,
            call_timeout: config.call_timeout(),
            health_timeout: config.health_timeout(),
            labels: config.labels.clone(),
        }
    }
}

/// A provider that could not be listed during discovery.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryFailure {
    pub provider: String,
    pub reason: String,
}

/// Summary of one discovery pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub tool_count: usize,
    /// Providers whose tools made it into the table
    pub providers: Vec<String>,
    /// Providers reporting themselves unavailable
    pub skipped: Vec<String>,
    pub failures: Vec<DiscoveryFailure>,
}

/// Discovers, namespaces and dispatches tool calls.
///
/// Reads take a cheap `Arc` clone of the current table; discovery builds a
/// complete new table before swapping it in, so readers never see a
/// half-built one.
pub struct ToolRouter {
    providers: Vec<(String, Arc<dyn ToolProvider>)>,
    table: RwLock<Arc<RoutingTable>>,
    options: RouterOptions,
    events: Arc<EventBus>,
}

impl ToolRouter {
    pub fn new(options: RouterOptions) -> Self {
        Self {
            providers: Vec::new(),
            table: RwLock::new(Arc::new(RoutingTable::default())),
            options,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Publish router events on a shared bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Register a capability source under `name`. Re-registering a name
    /// replaces the earlier provider. Takes effect on the next discovery.
    pub fn register_provider(&mut self, name: impl Into<String>, provider: Arc<dyn ToolProvider>) {
        let name = name.into();
        if let Some(slot) = self.providers.iter_mut().find(|(id, _)| *id == name) {
            slot.1 = provider;
        } else {
            self.providers.push((name, provider));
        }
    }

    /// Registered provider names, in registration order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|(id, _)| id.as_str()).collect()
    }

    fn label_for(&self, id: &str, provider: &dyn ToolProvider) -> String {
        self.options
            .labels
            .get(id)
            .cloned()
            .unwrap_or_else(|| provider.label().to_string())
    }

    fn snapshot(&self) -> Arc<RoutingTable> {
        match self.table.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&self, table: RoutingTable) {
        let table = Arc::new(table);
        match self.table.write() {
            Ok(mut guard) => *guard = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
    }

    /// Query every available provider and rebuild the routing table.
    ///
    /// Unreachable or failing providers are skipped; their tools disappear
    /// from the new table.
    pub async fn discover_tools(&self) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        let timeout = self.options.health_timeout;

        let mut queries = Vec::new();
        for (id, provider) in &self.providers {
            if !provider.is_available() {
                debug!(provider = %id, "Provider unavailable, skipping discovery");
                report.skipped.push(id.clone());
                continue;
            }
            let id = id.clone();
            let provider = provider.clone();
            queries.push(async move {
                let result = tokio::time::timeout(timeout, provider.list_tools()).await;
                (id, provider, result)
            });
        }

        let mut listings = Vec::new();
        for (id, provider, result) in join_all(queries).await {
            let reason = match result {
                Ok(Ok(tools)) => {
                    debug!(provider = %id, tools = tools.len(), "Provider listed tools");
                    let label = self.label_for(&id, provider.as_ref());
                    report.providers.push(id.clone());
                    listings.push(ProviderListing {
                        id,
                        label,
                        provider,
                        tools,
                    });
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("listing timed out after {}ms", timeout.as_millis()),
            };
            warn!(provider = %id, reason = %reason, "Tool discovery failed, skipping provider");
            report.failures.push(DiscoveryFailure {
                provider: id,
                reason,
            });
        }

        let table = RoutingTable::build(listings, self.options.force_prefix);
        report.tool_count = table.len();
        self.publish(table);

        info!(
            tools = report.tool_count,
            providers = report.providers.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "Tool discovery complete"
        );
        self.events.publish(DomainEvent::ToolsDiscovered {
            tool_count: report.tool_count,
            providers: report.providers.clone(),
            timestamp: Utc::now(),
        });

        report
    }

    /// Forward a call to the owning provider under the tool's original name.
    ///
    /// Only an unknown name is an `Err`; provider failures and timeouts come
    /// back as a failed [`ToolOutcome`].
    pub async fn route_tool_call(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutcome, RoutingError> {
        let table = self.snapshot();
        let Some(route) = table.get(name) else {
            return Err(RoutingError::UnknownTool {
                name: name.to_string(),
                available: table.names(),
            });
        };

        let started = Instant::now();
        let outcome = match table.provider(&route.provider_id) {
            Some(provider) => {
                let call = provider.call_tool(&route.original_name, arguments);
                match tokio::time::timeout(self.options.call_timeout, call).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        warn!(tool = %name, provider = %route.provider_id, error = %e, "Tool call failed");
                        ToolOutcome::failure(e.to_string())
                    }
                    Err(_) => {
                        let e = ToolError::Timeout {
                            tool_name: name.to_string(),
                            timeout_ms: self.options.call_timeout.as_millis() as u64,
                        };
                        warn!(tool = %name, provider = %route.provider_id, "Tool call timed out");
                        ToolOutcome::failure(e.to_string())
                    }
                }
            }
            None => ToolOutcome::failure(
                ToolError::Unavailable(route.provider_id.clone()).to_string(),
            ),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(tool = %name, success = outcome.success, duration_ms, "Tool call routed");
        self.events.publish(DomainEvent::ToolExecuted {
            tool_name: name.to_string(),
            provider: route.provider_id.clone(),
            success: outcome.success,
            duration_ms,
            timestamp: Utc::now(),
        });

        Ok(outcome)
    }

    /// Definitions for every exposed tool, sorted by exposed name.
    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.snapshot()
            .routes()
            .map(|route| route.descriptor.to_definition())
            .collect()
    }

    /// Every route in the current table, sorted by exposed name.
    pub fn get_all_routes(&self) -> Vec<RoutedTool> {
        self.snapshot().routes().cloned().collect()
    }

    /// Id of the provider that owns an exposed tool.
    pub fn provider_for(&self, exposed_name: &str) -> Option<String> {
        self.snapshot()
            .get(exposed_name)
            .map(|route| route.provider_id.clone())
    }

    pub fn tool_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Health of every registered provider. A check that outlives the
    /// health timeout counts as unhealthy.
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let timeout = self.options.health_timeout;
        let checks = self.providers.iter().map(|(id, provider)| async move {
            let healthy = tokio::time::timeout(timeout, provider.health_check())
                .await
                .unwrap_or(false);
            if !healthy {
                warn!(provider = %id, "Provider health check failed");
            }
            (id.clone(), healthy)
        });
        join_all(checks).await.into_iter().collect()
    }
}

#[async_trait]
impl ToolExecutor for ToolRouter {
    fn has_tool(&self, name: &str) -> bool {
        self.snapshot().contains(name)
    }

    async fn execute_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutcome, ToolError> {
        self.route_tool_call(name, arguments)
            .await
            .map_err(|_| ToolError::NotFound(name.to_string()))
    }
}
