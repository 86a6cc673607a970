//! Routing table construction.
//!
//! A table is built wholesale from one discovery pass and never mutated
//! afterwards; the router publishes it by swapping an `Arc`.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use switchyard_core::tool::{ToolDescriptor, ToolProvider};
use tracing::warn;

/// One entry of the routing table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedTool {
    /// Name the model sees (possibly `{provider}.{tool}`)
    pub exposed_name: String,

    /// Name the owning provider knows the tool by
    pub original_name: String,

    pub provider_id: String,

    /// Descriptor as exposed: renamed and label-annotated when prefixed
    pub descriptor: ToolDescriptor,
}

/// The tool list one provider returned during discovery.
pub struct ProviderListing {
    pub id: String,
    pub label: String,
    pub provider: Arc<dyn ToolProvider>,
    pub tools: Vec<ToolDescriptor>,
}

/// Exposed name → route, plus the providers those routes point at.
#[derive(Default)]
pub struct RoutingTable {
    routes: BTreeMap<String, RoutedTool>,
    providers: HashMap<String, Arc<dyn ToolProvider>>,
}

impl RoutingTable {
    /// Build a table from provider listings.
    ///
    /// A bare name offered by exactly one provider keeps that name unless
    /// `force_prefix` is set. Otherwise every copy is exposed as
    /// `{provider}.{tool}` with `[Label] ` prepended to its description.
    pub fn build(listings: Vec<ProviderListing>, force_prefix: bool) -> Self {
        let mut by_name: BTreeMap<String, Vec<(usize, &ToolDescriptor)>> = BTreeMap::new();

        for (idx, listing) in listings.iter().enumerate() {
            let mut seen = HashSet::new();
            for tool in &listing.tools {
                if !seen.insert(tool.name.as_str()) {
                    warn!(provider = %listing.id, tool = %tool.name, "Provider listed tool twice, keeping first");
                    continue;
                }
                by_name.entry(tool.name.clone()).or_default().push((idx, tool));
            }
        }

        let mut routes = BTreeMap::new();
        for (bare, owners) in &by_name {
            let prefixed = force_prefix || owners.len() > 1;

            for (idx, tool) in owners {
                let listing = &listings[*idx];
                let (exposed_name, description) = if prefixed {
                    (
                        format!("{}.{}", listing.id, bare),
                        format!("[{}] {}", listing.label, tool.description),
                    )
                } else {
                    (bare.clone(), tool.description.clone())
                };

                if routes.contains_key(&exposed_name) {
                    warn!(
                        provider = %listing.id,
                        tool = %exposed_name,
                        "Exposed tool name already taken, dropping later entry"
                    );
                    continue;
                }

                let descriptor = ToolDescriptor {
                    name: exposed_name.clone(),
                    description,
                    input_schema: tool.input_schema.clone(),
                    provider_id: listing.id.clone(),
                };
                routes.insert(
                    exposed_name.clone(),
                    RoutedTool {
                        exposed_name,
                        original_name: bare.clone(),
                        provider_id: listing.id.clone(),
                        descriptor,
                    },
                );
            }
        }

        let providers = listings
            .into_iter()
            .map(|listing| (listing.id, listing.provider))
            .collect();

        Self { routes, providers }
    }

    pub fn get(&self, exposed_name: &str) -> Option<&RoutedTool> {
        self.routes.get(exposed_name)
    }

    pub fn provider(&self, provider_id: &str) -> Option<Arc<dyn ToolProvider>> {
        self.providers.get(provider_id).cloned()
    }

    pub fn contains(&self, exposed_name: &str) -> bool {
        self.routes.contains_key(exposed_name)
    }

    /// Exposed names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    pub fn routes(&self) -> impl Iterator<Item = &RoutedTool> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
