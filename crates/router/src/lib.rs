//! Tool routing for Switchyard.
//!
//! The [`ToolRouter`] owns an ordered set of tool providers, builds a
//! namespaced routing table from their catalogs, and forwards calls to the
//! owning provider. Providers that fail or time out are isolated: discovery
//! skips them and calls through them come back as failed outcomes.

pub mod local;
pub mod router;
pub mod table;

pub use local::LocalToolProvider;
pub use router::{DiscoveryFailure, DiscoveryReport, RouterOptions, ToolRouter};
pub use table::{RoutedTool, RoutingTable};
