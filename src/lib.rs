//! # Dext Plugin Runtime
//!
//! Plugin loading and query dispatch for the Dext launcher:
//! - Discovery of plugin directories under a core and a user root
//! - Native plugins: sandboxed Lua modules run in-process
//! - Legacy Alfred workflows (`info.plist`) run as child processes
//! - Normalized result items, helper items and rendered detail views
//!
//! ## Quick Start
//!
//! ```no_run
//! use dext_runtime::{config::RuntimeConfig, init_registry, query};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init_registry(&RuntimeConfig::default()).await?;
//!
//!     let response = query("gh rust-lang").await?;
//!     for item in response.items {
//!         println!("{}", item.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Each plugin invocation runs under a deadline (5 s unless configured) and
//! can be cancelled through [`DispatchContext::cancel`]. A failing plugin
//! never hides other plugins' results; failures are reported per plugin in
//! [`QueryResponse::failures`].

pub mod config;
pub mod core;
pub mod plugins;

use std::time::Duration;

use crate::config::DEFAULT_QUERY_TIMEOUT_MS;

// Re-export commonly used types for convenience
pub use crate::core::query_processor::{
    dispatch, dispatch_helpers, dispatch_one, process_helpers, process_query, DispatchContext,
    PluginOutcome, QueryResponse,
};
pub use crate::core::{Item, Query, QueryOptions};
pub use crate::plugins::{
    current_registry, init_registry, refresh_registry, retrieve_item_details, DispatchError,
    Plugin, PluginRegistry,
};

fn default_context() -> DispatchContext {
    DispatchContext::new(Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS))
}

fn registry() -> anyhow::Result<std::sync::Arc<PluginRegistry>> {
    current_registry().ok_or_else(|| anyhow::anyhow!("Plugin registry is not initialized"))
}

/// Query the installed registry with the default deadline
pub async fn query(input: &str) -> anyhow::Result<QueryResponse> {
    let registry = registry()?;
    Ok(process_query(&registry, input, &default_context()).await)
}

/// Helper items for `input` from the installed registry
pub async fn helpers(input: &str) -> anyhow::Result<QueryResponse> {
    let registry = registry()?;
    Ok(process_helpers(&registry, input, &default_context()).await)
}

/// Detail view HTML for an item previously returned by [`query`]
pub async fn item_details(item: &Item) -> anyhow::Result<String> {
    let registry = registry()?;
    let reference = item
        .plugin
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Item '{}' has no plugin reference", item.title))?;
    let plugin = registry
        .get(&reference.path)
        .ok_or_else(|| anyhow::anyhow!("Plugin {} is no longer loaded", reference.path.display()))?;

    Ok(retrieve_item_details(item, &plugin, &default_context()).await?)
}
