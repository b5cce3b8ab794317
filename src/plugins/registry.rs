//! Plugin registry for managing loaded plugins
//!
//! The registry is immutable once built. A process-wide slot holds the
//! current one; refreshing builds a complete new registry and swaps it in, so
//! queries already running keep the `Arc` they started with.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::core::{PluginRef, Query};
use crate::plugins::loader::load_all_plugins;
use crate::plugins::module::PluginModule;
use crate::plugins::schema::{Schema, SchemaKind};
use crate::{log_debug, log_info};

/// A resolved plugin
#[derive(Debug, Clone)]
pub struct Plugin {
    pub path: PathBuf,
    pub name: String,
    pub is_core: bool,
    pub schema: Schema,
    pub keyword: Option<String>,
    pub action: Option<String>,
}

impl Plugin {
    pub fn reference(&self) -> PluginRef {
        PluginRef {
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }

    /// The native module, if this plugin has one
    pub fn module(&self) -> Option<&Arc<dyn PluginModule>> {
        match &self.schema {
            Schema::Native(module) => Some(module),
            Schema::LegacyWorkflow(_) => None,
        }
    }

    pub fn schema_kind(&self) -> SchemaKind {
        self.schema.kind()
    }

    /// Keyword that activates the plugin; `None` means always active
    pub fn active_keyword(&self) -> Option<&str> {
        self.keyword.as_deref().filter(|k| !k.is_empty())
    }

    /// Non-empty default action
    pub fn default_action(&self) -> Option<&str> {
        self.action.as_deref().filter(|a| !a.is_empty())
    }

    /// Per-plugin deadline override from native metadata
    pub fn timeout(&self) -> Option<Duration> {
        self.module().and_then(|module| module.exports().timeout)
    }

    pub fn has_helper(&self) -> bool {
        self.module().is_some_and(|module| module.exports().has_helper)
    }

    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            name: self.name.clone(),
            path: self.path.clone(),
            schema: self.schema_kind(),
            is_core: self.is_core,
            keyword: self.keyword.clone(),
            action: self.action.clone(),
            helper: self.has_helper(),
        }
    }
}

/// Serializable description of a plugin, as printed by `--list`
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub name: String,
    pub path: PathBuf,
    pub schema: SchemaKind,
    pub is_core: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub helper: bool,
}

#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<Plugin>>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<Plugin>) -> Self {
        Self {
            plugins: plugins.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn plugins(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    /// Look a plugin up by its directory
    pub fn get(&self, path: &std::path::Path) -> Option<Arc<Plugin>> {
        self.plugins.iter().find(|p| p.path == path).cloned()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugins activated by `query`, each with the tokens it receives.
    ///
    /// A plugin whose keyword equals the first token gets the remaining
    /// tokens; a plugin without a keyword gets the whole query.
    pub fn matching(&self, query: &Query) -> Vec<(Arc<Plugin>, Query)> {
        self.plugins
            .iter()
            .filter_map(|plugin| match plugin.active_keyword() {
                None => Some((Arc::clone(plugin), query.clone())),
                Some(keyword) if query.head() == Some(keyword) => {
                    Some((Arc::clone(plugin), query.tail()))
                }
                Some(_) => None,
            })
            .collect()
    }
}

static REGISTRY: Lazy<RwLock<Option<Arc<PluginRegistry>>>> = Lazy::new(|| RwLock::new(None));

/// The registry currently installed, if any
pub fn current_registry() -> Option<Arc<PluginRegistry>> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replace the installed registry, returning the previous one
pub fn install_registry(registry: PluginRegistry) -> Option<Arc<PluginRegistry>> {
    let mut slot = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    slot.replace(Arc::new(registry))
}

/// Build and install the registry for the first time
pub async fn init_registry(config: &RuntimeConfig) -> anyhow::Result<Arc<PluginRegistry>> {
    if current_registry().is_some() {
        anyhow::bail!("Plugin registry is already initialized");
    }

    let registry = Arc::new(load_all_plugins(config).await?);

    let mut slot = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        anyhow::bail!("Plugin registry was initialized concurrently");
    }
    *slot = Some(Arc::clone(&registry));
    Ok(registry)
}

/// Rebuild the registry from disk and swap it in
pub async fn refresh_registry(config: &RuntimeConfig) -> anyhow::Result<Arc<PluginRegistry>> {
    let registry = load_all_plugins(config).await?;
    let count = registry.len();

    let previous = install_registry(registry);
    log_info!(
        "Plugin registry refreshed: {} plugin(s) (previously {})",
        count,
        previous.as_ref().map_or(0, |r| r.len())
    );
    if let Some(previous) = previous {
        log_debug!(
            "Previous registry still shared by {} reader(s)",
            Arc::strong_count(&previous) - 1
        );
    }

    current_registry().ok_or_else(|| anyhow::anyhow!("Plugin registry vanished after refresh"))
}
