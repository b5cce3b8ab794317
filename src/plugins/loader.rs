//! Plugin loading logic
//!
//! Discovery, theme filtering and schema resolution, producing a complete
//! [`PluginRegistry`]. Invalid plugins are logged and left out; they never
//! fail the load as a whole.

use anyhow::Context;
use futures::future::join_all;
use std::path::{Path, PathBuf};

use crate::config::RuntimeConfig;
use crate::core::logger::{log_init_ok_with_details, log_init_start, log_init_warn};
use crate::plugins::discovery::{absolute, discover_plugins, DiscoveredPlugin};
use crate::plugins::error::PluginError;
use crate::plugins::filter::{is_core_plugin, is_plugin_a_theme};
use crate::plugins::registry::{Plugin, PluginRegistry};
use crate::plugins::schema::resolve_schema;
use crate::{log_debug, log_info, log_warn};

/// Load every plugin under the configured core and user roots
pub async fn load_all_plugins(config: &RuntimeConfig) -> anyhow::Result<PluginRegistry> {
    log_init_start("Plugin Loader");

    let user_root = absolute(&config.user_plugins_dir);
    if !tokio::fs::try_exists(&user_root).await.unwrap_or(false) {
        log_info!("Creating user plugins directory {}", user_root.display());
        tokio::fs::create_dir_all(&user_root)
            .await
            .with_context(|| format!("Failed to create {}", user_root.display()))?;
    }

    let mut roots = vec![absolute(&config.core_plugins_dir)];
    if !roots.contains(&user_root) {
        roots.push(user_root.clone());
    }

    let discovered = discover_plugins(&roots).await;
    let theme_flags = join_all(discovered.iter().map(|d| is_plugin_a_theme(&d.path))).await;

    let mut themes = 0;
    let candidates: Vec<DiscoveredPlugin> = discovered
        .into_iter()
        .zip(theme_flags)
        .filter_map(|(candidate, is_theme)| {
            if is_theme {
                log_debug!("Skipping theme {}", candidate.path.display());
                themes += 1;
                None
            } else {
                Some(candidate)
            }
        })
        .collect();

    let resolved = join_all(
        candidates
            .iter()
            .map(|candidate| resolve_plugin(&candidate.path, &user_root, config.dev_mode)),
    )
    .await;

    let mut plugins = Vec::new();
    let mut skipped = 0;
    for (candidate, result) in candidates.iter().zip(resolved) {
        match result {
            Ok(plugin) => {
                log_debug!(
                    "Loaded {} plugin '{}' (keyword: {})",
                    plugin.schema_kind(),
                    plugin.name,
                    plugin.active_keyword().unwrap_or("<none>")
                );
                plugins.push(plugin);
            }
            Err(e) => {
                log_warn!("Failed to load plugin from {}: {}", candidate.path.display(), e);
                skipped += 1;
            }
        }
    }

    let summary = format!(
        "{} plugin(s) loaded, {} skipped, {} theme(s) ignored",
        plugins.len(),
        skipped,
        themes
    );
    if skipped > 0 {
        log_init_warn("Plugin Loader", &summary);
    } else {
        log_init_ok_with_details("Plugin Loader", &summary);
    }

    Ok(PluginRegistry::new(plugins))
}

/// Resolve one plugin directory into a [`Plugin`]
pub async fn resolve_plugin(path: &Path, user_root: &Path, dev_mode: bool) -> Result<Plugin, PluginError> {
    let resolution = resolve_schema(path, dev_mode).await?;

    Ok(Plugin {
        path: PathBuf::from(path),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        is_core: is_core_plugin(path, user_root),
        schema: resolution.schema,
        keyword: resolution.keyword,
        action: resolution.action,
    })
}
