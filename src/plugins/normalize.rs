//! Item normalization: ties raw plugin items back to their plugin

use std::path::Path;

use crate::core::{Icon, Item};
use crate::plugins::registry::Plugin;

/// True for `scheme:...` strings. Single-letter schemes are drive letters.
fn is_url(path: &str) -> bool {
    url::Url::parse(path).is_ok_and(|url| url.scheme().len() > 1)
}

fn resolve_icon(icon: &Icon, plugin_dir: &Path) -> Icon {
    let path = &icon.path;
    if path.is_empty() || is_url(path) || Path::new(path).is_absolute() {
        return icon.clone();
    }

    Icon {
        path: plugin_dir.join(path).to_string_lossy().into_owned(),
        extra: icon.extra.clone(),
    }
}

/// Decorate raw `items` produced by `plugin`.
///
/// Relative icon paths are resolved against the plugin directory, the
/// plugin reference is stamped, and the plugin's keyword/action fill in
/// wherever the item has none of its own.
pub fn connect_items(items: &[Item], plugin: &Plugin) -> Vec<Item> {
    items
        .iter()
        .map(|item| Item {
            icon: item.icon.as_ref().map(|icon| resolve_icon(icon, &plugin.path)),
            keyword: item
                .keyword
                .clone()
                .or_else(|| plugin.active_keyword().map(str::to_string)),
            action: item
                .action
                .clone()
                .or_else(|| plugin.default_action().map(str::to_string)),
            plugin: Some(plugin.reference()),
            ..item.clone()
        })
        .collect()
}
