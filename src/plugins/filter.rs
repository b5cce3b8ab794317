//! Theme and core/user classification
//!
//! Both checks run before schema resolution so theme packages never cost a
//! module load.

use std::path::Path;

use crate::config::{PACKAGE_MANIFEST, THEME_SENTINEL};
use crate::log_debug;
use crate::plugins::discovery::absolute;
use crate::plugins::manifest::PackageManifest;

/// A plugin is core unless it sits directly under the user plugin root
pub fn is_core_plugin(path: &Path, user_root: &Path) -> bool {
    let path = absolute(path);
    match path.parent() {
        Some(parent) => parent != absolute(user_root),
        None => true,
    }
}

/// True when the plugin's package.json tags it with the theme keyword.
///
/// Any failure to read or parse the manifest keeps the plugin.
pub async fn is_plugin_a_theme(path: &Path) -> bool {
    let manifest_path = path.join(PACKAGE_MANIFEST);
    let content = match tokio::fs::read(&manifest_path).await {
        Ok(content) => content,
        Err(_) => return false,
    };

    match serde_json::from_slice::<PackageManifest>(&content) {
        Ok(manifest) => manifest.keywords.iter().any(|k| k == THEME_SENTINEL),
        Err(e) => {
            log_debug!("Ignoring unreadable {}: {}", manifest_path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_core_classification() {
        let user_root = Path::new("/home/me/.dext/plugins");
        assert!(!is_core_plugin(&user_root.join("github"), user_root));
        assert!(is_core_plugin(Path::new("/opt/dext/plugins/calc"), user_root));
        // Nested deeper than a direct child is not a user plugin
        assert!(is_core_plugin(&user_root.join("a/b"), user_root));
    }

    #[tokio::test]
    async fn test_theme_detection() {
        let temp_dir = TempDir::new().unwrap();
        let theme = temp_dir.path().join("dark");
        let plugin = temp_dir.path().join("github");
        let bare = temp_dir.path().join("bare");
        let broken = temp_dir.path().join("broken");
        for dir in [&theme, &plugin, &bare, &broken] {
            fs::create_dir(dir).unwrap();
        }

        fs::write(
            theme.join("package.json"),
            r#"{"name": "dext-dark", "keywords": ["dext", "dext-theme"]}"#,
        )
        .unwrap();
        fs::write(
            plugin.join("package.json"),
            r#"{"name": "dext-github", "keywords": ["dext", "dext-plugin"]}"#,
        )
        .unwrap();
        fs::write(broken.join("package.json"), "{ not json").unwrap();

        assert!(is_plugin_a_theme(&theme).await);
        assert!(!is_plugin_a_theme(&plugin).await);
        assert!(!is_plugin_a_theme(&bare).await);
        assert!(!is_plugin_a_theme(&broken).await);
    }
}
