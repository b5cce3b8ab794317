//! Plugin directory discovery
//!
//! Lists the immediate children of each plugin root. Discovery never fails:
//! a root that is missing or unreadable simply contributes no candidates.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::config::METADATA_SENTINELS;
use crate::log_debug;

/// A candidate plugin path together with the root it was found under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    pub path: PathBuf,
    pub root: PathBuf,
}

/// Entries file managers drop into directories (`.DS_Store` and friends)
pub fn is_metadata_entry(name: &OsStr) -> bool {
    METADATA_SENTINELS.iter().any(|sentinel| name == OsStr::new(sentinel))
}

/// Absolute form of `path`, falling back to the path as given
pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Absolute paths of the immediate children of `dir`, sorted by path
pub async fn list_plugin_dirs(dir: &Path) -> Vec<PathBuf> {
    let dir = absolute(dir);

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) => {
            log_debug!("Plugin root {} not readable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                if is_metadata_entry(&entry.file_name()) {
                    continue;
                }
                paths.push(entry.path());
            }
            Ok(None) => break,
            Err(e) => {
                log_debug!("Stopped listing {}: {}", dir.display(), e);
                break;
            }
        }
    }

    paths.sort();
    paths
}

/// Union of the candidates under every root, in root order
pub async fn discover_plugins(roots: &[PathBuf]) -> Vec<DiscoveredPlugin> {
    let mut discovered = Vec::new();

    for root in roots {
        let root = absolute(root);
        for path in list_plugin_dirs(&root).await {
            discovered.push(DiscoveredPlugin {
                path,
                root: root.clone(),
            });
        }
    }

    discovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_skips_metadata_entries() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".DS_Store"), b"").unwrap();
        fs::create_dir(temp_dir.path().join("alpha")).unwrap();
        fs::write(temp_dir.path().join("Thumbs.db"), b"").unwrap();
        fs::create_dir(temp_dir.path().join("zeta")).unwrap();

        let paths = list_plugin_dirs(temp_dir.path()).await;
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(paths.iter().all(|p| p.is_absolute()));
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let paths = list_plugin_dirs(&temp_dir.path().join("does-not-exist")).await;
        assert!(paths.is_empty());
    }

    #[tokio::test]
    async fn test_discover_keeps_originating_root() {
        let core = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::create_dir(core.path().join("calc")).unwrap();
        fs::create_dir(user.path().join("github")).unwrap();

        let roots = vec![core.path().to_path_buf(), user.path().to_path_buf()];
        let discovered = discover_plugins(&roots).await;

        assert_eq!(discovered.len(), 2);
        assert_eq!(discovered[0].root, absolute(core.path()));
        assert!(discovered[0].path.ends_with("calc"));
        assert_eq!(discovered[1].root, absolute(user.path()));
        assert!(discovered[1].path.ends_with("github"));
    }
}
