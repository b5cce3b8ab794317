//! On-disk plugin manifests
//!
//! - `package.json`: package metadata; only `keywords` matters here, to tell
//!   themes apart from functional plugins.
//! - `meta.toml`: optional settings for native modules (timeout, network
//!   permissions).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::plugins::error::PluginError;

/// The subset of `package.json` the runtime reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Native module settings parsed from meta.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeMetadata {
    #[serde(default)]
    pub plugin: NativeInfo,
    #[serde(default)]
    pub permissions: PluginPermissions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Invocation timeout in seconds, overriding the runtime default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginPermissions {
    #[serde(default)]
    pub network: bool,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Custom User-Agent for HTTP requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Read meta.toml; a missing file means default settings
pub async fn read_native_metadata(path: &Path) -> Result<NativeMetadata, PluginError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(NativeMetadata::default());
        }
        Err(e) => return Err(e.into()),
    };

    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_native_metadata_valid() {
        let temp_dir = TempDir::new().unwrap();
        let meta_path = temp_dir.path().join("meta.toml");

        let mut file = File::create(&meta_path).unwrap();
        writeln!(
            file,
            r#"[plugin]
description = "GitHub search"
timeout = 2

[permissions]
network = true
allowed_domains = ["api.github.com"]"#
        )
        .unwrap();

        let metadata = read_native_metadata(&meta_path).await.unwrap();
        assert_eq!(metadata.plugin.timeout, Some(2));
        assert!(metadata.permissions.network);
        assert_eq!(metadata.permissions.allowed_domains, vec!["api.github.com"]);
    }

    #[tokio::test]
    async fn test_read_native_metadata_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let metadata = read_native_metadata(&temp_dir.path().join("meta.toml"))
            .await
            .unwrap();

        assert!(!metadata.permissions.network);
        assert!(metadata.plugin.timeout.is_none());
    }

    #[tokio::test]
    async fn test_read_native_metadata_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let meta_path = temp_dir.path().join("meta.toml");
        std::fs::write(&meta_path, "[plugin]\ntimeout = \"soon\"\n").unwrap();

        let result = read_native_metadata(&meta_path).await;
        assert!(matches!(result, Err(PluginError::Metadata(_))));
    }

    #[test]
    fn test_package_manifest_defaults() {
        let manifest: PackageManifest = serde_json::from_str(r#"{"name": "dext-theme-one"}"#).unwrap();
        assert!(manifest.keywords.is_empty());
    }
}
