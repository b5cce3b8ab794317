use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

// Result-size hint handed to native plugins; advisory only
pub const MAX_RESULTS: usize = 25;

// Per-query deadline applied to every plugin invocation
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5000;

// Plugin directory layout
pub const WORKFLOW_DESCRIPTOR: &str = "info.plist";
pub const PACKAGE_MANIFEST: &str = "package.json";
pub const NATIVE_MODULE: &str = "init.lua";
pub const NATIVE_METADATA: &str = "meta.toml";
pub const DEFAULT_WORKFLOW_ENTRY: &str = "main";

// Manifest keyword marking a styling-only package
pub const THEME_SENTINEL: &str = "dext-theme";

// Directory entries written by file managers, never plugins
pub const METADATA_SENTINELS: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

// Alfred object kinds recognised in info.plist
pub const SCRIPT_FILTER_KIND: &str = "alfred.workflow.input.scriptfilter";
pub const OPEN_URL_KIND: &str = "alfred.workflow.action.openurl";
pub const OPEN_URL_ACTION: &str = "openurl";

// Native plugin sandbox limits
pub const NATIVE_MEMORY_LIMIT: usize = 10_000_000;
pub const NATIVE_HTTP_TIMEOUT_SECS: u64 = 5;
pub const NATIVE_LOAD_TIMEOUT_SECS: u64 = 5;
// Instructions between deadline checks inside plugin code
pub const NATIVE_HOOK_INTERVAL: u32 = 1000;

pub fn dev_mode_from_env() -> bool {
    std::env::var("DEXT_DEV")
        .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Settings shared by the loader and the dispatcher
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Plugins bundled with the launcher
    pub core_plugins_dir: PathBuf,
    /// Plugins installed by the user
    pub user_plugins_dir: PathBuf,
    /// Deadline for a single plugin invocation
    pub query_timeout: Duration,
    /// Enables developer-facing notices such as deprecated entry points
    pub dev_mode: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            core_plugins_dir: PathBuf::from("plugins/core"),
            user_plugins_dir: PathBuf::from("plugins/user"),
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
            dev_mode: dev_mode_from_env(),
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "Dext launcher plugin runtime")]
pub struct Cli {
    /// Directory holding bundled plugins
    #[arg(long, default_value = "plugins/core")]
    pub core_dir: PathBuf,

    /// Directory holding user-installed plugins
    #[arg(long, default_value = "plugins/user")]
    pub user_dir: PathBuf,

    /// Per-plugin query timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT_MS)]
    pub timeout: u64,

    /// Development mode (deprecation notices)
    #[arg(long)]
    pub dev: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Enable trace output (adds module paths)
    #[arg(short, long)]
    pub trace: bool,

    /// Emit journald-style structured logs
    #[arg(long)]
    pub journald: bool,

    /// List resolved plugins instead of querying
    #[arg(long)]
    pub list: bool,

    /// Print helper items instead of query results
    #[arg(long)]
    pub helpers: bool,

    /// Query tokens, e.g. `gh rust-lang`
    pub query: Vec<String>,
}

impl Cli {
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            core_plugins_dir: self.core_dir.clone(),
            user_plugins_dir: self.user_dir.clone(),
            query_timeout: Duration::from_millis(self.timeout),
            dev_mode: self.dev || dev_mode_from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_runtime_config() {
        let cli = Cli::try_parse_from([
            "dext-runtime",
            "--user-dir",
            "/tmp/dext-user",
            "--timeout",
            "250",
            "--dev",
            "gh",
            "rust",
        ])
        .unwrap();

        let config = cli.runtime_config();
        assert_eq!(config.user_plugins_dir, PathBuf::from("/tmp/dext-user"));
        assert_eq!(config.core_plugins_dir, PathBuf::from("plugins/core"));
        assert_eq!(config.query_timeout, Duration::from_millis(250));
        assert!(config.dev_mode);
        assert_eq!(cli.query, vec!["gh", "rust"]);
    }
}
