//! Error types for plugin loading and query dispatch

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::ItemsError;

/// Failure while loading or calling a native module
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("Invalid meta.toml: {0}")]
    Metadata(#[from] toml::de::Error),

    #[error("No native module found in {}", .0.display())]
    MissingModule(PathBuf),

    #[error("Native module must return a table of exports")]
    InvalidExports,

    #[error("Export `{name}` has an unsupported type: {found}")]
    InvalidExport { name: String, found: String },

    #[error("Plugin code stopped: deadline reached or call cancelled")]
    Interrupted,
}

/// Failure of a single plugin invocation, surfaced to the query caller
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to spawn workflow {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workflow I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workflow output is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Invalid result document: {0}")]
    Protocol(#[from] ItemsError),

    #[error("Plugin raised an error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Plugin timed out after {0:?}")]
    Timeout(Duration),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Plugin task failed: {0}")]
    Task(String),
}

impl DispatchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Short machine-readable kind for hosts that show failed-plugin badges
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } | Self::Io(_) | Self::Task(_) => "runtime",
            Self::Parse(_) | Self::Protocol(_) => "protocol",
            Self::Plugin(_) => "plugin",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<mlua::Error> for DispatchError {
    fn from(e: mlua::Error) -> Self {
        Self::Plugin(PluginError::Lua(e))
    }
}
