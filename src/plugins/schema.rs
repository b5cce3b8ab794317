//! Schema resolution: which protocol a plugin speaks
//!
//! A readable `info.plist` marks a legacy Alfred workflow; everything else is
//! a native module. The result is fixed at load time.

use serde::Serialize;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{
    DEFAULT_WORKFLOW_ENTRY, OPEN_URL_ACTION, OPEN_URL_KIND, SCRIPT_FILTER_KIND, WORKFLOW_DESCRIPTOR,
};
use crate::log_debug;
use crate::plugins::error::PluginError;
use crate::plugins::module::PluginModule;
use crate::plugins::native::LuaModule;

/// The protocol a plugin speaks
#[derive(Clone)]
pub enum Schema {
    /// In-process module behind the capability contract
    Native(Arc<dyn PluginModule>),
    /// Alfred-style workflow run as a child process
    LegacyWorkflow(WorkflowEntry),
}

impl Schema {
    pub fn kind(&self) -> SchemaKind {
        match self {
            Schema::Native(_) => SchemaKind::Dext,
            Schema::LegacyWorkflow(_) => SchemaKind::Alfred,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Native(module) => f.debug_tuple("Native").field(module.exports()).finish(),
            Schema::LegacyWorkflow(entry) => f.debug_tuple("LegacyWorkflow").field(entry).finish(),
        }
    }
}

/// Wire name of a schema (`dext` / `alfred`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Dext,
    Alfred,
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::Dext => write!(f, "dext"),
            SchemaKind::Alfred => write!(f, "alfred"),
        }
    }
}

/// How a workflow's script filter is started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEntry {
    /// Executable relative to the plugin directory
    Executable(PathBuf),
    /// Inline script handed to an interpreter
    Script { interpreter: Interpreter, source: String },
}

impl Default for WorkflowEntry {
    fn default() -> Self {
        Self::Executable(PathBuf::from(DEFAULT_WORKFLOW_ENTRY))
    }
}

/// Script languages selectable through the script filter's `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpreter {
    Sh,
    Bash,
    Zsh,
    Php,
    Ruby,
    Python,
    Python3,
    Perl,
}

impl Interpreter {
    pub fn from_alfred_type(script_type: i64) -> Self {
        match script_type {
            0 => Self::Bash,
            1 => Self::Php,
            2 => Self::Ruby,
            3 => Self::Python,
            4 => Self::Perl,
            5 => Self::Zsh,
            9 => Self::Python3,
            _ => Self::Sh,
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            Self::Sh => "/bin/sh",
            Self::Bash => "/bin/bash",
            Self::Zsh => "/bin/zsh",
            Self::Php => "php",
            Self::Ruby => "ruby",
            Self::Python => "python",
            Self::Python3 => "python3",
            Self::Perl => "perl",
        }
    }

    /// Flag that makes the interpreter run the next argument as source
    pub fn inline_flag(self) -> &'static str {
        match self {
            Self::Php => "-r",
            Self::Ruby | Self::Perl => "-e",
            _ => "-c",
        }
    }

    /// Shells bind the first argument after `-c` to `$0`
    pub fn takes_arg0(self) -> bool {
        matches!(self, Self::Sh | Self::Bash | Self::Zsh)
    }
}

/// Outcome of schema resolution for one plugin directory
#[derive(Debug, Clone)]
pub struct Resolution {
    pub schema: Schema,
    pub keyword: Option<String>,
    pub action: Option<String>,
}

/// Parsed view of an Alfred `info.plist`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowDescriptor {
    pub keyword: Option<String>,
    pub action: Option<String>,
    pub entry: WorkflowEntry,
}

#[derive(Debug)]
pub enum DescriptorState {
    Unreadable,
    Invalid(String),
    Parsed(WorkflowDescriptor),
}

/// Parse an Alfred workflow descriptor (XML or binary plist)
pub fn parse_workflow_descriptor(bytes: &[u8]) -> Result<WorkflowDescriptor, String> {
    let root = plist::Value::from_reader(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let objects = root
        .as_dictionary()
        .and_then(|dict| dict.get("objects"))
        .and_then(plist::Value::as_array)
        .ok_or_else(|| "descriptor has no `objects` array".to_string())?;

    let mut descriptor = WorkflowDescriptor::default();
    for object in objects.iter().filter_map(plist::Value::as_dictionary) {
        let kind = object.get("type").and_then(plist::Value::as_string);
        let config = object.get("config").and_then(plist::Value::as_dictionary);

        match kind {
            Some(SCRIPT_FILTER_KIND) => {
                let Some(config) = config else { continue };
                if let Some(keyword) = config.get("keyword").and_then(plist::Value::as_string) {
                    descriptor.keyword = Some(keyword.to_string());
                }
                if let Some(entry) = script_filter_entry(config) {
                    descriptor.entry = entry;
                }
            }
            Some(OPEN_URL_KIND) => descriptor.action = Some(OPEN_URL_ACTION.to_string()),
            _ => {}
        }
    }

    Ok(descriptor)
}

fn script_filter_entry(config: &plist::Dictionary) -> Option<WorkflowEntry> {
    let script_type = config.get("type").and_then(plist::Value::as_signed_integer);
    let non_empty = |key: &str| {
        config
            .get(key)
            .and_then(plist::Value::as_string)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    if script_type == Some(8) {
        return non_empty("scriptfile").map(|file| WorkflowEntry::Executable(PathBuf::from(file)));
    }

    non_empty("script").map(|source| WorkflowEntry::Script {
        interpreter: Interpreter::from_alfred_type(script_type.unwrap_or(0)),
        source,
    })
}

pub async fn read_workflow_descriptor(dir: &Path) -> DescriptorState {
    match tokio::fs::read(dir.join(WORKFLOW_DESCRIPTOR)).await {
        Err(_) => DescriptorState::Unreadable,
        Ok(bytes) => match parse_workflow_descriptor(&bytes) {
            Ok(descriptor) => DescriptorState::Parsed(descriptor),
            Err(e) => DescriptorState::Invalid(e),
        },
    }
}

/// Resolve the schema of the plugin at `dir`.
///
/// An unparseable descriptor degrades to the native default, so such a
/// plugin still needs a loadable `init.lua` to survive.
pub async fn resolve_schema(dir: &Path, dev_mode: bool) -> Result<Resolution, PluginError> {
    match read_workflow_descriptor(dir).await {
        DescriptorState::Parsed(descriptor) => {
            return Ok(Resolution {
                schema: Schema::LegacyWorkflow(descriptor.entry),
                keyword: descriptor.keyword,
                action: descriptor.action,
            });
        }
        DescriptorState::Invalid(reason) => {
            log_debug!("Ignoring invalid descriptor in {}: {}", dir.display(), reason);
        }
        DescriptorState::Unreadable => {}
    }

    let module = LuaModule::load(dir, dev_mode).await?;
    let exports = module.exports().clone();
    Ok(Resolution {
        schema: Schema::Native(Arc::new(module)),
        keyword: exports.keyword,
        action: exports.action,
    })
}
