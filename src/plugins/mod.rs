//! Plugin system for the Dext launcher
//!
//! Plugins live in directories under a core root (bundled) and a user root.
//! Each one speaks one of two protocols:
//!
//! - **Native**: `init.lua` returning a table of exports, run in-process in a
//!   sandboxed Lua state (see [`native`]).
//! - **Legacy workflow**: an Alfred-style directory with `info.plist`, run as
//!   a child process that prints `{"items": [...]}` (see [`workflow`]).
//!
//! Packages tagged `dext-theme` in their `package.json` are styling-only and
//! never loaded.
//!
//! # Security
//!
//! Native plugins run with:
//! - No file I/O, process or dynamic-loading access
//! - Network access only with `network = true` in meta.toml, restricted to
//!   the allowed domains
//! - A memory limit and the per-query deadline

pub mod api;
pub mod details;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod helper;
pub mod loader;
pub mod manifest;
pub mod module;
pub mod native;
pub mod normalize;
pub mod registry;
pub mod sandbox;
pub mod schema;
pub mod workflow;

pub use details::retrieve_item_details;
pub use error::{DispatchError, PluginError};
pub use helper::resolve_helper;
pub use loader::load_all_plugins;
pub use module::{Invocation, ModuleExports, PluginModule};
pub use normalize::connect_items;
pub use registry::{
    current_registry, init_registry, refresh_registry, Plugin, PluginRegistry, PluginSummary,
};
pub use schema::{Schema, SchemaKind, WorkflowEntry};
