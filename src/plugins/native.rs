//! Lua implementation of the native plugin contract
//!
//! # Module layout
//!
//! A native plugin directory contains `init.lua`, which must return a table:
//!
//! ```lua
//! return {
//!   keyword = "gh",
//!   action = "openurl",
//!   helper = { title = "Search GitHub" },       -- or function(query) ... end
//!   details = { type = "md", render = function(item) return "# " .. item.title end },
//!   query = function(text, options)              -- `execute` is the deprecated name
//!     return { items = { { title = text } } }
//!   end,
//! }
//! ```
//!
//! Every export may be a plain value instead of a function. Functions may
//! yield through async host APIs such as `http_get`.

use async_trait::async_trait;
use mlua::{DeserializeOptions, IntoLuaMulti, Lua, LuaSerdeExt, Table, Value};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::config::{NATIVE_LOAD_TIMEOUT_SECS, NATIVE_METADATA, NATIVE_MODULE};
use crate::core::{Item, QueryOptions};
use crate::log_warn;
use crate::plugins::details::DetailsKind;
use crate::plugins::error::PluginError;
use crate::plugins::manifest::read_native_metadata;
use crate::plugins::module::{Invocation, ModuleExports, PluginModule};
use crate::plugins::sandbox::create_secure_lua_state;

pub struct LuaModule {
    name: String,
    lua: Lua,
    table: Table,
    exports: ModuleExports,
    dev_mode: bool,
    warned_execute: AtomicBool,
    /// One call at a time; later callers wait here without holding a thread
    gate: Mutex<()>,
}

impl LuaModule {
    /// Load `init.lua` (and `meta.toml` if present) from `dir`
    pub async fn load(dir: &Path, dev_mode: bool) -> Result<Self, PluginError> {
        let module_path = dir.join(NATIVE_MODULE);
        let code = match tokio::fs::read_to_string(&module_path).await {
            Ok(code) => code,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PluginError::MissingModule(dir.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = read_native_metadata(&dir.join(NATIVE_METADATA)).await?;
        let lua = create_secure_lua_state(&name, &metadata.permissions)?;

        let budget = Invocation::new(Duration::from_secs(NATIVE_LOAD_TIMEOUT_SECS), CancellationToken::new());
        lua.set_app_data(budget.clone());
        let returned: Value = lua
            .load(code.as_str())
            .set_name(format!("@{}", module_path.display()))
            .eval_async()
            .await
            .map_err(|e| interrupted_or(e.into(), &budget))?;
        let Value::Table(table) = returned else {
            return Err(PluginError::InvalidExports);
        };

        let exports = ModuleExports {
            keyword: string_export(&table, "keyword")?,
            action: string_export(&table, "action")?,
            has_helper: !table.get::<Value>("helper")?.is_nil(),
            details: details_kind(&table)?,
            timeout: metadata.plugin.timeout.map(Duration::from_secs),
        };

        Ok(Self {
            name,
            lua,
            table,
            exports,
            dev_mode,
            warned_execute: AtomicBool::new(false),
            gate: Mutex::new(()),
        })
    }

    /// Wait for the state to be free, then arm the hook with `invocation`
    async fn enter(&self, invocation: &Invocation) -> MutexGuard<'_, ()> {
        let turn = self.gate.lock().await;
        self.lua.set_app_data(invocation.clone());
        turn
    }

    /// Call `export` with `args` if it is a function, otherwise take it as the result
    async fn resolve_export(
        &self,
        export: Value,
        args: impl IntoLuaMulti + Send,
    ) -> Result<Value, PluginError> {
        match export {
            Value::Function(function) => Ok(function.call_async::<Value>(args).await?),
            other => Ok(other),
        }
    }

    fn to_json(&self, value: Value) -> Result<Option<JsonValue>, PluginError> {
        if value.is_nil() {
            return Ok(None);
        }
        // Functions left inside result tables are dropped rather than rejected
        let options = DeserializeOptions::new().deny_unsupported_types(false);
        Ok(Some(self.lua.from_value_with(value, options)?))
    }

    /// `query`, or the deprecated `execute` when only that is exported
    fn entry_point(&self) -> Result<Value, PluginError> {
        let query = self.table.get::<Value>("query")?;
        if !query.is_nil() {
            return Ok(query);
        }

        let execute = self.table.get::<Value>("execute")?;
        if !execute.is_nil() && self.dev_mode && !self.warned_execute.swap(true, Ordering::Relaxed) {
            log_warn!(
                "Plugin '{}' exports `execute`, which is deprecated; rename it to `query`",
                self.name
            );
        }
        Ok(execute)
    }
}

#[async_trait]
impl PluginModule for LuaModule {
    fn exports(&self) -> &ModuleExports {
        &self.exports
    }

    async fn query(
        &self,
        text: &str,
        options: QueryOptions,
        invocation: Invocation,
    ) -> Result<Option<JsonValue>, PluginError> {
        let _turn = self.enter(&invocation).await;
        let result = async {
            let entry = self.entry_point()?;
            let options = self.lua.to_value(&options)?;
            self.resolve_export(entry, (text.to_string(), options)).await
        }
        .await
        .map_err(|e| interrupted_or(e, &invocation))?;
        self.to_json(result)
    }

    async fn helper(&self, text: &str, invocation: Invocation) -> Result<Option<JsonValue>, PluginError> {
        let _turn = self.enter(&invocation).await;
        let result = async {
            let helper = self.table.get::<Value>("helper")?;
            self.resolve_export(helper, text.to_string()).await
        }
        .await
        .map_err(|e| interrupted_or(e, &invocation))?;
        self.to_json(result)
    }

    async fn render_details(
        &self,
        item: &Item,
        invocation: Invocation,
    ) -> Result<Option<String>, PluginError> {
        let _turn = self.enter(&invocation).await;
        let Value::Table(details) = self.table.get::<Value>("details")? else {
            return Ok(None);
        };
        let render = details.get::<Value>("render")?;
        let item = self.lua.to_value(item)?;

        let rendered = self
            .resolve_export(render, item)
            .await
            .map_err(|e| interrupted_or(e, &invocation))?;
        match rendered {
            Value::Nil => Ok(None),
            Value::String(content) => Ok(Some(content.to_string_lossy())),
            Value::Integer(n) => Ok(Some(n.to_string())),
            Value::Number(n) => Ok(Some(n.to_string())),
            other => Err(PluginError::InvalidExport {
                name: "details.render".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }
}

/// Errors raised once the budget is spent come from the hook, not the plugin
fn interrupted_or(error: PluginError, invocation: &Invocation) -> PluginError {
    if invocation.is_spent() {
        PluginError::Interrupted
    } else {
        error
    }
}

fn string_export(table: &Table, name: &str) -> Result<Option<String>, PluginError> {
    match table.get::<Value>(name)? {
        Value::Nil => Ok(None),
        Value::String(s) => Ok(Some(s.to_string_lossy())),
        other => Err(PluginError::InvalidExport {
            name: name.to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

fn details_kind(table: &Table) -> Result<Option<DetailsKind>, PluginError> {
    match table.get::<Value>("details")? {
        Value::Nil => Ok(None),
        Value::Table(details) => Ok(Some(
            string_export(&details, "type")?
                .map(|kind| DetailsKind::parse(&kind))
                .unwrap_or_default(),
        )),
        other => Err(PluginError::InvalidExport {
            name: "details".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}
