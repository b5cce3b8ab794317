//! Lua environment for native plugins
//!
//! Native modules run in-process, so the state they get is stripped of file,
//! process and dynamic-loading access before any plugin code executes.
//!
//! Every state also carries an instruction hook. Whoever calls into the state
//! stores the call's [`Invocation`] as app data first; once it is spent the
//! hook raises an error inside the running Lua code, loops included.

use mlua::{HookTriggers, Lua, Table, Value, VmState};

use crate::config::{NATIVE_HOOK_INTERVAL, NATIVE_MEMORY_LIMIT};
use crate::plugins::api::{register_http_api, register_logging_api};
use crate::plugins::manifest::PluginPermissions;
use crate::plugins::module::Invocation;

const BLOCKED_GLOBALS: &[&str] = &["os", "io", "load", "loadfile", "dofile", "debug", "require"];

/// Create a sandboxed Lua state for the plugin called `plugin_name`
pub fn create_secure_lua_state(
    plugin_name: &str,
    permissions: &PluginPermissions,
) -> mlua::Result<Lua> {
    let lua = Lua::new();
    let globals = lua.globals();

    for name in BLOCKED_GLOBALS {
        globals.set(*name, Value::Nil)?;
    }

    if let Ok(package) = globals.get::<Table>("package") {
        package.set("loadlib", Value::Nil)?;
        package.set("cpath", Value::Nil)?;
        package.set("path", Value::Nil)?;
    }

    lua.set_memory_limit(NATIVE_MEMORY_LIMIT)?;
    install_budget_hook(&lua)?;

    register_logging_api(&lua, plugin_name)?;
    register_http_api(&lua, plugin_name, permissions)?;

    Ok(lua)
}

fn install_budget_hook(lua: &Lua) -> mlua::Result<()> {
    let triggers = HookTriggers::new().every_nth_instruction(NATIVE_HOOK_INTERVAL);
    lua.set_global_hook(triggers, |lua, _debug| {
        let spent = lua
            .app_data_ref::<Invocation>()
            .is_some_and(|invocation| invocation.is_spent());
        if spent {
            return Err(mlua::Error::runtime("plugin deadline reached"));
        }
        Ok(VmState::Continue)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_sandbox_blocks_dangerous_libs() {
        let lua = create_secure_lua_state("test", &PluginPermissions::default()).unwrap();

        for name in BLOCKED_GLOBALS {
            assert!(lua.globals().get::<Value>(*name).unwrap().is_nil(), "{name} still reachable");
        }
        assert!(lua.load("return os.time()").exec().is_err());
    }

    #[test]
    fn test_sandbox_exposes_logging_but_not_network_by_default() {
        let lua = create_secure_lua_state("test", &PluginPermissions::default()).unwrap();

        assert!(lua.globals().get::<Value>("log_info").unwrap().is_function());
        assert!(lua.globals().get::<Value>("print").unwrap().is_function());
        assert!(lua.globals().get::<Value>("http_get").unwrap().is_nil());
        lua.load(r#"print("hello", 1, nil)"#).exec().unwrap();
    }

    #[test]
    fn test_sandbox_network_permission_registers_http() {
        let permissions = PluginPermissions {
            network: true,
            allowed_domains: vec!["example.com".to_string()],
            user_agent: None,
        };
        let lua = create_secure_lua_state("test", &permissions).unwrap();
        assert!(lua.globals().get::<Value>("http_get").unwrap().is_function());
    }

    #[test]
    fn test_spent_invocation_stops_busy_loop() {
        let lua = create_secure_lua_state("test", &PluginPermissions::default()).unwrap();
        lua.set_app_data(Invocation::new(Duration::from_millis(20), CancellationToken::new()));

        let err = lua.load("while true do end").exec().unwrap_err();
        assert!(err.to_string().contains("deadline"));
    }

    #[test]
    fn test_cancelled_invocation_stops_busy_loop() {
        let lua = create_secure_lua_state("test", &PluginPermissions::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        lua.set_app_data(Invocation::new(Duration::from_secs(60), cancel));

        assert!(lua.load("local n = 0 while true do n = n + 1 end").exec().is_err());
    }

    #[test]
    fn test_live_invocation_runs_to_completion() {
        let lua = create_secure_lua_state("test", &PluginPermissions::default()).unwrap();
        lua.set_app_data(Invocation::new(Duration::from_secs(60), CancellationToken::new()));

        let sum: i64 = lua
            .load("local s = 0 for i = 1, 100000 do s = s + i end return s")
            .eval()
            .unwrap();
        assert_eq!(sum, 5_000_050_000);
    }
}
