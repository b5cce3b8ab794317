//! Host functions exposed to native plugins
//!
//! - Logging into the runtime's logger, tagged with the plugin name
//! - `http_get(url)`, only for plugins granted `network` in meta.toml

use mlua::{Lua, Value, Variadic};
use std::collections::HashSet;
use std::time::Duration;

use crate::config::NATIVE_HTTP_TIMEOUT_SECS;
use crate::plugins::manifest::PluginPermissions;
use crate::{log_debug, log_error, log_info, log_warn};

/// Register `log_info`, `log_warn`, `log_error` and a logging `print`
pub fn register_logging_api(lua: &Lua, plugin_name: &str) -> mlua::Result<()> {
    let name = plugin_name.to_string();
    let log_info_fn = lua.create_function(move |_lua, msg: String| {
        log_info!("[{}] {}", name, msg);
        Ok(())
    })?;

    let name = plugin_name.to_string();
    let log_warn_fn = lua.create_function(move |_lua, msg: String| {
        log_warn!("[{}] {}", name, msg);
        Ok(())
    })?;

    let name = plugin_name.to_string();
    let log_error_fn = lua.create_function(move |_lua, msg: String| {
        log_error!("[{}] {}", name, msg);
        Ok(())
    })?;

    let name = plugin_name.to_string();
    let print_fn = lua.create_function(move |_lua, args: Variadic<Value>| {
        let parts: Vec<String> = args
            .iter()
            .map(|value| value.to_string().unwrap_or_else(|_| value.type_name().to_string()))
            .collect();
        log_debug!("[{}] {}", name, parts.join("\t"));
        Ok(())
    })?;

    let globals = lua.globals();
    globals.set("log_info", log_info_fn)?;
    globals.set("log_warn", log_warn_fn)?;
    globals.set("log_error", log_error_fn)?;
    globals.set("print", print_fn)?;

    Ok(())
}

/// Register `http_get(url) -> json` if the plugin has network permission.
///
/// The returned string is a JSON document `{"status": u16, "body": string}`.
pub fn register_http_api(
    lua: &Lua,
    plugin_name: &str,
    permissions: &PluginPermissions,
) -> mlua::Result<()> {
    if !permissions.network {
        return Ok(());
    }

    let allowed: HashSet<String> = permissions
        .allowed_domains
        .iter()
        .map(|d| d.to_lowercase())
        .collect();

    let user_agent = permissions
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("dext-plugin/{} ({})", env!("CARGO_PKG_VERSION"), plugin_name));

    let http_get = lua.create_async_function(move |_lua, url: String| {
        let allowed = allowed.clone();
        let user_agent = user_agent.clone();
        async move {
            let domain = extract_domain(&url)?;
            if !is_domain_allowed(&allowed, &domain) {
                return Err(mlua::Error::runtime(format!(
                    "Domain '{}' is not in the allowed domains list",
                    domain
                )));
            }

            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(NATIVE_HTTP_TIMEOUT_SECS))
                .user_agent(user_agent)
                .build()
                .map_err(|e| mlua::Error::runtime(format!("Failed to create HTTP client: {}", e)))?;

            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| mlua::Error::runtime(format!("HTTP request failed: {}", e)))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| mlua::Error::runtime(format!("Failed to read response body: {}", e)))?;

            Ok(serde_json::json!({ "status": status, "body": body }).to_string())
        }
    })?;

    lua.globals().set("http_get", http_get)?;
    Ok(())
}

/// An empty allow-list permits any host; otherwise the host or one of its
/// parent domains must be listed.
fn is_domain_allowed(allowed: &HashSet<String>, domain: &str) -> bool {
    if allowed.is_empty() {
        return true;
    }

    let domain = domain.to_lowercase();
    let mut candidate = domain.as_str();
    loop {
        if allowed.contains(candidate) {
            return true;
        }
        match candidate.split_once('.') {
            Some((_, parent)) if parent.contains('.') => candidate = parent,
            _ => return false,
        }
    }
}

fn extract_domain(url: &str) -> mlua::Result<String> {
    let parsed = url::Url::parse(url).map_err(|e| mlua::Error::runtime(format!("Invalid URL: {}", e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| mlua::Error::runtime("URL has no host"))?;
    Ok(host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://example.com/path").unwrap(), "example.com");
        assert_eq!(extract_domain("http://api.example.com:8080/v1").unwrap(), "api.example.com");
        assert!(extract_domain("not a url").is_err());
    }

    #[test]
    fn test_domain_allow_list() {
        let allowed: HashSet<String> = ["github.com".to_string()].into_iter().collect();

        assert!(is_domain_allowed(&allowed, "github.com"));
        assert!(is_domain_allowed(&allowed, "API.github.com"));
        assert!(!is_domain_allowed(&allowed, "github.com.evil.io"));
        assert!(!is_domain_allowed(&allowed, "gitlab.com"));
        assert!(is_domain_allowed(&HashSet::new(), "anything.dev"));
    }

    #[test]
    fn test_logging_api_accepts_messages() {
        let lua = Lua::new();
        register_logging_api(&lua, "calc").unwrap();
        lua.load(r#"log_info("ready"); log_warn("slow"); log_error("bad")"#)
            .exec()
            .unwrap();
    }
}
