//! Helper items: placeholders shown before real results arrive

use std::sync::Arc;

use crate::core::query_processor::{guarded, DispatchContext};
use crate::core::{Item, ItemsError, Query};
use crate::plugins::error::DispatchError;
use crate::plugins::module::spawn_module_call;
use crate::plugins::normalize::connect_items;
use crate::plugins::registry::Plugin;

/// Resolve the helper of `plugin` for `query` under the query's deadline.
///
/// Plugins without a helper, legacy workflows included, give an empty list.
pub async fn resolve_helper(
    plugin: &Plugin,
    query: &Query,
    ctx: &DispatchContext,
) -> Result<Vec<Item>, DispatchError> {
    let Some(module) = plugin.module() else {
        return Ok(Vec::new());
    };
    if !module.exports().has_helper {
        return Ok(Vec::new());
    }

    let module = Arc::clone(module);
    let text = query.text();
    let invocation = ctx.invocation_for(plugin);
    let call = spawn_module_call(async move { module.helper(&text, invocation).await });

    let Some(value) = guarded(plugin, ctx, call).await? else {
        return Ok(Vec::new());
    };
    let item: Item = serde_json::from_value(value).map_err(ItemsError::from)?;

    Ok(connect_items(&[item], plugin))
}
