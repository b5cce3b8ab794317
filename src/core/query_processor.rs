// Dext Plugin Runtime - Query Dispatcher
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Query dispatch shared by the CLI and embedding hosts
//!
//! Every plugin invocation runs under a deadline and a cancellation token.
//! Legacy workflows are killed when their invocation is dropped. Native
//! module calls (query, helper and details) run on their own task, which is
//! aborted the same way, and the Lua state stops plugin code that never
//! yields once the call's [`Invocation`] is spent.

use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::RuntimeConfig;
use crate::core::{items_from_document, Item, PluginRef, Query, QueryOptions};
use crate::plugins::error::{DispatchError, PluginError};
use crate::plugins::helper::resolve_helper;
use crate::plugins::module::{spawn_module_call, Invocation, PluginModule};
use crate::plugins::normalize::connect_items;
use crate::plugins::registry::{Plugin, PluginRegistry};
use crate::plugins::schema::Schema;
use crate::plugins::workflow::run_workflow;
use crate::{log_debug, log_notice, log_warn};

/// Deadline, cancellation and options for one user query
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub timeout: Duration,
    pub cancel: CancellationToken,
    pub options: QueryOptions,
}

impl DispatchContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: CancellationToken::new(),
            options: QueryOptions::default(),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.query_timeout)
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deadline for `plugin`, honouring its own metadata override
    pub fn deadline_for(&self, plugin: &Plugin) -> Duration {
        plugin.timeout().unwrap_or(self.timeout)
    }

    /// Budget handed to a native module for one call
    pub fn invocation_for(&self, plugin: &Plugin) -> Invocation {
        Invocation::new(self.deadline_for(plugin), self.cancel.clone())
    }
}

/// Result of invoking one plugin
#[derive(Debug)]
pub struct PluginOutcome {
    pub plugin: PluginRef,
    pub result: Result<Vec<Item>, DispatchError>,
}

/// A plugin that failed during a query, as reported to hosts
#[derive(Debug, Clone, Serialize)]
pub struct PluginFailure {
    pub plugin: PluginRef,
    pub kind: &'static str,
    pub message: String,
}

/// Aggregated response for one query
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResponse {
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<PluginFailure>,
}

impl QueryResponse {
    pub fn from_outcomes(outcomes: Vec<PluginOutcome>) -> Self {
        let mut response = Self::default();
        for outcome in outcomes {
            match outcome.result {
                Ok(items) => response.items.extend(items),
                Err(e) => {
                    if e.is_timeout() {
                        log_notice!("Plugin '{}' {}", outcome.plugin.name, e);
                    } else {
                        log_warn!("Plugin '{}' failed: {}", outcome.plugin.name, e);
                    }
                    response.failures.push(PluginFailure {
                        plugin: outcome.plugin,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }
        response
    }
}

/// Run `call` against `plugin` until it finishes, its deadline passes or the
/// query is cancelled
pub async fn guarded<T, F>(plugin: &Plugin, ctx: &DispatchContext, call: F) -> Result<T, DispatchError>
where
    F: Future<Output = Result<T, DispatchError>>,
{
    let deadline = ctx.deadline_for(plugin);
    let result = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => Err(DispatchError::Cancelled),
        result = tokio::time::timeout(deadline, call) => {
            result.unwrap_or(Err(DispatchError::Timeout(deadline)))
        }
    };

    // Plugin code stopped from inside by its spent budget
    match result {
        Err(DispatchError::Plugin(PluginError::Interrupted)) if ctx.cancel.is_cancelled() => {
            Err(DispatchError::Cancelled)
        }
        Err(DispatchError::Plugin(PluginError::Interrupted)) => Err(DispatchError::Timeout(deadline)),
        other => other,
    }
}

async fn invoke_native(
    module: &Arc<dyn PluginModule>,
    text: String,
    options: QueryOptions,
    invocation: Invocation,
) -> Result<Vec<Item>, DispatchError> {
    let module = Arc::clone(module);
    let document =
        spawn_module_call(async move { module.query(&text, options, invocation).await }).await?;

    match document {
        Some(document) => Ok(items_from_document(document)?),
        None => Ok(Vec::new()),
    }
}

async fn invoke(plugin: &Plugin, query: &Query, ctx: &DispatchContext) -> Result<Vec<Item>, DispatchError> {
    match &plugin.schema {
        Schema::LegacyWorkflow(entry) => run_workflow(&plugin.path, entry, query).await,
        Schema::Native(module) => {
            invoke_native(module, query.text(), ctx.options, ctx.invocation_for(plugin)).await
        }
    }
}

/// Invoke a single plugin and normalize its items
pub async fn dispatch_one(
    plugin: &Plugin,
    query: &Query,
    ctx: &DispatchContext,
) -> Result<Vec<Item>, DispatchError> {
    let raw = guarded(plugin, ctx, invoke(plugin, query, ctx)).await?;
    Ok(connect_items(&raw, plugin))
}

/// Invoke every matched plugin concurrently; one outcome per plugin, in order
pub async fn dispatch(matches: &[(Arc<Plugin>, Query)], ctx: &DispatchContext) -> Vec<PluginOutcome> {
    join_all(matches.iter().map(|(plugin, query)| async move {
        PluginOutcome {
            plugin: plugin.reference(),
            result: dispatch_one(plugin, query, ctx).await,
        }
    }))
    .await
}

/// Resolve helper items of every matched plugin concurrently
pub async fn dispatch_helpers(
    matches: &[(Arc<Plugin>, Query)],
    ctx: &DispatchContext,
) -> Vec<PluginOutcome> {
    join_all(matches.iter().map(|(plugin, query)| async move {
        PluginOutcome {
            plugin: plugin.reference(),
            result: resolve_helper(plugin, query, ctx).await,
        }
    }))
    .await
}

/// Process a raw query string against `registry`
pub async fn process_query(registry: &PluginRegistry, input: &str, ctx: &DispatchContext) -> QueryResponse {
    let query = Query::parse(input);
    let matches = registry.matching(&query);
    log_debug!("Processing query: {:?} ({} plugin(s) matched)", input, matches.len());

    let start_time = Instant::now();
    let response = QueryResponse::from_outcomes(dispatch(&matches, ctx).await);
    log_debug!(
        "Query completed in {:.2}ms: {} item(s), {} failure(s)",
        start_time.elapsed().as_secs_f64() * 1000.0,
        response.items.len(),
        response.failures.len()
    );

    response
}

/// Helper items for a raw query string
pub async fn process_helpers(registry: &PluginRegistry, input: &str, ctx: &DispatchContext) -> QueryResponse {
    let query = Query::parse(input);
    let matches = registry.matching(&query);
    QueryResponse::from_outcomes(dispatch_helpers(&matches, ctx).await)
}
