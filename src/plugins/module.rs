//! Capability contract for native plugins
//!
//! The dispatcher only talks to native plugins through [`PluginModule`]. The
//! embedded Lua runtime ([`crate::plugins::native::LuaModule`]) is the
//! production implementation.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::core::{Item, QueryOptions};
use crate::plugins::details::DetailsKind;
use crate::plugins::error::{DispatchError, PluginError};

/// Static exports read once when the module is loaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleExports {
    pub keyword: Option<String>,
    pub action: Option<String>,
    pub has_helper: bool,
    pub details: Option<DetailsKind>,
    /// Invocation deadline requested by the module's metadata
    pub timeout: Option<Duration>,
}

/// Budget of a single call into a module: a deadline and a cancel signal.
///
/// Implementations must stop running plugin code once it is spent, even
/// when that code never yields back to the runtime.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

impl Invocation {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= self.deadline
    }
}

#[async_trait]
pub trait PluginModule: Send + Sync {
    fn exports(&self) -> &ModuleExports;

    /// Run the query entry point. `None` means the plugin produced no result.
    async fn query(
        &self,
        text: &str,
        options: QueryOptions,
        invocation: Invocation,
    ) -> Result<Option<Value>, PluginError>;

    /// Resolve the helper export into a single item document
    async fn helper(&self, text: &str, invocation: Invocation) -> Result<Option<Value>, PluginError>;

    /// Produce the raw detail content for `item`, before any Markdown pass
    async fn render_details(
        &self,
        item: &Item,
        invocation: Invocation,
    ) -> Result<Option<String>, PluginError>;
}

/// Join handle that aborts its task when dropped
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

/// Run a module call on its own task so the caller's deadline stays live.
///
/// Dropping the returned future aborts the task.
pub async fn spawn_module_call<T, F>(call: F) -> Result<T, DispatchError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, PluginError>> + Send + 'static,
{
    AbortOnDrop(tokio::spawn(call))
        .await
        .map_err(|e| DispatchError::Task(e.to_string()))?
        .map_err(DispatchError::from)
}
