//! Expanded detail view of an item

use pulldown_cmark::{html, Options, Parser};
use std::sync::Arc;

use crate::core::query_processor::{guarded, DispatchContext};
use crate::core::Item;
use crate::plugins::error::DispatchError;
use crate::plugins::module::spawn_module_call;
use crate::plugins::registry::Plugin;

/// Declared `details.type` of a native module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DetailsKind {
    #[default]
    Html,
    Markdown,
    /// Anything else; content is passed through unchanged
    Other(String),
}

impl DetailsKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "html" => Self::Html,
            "md" => Self::Markdown,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Render Markdown text to an HTML fragment
pub fn render_markdown(text: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(text, options);

    let mut output = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

/// HTML for the detail pane of `item`.
///
/// Plugins without a details descriptor (all legacy workflows among them)
/// yield an empty string. Rendering runs under the context's deadline.
pub async fn retrieve_item_details(
    item: &Item,
    plugin: &Plugin,
    ctx: &DispatchContext,
) -> Result<String, DispatchError> {
    let Some(module) = plugin.module() else {
        return Ok(String::new());
    };
    let Some(kind) = module.exports().details.clone() else {
        return Ok(String::new());
    };

    let module = Arc::clone(module);
    let item = item.clone();
    let invocation = ctx.invocation_for(plugin);
    let call = spawn_module_call(async move { module.render_details(&item, invocation).await });
    let content = guarded(plugin, ctx, call).await?.unwrap_or_default();

    Ok(match kind {
        DetailsKind::Markdown => render_markdown(&content),
        DetailsKind::Html | DetailsKind::Other(_) => content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::registry::tests::{native_plugin, workflow_plugin, StubModule};
    use crate::plugins::module::ModuleExports;
    use std::time::Duration;

    fn ctx() -> DispatchContext {
        DispatchContext::new(Duration::from_secs(1))
    }

    fn exports_with(details: Option<DetailsKind>) -> ModuleExports {
        ModuleExports {
            details,
            ..Default::default()
        }
    }

    #[test]
    fn test_details_kind_parse() {
        assert_eq!(DetailsKind::parse("md"), DetailsKind::Markdown);
        assert_eq!(DetailsKind::parse("html"), DetailsKind::Html);
        assert_eq!(DetailsKind::parse("rtf"), DetailsKind::Other("rtf".into()));
    }

    #[test]
    fn test_render_markdown_heading() {
        let html = render_markdown("# Hi");
        assert!(html.contains("<h1>Hi</h1>"));
    }

    #[tokio::test]
    async fn test_no_descriptor_is_empty() {
        let plugin = native_plugin("/plugins/plain", StubModule::new(exports_with(None)));
        let html = retrieve_item_details(&Item::titled("A"), &plugin, &ctx()).await.unwrap();
        assert_eq!(html, "");

        let workflow = workflow_plugin("/plugins/legacy");
        let html = retrieve_item_details(&Item::titled("A"), &workflow, &ctx()).await.unwrap();
        assert_eq!(html, "");
    }

    #[tokio::test]
    async fn test_markdown_descriptor() {
        let module = StubModule::new(exports_with(Some(DetailsKind::Markdown))).with_details("# Hi");
        let plugin = native_plugin("/plugins/md", module);

        let html = retrieve_item_details(&Item::titled("A"), &plugin, &ctx()).await.unwrap();
        assert!(html.contains("<h1>Hi</h1>"));
    }

    #[tokio::test]
    async fn test_unknown_kind_passes_content_through() {
        let module = StubModule::new(exports_with(Some(DetailsKind::Other("rtf".into()))))
            .with_details("# raw");
        let plugin = native_plugin("/plugins/raw", module);

        let html = retrieve_item_details(&Item::titled("A"), &plugin, &ctx()).await.unwrap();
        assert_eq!(html, "# raw");
    }

    #[tokio::test]
    async fn test_slow_render_times_out() {
        let module = StubModule::new(exports_with(Some(DetailsKind::Html)))
            .with_details("<p>late</p>")
            .with_delay(Duration::from_secs(10));
        let plugin = native_plugin("/plugins/slow", module);

        let context = DispatchContext::new(Duration::from_millis(50));
        let result = retrieve_item_details(&Item::titled("A"), &plugin, &context).await;
        assert!(matches!(result, Err(DispatchError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cancelled_render() {
        let module = StubModule::new(exports_with(Some(DetailsKind::Html))).with_details("<p>x</p>");
        let plugin = native_plugin("/plugins/html", module);

        let context = ctx();
        context.cancel.cancel();
        let result = retrieve_item_details(&Item::titled("A"), &plugin, &context).await;
        assert!(matches!(result, Err(DispatchError::Cancelled)));
    }
}
