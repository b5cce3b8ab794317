//! Canonical result item shared by both plugin protocols

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Icon reference. `path` is a URL, an absolute path, or a path relative to
/// the owning plugin until the normalizer resolves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Icon {
    #[serde(default)]
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Provenance of an item. Identifies the plugin, never owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRef {
    pub path: PathBuf,
    pub name: String,
}

/// A single query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<PluginRef>,
    /// Protocol-specific fields (`arg`, `uid`, `valid`, ...) passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Why a result document could not be turned into items
#[derive(Debug, thiserror::Error)]
pub enum ItemsError {
    #[error("result document has no `items` array")]
    MissingItems,
    #[error("malformed item: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Extract the `items` array of a `{items: [...]}` document.
///
/// An empty object in place of the array is accepted: Lua cannot tell an
/// empty list from an empty table, so `items = {}` arrives that way.
pub fn items_from_document(document: Value) -> Result<Vec<Item>, ItemsError> {
    let Value::Object(mut fields) = document else {
        return Err(ItemsError::MissingItems);
    };

    match fields.remove("items") {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(ItemsError::from))
            .collect(),
        Some(Value::Object(map)) if map.is_empty() => Ok(Vec::new()),
        _ => Err(ItemsError::MissingItems),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_keeps_unknown_fields() {
        let item: Item = serde_json::from_value(json!({
            "title": "Rust",
            "subtitle": "A language",
            "arg": "https://rust-lang.org",
            "icon": {"path": "icon.png", "type": "fileicon"}
        }))
        .unwrap();

        assert_eq!(item.title, "Rust");
        assert_eq!(item.extra.get("arg"), Some(&json!("https://rust-lang.org")));
        let icon = item.icon.as_ref().unwrap();
        assert_eq!(icon.path, "icon.png");
        assert_eq!(icon.extra.get("type"), Some(&json!("fileicon")));

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["arg"], json!("https://rust-lang.org"));
        assert!(back.get("plugin").is_none());
    }

    #[test]
    fn test_items_from_document() {
        let items = items_from_document(json!({"items": [{"title": "A"}, {"title": "B"}]})).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].title, "B");

        assert!(items_from_document(json!({"items": {}})).unwrap().is_empty());
    }

    #[test]
    fn test_items_from_document_rejects_bad_shapes() {
        assert!(matches!(
            items_from_document(json!({"results": []})),
            Err(ItemsError::MissingItems)
        ));
        assert!(matches!(
            items_from_document(json!([{"title": "A"}])),
            Err(ItemsError::MissingItems)
        ));
        assert!(matches!(
            items_from_document(json!({"items": [{"title": 7}]})),
            Err(ItemsError::Malformed(_))
        ));
    }
}
