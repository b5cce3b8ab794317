use serde::Serialize;

use crate::config::MAX_RESULTS;

/// A user query as an ordered list of argument tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    tokens: Vec<String>,
}

impl Query {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Split raw input on whitespace
    pub fn parse(input: &str) -> Self {
        Self::new(input.split_whitespace())
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens joined with single spaces, as handed to native plugins
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The leading token, which may name a plugin keyword
    pub fn head(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// The query with its leading token removed
    pub fn tail(&self) -> Query {
        Self {
            tokens: self.tokens.iter().skip(1).cloned().collect(),
        }
    }
}

/// Options record passed to native plugin entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryOptions {
    /// Advisory maximum number of results
    pub size: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { size: MAX_RESULTS }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_text_joins_with_single_spaces() {
        let query = Query::parse("  gh   rust-lang  mlua ");
        assert_eq!(query.tokens().len(), 3);
        assert_eq!(query.text(), "gh rust-lang mlua");
        assert_eq!(query.head(), Some("gh"));
        assert_eq!(query.tail().text(), "rust-lang mlua");
    }

    #[test]
    fn test_empty_query() {
        let query = Query::parse("   ");
        assert!(query.is_empty());
        assert_eq!(query.head(), None);
        assert_eq!(query.text(), "");
        assert!(query.tail().is_empty());
    }

    #[test]
    fn test_default_options_carry_max_results() {
        assert_eq!(QueryOptions::default().size, MAX_RESULTS);
    }
}
