//! Query engine abstraction shared by the vector and summary indices.

use async_trait::async_trait;
use serde::Serialize;

use super::chunker::Node;
use crate::core::errors::GenerationError;

/// Answer returned when an engine has nothing to answer from.
pub const EMPTY_RESPONSE: &str = "Empty Response";

/// A node with its similarity to the query (higher = better).
#[derive(Debug, Clone, Serialize)]
pub struct ScoredNode {
    pub node: Node,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub source_nodes: Vec<ScoredNode>,
}

impl QueryResponse {
    pub fn empty() -> Self {
        Self {
            response: EMPTY_RESPONSE.to_string(),
            source_nodes: Vec::new(),
        }
    }
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    async fn query(&self, query: &str) -> Result<QueryResponse, GenerationError>;
}

/// Numbered context block with citations, as fed to answer synthesis.
pub fn format_context<'a, I>(nodes: I) -> String
where
    I: IntoIterator<Item = &'a Node>,
{
    nodes
        .into_iter()
        .enumerate()
        .map(|(i, node)| format!("[{}] {}\n{}", i + 1, node.citation(), node.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fills `{name}` placeholders in one pass; substituted values are never rescanned.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let hit = values.iter().find_map(|(name, value)| {
            tail.strip_prefix('{')
                .and_then(|t| t.strip_prefix(*name))
                .and_then(|t| t.strip_prefix('}'))
                .map(|after| (*value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_inside_values_are_left_alone() {
        let prompt = fill_template(
            "Context: {context}\nQuery: {query}",
            &[("context", "see {query} in the notes"), ("query", "What is dropout?")],
        );
        assert_eq!(
            prompt,
            "Context: see {query} in the notes\nQuery: What is dropout?"
        );
    }

    #[test]
    fn unknown_braces_are_kept() {
        assert_eq!(
            fill_template("{a} {b} {", &[("a", "x")]),
            "x {b} {"
        );
    }
}
