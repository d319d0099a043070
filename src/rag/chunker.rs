//! Node builder: slices documents into bounded, deterministic retrieval units.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::document::{Corpus, Document, DocumentId};

/// Sentence boundaries are only searched for in the tail of a window.
const BOUNDARY_SEARCH_PERCENT: usize = 80;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum node length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive nodes of one document
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 20,
        }
    }
}

/// Atomic retrieval unit. Refers to its document by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub text: String,
    pub document_id: DocumentId,
    pub corpus: Corpus,
    pub file_name: String,
    pub page: Option<usize>,
    /// Index within the source document
    pub chunk_index: usize,
    /// Character offset in the source document
    pub start_offset: usize,
}

impl Node {
    /// Short human-readable origin, used when nodes are cited in prompts.
    pub fn citation(&self) -> String {
        match self.page {
            Some(page) => format!("{} / {} (p. {})", self.corpus, self.file_name, page),
            None => format!("{} / {}", self.corpus, self.file_name),
        }
    }
}

/// Immutable snapshot of the nodes an index is built over.
#[derive(Debug, Clone)]
pub struct NodeSet(Arc<[Node]>);

impl NodeSet {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self(nodes.into())
    }

    /// Stable digest over node ids and text.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for node in self.0.iter() {
            hasher.update(node.id.as_bytes());
            hasher.update([0u8]);
            hasher.update(node.text.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

impl Deref for NodeSet {
    type Target = [Node];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct NodeBuilder {
    config: ChunkerConfig,
}

impl NodeBuilder {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn build(&self, documents: &[Document]) -> NodeSet {
        let nodes = documents
            .iter()
            .flat_map(|document| self.split_document(document))
            .collect();
        NodeSet::new(nodes)
    }

    fn split_document(&self, document: &Document) -> Vec<Node> {
        split_text(
            &document.text,
            self.config.chunk_size,
            self.config.chunk_overlap,
        )
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (start_offset, text))| Node {
            id: format!("{}#{}", document.id, chunk_index),
            text,
            document_id: document.id.clone(),
            corpus: document.corpus,
            file_name: document.file_name.clone(),
            page: document.page,
            chunk_index,
            start_offset,
        })
        .collect()
    }
}

/// Split into windows of at most `chunk_size` chars, preferring sentence ends.
/// Returns `(char offset, trimmed text)`; whitespace-only windows are dropped.
fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, String)> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < total {
        let hard_end = (start + chunk_size).min(total);
        let end = if hard_end < total {
            find_boundary(&chars, start, hard_end, chunk_size)
        } else {
            hard_end
        };

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            pieces.push((start, trimmed.to_string()));
        }

        if end >= total {
            break;
        }
        let next = end.saturating_sub(chunk_overlap);
        start = if next > start { next } else { end };
    }

    pieces
}

fn find_boundary(chars: &[char], start: usize, hard_end: usize, chunk_size: usize) -> usize {
    let search_start = start + (chunk_size * BOUNDARY_SEARCH_PERCENT) / 100;
    if search_start >= hard_end {
        return hard_end;
    }

    let is_sentence_end = |i: usize| {
        matches!(chars[i], '.' | '!' | '?' | '\n')
            && (i + 1 >= hard_end || chars[i + 1].is_whitespace())
    };

    if let Some(i) = (search_start..hard_end).rev().find(|&i| is_sentence_end(i)) {
        return i + 1;
    }
    if let Some(i) = (search_start..hard_end)
        .rev()
        .find(|&i| chars[i].is_whitespace())
    {
        return i + 1;
    }
    hard_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(name: &str, text: &str) -> Document {
        Document {
            id: DocumentId(format!("Record/{}", name)),
            text: text.to_string(),
            corpus: Corpus::Record,
            file_name: name.to_string(),
            page: None,
        }
    }

    #[test]
    fn nodes_never_exceed_chunk_size() {
        let text = "Backpropagation computes gradients layer by layer. ".repeat(80);
        let builder = NodeBuilder::new(ChunkerConfig {
            chunk_size: 128,
            chunk_overlap: 16,
        });

        let nodes = builder.build(&[document("lecture1.txt", &text)]);

        assert!(nodes.len() > 1);
        for node in nodes.iter() {
            assert!(node.text.chars().count() <= 128);
            assert!(!node.text.is_empty());
        }
    }

    #[test]
    fn chunks_prefer_sentence_boundaries() {
        let text = "First sentence here. Second sentence follows. Third one ends it.";
        let pieces = split_text(text, 50, 0);
        assert_eq!(pieces[0].1, "First sentence here. Second sentence follows.");
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text: String = (0..300).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let pieces = split_text(&text, 100, 10);

        assert_eq!(pieces[0].0, 0);
        assert_eq!(pieces[1].0, 90);
        assert!(pieces[0].1.ends_with(&pieces[1].1[..10]));
    }

    #[test]
    fn building_is_deterministic() {
        let docs = vec![
            document("a.txt", &"Gradient descent. ".repeat(200)),
            document("b.txt", &"Convolution layers. ".repeat(150)),
        ];
        let builder = NodeBuilder::new(ChunkerConfig::default());

        let first = builder.build(&docs);
        let second = builder.build(&docs);

        assert_eq!(&*first, &*second);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn chunk_size_changes_the_fingerprint() {
        let docs = vec![document("a.txt", &"Gradient descent. ".repeat(200))];
        let small = NodeBuilder::new(ChunkerConfig {
            chunk_size: 256,
            chunk_overlap: 0,
        })
        .build(&docs);
        let large = NodeBuilder::new(ChunkerConfig::default()).build(&docs);

        assert_ne!(small.fingerprint(), large.fingerprint());
    }

    #[test]
    fn node_ids_reference_their_document() {
        let nodes = NodeBuilder::new(ChunkerConfig {
            chunk_size: 20,
            chunk_overlap: 0,
        })
        .build(&[document("l.txt", "alpha beta gamma delta epsilon zeta eta")]);

        assert_eq!(nodes[0].id, "Record/l.txt#0");
        assert_eq!(nodes[1].id, "Record/l.txt#1");
        assert!(nodes.iter().all(|n| n.document_id.0 == "Record/l.txt"));
    }

    #[test]
    fn blank_documents_produce_no_nodes() {
        let nodes = NodeBuilder::new(ChunkerConfig::default())
            .build(&[document("blank.txt", "   \n\n  "), document("empty.txt", "")]);
        assert!(nodes.is_empty());
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "誤差逆伝播法は勾配を計算する。".repeat(30);
        let pieces = split_text(&text, 40, 5);
        assert!(pieces.iter().all(|(_, p)| p.chars().count() <= 40));
    }
}
