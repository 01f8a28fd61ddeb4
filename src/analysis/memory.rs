//! Context store the research steps read from and write to

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Searchable text memory shared by concurrent steps
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Store `text`, returning how many chunks were added
    async fn add(&self, text: &str, metadata: HashMap<String, String>) -> anyhow::Result<usize>;

    /// The `k` chunks most relevant to `query`
    async fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<String>>;
}

/// A stored chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub metadata: HashMap<String, String>,
}

/// Split `text` into windows of at most `size` characters sharing `overlap`
///
/// Windows end at whitespace when one is available past the overlap.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let overlap = overlap.min(size - 1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < len {
        let mut end = (start + size).min(len);
        if end < len {
            if let Some(cut) = (start + 1..end).rev().find(|&i| chars[i].is_whitespace()) {
                if cut > start + overlap {
                    end = cut;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end == len {
            break;
        }
        // Overlap starts on a word boundary
        let mut next = end.saturating_sub(overlap).max(start + 1);
        while next < end && !chars[next - 1].is_whitespace() {
            next += 1;
        }
        start = next;
    }
    chunks
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// In-process store ranking chunks by query term overlap
#[derive(Debug)]
pub struct InMemoryContextStore {
    chunk_size: usize,
    chunk_overlap: usize,
    documents: RwLock<Vec<Document>>,
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl InMemoryContextStore {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            documents: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    pub async fn documents(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn add(&self, text: &str, metadata: HashMap<String, String>) -> anyhow::Result<usize> {
        let chunks = chunk_text(text, self.chunk_size, self.chunk_overlap);
        let added = chunks.len();
        let mut documents = self.documents.write().await;
        documents.extend(chunks.into_iter().map(|content| Document {
            content,
            metadata: metadata.clone(),
        }));
        debug!("Context store: added {} chunk(s), {} total", added, documents.len());
        Ok(added)
    }

    async fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<String>> {
        let query_terms = terms(query);
        if query_terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let documents = self.documents.read().await;
        let mut scored: Vec<(usize, usize)> = documents
            .iter()
            .enumerate()
            .filter_map(|(index, doc)| {
                let doc_terms = terms(&doc.content);
                let score = query_terms.iter().filter(|t| doc_terms.contains(*t)).count();
                (score > 0).then_some((score, index))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, index)| documents[index].content.clone())
            .collect())
    }
}
