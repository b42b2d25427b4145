//! Vector index backends.
//!
//! The rest of the crate only sees [`VectorIndex`]: a readiness probe and a
//! ranked nearest-neighbour lookup. `memory` keeps stories in process,
//! `weaviate` talks to a Weaviate cluster.

pub mod ingest;
pub mod memory;
pub mod weaviate;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::models::ResultItem;

/// A document returned by a similarity search, best match first.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    /// Indexed text (the story title)
    pub content: String,
    pub url: String,
    pub source_id: Option<String>,
    pub score: f32,
}

impl From<IndexedDocument> for ResultItem {
    fn from(doc: IndexedDocument) -> Self {
        ResultItem {
            title: doc.content,
            url: doc.url,
            hn_id: doc.source_id,
        }
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Whether the backend can serve queries right now. Must not mutate state.
    async fn is_ready(&self) -> bool;

    async fn similarity_search(&self, vector: &[f32], k: usize) -> Result<Vec<IndexedDocument>>;

    /// Release connections. Called once at shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the backend selected by `config.index.provider`.
pub fn open_index(config: &Config, client: reqwest::Client) -> Result<Arc<dyn VectorIndex>> {
    match config.index.provider.as_str() {
        "memory" => Ok(Arc::new(memory::MemoryIndex::open_or_create(
            &config.stories_path(),
        )?)),
        "weaviate" => Ok(Arc::new(weaviate::WeaviateIndex::new(
            client,
            config.index.weaviate.clone(),
        )?)),
        other => anyhow::bail!("Unknown index provider: {other}"),
    }
}
