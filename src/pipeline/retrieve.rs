use std::sync::Arc;

use crate::config::ReadinessConfig;
use crate::error::SearchError;
use crate::index::VectorIndex;
use crate::llm::embeddings::Embedder;
use crate::models::ResultItem;

/// One query in, one ranked result set out: readiness wait, embed, search.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    readiness: ReadinessConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        readiness: ReadinessConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            readiness,
        }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Poll the index until it reports ready or the attempt budget runs out.
    pub async fn wait_until_ready(&self) -> Result<(), SearchError> {
        let attempts = self.readiness.max_attempts.max(1);
        for attempt in 1..=attempts {
            if self.index.is_ready().await {
                return Ok(());
            }
            if attempt < attempts {
                tokio::time::sleep(self.readiness.poll_interval()).await;
            }
        }
        Err(SearchError::ReadinessTimeout { attempts })
    }

    /// Retrieve up to `k` stories for `query`. An index that never becomes
    /// ready yields an empty set rather than an error.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ResultItem>, SearchError> {
        if let Err(e) = self.wait_until_ready().await {
            tracing::warn!("{e}; returning no results for '{query}'");
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| retrieval_error(query, e))?;

        let docs = self
            .index
            .similarity_search(&vector, k)
            .await
            .map_err(|e| retrieval_error(query, e))?;

        Ok(docs.into_iter().map(ResultItem::from).collect())
    }
}

fn retrieval_error(query: &str, e: anyhow::Error) -> SearchError {
    SearchError::Retrieval {
        query: query.to_string(),
        message: format!("{e:#}"),
    }
}
