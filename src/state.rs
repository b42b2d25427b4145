use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::index::open_index;
use crate::llm::embeddings::HttpEmbedder;
use crate::llm::token_stream::{ChatModel, TokenSource};
use crate::pipeline::retrieve::Retriever;
use crate::pipeline::ExpansionPipeline;

/// Shared application context, cloned into every handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub token_source: Arc<dyn TokenSource>,
    pub retriever: Arc<Retriever>,
    /// Every fan-out retrieval, including ones whose stream was dropped.
    pub tasks: TaskTracker,
}

impl AppContext {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;

        let token_source = Arc::new(ChatModel::new(http_client.clone(), config.llm.clone()));
        let embedder = Arc::new(HttpEmbedder::new(
            http_client.clone(),
            config.embedding.clone(),
        ));
        let index = open_index(&config, http_client.clone())?;
        let retriever = Arc::new(Retriever::new(embedder, index, config.readiness));

        Ok(Self::from_parts(config, token_source, retriever))
    }

    /// Assemble a context from already-built capabilities.
    pub fn from_parts(
        config: Config,
        token_source: Arc<dyn TokenSource>,
        retriever: Arc<Retriever>,
    ) -> Self {
        Self {
            config,
            token_source,
            retriever,
            tasks: TaskTracker::new(),
        }
    }

    pub fn pipeline(&self) -> ExpansionPipeline {
        let idle = self.config.llm.idle_timeout_secs;
        ExpansionPipeline::new(
            self.token_source.clone(),
            self.retriever.clone(),
            (idle > 0).then(|| Duration::from_secs(idle)),
            self.tasks.clone(),
        )
    }

    /// Join outstanding retrievals, then release index connections.
    /// Errors are logged, not returned.
    pub async fn close(&self) {
        self.tasks.close();
        if !self.tasks.is_empty() {
            tracing::info!("Waiting for {} retrievals to finish", self.tasks.len());
        }
        self.tasks.wait().await;
        if let Err(e) = self.retriever.index().close().await {
            tracing::warn!("Failed to close vector index: {e:#}");
        }
    }
}
