use futures_util::stream::{FuturesUnordered, Stream};
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use super::retrieve::Retriever;
use crate::error::SearchError;
use crate::models::ResultItem;

/// The outcome of one sub-query's retrieval.
pub type Retrieval = (String, Result<Vec<ResultItem>, SearchError>);

/// Results requested per sub-query: an even share of `total_k`, at least 1.
pub fn per_query_budget(total_k: usize, sub_queries: usize) -> usize {
    (total_k / sub_queries.max(1)).max(1)
}

/// Spawn one retrieval per sub-query and yield outcomes in completion order.
///
/// Every task is spawned on `tasks` before this returns. The stream ends
/// once all of them have settled. A task that errors or panics only affects
/// its own entry. If the stream is dropped early the remaining tasks still
/// run to completion, and `tasks.wait()` joins them.
pub fn retrieve_all(
    retriever: Arc<Retriever>,
    sub_queries: Vec<String>,
    total_k: usize,
    tasks: TaskTracker,
) -> impl Stream<Item = Retrieval> + Send {
    let k = per_query_budget(total_k, sub_queries.len());
    tracing::debug!("Fanning out {} sub-queries with k={k}", sub_queries.len());

    sub_queries
        .into_iter()
        .map(|query| {
            let handle = tasks.spawn(
                retrieve_one(retriever.clone(), query.clone(), k).in_current_span(),
            );
            async move {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let message = if e.is_panic() {
                            "retrieval task panicked"
                        } else {
                            "retrieval task was cancelled"
                        };
                        tracing::error!("{message} for '{query}'");
                        Err(SearchError::Retrieval {
                            query: query.clone(),
                            message: message.to_string(),
                        })
                    }
                };
                (query, outcome)
            }
        })
        .collect::<FuturesUnordered<_>>()
}

async fn retrieve_one(
    retriever: Arc<Retriever>,
    query: String,
    k: usize,
) -> Result<Vec<ResultItem>, SearchError> {
    let outcome = retriever.retrieve(&query, k).await;
    match &outcome {
        Ok(items) => tracing::debug!("'{query}': {} results", items.len()),
        Err(e) => tracing::warn!("{e}"),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReadinessConfig;
    use crate::index::{IndexedDocument, VectorIndex};
    use crate::llm::embeddings::Embedder;
    use anyhow::Result;
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Embeds a query as its length; "slow" queries stall, "fail" queries
    /// error and "panic" queries panic.
    struct ScriptedEmbedder;

    #[async_trait]
    impl Embedder for ScriptedEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let text = &texts[0];
            if text.starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            if text.starts_with("fail") {
                anyhow::bail!("boom");
            }
            if text.starts_with("panic") {
                panic!("embedder exploded");
            }
            Ok(vec![vec![text.len() as f32]])
        }
    }

    /// Counts finished embeddings; "slow" queries take a while.
    struct CountingEmbedder {
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts[0].starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(60)).await;
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(vec![vec![1.0]])
        }
    }

    /// Echoes `k` so tests can observe the per-query budget.
    struct EchoIndex;

    #[async_trait]
    impl VectorIndex for EchoIndex {
        async fn is_ready(&self) -> bool {
            true
        }

        async fn similarity_search(&self, _v: &[f32], k: usize) -> Result<Vec<IndexedDocument>> {
            Ok((0..k)
                .map(|i| IndexedDocument {
                    content: format!("doc {i}"),
                    url: String::new(),
                    source_id: None,
                    score: 0.0,
                })
                .collect())
        }
    }

    fn retriever() -> Arc<Retriever> {
        Arc::new(Retriever::new(
            Arc::new(ScriptedEmbedder),
            Arc::new(EchoIndex),
            ReadinessConfig {
                max_attempts: 1,
                poll_interval_ms: 1,
            },
        ))
    }

    fn queries(qs: &[&str]) -> Vec<String> {
        qs.iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn test_per_query_budget() {
        assert_eq!(per_query_budget(10, 2), 5);
        assert_eq!(per_query_budget(10, 3), 3);
        assert_eq!(per_query_budget(500, 1), 500);
        assert_eq!(per_query_budget(2, 5), 1);
        assert_eq!(per_query_budget(1, 1), 1);
    }

    #[test]
    fn test_per_query_budget_formula_holds() {
        for total_k in 1..60 {
            for n in 1..12 {
                assert_eq!(per_query_budget(total_k, n), std::cmp::max(1, total_k / n));
            }
        }
    }

    #[tokio::test]
    async fn test_every_query_gets_the_same_budget() {
        let tasks = TaskTracker::new();
        let outcomes: Vec<Retrieval> =
            retrieve_all(retriever(), queries(&["a", "b", "c"]), 10, tasks.clone())
                .collect()
                .await;
        assert_eq!(outcomes.len(), 3);
        for (_, res) in outcomes {
            assert_eq!(res.unwrap().len(), 3);
        }
    }

    #[tokio::test]
    async fn test_results_arrive_in_completion_order() {
        let tasks = TaskTracker::new();
        let outcomes: Vec<Retrieval> =
            retrieve_all(retriever(), queries(&["slow first", "fast second"]), 4, tasks.clone())
                .collect()
                .await;
        let order: Vec<&str> = outcomes.iter().map(|(q, _)| q.as_str()).collect();
        assert_eq!(order, vec!["fast second", "slow first"]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let tasks = TaskTracker::new();
        let outcomes: Vec<Retrieval> =
            retrieve_all(retriever(), queries(&["fail one", "ok two", "panic three"]), 6, tasks.clone())
                .collect()
                .await;
        assert_eq!(outcomes.len(), 3);

        let find = |name: &str| outcomes.iter().find(|(q, _)| q == name).unwrap();
        assert!(matches!(&find("fail one").1, Err(SearchError::Retrieval { .. })));
        assert_eq!(find("ok two").1.as_ref().unwrap().len(), 2);
        match &find("panic three").1 {
            Err(SearchError::Retrieval { message, .. }) => assert!(message.contains("panicked")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropped_stream_tasks_are_joined_by_tracker() {
        let finished = Arc::new(AtomicUsize::new(0));
        let retriever = Arc::new(Retriever::new(
            Arc::new(CountingEmbedder {
                finished: finished.clone(),
            }),
            Arc::new(EchoIndex),
            ReadinessConfig {
                max_attempts: 1,
                poll_interval_ms: 1,
            },
        ));
        let tasks = TaskTracker::new();

        let mut stream = Box::pin(retrieve_all(
            retriever,
            queries(&["fast", "slow one", "slow two"]),
            6,
            tasks.clone(),
        ));
        let (first, _) = stream.next().await.unwrap();
        assert_eq!(first, "fast");
        drop(stream);

        tasks.close();
        tasks.wait().await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }
}
