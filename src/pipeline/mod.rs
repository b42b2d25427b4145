//! Query expansion and fan-out retrieval.
//!
//! ```text
//!   bio ──► LLM token stream ──► extract ──► chunk events (inline)
//!                                   │
//!                                   ▼ sub-queries (after stream end)
//!                               retrieve_all ──► results / error events
//!                                   │            (completion order)
//!                                   ▼
//!                                 done
//! ```

pub mod events;
pub mod extract;
pub mod fanout;
pub mod interleave;
pub mod retrieve;

use futures_util::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::error::SearchError;
use crate::llm::prompt::build_decomposition_prompt;
use crate::llm::token_stream::TokenSource;
use crate::models::ResultItem;

use events::StreamEvent;
use extract::{extract, ExtractEvent};
use fanout::{retrieve_all, Retrieval};
use retrieve::Retriever;

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Everything the expanded search needs, shared across requests.
#[derive(Clone)]
pub struct ExpansionPipeline {
    token_source: Arc<dyn TokenSource>,
    retriever: Arc<Retriever>,
    idle_timeout: Option<Duration>,
    tasks: TaskTracker,
}

impl ExpansionPipeline {
    /// Retrievals are spawned on `tasks`, so whoever owns the tracker can
    /// join them even after a stream was abandoned.
    pub fn new(
        token_source: Arc<dyn TokenSource>,
        retriever: Arc<Retriever>,
        idle_timeout: Option<Duration>,
        tasks: TaskTracker,
    ) -> Self {
        Self {
            token_source,
            retriever,
            idle_timeout,
            tasks,
        }
    }

    /// Run decomposition then fan-out for `bio`, as one ordered event stream.
    ///
    /// Chunk events come first, then one results/error event per sub-query
    /// in completion order, then exactly one `done`. A failing token stream
    /// produces a single error event (no `query`) followed by `done`.
    pub fn run(&self, bio: String, total_k: usize, span: tracing::Span) -> EventStream {
        let start = Phase::Start {
            pipeline: self.clone(),
            bio,
            total_k,
        };
        let stream = stream::unfold(start, move |phase| step(phase).instrument(span.clone()));
        Box::pin(stream)
    }
}

/// Direct path: a single retrieval for the raw bio with the whole budget.
pub async fn direct_search(
    retriever: &Retriever,
    bio: &str,
    total_k: usize,
) -> Result<Vec<ResultItem>, SearchError> {
    retriever.retrieve(bio, total_k).await
}

#[derive(Debug, Default)]
struct Summary {
    sub_queries: usize,
    items: usize,
    failures: usize,
}

enum Phase {
    Start {
        pipeline: ExpansionPipeline,
        bio: String,
        total_k: usize,
    },
    Decomposing {
        extraction: Pin<Box<dyn Stream<Item = ExtractEvent> + Send>>,
        retriever: Arc<Retriever>,
        tasks: TaskTracker,
        total_k: usize,
        started: Instant,
    },
    Retrieving {
        pending: Pin<Box<dyn Stream<Item = Retrieval> + Send>>,
        summary: Summary,
        started: Instant,
    },
    Finishing {
        summary: Summary,
        started: Instant,
    },
    Finished,
}

async fn step(mut phase: Phase) -> Option<(StreamEvent, Phase)> {
    loop {
        phase = match phase {
            Phase::Start {
                pipeline,
                bio,
                total_k,
            } => {
                let started = Instant::now();
                let prompt = build_decomposition_prompt(&bio);
                match pipeline.token_source.token_stream(&prompt).await {
                    Ok(tokens) => Phase::Decomposing {
                        extraction: Box::pin(extract(tokens, pipeline.idle_timeout)),
                        retriever: pipeline.retriever,
                        tasks: pipeline.tasks,
                        total_k,
                        started,
                    },
                    Err(e) => {
                        let err = SearchError::Decomposition(format!("{e:#}"));
                        tracing::warn!("{err}");
                        let next = Phase::Finishing {
                            summary: Summary::default(),
                            started,
                        };
                        return Some((StreamEvent::fatal_error(err.to_string()), next));
                    }
                }
            }

            Phase::Decomposing {
                mut extraction,
                retriever,
                tasks,
                total_k,
                started,
            } => match extraction.next().await {
                Some(ExtractEvent::Chunk(token)) => {
                    let next = Phase::Decomposing {
                        extraction,
                        retriever,
                        tasks,
                        total_k,
                        started,
                    };
                    return Some((StreamEvent::chunk(token), next));
                }
                Some(ExtractEvent::Failed(message)) => {
                    let err = SearchError::Decomposition(message);
                    tracing::warn!("{err}");
                    let next = Phase::Finishing {
                        summary: Summary::default(),
                        started,
                    };
                    return Some((StreamEvent::fatal_error(err.to_string()), next));
                }
                Some(ExtractEvent::Completed(sub_queries)) if !sub_queries.is_empty() => {
                    tracing::info!("Decomposed into {} sub-queries", sub_queries.len());
                    tracing::debug!("Sub-queries: {sub_queries:?}");
                    let summary = Summary {
                        sub_queries: sub_queries.len(),
                        ..Summary::default()
                    };
                    Phase::Retrieving {
                        pending: Box::pin(retrieve_all(retriever, sub_queries, total_k, tasks)),
                        summary,
                        started,
                    }
                }
                Some(ExtractEvent::Completed(_)) | None => {
                    tracing::info!("LLM produced no sub-queries; skipping retrieval");
                    Phase::Finishing {
                        summary: Summary::default(),
                        started,
                    }
                }
            },

            Phase::Retrieving {
                mut pending,
                mut summary,
                started,
            } => match pending.next().await {
                Some((query, outcome)) => {
                    let event = match outcome {
                        Ok(items) => {
                            summary.items += items.len();
                            StreamEvent::results(query, items)
                        }
                        Err(e) => {
                            summary.failures += 1;
                            StreamEvent::query_error(query, e.to_string())
                        }
                    };
                    let next = Phase::Retrieving {
                        pending,
                        summary,
                        started,
                    };
                    return Some((event, next));
                }
                None => Phase::Finishing { summary, started },
            },

            Phase::Finishing { summary, started } => {
                tracing::info!(
                    sub_queries = summary.sub_queries,
                    items = summary.items,
                    failures = summary.failures,
                    "Expanded search finished in {} ms",
                    started.elapsed().as_millis()
                );
                return Some((StreamEvent::done(), Phase::Finished));
            }

            Phase::Finished => return None,
        };
    }
}
