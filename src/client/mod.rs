//! HTTP client for the search service.
//!
//! [`SearchClient`] speaks the same contract the server exposes: a JSON
//! round trip for direct search, and an event stream for expanded search
//! whose result sets are merged with [`interleave`] once `done` arrives.
//! Progress is reported to an [`EventSink`] as events are decoded.

pub mod render;

use futures_util::StreamExt;
use std::time::Duration;

use crate::error::SearchError;
use crate::llm::token_stream::stream_lines;
use crate::models::{ErrorResponse, ResultItem, SearchRequest, SearchResponse};
use crate::pipeline::events::StreamEvent;
use crate::pipeline::interleave::interleave;

pub use render::{CollectingSink, TerminalRenderer};

pub const PAGE_SIZE: usize = 20;

/// Receives decoded events while a search is in flight.
pub trait EventSink: Send {
    fn on_chunk(&mut self, _text: &str) {}
    fn on_results(&mut self, _query: &str, _items: &[ResultItem]) {}
    fn on_query_error(&mut self, _query: &str, _error: &str) {}
    fn on_error(&mut self, _error: &str) {}
}

/// Final, merged view of one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub results: Vec<ResultItem>,
    pub duplicates_removed: usize,
    pub failed_queries: Vec<String>,
    /// Set when the whole expansion failed; `results` is then empty.
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn page_count(&self) -> usize {
        self.results.len().div_ceil(PAGE_SIZE)
    }

    /// 1-based page of results; out-of-range pages are empty.
    pub fn page(&self, page: usize) -> &[ResultItem] {
        let start = page.saturating_sub(1).saturating_mul(PAGE_SIZE);
        if page == 0 || start >= self.results.len() {
            return &[];
        }
        let end = (start + PAGE_SIZE).min(self.results.len());
        &self.results[start..end]
    }
}

pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    direct_timeout: Duration,
    expanded_timeout: Duration,
}

impl SearchClient {
    pub fn new(base_url: &str) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(transport)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            direct_timeout: Duration::from_secs(60),
            expanded_timeout: Duration::from_secs(120),
        })
    }

    pub fn with_timeouts(mut self, direct: Duration, expanded: Duration) -> Self {
        self.direct_timeout = direct;
        self.expanded_timeout = expanded;
        self
    }

    /// POST /search. `None` leaves the budget to the server.
    pub async fn search_direct(
        &self,
        bio: &str,
        k: Option<usize>,
        sink: &mut dyn EventSink,
    ) -> Result<SearchOutcome, SearchError> {
        let resp = self
            .post("/search", bio, k, self.direct_timeout)
            .await?
            .json::<SearchResponse>()
            .await
            .map_err(transport)?;

        sink.on_results(bio, &resp.results);
        Ok(SearchOutcome {
            results: resp.results,
            ..SearchOutcome::default()
        })
    }

    /// POST /search_llm, decoding events as they arrive.
    pub async fn search_expanded(
        &self,
        bio: &str,
        k: Option<usize>,
        sink: &mut dyn EventSink,
    ) -> Result<SearchOutcome, SearchError> {
        let resp = self
            .post("/search_llm", bio, k, self.expanded_timeout)
            .await?;

        let mut lines = Box::pin(stream_lines(resp.bytes_stream()));
        let mut collector = ExpandedCollector::default();

        while let Some(line) = lines.next().await {
            let line = line.map_err(|e| SearchError::Transport(format!("{e:#}")))?;
            if !line.starts_with("data:") {
                // keep-alive comments and other SSE fields
                continue;
            }
            let event = match StreamEvent::decode(&line) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Skipping undecodable event: {e:#}");
                    continue;
                }
            };
            if collector.handle(event, sink) {
                return Ok(collector.finish());
            }
        }

        Err(SearchError::Transport(
            "event stream ended before completion".to_string(),
        ))
    }

    async fn post(
        &self,
        path: &str,
        bio: &str,
        k: Option<usize>,
        timeout: Duration,
    ) -> Result<reqwest::Response, SearchError> {
        let body = SearchRequest {
            user_input: bio.to_string(),
            k,
        };
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| e.error)
            .unwrap_or(text);
        Err(SearchError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn transport(e: reqwest::Error) -> SearchError {
    SearchError::Transport(e.to_string())
}

/// Accumulates an expanded search's events until `done`.
#[derive(Default)]
struct ExpandedCollector {
    sets: Vec<Vec<ResultItem>>,
    failed_queries: Vec<String>,
    error: Option<String>,
}

impl ExpandedCollector {
    /// Returns true once the terminal event has been seen.
    fn handle(&mut self, event: StreamEvent, sink: &mut dyn EventSink) -> bool {
        match event {
            StreamEvent::Chunk { chunk } => sink.on_chunk(&chunk),
            StreamEvent::Results { results, query } => {
                sink.on_results(&query, &results);
                self.sets.push(results);
            }
            StreamEvent::Error {
                error,
                query: Some(query),
            } => {
                sink.on_query_error(&query, &error);
                self.failed_queries.push(query);
            }
            StreamEvent::Error { error, query: None } => {
                sink.on_error(&error);
                self.error = Some(error);
            }
            StreamEvent::Done { .. } => return true,
        }
        false
    }

    fn finish(self) -> SearchOutcome {
        let merged = interleave(&self.sets);
        SearchOutcome {
            results: merged.items,
            duplicates_removed: merged.duplicates_removed,
            failed_queries: self.failed_queries,
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> ResultItem {
        ResultItem {
            title: format!("story {id}"),
            url: format!("https://news.ycombinator.com/item?id={id}"),
            hn_id: Some(id.to_string()),
        }
    }

    #[test]
    fn test_collector_merges_and_reports() {
        let mut sink = CollectingSink::default();
        let mut collector = ExpandedCollector::default();
        let events = vec![
            StreamEvent::chunk("rust\n"),
            StreamEvent::chunk("go\n"),
            StreamEvent::results("go", vec![item("1"), item("2")]),
            StreamEvent::query_error("rust", "boom"),
            StreamEvent::results("wasm", vec![item("2"), item("3")]),
        ];
        for event in events {
            assert!(!collector.handle(event, &mut sink));
        }
        assert!(collector.handle(StreamEvent::done(), &mut sink));

        let outcome = collector.finish();
        let ids: Vec<_> = outcome
            .results
            .iter()
            .map(|i| i.hn_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(outcome.duplicates_removed, 1);
        assert_eq!(outcome.failed_queries, vec!["rust".to_string()]);
        assert!(outcome.error.is_none());

        assert_eq!(sink.transcript(), "rust\ngo\n");
        assert_eq!(sink.results.len(), 2);
        assert_eq!(sink.query_errors, vec![("rust".into(), "boom".into())]);
    }

    #[test]
    fn test_collector_keeps_fatal_error() {
        let mut sink = CollectingSink::default();
        let mut collector = ExpandedCollector::default();
        collector.handle(StreamEvent::fatal_error("LLM down"), &mut sink);
        assert!(collector.handle(StreamEvent::done(), &mut sink));

        let outcome = collector.finish();
        assert_eq!(outcome.error.as_deref(), Some("LLM down"));
        assert!(outcome.results.is_empty());
        assert_eq!(sink.errors, vec!["LLM down".to_string()]);
    }

    #[test]
    fn test_pagination() {
        let outcome = SearchOutcome {
            results: (0..45).map(|i| item(&i.to_string())).collect(),
            ..SearchOutcome::default()
        };
        assert_eq!(outcome.page_count(), 3);
        assert_eq!(outcome.page(1).len(), 20);
        assert_eq!(outcome.page(3).len(), 5);
        assert_eq!(outcome.page(3)[0].hn_id.as_deref(), Some("40"));
        assert!(outcome.page(0).is_empty());
        assert!(outcome.page(4).is_empty());
        assert_eq!(SearchOutcome::default().page_count(), 0);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = SearchClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
