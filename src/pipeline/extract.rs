use futures_util::stream::{self, Stream, StreamExt};
use std::time::Duration;

use crate::llm::token_stream::TokenStream;

/// Incremental splitter turning LLM output into newline-delimited sub-queries.
#[derive(Debug, Default)]
pub struct SubQueryExtractor {
    buffer: String,
    sub_queries: Vec<String>,
}

impl SubQueryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token and move every completed line into the sub-query list.
    pub fn push(&mut self, token: &str) {
        self.buffer.push_str(token);
        while let Some(pos) = self.buffer.find('\n') {
            let rest = self.buffer.split_off(pos + 1);
            let line = std::mem::replace(&mut self.buffer, rest);
            let query = line.trim();
            if !query.is_empty() {
                self.sub_queries.push(query.to_string());
            }
        }
    }

    /// Sub-queries completed so far, in extraction order.
    pub fn sub_queries(&self) -> &[String] {
        &self.sub_queries
    }

    /// Flush the buffer and return every sub-query.
    pub fn finish(mut self) -> Vec<String> {
        let tail = self.buffer.trim();
        if !tail.is_empty() {
            self.sub_queries.push(tail.to_string());
        }
        self.sub_queries
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractEvent {
    /// A token, forwarded as soon as it arrives.
    Chunk(String),
    /// The token stream ended; these are all sub-queries.
    Completed(Vec<String>),
    /// The token stream failed or went idle. Nothing follows.
    Failed(String),
}

/// Consume `tokens`, yielding each one as a chunk and finishing with either
/// the extracted sub-queries or a failure.
pub fn extract(
    tokens: TokenStream,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = ExtractEvent> + Send {
    stream::unfold(
        Some((tokens, SubQueryExtractor::new())),
        move |state| async move {
            let (mut tokens, mut extractor) = state?;
            loop {
                let next = match idle_timeout {
                    Some(limit) => match tokio::time::timeout(limit, tokens.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            return Some((
                                ExtractEvent::Failed("LLM response timed out (idle)".to_string()),
                                None,
                            ))
                        }
                    },
                    None => tokens.next().await,
                };

                match next {
                    Some(Ok(token)) if token.is_empty() => continue,
                    Some(Ok(token)) => {
                        extractor.push(&token);
                        return Some((ExtractEvent::Chunk(token), Some((tokens, extractor))));
                    }
                    Some(Err(e)) => return Some((ExtractEvent::Failed(format!("{e:#}")), None)),
                    None => return Some((ExtractEvent::Completed(extractor.finish()), None)),
                }
            }
        },
    )
}
