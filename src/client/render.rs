use std::io::Write;
use std::time::Instant;

use super::{EventSink, SearchOutcome};
use crate::models::ResultItem;

/// Writes progress to a terminal: the LLM's sub-queries as they stream,
/// latency to the first token, and a status line per sub-query.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    started: Instant,
    first_token_seen: bool,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            started: Instant::now(),
            first_token_seen: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print one page of merged results with a summary header.
    pub fn render_page(&mut self, outcome: &SearchOutcome, page: usize) -> std::io::Result<()> {
        if let Some(error) = &outcome.error {
            writeln!(self.out, "Search failed: {error}")?;
            return Ok(());
        }
        if outcome.results.is_empty() {
            writeln!(self.out, "No results found")?;
            return Ok(());
        }

        writeln!(
            self.out,
            "\n{} results ({} duplicates removed), page {page}/{}",
            outcome.results.len(),
            outcome.duplicates_removed,
            outcome.page_count()
        )?;
        let offset = page.saturating_sub(1) * super::PAGE_SIZE;
        for (i, item) in outcome.page(page).iter().enumerate() {
            writeln!(self.out, "{:>4}. {}", offset + i + 1, format_item(item))?;
        }
        if !outcome.failed_queries.is_empty() {
            writeln!(
                self.out,
                "Failed sub-queries: {}",
                outcome.failed_queries.join(", ")
            )?;
        }
        self.out.flush()
    }
}

fn format_item(item: &ResultItem) -> String {
    match &item.hn_id {
        Some(id) => format!("{} <{}> (HN {id})", item.title, item.url),
        None => format!("{} <{}>", item.title, item.url),
    }
}

impl<W: Write + Send> EventSink for TerminalRenderer<W> {
    fn on_chunk(&mut self, text: &str) {
        if !self.first_token_seen {
            self.first_token_seen = true;
            let _ = writeln!(
                self.out,
                "First token after {} ms",
                self.started.elapsed().as_millis()
            );
        }
        let _ = write!(self.out, "{text}");
        let _ = self.out.flush();
    }

    fn on_results(&mut self, query: &str, items: &[ResultItem]) {
        let _ = if items.is_empty() {
            writeln!(self.out, "[{query}] No results found")
        } else {
            writeln!(self.out, "[{query}] {} results received", items.len())
        };
    }

    fn on_query_error(&mut self, query: &str, error: &str) {
        let _ = writeln!(self.out, "[{query}] {error}");
    }

    fn on_error(&mut self, error: &str) {
        let _ = writeln!(self.out, "Error: {error}");
    }
}

/// Records every event; used by tests and non-interactive callers.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub chunks: Vec<String>,
    pub results: Vec<(String, Vec<ResultItem>)>,
    pub query_errors: Vec<(String, String)>,
    pub errors: Vec<String>,
}

impl CollectingSink {
    /// All chunks concatenated in arrival order.
    pub fn transcript(&self) -> String {
        self.chunks.concat()
    }
}

impl EventSink for CollectingSink {
    fn on_chunk(&mut self, text: &str) {
        self.chunks.push(text.to_string());
    }

    fn on_results(&mut self, query: &str, items: &[ResultItem]) {
        self.results.push((query.to_string(), items.to_vec()));
    }

    fn on_query_error(&mut self, query: &str, error: &str) {
        self.query_errors
            .push((query.to_string(), error.to_string()));
    }

    fn on_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }
}
