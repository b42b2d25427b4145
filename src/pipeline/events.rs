//! Wire events for the expanded search stream.
//!
//! Every event is one JSON object on a `data: ` line followed by a blank
//! line. The object's keys identify the event kind:
//!
//! ```text
//! data: {"chunk":"ML basics\n"}
//! data: {"results":[{"title":"...","url":"..."}],"query":"ML basics"}
//! data: {"error":"Retrieval failed for 'x': ...","query":"x"}
//! data: {"done":true}
//! ```

use anyhow::{Context, Result};
use axum::response::sse::Event;
use serde::{Deserialize, Serialize};

use crate::models::ResultItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Chunk {
        chunk: String,
    },
    Results {
        results: Vec<ResultItem>,
        query: String,
    },
    /// `query` is set for a single sub-query failure; without it the whole
    /// expansion failed.
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
    Done {
        done: bool,
    },
}

impl StreamEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        StreamEvent::Chunk { chunk: text.into() }
    }

    pub fn results(query: impl Into<String>, results: Vec<ResultItem>) -> Self {
        StreamEvent::Results {
            results,
            query: query.into(),
        }
    }

    pub fn query_error(query: impl Into<String>, message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: message.into(),
            query: Some(query.into()),
        }
    }

    pub fn fatal_error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: message.into(),
            query: None,
        }
    }

    pub fn done() -> Self {
        StreamEvent::Done { done: true }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done { .. })
    }

    /// `data: <json>\n\n`
    pub fn to_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| FALLBACK_ERROR.to_string());
        format!("data: {json}\n\n")
    }

    pub fn to_sse_event(&self) -> Event {
        Event::default()
            .json_data(self)
            .unwrap_or_else(|_| Event::default().data(FALLBACK_ERROR))
    }

    /// Parse one wire line, with or without its `data:` prefix.
    pub fn decode(line: &str) -> Result<Self> {
        let line = line.trim();
        let json = line
            .strip_prefix("data:")
            .map(str::trim_start)
            .unwrap_or(line);
        serde_json::from_str(json).with_context(|| format!("Invalid event: {json}"))
    }
}

const FALLBACK_ERROR: &str = r#"{"error":"failed to encode event"}"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ResultItem {
        ResultItem {
            title: "Show HN: a tiny search engine".into(),
            url: "https://example.com".into(),
            hn_id: Some("8863".into()),
        }
    }

    #[test]
    fn test_wire_shapes() {
        assert_eq!(
            StreamEvent::chunk("ML\n").to_frame(),
            "data: {\"chunk\":\"ML\\n\"}\n\n"
        );
        assert_eq!(StreamEvent::done().to_frame(), "data: {\"done\":true}\n\n");
        assert_eq!(
            serde_json::to_value(StreamEvent::fatal_error("LLM down")).unwrap(),
            serde_json::json!({"error": "LLM down"})
        );
        assert_eq!(
            serde_json::to_value(StreamEvent::query_error("q", "boom")).unwrap(),
            serde_json::json!({"error": "boom", "query": "q"})
        );
        assert_eq!(
            serde_json::to_value(StreamEvent::results("q", vec![item()])).unwrap(),
            serde_json::json!({
                "results": [{"title": "Show HN: a tiny search engine", "url": "https://example.com", "hn_id": "8863"}],
                "query": "q"
            })
        );
    }

    #[test]
    fn test_decode_each_kind() {
        assert_eq!(
            StreamEvent::decode(r#"data: {"chunk": "hi"}"#).unwrap(),
            StreamEvent::chunk("hi")
        );
        assert_eq!(
            StreamEvent::decode(r#"{"results": [], "query": "q"}"#).unwrap(),
            StreamEvent::results("q", vec![])
        );
        assert_eq!(
            StreamEvent::decode(r#"data:{"error": "x"}"#).unwrap(),
            StreamEvent::fatal_error("x")
        );
        assert_eq!(
            StreamEvent::decode(r#"data: {"error": "x", "query": "q"}"#).unwrap(),
            StreamEvent::query_error("q", "x")
        );
        assert!(StreamEvent::decode(r#"data: {"done": true}"#)
            .unwrap()
            .is_done());
    }

    #[test]
    fn test_decode_rejects_unknown_shapes() {
        assert!(StreamEvent::decode(r#"data: {"unexpected": 1}"#).is_err());
        assert!(StreamEvent::decode("data: not json").is_err());
    }

    #[test]
    fn test_frame_decodes_back() {
        let event = StreamEvent::results("rust", vec![item()]);
        let frame = event.to_frame();
        assert_eq!(StreamEvent::decode(frame.trim_end()).unwrap(), event);
    }
}
