use serde::{Deserialize, Serialize};

/// A single story returned by the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultItem {
    pub title: String,
    pub url: String,
    /// Opaque source id (Hacker News item id when the index stores one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hn_id: Option<String>,
}

/// Identity used for de-duplication across result sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Source(String),
    TitleUrl(String, String),
}

impl ResultItem {
    pub fn key(&self) -> ItemKey {
        match &self.hn_id {
            Some(id) => ItemKey::Source(id.clone()),
            None => ItemKey::TitleUrl(self.title.clone(), self.url.clone()),
        }
    }
}

/// Search request shared by the direct and LLM-expanded endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Absent and blank bios are both rejected as a missing query.
    #[serde(default, alias = "userInput")]
    pub user_input: String,
    /// Total result budget; the server's configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
}

/// Result budget used when neither the request nor the environment sets one.
pub fn default_k() -> usize {
    500
}

/// Direct search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ResultItem>,
}

/// Error body returned with 4xx/5xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of the keep-alive probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub message: String,
}

/// A story as written to (and read from) the in-memory index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub hn_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_k_is_optional() {
        let req: SearchRequest = serde_json::from_str(r#"{"user_input": "rust"}"#).unwrap();
        assert_eq!(req.k, None);
        assert_eq!(default_k(), 500);
    }

    #[test]
    fn test_request_accepts_camel_case_and_missing_bio() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"userInput": "rust", "k": 10}"#).unwrap();
        assert_eq!(req.user_input, "rust");
        assert_eq!(req.k, Some(10));

        let req: SearchRequest = serde_json::from_str(r#"{"k": 10}"#).unwrap();
        assert!(req.user_input.is_empty());
    }

    #[test]
    fn test_result_item_omits_missing_hn_id() {
        let item = ResultItem {
            title: "Show HN".into(),
            url: "https://example.com".into(),
            hn_id: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"title": "Show HN", "url": "https://example.com"})
        );
    }

    #[test]
    fn test_key_prefers_source_id() {
        let a = ResultItem {
            title: "a".into(),
            url: "u1".into(),
            hn_id: Some("42".into()),
        };
        let b = ResultItem {
            title: "b".into(),
            url: "u2".into(),
            hn_id: Some("42".into()),
        };
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_falls_back_to_title_and_url() {
        let a = ResultItem {
            title: "a".into(),
            url: "u".into(),
            hn_id: None,
        };
        let b = ResultItem {
            title: "a".into(),
            url: "other".into(),
            hn_id: None,
        };
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), a.clone().key());
    }
}
