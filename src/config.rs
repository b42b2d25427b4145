use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the in-memory index file lives
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Result budget used when a request omits `k`
    pub default_k: usize,
    /// LLM used for query decomposition
    pub llm: LlmConfig,
    /// Embedding model configuration
    pub embedding: EmbeddingConfig,
    /// Vector index backend
    pub index: IndexConfig,
    /// How long to wait for the index before giving up on a sub-query
    pub readiness: ReadinessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for query decomposition
    pub chat_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    pub temperature: f32,
    /// Maximum silence between two tokens before the stream is abandoned
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "huggingface", "ollama" or "openai"
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// "memory" or "weaviate"
    pub provider: String,
    pub weaviate: WeaviateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaviateConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Collection (class) holding the stories
    pub class_name: String,
    /// Property holding the story title
    pub text_key: String,
    /// Property holding the Hacker News id, if the collection has one
    pub id_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadinessConfig {
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
}

impl ReadinessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:8000".to_string(),
            default_k: crate::models::default_k(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.0,
            idle_timeout_secs: 30,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "huggingface".to_string(),
            base_url: "https://api-inference.huggingface.co".to_string(),
            model: "sentence-transformers/all-mpnet-base-v2".to_string(),
            api_key: None,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            weaviate: WeaviateConfig::default(),
        }
    }
}

impl Default for WeaviateConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            class_name: "Story".to_string(),
            text_key: "text".to_string(),
            id_key: None,
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            poll_interval_ms: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("HN_SEARCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("HN_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(v) = lookup("HN_SEARCH_DEFAULT_K").and_then(|v| v.parse().ok()) {
            config.default_k = v;
        }

        // LLM
        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Some(model) = lookup("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Some(key) = lookup("LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            config.llm.api_key = Some(key);
        }
        if let Some(v) = lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            config.llm.temperature = v;
        }
        if let Some(v) = lookup("LLM_IDLE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.llm.idle_timeout_secs = v;
        }

        // Embeddings
        if let Some(provider) = lookup("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Some(url) = lookup("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Some(key) = lookup("EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }

        // Vector index
        if let Some(provider) = lookup("INDEX_PROVIDER") {
            config.index.provider = provider;
        }
        if let Some(url) = lookup("WEAVIATE_URL") {
            config.index.weaviate.url = Some(url);
        }
        if let Some(key) = lookup("WEAVIATE_API_KEY") {
            config.index.weaviate.api_key = Some(key);
        }
        if let Some(class) = lookup("WEAVIATE_CLASS") {
            config.index.weaviate.class_name = class;
        }
        if let Some(key) = lookup("WEAVIATE_TEXT_KEY") {
            config.index.weaviate.text_key = key;
        }
        if let Some(key) = lookup("WEAVIATE_ID_KEY") {
            config.index.weaviate.id_key = Some(key);
        }

        // Readiness
        if let Some(v) = lookup("READINESS_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            config.readiness.max_attempts = v;
        }
        if let Some(v) = lookup("READINESS_POLL_MS").and_then(|v| v.parse().ok()) {
            config.readiness.poll_interval_ms = v;
        }

        config
    }

    pub fn stories_path(&self) -> PathBuf {
        self.data_dir.join("stories.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.default_k, 500);
        assert_eq!(config.readiness.max_attempts, 30);
        assert_eq!(config.readiness.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.index.provider, "memory");
        assert_eq!(config.llm.chat_model, "gpt-4o-mini");
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("HN_SEARCH_BIND_ADDR", "0.0.0.0:9999"),
            ("LLM_PROVIDER", "ollama"),
            ("READINESS_MAX_ATTEMPTS", "5"),
            ("WEAVIATE_URL", "https://cluster.example"),
            ("INDEX_PROVIDER", "weaviate"),
        ]));
        assert_eq!(config.bind_addr, "0.0.0.0:9999");
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.readiness.max_attempts, 5);
        assert_eq!(config.index.provider, "weaviate");
        assert_eq!(
            config.index.weaviate.url.as_deref(),
            Some("https://cluster.example")
        );
    }

    #[test]
    fn test_unparseable_numbers_keep_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("HN_SEARCH_DEFAULT_K", "lots"),
            ("READINESS_POLL_MS", "-1"),
        ]));
        assert_eq!(config.default_k, 500);
        assert_eq!(config.readiness.poll_interval_ms, 1000);
    }

    #[test]
    fn test_openai_key_fallback() {
        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-test")]));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    }
}
