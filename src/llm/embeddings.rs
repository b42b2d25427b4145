use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;

/// Maximum characters sent per text to the embedding API. Story titles and
/// sub-queries are short; this only guards against pathological bios.
const MAX_EMBED_CHARS: usize = 3_000;

fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Turns text into a fixed-size vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results.into_iter().next().context("No embedding returned")
    }
}

/// Embedding model reached over HTTP.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: EmbeddingConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();

        match self.config.provider.as_str() {
            "huggingface" => embed_huggingface(&self.client, &self.config, &truncated).await,
            "ollama" => embed_ollama(&self.client, &self.config, &truncated).await,
            "openai" => embed_openai(&self.client, &self.config, &truncated).await,
            other => anyhow::bail!("Unknown embedding provider: {other}"),
        }
    }
}

fn bearer(config: &EmbeddingConfig) -> String {
    format!("Bearer {}", config.api_key.as_deref().unwrap_or_default())
}

// ─── Hugging Face inference ──────────────────────────────

#[derive(Serialize)]
struct HfFeatureRequest<'a> {
    inputs: &'a [String],
}

async fn embed_huggingface(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!(
        "{}/pipeline/feature-extraction/{}",
        config.base_url.trim_end_matches('/'),
        config.model
    );

    let batch_size = 32;
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size) {
        let resp = client
            .post(&url)
            .header("Authorization", bearer(config))
            .json(&HfFeatureRequest { inputs: chunk })
            .send()
            .await
            .context("Failed to call Hugging Face feature-extraction API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Hugging Face API returned {status}: {body}");
        }

        let body: Vec<Vec<f32>> = resp
            .json()
            .await
            .context("Failed to parse Hugging Face embedding response")?;
        all_embeddings.extend(body);
    }

    Ok(all_embeddings)
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/api/embed", config.base_url);

    let batch_size = 32;
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size) {
        let req = OllamaEmbedRequest {
            model: config.model.clone(),
            input: chunk.to_vec(),
            truncate: true,
        };

        let resp = client
            .post(&url)
            .json(&req)
            .send()
            .await
            .context("Failed to call Ollama embed API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama embed API returned {status}: {body}");
        }

        let body: OllamaEmbedResponse = resp
            .json()
            .await
            .context("Failed to parse Ollama embed response")?;

        all_embeddings.extend(body.embeddings);
    }

    Ok(all_embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/v1/embeddings", config.base_url);

    let batch_size = 64;
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size) {
        let req = OpenAiEmbedRequest {
            model: config.model.clone(),
            input: chunk.to_vec(),
        };

        let resp = client
            .post(&url)
            .header("Authorization", bearer(config))
            .json(&req)
            .send()
            .await
            .context("Failed to call OpenAI embed API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI embed API returned {status}: {body}");
        }

        let body: OpenAiEmbedResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI embed response")?;

        all_embeddings.extend(body.data.into_iter().map(|d| d.embedding));
    }

    Ok(all_embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[test]
    fn test_truncate_for_embedding_short_text_untouched() {
        assert_eq!(truncate_for_embedding("rust"), "rust");
    }

    #[test]
    fn test_truncate_for_embedding_respects_char_boundary() {
        let text = "é".repeat(MAX_EMBED_CHARS);
        let cut = truncate_for_embedding(&text);
        assert!(cut.len() <= MAX_EMBED_CHARS);
        assert!(text.is_char_boundary(cut.len()));
    }

    #[tokio::test]
    async fn test_default_embed_uses_first_batch_entry() {
        let v = FixedEmbedder.embed("abc").await.unwrap();
        assert_eq!(v, vec![3.0]);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_an_error() {
        let embedder = HttpEmbedder::new(
            reqwest::Client::new(),
            EmbeddingConfig {
                provider: "carrier-pigeon".into(),
                ..EmbeddingConfig::default()
            },
        );
        let err = embedder.embed("x").await.unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }
}
