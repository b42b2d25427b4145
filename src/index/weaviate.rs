//! Weaviate backend via the REST readiness probe and GraphQL `nearVector`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{IndexedDocument, VectorIndex};
use crate::config::WeaviateConfig;

pub struct WeaviateIndex {
    client: reqwest::Client,
    base_url: String,
    config: WeaviateConfig,
}

impl WeaviateIndex {
    pub fn new(client: reqwest::Client, config: WeaviateConfig) -> Result<Self> {
        let base_url = config
            .url
            .as_deref()
            .context("WEAVIATE_URL must be set for the weaviate index provider")?
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {key}")),
            None => req,
        }
    }
}

#[derive(Serialize)]
struct GraphQlRequest {
    query: String,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlData {
    #[serde(rename = "Get")]
    get: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

/// Build the `Get` query for one vector lookup.
fn build_near_vector_query(config: &WeaviateConfig, vector: &[f32], k: usize) -> Result<String> {
    let vector = serde_json::to_string(vector)?;
    let mut fields = vec![config.text_key.as_str(), "url"];
    if let Some(id_key) = &config.id_key {
        fields.push(id_key);
    }
    Ok(format!(
        "{{ Get {{ {class}(nearVector: {{vector: {vector}}}, limit: {k}) {{ {fields} _additional {{ distance }} }} }} }}",
        class = config.class_name,
        fields = fields.join(" "),
    ))
}

fn string_field(obj: &serde_json::Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Turn a GraphQL response into ranked documents.
fn parse_documents(config: &WeaviateConfig, body: GraphQlResponse) -> Result<Vec<IndexedDocument>> {
    if let Some(err) = body.errors.first() {
        anyhow::bail!("Weaviate query failed: {}", err.message);
    }

    let objects = body
        .data
        .and_then(|mut d| d.get.remove(&config.class_name))
        .context("Weaviate response is missing the requested class")?;

    let objects = match objects {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => anyhow::bail!("Unexpected Weaviate result shape: {other}"),
    };

    Ok(objects
        .iter()
        .map(|obj| {
            let distance = obj
                .pointer("/_additional/distance")
                .and_then(|d| d.as_f64())
                .unwrap_or(1.0) as f32;
            IndexedDocument {
                content: string_field(obj, &config.text_key).unwrap_or_default(),
                url: string_field(obj, "url").unwrap_or_default(),
                source_id: config.id_key.as_deref().and_then(|k| string_field(obj, k)),
                score: 1.0 - distance,
            }
        })
        .collect())
}

#[async_trait]
impl VectorIndex for WeaviateIndex {
    async fn is_ready(&self) -> bool {
        let url = format!("{}/v1/.well-known/ready", self.base_url);
        let req = self
            .authorize(self.client.get(&url))
            .timeout(Duration::from_secs(5));
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("Weaviate readiness probe failed: {e}");
                false
            }
        }
    }

    async fn similarity_search(&self, vector: &[f32], k: usize) -> Result<Vec<IndexedDocument>> {
        let url = format!("{}/v1/graphql", self.base_url);
        let query = build_near_vector_query(&self.config, vector, k)?;

        let resp = self
            .authorize(self.client.post(&url))
            .json(&GraphQlRequest { query })
            .send()
            .await
            .context("Failed to call Weaviate GraphQL API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Weaviate returned {status}: {body}");
        }

        let body: GraphQlResponse = resp
            .json()
            .await
            .context("Failed to parse Weaviate response")?;

        parse_documents(&self.config, body)
    }
}
