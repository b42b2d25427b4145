use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{IndexedDocument, VectorIndex};
use crate::models::Story;

/// A stored story with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoryEntry {
    title: String,
    url: String,
    #[serde(default)]
    hn_id: Option<String>,
    embedding: Vec<f32>,
}

/// In-memory story index with JSON persistence and cosine similarity search.
pub struct MemoryIndex {
    entries: RwLock<Vec<StoryEntry>>,
    persist_path: PathBuf,
}

impl MemoryIndex {
    pub fn open_or_create(persist_path: &Path) -> Result<Self> {
        if let Some(parent) = persist_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = if persist_path.exists() {
            let data =
                std::fs::read_to_string(persist_path).context("Failed to read story index")?;
            serde_json::from_str(&data).context("Story index is corrupt")?
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Add stories. `embeddings` must be parallel with `stories`.
    pub fn add_stories(&self, stories: &[Story], embeddings: Vec<Vec<f32>>) -> Result<()> {
        if stories.len() != embeddings.len() {
            anyhow::bail!(
                "Got {} embeddings for {} stories",
                embeddings.len(),
                stories.len()
            );
        }

        let mut entries = self.entries.write();
        let previous_len = entries.len();
        for (story, embedding) in stories.iter().zip(embeddings) {
            entries.push(StoryEntry {
                title: story.title.clone(),
                url: story.url.clone(),
                hn_id: story.hn_id.clone(),
                embedding,
            });
        }

        // Memory only keeps what made it to disk
        if let Err(e) = self.persist(&entries) {
            entries.truncate(previous_len);
            return Err(e);
        }
        Ok(())
    }

    /// Atomic write via temp file + rename.
    fn persist(&self, entries: &[StoryEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .context("Failed to replace story index")?;
        Ok(())
    }

    pub fn search(&self, query_embedding: &[f32], limit: usize) -> Vec<IndexedDocument> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &StoryEntry)> = entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        // Stable sort keeps insertion order among ties
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| IndexedDocument {
                content: e.title.clone(),
                url: e.url.clone(),
                source_id: e.hn_id.clone(),
                score,
            })
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn is_ready(&self) -> bool {
        true
    }

    async fn similarity_search(&self, vector: &[f32], k: usize) -> Result<Vec<IndexedDocument>> {
        Ok(self.search(vector, k))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
