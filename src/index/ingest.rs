use anyhow::{Context, Result};
use std::path::Path;

use super::memory::MemoryIndex;
use crate::llm::embeddings::Embedder;
use crate::models::Story;

pub const EMBED_BATCH_SIZE: usize = 32;

/// Read one story per line. Blank lines are skipped; stories without a
/// title are dropped with a warning.
pub fn read_stories_jsonl(path: &Path) -> Result<Vec<Story>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut stories = Vec::new();
    for (lineno, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let story: Story = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid story", path.display(), lineno + 1))?;
        if story.title.trim().is_empty() {
            tracing::warn!("{}:{}: story has no title, skipping", path.display(), lineno + 1);
            continue;
        }
        stories.push(story);
    }
    Ok(stories)
}

/// Embed story titles in batches, then append them all to `index` with a
/// single write. Nothing is stored if any batch fails.
/// Returns the number of stories added.
pub async fn ingest_stories(
    embedder: &dyn Embedder,
    index: &MemoryIndex,
    stories: &[Story],
) -> Result<usize> {
    let mut embeddings = Vec::with_capacity(stories.len());
    for batch in stories.chunks(EMBED_BATCH_SIZE) {
        let titles: Vec<String> = batch.iter().map(|s| s.title.clone()).collect();
        let vectors = embedder
            .embed_batch(&titles)
            .await
            .context("Embedding failed during ingestion")?;
        if vectors.len() != batch.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} titles",
                vectors.len(),
                batch.len()
            );
        }
        embeddings.extend(vectors);
        tracing::info!("Embedded {}/{} stories", embeddings.len(), stories.len());
    }

    index.add_stories(stories, embeddings)?;
    Ok(stories.len())
}
