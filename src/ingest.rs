//! Load exported message history and upsert it into the vector index.

use anyhow::{Context, Result};
use std::path::Path;

use crate::chunking::{chunk_messages, HistoryMessage, TranscriptChunk};
use crate::config::LlmConfig;
use crate::llm::embeddings::{embed_batch, EMBED_BATCH_SIZE};
use crate::search::vector::{VectorIndex, VectorRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub messages: usize,
    pub chunks: usize,
    pub upserted: usize,
}

/// Read a JSON array of `{ts, author, content}` objects.
pub async fn load_history(path: &Path) -> Result<Vec<HistoryMessage>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse message history in {}", path.display()))
}

/// Chunk, embed and upsert `messages`. Chunks are embedded and written one
/// batch at a time.
pub async fn ingest_history(
    client: &reqwest::Client,
    llm: &LlmConfig,
    index: &VectorIndex,
    messages: &[HistoryMessage],
    window: usize,
    stride: usize,
) -> Result<IngestSummary> {
    let chunks = chunk_messages(messages, window, stride);
    tracing::info!("Loaded {} messages", messages.len());
    tracing::info!("Built {} chunks", chunks.len());

    let mut summary = IngestSummary {
        messages: messages.len(),
        chunks: chunks.len(),
        upserted: 0,
    };

    let batches = chunks.len().div_ceil(EMBED_BATCH_SIZE);
    for (n, batch) in chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embeddings = embed_batch(client, llm, &texts)
            .await
            .with_context(|| format!("Embedding batch {} of {batches} failed", n + 1))?;

        let records = to_records(batch, embeddings);
        let written = index
            .upsert(&records)
            .await
            .with_context(|| format!("Upserting batch {} of {batches} failed", n + 1))?;
        summary.upserted += written;

        tracing::info!(
            "Upserted batch {}/{batches} ({written} vectors) into namespace '{}'",
            n + 1,
            index.namespace()
        );
    }

    Ok(summary)
}

fn to_records(chunks: &[TranscriptChunk], embeddings: Vec<Vec<f32>>) -> Vec<VectorRecord> {
    chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, values)| VectorRecord {
            id: chunk.stable_id(),
            values,
            metadata: chunk.metadata(),
        })
        .collect()
}
