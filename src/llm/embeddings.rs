use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Maximum characters sent per text to the embedding API.
/// text-embedding-3-small accepts 8 191 tokens; chat text averages well over
/// 3 chars/token, so 24 000 chars stays under the limit.
const MAX_EMBED_CHARS: usize = 24_000;

/// Texts per embeddings request during batch ingestion
pub const EMBED_BATCH_SIZE: usize = 64;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
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

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Generate embeddings for a batch of texts, in input order.
///
/// Every returned vector is checked against `config.embedding_dim`: a mismatch
/// means the configured model differs from the one the index was built with.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(EMBED_BATCH_SIZE) {
        let req = EmbedRequest {
            model: &config.embedding_model,
            input: chunk.iter().map(|t| truncate_for_embedding(t)).collect(),
        };

        let resp = client
            .post(&url)
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await
            .context("Failed to call embeddings API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Embeddings API returned {status}: {body}");
        }

        let mut body: EmbedResponse = resp
            .json()
            .await
            .context("Failed to parse embeddings response")?;

        if body.data.len() != chunk.len() {
            anyhow::bail!(
                "Embeddings API returned {} vectors for {} inputs",
                body.data.len(),
                chunk.len()
            );
        }

        body.data.sort_by_key(|d| d.index);
        for d in body.data {
            check_dimension(&d.embedding, config.embedding_dim)?;
            all_embeddings.push(d.embedding);
        }
    }

    Ok(all_embeddings)
}

/// Generate the embedding for a single query text.
pub async fn embed_single(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: &str,
) -> Result<Vec<f32>> {
    let results = embed_batch(client, config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .context("No embedding returned")
}

fn check_dimension(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() != expected {
        anyhow::bail!(
            "Embedding dimension {} does not match index dimension {expected}",
            embedding.len()
        );
    }
    Ok(())
}
