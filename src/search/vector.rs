use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::VectorIndexConfig;

/// A nearest-neighbour match returned by the index
#[derive(Debug, Clone, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl VectorMatch {
    /// The string field `key` of the match metadata, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }
}

/// A vector to write into the index
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

/// Client for a Pinecone-style index data plane (`/query`, `/vectors/upsert`).
#[derive(Debug, Clone)]
pub struct VectorIndex {
    client: reqwest::Client,
    config: VectorIndexConfig,
}

impl VectorIndex {
    pub fn new(client: reqwest::Client, config: VectorIndexConfig) -> Self {
        Self { client, config }
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Query the `top_k` nearest neighbours of `vector` in the configured
    /// namespace, metadata included. Results come back best-first.
    pub async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let url = format!("{}/query", self.config.host);
        let req = QueryRequest {
            namespace: &self.config.namespace,
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };

        let resp = self
            .authorized(self.client.post(&url))
            .json(&req)
            .send()
            .await
            .context("Failed to call vector index query API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Vector index query returned {status}: {body}");
        }

        let body: QueryResponse = resp
            .json()
            .await
            .context("Failed to parse vector index query response")?;

        Ok(body.matches)
    }

    /// Upsert records into the configured namespace. Returns the count the
    /// index reports as written.
    pub async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/vectors/upsert", self.config.host);
        let req = UpsertRequest {
            vectors: records,
            namespace: &self.config.namespace,
        };

        let resp = self
            .authorized(self.client.post(&url))
            .json(&req)
            .send()
            .await
            .context("Failed to call vector index upsert API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Vector index upsert returned {status}: {body}");
        }

        let body: UpsertResponse = resp
            .json()
            .await
            .context("Failed to parse vector index upsert response")?;

        Ok(body.upserted_count)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) => req.header("Api-Key", key),
            None => req,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_uses_camel_case() {
        let req = QueryRequest {
            namespace: "default",
            vector: &[0.1, 0.2],
            top_k: 8,
            include_metadata: true,
            include_values: false,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["topK"], 8);
        assert_eq!(json["includeMetadata"], true);
        assert_eq!(json["namespace"], "default");
    }

    #[test]
    fn test_match_parses_without_metadata() {
        let body: QueryResponse =
            serde_json::from_str(r#"{"matches":[{"id":"a","score":0.9}],"namespace":"default"}"#)
                .unwrap();
        assert_eq!(body.matches.len(), 1);
        assert!(body.matches[0].metadata_str("text").is_none());
    }

    #[test]
    fn test_metadata_str_ignores_non_strings() {
        let m: VectorMatch = serde_json::from_str(
            r#"{"id":"a","score":0.5,"metadata":{"text":"hi","size":6}}"#,
        )
        .unwrap();
        assert_eq!(m.metadata_str("text"), Some("hi"));
        assert_eq!(m.metadata_str("size"), None);
    }

    #[test]
    fn test_empty_query_response() {
        let body: QueryResponse = serde_json::from_str("{}").unwrap();
        assert!(body.matches.is_empty());
    }
}
