//! Transcript chunking: sliding windows over exported message history.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Messages per chunk
pub const DEFAULT_WINDOW: usize = 6;
/// Messages between chunk starts; windows overlap by `window - stride`.
pub const DEFAULT_STRIDE: usize = 3;

/// One exported message: `{ "ts": ..., "author": ..., "content": ... }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryMessage {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl HistoryMessage {
    fn author_or_unknown(&self) -> &str {
        self.author.as_deref().unwrap_or("unknown")
    }
}

/// A window of consecutive messages rendered as a small transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptChunk {
    /// `[ts] author: content` lines joined by newlines
    pub text: String,
    pub start_ts: Option<String>,
    pub end_ts: Option<String>,
    /// Sorted, de-duplicated authors of every message in the window
    pub authors: Vec<String>,
    /// Messages in the window, including blank ones
    pub size: usize,
}

impl TranscriptChunk {
    /// Deterministic id so re-ingesting overwrites the same vectors.
    pub fn stable_id(&self) -> String {
        let raw = format!(
            "{}|{}->{}|{}",
            self.authors.join(","),
            self.start_ts.as_deref().unwrap_or_default(),
            self.end_ts.as_deref().unwrap_or_default(),
            self.text
        );
        let mut digest = sha256::digest(raw);
        digest.truncate(32);
        digest
    }

    /// Metadata stored alongside the vector; `text` is what retrieval reads back.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(ts) = &self.start_ts {
            map.insert("start_ts".into(), Value::from(ts.clone()));
        }
        if let Some(ts) = &self.end_ts {
            map.insert("end_ts".into(), Value::from(ts.clone()));
        }
        map.insert("authors".into(), Value::from(self.authors.clone()));
        map.insert("size".into(), Value::from(self.size));
        map.insert("text".into(), Value::from(self.text.clone()));
        map
    }
}

/// Split history into overlapping windows of `window` messages, advancing by
/// `stride`. Blank messages are left out of the transcript text; windows with
/// no text at all are skipped.
pub fn chunk_messages(
    messages: &[HistoryMessage],
    window: usize,
    stride: usize,
) -> Vec<TranscriptChunk> {
    let window = window.max(1);
    let stride = stride.max(1);
    let mut chunks = Vec::new();

    let mut i = 0;
    while i < messages.len() {
        let group = &messages[i..(i + window).min(messages.len())];

        let text = group
            .iter()
            .filter_map(|m| {
                let content = m.content.as_deref().unwrap_or_default().trim();
                if content.is_empty() {
                    return None;
                }
                Some(format!(
                    "[{}] {}: {}",
                    m.ts.as_deref().unwrap_or_default(),
                    m.author_or_unknown(),
                    content
                ))
            })
            .collect::<Vec<_>>()
            .join("\n");

        if !text.trim().is_empty() {
            let authors: BTreeSet<&str> = group.iter().map(|m| m.author_or_unknown()).collect();
            chunks.push(TranscriptChunk {
                text,
                start_ts: group.first().and_then(|m| m.ts.clone()),
                end_ts: group.last().and_then(|m| m.ts.clone()),
                authors: authors.into_iter().map(str::to_string).collect(),
                size: group.len(),
            });
        }

        i += stride;
    }

    chunks
}
