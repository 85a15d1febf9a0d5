use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the SQLite database lives
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Embedding and completion API configuration
    pub llm: LlmConfig,
    /// Hosted vector index configuration
    pub vector_index: VectorIndexConfig,
    /// Persona / style prompt configuration
    pub persona: PersonaConfig,
    /// Lifetime of sessions minted by `issue-session`
    pub session_ttl_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the OpenAI-compatible API
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model name for the completion (Responses API) call
    pub chat_model: String,
    /// Reasoning effort hint: "minimal", "low", "medium" or "high"
    pub reasoning_effort: String,
    /// Model name for embeddings. Must be the model used at ingestion time.
    pub embedding_model: String,
    /// Embedding vector dimension, must match the vector index
    pub embedding_dim: usize,
}

/// Configuration for the Pinecone-style vector index data plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// Index host, e.g. "https://my-index-abc123.svc.us-east-1.pinecone.io"
    pub host: String,
    pub api_key: Option<String>,
    pub namespace: String,
    /// Nearest neighbours requested per chat turn
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Display name used in the instruction template
    pub name: String,
    /// Author label in the ingested transcripts. When set, only this author's
    /// lines survive label stripping.
    pub author: Option<String>,
    /// Maximum number of style snippets placed in the prompt
    pub snippet_limit: usize,
    /// Strip `[ts] author:` speaker labels from retrieved transcripts
    pub strip_labels: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:3000".to_string(),
            llm: LlmConfig::default(),
            vector_index: VectorIndexConfig::default(),
            persona: PersonaConfig::default(),
            session_ttl_hours: 24 * 30,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            chat_model: "gpt-5".to_string(),
            reasoning_effort: "low".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dim: 1536,
        }
    }
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:5080".to_string(),
            api_key: None,
            namespace: "default".to_string(),
            top_k: 8,
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Sophia".to_string(),
            author: None,
            snippet_limit: 6,
            strip_labels: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("PERSONA_CHAT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("PERSONA_CHAT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(val) = std::env::var("SESSION_TTL_HOURS") {
            if let Ok(v) = val.parse() {
                config.session_ttl_hours = v;
            }
        }

        // LLM config
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("OPENAI_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(effort) = std::env::var("OPENAI_REASONING_EFFORT") {
            config.llm.reasoning_effort = effort;
        }
        if let Ok(model) = std::env::var("OPENAI_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(dim) = std::env::var("EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        // Vector index config
        if let Ok(key) = std::env::var("PINECONE_API_KEY") {
            config.vector_index.api_key = Some(key);
        }
        if let Ok(host) = std::env::var("PINECONE_INDEX_HOST") {
            config.vector_index.host = normalize_host(&host);
        }
        if let Ok(ns) = std::env::var("PINECONE_NAMESPACE") {
            if !ns.trim().is_empty() {
                config.vector_index.namespace = ns;
            }
        }
        if let Ok(val) = std::env::var("PINECONE_TOP_K") {
            if let Ok(v) = val.parse::<usize>() {
                config.vector_index.top_k = v.clamp(1, 100);
            }
        }

        // Persona config
        if let Ok(name) = std::env::var("PERSONA_NAME") {
            config.persona.name = name;
        }
        if let Ok(author) = std::env::var("PERSONA_AUTHOR") {
            if !author.trim().is_empty() {
                config.persona.author = Some(author);
            }
        }
        if let Ok(val) = std::env::var("STYLE_SNIPPET_LIMIT") {
            if let Ok(v) = val.parse() {
                config.persona.snippet_limit = v;
            }
        }
        if let Ok(val) = std::env::var("STYLE_STRIP_LABELS") {
            config.persona.strip_labels = parse_bool(&val).unwrap_or(true);
        }

        config
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("chats.db")
    }
}

/// Pinecone hands out bare hostnames; accept those as well as full URLs.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_ingestion_model() {
        let config = Config::default();
        assert_eq!(config.llm.embedding_model, "text-embedding-3-small");
        assert_eq!(config.llm.embedding_dim, 1536);
        assert_eq!(config.vector_index.namespace, "default");
        assert_eq!(config.vector_index.top_k, 8);
        assert_eq!(config.persona.snippet_limit, 6);
    }

    #[test]
    fn test_normalize_host_adds_scheme() {
        assert_eq!(
            normalize_host("idx-123.svc.pinecone.io/"),
            "https://idx-123.svc.pinecone.io"
        );
        assert_eq!(normalize_host("http://localhost:5080"), "http://localhost:5080");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_db_path_under_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/pc"),
            ..Config::default()
        };
        assert_eq!(config.db_path(), PathBuf::from("/tmp/pc/chats.db"));
    }
}
