use std::time::Duration;

use crate::config::Config;
use crate::db::Database;
use crate::search::vector::VectorIndex;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub vectors: VectorIndex,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Ensure data directory exists
        std::fs::create_dir_all(&config.data_dir)?;

        let db = Database::new(config.db_path()).await?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;

        let vectors = VectorIndex::new(http_client.clone(), config.vector_index.clone());

        Ok(Self {
            config,
            db,
            vectors,
            http_client,
        })
    }
}
