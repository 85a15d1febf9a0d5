//! SQLite persistence for users, sessions, chats and messages.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{ChatMessage, ChatWithMessages, Session, User};

pub mod queries;


pub use queries::{ChatQueries, SessionQueries, UserQueries, MAX_TITLE_CHARS};

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed");
        Ok(())
    }

    // User and session operations
    pub async fn find_or_create_user(&self, email: &str) -> Result<User> {
        UserQueries::find_or_create(&self.pool, email).await
    }

    pub async fn create_session(&self, user_id: Uuid, ttl: chrono::Duration) -> Result<Session> {
        SessionQueries::create(&self.pool, user_id, ttl).await
    }

    pub async fn user_for_session(&self, token: &str) -> Result<Option<User>> {
        SessionQueries::find_user(&self.pool, token).await
    }

    pub async fn revoke_session(&self, token: &str) -> Result<bool> {
        SessionQueries::revoke(&self.pool, token).await
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        SessionQueries::purge_expired(&self.pool).await
    }

    // Chat operations
    pub async fn list_chats(&self, user_id: Uuid) -> Result<Vec<ChatWithMessages>> {
        ChatQueries::list_for_user(&self.pool, user_id).await
    }

    pub async fn get_chat(&self, chat_id: Uuid, user_id: Uuid) -> Result<Option<ChatWithMessages>> {
        ChatQueries::get_owned(&self.pool, chat_id, user_id).await
    }

    pub async fn create_chat(
        &self,
        user_id: Uuid,
        title: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatWithMessages> {
        ChatQueries::create(&self.pool, user_id, title, messages).await
    }

    pub async fn update_chat(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        title: Option<&str>,
        messages: Option<&[ChatMessage]>,
    ) -> Result<Option<ChatWithMessages>> {
        ChatQueries::update_owned(&self.pool, chat_id, user_id, title, messages).await
    }

    pub async fn delete_chat(&self, chat_id: Uuid, user_id: Uuid) -> Result<bool> {
        ChatQueries::delete_owned(&self.pool, chat_id, user_id).await
    }
}
