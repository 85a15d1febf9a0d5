use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Chat, ChatMessage, ChatWithMessages, Message, Session, User};

/// Longest title the `chats` table accepts
pub const MAX_TITLE_CHARS: usize = 200;

pub struct UserQueries;

impl UserQueries {
    pub async fn get_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, email, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get user by id")
    }

    pub async fn get_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, email, created_at FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await
            .context("Failed to get user by email")
    }

    /// Look up a user by email, creating the row on first sight.
    pub async fn find_or_create(pool: &SqlitePool, email: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            anyhow::bail!("Email must not be empty");
        }

        sqlx::query("INSERT INTO users (id, email, created_at) VALUES (?, ?, ?) ON CONFLICT(email) DO NOTHING")
            .bind(Uuid::new_v4())
            .bind(&email)
            .bind(Utc::now())
            .execute(pool)
            .await
            .context("Failed to create user")?;

        Self::get_by_email(pool, &email)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve user {email}"))
    }
}

pub struct SessionQueries;

impl SessionQueries {
    /// Mint a new random session token for `user_id`.
    pub async fn create(pool: &SqlitePool, user_id: Uuid, ttl: Duration) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            token: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            user_id,
            created_at: now,
            expires_at: now + ttl,
        };

        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(pool)
        .await
        .context("Failed to create session")?;

        Ok(session)
    }

    /// Resolve a token to its user. Expired or unknown tokens resolve to `None`.
    pub async fn find_user(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to look up session")?;

        match session {
            Some(s) if s.expires_at > Utc::now() => UserQueries::get_by_id(pool, s.user_id).await,
            Some(_) => {
                debug!("Rejected expired session");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub async fn revoke(pool: &SqlitePool, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await
            .context("Failed to revoke session")?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop every expired session. Returns the number removed.
    pub async fn purge_expired(pool: &SqlitePool) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM sessions WHERE julianday(expires_at) <= julianday(?)")
                .bind(Utc::now())
                .execute(pool)
                .await
                .context("Failed to purge expired sessions")?;
        Ok(result.rows_affected())
    }
}

pub struct ChatQueries;

impl ChatQueries {
    /// All chats owned by `user_id`, newest first, messages in position order.
    pub async fn list_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<ChatWithMessages>> {
        let chats = sqlx::query_as::<_, Chat>(
            r#"
            SELECT id, user_id, title, created_at, updated_at
            FROM chats WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list chats")?;

        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT m.id, m.chat_id, m.role, m.content, m.position, m.created_at
            FROM messages m JOIN chats c ON c.id = m.chat_id
            WHERE c.user_id = ?
            ORDER BY m.chat_id, m.position
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list chat messages")?;

        let mut by_chat: HashMap<Uuid, Vec<Message>> = HashMap::new();
        for message in messages {
            by_chat.entry(message.chat_id).or_default().push(message);
        }

        Ok(chats
            .into_iter()
            .map(|chat| {
                let messages = by_chat.remove(&chat.id).unwrap_or_default();
                ChatWithMessages { chat, messages }
            })
            .collect())
    }

    /// Fetch one chat if and only if `user_id` owns it.
    pub async fn get_owned(
        pool: &SqlitePool,
        chat_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ChatWithMessages>> {
        let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
        Self::load_owned(&mut conn, chat_id, user_id).await
    }

    /// Insert a chat and its messages in one transaction.
    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        title: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatWithMessages> {
        let now = Utc::now();
        let chat_id = Uuid::new_v4();

        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin transaction for chat create")?;

        sqlx::query(
            "INSERT INTO chats (id, user_id, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(title)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create chat")?;

        Self::insert_messages(&mut tx, chat_id, messages).await?;

        let created = Self::load_owned(&mut tx, chat_id, user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created chat"))?;

        tx.commit()
            .await
            .context("Failed to commit chat create transaction")?;

        debug!("Created chat {chat_id} with {} messages", messages.len());
        Ok(created)
    }

    /// Apply a title change and/or a full message replacement atomically.
    ///
    /// Returns `None` without touching anything when the chat does not exist
    /// or belongs to someone else.
    pub async fn update_owned(
        pool: &SqlitePool,
        chat_id: Uuid,
        user_id: Uuid,
        title: Option<&str>,
        messages: Option<&[ChatMessage]>,
    ) -> Result<Option<ChatWithMessages>> {
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin transaction for chat update")?;

        if !Self::is_owned(&mut tx, chat_id, user_id).await? {
            return Ok(None);
        }

        if let Some(messages) = messages {
            sqlx::query("DELETE FROM messages WHERE chat_id = ?")
                .bind(chat_id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear chat messages")?;
            Self::insert_messages(&mut tx, chat_id, messages).await?;
        }

        if let Some(title) = title {
            sqlx::query("UPDATE chats SET title = ? WHERE id = ? AND user_id = ?")
                .bind(title)
                .bind(chat_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .context("Failed to update chat title")?;
        }

        sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ? AND user_id = ?")
            .bind(Utc::now())
            .bind(chat_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to touch chat")?;

        let updated = Self::load_owned(&mut tx, chat_id, user_id).await?;

        tx.commit()
            .await
            .context("Failed to commit chat update transaction")?;

        Ok(updated)
    }

    /// Delete a chat and its messages. Returns `false` when not owned.
    pub async fn delete_owned(pool: &SqlitePool, chat_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin transaction for chat delete")?;

        if !Self::is_owned(&mut tx, chat_id, user_id).await? {
            return Ok(false);
        }

        sqlx::query("DELETE FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete chat messages")?;

        sqlx::query("DELETE FROM chats WHERE id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete chat")?;

        tx.commit()
            .await
            .context("Failed to commit chat delete transaction")?;

        debug!("Deleted chat {chat_id}");
        Ok(true)
    }

    async fn is_owned(conn: &mut SqliteConnection, chat_id: Uuid, user_id: Uuid) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM chats WHERE id = ? AND user_id = ?")
                .bind(chat_id)
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await
                .context("Failed to check chat ownership")?;
        Ok(found.is_some())
    }

    async fn load_owned(
        conn: &mut SqliteConnection,
        chat_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ChatWithMessages>> {
        let chat = sqlx::query_as::<_, Chat>(
            "SELECT id, user_id, title, created_at, updated_at FROM chats WHERE id = ? AND user_id = ?",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to get chat")?;

        let Some(chat) = chat else {
            return Ok(None);
        };

        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, chat_id, role, content, position, created_at
            FROM messages WHERE chat_id = ? ORDER BY position ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to get chat messages")?;

        Ok(Some(ChatWithMessages { chat, messages }))
    }

    async fn insert_messages(
        conn: &mut SqliteConnection,
        chat_id: Uuid,
        messages: &[ChatMessage],
    ) -> Result<()> {
        let now = Utc::now();
        for (position, message) in messages.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO messages (id, chat_id, role, content, position, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(chat_id)
            .bind(message.role)
            .bind(&message.content)
            .bind(position as i64)
            .bind(now)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to insert message {position} of chat {chat_id}"))?;
        }
        Ok(())
    }
}
