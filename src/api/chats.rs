use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::error::ApiError;
use crate::db::MAX_TITLE_CHARS;
use crate::models::{ChatMessage, ChatWithMessages, CreateChatRequest, Role, UpdateChatRequest};
use crate::state::AppState;

const DEFAULT_TITLE: &str = "New chat";

/// GET /api/chats - The caller's chats, newest first
pub async fn list_chats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ChatWithMessages>>, ApiError> {
    let chats = state
        .db
        .list_chats(auth.user.id)
        .await
        .map_err(ApiError::Database)?;
    Ok(Json(chats))
}

/// POST /api/chats - Create a chat with its initial messages
pub async fn create_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<CreateChatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChatWithMessages>), ApiError> {
    let Json(req) = payload?;

    let title = match req.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => truncate_title(t),
        _ => derive_title(&req.messages),
    };

    let chat = state
        .db
        .create_chat(auth.user.id, &title, &req.messages)
        .await
        .map_err(ApiError::Database)?;

    tracing::info!(
        "Created chat {} ({} messages) for {}",
        chat.chat.id,
        chat.messages.len(),
        auth.user.email
    );
    Ok((StatusCode::CREATED, Json(chat)))
}

/// GET /api/chats/{id} - One chat with its messages
pub async fn get_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ChatWithMessages>, ApiError> {
    let Path(id) = path?;
    state
        .db
        .get_chat(id, auth.user.id)
        .await
        .map_err(ApiError::Database)?
        .map(Json)
        .ok_or_else(chat_not_found)
}

/// PATCH /api/chats/{id} - Rename and/or replace all messages, atomically
pub async fn update_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateChatRequest>, JsonRejection>,
) -> Result<Json<ChatWithMessages>, ApiError> {
    let Path(id) = path?;
    let Json(req) = payload?;
    if req.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    let title = match req.title.as_deref().map(str::trim) {
        Some("") => {
            return Err(ApiError::BadRequest("Title must not be empty".to_string()));
        }
        Some(t) => Some(truncate_title(t)),
        None => None,
    };

    let updated = state
        .db
        .update_chat(id, auth.user.id, title.as_deref(), req.messages.as_deref())
        .await
        .map_err(ApiError::Database)?
        .ok_or_else(chat_not_found)?;

    tracing::debug!("Updated chat {id}");
    Ok(Json(updated))
}

/// DELETE /api/chats/{id} - Remove a chat and its messages
pub async fn delete_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = path?;
    let deleted = state
        .db
        .delete_chat(id, auth.user.id)
        .await
        .map_err(ApiError::Database)?;

    if !deleted {
        return Err(chat_not_found());
    }

    tracing::info!("Deleted chat {id} for {}", auth.user.email);
    Ok(Json(json!({ "success": true })))
}

fn chat_not_found() -> ApiError {
    ApiError::NotFound("Chat not found".to_string())
}

/// Title from the first user message, or the default when there is none.
fn derive_title(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .map(|t| truncate_title(&t))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

fn truncate_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_from_first_user_message() {
        let messages = vec![
            ChatMessage::new(Role::Assistant, "hey"),
            ChatMessage::new(Role::User, "what's\n the   vibe"),
            ChatMessage::new(Role::User, "second"),
        ];
        assert_eq!(derive_title(&messages), "what's the vibe");
    }

    #[test]
    fn test_derive_title_default() {
        assert_eq!(derive_title(&[]), DEFAULT_TITLE);
        let messages = vec![ChatMessage::new(Role::User, "   ")];
        assert_eq!(derive_title(&messages), DEFAULT_TITLE);
    }

    #[test]
    fn test_truncate_title_counts_chars() {
        let title = "😭".repeat(MAX_TITLE_CHARS + 10);
        assert_eq!(truncate_title(&title).chars().count(), MAX_TITLE_CHARS);
    }
}
