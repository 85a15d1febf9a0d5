use std::fmt::Write;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::llm::embeddings::embed_single;
use crate::llm::responses::{create_response, FALLBACK_TEXT};
use crate::models::{ChatMessage, ChatRequest, ChatResponse, Role};
use crate::search::style::extract_style_snippets;
use crate::state::AppState;

const PREVIEW_CHARS: usize = 60;

/// POST /api/chat - Style-retrieval chat completion
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;

    // ── Step 1: Find the query ───────────────────────────
    let query = last_user_message(&req.messages)
        .ok_or_else(|| ApiError::BadRequest("No user message provided.".to_string()))?;
    tracing::info!(
        "Chat request: {} messages, query {} chars",
        req.messages.len(),
        query.len()
    );

    // ── Step 2: Embed the query ──────────────────────────
    let query_vector = embed_single(&state.http_client, &state.config.llm, query)
        .await
        .map_err(ApiError::Upstream)?;
    tracing::debug!("Query embedded, dimension {}", query_vector.len());

    // ── Step 3: Retrieve similar history ─────────────────
    let matches = state
        .vectors
        .query(&query_vector, state.config.vector_index.top_k)
        .await
        .map_err(ApiError::Upstream)?;
    tracing::info!(
        "Vector index returned {} matches from namespace '{}'",
        matches.len(),
        state.vectors.namespace()
    );
    for (i, m) in matches.iter().enumerate() {
        tracing::debug!(
            "  {}. score {:.4} | {}",
            i + 1,
            m.score,
            preview(m.metadata_str("text").unwrap_or_default())
        );
    }

    // ── Step 4: Build instructions ───────────────────────
    let snippets = extract_style_snippets(&matches, &state.config.persona);
    let instructions = build_instructions(&state.config.persona.name, &snippets);
    tracing::info!(
        "Using {} style snippets, instructions {} chars",
        snippets.len(),
        instructions.len()
    );

    // ── Step 5: Generate ─────────────────────────────────
    let text = create_response(
        &state.http_client,
        &state.config.llm,
        &instructions,
        &req.messages,
    )
    .await
    .map_err(ApiError::Upstream)?
    .unwrap_or_else(|| {
        tracing::warn!("Completion returned no text, using fallback");
        FALLBACK_TEXT.to_string()
    });

    Ok(Json(ChatResponse { text }))
}

// ─── Helper functions ────────────────────────────────────

/// The trimmed content of the most recent `user` turn, if non-empty.
fn last_user_message(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.trim())
        .filter(|s| !s.is_empty())
}

fn build_instructions(persona: &str, snippets: &[String]) -> String {
    let mut out = format!(
        "You are \"{persona}GPT\" — emulating {persona}'s texting/Discord style based on real message history.\n\
         \n\
         CORE STYLE PATTERNS:\n\
         - Keep responses SHORT (1-3 sentences usually)\n\
         - Use lowercase often (but not always)\n\
         - Common words/phrases: \"bruh\", \"lmao\", \"lolol\", \"dang\", \"omg\", \"slay\", \"fr\", \"sigma\", \"67\", \"gmi\", \"ngmi\", \"chill\"\n\
         - Emojis sparingly but authentically: 💀😭🔥🤑🥀✨ (skull for jokes, fire for hype)\n\
         - Punctuation is casual: lots of !!!, sometimes no periods\n\
         - React authentically: hyped when excited, blunt when real, supportive when needed\n\
         - Don't force slang if it doesn't fit the vibe\n\
         \n\
         REMEMBER:\n\
         - You're an AI emulating her style, not literally her\n\
         - If asked serious questions, be helpful but keep the tone similar\n\
         - Use the examples below as your style guide (don't mention them)\n\
         \n\
         REAL EXAMPLES FROM {upper}:",
        upper = persona.to_uppercase(),
    );

    for (i, snippet) in snippets.iter().enumerate() {
        let _ = write!(out, "\n{}. \"{}\"", i + 1, snippet);
    }

    out
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── Query selection ─────────────────────────────────

    #[test]
    fn test_last_user_message_picks_latest_user_turn() {
        let messages = vec![
            ChatMessage::new(Role::User, "first"),
            ChatMessage::new(Role::Assistant, "reply"),
            ChatMessage::new(Role::User, "  second  "),
            ChatMessage::new(Role::Assistant, "another reply"),
        ];
        assert_eq!(last_user_message(&messages), Some("second"));
    }

    #[test]
    fn test_last_user_message_none_without_user_turns() {
        let messages = vec![
            ChatMessage::new(Role::System, "setup"),
            ChatMessage::new(Role::Assistant, "hi"),
        ];
        assert!(last_user_message(&messages).is_none());
        assert!(last_user_message(&[]).is_none());
    }

    #[test]
    fn test_last_user_message_blank_is_none() {
        // The latest user turn is blank; earlier ones are not consulted.
        let messages = vec![
            ChatMessage::new(Role::User, "earlier"),
            ChatMessage::new(Role::User, "   \n"),
        ];
        assert!(last_user_message(&messages).is_none());
    }

    // ─── Instructions ────────────────────────────────────

    #[test]
    fn test_instructions_number_snippets() {
        let snippets = vec!["bruh".to_string(), "omg slay".to_string()];
        let out = build_instructions("Sophia", &snippets);
        assert!(out.starts_with("You are \"SophiaGPT\""));
        assert!(out.contains("REAL EXAMPLES FROM SOPHIA:\n1. \"bruh\"\n2. \"omg slay\""));
        assert!(out.ends_with("2. \"omg slay\""));
    }

    #[test]
    fn test_instructions_keep_full_style_rules() {
        let out = build_instructions("Sophia", &[]);
        assert!(out.contains("\"fr\", \"sigma\", \"67\", \"gmi\", \"ngmi\", \"chill\""));
        assert!(out.contains("💀😭🔥🤑🥀✨ (skull for jokes, fire for hype)"));
    }

    #[test]
    fn test_instructions_without_snippets() {
        let out = build_instructions("Sam", &[]);
        assert!(out.contains("emulating Sam's texting"));
        assert!(out.ends_with("REAL EXAMPLES FROM SAM:"));
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        let long = "💀".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
