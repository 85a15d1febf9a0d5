//! # persona-chat
//!
//! Backend for a chatbot that answers in the texting style of a real person.
//! Each chat turn retrieves similar snippets of that person's message history
//! from a hosted vector index and hands them to a hosted LLM as a style guide.
//!
//! ## Chat pipeline
//!
//! ```text
//!        ┌──────────────────────────┐
//!        │ POST /api/chat {messages}│
//!        └────────────┬─────────────┘
//!                     │ latest user message
//!                     ▼
//!        ┌──────────────────────────┐
//!        │  Embed query             │  /v1/embeddings
//!        └────────────┬─────────────┘
//!                     ▼
//!        ┌──────────────────────────┐
//!        │  Vector query            │  namespace, top_k, metadata
//!        └────────────┬─────────────┘
//!                     ▼
//!        ┌──────────────────────────┐
//!        │  metadata.text           │
//!        │  strip speaker labels    │
//!        │  keep first N            │
//!        └────────────┬─────────────┘
//!                     ▼
//!        ┌──────────────────────────┐
//!        │  Instructions template   │
//!        └────────────┬─────────────┘
//!                     ▼
//!        ┌──────────────────────────┐
//!        │  Completion              │  /v1/responses, full history
//!        └────────────┬─────────────┘
//!                     ▼
//!              { text } | { error }
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, model APIs, index and persona
//! - [`models`] - Shared data types: `ChatMessage`, `Chat`, `Message`, request/response types
//! - [`db`] - SQLite persistence (sqlx) for users, sessions, chats and messages
//! - [`llm::embeddings`] - Query and batch embeddings via an OpenAI-compatible API
//! - [`llm::responses`] - Completion via the Responses API, with a fixed fallback reply
//! - [`search::vector`] - Client for the hosted vector index (query and upsert)
//! - [`search::style`] - Style snippet extraction and speaker-label stripping
//! - [`chunking`] - Sliding-window transcript chunks for ingestion
//! - [`ingest`] - Batch embed + upsert of exported message history
//! - [`api`] - Axum handlers for chat, chat CRUD and sessions
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod db;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
