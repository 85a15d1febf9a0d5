//! Clients for the hosted model APIs: embeddings and completions.

pub mod embeddings;
pub mod responses;
