//! Retrieval side of the pipeline: the hosted vector index client and
//! extraction of style snippets from its matches.

pub mod style;
pub mod vector;
