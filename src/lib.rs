//! code-reranker: rerank code search results with a cross-encoder
//!
//! An HTTP service that takes a query and candidate code snippets and returns
//! the snippet ids ordered by cross-encoder relevance, with scores and ranks.

pub mod commands;
pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod rerank;
pub mod server;
pub mod warmup;

pub use error::{Error, Result};
pub use rerank::{CrossEncoder, Document, RerankPipeline, ScoredDocument, ScoringPair};
