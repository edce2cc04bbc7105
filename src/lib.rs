#![deny(missing_docs)]

//! Core library for the docqa document question answering server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text extraction for uploaded files.
pub mod extract;
/// Language model client abstraction and adapters.
pub mod generation;
/// Per-session vector index.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Chunking, ingestion, retrieval, and answer generation.
pub mod processing;
/// Per-call cancellation and timeout options.
pub mod request;
/// Session registry and lifecycle.
pub mod session;
