//! # hn-search
//!
//! Finds Hacker News stories relevant to a free-text bio. The bio is either
//! searched directly, or decomposed by an LLM into a handful of sub-queries
//! that are retrieved concurrently and streamed back as server-sent events.
//!
//! ## Architecture
//!
//! ```text
//!                        ┌──────────────┐
//!                        │   User bio   │
//!                        └──────┬───────┘
//!                 ┌─────────────┴──────────────┐
//!                 ▼                            ▼
//!        POST /search                 POST /search_llm
//!        ┌────────────┐           ┌───────────────────────┐
//!        │  Retriever │           │  LLM token stream     │──► chunk events
//!        │  (k = K)   │           │  split on newlines    │
//!        └─────┬──────┘           └──────────┬────────────┘
//!              │                             │ n sub-queries
//!              ▼                 ┌───────────┼───────────┐
//!        {"results": [..]}       ▼           ▼           ▼
//!                          ┌──────────┐┌──────────┐┌──────────┐
//!                          │ Retriever││ Retriever││ Retriever│
//!                          │ k = K/n  ││ k = K/n  ││ k = K/n  │
//!                          └────┬─────┘└────┬─────┘└────┬─────┘
//!                               └───────────┼───────────┘
//!                                           │ completion order
//!                                           ▼
//!                               results / error events, done
//!                                           │
//!                                           ▼ (client)
//!                              ┌────────────────────────┐
//!                              │ Round-robin interleave │
//!                              │ + de-duplication       │
//!                              └────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, providers and readiness polling
//! - [`models`] - Wire types: `ResultItem`, `SearchRequest`, `Story`, error bodies
//! - [`error`] - `SearchError` and its HTTP mapping
//! - [`llm::token_stream`] - Streaming chat completions from Ollama or OpenAI-compatible APIs
//! - [`llm::prompt`] - Few-shot decomposition prompt and input truncation
//! - [`llm::embeddings`] - Embeddings via Hugging Face, Ollama or OpenAI-compatible APIs
//! - [`index`] - `VectorIndex` trait with in-memory and Weaviate backends, plus ingestion
//! - [`pipeline`] - Sub-query extraction, fan-out retrieval, interleaving and stream events
//! - [`api`] - Axum handlers for direct search, streamed expanded search and the probe
//! - [`client`] - HTTP client, event sinks and terminal rendering
//! - [`state`] - Shared application context built once at startup

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod state;
