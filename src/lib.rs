//! # studyrag
//!
//! A document-study assistant library: point it at a local document
//! (`pdf`, `docx`, `pptx`, `xlsx`, `txt`) and get retrieval-augmented
//! chat, summaries, and auto-generated self-test questions over its
//! content.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────┐   ┌──────────┐
//! │ Extract  │──▶│   Chunk     │──▶│  Embed    │──▶│  SQLite   │
//! │ pdf/ooxml│   │ fixed+over- │   │ (OpenAI)  │   │  vector   │
//! │ /txt     │   │ lap windows │   │           │   │  index    │
//! └──────────┘   └─────────────┘   └───────────┘   └────┬─────┘
//!                                                       │ top-k
//!                                                       ▼
//!                                  ┌────────────┐  ┌──────────┐
//!                                  │ Completion │◀─│ Answerer │
//!                                  │  (OpenAI)  │  │  + chat  │
//!                                  └────────────┘  │  history │
//!                                                  └──────────┘
//! ```
//!
//! The index at a persist path is a cache derived from the source
//! document: if it turns out corrupt or schema-incompatible on write,
//! the builder deletes the directory and rebuilds it, exactly once.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format text extraction |
//! | [`chunk`] | Fixed-size overlapping chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Completion provider abstraction |
//! | [`store`] | Persisted vector index (SQLite) |
//! | [`index`] | Index builder + corruption recovery |
//! | [`answer`] | Retrieval-augmented question answering |
//! | [`summarize`] | Map-reduce summarization |
//! | [`mcq`] | Multiple-choice question generation |
//! | [`error`] | Build/answer error taxonomy |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod mcq;
pub mod models;
pub mod store;
pub mod summarize;
