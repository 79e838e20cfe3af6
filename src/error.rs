//! Error taxonomy for index building and question answering.
//!
//! Build failures and answer failures are separate types so callers can
//! distinguish "your document failed to index" from "the model failed to
//! answer". Cause chains are preserved through [`std::error::Error::source`];
//! rendering user-facing text is the presentation layer's job.

use std::path::PathBuf;

/// Failure while building (or rebuilding) a vector index from a document.
#[derive(Debug)]
pub enum BuildError {
    /// The source document does not exist at the given path.
    NotFound(PathBuf),
    /// The file extension is outside the supported set. Carries the
    /// offending extension.
    UnsupportedFormat(String),
    /// The reader succeeded but produced no text.
    EmptyExtraction,
    /// The chunker produced zero segments from non-empty text.
    NoChunksProduced,
    /// The embedding provider failed (network, auth, quota). Not retried.
    Provider(anyhow::Error),
    /// A store-write failure that survived the single corruption-recovery
    /// retry, or any other unexpected build-time error.
    StoreBuildFailed(anyhow::Error),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::NotFound(path) => write!(f, "document not found: {}", path.display()),
            BuildError::UnsupportedFormat(ext) => {
                write!(f, "unsupported file format: .{}", ext)
            }
            BuildError::EmptyExtraction => write!(f, "no content extracted from document"),
            BuildError::NoChunksProduced => {
                write!(f, "document text produced no chunks")
            }
            BuildError::Provider(e) => write!(f, "embedding provider failed: {}", e),
            BuildError::StoreBuildFailed(e) => write!(f, "vector store build failed: {}", e),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Provider(e) | BuildError::StoreBuildFailed(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Failure while answering a question against a built index.
#[derive(Debug)]
pub enum AnswerError {
    /// The index could not be prepared; wraps the build failure.
    NotReady(BuildError),
    /// Embedding the question failed.
    Provider(anyhow::Error),
    /// Reading candidates back from the store failed.
    Retrieval(anyhow::Error),
    /// The completion call failed. Not retried; the caller may simply
    /// ask again.
    AnswerGenerationFailed(anyhow::Error),
}

impl std::fmt::Display for AnswerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerError::NotReady(e) => write!(f, "index not ready: {}", e),
            AnswerError::Provider(e) => write!(f, "embedding provider failed: {}", e),
            AnswerError::Retrieval(e) => write!(f, "retrieval failed: {}", e),
            AnswerError::AnswerGenerationFailed(e) => {
                write!(f, "answer generation failed: {}", e)
            }
        }
    }
}

impl std::error::Error for AnswerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnswerError::NotReady(e) => Some(e),
            AnswerError::Provider(e)
            | AnswerError::Retrieval(e)
            | AnswerError::AnswerGenerationFailed(e) => Some(e.as_ref()),
        }
    }
}
