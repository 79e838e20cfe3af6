//! Index builder: document → persisted vector index.
//!
//! Orchestrates validate → extract → chunk → embed → store-write, with a
//! self-healing path for a corrupt or incompatible on-disk index. The
//! index is a cache derived from the source document, so recovery is
//! destructive and cheap: delete the whole persist directory and rebuild.
//!
//! The recovery protocol is an explicit two-state machine:
//!
//! ```text
//! Attempt1 ──write ok──────────────▶ Success
//!     │
//!     └─corruption signal──▶ purge dir ──▶ Attempt2 ──write ok──▶ Success
//!                                              │
//!                                              └─any failure──▶ Fatal
//! ```
//!
//! Only a store-write failure classified as a corruption signal triggers
//! the retry, and only once. Everything else (missing file, unsupported
//! format, provider failure, unrelated write errors) propagates
//! immediately — retrying a network or auth failure would just mask it.

use std::path::Path;
use tracing::{debug, info, warn};

use crate::chunk::split_text;
use crate::config::ChunkingConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::BuildError;
use crate::extract::{self, ExtractError};
use crate::store::{IndexMeta, IndexWriter, StoreError};

/// Builds (and rebuilds) the vector index for one document.
///
/// All collaborators are injected; the builder holds no global state and
/// owns no long-lived connections.
pub struct IndexBuilder<'a> {
    embedder: &'a dyn EmbeddingProvider,
    writer: &'a dyn IndexWriter,
    chunking: &'a ChunkingConfig,
    corruption_signatures: &'a [String],
}

enum Attempt {
    First,
    Retry,
}

/// Internal split between errors that already have a kind and a
/// store-write failure that still needs corruption classification.
enum StepFailure {
    Fatal(BuildError),
    StoreWrite(anyhow::Error),
}

impl<'a> IndexBuilder<'a> {
    pub fn new(
        embedder: &'a dyn EmbeddingProvider,
        writer: &'a dyn IndexWriter,
        chunking: &'a ChunkingConfig,
        corruption_signatures: &'a [String],
    ) -> Self {
        Self {
            embedder,
            writer,
            chunking,
            corruption_signatures,
        }
    }

    /// Build the index for `document_path` at `persist_path`, overwriting
    /// any previous index. Idempotent: rebuilding an unchanged document
    /// yields an index that answers the same queries.
    pub async fn build(
        &self,
        document_path: &Path,
        persist_path: &Path,
    ) -> Result<(), BuildError> {
        let mut attempt = Attempt::First;
        loop {
            match self.run_once(document_path, persist_path).await {
                Ok(()) => {
                    info!(
                        document = %document_path.display(),
                        persist = %persist_path.display(),
                        "vector index built"
                    );
                    return Ok(());
                }
                Err(StepFailure::Fatal(err)) => return Err(err),
                Err(StepFailure::StoreWrite(cause)) => {
                    let corrupt = is_corruption_signal(&cause, self.corruption_signatures);
                    if corrupt && matches!(attempt, Attempt::First) {
                        warn!(
                            persist = %persist_path.display(),
                            error = %cause,
                            "corrupt or incompatible vector index detected, purging and rebuilding"
                        );
                        purge_index_dir(persist_path);
                        attempt = Attempt::Retry;
                        continue;
                    }
                    return Err(BuildError::StoreBuildFailed(cause));
                }
            }
        }
    }

    async fn run_once(
        &self,
        document_path: &Path,
        persist_path: &Path,
    ) -> Result<(), StepFailure> {
        let text = extract::load_text(document_path).map_err(|e| {
            StepFailure::Fatal(match e {
                ExtractError::NotFound(path) => BuildError::NotFound(path),
                ExtractError::UnsupportedExtension(ext) => BuildError::UnsupportedFormat(ext),
                other => BuildError::StoreBuildFailed(other.into()),
            })
        })?;
        if text.is_empty() {
            return Err(StepFailure::Fatal(BuildError::EmptyExtraction));
        }

        let chunks = split_text(&text, self.chunking.chunk_size, self.chunking.chunk_overlap);
        if chunks.is_empty() {
            return Err(StepFailure::Fatal(BuildError::NoChunksProduced));
        }
        debug!(chunks = chunks.len(), "document chunked");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| StepFailure::Fatal(BuildError::Provider(e)))?;
        if vectors.len() != chunks.len() {
            return Err(StepFailure::Fatal(BuildError::Provider(anyhow::anyhow!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            ))));
        }

        let meta = IndexMeta {
            document: document_path.display().to_string(),
            model: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
        };
        self.writer
            .write(persist_path, &meta, &chunks, &vectors)
            .await
            .map_err(StepFailure::StoreWrite)
    }
}

/// Whether a store-write failure indicates a corrupt or incompatible
/// on-disk index.
///
/// Primary classification is the store's own typed
/// [`StoreError::Incompatible`]. The fallback matches configured
/// substrings against the full cause chain, case-insensitively — fragile
/// across library versions, but the only option for errors that bubble
/// straight out of the storage layer.
pub fn is_corruption_signal(err: &anyhow::Error, signatures: &[String]) -> bool {
    if let Some(StoreError::Incompatible { .. }) = err.downcast_ref::<StoreError>() {
        return true;
    }
    let chain: String = err
        .chain()
        .map(|cause| cause.to_string().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    signatures
        .iter()
        .filter(|sig| !sig.is_empty())
        .any(|sig| chain.contains(&sig.to_lowercase()))
}

/// Best-effort removal of the persist directory tree. A failed deletion
/// is logged and ignored: the rebuild may still succeed if the writer
/// can reinitialize the path.
fn purge_index_dir(persist_path: &Path) {
    if !persist_path.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(persist_path) {
        warn!(
            persist = %persist_path.display(),
            error = %e,
            "failed to delete corrupt index directory"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_signatures() -> Vec<String> {
        crate::config::StoreConfig::default().corruption_signatures
    }

    #[test]
    fn sqlite_missing_column_matches() {
        let err = anyhow::anyhow!("error returned from database: no such column: embedding");
        assert!(is_corruption_signal(&err, &default_signatures()));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let err = anyhow::anyhow!("No Such Column: embedding");
        assert!(is_corruption_signal(&err, &default_signatures()));
    }

    #[test]
    fn signature_found_anywhere_in_cause_chain() {
        let root = anyhow::anyhow!("file is not a database");
        let err = root.context("failed to persist index");
        assert!(is_corruption_signal(&err, &default_signatures()));
    }

    #[test]
    fn typed_incompatible_error_needs_no_signature() {
        let err: anyhow::Error = StoreError::Incompatible { found: 7 }.into();
        assert!(is_corruption_signal(&err, &[]));
    }

    #[test]
    fn unrelated_errors_are_not_corruption() {
        let err = anyhow::anyhow!("connection refused");
        assert!(!is_corruption_signal(&err, &default_signatures()));
    }

    #[test]
    fn purge_tolerates_missing_directory() {
        purge_index_dir(Path::new("/nonexistent/studyrag-test-dir"));
    }
}
