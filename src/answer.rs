//! Retrieval-augmented question answering over a built index.
//!
//! [`Answerer`] owns the ready-registry: a keyed cache from
//! `(document_path, persist_path)` to an open [`VectorIndex`], populated
//! by running the index builder at most once per distinct pair. The
//! registry lock is held across build-and-open, so a recovery rebuild
//! always runs to completion before any reader opens the same path.
//!
//! Conversation history is an explicit parameter: `answer` appends one
//! turn on success and never mutates earlier entries. Clearing the
//! history is the caller's session-reset concern.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{AnswerError, BuildError};
use crate::index::IndexBuilder;
use crate::llm::CompletionProvider;
use crate::models::{ConversationTurn, ScoredChunk};
use crate::store::{IndexWriter, VectorIndex};

type ReadyKey = (PathBuf, PathBuf);

pub struct Answerer {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn CompletionProvider>,
    writer: Arc<dyn IndexWriter>,
    ready: Mutex<HashMap<ReadyKey, Arc<VectorIndex>>>,
}

impl Answerer {
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn CompletionProvider>,
        writer: Arc<dyn IndexWriter>,
    ) -> Self {
        Self {
            config,
            embedder,
            llm,
            writer,
            ready: Mutex::new(HashMap::new()),
        }
    }

    /// Build the index for this document/persist pair if it has not been
    /// built yet, and return the open read handle.
    ///
    /// Memoizes successes only; a failed build is reported and retried
    /// on the next call (the build is idempotent). Indexing a different
    /// document into an already-used persist path evicts the old handle:
    /// one store holds one document.
    pub async fn ensure_ready(
        &self,
        document_path: &Path,
        persist_path: &Path,
    ) -> Result<Arc<VectorIndex>, BuildError> {
        let key: ReadyKey = (document_path.to_path_buf(), persist_path.to_path_buf());
        let mut ready = self.ready.lock().await;
        if let Some(index) = ready.get(&key) {
            debug!(persist = %persist_path.display(), "reusing ready index");
            return Ok(index.clone());
        }

        let builder = IndexBuilder::new(
            self.embedder.as_ref(),
            self.writer.as_ref(),
            &self.config.chunking,
            &self.config.store.corruption_signatures,
        );
        builder.build(document_path, persist_path).await?;

        let index = VectorIndex::open(persist_path)
            .await
            .map_err(BuildError::StoreBuildFailed)?;
        let index = Arc::new(index);

        ready.retain(|(_, persisted), _| persisted.as_path() != persist_path);
        ready.insert(key, index.clone());
        Ok(index)
    }

    /// Answer `question` from the document indexed at `persist_path`,
    /// appending the new turn to `history` on success.
    pub async fn answer(
        &self,
        document_path: &Path,
        persist_path: &Path,
        question: &str,
        history: &mut Vec<ConversationTurn>,
    ) -> Result<String, AnswerError> {
        let index = self
            .ensure_ready(document_path, persist_path)
            .await
            .map_err(AnswerError::NotReady)?;

        let query_vec = embed_query(self.embedder.as_ref(), question)
            .await
            .map_err(AnswerError::Provider)?;

        let retrieved = index
            .similarity_search(&query_vec, self.config.retrieval.k)
            .await
            .map_err(AnswerError::Retrieval)?;
        debug!(retrieved = retrieved.len(), "chunks retrieved for question");

        let user_prompt = build_prompt(
            question,
            &retrieved,
            history,
            self.config.memory.max_history_turns,
        );
        let answer = self
            .llm
            .complete(
                &self.config.llm.system_role,
                &user_prompt,
                self.config.llm.temperature,
                self.config.llm.max_tokens,
            )
            .await
            .map_err(AnswerError::AnswerGenerationFailed)?;

        history.push(ConversationTurn {
            question: question.to_string(),
            answer: answer.clone(),
        });
        Ok(answer)
    }
}

/// Assemble the grounding prompt: retrieved excerpts, the tail of the
/// conversation, then the question.
fn build_prompt(
    question: &str,
    excerpts: &[ScoredChunk],
    history: &[ConversationTurn],
    max_history_turns: usize,
) -> String {
    let mut prompt = String::from(
        "Answer the question using only the document excerpts below. \
         If the excerpts do not contain the answer, say so.\n",
    );

    if !excerpts.is_empty() {
        prompt.push_str("\nExcerpts:\n");
        for (i, scored) in excerpts.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n", i + 1, scored.chunk.text));
        }
    }

    let tail_start = history.len().saturating_sub(max_history_turns);
    let tail = &history[tail_start..];
    if !tail.is_empty() {
        prompt.push_str("\nRecent conversation:\n");
        for turn in tail {
            prompt.push_str(&format!("Q: {}\nA: {}\n", turn.question, turn.answer));
        }
    }

    prompt.push_str(&format!("\nQuestion: {}", question));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn scored(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                index: 0,
                text: text.to_string(),
                hash: String::new(),
            },
            score: 0.9,
        }
    }

    fn turn(q: &str, a: &str) -> ConversationTurn {
        ConversationTurn {
            question: q.to_string(),
            answer: a.to_string(),
        }
    }

    #[test]
    fn prompt_contains_excerpts_and_question() {
        let prompt = build_prompt(
            "What is photosynthesis?",
            &[scored("Plants convert light into energy.")],
            &[],
            5,
        );
        assert!(prompt.contains("[1] Plants convert light into energy."));
        assert!(prompt.ends_with("Question: What is photosynthesis?"));
        assert!(!prompt.contains("Recent conversation"));
    }

    #[test]
    fn prompt_keeps_only_the_history_tail() {
        let history: Vec<ConversationTurn> = (0..8)
            .map(|i| turn(&format!("q{}", i), &format!("a{}", i)))
            .collect();
        let prompt = build_prompt("next?", &[], &history, 3);
        assert!(!prompt.contains("Q: q4"));
        assert!(prompt.contains("Q: q5"));
        assert!(prompt.contains("Q: q7"));
    }

    #[test]
    fn prompt_without_excerpts_omits_the_section() {
        let prompt = build_prompt("anything?", &[], &[], 5);
        assert!(!prompt.contains("Excerpts:"));
    }
}
