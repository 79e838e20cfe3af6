//! Core data types shared across the pipeline.

/// A bounded, overlapping slice of document text. The unit of embedding
/// and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position within the source document, contiguous from 0.
    pub index: i64,
    pub text: String,
    /// SHA-256 of `text`, hex-encoded.
    pub hash: String,
}

/// A chunk returned from similarity search, with its cosine score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// One question/answer exchange in a chat session. Histories are
/// append-only; callers clear them explicitly on session reset.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// A parsed multiple-choice question.
#[derive(Debug, Clone, PartialEq)]
pub struct Mcq {
    pub question: String,
    /// Exactly four options, in A..D order.
    pub options: [String; 4],
    /// Index into `options` of the correct answer.
    pub correct: usize,
    pub explanation: String,
}

impl Mcq {
    pub fn correct_text(&self) -> &str {
        &self.options[self.correct]
    }
}
