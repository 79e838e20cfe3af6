//! Map-reduce document summarization.
//!
//! Shares the extraction and chunking front-end with the index builder,
//! then summarizes a bounded number of leading chunks individually and
//! merges the partial summaries with a final completion call.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::chunk::split_text;
use crate::config::SummarizerConfig;
use crate::extract;
use crate::llm::CompletionProvider;

/// Temperature for summarization calls; lower than chat so summaries
/// stay close to the source.
const SUMMARY_TEMPERATURE: f32 = 0.5;

pub struct Summarizer<'a> {
    llm: &'a dyn CompletionProvider,
    config: &'a SummarizerConfig,
}

impl<'a> Summarizer<'a> {
    pub fn new(llm: &'a dyn CompletionProvider, config: &'a SummarizerConfig) -> Self {
        Self { llm, config }
    }

    /// Produce a final merged summary of the document at `path`.
    pub async fn summarize_file(&self, path: &Path) -> Result<String> {
        let text = extract::load_text(path)?;
        if text.trim().is_empty() {
            anyhow::bail!("no content extracted from {}", path.display());
        }

        let chunks = split_text(&text, self.config.chunk_size, self.config.chunk_overlap);
        if chunks.is_empty() {
            anyhow::bail!("document text produced no chunks");
        }
        debug!(
            chunks = chunks.len(),
            summarized = chunks.len().min(self.config.max_chunk_summaries),
            "summarizing document"
        );

        let mut summaries = Vec::new();
        for chunk in chunks.iter().take(self.config.max_chunk_summaries) {
            let prompt = format!(
                "Summarize the following document chunk in a clear, useful way for a student:\n\n{}",
                chunk.text
            );
            let summary = self
                .llm
                .complete(
                    &self.config.system_role,
                    &prompt,
                    SUMMARY_TEMPERATURE,
                    self.config.chunk_summary_tokens,
                )
                .await
                .context("chunk summarization failed")?;
            summaries.push(summary);
        }

        let combined = summaries.join(" ");
        let final_prompt = format!(
            "Merge and refine the following summaries into a final coherent summary \
             for easy student understanding:\n\n{}",
            combined
        );
        self.llm
            .complete(
                &self.config.system_role,
                &final_prompt,
                SUMMARY_TEMPERATURE,
                self.config.final_summary_tokens,
            )
            .await
            .context("final summarization failed")
    }
}
