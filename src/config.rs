use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub quiz: QuizConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub directories: DirectoriesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_system_role")]
    pub system_role: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_answer_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            system_role: default_system_role(),
            temperature: default_temperature(),
            max_tokens: default_answer_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_engine() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_system_role() -> String {
    "You are a helpful assistant. Answer questions using only the provided document excerpts."
        .to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_answer_tokens() -> u32 {
    600
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_summary_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_summary_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_chunk_summaries")]
    pub max_chunk_summaries: usize,
    #[serde(default = "default_chunk_summary_tokens")]
    pub chunk_summary_tokens: u32,
    #[serde(default = "default_final_summary_tokens")]
    pub final_summary_tokens: u32,
    #[serde(default = "default_summarizer_role")]
    pub system_role: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_summary_chunk_size(),
            chunk_overlap: default_summary_chunk_overlap(),
            max_chunk_summaries: default_max_chunk_summaries(),
            chunk_summary_tokens: default_chunk_summary_tokens(),
            final_summary_tokens: default_final_summary_tokens(),
            system_role: default_summarizer_role(),
        }
    }
}

fn default_summary_chunk_size() -> usize {
    1000
}
fn default_summary_chunk_overlap() -> usize {
    100
}
fn default_max_chunk_summaries() -> usize {
    2
}
fn default_chunk_summary_tokens() -> u32 {
    300
}
fn default_final_summary_tokens() -> u32 {
    600
}
fn default_summarizer_role() -> String {
    "You are a helpful assistant that summarizes documents clearly and precisely.".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuizConfig {
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
    #[serde(default = "default_quiz_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_quiz_role")]
    pub system_role: String,
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    #[serde(default = "default_summary_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_summary_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            max_questions: default_max_questions(),
            max_tokens: default_quiz_tokens(),
            system_role: default_quiz_role(),
            min_words: default_min_words(),
            chunk_size: default_summary_chunk_size(),
            chunk_overlap: default_summary_chunk_overlap(),
        }
    }
}

fn default_max_questions() -> usize {
    10
}
fn default_quiz_tokens() -> u32 {
    1200
}
fn default_quiz_role() -> String {
    "You are a smart tutor. Generate high-quality multiple-choice questions from the content \
     provided. Use a clear academic tone suitable for students preparing for exams."
        .to_string()
}
fn default_min_words() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history_turns: default_max_history_turns(),
        }
    }
}

fn default_max_history_turns() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Error-message substrings treated as a corruption signal by the
    /// index builder. Matched case-insensitively against the full cause
    /// chain of a store-write failure.
    #[serde(default = "default_corruption_signatures")]
    pub corruption_signatures: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            corruption_signatures: default_corruption_signatures(),
        }
    }
}

fn default_corruption_signatures() -> Vec<String> {
    vec![
        "no such column".to_string(),
        "no such table".to_string(),
        "tenant".to_string(),
        "malformed".to_string(),
        "not a database".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectoriesConfig {
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            persist_dir: default_persist_dir(),
        }
    }
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("./vector_db")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }
    if config.summarizer.chunk_size == 0 {
        anyhow::bail!("summarizer.chunk_size must be > 0");
    }
    if config.summarizer.chunk_overlap >= config.summarizer.chunk_size {
        anyhow::bail!("summarizer.chunk_overlap must be smaller than summarizer.chunk_size");
    }
    if config.retrieval.k == 0 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.quiz.max_questions == 0 {
        anyhow::bail!("quiz.max_questions must be >= 1");
    }
    if config.quiz.chunk_overlap >= config.quiz.chunk_size {
        anyhow::bail!("quiz.chunk_overlap must be smaller than quiz.chunk_size");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.k, 5);
        assert_eq!(config.llm.engine, "gpt-3.5-turbo");
        assert_eq!(config.embedding.dims, 1536);
        assert_eq!(config.memory.max_history_turns, 5);
        assert!(config
            .store
            .corruption_signatures
            .iter()
            .any(|s| s == "no such column"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            chunk_size = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.k, 5);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            chunk_size = 100
            chunk_overlap = 100
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_k_rejected() {
        let config: Config = toml::from_str(
            r#"
            [retrieval]
            k = 0
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn default_config_passes_validation() {
        assert!(validate(&Config::default()).is_ok());
    }
}
