//! # studyrag CLI (`study`)
//!
//! Thin presentation layer over the studyrag library. All commands take
//! a document path; the vector index lives under the configured persist
//! directory and is built on first use.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `study index <file>` | Build (or rebuild) the vector index for a document |
//! | `study ask <file> "<question>"` | Ask one question against the document |
//! | `study chat <file>` | Interactive chat session over the document |
//! | `study summarize <file>` | Print a merged summary of the document |
//! | `study quiz <file>` | Generate a self-test quiz with answer key |
//!
//! Requires `OPENAI_API_KEY` in the environment.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use studyrag::answer::Answerer;
use studyrag::config::{self, Config};
use studyrag::embedding::OpenAiEmbeddings;
use studyrag::index::IndexBuilder;
use studyrag::llm::OpenAiChat;
use studyrag::mcq::McqGenerator;
use studyrag::models::ConversationTurn;
use studyrag::store::SqliteIndexWriter;
use studyrag::summarize::Summarizer;

/// studyrag — chat with, summarize, and quiz yourself on a local document.
#[derive(Parser)]
#[command(
    name = "study",
    about = "A document-study assistant: RAG chat, summaries, and self-test MCQs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/study.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector index for a document.
    ///
    /// Runs extraction, chunking, embedding, and the store write. A
    /// corrupt or incompatible index at the persist path is deleted and
    /// rebuilt automatically.
    Index {
        /// Document path (pdf, docx, pptx, xlsx, or txt).
        file: PathBuf,
    },

    /// Ask a single question about a document.
    Ask {
        /// Document path.
        file: PathBuf,
        /// The question to answer.
        question: String,
    },

    /// Interactive chat session over a document.
    ///
    /// Reads questions from stdin, one per line. An empty line or
    /// `exit` ends the session.
    Chat {
        /// Document path.
        file: PathBuf,
    },

    /// Summarize a document.
    Summarize {
        /// Document path.
        file: PathBuf,
    },

    /// Generate a multiple-choice quiz from a document.
    Quiz {
        /// Document path.
        file: PathBuf,
        /// Maximum number of questions (overrides config).
        #[arg(long)]
        questions: Option<usize>,
    },
}

fn load_or_default_config(path: &PathBuf) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn make_answerer(cfg: &Config) -> Result<Answerer> {
    Ok(Answerer::new(
        cfg.clone(),
        Arc::new(OpenAiEmbeddings::new(&cfg.embedding)?),
        Arc::new(OpenAiChat::new(&cfg.llm)?),
        Arc::new(SqliteIndexWriter),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_or_default_config(&cli.config)?;
    let persist_dir = cfg.directories.persist_dir.clone();

    match cli.command {
        Commands::Index { file } => {
            let embedder = OpenAiEmbeddings::new(&cfg.embedding)?;
            let writer = SqliteIndexWriter;
            let builder = IndexBuilder::new(
                &embedder,
                &writer,
                &cfg.chunking,
                &cfg.store.corruption_signatures,
            );
            builder.build(&file, &persist_dir).await?;
            let index = studyrag::store::VectorIndex::open(&persist_dir).await?;
            println!(
                "index built at {} ({} chunks)",
                persist_dir.display(),
                index.chunk_count().await?
            );
        }
        Commands::Ask { file, question } => {
            let answerer = make_answerer(&cfg)?;
            let mut history: Vec<ConversationTurn> = Vec::new();
            let answer = answerer
                .answer(&file, &persist_dir, &question, &mut history)
                .await?;
            println!("{}", answer);
        }
        Commands::Chat { file } => {
            let answerer = make_answerer(&cfg)?;
            let mut history: Vec<ConversationTurn> = Vec::new();

            println!("Chatting with {} — empty line or 'exit' to quit.", file.display());
            let stdin = std::io::stdin();
            loop {
                print!("> ");
                std::io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let question = line.trim();
                if question.is_empty() || question == "exit" {
                    break;
                }
                match answerer
                    .answer(&file, &persist_dir, question, &mut history)
                    .await
                {
                    Ok(answer) => println!("{}\n", answer),
                    Err(e) => eprintln!("error: {}\n", e),
                }
            }
        }
        Commands::Summarize { file } => {
            let llm = OpenAiChat::new(&cfg.llm)?;
            let summarizer = Summarizer::new(&llm, &cfg.summarizer);
            let summary = summarizer.summarize_file(&file).await?;
            println!("{}", summary);
        }
        Commands::Quiz { file, questions } => {
            let mut quiz_cfg = cfg.quiz.clone();
            if let Some(n) = questions {
                quiz_cfg.max_questions = n;
            }
            let llm = OpenAiChat::new(&cfg.llm)?;
            let generator = McqGenerator::new(&llm, &quiz_cfg);
            let mcqs = generator.generate_mcqs(&file).await?;

            if mcqs.is_empty() {
                println!("No questions could be generated from this document.");
                return Ok(());
            }

            for (i, mcq) in mcqs.iter().enumerate() {
                println!("Q{}: {}", i + 1, mcq.question);
                for (j, option) in mcq.options.iter().enumerate() {
                    println!("  {}. {}", (b'A' + j as u8) as char, option);
                }
                println!();
            }
            println!("Answer key:");
            for (i, mcq) in mcqs.iter().enumerate() {
                println!("  Q{}: {}", i + 1, mcq.explanation);
            }
        }
    }

    Ok(())
}
