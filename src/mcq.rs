//! Multiple-choice question generation and parsing.
//!
//! Each chunk of the document is sent to the completion provider with a
//! fixed line-oriented output format (`Q:` / `A.`–`D.` / `Answer:`), and
//! the reply is parsed back into structured [`Mcq`] values. Malformed
//! blocks and failed chunk calls are skipped, not fatal: a quiz with
//! fewer questions beats no quiz.

use anyhow::Result;
use std::path::Path;
use tracing::warn;

use crate::chunk::split_text;
use crate::config::QuizConfig;
use crate::extract;
use crate::llm::CompletionProvider;
use crate::models::Mcq;

const MCQ_TEMPERATURE: f32 = 0.7;

pub struct McqGenerator<'a> {
    llm: &'a dyn CompletionProvider,
    config: &'a QuizConfig,
}

impl<'a> McqGenerator<'a> {
    pub fn new(llm: &'a dyn CompletionProvider, config: &'a QuizConfig) -> Self {
        Self { llm, config }
    }

    /// Generate up to `config.max_questions` questions from the document
    /// at `path`. Documents below the configured minimum word count
    /// yield an empty quiz.
    pub async fn generate_mcqs(&self, path: &Path) -> Result<Vec<Mcq>> {
        let text = extract::load_text(path)?;
        if text.split_whitespace().count() < self.config.min_words {
            warn!(
                document = %path.display(),
                "insufficient content for question generation"
            );
            return Ok(Vec::new());
        }

        let chunks = split_text(&text, self.config.chunk_size, self.config.chunk_overlap);
        let mut mcqs: Vec<Mcq> = Vec::new();

        for chunk in &chunks {
            if mcqs.len() >= self.config.max_questions {
                break;
            }
            let remaining = self.config.max_questions - mcqs.len();
            let prompt = format!(
                "Generate {} multiple-choice questions from the following academic content:\n\n\
                 {}\n\n\
                 For each question, use the EXACT format below:\n\
                 Q: <question>\n\
                 A. <option A>\n\
                 B. <option B>\n\
                 C. <option C>\n\
                 D. <option D>\n\
                 Answer: <A/B/C/D>\n\n\
                 Do not add explanations or section titles.",
                remaining, chunk.text
            );

            let output = match self
                .llm
                .complete(
                    &self.config.system_role,
                    &prompt,
                    MCQ_TEMPERATURE,
                    self.config.max_tokens,
                )
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    warn!(error = %e, "question generation call failed, skipping chunk");
                    continue;
                }
            };

            if !output.trim_start().starts_with("Q:") {
                warn!("model output did not follow the question format, skipping chunk");
                continue;
            }

            for mcq in parse_mcq_blocks(&output) {
                if mcqs.len() >= self.config.max_questions {
                    break;
                }
                mcqs.push(mcq);
            }
        }

        Ok(mcqs)
    }
}

/// Parse model output into questions. The format is line-oriented, so
/// parsing is too: blocks start at `Q:` lines; option and answer lines
/// are matched by their leading markers. Blocks missing any part are
/// dropped.
pub fn parse_mcq_blocks(output: &str) -> Vec<Mcq> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("Q:") {
            blocks.push(vec![line]);
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }

    let mut mcqs = Vec::new();
    for block in &blocks {
        match parse_block(block) {
            Some(mcq) => mcqs.push(mcq),
            None => warn!(block = %block.join(" | "), "malformed question block skipped"),
        }
    }
    mcqs
}

fn parse_block(lines: &[&str]) -> Option<Mcq> {
    let question = lines.first()?.strip_prefix("Q:")?.trim().to_string();
    if question.is_empty() {
        return None;
    }

    let mut options: [Option<String>; 4] = Default::default();
    let mut answer: Option<usize> = None;

    for line in &lines[1..] {
        if let Some(idx) = parse_answer_line(line) {
            answer = Some(idx);
        } else if let Some((idx, text)) = parse_option_line(line) {
            options[idx] = Some(text);
        }
    }

    let correct = answer?;
    let options = [
        options[0].take()?,
        options[1].take()?,
        options[2].take()?,
        options[3].take()?,
    ];
    let letter = (b'A' + correct as u8) as char;
    let explanation = format!("The correct answer is {}: {}", letter, options[correct]);

    Some(Mcq {
        question,
        options,
        correct,
        explanation,
    })
}

/// `Answer: B` (colon optional, letter case-insensitive).
fn parse_answer_line(line: &str) -> Option<usize> {
    let rest = strip_prefix_ci(line, "answer")?;
    let rest = rest.strip_prefix(':').unwrap_or(rest).trim();
    letter_index(rest.chars().next()?)
}

/// `A. text`, `A: text`, or `A text`.
fn parse_option_line(line: &str) -> Option<(usize, String)> {
    let mut chars = line.chars();
    let idx = letter_index(chars.next()?)?;
    let rest = chars.as_str();
    let text = if let Some(r) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(':')) {
        r
    } else if rest.starts_with(char::is_whitespace) {
        rest
    } else {
        // Something like "Always ..." — a sentence, not an option marker.
        return None;
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((idx, text.to_string()))
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

fn letter_index(c: char) -> Option<usize> {
    match c.to_ascii_uppercase() {
        'A' => Some(0),
        'B' => Some(1),
        'C' => Some(2),
        'D' => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
Q: What gas do plants absorb?
A. Oxygen
B. Carbon dioxide
C. Nitrogen
D. Helium
Answer: B

Q: Where does photosynthesis occur?
A. Mitochondria
B. Nucleus
C. Chloroplast
D. Ribosome
Answer: C";

    #[test]
    fn parses_well_formed_blocks() {
        let mcqs = parse_mcq_blocks(WELL_FORMED);
        assert_eq!(mcqs.len(), 2);
        assert_eq!(mcqs[0].question, "What gas do plants absorb?");
        assert_eq!(mcqs[0].correct, 1);
        assert_eq!(mcqs[0].correct_text(), "Carbon dioxide");
        assert_eq!(
            mcqs[0].explanation,
            "The correct answer is B: Carbon dioxide"
        );
        assert_eq!(mcqs[1].correct, 2);
    }

    #[test]
    fn accepts_colon_markers_and_lowercase_answer() {
        let output = "\
Q: Pick one.
A: first
B: second
C: third
D: fourth
answer: c";
        let mcqs = parse_mcq_blocks(output);
        assert_eq!(mcqs.len(), 1);
        assert_eq!(mcqs[0].correct, 2);
        assert_eq!(mcqs[0].options[0], "first");
    }

    #[test]
    fn block_missing_an_option_is_skipped() {
        let output = "\
Q: Incomplete?
A. one
B. two
Answer: A

Q: Complete?
A. one
B. two
C. three
D. four
Answer: D";
        let mcqs = parse_mcq_blocks(output);
        assert_eq!(mcqs.len(), 1);
        assert_eq!(mcqs[0].question, "Complete?");
    }

    #[test]
    fn block_missing_the_answer_is_skipped() {
        let output = "\
Q: No answer given?
A. one
B. two
C. three
D. four";
        assert!(parse_mcq_blocks(output).is_empty());
    }

    #[test]
    fn prose_outside_blocks_is_ignored() {
        let output = format!("Here are your questions:\n\n{}", WELL_FORMED);
        // Leading prose before the first Q: line is dropped.
        assert_eq!(parse_mcq_blocks(&output).len(), 2);
    }

    #[test]
    fn empty_output_yields_nothing() {
        assert!(parse_mcq_blocks("").is_empty());
        assert!(parse_mcq_blocks("no questions here").is_empty());
    }

    #[test]
    fn option_like_sentences_are_not_options() {
        let output = "\
Q: Tricky?
A. one
B. two
C. three
D. four
Always remember to study.
Answer: A";
        let mcqs = parse_mcq_blocks(output);
        assert_eq!(mcqs.len(), 1);
        assert_eq!(mcqs[0].options[0], "one");
    }
}
