//! Fixed-size overlapping text chunker.
//!
//! Splits extracted document text into character windows of at most
//! `chunk_size`, with `chunk_overlap` characters carried over between
//! consecutive windows. Cuts prefer a whitespace boundary in the back
//! half of the window so words stay intact. Pure function, no state.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Split `text` into ordered chunks. Requires `chunk_overlap < chunk_size`
/// (enforced by config validation); empty or all-whitespace text yields
/// no chunks.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let trimmed = text.trim();
    if trimmed.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    // Byte offset of every char, so windows never split a UTF-8 sequence.
    let chars: Vec<(usize, char)> = trimmed.char_indices().collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    while start < total {
        let end = (start + chunk_size).min(total);
        let mut cut = end;
        if end < total {
            // Prefer the last whitespace in the back half of the window.
            let floor = start + chunk_size / 2;
            if let Some(pos) = (floor..end).rev().find(|&i| chars[i].1.is_whitespace()) {
                cut = pos + 1;
            }
        }

        let byte_start = chars[start].0;
        let byte_end = if cut < total {
            chars[cut].0
        } else {
            trimmed.len()
        };
        let piece = trimmed[byte_start..byte_end].trim();
        if !piece.is_empty() {
            chunks.push(make_chunk(index, piece));
            index += 1;
        }

        if cut >= total {
            break;
        }
        // Step back by the overlap, but always make forward progress.
        start = cut.saturating_sub(chunk_overlap).max(start + 1);
    }

    chunks
}

fn make_chunk(index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Chunk {
        index,
        text: text.to_string(),
        hash: format!("{:x}", hasher.finalize()),
    }
}
