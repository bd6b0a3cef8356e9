//! Title-delimited chunking of extracted document elements.

use crate::models::{Chunk, Element};

/// Splits elements into chunks at every heading.
///
/// Each chunk carries the most recent heading as its title; text before the
/// first heading goes under `default_title`. Empty elements are skipped and
/// no chunk is ever emitted with empty content.
pub fn chunk(elements: &[Element], default_title: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current_title = default_title.trim().to_string();
    let mut buffer: Vec<&str> = Vec::new();

    for element in elements {
        let text = element.text.trim();
        if text.is_empty() {
            continue;
        }

        if element.category.is_heading() {
            flush(&mut chunks, &current_title, &mut buffer);
            current_title = text.to_string();
        } else {
            buffer.push(text);
        }
    }

    flush(&mut chunks, &current_title, &mut buffer);
    chunks
}

fn flush(chunks: &mut Vec<Chunk>, title: &str, buffer: &mut Vec<&str>) {
    if buffer.is_empty() {
        return;
    }
    chunks.push(Chunk::new(title, buffer.join("\n")));
    buffer.clear();
}

/// Estimate the number of tokens in a text.
/// Uses a simple heuristic: ~4 characters per token on average.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}
