//! Page chunking with a configurable length function.
//!
//! Highlights:
//!
//! - Length: chunk budgets are measured in characters by default, or in `cl100k_base` tokens
//!   via `tiktoken-rs` when `TEXT_SPLITTER_LENGTH=tokens`.
//! - Splitting: `semchunk-rs` produces base segments of `chunk_size - overlap` units so that the
//!   overlap can be prepended without breaking the budget. Segments that still exceed it are
//!   re-packed by a greedy word packer inside their own bounds. When a segment cannot be located
//!   verbatim in the page, the whole page falls back to the greedy packer.
//! - Overlap: each chunk after the first on a page is extended backwards to the earliest word
//!   start that keeps the prefix within `overlap` units. Overlap never crosses a page.
//! - Every chunk is a byte slice of its page's text, so citations quote the document exactly.

use crate::config::LengthUnit;
use crate::processing::types::{Chunk, ChunkingError, Page};
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::cl100k_base;

pub(crate) type LengthCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

type Span = (usize, usize);

/// Splitter parameters resolved from configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkSettings {
    pub(crate) chunk_size: usize,
    pub(crate) overlap: usize,
}

/// Build the length function for `unit`.
pub(crate) fn build_length_counter(unit: LengthUnit) -> Result<LengthCounter, ChunkingError> {
    match unit {
        LengthUnit::Characters => Ok(Arc::new(|segment: &str| segment.chars().count())),
        LengthUnit::Tokens => {
            let encoding = cl100k_base().map_err(|source| ChunkingError::Tokenizer {
                encoding: "cl100k_base".to_string(),
                source,
            })?;
            let encoding = Arc::new(encoding);
            Ok(Arc::new(move |segment: &str| {
                encoding.encode_ordinary(segment).len()
            }))
        }
    }
}

/// Split every page into overlapping chunks, numbering them in document order.
///
/// Whitespace-only pages contribute no chunks. The result is empty when no page has text.
pub(crate) fn chunk_pages(
    pages: &[Page],
    settings: ChunkSettings,
    counter: &LengthCounter,
) -> Result<Vec<Chunk>, ChunkingError> {
    if settings.chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let mut chunks = Vec::new();
    for page in pages {
        for slice in split_page(&page.text, settings.chunk_size, settings.overlap, counter) {
            chunks.push(Chunk {
                position: chunks.len(),
                page: page.number,
                text: slice.to_string(),
            });
        }
    }
    Ok(chunks)
}

fn split_page<'a>(
    text: &'a str,
    chunk_size: usize,
    overlap: usize,
    counter: &LengthCounter,
) -> Vec<&'a str> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let overlap = overlap.min(chunk_size.saturating_sub(1));
    let base_size = chunk_size - overlap;
    let spans = semantic_spans(text, base_size, counter).unwrap_or_else(|| {
        tracing::debug!(
            chars = text.len(),
            "Semantic segments did not map onto page text; using greedy packing"
        );
        greedy_spans(text, (0, text.len()), base_size, counter)
    });

    apply_overlap(text, &spans, chunk_size, overlap, counter)
        .into_iter()
        .map(|(start, end)| &text[start..end])
        .collect()
}

/// Run `semchunk` and map each segment back onto the page text.
///
/// Segments over the budget are re-packed greedily within their own bounds, so the semantic
/// boundaries around them survive. Returns `None` when a segment is not a verbatim slice of the
/// page.
fn semantic_spans(text: &str, size: usize, counter: &LengthCounter) -> Option<Vec<Span>> {
    let counter_for_chunker = counter.clone();
    let chunker = Chunker::new(
        size,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );

    let mut spans = Vec::new();
    let mut cursor = 0;
    for segment in chunker.chunk(text) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let start = cursor + text[cursor..].find(segment)?;
        let end = start + segment.len();
        if counter.as_ref()(&text[start..end]) > size {
            spans.extend(greedy_spans(text, (start, end), size, counter));
        } else {
            spans.push((start, end));
        }
        cursor = end;
    }
    Some(spans)
}

/// Pack whole words of `text[region]` while the running slice fits `size`; split oversized
/// words by character. Returned spans index into `text`.
fn greedy_spans(text: &str, region: Span, size: usize, counter: &LengthCounter) -> Vec<Span> {
    let (region_start, region_end) = region;
    let mut spans = Vec::new();
    let mut current: Option<Span> = None;

    for (word_start, word_end) in word_spans(&text[region_start..region_end])
        .into_iter()
        .map(|(start, end)| (region_start + start, region_start + end))
    {
        if let Some((start, end)) = current {
            if counter.as_ref()(&text[start..word_end]) <= size {
                current = Some((start, word_end));
                continue;
            }
            spans.push((start, end));
            current = None;
        }

        if counter.as_ref()(&text[word_start..word_end]) <= size {
            current = Some((word_start, word_end));
        } else {
            spans.extend(hard_split(text, word_start, word_end, size, counter));
        }
    }

    if let Some(span) = current {
        spans.push(span);
    }
    spans
}

fn hard_split(
    text: &str,
    start: usize,
    end: usize,
    size: usize,
    counter: &LengthCounter,
) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut piece_start = start;
    let mut piece_end = start;

    for (offset, ch) in text[start..end].char_indices() {
        let next = start + offset + ch.len_utf8();
        if piece_end > piece_start && counter.as_ref()(&text[piece_start..next]) > size {
            spans.push((piece_start, piece_end));
            piece_start = piece_end;
        }
        piece_end = next;
    }

    if piece_end > piece_start {
        spans.push((piece_start, piece_end));
    }
    spans
}

/// Extend each span after the first backwards into its predecessor.
///
/// The new start is the earliest word start (at or after the previous span's start) whose
/// prefix fits within `overlap` and whose whole slice fits within `chunk_size`.
fn apply_overlap(
    text: &str,
    spans: &[Span],
    chunk_size: usize,
    overlap: usize,
    counter: &LengthCounter,
) -> Vec<Span> {
    if overlap == 0 {
        return spans.to_vec();
    }

    let mut overlapped = Vec::with_capacity(spans.len());
    for (index, &(start, end)) in spans.iter().enumerate() {
        let Some(&(previous_start, _)) = index.checked_sub(1).and_then(|prior| spans.get(prior))
        else {
            overlapped.push((start, end));
            continue;
        };

        let candidates = word_starts(text, previous_start, start);
        let fits = |candidate: usize| {
            counter.as_ref()(&text[candidate..start]) <= overlap
                && counter.as_ref()(&text[candidate..end]) <= chunk_size
        };
        // Candidates are ascending and `fits` only flips from false to true.
        let first_fit = candidates.partition_point(|&candidate| !fits(candidate));
        let new_start = candidates.get(first_fit).copied().unwrap_or(start);
        overlapped.push((new_start, end));
    }
    overlapped
}

fn word_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut word_start: Option<usize> = None;

    for (offset, ch) in text.char_indices() {
        match (ch.is_whitespace(), word_start) {
            (true, Some(start)) => {
                spans.push((start, offset));
                word_start = None;
            }
            (false, None) => word_start = Some(offset),
            _ => {}
        }
    }
    if let Some(start) = word_start {
        spans.push((start, text.len()));
    }
    spans
}

fn word_starts(text: &str, from: usize, until: usize) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut previous_whitespace = true;
    for (offset, ch) in text[from..until].char_indices() {
        let whitespace = ch.is_whitespace();
        if !whitespace && previous_whitespace {
            starts.push(from + offset);
        }
        previous_whitespace = whitespace;
    }
    starts
}
