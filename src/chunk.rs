//! Overlapping text splitter.
//!
//! Splits each page into [`Segment`]s of at most `max_chars` characters.
//! Consecutive segments of a page share exactly `overlap_chars` characters,
//! so dropping the shared prefix of every segment after the first
//! reconstructs the page verbatim.
//!
//! # Algorithm
//!
//! 1. If the rest of the page fits in `max_chars`, emit it and stop.
//! 2. Otherwise look for the last separator inside the window, trying
//!    `"\n\n"`, then `"\n"`, then `" "`. The segment ends right after it.
//! 3. A separator is only usable if the segment stays longer than the
//!    overlap (otherwise the next segment would not advance). With no usable
//!    separator the segment is hard-cut at `max_chars`.
//! 4. The next segment starts `overlap_chars` before the previous end.
//!
//! Lengths and offsets are counted in chars, never bytes, so multi-byte text
//! is never split inside a code point.

use crate::models::{Page, Segment};

/// Preferred break points, strongest first.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Split every page and number the segments contiguously from 0.
///
/// Pages with no non-whitespace text produce no segments.
pub fn segment_pages(pages: &[Page], max_chars: usize, overlap_chars: usize) -> Vec<Segment> {
    let mut segments = Vec::new();
    for page in pages {
        for (char_offset, text) in split_text(&page.text, max_chars, overlap_chars) {
            segments.push(Segment {
                index: segments.len(),
                page: page.number,
                char_offset,
                text: text.to_string(),
            });
        }
    }
    segments
}

/// Split `text` into `(char_offset, slice)` pairs.
///
/// `overlap_chars` is clamped below `max_chars`.
pub fn split_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<(usize, &str)> {
    if max_chars == 0 || text.trim().is_empty() {
        return Vec::new();
    }
    let overlap = overlap_chars.min(max_chars - 1);

    // bounds[i] is the byte offset of char i; the final entry is text.len().
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = bounds.len() - 1;

    let mut pieces = Vec::new();
    let mut start = 0;
    loop {
        let hard_end = start + max_chars;
        if hard_end >= total_chars {
            pieces.push((start, &text[bounds[start]..]));
            break;
        }

        let end = separator_end(text, &bounds, start, start + overlap + 1, hard_end)
            .unwrap_or(hard_end);
        pieces.push((start, &text[bounds[start]..bounds[end]]));
        start = end - overlap;
    }
    pieces
}

/// Char index just past the last separator in `[start, max_end)`, provided
/// it is at least `min_end`.
fn separator_end(
    text: &str,
    bounds: &[usize],
    start: usize,
    min_end: usize,
    max_end: usize,
) -> Option<usize> {
    let window_start = bounds[start];
    let window = &text[window_start..bounds[max_end]];

    for sep in SEPARATORS {
        let Some(pos) = window.rfind(sep) else {
            continue;
        };
        let end_byte = window_start + pos + sep.len();
        // Separators are ASCII, so end_byte is always a char boundary.
        if let Ok(end) = bounds.binary_search(&end_byte) {
            if end >= min_end {
                return Some(end);
            }
        }
    }
    None
}
