//! Recursive, overlapping text splitting for retrieval.
//!
//! Page text extracted from papers is far too long to embed as a single unit,
//! so it is cut into windows of at most `chunk_size` characters. Neighbouring
//! windows share up to `chunk_overlap` characters so that a sentence that
//! straddles a boundary still appears whole in at least one window.
//!
//! # Splitting
//!
//! The text is first broken into *segments*. Delimiters are tried from most
//! to least significant (paragraph break, line break, space); any piece still
//! longer than `chunk_size` is split again with the next delimiter, and once
//! the delimiters are exhausted it is split into single characters. Delimiters
//! are kept as segments of their own, so the segments cover the input exactly.
//!
//! # Merging
//!
//! Segments are then packed greedily into windows. When the next segment no
//! longer fits, the window is emitted and segments are dropped from its front
//! until no more than `chunk_overlap` characters remain. Emitted windows are
//! trimmed; windows that are only whitespace are dropped.
//!
//! ```
//! use scholar_context::text::TextSplitter;
//!
//! let splitter = TextSplitter::new(&[r"\n\n", r"\n", r" "], 40, 10).unwrap();
//! let text = "Neural networks approximate functions. \
//!             Gradient descent trains them.\n\nAttention is all you need.";
//!
//! let chunks = splitter.get_chunks(text);
//! assert!(chunks.len() > 1);
//! assert!(chunks.iter().all(|c| c.chunk_text.chars().count() <= 40));
//! assert_eq!(chunks[0].sequence, 0);
//! assert!(text[chunks[1].start_offset..].starts_with(&chunks[1].chunk_text));
//! ```

use regex::Regex;
use serde::Serialize;
use std::collections::VecDeque;
use std::ops::Range;

/// Default delimiters, most significant first: paragraphs, lines, words.
pub const DEFAULT_DELIMITERS: &[&str] = &[r"\n\n", r"\n", r" "];

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between neighbouring chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Invalid splitter settings.
#[derive(Debug, thiserror::Error)]
pub enum SplitterError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },

    #[error("invalid delimiter pattern: {0}")]
    InvalidDelimiter(#[from] regex::Error),
}

/// A window of text cut from a longer input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// Position of this chunk among the chunks of its input (0-indexed).
    pub sequence: usize,
    /// Byte offset of `chunk_text` within the input.
    pub start_offset: usize,
    /// The trimmed window text.
    pub chunk_text: String,
}

/// Splits text into overlapping windows of bounded length.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    delimiters: Vec<Regex>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Creates a splitter from delimiter patterns, ordered most significant first.
    ///
    /// `chunk_size` and `chunk_overlap` are measured in characters.
    pub fn new(
        delimiter_patterns: &[&str],
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, SplitterError> {
        if chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(SplitterError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }

        let delimiters = delimiter_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            delimiters,
            chunk_size,
            chunk_overlap,
        })
    }

    /// Splitter with [`DEFAULT_DELIMITERS`] and the given window settings.
    pub fn with_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        Self::new(DEFAULT_DELIMITERS, chunk_size, chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits `text` into ordered, overlapping chunks.
    pub fn get_chunks(&self, text: &str) -> Vec<TextChunk> {
        let mut segments = Vec::new();
        self.split_into_segments(text, 0, 0, &mut segments);

        let mut chunks = Vec::new();
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut window_chars = 0;
        let mut emitted_until = 0;

        for segment in segments {
            let segment_chars = text[segment.clone()].chars().count();

            if window_chars + segment_chars > self.chunk_size && !window.is_empty() {
                emitted_until = self.emit(text, &window, emitted_until, &mut chunks);

                while window_chars > self.chunk_overlap
                    || (window_chars + segment_chars > self.chunk_size && window_chars > 0)
                {
                    match window.pop_front() {
                        Some((_, chars)) => window_chars -= chars,
                        None => break,
                    }
                }
            }

            window.push_back((segment, segment_chars));
            window_chars += segment_chars;
        }

        if !window.is_empty() {
            self.emit(text, &window, emitted_until, &mut chunks);
        }

        chunks
    }

    // Pushes the window as a chunk unless everything it adds beyond the
    // previous chunk is whitespace. Returns the new emitted-until offset.
    fn emit(
        &self,
        text: &str,
        window: &VecDeque<(Range<usize>, usize)>,
        emitted_until: usize,
        chunks: &mut Vec<TextChunk>,
    ) -> usize {
        let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) else {
            return emitted_until;
        };
        let (start, end) = (first.start, last.end);

        let fresh = &text[start.max(emitted_until).min(end)..end];
        if fresh.trim().is_empty() {
            return emitted_until;
        }

        let raw = &text[start..end];
        let trimmed = raw.trim();
        chunks.push(TextChunk {
            sequence: chunks.len(),
            start_offset: start + (raw.len() - raw.trim_start().len()),
            chunk_text: trimmed.to_string(),
        });
        end
    }

    // Recursively cuts `text` (located at `offset` in the original input) into
    // consecutive byte ranges, none longer than `chunk_size` characters.
    fn split_into_segments(
        &self,
        text: &str,
        offset: usize,
        delimiter_idx: usize,
        segments: &mut Vec<Range<usize>>,
    ) {
        if text.is_empty() {
            return;
        }

        if text.chars().count() <= self.chunk_size {
            segments.push(offset..offset + text.len());
            return;
        }

        let Some(delimiter) = self.delimiters.get(delimiter_idx) else {
            segments.extend(
                text.char_indices()
                    .map(|(i, c)| offset + i..offset + i + c.len_utf8()),
            );
            return;
        };

        let mut local_start = 0;
        for mat in delimiter.find_iter(text) {
            if mat.is_empty() {
                continue;
            }
            if mat.start() > local_start {
                self.split_into_segments(
                    &text[local_start..mat.start()],
                    offset + local_start,
                    delimiter_idx + 1,
                    segments,
                );
            }
            // The delimiter itself; only oversized delimiters get split further.
            self.split_into_segments(
                mat.as_str(),
                offset + mat.start(),
                self.delimiters.len(),
                segments,
            );
            local_start = mat.end();
        }

        if local_start < text.len() {
            self.split_into_segments(
                &text[local_start..],
                offset + local_start,
                delimiter_idx + 1,
                segments,
            );
        }
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            delimiters: DEFAULT_DELIMITERS
                .iter()
                .map(|pattern| Regex::new(pattern).unwrap())
                .collect(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}
