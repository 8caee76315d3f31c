//! Text preparation for the scholar retrieval pipeline.
//!
//! - [`sanitize`]: reduce raw extracted text to printable ASCII
//! - [`text`]: split long text into overlapping windows for embedding

pub mod sanitize;
pub mod text;

// Re-export the main entry points for external use
pub use sanitize::{is_clean, sanitize, sanitize_bytes};
pub use text::{SplitterError, TextChunk, TextSplitter};
