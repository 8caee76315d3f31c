use super::document_loader::{Document, Page};
use crate::storage::DocumentChunk;
use anyhow::Result;
use scholar_context::sanitize::sanitize;
use scholar_context::text::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextSplitter};

/// Configuration for chunking documents
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum size of each chunk in characters
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,
    /// Label for the document collection, recorded in index metadata
    pub repo_name: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            repo_name: "papers".to_string(),
        }
    }
}

impl ChunkingConfig {
    pub fn new(repo_name: String) -> Self {
        Self {
            repo_name,
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_chunk_overlap(mut self, chunk_overlap: usize) -> Self {
        self.chunk_overlap = chunk_overlap;
        self
    }
}

/// Cuts document pages into overlapping windows and sanitizes each window.
#[derive(Debug, Clone)]
pub struct ChunkingStrategy {
    config: ChunkingConfig,
    splitter: TextSplitter,
}

impl ChunkingStrategy {
    /// Fails if the overlap is not smaller than the chunk size.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        let splitter = TextSplitter::with_sizes(config.chunk_size, config.chunk_overlap)?;
        Ok(Self { config, splitter })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk one page. Windows that sanitize to nothing are dropped, so
    /// positions may skip numbers.
    pub fn chunk_page(&self, source: &str, page: &Page) -> Vec<DocumentChunk> {
        self.splitter
            .get_chunks(&page.text)
            .into_iter()
            .filter_map(|chunk| {
                let text = sanitize(&chunk.chunk_text)?;
                Some(DocumentChunk {
                    source: source.to_string(),
                    page: page.number,
                    position: chunk.sequence,
                    start_offset: chunk.start_offset,
                    text,
                })
            })
            .collect()
    }

    /// Chunk every page of a document, in page order.
    pub fn chunk_document(&self, document: &Document) -> Vec<DocumentChunk> {
        let source = document.source();
        let chunks: Vec<DocumentChunk> = document
            .pages
            .iter()
            .flat_map(|page| self.chunk_page(&source, page))
            .collect();

        tracing::debug!(
            "Chunked {} into {} chunks (size: {}, overlap: {})",
            source,
            chunks.len(),
            self.config.chunk_size,
            self.config.chunk_overlap
        );

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_context::sanitize::is_clean;

    fn page(number: usize, text: &str) -> Page {
        Page {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_chunking_strategy() {
        let strategy = ChunkingStrategy::new(
            ChunkingConfig::new("test".to_string())
                .with_chunk_size(60)
                .with_chunk_overlap(15),
        )
        .unwrap();

        let text = "Neural networks approximate functions.\n\n\
                    Gradient descent\u{0} minimises a loss over many iterations.\n\n\
                    Caf\u{e9} tables are not relevant here.";
        let document = Document {
            path: "papers/nn.pdf".into(),
            pages: vec![page(1, text), page(4, "Appendix \u{fb01}gures.")],
        };

        let chunks = strategy.chunk_document(&document);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.source == "papers/nn.pdf"));
        assert!(chunks.iter().all(|c| is_clean(&c.text)));
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].position, 0);
        assert!(chunks[0].text.contains("Neural networks approximate functions."));

        let last = chunks.last().unwrap();
        assert_eq!(last.page, 4);
        assert_eq!(last.text, "Appendix figures.");

        // Offsets point into the unsanitized page text
        for chunk in chunks.iter().filter(|c| c.page == 1) {
            assert!(chunk.start_offset < text.len());
            assert!(text.is_char_boundary(chunk.start_offset));
        }
    }

    #[test]
    fn test_unprintable_windows_are_dropped() {
        let strategy = ChunkingStrategy::new(ChunkingConfig::default()).unwrap();
        let chunks = strategy.chunk_page("x.pdf", &page(1, "\u{4e2d}\u{6587}\u{1}\u{2}"));
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_invalid_overlap_is_rejected() {
        let config = ChunkingConfig::default()
            .with_chunk_size(100)
            .with_chunk_overlap(100);
        assert!(ChunkingStrategy::new(config).is_err());
    }
}
