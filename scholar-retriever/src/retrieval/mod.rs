pub mod chunking_strategy;
pub mod document_loader;
pub mod indexing_engine;
pub mod vector_index;
