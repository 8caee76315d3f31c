use clap::{Parser, Subcommand};
use scholar_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
use scholar_retriever::{
    retrieval::{
        chunking_strategy::ChunkingConfig,
        indexing_engine::{IndexingEngine, IndexingEngineConfig},
        vector_index::{INDEX_DB_NAME, VectorIndex},
    },
    storage::{ScoredChunk, VectorStore, sqlite_store::SqliteStore},
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// A CLI tool to build and inspect the scholar vector index.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing the index.db database file
    #[arg(short, long, default_value = "data/vector_store")]
    index_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the index from a directory of PDFs
    Build {
        /// Directory containing the PDF files
        #[arg(short, long, default_value = "data/papers")]
        papers_dir: PathBuf,
        /// Embedding model name
        #[arg(long, default_value = scholar_embed::config::DEFAULT_MODEL_NAME)]
        embedding_model: String,
        /// Directory for downloaded model files
        #[arg(long, default_value = scholar_embed::config::DEFAULT_CACHE_DIR)]
        model_cache_dir: PathBuf,
        /// Maximum chunk length in characters
        #[arg(long, default_value_t = 1000)]
        chunk_size: usize,
        /// Characters shared between neighbouring chunks
        #[arg(long, default_value_t = 200)]
        chunk_overlap: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show index statistics and build metadata
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Find the chunks nearest to a question
    Search {
        /// Question text
        #[arg(short, long)]
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 8)]
        limit: usize,
        /// Directory for downloaded model files
        #[arg(long, default_value = scholar_embed::config::DEFAULT_CACHE_DIR)]
        model_cache_dir: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// List stored chunks
    List {
        /// Limit number of results
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct ChunkOutput {
    id: i64,
    source: String,
    page: usize,
    position: usize,
    start_offset: usize,
    content: String,
}

#[derive(Serialize)]
struct IndexStats {
    index_path: String,
    total_chunks: usize,
    documents: usize,
    metadata: Option<scholar_retriever::retrieval::vector_index::IndexMetadata>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Build {
            papers_dir,
            embedding_model,
            model_cache_dir,
            chunk_size,
            chunk_overlap,
            format,
        } => {
            let config = IndexingEngineConfig::new(papers_dir, args.index_dir)
                .with_chunking_config(
                    ChunkingConfig::default()
                        .with_chunk_size(chunk_size)
                        .with_chunk_overlap(chunk_overlap),
                )
                .with_embedding_config(
                    EmbedConfig::new(embedding_model)
                        .with_cache_dir(model_cache_dir)
                        .with_download_progress(true),
                );
            let engine = IndexingEngine::new(config).await?;
            let report = engine.rebuild().await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Index built in {:.2}s", report.elapsed.as_secs_f64());
                    println!("  Documents: {}", report.documents);
                    println!("  Pages: {}", report.pages);
                    println!("  Chunks embedded: {}/{}", report.embedded, report.chunks);
                    println!("  Chunks skipped: {}", report.skipped_chunks);
                    println!("  Files skipped: {}", report.skipped_files);
                }
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let index = VectorIndex::open(&args.index_dir).await?;
            let stats = IndexStats {
                index_path: args.index_dir.join(INDEX_DB_NAME).display().to_string(),
                total_chunks: index.count().await?,
                documents: index.source_count().await?,
                metadata: index.read_index_metadata().await?,
            };

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Index Statistics:");
                    println!("  Database: {}", stats.index_path);
                    println!("  Total chunks: {}", stats.total_chunks);
                    println!("  Documents: {}", stats.documents);
                    match &stats.metadata {
                        Some(meta) => {
                            println!(
                                "  Embedding model: {} ({} dims)",
                                meta.embedding_model, meta.embedding_dimension
                            );
                            println!(
                                "  Chunking: {} chars, {} overlap",
                                meta.chunk_size, meta.chunk_overlap
                            );
                            println!("  Built at: {}", meta.built_at);
                            if format == OutputFormat::Full {
                                println!("  Corpus fingerprint: {}", meta.corpus_fingerprint);
                                println!("  Repository: {}", meta.repository);
                            }
                        }
                        None => println!("  No completed build recorded"),
                    }
                }
            }
            Ok(())
        }
        Commands::Search {
            query,
            limit,
            model_cache_dir,
            format,
        } => {
            let index = VectorIndex::open(&args.index_dir).await?;
            let model_name = index
                .read_index_metadata()
                .await?
                .map(|meta| meta.embedding_model)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "No completed index in {}; run `build` first",
                        args.index_dir.display()
                    )
                })?;

            let embedder =
                FastEmbedProvider::create(EmbedConfig::new(model_name).with_cache_dir(model_cache_dir))
                    .await?;
            let vector = embedder.embed_text(&query).await?;
            let results = SqliteStore::new(index).query(&vector, limit).await?;

            print_results(&results, &format)?;
            Ok(())
        }
        Commands::List { limit, format } => {
            let store = SqliteStore::new(VectorIndex::open(&args.index_dir).await?);
            let chunks = store.list(limit).await?;

            match format {
                OutputFormat::Json => {
                    let output: Vec<ChunkOutput> = chunks
                        .into_iter()
                        .map(|(id, chunk)| ChunkOutput {
                            id,
                            source: chunk.source,
                            page: chunk.page,
                            position: chunk.position,
                            start_offset: chunk.start_offset,
                            content: chunk.text,
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} chunks:", chunks.len());
                    for (id, chunk) in chunks {
                        println!(
                            "  ID: {} | File: {} | Page: {} | Position: {} | Chars: {}",
                            id,
                            chunk.source,
                            chunk.page,
                            chunk.position,
                            chunk.text.len()
                        );
                    }
                }
                OutputFormat::Full => {
                    for (id, chunk) in chunks {
                        println!("Chunk ID: {id}");
                        println!("File: {}", chunk.source);
                        println!("Page: {} (position {})", chunk.page, chunk.position);
                        println!("Content:\n{}", chunk.text);
                        println!("---");
                    }
                }
            }
            Ok(())
        }
    }
}

fn print_results(results: &[ScoredChunk], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(results)?),
        OutputFormat::Summary => {
            println!("Found {} similar chunks:", results.len());
            for hit in results {
                println!(
                    "  Similarity: {:.3} | ID: {} | File: {} | Page: {} | {}",
                    hit.score,
                    hit.id,
                    hit.chunk.source,
                    hit.chunk.page,
                    hit.chunk.text.chars().take(80).collect::<String>()
                );
            }
        }
        OutputFormat::Full => {
            for hit in results {
                println!("Similarity: {:.3}", hit.score);
                println!("Chunk ID: {}", hit.id);
                println!("File: {}", hit.chunk.source);
                println!("Page: {} (position {})", hit.chunk.page, hit.chunk.position);
                println!("Content:\n{}", hit.chunk.text);
                println!("---");
            }
        }
    }
    Ok(())
}
