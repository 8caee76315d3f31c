use clap::Parser;
use scholar_context::sanitize::sanitize;
use scholar_context::text::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_DELIMITERS, TextSplitter};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};

/// A CLI tool to sanitize and chunk a text file into JSON output.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Source label attached to every chunk.
    #[arg(short, long, default_value = "stdin")]
    source: String,

    /// Maximum length of each chunk in characters.
    #[arg(short = 'c', long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared between neighbouring chunks.
    #[arg(short = 'o', long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Comma-separated list of regex patterns for delimiters.
    /// Defaults to paragraph, line and word breaks.
    #[arg(short, long, value_delimiter = ',')]
    delimiters: Option<Vec<String>>,

    /// Emit raw chunks without sanitizing them.
    #[arg(long)]
    raw: bool,
}

#[derive(Serialize)]
struct ChunkOutput<'a> {
    source: &'a str,
    sequence: usize,
    start_offset: usize,
    chars: usize,
    text: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let content = if let Some(input_path) = &args.input {
        fs::read(input_path)?
    } else {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        buffer
    };
    let content: String = content.utf8_chunks().map(|chunk| chunk.valid()).collect();

    let delimiter_patterns: Vec<String> = args.delimiters.unwrap_or_else(|| {
        DEFAULT_DELIMITERS
            .iter()
            .map(|&s| s.to_string())
            .collect()
    });
    let delimiter_refs: Vec<&str> = delimiter_patterns.iter().map(|s| s.as_str()).collect();

    let splitter = TextSplitter::new(&delimiter_refs, args.chunk_size, args.chunk_overlap)?;

    let chunks: Vec<ChunkOutput> = splitter
        .get_chunks(&content)
        .into_iter()
        .filter_map(|chunk| {
            let text = if args.raw {
                Some(chunk.chunk_text)
            } else {
                sanitize(&chunk.chunk_text)
            }?;
            Some(ChunkOutput {
                source: &args.source,
                sequence: chunk.sequence,
                start_offset: chunk.start_offset,
                chars: text.chars().count(),
                text,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&chunks)?);

    Ok(())
}
