//! PDF discovery and text extraction.
//!
//! [`DocumentLoader`] matches `*.pdf` directly inside one directory (no
//! recursion) and extracts each file's text page by page with `pdf-extract`
//! on the blocking pool.
//!
//! A missing or unreadable directory is an error. A single unreadable or
//! corrupt PDF is skipped with a warning and listed in
//! [`LoadReport::skipped`], so one bad paper never blocks the rest.

use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Page separator recognized in pre-extracted text.
const FORM_FEED: char = '\x0C';

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read papers directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("papers path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// One page of extracted text. Page numbers start at 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub number: usize,
    pub text: String,
}

/// A loaded PDF: its path and the text of every non-blank page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub path: PathBuf,
    pub pages: Vec<Page>,
}

impl Document {
    /// Build a document from per-page texts in page order. Blank pages are
    /// dropped but keep their slot in the numbering.
    pub fn from_pages<S: AsRef<str>>(path: impl Into<PathBuf>, pages: &[S]) -> Self {
        Self {
            path: path.into(),
            pages: number_pages(pages.iter().map(|page| page.as_ref())),
        }
    }

    /// Build a document from already extracted text, splitting it into pages
    /// on form feeds.
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            pages: split_pages(text),
        }
    }

    /// Identifier stored with every chunk of this document.
    pub fn source(&self) -> String {
        self.path.display().to_string()
    }
}

/// Outcome of loading a directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    /// Files that matched but could not be read or parsed, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    /// blake3 digest over the names and bytes of every matched file.
    pub fingerprint: String,
}

impl LoadReport {
    pub fn page_count(&self) -> usize {
        self.documents.iter().map(|d| d.pages.len()).sum()
    }
}

/// Split extracted text into pages on form feeds, dropping blank pages.
///
/// Text without form feeds is a single page. Page numbers keep their
/// position in the original document even when earlier pages were blank.
pub fn split_pages(text: &str) -> Vec<Page> {
    number_pages(text.split(FORM_FEED))
}

fn number_pages<'a>(texts: impl Iterator<Item = &'a str>) -> Vec<Page> {
    texts
        .enumerate()
        .filter(|(_, page_text)| !page_text.trim().is_empty())
        .map(|(i, page_text)| Page {
            number: i + 1,
            text: page_text.trim().to_string(),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    dir: PathBuf,
}

impl DocumentLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// PDF files directly inside the directory, sorted by path.
    pub async fn pdf_paths(&self) -> Result<Vec<PathBuf>, LoadError> {
        let metadata =
            tokio::fs::metadata(&self.dir)
                .await
                .map_err(|source| LoadError::Directory {
                    path: self.dir.clone(),
                    source,
                })?;
        if !metadata.is_dir() {
            return Err(LoadError::NotADirectory(self.dir.clone()));
        }

        let pattern = format!(
            "{}/*.pdf",
            Pattern::escape(&self.dir.to_string_lossy())
        );
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };

        let mut paths = Vec::new();
        for entry in glob::glob_with(&pattern, options)? {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable entry {}: {}", e.path().display(), e),
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Load every PDF in the directory.
    pub async fn load(&self) -> Result<LoadReport, LoadError> {
        let paths = self.pdf_paths().await?;
        info!(
            "Found {} PDF files in {}",
            paths.len(),
            self.dir.display()
        );

        let mut report = LoadReport::default();
        let mut hasher = blake3::Hasher::new();

        for path in paths {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(source) => {
                    let err = LoadError::Read {
                        path: path.clone(),
                        source,
                    };
                    warn!("Skipping {}: {}", path.display(), err);
                    hash_entry(&mut hasher, &path, b"<unreadable>");
                    report.skipped.push((path, err.to_string()));
                    continue;
                }
            };
            hash_entry(&mut hasher, &path, &bytes);

            match parse_pdf(&path, bytes).await {
                Ok(document) => {
                    debug!(
                        "Loaded {} ({} pages)",
                        path.display(),
                        document.pages.len()
                    );
                    if document.pages.is_empty() {
                        warn!("No extractable text in {}", path.display());
                    }
                    report.documents.push(document);
                }
                Err(err) => {
                    warn!("Skipping {}: {}", path.display(), err);
                    report.skipped.push((path, err.to_string()));
                }
            }
        }

        report.fingerprint = hasher.finalize().to_hex().to_string();
        info!(
            "Loaded {} pages from {} documents ({} skipped)",
            report.page_count(),
            report.documents.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Fingerprint of the directory contents without parsing anything.
    ///
    /// Matches [`LoadReport::fingerprint`] for the same files.
    pub async fn fingerprint(&self) -> Result<String, LoadError> {
        let mut hasher = blake3::Hasher::new();
        for path in self.pdf_paths().await? {
            match tokio::fs::read(&path).await {
                Ok(bytes) => hash_entry(&mut hasher, &path, &bytes),
                Err(_) => hash_entry(&mut hasher, &path, b"<unreadable>"),
            }
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

}

fn hash_entry(hasher: &mut blake3::Hasher, path: &Path, bytes: &[u8]) {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    hasher.update(name.as_bytes());
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

async fn parse_pdf(path: &Path, bytes: Vec<u8>) -> Result<Document, LoadError> {
    // The extractor can panic on malformed input; a panic surfaces as a JoinError.
    let extracted =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
            .await
        .map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            message: if e.is_panic() {
                "extractor panicked on malformed input".to_string()
            } else {
                e.to_string()
            },
        })?;

    let pages = extracted.map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(Document::from_pages(path, &pages))
}
