//! Knowledge-base loading — HTML files stripped to text and split into
//! overlapping chunks.

use std::path::Path;

use crate::error::RetrievalError;

/// Chunk size in characters.
pub const CHUNK_SIZE: usize = 1000;

/// Overlap between consecutive chunks, in characters.
pub const CHUNK_OVERLAP: usize = 200;

/// A bounded span of knowledge-base text, the retrieval unit.
///
/// Immutable once produced at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeChunk {
    pub text: String,
    /// Name of the source file the chunk came from.
    pub source: String,
}

/// Load every `*.html` file under `dir`, strip markup, and split into
/// overlapping character chunks.
pub fn load_knowledge_base(dir: &Path) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
    if !dir.is_dir() {
        return Err(RetrievalError::LoadFailed {
            reason: format!("knowledge directory not found: {}", dir.display()),
        });
    }

    let mut chunks = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("html"))
        .collect();
    entries.sort();

    for path in entries {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let html = std::fs::read_to_string(&path)?;
        let text = extract_text(&html);
        let count_before = chunks.len();
        for piece in split_text(&text, CHUNK_SIZE, CHUNK_OVERLAP) {
            chunks.push(KnowledgeChunk {
                text: piece,
                source: source.clone(),
            });
        }
        tracing::debug!(
            source = %source,
            chunks = chunks.len() - count_before,
            "Loaded knowledge document"
        );
    }

    tracing::info!(chunks = chunks.len(), dir = %dir.display(), "Knowledge base loaded");
    Ok(chunks)
}

/// Strip HTML markup, returning whitespace-normalized text.
pub fn extract_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let text: Vec<&str> = document.root_element().text().collect();
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into chunks of at most `chunk_size` characters with
/// `overlap` characters shared between consecutive chunks.
///
/// Operates on characters, not bytes — the knowledge base is Hebrew.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    assert!(overlap < chunk_size, "overlap must be smaller than chunk size");
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim().to_string();
        if !piece.is_empty() {
            chunks.push(piece);
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
