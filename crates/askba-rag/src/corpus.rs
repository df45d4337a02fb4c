//! Corpus loading: file discovery, decoding, cleaning and passage splitting

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use askba_core::{Error, Result};

use crate::config::ChunkingConfig;
use crate::store::SkippedDocument;

/// Encoding a corpus file was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// Windows-1252 fallback; every byte maps to one char, so it never fails
    Windows1252,
}

/// Windows-1252 code points for bytes 0x80..=0x9F.
///
/// The five bytes cp1252 leaves undefined keep their Latin-1 (C1) value, as
/// in the WHATWG mapping. Every other byte is identical to Latin-1.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

fn cp1252_char(byte: u8) -> char {
    match byte {
        0x80..=0x9F => CP1252_HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}

/// One indexable unit of text, before vectorization
#[derive(Debug, Clone)]
pub(crate) struct Passage {
    pub id: String,
    pub source_name: String,
    pub text: String,
}

/// Everything read from the corpus directory in one pass
#[derive(Debug)]
pub(crate) struct LoadedCorpus {
    pub root: PathBuf,
    pub passages: Vec<Passage>,
    pub skipped: Vec<SkippedDocument>,
    /// MD5 over file names, raw bytes and chunking settings
    pub fingerprint: String,
}

/// Decode file content, trying UTF-8 first and Windows-1252 second
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        Err(_) => (
            bytes.iter().map(|&b| cp1252_char(b)).collect(),
            TextEncoding::Windows1252,
        ),
    }
}

fn horizontal_space() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("valid regex"))
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

/// Normalise text extracted from PDFs.
///
/// Non-breaking spaces become spaces, runs of spaces and tabs collapse to one
/// space, more than one blank line collapses to a single blank line, and the
/// result is trimmed.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace(['\r', '\u{a0}'], " ");
    let text = horizontal_space().replace_all(&text, " ");
    let text = blank_lines().replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Split text into overlapping passages of at most `chunk_size` characters.
///
/// Whitespace-only passages are dropped. `chunk_overlap` must be smaller than
/// `chunk_size`; [`crate::EngineConfig::validate`] enforces this.
pub fn split_passages(text: &str, chunking: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunking
        .chunk_size
        .saturating_sub(chunking.chunk_overlap)
        .max(1);
    let mut passages = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunking.chunk_size.max(1)).min(chars.len());
        let passage: String = chars[start..end].iter().collect();
        let passage = passage.trim();
        if !passage.is_empty() {
            passages.push(passage.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start += step;
    }

    passages
}

/// List the `.txt` files of a corpus directory in file-name order
fn list_corpus_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::CorpusNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        let is_text = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if path.is_file() && is_text {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Read, decode, clean and optionally split every corpus file.
///
/// Unreadable or empty files are skipped and reported; they never abort the
/// load. Callers decide what an empty result means.
pub(crate) fn load_corpus(root: &Path, chunking: Option<&ChunkingConfig>) -> Result<LoadedCorpus> {
    let files = list_corpus_files(root)?;
    let mut passages = Vec::new();
    let mut skipped = Vec::new();
    let mut digest = md5::Context::new();

    if let Some(chunking) = chunking {
        digest.consume(format!("chunk:{}:{};", chunking.chunk_size, chunking.chunk_overlap));
    }

    for path in files {
        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %source_name, error = %e, "Skipping unreadable corpus file");
                skipped.push(SkippedDocument::new(&source_name, format!("unreadable: {}", e)));
                continue;
            }
        };

        digest.consume(source_name.as_bytes());
        digest.consume((bytes.len() as u64).to_le_bytes());
        digest.consume(&bytes);

        let (text, encoding) = decode_text(&bytes);
        if encoding != TextEncoding::Utf8 {
            debug!(file = %source_name, ?encoding, "Decoded with fallback encoding");
        }

        let text = clean_text(&text);
        if text.is_empty() {
            warn!(file = %source_name, "Skipping empty corpus file");
            skipped.push(SkippedDocument::new(&source_name, "empty after cleaning"));
            continue;
        }

        match chunking {
            Some(chunking) => {
                for (i, passage) in split_passages(&text, chunking).into_iter().enumerate() {
                    passages.push(Passage {
                        id: format!("{}#{}", source_name, i),
                        source_name: source_name.clone(),
                        text: passage,
                    });
                }
            }
            None => passages.push(Passage {
                id: source_name.clone(),
                source_name,
                text,
            }),
        }
    }

    Ok(LoadedCorpus {
        root: root.to_path_buf(),
        passages,
        skipped,
        fingerprint: format!("{:x}", digest.compute()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_falls_back_to_windows_1252() {
        let (text, encoding) = decode_text("Förderung".as_bytes());
        assert_eq!(text, "Förderung");
        assert_eq!(encoding, TextEncoding::Utf8);

        // "Förderung" in ISO-8859-1, which cp1252 agrees with
        let (text, encoding) = decode_text(b"F\xF6rderung");
        assert_eq!(text, "Förderung");
        assert_eq!(encoding, TextEncoding::Windows1252);

        // German quotes, dash and euro sign live in 0x80..=0x9F
        let (text, encoding) = decode_text(b"\x84Bildungsgutschein\x93 \x96 100 \x80");
        assert_eq!(text, "„Bildungsgutschein“ – 100 €");
        assert_eq!(encoding, TextEncoding::Windows1252);
        assert!(!text.chars().any(|c| ('\u{80}'..='\u{9F}').contains(&c)));

        // undefined cp1252 bytes pass through unchanged
        let (text, _) = decode_text(b"\x81\x8D");
        assert_eq!(text, "\u{81}\u{8D}");

        let (text, _) = decode_text(b"\xEF\xBB\xBFmit BOM");
        assert_eq!(text, "mit BOM");
    }

    #[test]
    fn test_clean_text() {
        let raw = "  Merkblatt\u{a0}6\t\tWeiterbildung \r\n\r\n\r\n\r\nAbschnitt  1  \n";
        assert_eq!(clean_text(raw), "Merkblatt 6 Weiterbildung \n\nAbschnitt 1");
    }

    #[test]
    fn test_split_passages_overlap() {
        let chunking = ChunkingConfig {
            chunk_size: 4,
            chunk_overlap: 1,
        };
        assert_eq!(split_passages("abcdefghij", &chunking), vec!["abcd", "defg", "ghij"]);
        assert!(split_passages("", &chunking).is_empty());
    }

    #[test]
    fn test_load_corpus_orders_and_skips() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "second").unwrap();
        fs::write(dir.path().join("a.txt"), "first").unwrap();
        fs::write(dir.path().join("blank.txt"), " \n\t ").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let corpus = load_corpus(dir.path(), None).unwrap();
        let ids: Vec<_> = corpus.passages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "b.txt"]);
        assert_eq!(corpus.skipped.len(), 1);
        assert_eq!(corpus.skipped[0].source_name, "blank.txt");
    }

    #[test]
    fn test_load_corpus_with_chunking() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.txt"), "abcdefghij").unwrap();

        let chunking = ChunkingConfig {
            chunk_size: 6,
            chunk_overlap: 2,
        };
        let corpus = load_corpus(dir.path(), Some(&chunking)).unwrap();
        let ids: Vec<_> = corpus.passages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["doc.txt#0", "doc.txt#1"]);
        assert!(corpus.passages.iter().all(|p| p.source_name == "doc.txt"));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.txt"), "Arbeitslosengeld").unwrap();
        let first = load_corpus(dir.path(), None).unwrap().fingerprint;
        let again = load_corpus(dir.path(), None).unwrap().fingerprint;
        assert_eq!(first, again);

        fs::write(dir.path().join("doc.txt"), "Bürgergeld").unwrap();
        let changed = load_corpus(dir.path(), None).unwrap().fingerprint;
        assert_ne!(first, changed);
    }

    #[test]
    fn test_missing_corpus() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(load_corpus(&missing, None), Err(Error::CorpusNotFound(p)) if p == missing));
    }
}
