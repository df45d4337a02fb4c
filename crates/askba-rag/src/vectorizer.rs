//! TF-IDF vectorization and cosine similarity

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::OnceLock;

/// Added to the norm product so zero vectors score 0 instead of NaN
const EPSILON: f64 = 1e-10;

/// Function words shared by the corpus languages (German, English, Turkish).
///
/// One list is used for every text so documents and queries are tokenized
/// identically regardless of the request language.
const STOPWORDS: &[&str] = &[
    // English
    "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "been", "before", "being", "below", "between", "both", "but", "by",
    "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "him", "his", "how", "if",
    "in", "into", "is", "it", "its", "just", "may", "me", "might", "more", "most", "must", "my",
    "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over",
    "own", "same", "shall", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "whose", "why", "will", "with", "would", "you", "your",
    // German
    "aber", "alle", "als", "auch", "auf", "aus", "bei", "bin", "bist", "da", "dass", "dem",
    "den", "der", "des", "dich", "die", "dies", "diese", "dieser", "dieses", "dir", "dort",
    "du", "durch", "ein", "eine", "einem", "einen", "einer", "eines", "er", "es", "euch", "für",
    "gegen", "hat", "hatte", "haben", "hier", "ich", "ihm", "ihn", "ihnen", "ihr", "im", "ist",
    "kann", "kein", "keine", "können", "man", "mehr", "mein", "mich", "mir", "mit", "muss",
    "müssen", "nach", "nicht", "noch", "nur", "ob", "oder", "schon", "sehr", "sein", "seid",
    "sich", "sie", "sind", "soll", "sollen", "über", "um", "und", "uns", "unter", "vom", "von",
    "vor", "war", "waren", "was", "welche", "welcher", "welches", "wenn", "wer", "werden",
    "wie", "wir", "wird", "wo", "wann", "warum", "wurde", "wurden", "zu", "zum", "zur",
    // Turkish
    "ama", "ben", "biz", "bir", "bu", "çok", "daha", "de", "en", "gibi", "hangi", "her", "ile",
    "için", "ki", "kim", "mi", "mı", "mu", "mü", "nasıl", "ne", "neden", "nedir", "onlar",
    "sen", "siz", "şu", "var", "veya", "ve", "yok",
];

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("valid regex"))
}

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Split text into lowercase terms, dropping stopwords and one-letter tokens
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|term| term.chars().count() > 1 && !stopwords().contains(*term))
        .map(str::to_string)
        .collect()
}

/// Cosine similarity `a·b / (‖a‖‖b‖ + ε)`.
///
/// Vectors of different length are not comparable and score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt() + EPSILON)) as f32
}

/// TF-IDF model fitted on a corpus.
///
/// The vocabulary is kept in sorted order, so fitting the same texts always
/// yields the same dimensions. Terms unseen during fitting are ignored when
/// transforming queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfIdfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f32>,
}

impl TfIdfVectorizer {
    /// Fit vocabulary and smoothed IDF weights, `ln((1 + n) / (1 + df)) + 1`
    pub fn fit<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for text in texts {
            let unique: BTreeSet<String> = tokenize(text.as_ref()).into_iter().collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let n = texts.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            idf.push((((1.0 + n) / (1.0 + df as f64)).ln() + 1.0) as f32);
            vocabulary.insert(term, index);
        }

        Self { vocabulary, idf }
    }

    /// Term counts weighted by IDF, in vocabulary order
    pub fn transform(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.idf.len()];
        for term in tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                vector[index] += self.idf[index];
            }
        }
        vector
    }

    /// Number of dimensions (vocabulary size)
    pub fn dimension(&self) -> usize {
        self.idf.len()
    }
}
