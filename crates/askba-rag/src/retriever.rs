//! Similarity-based retrieval over the document store

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use askba_core::{Error, Result};

use crate::store::DocumentStore;
use crate::vectorizer::cosine_similarity;

/// A ranked match, pointing into the store by corpus position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Position of the document in [`DocumentStore::documents`]
    pub index: usize,
    pub document_id: String,
    /// Cosine similarity, always > 0
    pub score: f32,
}

/// Return up to `k` documents most similar to the query.
///
/// Results are sorted by descending score with ties kept in corpus order.
/// Documents scoring 0 or less are never returned, so fewer than `k` results
/// (or none) come back when little of the corpus is related to the query.
pub async fn retrieve(store: &DocumentStore, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
    if k == 0 {
        return Err(Error::InvalidInput("k must be at least 1".to_string()));
    }

    let query_vector = store.embed_query(query).await?;
    Ok(rank(store, &query_vector, k))
}

/// Rank the store against an already vectorized query
pub(crate) fn rank(store: &DocumentStore, query_vector: &[f32], k: usize) -> Vec<RetrievalResult> {
    let mut scored: Vec<(usize, f32)> = store
        .documents()
        .iter()
        .enumerate()
        .map(|(index, doc)| (index, cosine_similarity(query_vector, &doc.vector)))
        .filter(|(_, score)| *score > 0.0)
        .collect();

    // sort_by is stable, so equal scores stay in corpus order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k);

    let results: Vec<RetrievalResult> = scored
        .into_iter()
        .filter_map(|(index, score)| {
            store.document(index).map(|doc| RetrievalResult {
                index,
                document_id: doc.id.clone(),
                score,
            })
        })
        .collect();

    debug!(
        k,
        hits = results.len(),
        top = ?results.iter().map(|r| (r.document_id.as_str(), r.score)).collect::<Vec<_>>(),
        "Retrieved context"
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{build_store, CorpusSource};
    use std::fs;
    use tempfile::TempDir;

    fn store(files: &[(&str, &str)]) -> (TempDir, DocumentStore) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let store = build_store(&CorpusSource::new(dir.path())).unwrap();
        (dir, store)
    }

    fn benefits_corpus() -> (TempDir, DocumentStore) {
        store(&[
            ("alg.txt", "Arbeitslosengeld wird nach Arbeitslosmeldung gezahlt. Arbeitslosengeld ersetzt Einkommen."),
            ("bgs.txt", "Der Bildungsgutschein fördert Weiterbildung. Weiterbildung mit Bildungsgutschein ist kostenlos."),
            ("kug.txt", "Kurzarbeitergeld gleicht Entgeltausfall bei Kurzarbeit aus."),
            ("wb.txt", "Weiterbildung für Beschäftigte wird gefördert."),
        ])
    }

    #[tokio::test]
    async fn test_scores_sorted_and_positive() {
        let (_dir, store) = benefits_corpus();

        for query in [
            "Weiterbildung Bildungsgutschein",
            "Arbeitslosengeld Weiterbildung Kurzarbeit",
            "Wie bekomme ich Kurzarbeitergeld?",
        ] {
            let results = retrieve(&store, query, 10).await.unwrap();
            assert!(!results.is_empty(), "no hits for {query:?}");
            assert!(results.iter().all(|r| r.score > 0.0));
            assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[tokio::test]
    async fn test_result_count_is_min_of_k_and_positive_hits() {
        let (_dir, store) = benefits_corpus();

        // Only bgs.txt and wb.txt mention Weiterbildung
        for k in 1..=5 {
            let results = retrieve(&store, "Weiterbildung", k).await.unwrap();
            assert_eq!(results.len(), k.min(2));
        }

        let results = retrieve(&store, "Weiterbildung", 4).await.unwrap();
        assert_eq!(results[0].document_id, "bgs.txt");
        assert_eq!(results[1].document_id, "wb.txt");
    }

    #[tokio::test]
    async fn test_ties_keep_corpus_order() {
        let (_dir, store) = store(&[
            ("c.txt", "Elterngeld Antrag"),
            ("a.txt", "Elterngeld Antrag"),
            ("b.txt", "Bürgergeld"),
        ]);

        let results = retrieve(&store, "Elterngeld", 3).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "c.txt"]);
        assert_eq!(results[0].score, results[1].score);
    }

    #[tokio::test]
    async fn test_unrelated_query_returns_nothing() {
        let (_dir, store) = benefits_corpus();
        let results = retrieve(&store, "What is the capital of France?", 4).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_k_is_rejected() {
        let (_dir, store) = benefits_corpus();
        assert!(matches!(
            retrieve(&store, "Weiterbildung", 0).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_retrieval_is_repeatable() {
        let (_dir, store) = benefits_corpus();
        let first = retrieve(&store, "Bildungsgutschein Weiterbildung", 3).await.unwrap();
        let second = retrieve(&store, "Bildungsgutschein Weiterbildung", 3).await.unwrap();
        assert_eq!(first, second);
    }
}
