use crate::index::InvertedIndex;
use crate::persist::{self, IndexPaths};
use crate::ranker::{extract_snippet, query_tokens, score, SNIPPET_LENGTH};
use crate::{DocId, Document};
use anyhow::Result;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: DocId,
    pub title: String,
    pub score: f64,
    pub snippet: String,
    pub publication_date: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_unique_terms: usize,
    pub index_size_mb: f64,
}

/// Owns a built index and answers ranked queries against it.
#[derive(Debug, Default)]
pub struct SearchEngine {
    index: InvertedIndex,
}

impl SearchEngine {
    pub fn new(index: InvertedIndex) -> Self {
        Self { index }
    }

    pub fn build(documents: impl IntoIterator<Item = Document>) -> Self {
        Self::new(InvertedIndex::build(documents))
    }

    pub fn open(paths: &IndexPaths) -> Result<Self> {
        Ok(Self::new(persist::load_index(paths)?))
    }

    pub fn save(&self, paths: &IndexPaths) -> Result<()> {
        persist::save_index(paths, &self.index)
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> {
        self.index.document(doc_id)
    }

    /// Ranked results for `query`.
    ///
    /// Matching ids are truncated to `max_results` in ascending id order *before*
    /// scoring, so callers wanting a true top-k by score should ask for a large
    /// `max_results` and cut the sorted list themselves.
    pub fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let doc_ids = self.index.search(query);
        let tokens = query_tokens(query);

        let mut results: Vec<SearchResult> = doc_ids
            .into_iter()
            .take(max_results)
            .filter_map(|doc_id| self.index.document(doc_id))
            .map(|doc| SearchResult {
                id: doc.id,
                title: doc.title.clone(),
                score: score(doc, &tokens),
                snippet: extract_snippet(&doc.body, &tokens, SNIPPET_LENGTH),
                publication_date: doc.publication_date.clone(),
                link: doc.link.clone(),
            })
            .collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        tracing::debug!(query, hits = results.len(), "search complete");
        results
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_documents: self.index.num_docs(),
            total_unique_terms: self.index.num_terms(),
            index_size_mb: self.index.approximate_size_bytes() as f64 / (1024.0 * 1024.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_query_short_circuits() {
        let engine = SearchEngine::build(vec![Document::new(0, "Saúde", "")]);
        assert!(engine.search("", 10).is_empty());
        assert!(engine.search("  \t ", 10).is_empty());
    }

    #[test]
    fn truncates_before_ranking() {
        // Doc 2 would score highest, but only the first two ids are kept.
        let engine = SearchEngine::build(vec![
            Document::new(0, "", "vacina"),
            Document::new(1, "", "vacina vacina"),
            Document::new(2, "Vacina", "vacina vacina vacina"),
        ]);
        let results = engine.search("vacina", 2);
        let ids: Vec<DocId> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn equal_scores_keep_id_order() {
        let engine = SearchEngine::build(vec![
            Document::new(0, "Vacina A", ""),
            Document::new(1, "Vacina B", ""),
        ]);
        let ids: Vec<DocId> = engine.search("vacina", 10).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }
}
