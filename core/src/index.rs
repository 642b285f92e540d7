use crate::normalizer::{normalize, tokenize};
use crate::{query, DocId, Document};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Prefix of the parallel posting entries that record title-only occurrences.
pub const TITLE_PREFIX: &str = "title:";

/// Sorted set of document ids. Iteration order is ascending id.
pub type PostingSet = BTreeSet<DocId>;

/// Inverted index over a fixed document collection.
///
/// Every title token is posted twice: under the plain term and under
/// `title:{term}`. Body tokens are posted under the plain term only.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub postings: HashMap<String, PostingSet>,
    pub docs: HashMap<DocId, Document>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut index = Self::new();
        for doc in documents {
            index.add_document(doc);
        }
        tracing::info!(num_docs = index.num_docs(), num_terms = index.num_terms(), "index built");
        index
    }

    pub fn add_document(&mut self, doc: Document) {
        let doc_id = doc.id;
        for token in tokenize(&doc.title) {
            self.postings.entry(format!("{TITLE_PREFIX}{token}")).or_default().insert(doc_id);
            self.postings.entry(token).or_default().insert(doc_id);
        }
        for token in tokenize(&doc.body) {
            self.postings.entry(token).or_default().insert(doc_id);
        }
        self.docs.insert(doc_id, doc);
    }

    /// Posting set for `term`, normalized as a whole string. Unknown terms yield `None`.
    pub fn postings_for(&self, term: &str) -> Option<&PostingSet> {
        self.postings.get(&normalize(term))
    }

    pub fn lookup_term(&self, term: &str) -> PostingSet {
        self.postings_for(term).cloned().unwrap_or_default()
    }

    /// Documents whose title produced `term`.
    pub fn lookup_title_term(&self, term: &str) -> PostingSet {
        self.postings
            .get(&format!("{TITLE_PREFIX}{}", normalize(term)))
            .cloned()
            .unwrap_or_default()
    }

    pub fn search(&self, boolean_query: &str) -> PostingSet {
        query::search(self, boolean_query)
    }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> {
        self.docs.get(&doc_id)
    }

    /// Normalized `title + " " + body`, the text phrase queries are matched against.
    pub fn normalized_content(&self, doc_id: DocId) -> Option<String> {
        self.docs
            .get(&doc_id)
            .map(|doc| normalize(&format!("{} {}", doc.title, doc.body)))
    }

    pub fn all_doc_ids(&self) -> PostingSet {
        self.docs.keys().copied().collect()
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    /// Distinct posting keys, title-prefixed entries included.
    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }

    /// Rough resident size: key bytes, four bytes per posting, stored document text.
    pub fn approximate_size_bytes(&self) -> usize {
        let postings: usize = self
            .postings
            .iter()
            .map(|(term, set)| term.len() + set.len() * std::mem::size_of::<DocId>())
            .sum();
        let docs: usize = self
            .docs
            .values()
            .map(|d| d.title.len() + d.body.len() + d.publication_date.len() + d.link.len())
            .sum();
        postings + docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InvertedIndex {
        InvertedIndex::build(vec![
            Document::new(0, "Saúde Mental", "Atenção psicossocial na rede pública."),
            Document::new(1, "Resolução", "Dispõe sobre a saúde do trabalhador."),
        ])
    }

    #[test]
    fn posts_title_tokens_under_both_keys() {
        let index = sample();
        assert_eq!(index.lookup_term("saude"), PostingSet::from([0, 1]));
        assert_eq!(index.lookup_title_term("saúde"), PostingSet::from([0]));
        assert!(index.lookup_title_term("trabalhador").is_empty());
    }

    #[test]
    fn lookup_normalizes_whole_term() {
        let index = sample();
        assert_eq!(index.lookup_term("SAÚDE"), index.lookup_term("saude"));
        assert_eq!(index.lookup_term("psicossocial,"), PostingSet::from([0]));
        assert!(index.lookup_term("inexistente").is_empty());
        assert!(index.lookup_term("").is_empty());
    }

    #[test]
    fn counts_documents_and_terms() {
        let index = sample();
        assert_eq!(index.num_docs(), 2);
        assert!(index.num_terms() > 0);
        assert!(index.postings.contains_key("title:mental"));
        assert!(!index.postings.contains_key("na"));
        assert!(index.approximate_size_bytes() > 0);
    }

    #[test]
    fn normalized_content_joins_title_and_body() {
        let index = sample();
        assert_eq!(
            index.normalized_content(0).as_deref(),
            Some("saude mental atencao psicossocial na rede publica")
        );
        assert_eq!(index.normalized_content(9), None);
    }
}
