pub mod engine;
pub mod index;
pub mod loader;
pub mod normalizer;
pub mod persist;
pub mod query;
pub mod ranker;

use serde::{Deserialize, Serialize};

pub use engine::{IndexStats, SearchEngine, SearchResult};
pub use index::InvertedIndex;
pub use query::Expr;

pub type DocId = u32;

/// A single indexed record. Fields missing from the source row are stored as empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub body: String,
    pub publication_date: String,
    pub link: String,
}

impl Document {
    pub fn new(id: DocId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            publication_date: String::new(),
            link: String::new(),
        }
    }
}
