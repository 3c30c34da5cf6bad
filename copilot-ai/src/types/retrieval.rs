//! Types for passage retrieval operations.

use serde::{Deserialize, Serialize};

/// One retrieved passage of reference material, ordered by relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    /// Similarity score in [0, 1]; higher is more relevant.
    pub score: f32,
    /// Human-readable origin, e.g. a document title.
    pub source: Option<String>,
}
