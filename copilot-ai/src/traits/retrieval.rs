//! Passage retrieval (RAG) provider trait.

use crate::types::retrieval::Passage;
use crate::Error;
use async_trait::async_trait;

/// Abstraction for semantic passage search over a user's reference material.
///
/// Retrieval is strictly best-effort context enrichment: callers must treat
/// any failure as an empty result set and never block generation on it.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Return up to `max_results` passages semantically relevant to `query`,
    /// ordered most relevant first. Passages scoring below `threshold`
    /// (when given) are excluded.
    async fn retrieve(
        &self,
        query: &str,
        max_results: u32,
        threshold: Option<f32>,
    ) -> Result<Vec<Passage>, Error>;

    /// Add `content` to the searchable index under `source_id`, replacing
    /// anything previously indexed under the same id. Best-effort like
    /// `retrieve`: callers log failures and move on.
    async fn index(&self, source_id: &str, content: &str) -> Result<(), Error>;

    /// Return unique identifier for this provider.
    fn provider_id(&self) -> &str;
}
