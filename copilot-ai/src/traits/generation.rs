//! Text generation provider trait.

use crate::types::generation::GenerationRequest;
use crate::Error;
use async_trait::async_trait;

/// Abstraction for LLM text generation from a role-tagged message sequence.
///
/// One blocking call per invocation; no streaming. Failures propagate to the
/// caller — the orchestrator aborts the current document update and surfaces
/// the error rather than retrying.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate plain text for the given prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<String, Error>;

    /// Return unique identifier for this provider (e.g., "openai", "claude").
    ///
    /// Must be lowercase, alphanumeric with underscores only.
    fn provider_id(&self) -> &str;
}
