//! Transcription provider trait.

use crate::types::transcription::Transcript;
use crate::Error;
use async_trait::async_trait;

/// Abstraction for speech-to-text transcription of a single audio chunk.
///
/// One blocking call per chunk; there is no job polling because chunks are
/// short (a minute by default). Failures propagate to the caller, which logs
/// and leaves the snippet untranscribed — there is no automatic retry.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Transcribe raw audio bytes in the declared container format
    /// (e.g. "webm", "wav", "mp3").
    async fn transcribe(&self, audio: &[u8], format: &str) -> Result<Transcript, Error>;

    /// Return unique identifier for this provider (e.g., "openai_whisper").
    ///
    /// Must be lowercase, alphanumeric with underscores only.
    fn provider_id(&self) -> &str;
}
