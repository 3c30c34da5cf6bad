//! Types for transcription operations.

use serde::{Deserialize, Serialize};

/// Result of transcribing one audio chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// Language detected by the provider, when reported.
    pub language: Option<String>,
}
