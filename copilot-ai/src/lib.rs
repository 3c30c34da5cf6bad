//! Provider abstraction layer for the meeting copilot's external AI calls.
//!
//! This crate defines trait-based contracts for the three collaborators the
//! platform depends on:
//! - Speech-to-text transcription of captured audio chunks
//! - Passage retrieval (RAG context) for document regeneration
//! - Text generation from role-tagged prompts
//!
//! The design is provider-agnostic: applications can swap between service
//! providers (OpenAI, Deepgram, a self-hosted retrieval index, etc.) without
//! changing orchestration code, and tests substitute mock providers.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::Error;
pub use types::generation::{ChatMessage, GenerationRequest, Role};
pub use types::retrieval::Passage;
pub use types::transcription::Transcript;
