//! Shared request/response types for the provider traits.

pub mod generation;
pub mod retrieval;
pub mod transcription;
