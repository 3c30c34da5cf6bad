//! Provider traits for external AI collaborators.

pub mod generation;
pub mod retrieval;
pub mod transcription;
