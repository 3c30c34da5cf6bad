//! HTTP clients for the external services the platform calls out to.

pub mod openai;
pub mod retrieval;
