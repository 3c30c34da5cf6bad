//! Retrieval sidecar client.
//!
//! The retrieval service is an optional local companion process that indexes
//! the user's reference documents and answers semantic search queries. When
//! it is not configured the platform simply regenerates documents without
//! retrieved context.

use async_trait::async_trait;
use copilot_ai::traits::retrieval;
use copilot_ai::{Error as AiError, Passage};
use log::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
struct IndexRequest<'a> {
    source_id: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    passages: Vec<Passage>,
}

/// Retrieval sidecar client
pub struct RetrievalClient {
    client: reqwest::Client,
    base_url: String,
}

impl RetrievalClient {
    pub fn new(base_url: &str) -> Result<Self, crate::error::Error> {
        let client = reqwest::Client::builder().use_rustls_tls().build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }
}

#[async_trait]
impl retrieval::Provider for RetrievalClient {
    async fn retrieve(
        &self,
        query: &str,
        max_results: u32,
        threshold: Option<f32>,
    ) -> Result<Vec<Passage>, AiError> {
        let url = format!("{}/search", self.base_url);

        let body = SearchRequest {
            query,
            max_results,
            threshold,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(e.to_string())
                } else {
                    AiError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Retrieval search failed ({}): {}", status, error_text);
            return Err(AiError::Provider(error_text));
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| AiError::Deserialization(e.to_string()))?;

        debug!("Retrieved {} passage(s) for query", search.passages.len());

        Ok(search.passages)
    }

    async fn index(&self, source_id: &str, content: &str) -> Result<(), AiError> {
        let url = format!("{}/index", self.base_url);

        let body = IndexRequest { source_id, content };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(e.to_string())
                } else {
                    AiError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Retrieval indexing failed ({}): {}", status, error_text);
            return Err(AiError::Provider(error_text));
        }

        debug!("Indexed {} byte(s) under source {source_id}", content.len());

        Ok(())
    }

    fn provider_id(&self) -> &str {
        "retrieval_sidecar"
    }
}
