use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const API_VERSION: &str = "0.2.0";

/// The insight document as returned by the backend.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InsightDocument {
    pub content: String,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default)]
    pub llm_updated_at: Option<String>,
    #[serde(default)]
    pub user_edited_at: Option<String>,
}

/// Outcome of one insight poll.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedInsight {
    Ready(InsightDocument),
    NotReady,
}

/// What the polling loop needs from the backend; lets tick logic be
/// exercised against a scripted source in tests.
pub trait InsightSource {
    async fn ensure_insight(&self, session_id: &str) -> Result<FetchedInsight>;
    async fn save_document(&self, session_id: &str, content: &str) -> Result<()>;
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn create_session(&self) -> Result<String> {
        let url = format!("{}/sessions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-version", API_VERSION)
            .send()
            .await
            .context("Failed to create session")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Failed to create session: {} - Response: {}", status, body);
        }

        let api_response: Value = response.json().await.context("Failed to parse response")?;

        api_response["data"]["id"]
            .as_str()
            .context("No session ID in response")
            .map(str::to_string)
    }

    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        let url = format!("{}/sessions/{}/end", self.base_url, session_id);

        let response = self
            .client
            .post(&url)
            .header("x-version", API_VERSION)
            .send()
            .await
            .context("Failed to end session")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to end session: {}", response.status());
        }

        Ok(())
    }

    pub async fn resume_session(&self, session_id: &str) -> Result<()> {
        let url = format!("{}/sessions/{}/resume", self.base_url, session_id);

        let response = self
            .client
            .post(&url)
            .header("x-version", API_VERSION)
            .send()
            .await
            .context("Failed to resume session")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to resume session: {}", response.status());
        }

        Ok(())
    }
}

impl InsightSource for ApiClient {
    /// Asks the backend to bring the session's document up to date. A 202
    /// means there is nothing to show yet; any other non-success status is
    /// an error the caller may tolerate and retry on the next poll.
    async fn ensure_insight(&self, session_id: &str) -> Result<FetchedInsight> {
        let url = format!("{}/insight/for-session", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-version", API_VERSION)
            .json(&json!({ "session_id": session_id }))
            .send()
            .await
            .context("Failed to request insight")?;

        if response.status() == reqwest::StatusCode::ACCEPTED {
            return Ok(FetchedInsight::NotReady);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Insight request failed: {} - Response: {}", status, body);
        }

        let api_response: Value = response.json().await.context("Failed to parse response")?;
        let document: InsightDocument = serde_json::from_value(api_response["data"].clone())
            .context("No document in response")?;

        Ok(FetchedInsight::Ready(document))
    }

    async fn save_document(&self, session_id: &str, content: &str) -> Result<()> {
        let url = format!("{}/sessions/{}/document", self.base_url, session_id);

        let response = self
            .client
            .put(&url)
            .header("x-version", API_VERSION)
            .json(&json!({ "content": content }))
            .send()
            .await
            .context("Failed to save document")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Failed to save document: {} - Response: {}", status, body);
        }

        Ok(())
    }
}
