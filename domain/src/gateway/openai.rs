//! OpenAI API client.
//!
//! One client serves both provider roles the platform needs from OpenAI:
//! chat-completion text generation for document regeneration and naming, and
//! Whisper transcription of uploaded audio chunks.

use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use async_trait::async_trait;
use copilot_ai::traits::{generation, transcription};
use copilot_ai::{ChatMessage, Error as AiError, GenerationRequest, Transcript};
use log::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Shape of a `verbose_json` transcription response. Whisper reports the
/// detected language alongside the text.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// OpenAI API client
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    generation_model: String,
    transcription_model: String,
}

impl OpenAiClient {
    /// Create a new OpenAI client with the given API key and base URL
    pub fn new(
        api_key: &str,
        base_url: &str,
        generation_model: &str,
        transcription_model: &str,
    ) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();

        let bearer = format!("Bearer {api_key}");
        let mut header_value = reqwest::header::HeaderValue::from_str(&bearer).map_err(|e| {
            warn!("Failed to create auth header: {:?}", e);
            Error {
                source: Some(Box::new(e)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Invalid API key format".to_string(),
                )),
            }
        })?;
        header_value.set_sensitive(true);
        headers.insert("authorization", header_value);

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            generation_model: generation_model.to_string(),
            transcription_model: transcription_model.to_string(),
        })
    }
}

#[async_trait]
impl generation::Provider for OpenAiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatCompletionRequest {
            model: &self.generation_model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(
            "Requesting chat completion from {} ({} messages)",
            self.generation_model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenAI chat completion failed ({}): {}", status, error_text);
            return Err(classify_api_error(status, error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AiError::Deserialization(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AiError::Deserialization("chat completion contained no choices".to_string())
            })
    }

    fn provider_id(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl transcription::Provider for OpenAiClient {
    async fn transcribe(&self, audio: &[u8], format: &str) -> Result<Transcript, AiError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file_part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(format!("chunk.{format}"));

        let form = reqwest::multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);

        debug!(
            "Transcribing {} bytes of {} audio with {}",
            audio.len(),
            format,
            self.transcription_model
        );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenAI transcription failed ({}): {}", status, error_text);
            return Err(classify_api_error(status, error_text));
        }

        let transcription: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AiError::Deserialization(e.to_string()))?;

        Ok(Transcript {
            text: transcription.text,
            language: transcription.language,
        })
    }

    fn provider_id(&self) -> &str {
        "openai_whisper"
    }
}

fn map_send_error(err: reqwest::Error) -> AiError {
    if err.is_timeout() {
        AiError::Timeout(err.to_string())
    } else {
        AiError::Network(err.to_string())
    }
}

fn classify_api_error(status: reqwest::StatusCode, error_text: String) -> AiError {
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            AiError::Authentication(error_text)
        }
        _ => AiError::Provider(error_text),
    }
}
