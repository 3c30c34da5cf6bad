//! Audio chunk ingestion and out-of-band transcription.

use crate::error::Error;
use crate::{snippets, Id};
use copilot_ai::traits::{retrieval, transcription};
use entity_api::{session, snippet};
use log::*;
use sea_orm::DatabaseConnection;

pub use entity_api::snippet::find_by_id;

/// Appends a snippet record for a freshly uploaded audio chunk. The caller
/// acknowledges the upload as soon as this returns; transcription runs
/// afterwards via [`process_transcription`].
pub async fn ingest_chunk(
    db: &DatabaseConnection,
    session_id: Id,
    captured_at: chrono::DateTime<chrono::Utc>,
    duration_seconds: i32,
) -> Result<snippets::Model, Error> {
    // Reject chunks for sessions that don't exist before writing anything
    let session = session::find_by_id(db, session_id).await?;

    let snippet = snippet::create(db, session.id, captured_at, duration_seconds).await?;
    debug!(
        "Ingested audio chunk {} for session {} ({}s)",
        snippet.id, session_id, duration_seconds
    );

    Ok(snippet)
}

/// Transcribes an ingested chunk, records the transcript, and hands it to
/// the retrieval index. Runs after the upload has already been acknowledged;
/// a transcription failure leaves the snippet untranscribed (it is simply
/// never included in document regeneration) and is not retried.
pub async fn process_transcription(
    db: &DatabaseConnection,
    transcription: &dyn transcription::Provider,
    retrieval: Option<&dyn retrieval::Provider>,
    snippet_id: Id,
    audio: Vec<u8>,
    format: &str,
) -> Result<(), Error> {
    let transcript = transcription.transcribe(&audio, format).await?;

    snippet::update_transcript(db, snippet_id, transcript.text.clone(), transcript.language)
        .await?;

    info!(
        "Transcribed snippet {}: {:.50}",
        snippet_id, transcript.text
    );

    // Best-effort: an unindexed transcript still reaches regeneration, it
    // just never comes back as retrieved context
    if let Some(retrieval) = retrieval {
        if let Err(err) = retrieval
            .index(&snippet_id.to_string(), &transcript.text)
            .await
        {
            warn!("Indexing of snippet {snippet_id} failed: {err}");
        }
    }

    Ok(())
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use copilot_ai::traits::retrieval::MockProvider as MockRetrieval;
    use copilot_ai::traits::transcription::MockProvider as MockTranscription;
    use copilot_ai::{Error as AiError, Transcript};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn snippet_row(id: Id, transcript: Option<&str>) -> snippets::Model {
        let now = chrono::Utc::now();
        snippets::Model {
            id,
            session_id: Id::new_v4(),
            captured_at: now.into(),
            duration_seconds: 60,
            transcript: transcript.map(str::to_string),
            language: transcript.map(|_| "en".to_string()),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn transcription_of(text: &'static str) -> MockTranscription {
        let mut transcription = MockTranscription::new();
        transcription.expect_transcribe().times(1).returning(|_, _| {
            Ok(Transcript {
                text: text.to_string(),
                language: Some("en".to_string()),
            })
        });
        transcription
    }

    #[tokio::test]
    async fn transcription_stores_the_transcript_and_indexes_it() -> Result<(), Error> {
        let snippet_id = Id::new_v4();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![snippet_row(snippet_id, None)]])
            .append_query_results(vec![vec![snippet_row(snippet_id, Some("hello world"))]])
            .into_connection();

        let expected_source = snippet_id.to_string();
        let mut retrieval = MockRetrieval::new();
        retrieval
            .expect_index()
            .withf(move |source_id, content| {
                source_id == expected_source && content == "hello world"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        process_transcription(
            &db,
            &transcription_of("hello world"),
            Some(&retrieval),
            snippet_id,
            vec![0u8; 16],
            "webm",
        )
        .await
    }

    #[tokio::test]
    async fn indexing_failure_does_not_fail_transcription() -> Result<(), Error> {
        let snippet_id = Id::new_v4();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![snippet_row(snippet_id, None)]])
            .append_query_results(vec![vec![snippet_row(snippet_id, Some("hello world"))]])
            .into_connection();

        let mut retrieval = MockRetrieval::new();
        retrieval
            .expect_index()
            .times(1)
            .returning(|_, _| Err(AiError::Network("sidecar down".to_string())));

        process_transcription(
            &db,
            &transcription_of("hello world"),
            Some(&retrieval),
            snippet_id,
            vec![0u8; 16],
            "webm",
        )
        .await
    }

    #[tokio::test]
    async fn transcription_proceeds_without_a_retrieval_provider() -> Result<(), Error> {
        let snippet_id = Id::new_v4();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![snippet_row(snippet_id, None)]])
            .append_query_results(vec![vec![snippet_row(snippet_id, Some("hello world"))]])
            .into_connection();

        process_transcription(
            &db,
            &transcription_of("hello world"),
            None,
            snippet_id,
            vec![0u8; 16],
            "webm",
        )
        .await
    }
}
