//! The session insight engine: decides what new transcript material has
//! arrived for a session, merges it with the existing living document while
//! respecting unsaved human edits, regenerates the document through the
//! generation provider (augmented with retrieved context), and persists the
//! result so polling clients converge on a single consistent view.

use crate::error::{DomainErrorKind, EntityErrorKind, Error, InternalErrorKind};
use crate::{insights, sessions, snippets, Id};
use copilot_ai::traits::{generation, retrieval};
use copilot_ai::{ChatMessage, GenerationRequest, Passage};
use entity_api::{insight, session, snippet};
use log::*;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

const SYSTEM_PROMPT: &str = "You are a meeting copilot. You maintain a single living document \
    that summarizes an ongoing conversation. Be concise and actionable.";

const NAMING_SYSTEM_PROMPT: &str = "You are a helpful meeting assistant.";
const NAMING_MAX_TOKENS: u32 = 16;
const NAMING_TEMPERATURE: f32 = 0.3;

/// How many leading list-like lines become the derived bullet list.
const MAX_BULLETS: usize = 3;

/// How many of the earliest transcripts seed the one-time session name.
const NAMING_TRANSCRIPT_COUNT: usize = 3;

/// Output size and sampling bounds for document regeneration calls.
#[derive(Debug, Clone)]
pub struct GenerationPolicy {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// How much retrieved context is requested per regeneration.
#[derive(Debug, Clone)]
pub struct RetrievalPolicy {
    pub max_results: u32,
    pub threshold: f32,
}

/// Result of an `ensure_insight` invocation. `NotReady` is a normal,
/// retriable condition (no transcripts yet), distinct from a hard error, so
/// that callers branch exhaustively instead of inspecting error shapes.
#[derive(Debug, PartialEq)]
pub enum InsightOutcome {
    Ready(insights::Model),
    NotReady,
}

/// Which prompt strategy a regeneration uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateStrategy {
    /// No previous document: draft from the full transcript history.
    Fresh,
    /// Revise the previously generated content with the new material.
    Incremental,
    /// A human edit is newer than the last regeneration: their content is
    /// the base and must not be discarded.
    ConflictMerge,
}

/// The session insight orchestrator. Constructed once at process start with
/// its providers and passed by reference into the web layer; holds the
/// per-session locks that serialize regeneration.
pub struct Engine {
    generation: Arc<dyn generation::Provider>,
    retrieval: Option<Arc<dyn retrieval::Provider>>,
    generation_policy: GenerationPolicy,
    retrieval_policy: RetrievalPolicy,
    // At most one ensure_insight execution per session may be in flight:
    // two concurrent regenerations would read the same current document and
    // race to upsert, losing one of the updates.
    locks: Mutex<HashMap<Id, Arc<Mutex<()>>>>,
}

impl Engine {
    pub fn new(
        generation: Arc<dyn generation::Provider>,
        retrieval: Option<Arc<dyn retrieval::Provider>>,
        generation_policy: GenerationPolicy,
        retrieval_policy: RetrievalPolicy,
    ) -> Self {
        Self {
            generation,
            retrieval,
            generation_policy,
            retrieval_policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Brings the session's insight document up to date with its transcripts
    /// and returns it. Makes no generation call when nothing new has arrived
    /// (the idempotence guarantee); returns `NotReady` for a session with no
    /// transcribed snippets and no document yet.
    pub async fn ensure_insight(
        &self,
        db: &DatabaseConnection,
        session_id: Id,
    ) -> Result<InsightOutcome, Error> {
        let lock = self.session_lock(session_id).await;
        let guard = lock.lock().await;

        let outcome = self.regenerate(db, session_id).await;

        drop(guard);
        drop(lock);
        self.evict_idle_lock(session_id).await;

        outcome
    }

    async fn regenerate(
        &self,
        db: &DatabaseConnection,
        session_id: Id,
    ) -> Result<InsightOutcome, Error> {
        let session = session::find_by_id(db, session_id).await?;
        let document = insight::find_current_by_session(db, session_id).await?;
        let transcripts = snippet::find_transcribed_by_session(db, session_id, None).await?;

        if transcripts.is_empty() {
            return match document {
                // Stale but valid: nothing to merge, keep what we have
                Some(existing) => Ok(InsightOutcome::Ready(existing)),
                None => Ok(InsightOutcome::NotReady),
            };
        }

        // "New" is defined by store-side modification time relative to the
        // last regeneration, not by snippet identity: a transcript corrected
        // after inclusion is merged again on the next pass.
        let last_llm_update = document.as_ref().and_then(|d| d.llm_updated_at);
        let new_transcripts: Vec<&snippets::Model> = match last_llm_update {
            Some(since) => transcripts.iter().filter(|s| s.updated_at > since).collect(),
            None => transcripts.iter().collect(),
        };

        if new_transcripts.is_empty() {
            if let Some(existing) = &document {
                debug!("No new transcripts for session {session_id}; document unchanged");
                return Ok(InsightOutcome::Ready(existing.clone()));
            }
        }

        let strategy = match &document {
            None => UpdateStrategy::Fresh,
            Some(doc) => {
                if human_edit_pending(doc) {
                    UpdateStrategy::ConflictMerge
                } else {
                    UpdateStrategy::Incremental
                }
            }
        };

        let full_history = joined_text(transcripts.iter());
        let new_material = joined_text(new_transcripts.iter().copied());

        let context = self.retrieve_context(&new_material).await;

        let request = build_generation_request(
            strategy,
            document.as_ref().map(|d| d.content.as_str()),
            &full_history,
            &new_material,
            &context,
            &self.generation_policy,
        );

        debug!("Regenerating document for session {session_id} using {strategy:?}");
        let response = self.generation.generate(request).await?;

        let bullets = extract_bullets(&response);

        if session.name.is_none() {
            self.assign_generated_name(db, &session, &transcripts).await;
        }

        // The newness cutoff for the next poll is the last modification among
        // the transcripts merged here, not this write's own timestamp: a
        // snippet transcribed while this regeneration was running must still
        // count as new material afterwards.
        let generated_through = transcripts
            .iter()
            .map(|s| s.updated_at)
            .max()
            .unwrap_or_else(|| chrono::Utc::now().into());

        let document =
            insight::upsert_generated(db, session_id, response, bullets, generated_through).await?;

        Ok(InsightOutcome::Ready(document))
    }

    async fn session_lock(&self, session_id: Id) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(session_id).or_default().clone()
    }

    /// Removes the session's lock entry when no other task holds a clone of
    /// it. Sessions come and go while the engine lives for the whole process;
    /// without eviction the map gains a permanent entry per session polled.
    async fn evict_idle_lock(&self, session_id: Id) {
        let mut locks = self.locks.lock().await;
        if let Some(entry) = locks.get(&session_id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(&session_id);
            }
        }
    }

    /// Best-effort context retrieval: failures (and an unconfigured provider)
    /// degrade to an empty context and never block regeneration.
    async fn retrieve_context(&self, query: &str) -> Vec<Passage> {
        let Some(retrieval) = &self.retrieval else {
            return Vec::new();
        };

        match retrieval
            .retrieve(
                query,
                self.retrieval_policy.max_results,
                Some(self.retrieval_policy.threshold),
            )
            .await
        {
            Ok(passages) => passages,
            Err(err) => {
                warn!("Context retrieval failed, continuing without context: {err}");
                Vec::new()
            }
        }
    }

    /// Issues the independent one-time naming call. Non-fatal by design: any
    /// failure is logged and the session simply stays unnamed until a later
    /// regeneration tries again.
    async fn assign_generated_name(
        &self,
        db: &DatabaseConnection,
        session: &sessions::Model,
        transcripts: &[snippets::Model],
    ) {
        let earliest = joined_text(transcripts.iter().take(NAMING_TRANSCRIPT_COUNT));
        let request = build_naming_request(&earliest);

        match self.generation.generate(request).await {
            Ok(raw) => {
                let name = strip_surrounding_quotes(raw.trim()).trim().to_string();
                if name.is_empty() {
                    warn!("Naming call for session {} returned nothing", session.id);
                    return;
                }
                if let Err(err) = session::assign_name(db, session.id, name).await {
                    warn!("Failed to store name for session {}: {err}", session.id);
                }
            }
            Err(err) => {
                warn!("Naming call for session {} failed, skipping: {err}", session.id);
            }
        }
    }
}

/// Stores a human edit to the session's document verbatim. No generation
/// happens here; the next regeneration treats the edited content as
/// authoritative and merges new material around it.
pub async fn record_document_edit(
    db: &DatabaseConnection,
    session_id: Id,
    content: String,
) -> Result<insights::Model, Error> {
    if content.trim().is_empty() {
        return Err(Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Invalid,
            )),
        });
    }

    let session = session::find_by_id(db, session_id).await?;
    let document = insight::record_human_edit(db, session.id, content).await?;
    info!("Recorded human edit to document for session {session_id}");

    Ok(document)
}

/// A human edit newer than the last regeneration means the document is
/// user-owned pending merge. A document the model has never written (only a
/// human has) counts as pending too.
fn human_edit_pending(document: &insights::Model) -> bool {
    match (document.user_edited_at, document.llm_updated_at) {
        (Some(edited), Some(updated)) => edited > updated,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn joined_text<'a>(transcripts: impl Iterator<Item = &'a snippets::Model>) -> String {
    transcripts
        .filter_map(|s| s.transcript.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_generation_request(
    strategy: UpdateStrategy,
    previous_content: Option<&str>,
    full_history: &str,
    new_material: &str,
    context: &[Passage],
    policy: &GenerationPolicy,
) -> GenerationRequest {
    let context_block = context_block(context);

    let prompt = match strategy {
        UpdateStrategy::Fresh => format!(
            "Draft the insight document for a meeting in progress.\n\n\
             Start the document with 1-3 short bullet points (\"- \") capturing what matters \
             most right now, followed by any supporting detail. Do not summarize for its own \
             sake; focus on what helps right now.\n\n\
             Transcript so far:\n{full_history}{context_block}"
        ),
        UpdateStrategy::Incremental => format!(
            "Below are the current insight document, the new transcript material that arrived \
             since it was last updated, and the full transcript history.\n\n\
             Revise the document to incorporate the new material. Where the fuller history \
             contradicts earlier assumptions, correct them - do not merely append. Keep the \
             1-3 leading bullet points up to date.\n\n\
             Current document:\n{previous}\n\n\
             New transcripts:\n{new_material}\n\n\
             Full transcript history:\n{full_history}{context_block}",
            previous = previous_content.unwrap_or_default(),
        ),
        UpdateStrategy::ConflictMerge => format!(
            "The user edited the insight document by hand after the last automatic update. \
             Their edits are authoritative.\n\n\
             Using the edited document below as the base, preserve its structure and wording \
             wherever possible. Add only material consistent with the full transcript history, \
             and re-evaluate statements that may rest on stale assumptions now contradicted by \
             the fuller context. Keep the 1-3 leading bullet points up to date.\n\n\
             Edited document:\n{edited}\n\n\
             New transcripts:\n{new_material}\n\n\
             Full transcript history:\n{full_history}{context_block}",
            edited = previous_content.unwrap_or_default(),
        ),
    };

    GenerationRequest {
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ],
        max_tokens: policy.max_tokens,
        temperature: policy.temperature,
    }
}

fn build_naming_request(earliest_transcripts: &str) -> GenerationRequest {
    GenerationRequest {
        messages: vec![
            ChatMessage::system(NAMING_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Suggest a short name, 2 to 6 words, for a meeting that begins like \
                 this:\n\n{earliest_transcripts}\n\nRespond with the name only."
            )),
        ],
        max_tokens: NAMING_MAX_TOKENS,
        temperature: NAMING_TEMPERATURE,
    }
}

fn context_block(context: &[Passage]) -> String {
    if context.is_empty() {
        return String::new();
    }

    let passages = context
        .iter()
        .map(|p| format!("- {}", p.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!("\n\nRelevant context from your documents:\n{passages}")
}

/// Derives the short bullet list from a generated response. Only lines
/// beginning with `-`, `•`, or `N.` count; markers are stripped and at most
/// [`MAX_BULLETS`] are kept. A response with no list-like lines yields the
/// whole trimmed response as a single bullet. The full response always stays
/// in the document content; bullets are display convenience only.
pub fn extract_bullets(response: &str) -> Vec<String> {
    let bullets: Vec<String> = response
        .lines()
        .map(str::trim)
        .filter_map(strip_bullet_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .take(MAX_BULLETS)
        .collect();

    if bullets.is_empty() {
        vec![response.trim().to_string()]
    } else {
        bullets
    }
}

fn strip_bullet_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix('-').or_else(|| line.strip_prefix('•')) {
        return Some(rest.trim_start());
    }

    // Numbered list items: "1. buy milk"
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix('.') {
            return Some(rest.trim_start());
        }
    }

    None
}

fn strip_surrounding_quotes(name: &str) -> &str {
    name.trim_matches(|c| c == '"' || c == '\'')
}


#[cfg(test)]
// Engine tests need seaORM's MockDatabase, which is gated behind the `mock`
// feature because enabling it removes DatabaseConnection's Clone impl.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod engine_tests {
    use super::*;
    use copilot_ai::traits::generation::MockProvider as MockGeneration;
    use copilot_ai::traits::retrieval::MockProvider as MockRetrieval;
    use copilot_ai::Error as AiError;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Mutex as StdMutex;

    fn generation_policy() -> GenerationPolicy {
        GenerationPolicy {
            max_tokens: 800,
            temperature: 0.7,
        }
    }

    fn retrieval_policy() -> RetrievalPolicy {
        RetrievalPolicy {
            max_results: 3,
            threshold: 0.7,
        }
    }

    fn engine(generation: MockGeneration) -> Engine {
        Engine::new(
            Arc::new(generation),
            None,
            generation_policy(),
            retrieval_policy(),
        )
    }

    fn engine_with_retrieval(generation: MockGeneration, retrieval: MockRetrieval) -> Engine {
        Engine::new(
            Arc::new(generation),
            Some(Arc::new(retrieval)),
            generation_policy(),
            retrieval_policy(),
        )
    }

    fn session_row(id: Id, name: Option<&str>) -> sessions::Model {
        let now = chrono::Utc::now();
        sessions::Model {
            id,
            user_id: Id::new_v4(),
            name: name.map(str::to_string),
            started_at: now.into(),
            ended_at: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn transcribed_snippet(
        session_id: Id,
        offset_secs: i64,
        text: &str,
    ) -> snippets::Model {
        let base = chrono::Utc::now() - chrono::Duration::hours(1);
        let at = base + chrono::Duration::seconds(offset_secs);
        snippets::Model {
            id: Id::new_v4(),
            session_id,
            captured_at: at.into(),
            duration_seconds: 60,
            transcript: Some(text.to_string()),
            language: Some("en".to_string()),
            created_at: at.into(),
            updated_at: at.into(),
        }
    }

    fn document_row(
        session_id: Id,
        content: &str,
        llm_updated_at: Option<chrono::DateTime<chrono::Utc>>,
        user_edited_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> insights::Model {
        let now = chrono::Utc::now();
        insights::Model {
            id: Id::new_v4(),
            session_id,
            content: content.to_string(),
            bullets: serde_json::json!(["existing point"]),
            llm_updated_at: llm_updated_at.map(Into::into),
            user_edited_at: user_edited_at.map(Into::into),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    /// A generation mock that records every request it receives and answers
    /// document calls and naming calls differently (naming calls are the
    /// ones with the small max_tokens budget).
    fn recording_generation(
        document_response: &str,
        naming_response: Option<&str>,
    ) -> (MockGeneration, Arc<StdMutex<Vec<GenerationRequest>>>) {
        let requests: Arc<StdMutex<Vec<GenerationRequest>>> = Arc::default();
        let seen = requests.clone();
        let document_response = document_response.to_string();
        let naming_response = naming_response.map(str::to_string);

        let mut generation = MockGeneration::new();
        generation.expect_generate().returning(move |request| {
            let is_naming = request.max_tokens == NAMING_MAX_TOKENS;
            seen.lock().unwrap().push(request);
            if is_naming {
                match &naming_response {
                    Some(name) => Ok(name.clone()),
                    None => Err(AiError::Provider("naming unavailable".to_string())),
                }
            } else {
                Ok(document_response.clone())
            }
        });

        (generation, requests)
    }

    #[tokio::test]
    async fn not_ready_when_no_transcripts_and_no_document() -> Result<(), Error> {
        let session_id = Id::new_v4();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, None)]])
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![Vec::<snippets::Model>::new()])
            .into_connection();

        let mut generation = MockGeneration::new();
        generation.expect_generate().times(0);

        let outcome = engine(generation).ensure_insight(&db, session_id).await?;

        assert_eq!(outcome, InsightOutcome::NotReady);

        Ok(())
    }

    #[tokio::test]
    async fn stale_document_is_returned_when_no_transcripts_exist() -> Result<(), Error> {
        let session_id = Id::new_v4();
        let existing = document_row(session_id, "Old summary", Some(chrono::Utc::now()), None);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, Some("Named"))]])
            .append_query_results(vec![vec![existing.clone()]])
            .append_query_results(vec![Vec::<snippets::Model>::new()])
            .into_connection();

        let mut generation = MockGeneration::new();
        generation.expect_generate().times(0);

        let outcome = engine(generation).ensure_insight(&db, session_id).await?;

        assert_eq!(outcome, InsightOutcome::Ready(existing));

        Ok(())
    }

    #[tokio::test]
    async fn no_new_transcripts_returns_document_without_generation() -> Result<(), Error> {
        let session_id = Id::new_v4();
        let snippets = vec![
            transcribed_snippet(session_id, 0, "intro"),
            transcribed_snippet(session_id, 60, "topic A"),
        ];
        // Regenerated after every snippet's last modification
        let existing = document_row(
            session_id,
            "Summary of intro and topic A",
            Some(chrono::Utc::now()),
            None,
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, Some("Named"))]])
            .append_query_results(vec![vec![existing.clone()]])
            .append_query_results(vec![snippets])
            .into_connection();

        let mut generation = MockGeneration::new();
        generation.expect_generate().times(0);

        let outcome = engine(generation).ensure_insight(&db, session_id).await?;

        // Idempotence: the identical document back, zero generation calls
        assert_eq!(outcome, InsightOutcome::Ready(existing));

        Ok(())
    }

    #[tokio::test]
    async fn fresh_generation_uses_full_history_and_assigns_a_name() -> Result<(), Error> {
        let session_id = Id::new_v4();
        let unnamed = session_row(session_id, None);
        let named = session_row(session_id, Some("Quick sync"));
        let snippets = vec![
            transcribed_snippet(session_id, 0, "intro"),
            transcribed_snippet(session_id, 60, "topic A"),
            transcribed_snippet(session_id, 120, "topic A cont."),
        ];
        let created = document_row(
            session_id,
            "- first point\nDetail",
            Some(chrono::Utc::now()),
            None,
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![unnamed.clone()]])
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![snippets])
            // assign_name: lookup, then the update
            .append_query_results(vec![vec![unnamed]])
            .append_query_results(vec![vec![named]])
            // upsert_generated: current-document lookup, then the insert
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![vec![created.clone()]])
            .into_connection();

        let (generation, requests) =
            recording_generation("- first point\nDetail", Some("\"Quick sync\""));

        let outcome = engine(generation).ensure_insight(&db, session_id).await?;

        assert_eq!(outcome, InsightOutcome::Ready(created));

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);

        // The document prompt sees the entire transcript history
        let document_prompt = &requests[0].messages[1].content;
        assert!(document_prompt.contains("intro"));
        assert!(document_prompt.contains("topic A cont."));
        // Fresh drafts never reference previous content
        assert!(!document_prompt.contains("Current document:"));
        assert!(!document_prompt.contains("Edited document:"));

        // The naming prompt is seeded from the earliest transcripts
        let naming_prompt = &requests[1].messages[1].content;
        assert!(naming_prompt.contains("intro"));
        assert_eq!(requests[1].max_tokens, NAMING_MAX_TOKENS);

        Ok(())
    }

    #[tokio::test]
    async fn incremental_update_passes_only_new_material_as_new() -> Result<(), Error> {
        let session_id = Id::new_v4();
        let last_update = chrono::Utc::now() - chrono::Duration::minutes(5);
        let mut all = vec![
            transcribed_snippet(session_id, 0, "intro"),
            transcribed_snippet(session_id, 60, "topic A"),
            transcribed_snippet(session_id, 120, "topic A cont."),
        ];
        // A fourth chunk transcribed after the last regeneration
        let mut fresh = transcribed_snippet(session_id, 180, "topic B");
        fresh.updated_at = chrono::Utc::now().into();
        all.push(fresh);

        let existing = document_row(session_id, "Summary so far", Some(last_update), None);
        let updated = document_row(
            session_id,
            "Summary including topic B",
            Some(chrono::Utc::now()),
            None,
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, Some("Named"))]])
            .append_query_results(vec![vec![existing.clone()]])
            .append_query_results(vec![all])
            // upsert_generated: current-document lookup, then the update
            .append_query_results(vec![vec![existing]])
            .append_query_results(vec![vec![updated.clone()]])
            .into_connection();

        let (generation, requests) = recording_generation("Summary including topic B", None);

        let outcome = engine(generation).ensure_insight(&db, session_id).await?;

        assert_eq!(outcome, InsightOutcome::Ready(updated));

        let requests = requests.lock().unwrap();
        // The session already has a name: exactly one generation call
        assert_eq!(requests.len(), 1);

        let prompt = &requests[0].messages[1].content;
        assert!(prompt.contains("Current document:\nSummary so far"));
        // Only topic B is new material, but the full history is supplied too
        let new_section = prompt
            .split("New transcripts:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nFull transcript history:").next())
            .unwrap();
        assert_eq!(new_section, "topic B");
        assert!(prompt.contains("Full transcript history:\nintro\ntopic A\ntopic A cont.\ntopic B"));

        Ok(())
    }

    #[tokio::test]
    async fn conflict_merge_wins_when_human_edit_is_newer() -> Result<(), Error> {
        let session_id = Id::new_v4();
        let llm_at = chrono::Utc::now() - chrono::Duration::minutes(10);
        let edited_at = chrono::Utc::now() - chrono::Duration::minutes(2);
        let mut snippet = transcribed_snippet(session_id, 0, "late-arriving material");
        snippet.updated_at = chrono::Utc::now().into();

        let existing = document_row(session_id, "My edited notes", Some(llm_at), Some(edited_at));
        let merged = document_row(
            session_id,
            "My edited notes plus new material",
            Some(chrono::Utc::now()),
            Some(edited_at),
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, Some("Named"))]])
            .append_query_results(vec![vec![existing.clone()]])
            .append_query_results(vec![vec![snippet]])
            .append_query_results(vec![vec![existing]])
            .append_query_results(vec![vec![merged.clone()]])
            .into_connection();

        let (generation, requests) =
            recording_generation("My edited notes plus new material", None);

        let outcome = engine(generation).ensure_insight(&db, session_id).await?;

        assert_eq!(outcome, InsightOutcome::Ready(merged));

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);

        // The conflict strategy is observable through the prompt: the
        // human-edited content is the base, not merely previous content
        let prompt = &requests[0].messages[1].content;
        assert!(prompt.contains("edited the insight document by hand"));
        assert!(prompt.contains("Edited document:\nMy edited notes"));
        assert!(!prompt.contains("Current document:"));

        Ok(())
    }

    #[tokio::test]
    async fn human_only_document_takes_the_conflict_path() -> Result<(), Error> {
        let session_id = Id::new_v4();
        // A document the model has never written: llm_updated_at is null
        let existing = document_row(
            session_id,
            "Notes typed before any chunk was transcribed",
            None,
            Some(chrono::Utc::now()),
        );
        let snippet = transcribed_snippet(session_id, 0, "first transcribed chunk");
        let merged = document_row(
            session_id,
            "Merged",
            Some(chrono::Utc::now()),
            Some(chrono::Utc::now()),
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, Some("Named"))]])
            .append_query_results(vec![vec![existing.clone()]])
            .append_query_results(vec![vec![snippet]])
            .append_query_results(vec![vec![existing]])
            .append_query_results(vec![vec![merged.clone()]])
            .into_connection();

        let (generation, requests) = recording_generation("Merged", None);

        let outcome = engine(generation).ensure_insight(&db, session_id).await?;

        assert_eq!(outcome, InsightOutcome::Ready(merged));
        let requests = requests.lock().unwrap();
        assert!(requests[0].messages[1]
            .content
            .contains("Edited document:\nNotes typed before any chunk was transcribed"));

        Ok(())
    }

    #[tokio::test]
    async fn naming_failure_is_not_fatal() -> Result<(), Error> {
        let session_id = Id::new_v4();
        let snippet = transcribed_snippet(session_id, 0, "intro");
        let created = document_row(session_id, "Draft", Some(chrono::Utc::now()), None);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, None)]])
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![vec![snippet]])
            // naming fails before any session query, so the next queries are
            // the upsert's lookup and insert
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![vec![created.clone()]])
            .into_connection();

        let (generation, requests) = recording_generation("Draft", None);

        let outcome = engine(generation).ensure_insight(&db, session_id).await?;

        assert_eq!(outcome, InsightOutcome::Ready(created));
        // Both the document call and the failed naming call happened
        assert_eq!(requests.lock().unwrap().len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn retrieval_failure_is_swallowed_and_context_omitted() -> Result<(), Error> {
        let session_id = Id::new_v4();
        let snippet = transcribed_snippet(session_id, 0, "intro");
        let created = document_row(session_id, "Draft", Some(chrono::Utc::now()), None);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, Some("Named"))]])
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![vec![snippet]])
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![vec![created.clone()]])
            .into_connection();

        let mut retrieval = MockRetrieval::new();
        retrieval
            .expect_retrieve()
            .times(1)
            .returning(|_, _, _| Err(AiError::Network("connection refused".to_string())));

        let (generation, requests) = recording_generation("Draft", None);

        let outcome = engine_with_retrieval(generation, retrieval)
            .ensure_insight(&db, session_id)
            .await?;

        assert_eq!(outcome, InsightOutcome::Ready(created));
        assert!(!requests.lock().unwrap()[0].messages[1]
            .content
            .contains("Relevant context"));

        Ok(())
    }

    #[tokio::test]
    async fn retrieved_passages_are_appended_to_the_prompt() -> Result<(), Error> {
        let session_id = Id::new_v4();
        let snippet = transcribed_snippet(session_id, 0, "budget review");
        let created = document_row(session_id, "Draft", Some(chrono::Utc::now()), None);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, Some("Named"))]])
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![vec![snippet]])
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![vec![created.clone()]])
            .into_connection();

        let mut retrieval = MockRetrieval::new();
        retrieval
            .expect_retrieve()
            .withf(|query, max_results, threshold| {
                query.contains("budget review") && *max_results == 3 && *threshold == Some(0.7)
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![Passage {
                    content: "Q3 budget spreadsheet".to_string(),
                    score: 0.91,
                    source: Some("budget.xlsx".to_string()),
                }])
            });

        let (generation, requests) = recording_generation("Draft", None);

        let outcome = engine_with_retrieval(generation, retrieval)
            .ensure_insight(&db, session_id)
            .await?;

        assert_eq!(outcome, InsightOutcome::Ready(created));
        let prompt = &requests.lock().unwrap()[0].messages[1].content;
        assert!(prompt.contains("Relevant context from your documents:"));
        assert!(prompt.contains("- Q3 budget spreadsheet"));

        Ok(())
    }

    #[tokio::test]
    async fn blank_document_edits_are_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let err = record_document_edit(&db, Id::new_v4(), "   \n".to_string())
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Invalid))
        );
    }

    #[tokio::test]
    async fn generation_failure_aborts_the_update() {
        let session_id = Id::new_v4();
        let snippet = transcribed_snippet(session_id, 0, "intro");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, Some("Named"))]])
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![vec![snippet]])
            .into_connection();

        let mut generation = MockGeneration::new();
        generation
            .expect_generate()
            .times(1)
            .returning(|_| Err(AiError::Network("model unreachable".to_string())));

        let result = engine(generation).ensure_insight(&db, session_id).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn transcripts_landing_during_a_regeneration_are_merged_on_the_next_poll(
    ) -> Result<(), Error> {
        let session_id = Id::new_v4();
        let t0 = chrono::Utc::now() - chrono::Duration::minutes(10);

        let mut first = transcribed_snippet(session_id, 0, "topic A");
        first.updated_at = t0.into();
        // Transcribed two seconds later, while the previous regeneration was
        // still running; its row was modified before the document row was
        // written
        let mut midflight = transcribed_snippet(session_id, 60, "topic B");
        midflight.updated_at = (t0 + chrono::Duration::seconds(2)).into();

        // The previous pass stamped llm_updated_at with the newest transcript
        // it merged (topic A's), not with its own later write time, so the
        // midflight transcript still reads as new material
        let existing = document_row(session_id, "Summary of topic A", Some(t0), None);
        let updated = document_row(
            session_id,
            "Summary of topics A and B",
            Some(chrono::Utc::now()),
            None,
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, Some("Named"))]])
            .append_query_results(vec![vec![existing.clone()]])
            .append_query_results(vec![vec![first, midflight]])
            .append_query_results(vec![vec![existing]])
            .append_query_results(vec![vec![updated.clone()]])
            .into_connection();

        let (generation, requests) = recording_generation("Summary of topics A and B", None);

        let outcome = engine(generation).ensure_insight(&db, session_id).await?;

        assert_eq!(outcome, InsightOutcome::Ready(updated));

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);

        let prompt = &requests[0].messages[1].content;
        let new_section = prompt
            .split("New transcripts:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nFull transcript history:").next())
            .unwrap();
        assert_eq!(new_section, "topic B");

        Ok(())
    }

    #[tokio::test]
    async fn session_locks_are_evicted_once_idle() -> Result<(), Error> {
        let session_id = Id::new_v4();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![session_row(session_id, None)]])
            .append_query_results(vec![Vec::<insights::Model>::new()])
            .append_query_results(vec![Vec::<snippets::Model>::new()])
            .into_connection();

        let mut generation = MockGeneration::new();
        generation.expect_generate().times(0);

        let engine = engine(generation);
        let outcome = engine.ensure_insight(&db, session_id).await?;

        assert_eq!(outcome, InsightOutcome::NotReady);
        // No waiter left behind: the lock entry is gone, not merely unlocked
        assert!(engine.locks.lock().await.is_empty());

        Ok(())
    }
}
