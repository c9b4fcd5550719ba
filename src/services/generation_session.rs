use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::question::QuizQuestion;
use crate::models::section::{SectionKind, SectionStatus};
use crate::services::quiz_generator::{GeneratedSection, SectionContext, SectionGenerator};
use crate::services::word_assignment::assign_words;
use crate::utils::text::dedupe_words;

#[derive(Debug, Clone, Serialize)]
pub struct SectionState {
    pub section: SectionKind,
    pub status: SectionStatus,
    pub words: Vec<String>,
    pub questions: Vec<QuizQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub model: Option<String>,
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SectionState {
    fn pending(section: SectionKind, words: Vec<String>) -> Self {
        Self {
            section,
            status: SectionStatus::Pending,
            words,
            questions: vec![],
            error: None,
            model: None,
            attempts: 0,
            started_at: None,
            finished_at: None,
        }
    }
}

/// The three section states, serialized as a map keyed by section name.
#[derive(Debug, Clone)]
pub struct Sections([SectionState; 3]);

impl Sections {
    pub fn get(&self, section: SectionKind) -> &SectionState {
        &self.0[section.index()]
    }

    fn get_mut(&mut self, section: SectionKind) -> &mut SectionState {
        &mut self.0[section.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionState> {
        self.0.iter()
    }
}

impl Serialize for Sections {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for state in &self.0 {
            map.serialize_entry(state.section.key(), state)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationSession {
    pub id: Uuid,
    pub words: Vec<String>,
    pub sections: Sections,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl GenerationSession {
    pub fn is_settled(&self) -> bool {
        self.sections.iter().all(|s| s.status.is_settled())
    }
}

type SessionMap = HashMap<Uuid, GenerationSession>;

/// In-memory registry of quiz generation sessions.
///
/// Sections 1 and 2 start as soon as a session is created; section 3 starts
/// when section 2 settles. Each session is dropped by a one-shot timer once
/// its TTL elapses.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<Mutex<SessionMap>>,
    generator: Arc<dyn SectionGenerator>,
    ttl: Duration,
    max_words: usize,
}

impl SessionManager {
    pub fn new(generator: Arc<dyn SectionGenerator>, ttl: Duration, max_words: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            generator,
            ttl,
            max_words,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn create(&self, words: Vec<String>) -> Result<GenerationSession> {
        let words = dedupe_words(words);
        if words.is_empty() {
            return Err(Error::BadRequest(
                "At least one non-empty word is required".to_string(),
            ));
        }
        if words.len() > self.max_words {
            return Err(Error::BadRequest(format!(
                "At most {} distinct words are allowed, got {}",
                self.max_words,
                words.len()
            )));
        }

        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| Error::Internal(format!("Invalid session TTL: {}", e)))?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        let [first, second, third] = assign_words(&words).into_inner();

        let session = GenerationSession {
            id,
            words,
            sections: Sections([
                SectionState::pending(SectionKind::DefinitionChoice, first),
                SectionState::pending(SectionKind::SentenceChoice, second),
                SectionState::pending(SectionKind::SentenceFillIn, third),
            ]),
            created_at: now,
            expires_at: now + ttl,
        };

        lock(&self.sessions).insert(id, session);
        self.schedule_expiry(id);
        tracing::info!(session_id = %id, ttl_secs = self.ttl.as_secs(), "generation session created");

        for section in SectionKind::ALL {
            if section.depends_on().is_none() {
                self.start_section(id, section, &[SectionStatus::Pending])?;
            }
        }

        self.get(id)
    }

    pub fn get(&self, id: Uuid) -> Result<GenerationSession> {
        let mut sessions = lock(&self.sessions);
        live_session(&mut sessions, id).map(|s| s.clone())
    }

    pub fn get_section(&self, id: Uuid, section: SectionKind) -> Result<SectionState> {
        let mut sessions = lock(&self.sessions);
        live_session(&mut sessions, id).map(|s| s.sections.get(section).clone())
    }

    /// Regenerates one section that has already settled. Sections that depend
    /// on it are left alone.
    pub fn retry(&self, id: Uuid, section: SectionKind) -> Result<SectionState> {
        let state = self.start_section(
            id,
            section,
            &[SectionStatus::Error, SectionStatus::Ready],
        )?;
        tracing::info!(session_id = %id, section = %section, attempt = state.attempts, "section retry started");
        Ok(state)
    }

    fn start_section(
        &self,
        id: Uuid,
        section: SectionKind,
        allowed_from: &[SectionStatus],
    ) -> Result<SectionState> {
        let (snapshot, context) = {
            let mut sessions = lock(&self.sessions);
            let session = live_session(&mut sessions, id)?;

            let context = match section.depends_on() {
                Some(dep) => {
                    let dep_state = session.sections.get(dep);
                    SectionContext {
                        avoid_sentences: match dep_state.status {
                            SectionStatus::Ready => {
                                dep_state.questions.iter().map(|q| q.prompt.clone()).collect()
                            }
                            _ => vec![],
                        },
                    }
                }
                None => SectionContext::default(),
            };

            let state = session.sections.get_mut(section);
            if !allowed_from.contains(&state.status) {
                return Err(Error::Conflict(format!(
                    "Section {} is {:?} and cannot be started",
                    section,
                    state.status
                )));
            }

            state.status = SectionStatus::Generating;
            state.attempts += 1;
            state.questions.clear();
            state.error = None;
            state.model = None;
            state.started_at = Some(Utc::now());
            state.finished_at = None;
            (state.clone(), context)
        };

        tokio::spawn(self.clone().run_section(
            id,
            section,
            snapshot.attempts,
            snapshot.words.clone(),
            context,
        ));

        Ok(snapshot)
    }

    async fn run_section(
        self,
        id: Uuid,
        section: SectionKind,
        attempt: u32,
        words: Vec<String>,
        context: SectionContext,
    ) {
        tracing::debug!(session_id = %id, section = %section, attempt, words = words.len(), "section generation started");

        let generator = self.generator.clone();
        let outcome = tokio::spawn(async move { generator.generate(section, &words, &context).await })
            .await
            .unwrap_or_else(|e| Err(Error::Internal(format!("generation task failed: {}", e))));

        let dependents: Vec<SectionKind> = {
            let mut sessions = lock(&self.sessions);
            let Ok(session) = live_session(&mut sessions, id) else {
                tracing::debug!(session_id = %id, section = %section, "session gone before section finished, result dropped");
                return;
            };

            let state = session.sections.get_mut(section);
            if state.attempts != attempt || state.status != SectionStatus::Generating {
                return;
            }
            apply_outcome(state, outcome);
            match state.status {
                SectionStatus::Ready => tracing::info!(
                    session_id = %id,
                    section = %section,
                    questions = state.questions.len(),
                    model = state.model.as_deref().unwrap_or("-"),
                    "section ready"
                ),
                _ => tracing::error!(
                    session_id = %id,
                    section = %section,
                    error = state.error.as_deref().unwrap_or(""),
                    "section generation failed"
                ),
            }

            SectionKind::ALL
                .into_iter()
                .filter(|s| s.depends_on() == Some(section))
                .filter(|s| session.sections.get(*s).status == SectionStatus::Pending)
                .collect()
        };

        for dependent in dependents {
            if let Err(e) = self.start_section(id, dependent, &[SectionStatus::Pending]) {
                tracing::warn!(session_id = %id, section = %dependent, error = %e, "dependent section did not start");
            }
        }
    }

    fn schedule_expiry(&self, id: Uuid) {
        let sessions = self.sessions.clone();
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if lock(&sessions).remove(&id).is_some() {
                tracing::info!(session_id = %id, "generation session expired");
            }
        });
    }
}

fn apply_outcome(state: &mut SectionState, outcome: Result<GeneratedSection>) {
    state.finished_at = Some(Utc::now());
    match outcome {
        Ok(generated) => {
            state.status = SectionStatus::Ready;
            state.questions = generated.questions;
            state.model = generated.model;
        }
        Err(e) => {
            state.status = SectionStatus::Error;
            state.error = Some(e.to_string());
        }
    }
}

fn lock(sessions: &Mutex<SessionMap>) -> MutexGuard<'_, SessionMap> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

fn live_session(sessions: &mut SessionMap, id: Uuid) -> Result<&mut GenerationSession> {
    let expired = match sessions.get(&id) {
        Some(session) => session.expires_at <= Utc::now(),
        None => return Err(not_found(id)),
    };
    if expired {
        sessions.remove(&id);
        return Err(not_found(id));
    }
    sessions.get_mut(&id).ok_or_else(|| not_found(id))
}

fn not_found(id: Uuid) -> Error {
    Error::NotFound(format!("Generation session {} not found or expired", id))
}
