//! Host agent runtime boundary.
//!
//! Huddle never touches the host runtime's message or transcript storage
//! format directly. Everything it needs is behind this trait: inject a
//! follow-up prompt into a session, read the session's transcript text, and
//! check whether the session still exists.

use async_trait::async_trait;

use crate::error::Result;

/// Capabilities huddle consumes from the embedding agent runtime.
#[async_trait]
pub trait HostRuntime: Send + Sync {
    /// Send a follow-up prompt into an existing session.
    async fn send_prompt(&self, session_id: &str, prompt: &str) -> Result<()>;

    /// Read the latest transcript text of a session.
    async fn read_transcript(&self, session_id: &str) -> Result<String>;

    /// Whether the session is still alive on the host.
    async fn session_exists(&self, session_id: &str) -> Result<bool>;
}

/// In-memory host runtime for tests: scripted transcripts, recorded prompts.
#[derive(Debug, Default)]
pub struct MockHost {
    sessions: std::sync::Mutex<std::collections::HashMap<String, MockSession>>,
}

#[derive(Debug, Default, Clone)]
struct MockSession {
    transcript: String,
    prompts: Vec<String>,
    alive: bool,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live session with an initial transcript.
    pub fn add_session(&self, session_id: &str, transcript: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(
            session_id.to_string(),
            MockSession {
                transcript: transcript.to_string(),
                prompts: Vec::new(),
                alive: true,
            },
        );
    }

    /// Replace a session's transcript, simulating a completed turn.
    pub fn set_transcript(&self, session_id: &str, transcript: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = sessions.get_mut(session_id) {
            session.transcript = transcript.to_string();
        }
    }

    /// Mark a session dead, simulating a host-side teardown.
    pub fn kill_session(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = sessions.get_mut(session_id) {
            session.alive = false;
        }
    }

    /// Prompts injected into a session so far, oldest first.
    pub fn sent_prompts(&self, session_id: &str) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id)
            .map(|s| s.prompts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HostRuntime for MockHost {
    async fn send_prompt(&self, session_id: &str, prompt: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get_mut(session_id) {
            Some(session) if session.alive => {
                session.prompts.push(prompt.to_string());
                Ok(())
            }
            _ => Err(crate::error::HuddleError::InvalidState(format!(
                "No live session: {}",
                session_id
            ))),
        }
    }

    async fn read_transcript(&self, session_id: &str) -> Result<String> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sessions
            .get(session_id)
            .map(|s| s.transcript.clone())
            .unwrap_or_default())
    }

    async fn session_exists(&self, session_id: &str) -> Result<bool> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sessions.get(session_id).map(|s| s.alive).unwrap_or(false))
    }
}
