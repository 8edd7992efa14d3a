//! Per-browser-session transcripts.
//!
//! A [`ChatSession`] is an append-only list of [`Message`]s seeded with a
//! greeting, plus the state of the turn currently in flight. The
//! [`SessionStore`] hands out independent sessions keyed by a random id; the
//! only thing sessions share is the memoized context blob, which lives
//! elsewhere.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use crate::core::constants::{APOLOGY, GREETING};
use crate::core::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse,
}

/// How a turn ended. A failed turn records the fixed apology instead of any
/// partial text that may already have been shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Success(String),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A message was submitted while the previous reply was still streaming.
    Busy,
    /// The submitted message was empty after trimming.
    EmptyMessage,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Busy => write!(f, "a reply is still being generated"),
            SessionError::EmptyMessage => write!(f, "message is empty"),
        }
    }
}

impl Error for SessionError {}

#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<Message>,
    state: TurnState,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
            state: TurnState::Idle,
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    #[cfg(test)]
    pub(crate) fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Records the user's message and marks the session as awaiting a reply.
    pub fn begin_turn(&mut self, text: &str) -> Result<(), SessionError> {
        if self.state == TurnState::AwaitingResponse {
            return Err(SessionError::Busy);
        }
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.append(Message::user(text));
        self.state = TurnState::AwaitingResponse;
        Ok(())
    }

    /// Records the assistant side of the turn and returns to idle.
    pub fn finish_turn(&mut self, outcome: TurnOutcome) -> &Message {
        let reply = match outcome {
            TurnOutcome::Success(text) => Message::assistant(text),
            TurnOutcome::Failed => Message::assistant(APOLOGY),
        };
        self.append(reply);
        self.state = TurnState::Idle;
        &self.messages[self.messages.len() - 1]
    }
}

/// Opaque session identifier: a random v4 UUID without hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type SharedSession = Arc<Mutex<ChatSession>>;

/// Sessions untouched for this long are dropped on the next [`SessionStore::create`].
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

struct StoreEntry {
    session: SharedSession,
    last_touched: Instant,
}

/// In-memory registry of live sessions. Nothing is written to disk; sessions
/// disappear when they go idle or when the process exits.
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, StoreEntry>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_idle_timeout(SESSION_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn create(&self) -> (SessionId, SharedSession) {
        self.evict_idle(self.idle_timeout);

        let id = SessionId::generate();
        let session = Arc::new(Mutex::new(ChatSession::new()));
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.clone(),
                StoreEntry {
                    session: Arc::clone(&session),
                    last_touched: Instant::now(),
                },
            );
        (id, session)
    }

    /// Looks a session up and marks it as recently used.
    pub fn get(&self, id: &SessionId) -> Option<SharedSession> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions.get_mut(id)?;
        entry.last_touched = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    /// Drops sessions idle for at least `max_idle`. Sessions waiting on a reply
    /// are kept regardless. Returns how many were removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_as_of(Instant::now(), max_idle)
    }

    fn evict_idle_as_of(&self, now: Instant, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, entry| {
            if now.saturating_duration_since(entry.last_touched) < max_idle {
                return true;
            }
            let state = entry
                .session
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .state();
            state == TurnState::AwaitingResponse
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "evicted idle sessions");
        }
        evicted
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
