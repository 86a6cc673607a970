//! Bounded per-(agent, session) conversation history with idle expiry.
//!
//! Expired sessions are swept lazily on access; no background timer runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use switchyard_config::SessionConfig;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionTurn {
    pub user_message: String,
    pub assistant_response: String,
    pub tools_used: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
}

impl SessionTurn {
    pub fn new(
        user_message: impl Into<String>,
        assistant_response: impl Into<String>,
        tools_used: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            user_message: user_message.into(),
            assistant_response: assistant_response.into(),
            tools_used: tools_used.into_iter().collect(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// Oldest first, never longer than the manager's `max_history`
    pub turns: VecDeque<SessionTurn>,
    #[serde(skip)]
    last_seen: Instant,
}

impl Session {
    fn new(id: String, agent_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            agent_id,
            created_at: now,
            last_activity_at: now,
            turns: VecDeque::new(),
            last_seen: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_activity_at = Utc::now();
        self.last_seen = Instant::now();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub max_history: usize,
    pub idle_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            max_history: config.max_history,
            idle_timeout: config.idle_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub total_turns: usize,
}

type SessionKey = (String, String);

fn key(agent_id: &str, session_id: &str) -> SessionKey {
    (agent_id.to_string(), session_id.to_string())
}

pub struct SessionManager {
    sessions: Mutex<HashMap<SessionKey, Session>>,
    options: SessionOptions,
}

impl SessionManager {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            options,
        }
    }

    /// Lock the table and drop sessions idle longer than the timeout.
    fn swept(&self) -> MutexGuard<'_, HashMap<SessionKey, Session>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let timeout = self.options.idle_timeout;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_seen.elapsed() <= timeout);
        let expired = before - sessions.len();
        if expired > 0 {
            debug!(expired, "Expired idle sessions");
        }
        sessions
    }

    /// Return the session for `(agent_id, session_id)`, creating it if
    /// needed. A missing `session_id` allocates a fresh one.
    pub fn get_or_create(&self, session_id: Option<&str>, agent_id: &str) -> Session {
        let mut sessions = self.swept();
        let session_id = session_id
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let session = sessions
            .entry(key(agent_id, &session_id))
            .and_modify(Session::touch)
            .or_insert_with(|| {
                debug!(agent_id = %agent_id, session_id = %session_id, "Created session");
                Session::new(session_id.clone(), agent_id.to_string())
            });
        session.clone()
    }

    /// Append a turn, keeping only the most recent `max_history`. Returns
    /// `false` (and creates nothing) when the session does not exist.
    pub fn add_turn(&self, session_id: &str, turn: SessionTurn, agent_id: &str) -> bool {
        let mut sessions = self.swept();
        let Some(session) = sessions.get_mut(&key(agent_id, session_id)) else {
            warn!(agent_id = %agent_id, session_id = %session_id, "add_turn on unknown session ignored");
            return false;
        };

        session.turns.push_back(turn);
        while session.turns.len() > self.options.max_history {
            session.turns.pop_front();
        }
        session.touch();
        true
    }

    pub fn get_session(&self, session_id: &str, agent_id: &str) -> Option<Session> {
        self.swept().get(&key(agent_id, session_id)).cloned()
    }

    /// Turns of a session, oldest first.
    pub fn history(&self, session_id: &str, agent_id: &str) -> Vec<SessionTurn> {
        self.swept()
            .get(&key(agent_id, session_id))
            .map(|s| s.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn delete_session(&self, session_id: &str, agent_id: &str) -> bool {
        self.swept().remove(&key(agent_id, session_id)).is_some()
    }

    /// Session ids of an agent, sorted.
    pub fn list_sessions(&self, agent_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .swept()
            .keys()
            .filter(|(agent, _)| agent == agent_id)
            .map(|(_, session)| session.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn get_stats(&self) -> SessionStats {
        let sessions = self.swept();
        SessionStats {
            active_sessions: sessions.len(),
            total_turns: sessions.values().map(|s| s.turns.len()).sum(),
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}
