//! # Session store
//!
//! Minimal per-conversation state, kept in memory only.
//!
//! ## Stages
//! - [`Stage::Initial`]: the first message is parsed as a comma-separated symptom
//!   list, then the session moves to `Diagnosis` unconditionally.
//! - [`Stage::Diagnosis`]: every later message is free text, stored under
//!   `patient_info["additional_info"]`. There is no further stage.
//!
//! ## Concurrency
//! Each session sits behind its own `tokio::sync::Mutex`. The conversation
//! pipeline holds that lock for a whole turn, so two turns on the same id run one
//! after the other and neither overwrites the other's update. Different sessions
//! never contend beyond the brief map lookup.
//!
//! ## Expiry
//! Sessions idle for longer than the configured TTL are dropped, either by
//! [`SessionStore::evict_expired`] (run periodically by the server) or lazily
//! when the id is next used.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::prompts::PatientSnapshot;

/// Key under which diagnosis-stage messages are stored.
pub const ADDITIONAL_INFO: &str = "additional_info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Initial,
    Diagnosis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::Diagnosis => "diagnosis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a first message into symptoms: comma separated, trimmed, empties dropped.
pub fn parse_symptom_list(message: &str) -> Vec<String> {
    message
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub symptoms: Vec<String>,
    pub patient_info: Map<String, Value>,
    pub stage: Stage,
}

impl SessionState {
    /// Apply one user message according to the current stage.
    pub fn absorb_message(&mut self, message: &str) {
        match self.stage {
            Stage::Initial => {
                self.symptoms = parse_symptom_list(message);
                self.stage = Stage::Diagnosis;
            }
            Stage::Diagnosis => {
                self.patient_info
                    .insert(ADDITIONAL_INFO.to_string(), Value::String(message.to_string()));
            }
        }
    }

    /// Shallow overwrite merge: incoming keys replace existing ones wholesale.
    pub fn merge_patient_info(&mut self, incoming: &Map<String, Value>) {
        for (key, value) in incoming {
            self.patient_info.insert(key.clone(), value.clone());
        }
    }

    pub fn snapshot(&self) -> PatientSnapshot {
        PatientSnapshot {
            symptoms: self.symptoms.clone(),
            patient_info: self.patient_info.clone(),
        }
    }
}

struct SessionSlot {
    state: Arc<Mutex<SessionState>>,
    last_seen: Instant,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionSlot>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Handle to the session, creating a fresh one if absent or expired.
    pub async fn get_or_create(&self, id: &str) -> Arc<Mutex<SessionState>> {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();

        if let Some(slot) = sessions.get_mut(id) {
            if now.duration_since(slot.last_seen) < self.ttl {
                slot.last_seen = now;
                return Arc::clone(&slot.state);
            }
            debug!("Session {} expired, starting over", id);
        }

        let state = Arc::new(Mutex::new(SessionState::default()));
        sessions.insert(
            id.to_string(),
            SessionSlot {
                state: Arc::clone(&state),
                last_seen: now,
            },
        );
        state
    }

    /// Copy of the current state, if the session exists.
    pub async fn get(&self, id: &str) -> Option<SessionState> {
        let handle = {
            let sessions = self.sessions.lock().await;
            sessions.get(id).map(|slot| Arc::clone(&slot.state))
        };
        match handle {
            Some(state) => Some(state.lock().await.clone()),
            None => None,
        }
    }

    /// Delete a session. Unknown ids are a no-op; returns whether one existed.
    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.lock().await.remove(id).is_some()
    }

    /// Drop every session idle for at least the TTL; returns how many went.
    pub async fn evict_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, slot| now.duration_since(slot.last_seen) < self.ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
