//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-session state registry.

use crate::{config::Config, error::WebError};
use photo_story_core::{
    ports::{GenerativeModelService, TextToSpeechService},
    shelf::KeyPolicy,
    workflow::StorySession,
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub model_adapter: Arc<dyn GenerativeModelService>,
    pub tts_adapter: Arc<dyn TextToSpeechService>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        model_adapter: Arc<dyn GenerativeModelService>,
        tts_adapter: Arc<dyn TextToSpeechService>,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(KeyPolicy::ById, config.max_images));
        Self {
            config,
            model_adapter,
            tts_adapter,
            sessions,
        }
    }

    /// Looks up a live session or reports it as missing.
    pub async fn session(&self, session_id: Uuid) -> Result<SessionHandle, WebError> {
        self.sessions
            .get(session_id)
            .await
            .ok_or(WebError::SessionNotFound(session_id))
    }
}

//=========================================================================================
// SessionRegistry (One Entry per Interactive Session)
//=========================================================================================

/// Exclusive access to one session. Requests for the same session serialize on it.
pub type SessionHandle = Arc<Mutex<StorySession>>;

struct SessionEntry {
    handle: SessionHandle,
    last_access: Instant,
}

/// Holds every live session in memory. Nothing outlives the process.
pub struct SessionRegistry {
    policy: KeyPolicy,
    max_images: usize,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(policy: KeyPolicy, max_images: usize) -> Self {
        Self {
            policy,
            max_images,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a session initialized with defaults.
    pub async fn create(&self) -> (Uuid, SessionHandle) {
        let session_id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(StorySession::new(self.policy, self.max_images)));
        self.sessions.write().await.insert(
            session_id,
            SessionEntry {
                handle: handle.clone(),
                last_access: Instant::now(),
            },
        );
        info!(%session_id, "Session created");
        (session_id, handle)
    }

    /// Looks up a session and marks it as recently used.
    pub async fn get(&self, session_id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&session_id)?;
        entry.last_access = Instant::now();
        Some(entry.handle.clone())
    }

    /// Ends a session. Returns whether it existed.
    pub async fn remove(&self, session_id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&session_id).is_some();
        if removed {
            info!(%session_id, "Session ended");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Ends every session unused for at least `idle`. Returns how many were dropped.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|session_id, entry| {
            let keep = entry.last_access.elapsed() < idle;
            if !keep {
                info!(%session_id, "Session expired after inactivity");
            }
            keep
        });
        before - sessions.len()
    }

    /// Periodically evicts idle sessions for as long as the process runs.
    pub fn spawn_idle_sweeper(self: Arc<Self>, idle: Duration) -> JoinHandle<()> {
        let period = idle
            .min(Duration::from_secs(60))
            .max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle(idle).await;
                if evicted > 0 {
                    let remaining = self.len().await;
                    debug!(evicted, remaining, "Idle sessions swept");
                }
            }
        })
    }
}
