//! Session registry — one orchestrator per chat session.
//!
//! Sessions run concurrently, but a single session's turns are serialized
//! through its own mutex, so duplicate or overlapping deliveries for one
//! session can never interleave replies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::chat::collect::CollectStage;
use crate::chat::orchestrator::{ConversationOrchestrator, TurnOutput};
use crate::chat::qa::QaStage;
use crate::chat::state::ChatPhase;
use crate::error::ChatError;
use crate::profile::UserProfile;

struct Session {
    orchestrator: ConversationOrchestrator,
    last_active: DateTime<Utc>,
}

/// Phase and profile snapshot for the status endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionStatus {
    pub phase: ChatPhase,
    pub user_info: UserProfile,
}

/// Owns all live sessions and the stages they share.
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
    collect: Arc<CollectStage>,
    qa: Arc<QaStage>,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(collect: Arc<CollectStage>, qa: Arc<QaStage>, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            collect,
            qa,
            idle_timeout,
        }
    }

    /// Create a new session in the collecting phase.
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let session = Session {
            orchestrator: ConversationOrchestrator::new(
                Arc::clone(&self.collect),
                Arc::clone(&self.qa),
            ),
            last_active: Utc::now(),
        };
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        info!(session_id = %id, "Session created");
        id
    }

    /// Handle one turn for a session. Turns for the same session are
    /// serialized by the session mutex.
    pub async fn handle_message(&self, id: Uuid, content: &str) -> Result<TurnOutput, ChatError> {
        let session = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ChatError::SessionNotFound(id))?;

        let mut session = session.lock().await;
        session.last_active = Utc::now();
        session.orchestrator.handle_message(content).await
    }

    /// Snapshot a session's phase and profile.
    pub async fn status(&self, id: Uuid) -> Option<SessionStatus> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        let session = session.lock().await;
        Some(SessionStatus {
            phase: session.orchestrator.phase(),
            user_info: session.orchestrator.profile().clone(),
        })
    }

    /// Number of live sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle longer than the configured timeout. Returns the
    /// number pruned.
    pub async fn prune_idle(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.idle_timeout).unwrap_or(chrono::Duration::hours(1));
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        let mut keep = HashMap::new();
        for (id, session) in sessions.drain() {
            let last_active = match session.try_lock() {
                Ok(guard) => guard.last_active,
                // A locked session is mid-turn, so it is active
                Err(_) => Utc::now(),
            };
            if last_active >= cutoff {
                keep.insert(id, session);
            } else {
                debug!(session_id = %id, "Pruning idle session");
            }
        }
        *sessions = keep;
        before - sessions.len()
    }
}

/// Spawn the periodic idle-session sweep (runs every 60s).
pub fn spawn_prune_task(manager: Arc<SessionManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let pruned = manager.prune_idle().await;
            if pruned > 0 {
                info!(pruned, "Pruned idle sessions");
            }
        }
    })
}
