//! Conversation orchestrator — the two-phase state machine behind a
//! session.
//!
//! Routing is decided purely by the stored phase, never by message
//! content. The collection → answering transition is one-way: fires
//! exactly when the merged profile is confirmed with nothing missing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::chat::collect::CollectStage;
use crate::chat::prompts::upstream_retry_reply;
use crate::chat::qa::QaStage;
use crate::chat::state::{ChatPhase, ConversationTurn};
use crate::error::ChatError;
use crate::profile::{ProfileField, UserProfile};

/// What one handled turn produces for the caller.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub reply: String,
    pub phase: ChatPhase,
    pub missing_fields: Vec<ProfileField>,
}

/// Per-session orchestrator. Owns the phase, the profile of record, and
/// the append-only turn history for the life of the session.
pub struct ConversationOrchestrator {
    collect: Arc<CollectStage>,
    qa: Arc<QaStage>,
    phase: ChatPhase,
    profile: UserProfile,
    turns: Vec<ConversationTurn>,
}

impl ConversationOrchestrator {
    pub fn new(collect: Arc<CollectStage>, qa: Arc<QaStage>) -> Self {
        Self {
            collect,
            qa,
            phase: ChatPhase::default(),
            profile: UserProfile::default(),
            turns: Vec::new(),
        }
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Handle one inbound message, routed by the stored phase.
    ///
    /// On an upstream timeout or outage the turn produces a user-facing
    /// retry reply and leaves phase, profile, and history untouched.
    pub async fn handle_message(&mut self, content: &str) -> Result<TurnOutput, ChatError> {
        match self.phase {
            ChatPhase::Collecting => self.collection_turn(content).await,
            ChatPhase::Answering => self.qa_turn(content).await,
        }
    }

    async fn collection_turn(&mut self, content: &str) -> Result<TurnOutput, ChatError> {
        let outcome = match self.collect.collect(&self.turns, content).await {
            Ok(outcome) => outcome,
            Err(e @ (ChatError::UpstreamTimeout | ChatError::UpstreamUnavailable { .. })) => {
                warn!(error = %e, "Collection turn failed upstream, asking the user to retry");
                return Ok(self.retry_output(content));
            }
            Err(e) => return Err(e),
        };

        self.profile.absorb(&outcome.candidate);
        let missing_fields = self.profile.missing_fields();

        if self.profile.is_confirmed
            && missing_fields.is_empty()
            && self.phase.can_transition_to(ChatPhase::Answering)
        {
            info!("Profile confirmed, transitioning to the answering phase");
            self.phase = ChatPhase::Answering;
        }

        self.turns.push(ConversationTurn::user(content));
        self.turns.push(ConversationTurn::assistant(outcome.reply.clone()));

        Ok(TurnOutput {
            reply: outcome.reply,
            phase: self.phase,
            missing_fields,
        })
    }

    async fn qa_turn(&mut self, content: &str) -> Result<TurnOutput, ChatError> {
        let reply = match self.qa.answer(&self.profile, content).await {
            Ok(reply) => reply,
            Err(e @ (ChatError::UpstreamTimeout | ChatError::UpstreamUnavailable { .. })) => {
                warn!(error = %e, "QA turn failed upstream, asking the user to retry");
                return Ok(self.retry_output(content));
            }
            Err(e) => return Err(e),
        };

        self.turns.push(ConversationTurn::user(content));
        self.turns.push(ConversationTurn::assistant(reply.clone()));

        Ok(TurnOutput {
            reply,
            phase: self.phase,
            missing_fields: Vec::new(),
        })
    }

    fn retry_output(&self, content: &str) -> TurnOutput {
        TurnOutput {
            reply: upstream_retry_reply(content),
            phase: self.phase,
            missing_fields: self.profile.missing_fields(),
        }
    }
}
