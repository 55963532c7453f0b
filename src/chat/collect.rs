//! Collection stage — one turn of LLM-driven profile extraction.
//!
//! Validation here is defense in depth: every value the completion claims
//! is re-checked locally, and anything that fails its rule is treated as
//! not-yet-collected rather than stored invalid.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::chat::prompts::{
    malformed_reply, parse_collection_response, RawUserInfo, COLLECTION_SYSTEM_PROMPT,
};
use crate::chat::state::ConversationTurn;
use crate::error::ChatError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::profile::{is_nine_digits, ProfileField, UserProfile, MAX_AGE};

/// Collection runs deterministic.
const COLLECT_TEMPERATURE: f32 = 0.0;

/// Max tokens for a collection turn (reply + structured payload).
const COLLECT_MAX_TOKENS: u32 = 1024;

/// Result of one collection turn.
#[derive(Debug, Clone)]
pub struct CollectOutcome {
    /// Natural-language reply to show the user.
    pub reply: String,
    /// Validated candidate profile extracted this turn.
    pub candidate: UserProfile,
    /// Fields still absent (or rejected by validation) in the candidate.
    pub missing_fields: Vec<ProfileField>,
}

/// Drives one turn of the collection phase against the completion service.
pub struct CollectStage {
    llm: Arc<dyn LlmProvider>,
}

impl CollectStage {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Send the conversation plus collection instructions to the
    /// completion service and validate its structured output.
    ///
    /// A malformed completion is recovered here: the profile is left
    /// untouched and the user gets a generic retry reply. Upstream
    /// failures (timeout, unavailable) propagate as typed errors.
    pub async fn collect(
        &self,
        turns: &[ConversationTurn],
        latest_message: &str,
    ) -> Result<CollectOutcome, ChatError> {
        let mut messages = vec![ChatMessage::system(COLLECTION_SYSTEM_PROMPT)];
        messages.extend(turns.iter().map(ConversationTurn::to_chat_message));
        messages.push(ChatMessage::user(latest_message));

        let request = CompletionRequest::new(messages)
            .with_temperature(COLLECT_TEMPERATURE)
            .with_max_tokens(COLLECT_MAX_TOKENS);

        let response = self.llm.complete(request).await.map_err(ChatError::from)?;

        match parse_collection_response(&response.content) {
            Ok(payload) => {
                let candidate = validate_user_info(&payload.user_info);
                let missing_fields = candidate.missing_fields();
                Ok(CollectOutcome {
                    reply: payload.content,
                    candidate,
                    missing_fields,
                })
            }
            Err(e) => {
                warn!(
                    error = %e,
                    raw_response = %response.content,
                    "Collection completion did not match the output schema"
                );
                Ok(CollectOutcome {
                    reply: malformed_reply(latest_message),
                    candidate: UserProfile::default(),
                    missing_fields: ProfileField::ALL.to_vec(),
                })
            }
        }
    }
}

/// Validate raw extracted values into a typed profile, independent of the
/// completion's own claims. A failing value becomes an absent field.
fn validate_user_info(raw: &RawUserInfo) -> UserProfile {
    let mut profile = UserProfile {
        full_name: nonempty(&raw.full_name),
        ..Default::default()
    };

    if let Some(value) = nonempty(&raw.id_number) {
        profile.id_number = accept(validate_digits(ProfileField::IdNumber, &value));
    }
    if let Some(value) = nonempty(&raw.gender) {
        profile.gender = accept(validate_enum(ProfileField::Gender, &value));
    }
    if let Some(age) = raw.age {
        profile.age = accept(validate_age(age));
    }
    if let Some(value) = nonempty(&raw.hmo_name) {
        profile.hmo_name = accept(validate_enum(ProfileField::HmoName, &value));
    }
    if let Some(value) = nonempty(&raw.hmo_card_number) {
        profile.hmo_card_number = accept(validate_digits(ProfileField::HmoCardNumber, &value));
    }
    if let Some(value) = nonempty(&raw.membership_tier) {
        profile.membership_tier = accept(validate_enum(ProfileField::MembershipTier, &value));
    }

    // The authoritative confirmation gate: the upstream claim only holds
    // when all seven fields validated.
    profile.is_confirmed = raw.is_confirmed == Some(true) && profile.is_complete();
    profile
}

fn nonempty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn accept<T>(result: Result<T, ChatError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Rejected collected value, routing field back to missing");
            None
        }
    }
}

fn validate_digits(field: ProfileField, value: &str) -> Result<String, ChatError> {
    if is_nine_digits(value) {
        Ok(value.to_string())
    } else {
        Err(ChatError::ValidationFailed(field))
    }
}

fn validate_age(value: i64) -> Result<u8, ChatError> {
    if (0..=i64::from(MAX_AGE)).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ChatError::ValidationFailed(ProfileField::Age))
    }
}

fn validate_enum<T: FromStr>(field: ProfileField, value: &str) -> Result<T, ChatError> {
    value
        .parse()
        .map_err(|_| ChatError::ValidationFailed(field))
}
