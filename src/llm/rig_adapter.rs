//! Adapter bridging rig-core's `CompletionModel` to our `LlmProvider` trait.

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Wraps a rig completion model and enforces a bounded per-call timeout.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
    timeout: Duration,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, timeout: Duration) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl<M: CompletionModel> LlmProvider for RigAdapter<M> {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        // rig separates the system preamble from the chat history, and the
        // final user message is the prompt.
        let mut preamble_parts: Vec<String> = Vec::new();
        let mut history: Vec<Message> = Vec::new();
        for message in &request.messages {
            match message.role {
                Role::System => preamble_parts.push(message.content.clone()),
                Role::User => history.push(Message::user(message.content.clone())),
                Role::Assistant => history.push(Message::assistant(message.content.clone())),
            }
        }

        let prompt = history.pop().ok_or_else(|| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: "completion request contained no user or assistant messages".to_string(),
        })?;

        let mut builder = self.model.completion_request(prompt).messages(history);
        if !preamble_parts.is_empty() {
            builder = builder.preamble(preamble_parts.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        let rig_request = builder.build();

        let response = tokio::time::timeout(self.timeout, self.model.completion(rig_request))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.model_name.clone(),
                timeout: self.timeout,
            })?
            .map_err(|e| LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: e.to_string(),
            })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "completion contained no text content".to_string(),
            });
        }

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens: response.usage.output_tokens as u32,
        })
    }
}
