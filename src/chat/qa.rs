//! QA stage — retrieval-augmented answering for a confirmed user.

use std::sync::Arc;

use tracing::{debug, info};

use crate::chat::prompts::{knowledge_not_found_reply, qa_system_prompt};
use crate::error::ChatError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::profile::UserProfile;
use crate::retrieval::Retriever;

/// Number of chunks retrieved per question.
pub const RETRIEVAL_K: usize = 10;

/// QA answers stay grounded but a little less rigid than collection.
const QA_TEMPERATURE: f32 = 0.3;

/// Max tokens for a QA answer.
const QA_MAX_TOKENS: u32 = 1024;

/// Answers coverage questions from the knowledge base, contextualized by
/// the user's profile.
///
/// Callers must only route confirmed profiles here; the stage assumes
/// confirmation and does not re-check it.
pub struct QaStage {
    llm: Arc<dyn LlmProvider>,
    retriever: Arc<dyn Retriever>,
    k: usize,
}

impl QaStage {
    pub fn new(llm: Arc<dyn LlmProvider>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            llm,
            retriever,
            k: RETRIEVAL_K,
        }
    }

    #[cfg(test)]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Retrieve knowledge for `query` and produce an answer.
    ///
    /// Zero retrieved chunks short-circuits into an explicit "not found"
    /// reply — empty context is never passed silently into the prompt.
    pub async fn answer(&self, profile: &UserProfile, query: &str) -> Result<String, ChatError> {
        let chunks = self.retriever.search(query, self.k).await?;
        if chunks.is_empty() {
            info!("No knowledge chunks matched the query");
            return Ok(knowledge_not_found_reply(query));
        }
        debug!(chunks = chunks.len(), "Retrieved knowledge context");

        // Ranked order matters: most relevant chunks first.
        let knowledge_content = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(qa_system_prompt(profile, &knowledge_content)),
            ChatMessage::user(query),
        ])
        .with_temperature(QA_TEMPERATURE)
        .with_max_tokens(QA_MAX_TOKENS);

        let response = self.llm.complete(request).await.map_err(ChatError::from)?;
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::error::{LlmError, RetrievalError};
    use crate::llm::CompletionResponse;
    use crate::profile::{Gender, HmoName, MembershipTier};
    use crate::retrieval::KnowledgeChunk;

    /// Fake retriever returning fixed chunks.
    struct FixedRetriever {
        chunks: Vec<KnowledgeChunk>,
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn search(
            &self,
            _query: &str,
            k: usize,
        ) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
            Ok(self.chunks.iter().take(k).cloned().collect())
        }
    }

    /// Mock LLM that records the request it received.
    struct RecordingLlm {
        response: String,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request);
            Ok(CompletionResponse {
                content: self.response.clone(),
                input_tokens: 100,
                output_tokens: 50,
            })
        }
    }

    fn confirmed_profile() -> UserProfile {
        UserProfile {
            full_name: Some("Dana Levi".to_string()),
            id_number: Some("123456789".to_string()),
            gender: Some(Gender::Female),
            age: Some(34),
            hmo_name: Some(HmoName::Maccabi),
            hmo_card_number: Some("987654321".to_string()),
            membership_tier: Some(MembershipTier::Gold),
            is_confirmed: true,
        }
    }

    fn chunk(text: &str) -> KnowledgeChunk {
        KnowledgeChunk {
            text: text.to_string(),
            source: "dental.html".to_string(),
        }
    }

    #[tokio::test]
    async fn answer_embeds_ranked_knowledge_and_profile() {
        let llm = Arc::new(RecordingLlm {
            response: "Gold members at Maccabi get 80% off dental fillings.".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let retriever = Arc::new(FixedRetriever {
            chunks: vec![chunk("סתימות בהנחה של 80% לזהב"), chunk("בדיקות שגרה חינם")],
        });
        let stage = QaStage::new(llm.clone(), retriever);

        let reply = stage
            .answer(&confirmed_profile(), "What dental coverage do I have?")
            .await
            .unwrap();
        assert!(reply.contains("dental"));

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let system = &seen[0].messages[0].content;
        assert!(system.contains("Dana Levi"));
        assert!(system.contains("Maccabi"));
        let first = system.find("סתימות").unwrap();
        let second = system.find("בדיקות").unwrap();
        assert!(first < second, "higher-relevance chunk must come first");
        // The literal query travels as the user message
        assert_eq!(seen[0].messages[1].content, "What dental coverage do I have?");
        assert_eq!(seen[0].temperature, Some(QA_TEMPERATURE));
    }

    #[tokio::test]
    async fn zero_chunks_yields_not_found_without_llm_call() {
        let llm = Arc::new(RecordingLlm {
            response: "should never be used".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let retriever = Arc::new(FixedRetriever { chunks: Vec::new() });
        let stage = QaStage::new(llm.clone(), retriever);

        let reply = stage
            .answer(&confirmed_profile(), "Do I have acupuncture coverage?")
            .await
            .unwrap();
        assert!(reply.contains("No relevant information"));
        assert!(llm.seen.lock().unwrap().is_empty(), "LLM must not be called");
    }

    #[tokio::test]
    async fn zero_chunks_hebrew_query_gets_hebrew_not_found() {
        let llm = Arc::new(RecordingLlm {
            response: String::new(),
            seen: Mutex::new(Vec::new()),
        });
        let stage = QaStage::new(llm, Arc::new(FixedRetriever { chunks: Vec::new() }));
        let reply = stage
            .answer(&confirmed_profile(), "האם יש כיסוי לדיקור?")
            .await
            .unwrap();
        assert!(crate::chat::prompts::is_hebrew(&reply));
    }

    #[tokio::test]
    async fn index_unavailable_propagates() {
        struct DownRetriever;

        #[async_trait]
        impl Retriever for DownRetriever {
            async fn search(
                &self,
                _query: &str,
                _k: usize,
            ) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
                Err(RetrievalError::IndexUnavailable {
                    reason: "not built".to_string(),
                })
            }
        }

        let llm = Arc::new(RecordingLlm {
            response: String::new(),
            seen: Mutex::new(Vec::new()),
        });
        let stage = QaStage::new(llm, Arc::new(DownRetriever));
        let result = stage.answer(&confirmed_profile(), "anything").await;
        assert!(matches!(
            result,
            Err(ChatError::Retrieval(RetrievalError::IndexUnavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn retrieval_timeout_surfaces_as_upstream_timeout() {
        struct TimeoutRetriever;

        #[async_trait]
        impl Retriever for TimeoutRetriever {
            async fn search(
                &self,
                _query: &str,
                _k: usize,
            ) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
                Err(RetrievalError::Timeout {
                    timeout: std::time::Duration::from_secs(30),
                })
            }
        }

        let llm = Arc::new(RecordingLlm {
            response: String::new(),
            seen: Mutex::new(Vec::new()),
        });
        let stage = QaStage::new(llm.clone(), Arc::new(TimeoutRetriever));
        let result = stage.answer(&confirmed_profile(), "anything").await;
        assert!(matches!(result, Err(ChatError::UpstreamTimeout)));
        assert!(llm.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn k_caps_retrieval() {
        let llm = Arc::new(RecordingLlm {
            response: "ok".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let retriever = Arc::new(FixedRetriever {
            chunks: (0..20).map(|i| chunk(&format!("chunk {i}"))).collect(),
        });
        let stage = QaStage::new(llm.clone(), retriever).with_k(3);
        stage.answer(&confirmed_profile(), "q").await.unwrap();

        let seen = llm.seen.lock().unwrap();
        let system = &seen[0].messages[0].content;
        assert!(system.contains("chunk 2"));
        assert!(!system.contains("chunk 3"));
    }
}
