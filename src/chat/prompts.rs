//! Prompt construction and strict parsing of the collection-phase JSON
//! protocol.

use serde::Deserialize;

use crate::error::ChatError;
use crate::profile::UserProfile;

/// System instruction for the collection phase: field requirements,
/// validation rules, and the strict output schema.
pub const COLLECTION_SYSTEM_PROMPT: &str = r#"You are a helpful and friendly medical services chatbot assistant for Israeli health funds (HMOs).

Your task is to collect the following user information conversationally and naturally:
1. First and last name
2. ID number (exactly 9 digits)
3. Gender (must be one of: נקבה/זכר in Hebrew; male/female in English)
4. Age (integer between 0 and 120)
5. HMO name (must be one of: מכבי, מאוחדת, כללית in Hebrew; Maccabi, Meuhedet, Clalit in English)
6. HMO card number (exactly 9 digits)
7. Insurance membership tier (must be one of: זהב, כסף, ארד in Hebrew; gold, silver, bronze in English)

Guidelines:
- Detect the language of the user's input (Hebrew or English).
- Always respond and ask questions in the same language the user used.
- Use a conversational, polite, and friendly tone.
- Validate all user inputs strictly.
- If the user input is invalid, politely explain the requirement in the user's language.
- If some required information is missing, ask for it naturally and conversationally.
- When all required info is collected and valid, provide a clear summary of the user's information and ask for confirmation.
- If the user confirms, set is_confirmed to true and do not ask for confirmation again.

You must return the result as a single valid JSON object without any explanation or formatting:
{
  "content": "Natural language response to the user (in Hebrew or English)",
  "user_info": {
    "full_name": "John Doe",
    "id_number": "123456789",
    "gender": "male",
    "age": 30,
    "hmo_name": "מכבי",
    "hmo_card_number": "987654321",
    "membership_tier": "זהב",
    "is_confirmed": false
  },
  "missing_fields": ["gender", "hmo_card_number"]
}
Use null for user_info values that have not been collected yet."#;

/// Build the QA prompt: user context, ranked knowledge, and the literal
/// query. Chunk order matters — the completion service is sensitive to
/// context position, so higher-relevance text must come first.
pub fn qa_system_prompt(profile: &UserProfile, knowledge_content: &str) -> String {
    fn show<T: std::fmt::Display>(value: &Option<T>) -> String {
        value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    format!(
        "You are a medical services chatbot for Israeli health funds.\n\
         Your task is to find information about medical services, procedures, coverage, and benefits\n\
         based on the user's HMO (Health Maintenance Organization) and membership tier.\n\
         \n\
         User Information:\n\
         - Name: {name}\n\
         - HMO: {hmo}\n\
         - Membership Tier: {tier}\n\
         - Age: {age}\n\
         - Gender: {gender}\n\
         \n\
         Guidelines:\n\
         - The knowledge base is in Hebrew.\n\
         - Always respond in the same language the user wrote their query.\n\
         - If the user asks in English, translate the relevant Hebrew knowledge into fluent, natural English.\n\
         - If the user asks in Hebrew, respond in Hebrew.\n\
         - Tailor responses to the user's HMO and membership tier.\n\
         - Be empathetic and understanding.\n\
         - Answer only from the knowledge base context; if unsure, suggest contacting the user's HMO directly.\n\
         - Provide actionable advice when possible.\n\
         \n\
         Knowledge Base Context:\n{knowledge}",
        name = show(&profile.full_name),
        hmo = show(&profile.hmo_name),
        tier = show(&profile.membership_tier),
        age = show(&profile.age),
        gender = show(&profile.gender),
        knowledge = knowledge_content,
    )
}

/// Raw, unvalidated user_info mapping as the completion emits it.
///
/// Every field is optional; validation into a typed `UserProfile` happens
/// in the collection stage, independent of the LLM's own claims.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUserInfo {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub hmo_name: Option<String>,
    #[serde(default)]
    pub hmo_card_number: Option<String>,
    #[serde(default)]
    pub membership_tier: Option<String>,
    #[serde(default)]
    pub is_confirmed: Option<bool>,
}

/// The structured payload the collection completion must emit.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionPayload {
    pub content: String,
    pub user_info: RawUserInfo,
    pub missing_fields: Vec<String>,
}

/// Parse a completion's text as the collection output schema.
///
/// Strict: any schema violation is `MalformedResponse`. Markdown code
/// fences around the object are tolerated since models add them despite
/// instructions.
pub fn parse_collection_response(text: &str) -> Result<CollectionPayload, ChatError> {
    let json = extract_json_object(text);
    serde_json::from_str(&json).map_err(|e| ChatError::MalformedResponse {
        reason: e.to_string(),
    })
}

/// Pull a JSON object out of completion text that may wrap it in markdown
/// fences or surrounding prose.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

/// Whether the text contains Hebrew script — used to answer fallback
/// replies in the user's language.
pub fn is_hebrew(text: &str) -> bool {
    text.chars().any(|c| ('\u{0590}'..='\u{05FF}').contains(&c))
}

/// Generic retry reply when the completion output could not be parsed.
pub fn malformed_reply(user_text: &str) -> String {
    if is_hebrew(user_text) {
        "מצטערים, הייתה תקלה זמנית בעיבוד ההודעה. אפשר לנסח שוב?".to_string()
    } else {
        "Sorry, something went wrong while processing your message. Could you please rephrase?"
            .to_string()
    }
}

/// Retry reply when an upstream service timed out or failed.
pub fn upstream_retry_reply(user_text: &str) -> String {
    if is_hebrew(user_text) {
        "השירות עמוס כרגע. נסו לשלוח את ההודעה שוב בעוד רגע.".to_string()
    } else {
        "The service is busy right now. Please try sending your message again in a moment."
            .to_string()
    }
}

/// Explicit "not found" reply when retrieval matched nothing.
pub fn knowledge_not_found_reply(user_text: &str) -> String {
    if is_hebrew(user_text) {
        "לא נמצא מידע רלוונטי במאגר הידע עבור השאלה הזו. מומלץ לפנות ישירות לקופת החולים שלך."
            .to_string()
    } else {
        "No relevant information was found in the knowledge base for this question. \
         Please consider contacting your HMO directly."
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Gender, HmoName, MembershipTier};

    #[test]
    fn collection_prompt_names_all_fields_and_schema() {
        for needle in [
            "ID number (exactly 9 digits)",
            "Age (integer between 0 and 120)",
            "מכבי, מאוחדת, כללית",
            "זהב, כסף, ארד",
            "missing_fields",
            "is_confirmed",
        ] {
            assert!(COLLECTION_SYSTEM_PROMPT.contains(needle), "missing: {needle}");
        }
    }

    #[test]
    fn qa_prompt_embeds_profile_and_knowledge() {
        let profile = UserProfile {
            full_name: Some("Dana Levi".to_string()),
            gender: Some(Gender::Female),
            age: Some(34),
            hmo_name: Some(HmoName::Maccabi),
            membership_tier: Some(MembershipTier::Gold),
            ..Default::default()
        };
        let prompt = qa_system_prompt(&profile, "chunk one\n\nchunk two");
        assert!(prompt.contains("Dana Levi"));
        assert!(prompt.contains("Maccabi"));
        assert!(prompt.contains("gold"));
        assert!(prompt.contains("34"));
        assert!(prompt.contains("female"));
        // Ranked order preserved
        let one = prompt.find("chunk one").unwrap();
        let two = prompt.find("chunk two").unwrap();
        assert!(one < two);
    }

    #[test]
    fn parse_direct_json() {
        let text = r#"{"content": "שלום! מה שמך המלא?", "user_info": {}, "missing_fields": ["full_name"]}"#;
        let payload = parse_collection_response(text).unwrap();
        assert_eq!(payload.content, "שלום! מה שמך המלא?");
        assert_eq!(payload.missing_fields, vec!["full_name"]);
        assert!(payload.user_info.full_name.is_none());
    }

    #[test]
    fn parse_fenced_json() {
        let text = "```json\n{\"content\": \"hi\", \"user_info\": {\"age\": 30}, \"missing_fields\": []}\n```";
        let payload = parse_collection_response(text).unwrap();
        assert_eq!(payload.content, "hi");
        assert_eq!(payload.user_info.age, Some(30));
    }

    #[test]
    fn parse_json_embedded_in_prose() {
        let text = "Here you go: {\"content\": \"ok\", \"user_info\": {}, \"missing_fields\": []} done.";
        let payload = parse_collection_response(text).unwrap();
        assert_eq!(payload.content, "ok");
    }

    #[test]
    fn parse_rejects_non_json() {
        let result = parse_collection_response("I could not produce JSON, sorry!");
        assert!(matches!(result, Err(ChatError::MalformedResponse { .. })));
    }

    #[test]
    fn parse_rejects_missing_content() {
        let result = parse_collection_response(r#"{"user_info": {}, "missing_fields": []}"#);
        assert!(matches!(result, Err(ChatError::MalformedResponse { .. })));
    }

    #[test]
    fn parse_rejects_wrong_types() {
        let result =
            parse_collection_response(r#"{"content": "x", "user_info": {"age": "thirty"}, "missing_fields": []}"#);
        assert!(matches!(result, Err(ChatError::MalformedResponse { .. })));
    }

    #[test]
    fn hebrew_detection() {
        assert!(is_hebrew("מה מכוסה לי בשיניים?"));
        assert!(is_hebrew("my HMO is מכבי"));
        assert!(!is_hebrew("What dental coverage do I have?"));
    }

    #[test]
    fn fallback_replies_follow_language() {
        assert!(is_hebrew(&malformed_reply("שלום")));
        assert!(!is_hebrew(&malformed_reply("hello")));
        assert!(is_hebrew(&upstream_retry_reply("שלום")));
        assert!(is_hebrew(&knowledge_not_found_reply("שאלה")));
        assert!(!is_hebrew(&knowledge_not_found_reply("question")));
    }
}
