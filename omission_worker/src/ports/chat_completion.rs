use async_trait::async_trait;
use common::helper::error_chain_fmt;
use serde_json::Value as JsonValue;

/// One structured chat exchange: a fixed system prompt, the user content,
/// and the JSON schema the answer must satisfy.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_content: String,
    /// Name the schema is registered under in the request.
    pub schema_name: String,
    pub response_schema: JsonValue,
}

/// Structured-output chat completions against a hosted LLM.
///
/// Only the schema-constrained path exists: a reply that does not parse as
/// JSON is a `StructuredParseError`, never a silently dropped result.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete_structured(
        &self,
        request: ChatRequest,
    ) -> Result<JsonValue, ChatCompletionError>;
}

#[derive(thiserror::Error)]
pub enum ChatCompletionError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("Network error calling the LLM: {0}")]
    NetworkError(String),

    #[error("LLM answer did not match the expected schema: {0}")]
    StructuredParseError(String),
}

impl std::fmt::Debug for ChatCompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
