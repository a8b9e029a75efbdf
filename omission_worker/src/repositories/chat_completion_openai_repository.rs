use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::{
    configuration::LlmSettings,
    ports::chat_completion::{ChatCompletion, ChatCompletionError, ChatRequest},
};

/// Structured-output chat completions against the OpenAI API.
///
/// Every call constrains the answer with `response_format: json_schema`
/// (strict), so the reply is either a schema-conforming JSON object or an
/// error. No retries; a transient failure propagates to the caller.
pub struct ChatCompletionOpenAiRepository {
    client: reqwest::Client,
    api_key: Secret<String>,
    model: String,
    base_url: String,
}

impl ChatCompletionOpenAiRepository {
    pub fn try_new(settings: &LlmSettings) -> Result<Self, ChatCompletionError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|error| ChatCompletionError::NetworkError(error.to_string()))?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatCompletion for ChatCompletionOpenAiRepository {
    #[tracing::instrument(name = "Structured chat completion", skip(self, request))]
    async fn complete_structured(
        &self,
        request: ChatRequest,
    ) -> Result<JsonValue, ChatCompletionError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_content },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": request.response_schema,
                    "strict": true,
                },
            },
        });

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|error| ChatCompletionError::NetworkError(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatCompletionError::ApiError(format!(
                "{}: {}",
                status, error_text
            )));
        }

        let data: JsonValue = response
            .json()
            .await
            .map_err(|error| ChatCompletionError::ApiError(error.to_string()))?;

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ChatCompletionError::ApiError("Answer carries no message content".into())
            })?;
        debug!(nb_chars = content.len(), "Received structured answer");

        serde_json::from_str(content)
            .map_err(|error| ChatCompletionError::StructuredParseError(error.to_string()))
    }
}
