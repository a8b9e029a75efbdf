use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    domain::entities::descriptor::Embeddings,
    ports::embeddings_generator::{EmbeddingInput, EmbeddingsGenerator, EmbeddingsGeneratorError},
};

/// Embeddings client for a hosted inference endpoint.
///
/// Posts `{model, input}` and parses either `data[].embedding` entries or a
/// plain `embeddings` matrix, whichever the endpoint answers with. Text goes
/// to the sentence model, images are sent base64-encoded to the multimodal
/// model when one is configured.
pub struct EmbeddingsInferenceRepository {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<Secret<String>>,
    model: String,
    multimodal_model: Option<String>,
}

impl EmbeddingsInferenceRepository {
    pub fn try_new(
        endpoint: &str,
        api_key: Option<Secret<String>>,
        model: &str,
        multimodal_model: Option<String>,
    ) -> Result<Self, EmbeddingsGeneratorError> {
        let client = reqwest::Client::new();

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            multimodal_model,
        })
    }

    async fn post_inference(
        &self,
        body: serde_json::Value,
        expected_len: usize,
    ) -> Result<Vec<Embeddings>, EmbeddingsGeneratorError> {
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("api-key", api_key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| EmbeddingsGeneratorError::ModelError(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingsGeneratorError::ModelError(format!(
                "inference request failed ({}): {}",
                status, error_text
            )));
        }

        let payload: InferenceResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingsGeneratorError::ModelError(error.to_string()))?;

        payload.into_embeddings(expected_len)
    }
}

#[async_trait]
impl EmbeddingsGenerator for EmbeddingsInferenceRepository {
    #[tracing::instrument(name = "Generating embeddings remotely", skip(self, sentences))]
    async fn embed_batch(
        &self,
        sentences: &[String],
    ) -> Result<Vec<Embeddings>, EmbeddingsGeneratorError> {
        if sentences.is_empty() {
            return Err(EmbeddingsGeneratorError::EmptyInput);
        }
        debug!(nb_sentences = sentences.len(), "Sending sentences to the endpoint");

        let body = json!({ "model": self.model, "input": sentences });
        self.post_inference(body, sentences.len()).await
    }

    async fn embed_input(
        &self,
        input: &EmbeddingInput,
    ) -> Result<Embeddings, EmbeddingsGeneratorError> {
        let (model, payload) = match input {
            EmbeddingInput::Sentence(sentence) => (&self.model, json!([sentence])),
            EmbeddingInput::Image(path) => {
                let model = self.multimodal_model.as_ref().ok_or_else(|| {
                    EmbeddingsGeneratorError::UnsupportedInput(
                        "no multimodal embedding model is configured".into(),
                    )
                })?;

                let bytes = std::fs::read(path).map_err(|source| {
                    EmbeddingsGeneratorError::InputFile {
                        path: path.display().to_string(),
                        source,
                    }
                })?;

                (model, json!([{ "image": BASE64.encode(bytes) }]))
            }
        };

        let body = json!({ "model": model, "input": payload });
        let mut embeddings = self.post_inference(body, 1).await?;

        Ok(embeddings.remove(0))
    }
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    data: Vec<InferenceData>,
    #[serde(default)]
    embeddings: Vec<Embeddings>,
}

#[derive(Debug, Deserialize)]
struct InferenceData {
    embedding: Embeddings,
    #[serde(default)]
    index: Option<usize>,
}

impl InferenceResponse {
    fn into_embeddings(
        self,
        expected_len: usize,
    ) -> Result<Vec<Embeddings>, EmbeddingsGeneratorError> {
        if !self.data.is_empty() {
            if self.data.len() != expected_len {
                return Err(EmbeddingsGeneratorError::CountMismatch {
                    expected: expected_len,
                    returned: self.data.len(),
                });
            }
            let mut data = self.data;
            data.sort_by_key(|entry| entry.index.unwrap_or(0));
            return Ok(data.into_iter().map(|entry| entry.embedding).collect());
        }

        if self.embeddings.len() != expected_len {
            return Err(EmbeddingsGeneratorError::CountMismatch {
                expected: expected_len,
                returned: self.embeddings.len(),
            });
        }
        Ok(self.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> EmbeddingsInferenceRepository {
        EmbeddingsInferenceRepository::try_new(
            "http://127.0.0.1:9/inference/text",
            None,
            "all-MiniLM-L6-v2",
            None,
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn an_empty_sentence_list_is_an_input_error() {
        // The validation fires before any request is issued: the endpoint
        // above is unreachable on purpose
        let result = repository().embed_batch(&[]).await;

        assert!(matches!(result, Err(EmbeddingsGeneratorError::EmptyInput)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn an_image_input_without_multimodal_model_is_unsupported() {
        let result = repository()
            .embed_input(&EmbeddingInput::Image("Cargo.toml".into()))
            .await;

        assert!(matches!(
            result,
            Err(EmbeddingsGeneratorError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn a_mismatched_answer_is_a_count_error() {
        let response = InferenceResponse {
            data: vec![],
            embeddings: vec![vec![0.1, 0.2]],
        };

        let result = response.into_embeddings(2);

        assert!(matches!(
            result,
            Err(EmbeddingsGeneratorError::CountMismatch {
                expected: 2,
                returned: 1
            })
        ));
    }
}
