use std::sync::Arc;

use common::helper::error_chain_fmt;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::{
    domain::entities::{
        consistency::{CategoryResult, ConsistencyVerdict},
        descriptor::QueryMatch,
        omission_report::{MarketingOmissionReport, OmissionCategory},
    },
    ports::{
        chat_completion::{ChatCompletion, ChatCompletionError, ChatRequest},
        descriptor_storage::{DescriptorStorage, DescriptorStorageError},
        embeddings_generator::{EmbeddingInput, EmbeddingsGenerator, EmbeddingsGeneratorError},
    },
};

/// Nearest stored chunks retrieved per observation.
pub const DEFAULT_TOP_K: u64 = 5;

/// Finding emitted for a category with no observations.
pub const NO_OBSERVATION_SENTINEL: &str = "No observation provided";

const CONSISTENCY_SYSTEM_PROMPT: &str = "You are a Medical Legal Reviewer.";

/// Cross-references each extracted observation with the vector store and asks
/// the LLM whether the marketing post actionably omits the information.
///
/// Per category: an empty observation list short-circuits to a sentinel
/// finding; an observation whose retrieval comes back empty is judged
/// `NoDocumentsFound` without any LLM call.
pub struct OmissionCheckService {
    embeddings: Arc<dyn EmbeddingsGenerator>,
    storage: Arc<dyn DescriptorStorage>,
    chat: Arc<dyn ChatCompletion>,
    top_k: u64,
}

impl OmissionCheckService {
    pub fn new(
        embeddings: Arc<dyn EmbeddingsGenerator>,
        storage: Arc<dyn DescriptorStorage>,
        chat: Arc<dyn ChatCompletion>,
    ) -> Self {
        Self {
            embeddings,
            storage,
            chat,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: u64) -> Self {
        self.top_k = top_k;
        self
    }

    /// Checks every observation of every category, sequentially.
    ///
    /// Results keep the fixed category order and, inside a category, the
    /// original observation order.
    #[tracing::instrument(name = "Processing omission observations", skip(self, post, report))]
    pub async fn process_observations(
        &self,
        post: &str,
        report: &MarketingOmissionReport,
    ) -> Result<Vec<CategoryResult>, OmissionCheckError> {
        let mut results = Vec::with_capacity(OmissionCategory::ALL.len());

        for category in OmissionCategory::ALL {
            let observations = report.observations(category);

            if observations.is_empty() {
                results.push(CategoryResult {
                    category,
                    findings: vec![(
                        NO_OBSERVATION_SENTINEL.to_string(),
                        ConsistencyVerdict::NoDocumentsFound,
                    )],
                });
                continue;
            }

            let mut findings = Vec::with_capacity(observations.len());
            for observation in observations {
                let verdict = self.check_observation(post, category, observation).await?;
                findings.push((observation.clone(), verdict));
            }

            results.push(CategoryResult { category, findings });
        }

        Ok(results)
    }

    #[tracing::instrument(
        name = "Checking one observation",
        skip(self, post),
        fields(category = %category)
    )]
    async fn check_observation(
        &self,
        post: &str,
        category: OmissionCategory,
        observation: &str,
    ) -> Result<ConsistencyVerdict, OmissionCheckError> {
        let embedding = self
            .embeddings
            .embed_input(&EmbeddingInput::Sentence(observation.to_string()))
            .await?;

        let documents = self
            .storage
            .query_embeddings(embedding, self.top_k, false)
            .await?;

        if documents.is_empty() {
            info!("No documents retrieved, skipping the consistency call");
            return Ok(ConsistencyVerdict::NoDocumentsFound);
        }

        self.check_consistency(post, category, observation, &documents)
            .await
    }

    /// One structured chat call deciding `Omission` vs `Fine`.
    async fn check_consistency(
        &self,
        post: &str,
        category: OmissionCategory,
        observation: &str,
        documents: &[QueryMatch],
    ) -> Result<ConsistencyVerdict, OmissionCheckError> {
        let documents_text = documents
            .iter()
            .map(QueryMatch::document_text)
            .collect::<Vec<_>>()
            .join("\n---\n");

        let user_content = format!(
            "This is the post: {post}\n\
             Your task is to evaluate the post to assess whether it misses any important \
             information that should be told.\n\
             The following observation was made about the post: '{category}': '{observation}'.\n\
             The following documents are provided to guide the reviewer in assessing the \
             observation:\n{documents_text}\n\
             Evaluate whether the provided documents contain the identified observation:\n\
             - If they do, the verdict is 'Omission'.\n\
             - Otherwise, the verdict is 'Fine'.\n\
             Provide a concise reason for your conclusion.",
            category = category.description(),
        );

        let request = ChatRequest {
            system_prompt: CONSISTENCY_SYSTEM_PROMPT.into(),
            user_content,
            schema_name: "consistency_verdict".into(),
            response_schema: verdict_schema(),
        };

        let answer = self.chat.complete_structured(request).await?;
        let decision: ConsistencyDecision = serde_json::from_value(answer)
            .map_err(|error| OmissionCheckError::StructuredParseError(error.to_string()))?;

        Ok(decision.into())
    }
}

/// Shape of the consistency answer, as constrained by `verdict_schema`.
#[derive(Debug, Deserialize)]
struct ConsistencyDecision {
    verdict: VerdictKind,
    reason: String,
}

#[derive(Debug, Deserialize)]
enum VerdictKind {
    Omission,
    Fine,
}

impl From<ConsistencyDecision> for ConsistencyVerdict {
    fn from(decision: ConsistencyDecision) -> Self {
        match decision.verdict {
            VerdictKind::Omission => ConsistencyVerdict::Omission {
                reason: decision.reason,
            },
            VerdictKind::Fine => ConsistencyVerdict::Fine {
                reason: decision.reason,
            },
        }
    }
}

fn verdict_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "verdict": { "type": "string", "enum": ["Omission", "Fine"] },
            "reason": { "type": "string" },
        },
        "required": ["verdict", "reason"],
        "additionalProperties": false,
    })
}

#[derive(thiserror::Error)]
pub enum OmissionCheckError {
    #[error(transparent)]
    EmbeddingsGeneratorError(#[from] EmbeddingsGeneratorError),

    #[error(transparent)]
    DescriptorStorageError(#[from] DescriptorStorageError),

    #[error(transparent)]
    ChatCompletionError(#[from] ChatCompletionError),

    #[error("LLM answer did not match the verdict schema: {0}")]
    StructuredParseError(String),
}

impl std::fmt::Debug for OmissionCheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
