use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use omission_worker::{
    domain::entities::descriptor::{DescriptorPayload, Embeddings, QueryMatch},
    ports::{
        chat_completion::{ChatCompletion, ChatCompletionError, ChatRequest},
        descriptor_storage::{DescriptorStorage, DescriptorStorageError},
        embeddings_generator::{EmbeddingInput, EmbeddingsGenerator, EmbeddingsGeneratorError},
    },
};

/// Keyword histogram standing in for a sentence-embeddings model: texts
/// sharing vocabulary land close under L2, identical texts land identically.
const KEYWORDS: [&str; 8] = [
    "side",
    "effect",
    "dizziness",
    "contraindication",
    "safety",
    "efficacy",
    "study",
    "evidence",
];

pub fn embedding_for(text: &str) -> Embeddings {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .map(|keyword| lower.matches(keyword).count() as f32)
        .collect()
}

#[derive(Default)]
pub struct FakeEmbeddingsGenerator {
    nb_calls: Mutex<usize>,
}

impl FakeEmbeddingsGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nb_calls(&self) -> usize {
        *self.nb_calls.lock().unwrap()
    }
}

#[async_trait]
impl EmbeddingsGenerator for FakeEmbeddingsGenerator {
    async fn embed_batch(
        &self,
        sentences: &[String],
    ) -> Result<Vec<Embeddings>, EmbeddingsGeneratorError> {
        if sentences.is_empty() {
            return Err(EmbeddingsGeneratorError::EmptyInput);
        }
        *self.nb_calls.lock().unwrap() += 1;

        Ok(sentences
            .iter()
            .map(|sentence| embedding_for(sentence))
            .collect())
    }

    async fn embed_input(
        &self,
        input: &EmbeddingInput,
    ) -> Result<Embeddings, EmbeddingsGeneratorError> {
        *self.nb_calls.lock().unwrap() += 1;

        match input {
            EmbeddingInput::Sentence(sentence) => Ok(embedding_for(sentence)),
            EmbeddingInput::Image(_) => Ok(vec![1.0; KEYWORDS.len()]),
        }
    }
}

struct StoredDescriptor {
    id: String,
    label: String,
    vector: Embeddings,
    payload: DescriptorPayload,
    image: Option<Vec<u8>>,
}

/// In-memory stand-in for the vector store, enforcing the same contract:
/// a collection must be set first, deletions need confirmation, upserts are
/// keyed by id.
#[derive(Default)]
pub struct FakeDescriptorStorage {
    collection: Option<String>,
    records: Mutex<Vec<StoredDescriptor>>,
    nb_queries: Mutex<usize>,
}

impl FakeDescriptorStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nb_queries(&self) -> usize {
        *self.nb_queries.lock().unwrap()
    }

    pub fn stored_ids(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.id.clone())
            .collect()
    }

    fn ensure_collection(&self) -> Result<(), DescriptorStorageError> {
        match self.collection {
            Some(_) => Ok(()),
            None => Err(DescriptorStorageError::CollectionNotSet),
        }
    }

    fn upsert(&self, descriptor: StoredDescriptor) {
        let mut records = self.records.lock().unwrap();
        records.retain(|record| record.id != descriptor.id);
        records.push(descriptor);
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl DescriptorStorage for FakeDescriptorStorage {
    async fn set_collection(
        &mut self,
        name: &str,
        _dimensions: u64,
    ) -> Result<(), DescriptorStorageError> {
        self.collection = Some(name.to_string());
        Ok(())
    }

    async fn ingest_embeddings(
        &self,
        vectors: Vec<Embeddings>,
        ids: Vec<String>,
        payloads: Vec<DescriptorPayload>,
    ) -> Result<(), DescriptorStorageError> {
        self.ensure_collection()?;
        if ids.len() != vectors.len() || payloads.len() != vectors.len() {
            return Err(DescriptorStorageError::MismatchedBatch {
                vectors: vectors.len(),
                ids: ids.len(),
                payloads: payloads.len(),
            });
        }

        for ((vector, id), payload) in vectors.into_iter().zip(ids).zip(payloads) {
            let label = payload
                .get("label")
                .and_then(JsonValue::as_str)
                .unwrap_or("unknown")
                .to_string();
            self.upsert(StoredDescriptor {
                id,
                label,
                vector,
                payload,
                image: None,
            });
        }
        Ok(())
    }

    async fn query_embeddings(
        &self,
        vector: Embeddings,
        top_k: u64,
        include_images: bool,
    ) -> Result<Vec<QueryMatch>, DescriptorStorageError> {
        self.ensure_collection()?;
        *self.nb_queries.lock().unwrap() += 1;

        let records = self.records.lock().unwrap();
        let mut scored: Vec<(f32, QueryMatch)> = records
            .iter()
            .map(|record| {
                let distance = l2_distance(&vector, &record.vector);
                (
                    distance,
                    QueryMatch {
                        id: record.id.clone(),
                        label: record.label.clone(),
                        score: distance,
                        payload: record.payload.clone(),
                        image: if include_images {
                            record.image.clone()
                        } else {
                            None
                        },
                    },
                )
            })
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(scored
            .into_iter()
            .take(top_k as usize)
            .map(|(_, query_match)| query_match)
            .collect())
    }

    async fn add_image(
        &self,
        id: &str,
        bytes: Vec<u8>,
        payload: DescriptorPayload,
    ) -> Result<(), DescriptorStorageError> {
        self.ensure_collection()?;
        self.upsert(StoredDescriptor {
            id: id.to_string(),
            label: "image".into(),
            vector: vec![0.0; KEYWORDS.len()],
            payload,
            image: Some(bytes),
        });
        Ok(())
    }

    async fn add_image_with_embedding(
        &self,
        id: &str,
        bytes: Vec<u8>,
        embedding: Embeddings,
        payload: DescriptorPayload,
    ) -> Result<(), DescriptorStorageError> {
        self.ensure_collection()?;
        self.upsert(StoredDescriptor {
            id: id.to_string(),
            label: "image".into(),
            vector: embedding,
            payload,
            image: Some(bytes),
        });
        Ok(())
    }

    async fn find_image(&self, id: &str) -> Result<Option<Vec<u8>>, DescriptorStorageError> {
        self.ensure_collection()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.id == id)
            .and_then(|record| record.image.clone()))
    }

    async fn delete_descriptors(
        &self,
        ids: &[String],
        confirm: bool,
    ) -> Result<(), DescriptorStorageError> {
        if !confirm {
            return Err(DescriptorStorageError::MissingConfirmation(format!(
                "{} descriptors",
                ids.len()
            )));
        }
        self.ensure_collection()?;

        self.records
            .lock()
            .unwrap()
            .retain(|record| !ids.contains(&record.id));
        Ok(())
    }

    async fn delete_descriptor_set(&self, confirm: bool) -> Result<(), DescriptorStorageError> {
        if !confirm {
            return Err(DescriptorStorageError::MissingConfirmation(
                "the whole descriptor set".into(),
            ));
        }
        self.ensure_collection()?;

        self.records.lock().unwrap().clear();
        Ok(())
    }
}

/// Replays canned structured answers, recording every request.
pub struct FakeChatCompletion {
    responses: Mutex<VecDeque<JsonValue>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeChatCompletion {
    pub fn new(responses: Vec<JsonValue>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn nb_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for FakeChatCompletion {
    async fn complete_structured(
        &self,
        request: ChatRequest,
    ) -> Result<JsonValue, ChatCompletionError> {
        self.requests.lock().unwrap().push(request);

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChatCompletionError::ApiError("No canned answer left".into()))
    }
}
