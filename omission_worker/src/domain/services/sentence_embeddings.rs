use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
};

use async_trait::async_trait;
use rust_bert::pipelines::sentence_embeddings::{
    SentenceEmbeddingsBuilder, SentenceEmbeddingsModelType,
};
use tokio::{sync::oneshot, task};
use tracing::{debug, error, info};

use crate::{
    domain::entities::descriptor::Embeddings,
    ports::embeddings_generator::{EmbeddingInput, EmbeddingsGenerator, EmbeddingsGeneratorError},
};

/// Message type for the internal channel: input sentences and a sender for
/// the generated embeddings
type RunnerMessage = (Vec<String>, oneshot::Sender<Result<Vec<Embeddings>, String>>);

/// Generates embeddings in-process with a sentence-embeddings model
/// available from Hugging Face.
///
/// The model runs on a dedicated synchronous thread: running extensive
/// calculations inside a future should be avoided. Requests go through a
/// bounded channel, results come back on a oneshot.
pub struct SentenceEmbeddingsService {
    sender_to_runner: mpsc::SyncSender<RunnerMessage>,
    _thread_handle: JoinHandle<()>,
}

impl SentenceEmbeddingsService {
    /// Spawns the embeddings runner for the configured model and returns the
    /// service interacting with it.
    pub fn try_new(model_name: &str) -> Result<Self, EmbeddingsGeneratorError> {
        let model_type = model_type_from_name(model_name).ok_or_else(|| {
            EmbeddingsGeneratorError::ModelError(format!(
                "Unknown sentence-embeddings model '{}'",
                model_name
            ))
        })?;

        let (sender, receiver) = mpsc::sync_channel(100);
        let handle = thread::spawn(move || Self::runner(model_type, receiver));

        Ok(Self {
            sender_to_runner: sender,
            _thread_handle: handle,
        })
    }

    /// The embeddings generator runner itself
    #[tracing::instrument(name = "Embeddings runner", skip(receiver))]
    fn runner(model_type: SentenceEmbeddingsModelType, receiver: mpsc::Receiver<RunnerMessage>) {
        let model = match SentenceEmbeddingsBuilder::remote(model_type).create_model() {
            Ok(model) => model,
            Err(error) => {
                error!(?error, "Could not load the embeddings model");
                return;
            }
        };
        info!("Embeddings model loaded ✅");

        while let Ok((sentences, sender)) = receiver.recv() {
            let sentences: Vec<&str> = sentences.iter().map(String::as_str).collect();
            let embeddings = model.encode(&sentences).map_err(|error| error.to_string());

            // The requester may have given up in the meantime
            let _ = sender.send(embeddings);
        }
    }
}

#[async_trait]
impl EmbeddingsGenerator for SentenceEmbeddingsService {
    #[tracing::instrument(name = "Generating embeddings", skip(self, sentences))]
    async fn embed_batch(
        &self,
        sentences: &[String],
    ) -> Result<Vec<Embeddings>, EmbeddingsGeneratorError> {
        if sentences.is_empty() {
            return Err(EmbeddingsGeneratorError::EmptyInput);
        }
        debug!(nb_sentences = sentences.len(), "Sending sentences to the runner");

        let (sender, receiver) = oneshot::channel();

        task::block_in_place(|| self.sender_to_runner.send((sentences.to_vec(), sender)))
            .map_err(|_| {
                EmbeddingsGeneratorError::ModelError("The embeddings runner is gone".into())
            })?;

        let embeddings = receiver
            .await
            .map_err(|_| {
                EmbeddingsGeneratorError::ModelError(
                    "The embeddings runner dropped the request".into(),
                )
            })?
            .map_err(EmbeddingsGeneratorError::ModelError)?;

        if embeddings.len() != sentences.len() {
            return Err(EmbeddingsGeneratorError::CountMismatch {
                expected: sentences.len(),
                returned: embeddings.len(),
            });
        }

        Ok(embeddings)
    }

    async fn embed_input(
        &self,
        input: &EmbeddingInput,
    ) -> Result<Embeddings, EmbeddingsGeneratorError> {
        match input {
            EmbeddingInput::Sentence(sentence) => {
                let mut embeddings = self.embed_batch(std::slice::from_ref(sentence)).await?;
                Ok(embeddings.remove(0))
            }
            EmbeddingInput::Image(path) => Err(EmbeddingsGeneratorError::UnsupportedInput(
                format!(
                    "the local sentence-embeddings backend cannot embed images ({})",
                    path.display()
                ),
            )),
        }
    }
}

fn model_type_from_name(name: &str) -> Option<SentenceEmbeddingsModelType> {
    match name {
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Some(SentenceEmbeddingsModelType::AllMiniLmL6V2)
        }
        "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => {
            Some(SentenceEmbeddingsModelType::AllMiniLmL12V2)
        }
        "all-distilroberta-v1" | "sentence-transformers/all-distilroberta-v1" => {
            Some(SentenceEmbeddingsModelType::AllDistilrobertaV1)
        }
        "paraphrase-albert-small-v2" => Some(SentenceEmbeddingsModelType::ParaphraseAlbertSmallV2),
        "sentence-t5-base" => Some(SentenceEmbeddingsModelType::SentenceT5Base),
        "distiluse-base-multilingual-cased" => {
            Some(SentenceEmbeddingsModelType::DistiluseBaseMultilingualCased)
        }
        "bert-base-nli-mean-tokens" => Some(SentenceEmbeddingsModelType::BertBaseNliMeanTokens),
        _ => None,
    }
}
