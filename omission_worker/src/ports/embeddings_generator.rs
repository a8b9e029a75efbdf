use std::path::PathBuf;

use async_trait::async_trait;
use common::helper::error_chain_fmt;

use crate::domain::entities::descriptor::Embeddings;

/// Input accepted by a multimodal embedding model.
#[derive(Debug, Clone)]
pub enum EmbeddingInput {
    Sentence(String),
    /// Path to an image file, sent to the model as raw bytes.
    Image(PathBuf),
}

/// Turns text (and, for multimodal models, images) into dense vectors.
///
/// The concrete model is selected once at startup from configuration and
/// injected into the components that need it.
#[async_trait]
pub trait EmbeddingsGenerator: Send + Sync {
    /// Embeds a batch of sentences, one vector per input in input order.
    ///
    /// An empty batch is an input error, not an empty result.
    async fn embed_batch(
        &self,
        sentences: &[String],
    ) -> Result<Vec<Embeddings>, EmbeddingsGeneratorError>;

    /// Embeds a single sentence or image.
    async fn embed_input(
        &self,
        input: &EmbeddingInput,
    ) -> Result<Embeddings, EmbeddingsGeneratorError>;
}

#[derive(thiserror::Error)]
pub enum EmbeddingsGeneratorError {
    #[error("The list of sentences to embed is empty")]
    EmptyInput,

    #[error("The embedding model returned {returned} vectors for {expected} inputs")]
    CountMismatch { expected: usize, returned: usize },

    #[error("The configured model cannot embed this input: {0}")]
    UnsupportedInput(String),

    #[error("Could not read input file {path}: {source}")]
    InputFile {
        path: String,
        source: std::io::Error,
    },

    #[error("Embedding model error: {0}")]
    ModelError(String),
}

impl std::fmt::Debug for EmbeddingsGeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
