use std::sync::Arc;

use qdrant_client::prelude::{QdrantClient, QdrantClientConfig};
use secrecy::ExposeSecret;

use crate::{
    configuration::{EmbeddingsBackend, EmbeddingsSettings, QdrantSettings, Settings},
    domain::{
        entities::consistency::CategoryResult,
        services::{
            omission_check::OmissionCheckService, omission_extraction::OmissionExtractionService,
        },
    },
    handlers::{
        handler_check_marketing_post::{self, ExecuteHandlerCheckMarketingPostError},
        handler_ingest_clinical_doc::{self, ExecuteHandlerIngestClinicalDocError, IngestionSummary},
    },
    ports::{
        chat_completion::{ChatCompletion, ChatCompletionError},
        descriptor_storage::{DescriptorStorage, DescriptorStorageError},
        embeddings_generator::{EmbeddingsGenerator, EmbeddingsGeneratorError},
    },
    repositories::{
        chat_completion_openai_repository::ChatCompletionOpenAiRepository,
        descriptor_qdrant_repository::DescriptorQdrantRepository,
        embeddings_inference_repository::EmbeddingsInferenceRepository,
    },
};

/// The composed application: every service and repository is built once
/// here and injected into the handlers.
pub struct Application {
    settings: Settings,
    embeddings: Arc<dyn EmbeddingsGenerator>,
    storage: Arc<dyn DescriptorStorage>,
    chat: Arc<dyn ChatCompletion>,
}

impl Application {
    #[tracing::instrument(name = "Building worker application", skip(settings))]
    pub async fn build(settings: Settings) -> Result<Self, ApplicationError> {
        let qdrant_client = get_qdrant_client(&settings.qdrant)?;

        let mut repository = DescriptorQdrantRepository::new(qdrant_client);
        repository
            .set_collection(
                &settings.qdrant.collection,
                settings.qdrant.collection_vector_size,
            )
            .await?;
        let storage: Arc<dyn DescriptorStorage> = Arc::new(repository);

        let embeddings = get_embeddings_generator(&settings.embeddings)?;
        let chat: Arc<dyn ChatCompletion> =
            Arc::new(ChatCompletionOpenAiRepository::try_new(&settings.llm)?);

        Ok(Self {
            settings,
            embeddings,
            storage,
            chat,
        })
    }

    /// Ingests the configured clinical document into the vector store.
    pub async fn ingest_clinical_document(&self) -> Result<IngestionSummary, ApplicationError> {
        handler_ingest_clinical_doc::execute_handler(
            self.storage.clone(),
            self.embeddings.clone(),
            &self.settings.documents.clinical_doc,
            &self.settings.documents.images_output_dir,
            self.settings.embeddings.embed_images,
        )
        .await
        .map_err(Into::into)
    }

    /// Checks the configured marketing document against the ingested corpus.
    pub async fn check_marketing_post(&self) -> Result<Vec<CategoryResult>, ApplicationError> {
        let extraction_service = OmissionExtractionService::new(self.chat.clone());
        let check_service = OmissionCheckService::new(
            self.embeddings.clone(),
            self.storage.clone(),
            self.chat.clone(),
        );

        handler_check_marketing_post::execute_handler(
            &extraction_service,
            &check_service,
            &self.settings.documents.marketing_doc,
        )
        .await
        .map_err(Into::into)
    }
}

/// Sets up a client to Qdrant
pub fn get_qdrant_client(config: &QdrantSettings) -> Result<QdrantClient, ApplicationError> {
    let mut qdrant_config = QdrantClientConfig::from_url(&config.get_grpc_base_url());
    if let Some(api_key) = &config.api_key {
        qdrant_config.api_key = Some(api_key.expose_secret().to_string());
    }

    QdrantClient::new(Some(qdrant_config)).map_err(|e| ApplicationError::QdrantError(e.to_string()))
}

/// Builds the embedding backend selected by the configuration.
fn get_embeddings_generator(
    config: &EmbeddingsSettings,
) -> Result<Arc<dyn EmbeddingsGenerator>, ApplicationError> {
    match config.backend {
        EmbeddingsBackend::Remote => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                ApplicationError::ConfigurationError(
                    "embeddings.endpoint is required for the remote backend".into(),
                )
            })?;

            Ok(Arc::new(EmbeddingsInferenceRepository::try_new(
                endpoint,
                config.api_key.clone(),
                &config.model,
                config.multimodal_model.clone(),
            )?))
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingsBackend::Local => Ok(Arc::new(
            crate::domain::services::sentence_embeddings::SentenceEmbeddingsService::try_new(
                &config.model,
            )?,
        )),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingsBackend::Local => Err(ApplicationError::ConfigurationError(
            "the local embeddings backend needs a build with `--features local-embeddings`".into(),
        )),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error("Error from Qdrant: {0}")]
    QdrantError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error(transparent)]
    DescriptorStorageError(#[from] DescriptorStorageError),

    #[error(transparent)]
    EmbeddingsGeneratorError(#[from] EmbeddingsGeneratorError),

    #[error(transparent)]
    ChatCompletionError(#[from] ChatCompletionError),

    #[error(transparent)]
    ExecuteHandlerIngestClinicalDocError(#[from] ExecuteHandlerIngestClinicalDocError),

    #[error(transparent)]
    ExecuteHandlerCheckMarketingPostError(#[from] ExecuteHandlerCheckMarketingPostError),
}
