use async_trait::async_trait;
use common::helper::error_chain_fmt;

use crate::domain::entities::descriptor::{DescriptorPayload, Embeddings, QueryMatch};

/// Capability interface over the vector database: declare a descriptor set,
/// upsert vectors and images by id, query nearest neighbors, delete.
///
/// Kept minimal so the concrete store is swappable without touching the
/// orchestration logic.
#[async_trait]
pub trait DescriptorStorage: Send + Sync {
    /// Declares the active descriptor set, creating it remotely when absent.
    ///
    /// Must be called before any ingest or query operation.
    async fn set_collection(
        &mut self,
        name: &str,
        dimensions: u64,
    ) -> Result<(), DescriptorStorageError>;

    /// Upserts one descriptor per vector, keyed by the matching id.
    ///
    /// Upsert-by-id is idempotent: re-ingesting an id overwrites the
    /// previous descriptor instead of duplicating it.
    async fn ingest_embeddings(
        &self,
        vectors: Vec<Embeddings>,
        ids: Vec<String>,
        payloads: Vec<DescriptorPayload>,
    ) -> Result<(), DescriptorStorageError>;

    /// Returns up to `top_k` nearest descriptors under the collection metric.
    ///
    /// With `include_images`, hits labeled `image` also carry their raw
    /// image bytes.
    async fn query_embeddings(
        &self,
        vector: Embeddings,
        top_k: u64,
        include_images: bool,
    ) -> Result<Vec<QueryMatch>, DescriptorStorageError>;

    /// Stores raw image bytes under `id`, without an embedding.
    async fn add_image(
        &self,
        id: &str,
        bytes: Vec<u8>,
        payload: DescriptorPayload,
    ) -> Result<(), DescriptorStorageError>;

    /// Stores raw image bytes under `id`, paired with a vision-model
    /// embedding so the image participates in similarity search.
    async fn add_image_with_embedding(
        &self,
        id: &str,
        bytes: Vec<u8>,
        embedding: Embeddings,
        payload: DescriptorPayload,
    ) -> Result<(), DescriptorStorageError>;

    /// Retrieves the raw bytes of a stored image, `None` when unknown.
    async fn find_image(&self, id: &str) -> Result<Option<Vec<u8>>, DescriptorStorageError>;

    /// Removes the descriptors with the given ids. Refuses without `confirm`.
    async fn delete_descriptors(
        &self,
        ids: &[String],
        confirm: bool,
    ) -> Result<(), DescriptorStorageError>;

    /// Drops the whole descriptor set. Refuses without `confirm`.
    async fn delete_descriptor_set(&self, confirm: bool) -> Result<(), DescriptorStorageError>;
}

#[derive(thiserror::Error)]
pub enum DescriptorStorageError {
    #[error("No descriptor set selected. Call `set_collection` first")]
    CollectionNotSet,

    #[error("Received {ids} ids and {payloads} payloads for {vectors} vectors")]
    MismatchedBatch {
        vectors: usize,
        ids: usize,
        payloads: usize,
    },

    #[error(
        "Refusing to delete {0} without confirmation: \
         the operation permanently removes persisted data"
    )]
    MissingConfirmation(String),

    #[error("Error from the vector store: {0}")]
    StoreError(String),
}

impl std::fmt::Debug for DescriptorStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
