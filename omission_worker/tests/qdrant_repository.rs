//! Contract checks that never reach the remote: state and confirmation
//! guards fire before any call is issued, so an unreachable address is fine.

use qdrant_client::prelude::{QdrantClient, QdrantClientConfig};

use omission_worker::{
    ports::descriptor_storage::{DescriptorStorage, DescriptorStorageError},
    repositories::descriptor_qdrant_repository::DescriptorQdrantRepository,
};

fn repository() -> DescriptorQdrantRepository {
    let config = QdrantClientConfig::from_url("http://127.0.0.1:6334");
    let client = QdrantClient::new(Some(config)).expect("building the lazy client");
    DescriptorQdrantRepository::new(client)
}

#[tokio::test]
async fn ingesting_before_set_collection_is_a_state_error() {
    let result = repository()
        .ingest_embeddings(
            vec![vec![0.1, 0.2]],
            vec!["page_1".to_string()],
            vec![Default::default()],
        )
        .await;

    assert!(matches!(
        result,
        Err(DescriptorStorageError::CollectionNotSet)
    ));
}

#[tokio::test]
async fn querying_before_set_collection_is_a_state_error() {
    let result = repository()
        .query_embeddings(vec![0.1, 0.2], 5, false)
        .await;

    assert!(matches!(
        result,
        Err(DescriptorStorageError::CollectionNotSet)
    ));
}

#[tokio::test]
async fn adding_an_image_before_set_collection_is_a_state_error() {
    let result = repository()
        .add_image("img_1", vec![0xFF, 0xD8], Default::default())
        .await;

    assert!(matches!(
        result,
        Err(DescriptorStorageError::CollectionNotSet)
    ));
}

#[tokio::test]
async fn deleting_descriptors_without_confirmation_is_refused() {
    let result = repository()
        .delete_descriptors(&["page_1".to_string()], false)
        .await;

    let error = result.unwrap_err();
    assert!(matches!(
        error,
        DescriptorStorageError::MissingConfirmation(_)
    ));
    // The error spells out the consequence of confirming
    assert!(error.to_string().contains("permanently removes"));
}

#[tokio::test]
async fn deleting_the_descriptor_set_without_confirmation_is_refused() {
    let result = repository().delete_descriptor_set(false).await;

    assert!(matches!(
        result,
        Err(DescriptorStorageError::MissingConfirmation(_))
    ));
}
