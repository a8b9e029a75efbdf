use std::path::Path;
use std::sync::Arc;

use common::helper::error_chain_fmt;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::{
    domain::{
        entities::{
            descriptor::DescriptorPayload, document_element::ElementCategory,
            page_record::PageRecord,
        },
        readers::pdf_reader::{PdfReader, PdfReaderError},
        services::page_aggregation::{aggregate_pages, chunk_by_title},
    },
    ports::{
        descriptor_storage::{DescriptorStorage, DescriptorStorageError},
        embeddings_generator::{EmbeddingInput, EmbeddingsGenerator, EmbeddingsGeneratorError},
    },
};

/// What one ingestion run persisted.
#[derive(Debug, Clone, Copy)]
pub struct IngestionSummary {
    pub ingested_pages: usize,
    pub stored_images: usize,
}

#[derive(thiserror::Error)]
pub enum ExecuteHandlerIngestClinicalDocError {
    #[error("The document '{0}' does not exist")]
    DocumentNotFound(String),

    #[error("The clinical document must be a PDF, got '{0}'")]
    UnsupportedDocumentType(String),

    #[error(transparent)]
    PdfReaderError(#[from] PdfReaderError),

    #[error(transparent)]
    EmbeddingsGeneratorError(#[from] EmbeddingsGeneratorError),

    #[error(transparent)]
    DescriptorStorageError(#[from] DescriptorStorageError),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

impl std::fmt::Debug for ExecuteHandlerIngestClinicalDocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Ingests one clinical document into the vector store.
///
/// Extracts elements and images, aggregates them per page, embeds each
/// page's combined text and upserts one descriptor per page (id `page_<n>`)
/// plus one image entity per exported image (id `img_<n>`). Re-running the
/// ingestion upserts the same ids instead of duplicating them.
#[tracing::instrument(
    name = "Executing clinical document ingestion",
    skip(storage, embeddings, embed_images)
)]
pub async fn execute_handler(
    storage: Arc<dyn DescriptorStorage>,
    embeddings: Arc<dyn EmbeddingsGenerator>,
    clinical_doc: &Path,
    images_output_dir: &Path,
    embed_images: bool,
) -> Result<IngestionSummary, ExecuteHandlerIngestClinicalDocError> {
    if !clinical_doc.exists() {
        return Err(ExecuteHandlerIngestClinicalDocError::DocumentNotFound(
            clinical_doc.display().to_string(),
        ));
    }
    let extension = clinical_doc
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if extension != "pdf" {
        return Err(
            ExecuteHandlerIngestClinicalDocError::UnsupportedDocumentType(extension),
        );
    }

    let reader = PdfReader::try_from_path(clinical_doc)?;
    let elements = reader.partition()?;
    let images = reader.extract_images(images_output_dir)?;

    let tables: Vec<_> = elements
        .iter()
        .filter(|element| element.category == ElementCategory::Table)
        .cloned()
        .collect();
    let chunks = chunk_by_title(&elements);

    info!(
        nb_elements = elements.len(),
        nb_chunks = chunks.len(),
        nb_tables = tables.len(),
        nb_images = images.len(),
        "Partitioned the clinical document"
    );

    let pages = aggregate_pages(&chunks, &tables, &images);

    let sentences: Vec<String> = pages.iter().map(|page| page.text.clone()).collect();
    let vectors = embeddings.embed_batch(&sentences).await?;

    let ids: Vec<String> = pages
        .iter()
        .map(|page| format!("page_{}", page.page_number))
        .collect();
    let payloads: Vec<DescriptorPayload> = pages.iter().map(page_payload).collect();

    storage.ingest_embeddings(vectors, ids, payloads).await?;

    let mut stored_images = 0;
    for page in &pages {
        let Some(image) = &page.image else { continue };
        let bytes = std::fs::read(&image.path)?;

        let payload: DescriptorPayload = [
            ("page".to_string(), JsonValue::from(image.page_number)),
            (
                "filename".to_string(),
                JsonValue::from(image.path.display().to_string()),
            ),
        ]
        .into_iter()
        .collect();

        if embed_images {
            let embedding = embeddings
                .embed_input(&EmbeddingInput::Image(image.path.clone()))
                .await?;
            storage
                .add_image_with_embedding(&image.id, bytes, embedding, payload)
                .await?;
        } else {
            storage.add_image(&image.id, bytes, payload).await?;
        }
        stored_images += 1;
    }

    let summary = IngestionSummary {
        ingested_pages: pages.len(),
        stored_images,
    };
    info!(
        nb_pages = summary.ingested_pages,
        nb_images = summary.stored_images,
        "Successfully ingested the clinical document"
    );

    Ok(summary)
}

fn page_payload(page: &PageRecord) -> DescriptorPayload {
    let mut payload: DescriptorPayload = [
        ("label".to_string(), JsonValue::from("text")),
        ("text".to_string(), JsonValue::from(page.text.as_str())),
        ("page_number".to_string(), JsonValue::from(page.page_number)),
    ]
    .into_iter()
    .collect();

    if let Some(table) = &page.table {
        payload.insert("table".into(), JsonValue::from(table.as_str()));
    }

    payload
}
