use std::path::Path;

use common::helper::error_chain_fmt;
use tracing::info;

use crate::domain::{
    entities::consistency::CategoryResult,
    services::{
        extract_document::{clean_text, extract_document, ExtractDocumentError},
        omission_check::{OmissionCheckError, OmissionCheckService},
        omission_extraction::{OmissionExtractionError, OmissionExtractionService},
    },
};

#[derive(thiserror::Error)]
pub enum ExecuteHandlerCheckMarketingPostError {
    #[error("Nothing to check: the marketing document type is not supported")]
    UnsupportedDocumentType,

    #[error(transparent)]
    ExtractDocumentError(#[from] ExtractDocumentError),

    #[error(transparent)]
    OmissionExtractionError(#[from] OmissionExtractionError),

    #[error(transparent)]
    OmissionCheckError(#[from] OmissionCheckError),
}

impl std::fmt::Debug for ExecuteHandlerCheckMarketingPostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Runs the end-to-end omission check on one marketing document.
///
/// Extracts and cleans the post text, asks the LLM for candidate omissions
/// per category, then cross-references every observation with the vector
/// store and judges it.
#[tracing::instrument(
    name = "Executing marketing post check",
    skip(extraction_service, check_service)
)]
pub async fn execute_handler(
    extraction_service: &OmissionExtractionService,
    check_service: &OmissionCheckService,
    marketing_doc: &Path,
) -> Result<Vec<CategoryResult>, ExecuteHandlerCheckMarketingPostError> {
    let document = extract_document(marketing_doc)?
        .ok_or(ExecuteHandlerCheckMarketingPostError::UnsupportedDocumentType)?;
    let post = clean_text(&document);
    info!(nb_chars = post.len(), "Extracted the marketing post text");

    let report = extraction_service.extract(&post).await?;
    let results = check_service.process_observations(&post, &report).await?;

    info!("Successfully checked the marketing post");
    Ok(results)
}
