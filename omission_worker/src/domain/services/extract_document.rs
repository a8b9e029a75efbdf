use std::path::Path;

use common::helper::error_chain_fmt;
use tracing::warn;

use crate::domain::{
    entities::{document_element::DocumentElement, ocr_line::OcrLine},
    readers::{
        ocr_reader::{self, OcrReaderError},
        pdf_reader::{PdfReader, PdfReaderError},
    },
};

/// Raw content extracted from a source document.
#[derive(Debug, Clone)]
pub enum ExtractedDocument {
    /// OCR output for image inputs.
    OcrLines(Vec<OcrLine>),
    /// Partitioned elements for PDF inputs.
    Elements(Vec<DocumentElement>),
}

#[derive(thiserror::Error)]
pub enum ExtractDocumentError {
    #[error("The document '{0}' does not exist")]
    DocumentNotFound(String),

    #[error(transparent)]
    OcrReaderError(#[from] OcrReaderError),

    #[error(transparent)]
    PdfReaderError(#[from] PdfReaderError),
}

impl std::fmt::Debug for ExtractDocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Extracts raw content from a document, branching on its extension.
///
/// Image formats go through OCR, PDFs through layout partitioning. A missing
/// path is an error; an unsupported extension yields `Ok(None)` with a
/// warning, not a hard failure.
#[tracing::instrument(name = "Extracting document content")]
pub fn extract_document(path: &Path) -> Result<Option<ExtractedDocument>, ExtractDocumentError> {
    if !path.exists() {
        return Err(ExtractDocumentError::DocumentNotFound(
            path.display().to_string(),
        ));
    }

    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" | "jpg" | "jpeg" => Ok(Some(ExtractedDocument::OcrLines(
            ocr_reader::read_image_lines(path)?,
        ))),
        "pdf" => {
            let reader = PdfReader::try_from_path(path)?;
            Ok(Some(ExtractedDocument::Elements(reader.partition()?)))
        }
        other => {
            warn!("Unsupported file type: .{}", other);
            Ok(None)
        }
    }
}

/// Flattens extracted content into one whitespace-normalized string.
pub fn clean_text(document: &ExtractedDocument) -> String {
    let parts: Vec<&str> = match document {
        ExtractedDocument::OcrLines(lines) => lines.iter().map(|line| line.text.as_str()).collect(),
        ExtractedDocument::Elements(elements) => {
            elements.iter().map(|element| element.text.as_str()).collect()
        }
    };

    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::document_element::ElementCategory;

    #[test]
    fn a_missing_document_is_a_not_found_error() {
        let result = extract_document(Path::new("does/not/exist.pdf"));

        assert!(matches!(
            result,
            Err(ExtractDocumentError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn an_unsupported_extension_yields_no_result() {
        // Any file guaranteed to exist in the crate
        let result = extract_document(Path::new("Cargo.toml")).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn clean_text_joins_and_normalizes_whitespace() {
        let document = ExtractedDocument::OcrLines(vec![
            OcrLine {
                bounding_box: None,
                text: "Drug X relieves   pain".into(),
                confidence: 0.93,
            },
            OcrLine {
                bounding_box: None,
                text: "within minutes".into(),
                confidence: 0.88,
            },
        ]);

        assert_eq!(
            clean_text(&document),
            "Drug X relieves pain within minutes"
        );
    }

    #[test]
    fn clean_text_flattens_partitioned_elements() {
        let document = ExtractedDocument::Elements(vec![
            DocumentElement::new(ElementCategory::Title, "Fast Relief", 1),
            DocumentElement::new(ElementCategory::NarrativeText, "Works in minutes.", 1),
        ]);

        assert_eq!(clean_text(&document), "Fast Relief Works in minutes.");
    }
}
