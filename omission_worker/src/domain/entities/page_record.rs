use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One page worth of aggregated clinical content.
///
/// Built transiently during ingestion and dropped once its embeddings have
/// been persisted to the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_number: u32,
    /// All chunk texts assigned to this page, concatenated in encounter order.
    pub text: String,
    pub table: Option<String>,
    pub image: Option<PageImage>,
}

impl PageRecord {
    pub fn new(page_number: u32) -> Self {
        Self {
            page_number,
            text: String::new(),
            table: None,
            image: None,
        }
    }
}

/// An image exported from a source document, written to disk and associated
/// with the page it appeared on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImage {
    /// Sequential id over the whole document: `img_1`, `img_2`, ...
    pub id: String,
    pub page_number: u32,
    pub path: PathBuf,
}
