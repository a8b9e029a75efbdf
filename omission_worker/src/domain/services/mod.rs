pub mod extract_document;
pub mod omission_check;
pub mod omission_extraction;
pub mod page_aggregation;
#[cfg(feature = "local-embeddings")]
pub mod sentence_embeddings;
