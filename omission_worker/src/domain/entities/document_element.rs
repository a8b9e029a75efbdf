use serde::{Deserialize, Serialize};

/// Layout category of a partitioned document element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementCategory {
    Title,
    NarrativeText,
    Table,
}

/// One typed element produced by partitioning a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentElement {
    pub category: ElementCategory,
    pub text: String,
    /// 1-based page the element was found on.
    pub page_number: u32,
}

impl DocumentElement {
    pub fn new(category: ElementCategory, text: impl Into<String>, page_number: u32) -> Self {
        Self {
            category,
            text: text.into(),
            page_number,
        }
    }
}
