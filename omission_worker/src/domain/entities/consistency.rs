use serde::{Deserialize, Serialize};

use crate::domain::entities::omission_report::OmissionCategory;

/// Outcome of checking one observation against the retrieved documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyVerdict {
    /// The documents support that the information was indeed omitted from
    /// the post and should have been present.
    Omission { reason: String },
    /// No actionable omission.
    Fine { reason: String },
    /// Retrieval returned nothing to judge against.
    NoDocumentsFound,
}

impl std::fmt::Display for ConsistencyVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyVerdict::Omission { reason } => write!(f, "Omission - {}", reason),
            ConsistencyVerdict::Fine { reason } => write!(f, "Fine - {}", reason),
            ConsistencyVerdict::NoDocumentsFound => f.write_str("No documents found"),
        }
    }
}

/// Check results for one category, keeping the category's original
/// observation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: OmissionCategory,
    pub findings: Vec<(String, ConsistencyVerdict)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_render_their_status_and_reason() {
        let verdict = ConsistencyVerdict::Omission {
            reason: "The retrieved trial report lists dizziness".into(),
        };
        assert_eq!(
            verdict.to_string(),
            "Omission - The retrieved trial report lists dizziness"
        );

        assert_eq!(
            ConsistencyVerdict::NoDocumentsFound.to_string(),
            "No documents found"
        );
    }
}
