use std::sync::Arc;

use common::helper::error_chain_fmt;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::{
    domain::entities::omission_report::MarketingOmissionReport,
    ports::chat_completion::{ChatCompletion, ChatCompletionError, ChatRequest},
};

/// Fixed instruction for the claim extractor. One call covers all five
/// categories; the answer must satisfy the report schema.
const EXTRACTION_SYSTEM_PROMPT: &str = "\
Analyze the document and assess whether critical information is omitted under the following categories. \
Provide a general statement for each category about whether omissions are present and what their potential \
effect might be, without relying on specific medical knowledge:\n\
- Side Effects and Risks: Evaluate whether any discussion of potential adverse reactions is missing and the \
implications of this omission for informed decision-making.\n\
- Contraindications: Determine if the document excludes mention of specific conditions or populations for whom \
the drug might be unsafe and explain how this could affect general understanding.\n\
- Safety Information: Assess if general safety warnings or advisories are absent and how this might impact the \
perception of safety.\n\
- Efficacy and Limitations: Identify whether information about the drug's effectiveness or situations where it \
may not work is omitted and consider the potential effect on setting realistic expectations.\n\
- Clinical Evidence and Research: Check if references to studies, data, or regulatory approvals are omitted and \
discuss how this might influence trust or credibility.\n\
For each category where omissions are identified, provide a generalized description of the potential effects \
without making specific medical assumptions or recommendations.";

/// Asks the LLM to enumerate candidate omissions in a marketing post, one
/// list per category.
pub struct OmissionExtractionService {
    chat: Arc<dyn ChatCompletion>,
}

impl OmissionExtractionService {
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self { chat }
    }

    /// One structured chat call over the cleaned post text.
    ///
    /// An empty list in the returned report means "no omission observations
    /// found" for that category, not "unchecked".
    #[tracing::instrument(name = "Extracting omission observations", skip(self, post))]
    pub async fn extract(
        &self,
        post: &str,
    ) -> Result<MarketingOmissionReport, OmissionExtractionError> {
        let request = ChatRequest {
            system_prompt: EXTRACTION_SYSTEM_PROMPT.into(),
            user_content: post.to_string(),
            schema_name: "marketing_omission_report".into(),
            response_schema: report_schema(),
        };

        let answer = self.chat.complete_structured(request).await?;
        let report: MarketingOmissionReport = serde_json::from_value(answer)
            .map_err(|error| OmissionExtractionError::StructuredParseError(error.to_string()))?;

        info!(
            nb_side_effects = report.omitted_side_effects_and_risks.len(),
            nb_contraindications = report.omitted_contraindications.len(),
            nb_safety = report.omitted_safety_information.len(),
            nb_efficacy = report.omitted_efficacy_and_limitations.len(),
            nb_clinical_evidence = report.omitted_clinical_evidence.len(),
            "Extracted omission observations"
        );

        Ok(report)
    }
}

/// JSON schema of `MarketingOmissionReport`, sent as the response format.
fn report_schema() -> JsonValue {
    let string_list = json!({ "type": "array", "items": { "type": "string" } });

    json!({
        "type": "object",
        "properties": {
            "omitted_side_effects_and_risks": string_list,
            "omitted_contraindications": string_list,
            "omitted_safety_information": string_list,
            "omitted_efficacy_and_limitations": string_list,
            "omitted_clinical_evidence": string_list,
        },
        "required": [
            "omitted_side_effects_and_risks",
            "omitted_contraindications",
            "omitted_safety_information",
            "omitted_efficacy_and_limitations",
            "omitted_clinical_evidence",
        ],
        "additionalProperties": false,
    })
}

#[derive(thiserror::Error)]
pub enum OmissionExtractionError {
    #[error(transparent)]
    ChatCompletionError(#[from] ChatCompletionError),

    #[error("LLM answer did not match the report schema: {0}")]
    StructuredParseError(String),
}

impl std::fmt::Debug for OmissionExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
