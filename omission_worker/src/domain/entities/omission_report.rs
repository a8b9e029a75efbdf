use serde::{Deserialize, Serialize};

/// Candidate omissions the claim extractor found in a marketing post, one
/// list per reviewed category.
///
/// An empty list means "no omission observations found" for that category,
/// not "unchecked".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketingOmissionReport {
    pub omitted_side_effects_and_risks: Vec<String>,
    pub omitted_contraindications: Vec<String>,
    pub omitted_safety_information: Vec<String>,
    pub omitted_efficacy_and_limitations: Vec<String>,
    pub omitted_clinical_evidence: Vec<String>,
}

impl MarketingOmissionReport {
    /// The observation list for one category, in extraction order.
    pub fn observations(&self, category: OmissionCategory) -> &[String] {
        match category {
            OmissionCategory::SideEffectsAndRisks => &self.omitted_side_effects_and_risks,
            OmissionCategory::Contraindications => &self.omitted_contraindications,
            OmissionCategory::SafetyInformation => &self.omitted_safety_information,
            OmissionCategory::EfficacyAndLimitations => &self.omitted_efficacy_and_limitations,
            OmissionCategory::ClinicalEvidence => &self.omitted_clinical_evidence,
        }
    }
}

/// The five fixed categories a marketing post is reviewed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OmissionCategory {
    SideEffectsAndRisks,
    Contraindications,
    SafetyInformation,
    EfficacyAndLimitations,
    ClinicalEvidence,
}

impl OmissionCategory {
    /// Review order. Results keep this order.
    pub const ALL: [OmissionCategory; 5] = [
        OmissionCategory::SideEffectsAndRisks,
        OmissionCategory::Contraindications,
        OmissionCategory::SafetyInformation,
        OmissionCategory::EfficacyAndLimitations,
        OmissionCategory::ClinicalEvidence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OmissionCategory::SideEffectsAndRisks => "omitted_side_effects_and_risks",
            OmissionCategory::Contraindications => "omitted_contraindications",
            OmissionCategory::SafetyInformation => "omitted_safety_information",
            OmissionCategory::EfficacyAndLimitations => "omitted_efficacy_and_limitations",
            OmissionCategory::ClinicalEvidence => "omitted_clinical_evidence",
        }
    }

    /// Human wording used in the consistency-check prompt.
    pub fn description(&self) -> &'static str {
        match self {
            OmissionCategory::SideEffectsAndRisks => "side effects and risks",
            OmissionCategory::Contraindications => "contraindications",
            OmissionCategory::SafetyInformation => "safety information",
            OmissionCategory::EfficacyAndLimitations => "efficacy and limitations",
            OmissionCategory::ClinicalEvidence => "clinical evidence and research",
        }
    }
}

impl std::fmt::Display for OmissionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_parses_from_schema_constrained_json() {
        let value = json!({
            "omitted_side_effects_and_risks": ["No adverse reactions are mentioned"],
            "omitted_contraindications": [],
            "omitted_safety_information": ["No general safety advisory is present"],
            "omitted_efficacy_and_limitations": [],
            "omitted_clinical_evidence": [],
        });

        let report: MarketingOmissionReport = serde_json::from_value(value).unwrap();

        assert_eq!(report.omitted_side_effects_and_risks.len(), 1);
        assert!(report.omitted_contraindications.is_empty());
        assert_eq!(
            report.observations(OmissionCategory::SafetyInformation),
            &["No general safety advisory is present".to_string()]
        );
    }

    #[test]
    fn a_missing_category_field_is_a_parse_error() {
        let value = json!({
            "omitted_side_effects_and_risks": [],
            "omitted_contraindications": [],
        });

        assert!(serde_json::from_value::<MarketingOmissionReport>(value).is_err());
    }
}
