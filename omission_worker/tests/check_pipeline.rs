//! End-to-end scenario over in-memory fakes: ingest page descriptors the way
//! the ingestion handler does, then run claim extraction and the omission
//! check against them.

mod helpers;

use std::sync::Arc;

use serde_json::json;

use helpers::{embedding_for, FakeChatCompletion, FakeDescriptorStorage, FakeEmbeddingsGenerator};
use omission_worker::{
    domain::{
        entities::{
            consistency::ConsistencyVerdict,
            descriptor::DescriptorPayload,
            omission_report::OmissionCategory,
        },
        services::{
            omission_check::{OmissionCheckService, NO_OBSERVATION_SENTINEL},
            omission_extraction::OmissionExtractionService,
        },
    },
    ports::descriptor_storage::DescriptorStorage,
};

const SIDE_EFFECTS_PAGE: &str =
    "Dizziness and nausea were the most common side effects observed in the study. \
     Serious adverse events occurred in 2% of patients.";
const DOSING_PAGE: &str = "The recommended dose is 10 mg once daily with food.";

fn page_payload(text: &str, page_number: u32) -> DescriptorPayload {
    [
        ("label".to_string(), json!("text")),
        ("text".to_string(), json!(text)),
        ("page_number".to_string(), json!(page_number)),
    ]
    .into_iter()
    .collect()
}

async fn ingested_storage() -> FakeDescriptorStorage {
    let mut storage = FakeDescriptorStorage::new();
    storage.set_collection("trial1", 8).await.unwrap();

    storage
        .ingest_embeddings(
            vec![embedding_for(DOSING_PAGE), embedding_for(SIDE_EFFECTS_PAGE)],
            vec!["page_2".to_string(), "page_4".to_string()],
            vec![page_payload(DOSING_PAGE, 2), page_payload(SIDE_EFFECTS_PAGE, 4)],
        )
        .await
        .unwrap();

    storage
}

#[tokio::test]
async fn ingesting_then_querying_the_same_vector_returns_its_id_in_the_top_k() {
    let storage = ingested_storage().await;

    let matches = storage
        .query_embeddings(embedding_for(SIDE_EFFECTS_PAGE), 5, false)
        .await
        .unwrap();

    assert_eq!(matches[0].id, "page_4");
    assert_eq!(
        matches[0].payload.get("page_number"),
        Some(&json!(4))
    );
}

#[tokio::test]
async fn re_ingesting_an_id_upserts_instead_of_duplicating() {
    let storage = ingested_storage().await;

    storage
        .ingest_embeddings(
            vec![embedding_for(SIDE_EFFECTS_PAGE)],
            vec!["page_4".to_string()],
            vec![page_payload(SIDE_EFFECTS_PAGE, 4)],
        )
        .await
        .unwrap();

    assert_eq!(storage.stored_ids().len(), 2);
}

#[tokio::test]
async fn confirmed_deletions_remove_the_targeted_descriptors() {
    let storage = ingested_storage().await;

    storage
        .delete_descriptors(&["page_2".to_string()], true)
        .await
        .unwrap();

    assert_eq!(storage.stored_ids(), vec!["page_4".to_string()]);
}

#[tokio::test]
async fn a_misleading_claim_about_side_effects_is_judged_an_omission() {
    let embeddings = Arc::new(FakeEmbeddingsGenerator::new());
    let storage = Arc::new(ingested_storage().await);

    // First canned answer: the extraction report. Second: the consistency
    // verdict for its single observation.
    let chat = Arc::new(FakeChatCompletion::new(vec![
        json!({
            "omitted_side_effects_and_risks":
                ["The post claims there are no serious side effects"],
            "omitted_contraindications": [],
            "omitted_safety_information": [],
            "omitted_efficacy_and_limitations": [],
            "omitted_clinical_evidence": [],
        }),
        json!({
            "verdict": "Omission",
            "reason": "The clinical report lists dizziness, nausea and serious adverse events"
        }),
    ]));

    let extraction_service = OmissionExtractionService::new(chat.clone());
    let check_service =
        OmissionCheckService::new(embeddings.clone(), storage.clone(), chat.clone());

    let post = "Drug X has no serious side effects and works for everyone.";
    let report = extraction_service.extract(post).await.unwrap();
    let results = check_service.process_observations(post, &report).await.unwrap();

    // Category order is fixed; the side-effects category leads
    assert_eq!(results.len(), 5);
    assert_eq!(results[0].category, OmissionCategory::SideEffectsAndRisks);
    assert_eq!(
        results[0].findings[0].0,
        "The post claims there are no serious side effects"
    );
    assert!(matches!(
        results[0].findings[0].1,
        ConsistencyVerdict::Omission { .. }
    ));

    // The other four categories short-circuit to the sentinel
    for result in &results[1..] {
        assert_eq!(
            result.findings,
            vec![(
                NO_OBSERVATION_SENTINEL.to_string(),
                ConsistencyVerdict::NoDocumentsFound
            )]
        );
    }

    // One extraction call + one consistency call; the retrieved side-effects
    // page reached the consistency prompt
    assert_eq!(chat.nb_calls(), 2);
    let consistency_request = &chat.requests()[1];
    assert!(consistency_request.user_content.contains("Dizziness and nausea"));
}
