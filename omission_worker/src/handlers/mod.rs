pub mod handler_check_marketing_post;
pub mod handler_ingest_clinical_doc;
