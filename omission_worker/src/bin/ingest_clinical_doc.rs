use common::telemetry::{get_tracing_subscriber, init_tracing_subscriber};
use omission_worker::{configuration::get_configuration, startup::Application};
use tracing::info;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let tracing_subscriber =
        get_tracing_subscriber("ingest_clinical_doc".into(), "info".into(), std::io::stdout);
    init_tracing_subscriber(tracing_subscriber);

    // Panics if the configuration can't be read
    let configuration = get_configuration().expect("Failed to read configuration.");

    let application = match Application::build(configuration).await {
        Ok(application) => application,
        Err(error) => panic!("Failed to build application: {:?}", error),
    };

    let summary = match application.ingest_clinical_document().await {
        Ok(summary) => summary,
        Err(error) => panic!("Failed to ingest the clinical document: {:?}", error),
    };

    info!(
        nb_pages = summary.ingested_pages,
        nb_images = summary.stored_images,
        "Ingestion run finished 👋"
    );

    Ok(())
}
