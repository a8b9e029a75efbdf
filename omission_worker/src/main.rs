use common::telemetry::{get_tracing_subscriber, init_tracing_subscriber};
use omission_worker::{
    configuration::get_configuration, display::display_results, startup::Application,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let tracing_subscriber =
        get_tracing_subscriber("omission_worker".into(), "info".into(), std::io::stdout);
    init_tracing_subscriber(tracing_subscriber);

    // Panics if the configuration can't be read
    let configuration = get_configuration().expect("Failed to read configuration.");

    let application = match Application::build(configuration).await {
        Ok(application) => application,
        Err(error) => panic!("Failed to build application: {:?}", error),
    };

    let results = match application.check_marketing_post().await {
        Ok(results) => results,
        Err(error) => panic!("Failed to check the marketing post: {:?}", error),
    };

    display_results(&results);

    Ok(())
}
