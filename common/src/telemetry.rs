use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry};

/// Composes the layers of our tracing pipeline into one Subscriber.
///
/// Spans are filtered by `RUST_LOG` when set, `fallback_env_filter` otherwise,
/// and emitted as bunyan-compatible JSON records.
///
/// # Arguments
/// - `name`: name of the app, attached to every record
/// - `fallback_env_filter`: filter level used when RUST_LOG is not set
/// - `sink`: where the records are written
pub fn get_tracing_subscriber<Sink>(
    name: String,
    fallback_env_filter: String,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    // The sink must implement `MakeWriter` for all choices of the lifetime parameter `'a`
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_env_filter));

    let formatting_layer = BunyanFormattingLayer::new(name, sink);

    Registry::default()
        .with(env_filter)
        // Stores span data as JSON and propagates context from parent spans to their children
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Registers a tracing Subscriber as the global default to process span data.
///
/// It should only be called once
pub fn init_tracing_subscriber(subscriber: impl Subscriber + Send + Sync) {
    // Redirects all `log`'s events to our subscriber
    LogTracer::init().expect("Failed to set logger");

    set_global_default(subscriber).expect("Failed to set subscriber");
}
