use std::sync::OnceLock;

use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt as _, EnvFilter};

static TELEMETRY_INIT: OnceLock<()> = OnceLock::new();

pub fn get_subscriber() -> impl Subscriber + Send + Sync {
    // RUST_LOG decides; keep the http stack quiet
    let filter = EnvFilter::from_default_env()
        .add_directive("hyper=warn".parse().expect("well-formed"))
        .add_directive("hyper_util=warn".parse().expect("well-formed"))
        .add_directive("reqwest=warn".parse().expect("well-formed"));

    let fmt_layer = fmt::layer().with_file(true).with_line_number(true);

    tracing_subscriber::Registry::default()
        .with(filter)
        .with(fmt_layer)
}

/// Install `subscriber` as the global default. Later calls are ignored.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) {
    if TELEMETRY_INIT.set(()).is_err() {
        return;
    }
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {e}");
    }
}
