//! Tracing subscriber setup shared by the binaries.
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

const SERVICE_NAME: &str = "rlquorum";
const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. The level comes from `RUST_LOG` (defaults to `info`).
///
/// With `json` set, events are emitted as bunyan formatted json lines on stdout, otherwise
/// the human readable `fmt` layer is used.
pub fn initialize_subscriber(json: bool) {
    if json {
        let formatting_layer = BunyanFormattingLayer::new(SERVICE_NAME.into(), std::io::stdout);
        Registry::default()
            .with(env_filter())
            .with(JsonStorageLayer)
            .with(formatting_layer)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }
}
