//! Process-wide `tracing` subscriber.

use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::Error;

/// Installs the JSON subscriber. `RUST_LOG`, when set, overrides `level`.
///
/// Source file and line are only emitted at `debug` and more verbose, where
/// they are worth the extra bytes per record. Fails if a global subscriber
/// is already installed.
pub fn init(level: Level) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let with_location = level >= Level::DEBUG;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_file(with_location)
        .with_line_number(with_location)
        .try_init()
        .map_err(|err| Error::Logging(err.to_string()))
}
