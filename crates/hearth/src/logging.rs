//! Tracing setup for applications embedding the client.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::HearthError;

/// Maps a verbosity count (0=error, 1=warn, 2=info, 3=debug, 4+=trace) to
/// a filter directive covering every Hearth crate.
pub fn filter_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    ["hearth", "hearth_transport", "hearth_protocol", "hearth_session"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs a stderr `fmt` subscriber.
///
/// `RUST_LOG`, when set, replaces the verbosity-derived filter.
///
/// # Errors
/// `HearthError::Logging` if a global subscriber is already set.
pub fn init(verbosity: u8) -> Result<(), HearthError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(verbosity >= 3)
                .with_line_number(verbosity >= 3),
        )
        .try_init()?;
    Ok(())
}
