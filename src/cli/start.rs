use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;

/// `-v` count to tracing level; without `-v` only errors are logged
const fn get_verbosity_level(verbose_count: u8) -> Option<tracing::Level> {
    match verbose_count {
        0 => None,
        1 => Some(tracing::Level::INFO),
        2 => Some(tracing::Level::DEBUG),
        _ => Some(tracing::Level::TRACE),
    }
}

/// Parse the command line, set up logging and return what to do.
///
/// # Errors
///
/// Returns an error if telemetry initialization or argument handling fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(get_verbosity_level(matches.get_count("verbose")))?;

    handler(&matches)
}
