//! Diagnostic logging setup.
//!
//! Tool output that the user asked for (log and error file contents) is
//! printed to stdout directly; everything here goes to stderr.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "MONGO_DB_DUMP_LOG";

const DEFAULT_FILTER: &str = "mongo_db_dump=warn";

pub fn init_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second init (tests, embedding) is not an error worth surfacing.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}
