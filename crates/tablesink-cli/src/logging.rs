//! Logging for the CLI, powered by tracing-subscriber.
//!
//! The core crate logs through the `log` facade; `try_init` installs the
//! `tracing-log` bridge so those records reach the same formatter.

use tracing_subscriber::EnvFilter;

/// Variable that overrides the filter built from `-v` flags.
pub const LOG_ENV: &str = "TABLESINK_LOG";

fn default_directives(verbose: u8) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // Arrow and Parquet are chatty at debug.
    format!("{level},arrow=warn,parquet=warn")
}

/// Install a stderr subscriber. Safe to call more than once.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_base_level() {
        assert!(default_directives(0).starts_with("warn,"));
        assert!(default_directives(1).starts_with("info,"));
        assert!(default_directives(5).starts_with("debug,"));
    }
}
