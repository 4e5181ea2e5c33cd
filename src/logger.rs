//! Logging for the backfill binary.

use log::LevelFilter;

/// Sets up `env_logger` for the command line. Verbose runs show the engines'
/// debug output, other runs only warnings such as renamed sheets.
/// `RUST_LOG` still applies on top, e.g. `RUST_LOG=backfill=trace` follows
/// the matching token by token.
pub fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(verbose)
        .init();
}
