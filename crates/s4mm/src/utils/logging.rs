use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins, then `--verbose`, then the configured level, then `info`.
pub fn init_logging(verbose: bool, configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback_directive(verbose, configured)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn fallback_directive(verbose: bool, configured: Option<&str>) -> &str {
    if verbose {
        "debug"
    } else {
        configured.unwrap_or("info")
    }
}
