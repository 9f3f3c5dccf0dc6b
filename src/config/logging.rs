use super::types::Verbosity;

/// Installs the process-wide `fmt` subscriber. Call once, from the binary.
pub fn init_logging(verbosity: Verbosity) {
    let result = tracing_subscriber::fmt()
        .with_max_level(verbosity.as_level())
        .with_target(false)
        .try_init();

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}
