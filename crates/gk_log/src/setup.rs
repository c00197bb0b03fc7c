//! Functions to set up logging in binaries and tests.

/// The default `RUST_LOG`-style filter used when the environment doesn't set one.
pub fn default_log_filter() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned())
}

/// Directs [`log`] calls to stderr.
///
/// Safe to call more than once; only the first call has any effect.
pub fn setup_native_logging() {
    fn setup() {
        crate::multi_logger::init().expect("failed to set logger");

        let log_filter = crate::default_log_filter();
        log::set_max_level(if log_filter.contains("trace") {
            log::LevelFilter::Trace
        } else if log_filter.contains("debug") {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        });

        let mut stderr_logger = env_logger::Builder::new();
        stderr_logger.parse_filters(&log_filter);
        crate::add_boxed_logger(Box::new(stderr_logger.build()));
    }

    use std::sync::Once;
    static START: Once = Once::new();
    START.call_once(setup);
}
