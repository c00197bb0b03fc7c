//! Text logging for the gpukv crates.
//!
//! * `trace`: spammy things
//! * `debug`: things that might be useful when debugging the flush/sort pipeline
//! * `info`: things we want surfaced to users of the crate
//! * `warn`: recoverable problems (a single write retry, a skipped sort pass)
//! * `error`: problems that lead to loss of functionality or data
//!
//! The `warn_once` etc. macros suppress repeated logging of the exact same message, which
//! matters here because a stuck single-write retry or a persistently oversized sort
//! definition would otherwise log identically on every debounce tick.

pub use tracing::{debug, error, info, trace, warn};

pub use log_once::{debug_once, error_once, info_once, trace_once, warn_once};

pub use log::{Level, LevelFilter};

mod multi_logger;
pub use multi_logger::{add_boxed_logger, add_logger};

mod result_extensions;
pub use result_extensions::ResultExt;

#[cfg(feature = "setup")]
mod setup;
#[cfg(feature = "setup")]
pub use setup::{default_log_filter, setup_native_logging};
