//! Helpers for error handling.

/// Format an error, including its chain of sources.
///
/// Always use this when displaying an error at a log or CLI boundary.
pub fn format(error: &dyn std::error::Error) -> String {
    let mut string = error.to_string();
    for source in std::iter::successors(error.source(), |error| error.source()) {
        string.push_str(" -> ");
        string.push_str(&source.to_string());
    }
    string
}

pub trait ResultExt<T> {
    /// Log a warning if there is an `Err`, but only log the exact same message once.
    fn warn_on_err_once(self, msg: impl std::fmt::Display) -> Option<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn warn_on_err_once(self, msg: impl std::fmt::Display) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                gk_log::warn_once!("{msg}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(thiserror::Error, Debug)]
    #[error("root cause")]
    struct RootCause;

    #[derive(thiserror::Error, Debug)]
    #[error("inner context")]
    struct InnerContext(#[source] RootCause);

    #[derive(thiserror::Error, Debug)]
    #[error("outer context")]
    struct OuterContext(#[source] InnerContext);

    #[test]
    fn test_format() {
        let err = OuterContext(InnerContext(RootCause));

        assert_eq!(err.to_string(), "outer context"); // the chain is hidden by default

        assert_eq!(
            format(&err),
            "outer context -> inner context -> root cause"
        );
    }
}
