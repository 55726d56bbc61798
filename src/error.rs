//! Error types for observation planning and device control.

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the observation run.
///
/// Fatal configuration errors abort the run at startup. Connectivity and
/// timeout errors on device commands are handled according to the configured
/// [`CommandPolicy`](crate::mount::CommandPolicy); liveness probes convert
/// timeouts into a plain `false`. Safety violations skip the current source
/// only. Protocol errors always propagate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connectivity error: {0}")]
    Connectivity(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("safety violation: {0}")]
    Safety(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("command rejected: {0}")]
    State(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Protocol(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Protocol(s.to_string())
    }
}
