//! Centralized error types.
//!
//! The matching engine itself surfaces nothing to clients beyond the outbound
//! event vocabulary — protocol and out-of-state errors are silent drops. What
//! remains are startup-time failures: configuration, addresses, sockets.

/// Errors that can abort service startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("allowed origin is not a valid header value: {origin:?}")]
    InvalidOrigin { origin: String },
}

/// Convenience alias for Results using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
