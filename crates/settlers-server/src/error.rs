//! Error types for the game server binary.
//!
//! [`ServerBinaryError`] wraps every failure mode of startup and shutdown so
//! `main` can propagate with `?`.

/// Top-level error for the game server binary.
#[derive(Debug, thiserror::Error)]
pub enum ServerBinaryError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: settlers_core::ConfigError,
    },

    /// The HTTP server could not be started.
    #[error("startup error: {source}")]
    Startup {
        /// The underlying startup error.
        #[from]
        source: settlers_api::StartupError,
    },

    /// The HTTP server stopped with an error.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: settlers_api::ServerError,
    },

    /// The server task panicked or was cancelled.
    #[error("server task failed: {message}")]
    Task {
        /// Description of the task failure.
        message: String,
    },
}
