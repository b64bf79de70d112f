use thiserror::Error;

/// Errors raised while talking to the log service
///
/// `Auth` is only produced by the token provider, so callers can tell
/// "could not authenticate" apart from every later failure.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Snapshot request failed: {0}")]
    Snapshot(String),

    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    #[error("Stream error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ClientError {
    /// Whether this error came from the token endpoint
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
