use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Already connected: the portal did not intercept the landing page")]
    AlreadyConnected,

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Logout failed: {0}")]
    LogoutFailed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected portal response: {0}")]
    MalformedResponse(String),

    #[error("Portal returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Invalid portal URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 100;

impl PortalError {
    /// True when the request never got a usable answer (DNS, refused,
    /// timeout). Only these are worth retrying or falling back to cache.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, PortalError::Network(_))
    }

    /// Quote the start of a response body without flooding the terminal
    pub fn snippet(body: &str) -> String {
        body.chars().take(MAX_ERROR_BODY_LENGTH).collect()
    }
}
