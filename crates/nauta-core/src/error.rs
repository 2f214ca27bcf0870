use thiserror::Error;

use crate::portal::PortalError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Portal(#[from] PortalError),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("Unknown card: {0}")]
    UnknownCard(String),

    #[error("No card with time left available")]
    NoCardAvailable,

    #[error("The portal did not accept the credentials for {0}")]
    InvalidCredentials(String),

    #[error("Stored logout URL is unreadable: {0}")]
    CorruptLogoutUrl(String),

    #[error("Login form is missing {0}")]
    IncompleteLoginForm(&'static str),

    #[error("No session opened by this process")]
    NotConnected,
}

impl SessionError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SessionError::Portal(e) if e.is_connectivity())
    }
}
