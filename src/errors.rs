use thiserror::Error;

use crate::factory::handoff::HandoffToken;

// -----------------------------------------------------------------------------
// ----- Error -----------------------------------------------------------------

/// Failures surfaced by the factory's public surface.
#[derive(Debug, Error)]
pub enum Error {
    /// The gateway could not produce a usable connection or channel, or
    /// refused to enable a channel mode. Never retried internally.
    #[error("broker connectivity failure: {0}")]
    Connectivity(#[from] ConnectivityError),

    /// `switch_context` was called with a token that matches no registered
    /// context: never issued, or already claimed.
    #[error("no context to switch for token {0}")]
    InvalidToken(HandoffToken),

    /// The factory was stopped; no connections are handed out until
    /// `start` is called again.
    #[error("connection factory is stopped")]
    Stopped,
}

// -----------------------------------------------------------------------------
// ----- ConnectivityError -----------------------------------------------------

/// Produced by gateway implementations when the broker cannot supply a
/// connection/channel or a mode change is refused.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConnectivityError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConnectivityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- CloseError ------------------------------------------------------------

/// Failure while physically closing a connection or channel. Only ever
/// logged: the resource is being discarded regardless, so this never
/// propagates to callers.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CloseError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CloseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
