//! Error types for the Teleport lifecycle core.

use thiserror::Error;

/// Result type alias using the Teleport [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the lifecycle components.
///
/// "Tunnel not active" and "status unknown" are not errors: they are
/// reported as [`crate::Deactivation::NotActive`] and
/// [`crate::TunnelRuntimeState::Unknown`].
#[derive(Debug, Error)]
pub enum Error {
    /// The remote credential service rejected the PIN.
    #[error("Invalid PIN")]
    InvalidPin,

    /// The remote credential service could not be reached or failed.
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// No device token has been persisted yet.
    #[error("No previous token found. Please enter a new PIN.")]
    NoTokenPresent,

    /// No tunnel configuration has been persisted yet.
    #[error("No config found. Generate one first.")]
    NoConfigPresent,

    /// Exchanging the device token for a tunnel configuration failed.
    #[error("Config exchange failed: {0}")]
    ConfigExchangeFailed(String),

    /// The service manager refused to install the tunnel service.
    #[error("Activation failed: {0}")]
    ActivationFailed(String),

    /// The service manager refused to remove the tunnel service.
    #[error("Deactivation failed: {0}")]
    DeactivationFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
