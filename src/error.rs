//! Error kinds for the masking engine
//!
//! Resolution fallbacks are not errors and never appear here; they are a
//! normal outcome carried by [`crate::resolver::ValueSource::Fallback`].

use thiserror::Error;

/// Errors surfaced by the library API
#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Failed to register hook {site}: {reason}")]
    RegistrationFailure { site: String, reason: String },

    #[error("Hook handler for {site} failed: {reason}")]
    HandlerFault { site: String, reason: String },

    #[error("Refusing to attach to protected process: {0}")]
    ProtectedProcess(String),

    #[error("Unknown identifier type: {0}")]
    UnknownIdentifier(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, MaskError>;
