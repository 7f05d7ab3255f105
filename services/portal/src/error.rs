//! services/portal/src/error.rs
//!
//! Defines the primary error type for the portal client.

use crate::config::ConfigError;
use learning_plan_core::draft::DraftError;
use learning_plan_core::form::{FormError, LookupError};
use learning_plan_core::ports::PortError;
use learning_plan_core::review::ReviewError;
use learning_plan_core::settings::SettingsError;
use learning_plan_core::signature::SignatureError;
use learning_plan_core::submission::SubmitError;

/// The primary error type for the `portal` client.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("{0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying HTTP client library.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., reading a form file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// Input on the command line or in a file the user supplied was unusable.
    #[error("{0}")]
    InvalidInput(String),
}
