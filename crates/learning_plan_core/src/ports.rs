//! crates/learning_plan_core/src/ports.rs
//!
//! Defines the service contracts (traits) between the form logic and the backend.
//! These traits form the boundary of the hexagonal architecture, so the core never
//! knows whether it is talking to the REST API or to an in-memory fake.

use async_trait::async_trait;

use crate::domain::{
    ApplicationId, ApplicationQuery, ApplicationRecord, ApplicationSummary, AuthSession,
    GmailSettings, GmailSettingsUpdate, PdfExport, Registration, ReviewRequest, StudentQuery,
    StudentRecord, User,
};
use crate::payload::{ApplicationPayload, ApplicationUpdate};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g. HTTP, files).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("未授權，請重新登入")]
    Unauthorized,
    /// The backend refused the request; the message is shown to the user as-is.
    #[error("{0}")]
    Rejected(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> PortResult<AuthSession>;

    async fn register(&self, registration: &Registration) -> PortResult<User>;

    async fn change_password(&self, old_password: &str, new_password: &str) -> PortResult<()>;
}

#[async_trait]
pub trait ApplicationService: Send + Sync {
    async fn create_application(&self, payload: &ApplicationPayload)
        -> PortResult<ApplicationRecord>;

    async fn update_application(
        &self,
        id: &ApplicationId,
        update: &ApplicationUpdate,
    ) -> PortResult<ApplicationRecord>;

    async fn get_application(&self, id: &ApplicationId) -> PortResult<ApplicationRecord>;

    async fn list_applications(&self, query: &ApplicationQuery)
        -> PortResult<Vec<ApplicationSummary>>;

    async fn delete_application(&self, id: &ApplicationId) -> PortResult<()>;

    /// Teacher-only status and comment change.
    async fn review_application(
        &self,
        id: &ApplicationId,
        review: &ReviewRequest,
    ) -> PortResult<ApplicationRecord>;

    async fn export_pdf(&self, id: &ApplicationId) -> PortResult<PdfExport>;
}

/// The single per-user draft. The snapshot is opaque JSON to the backend.
#[async_trait]
pub trait DraftService: Send + Sync {
    /// Returns `PortError::NotFound` when the user has no draft.
    async fn fetch_draft(&self) -> PortResult<serde_json::Value>;

    /// Creates or fully overwrites the user's draft.
    async fn store_draft(&self, form_data: &serde_json::Value) -> PortResult<()>;

    async fn remove_draft(&self) -> PortResult<()>;
}

#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn get_student(&self, student_id: &str) -> PortResult<StudentRecord>;

    async fn search_students(&self, query: &StudentQuery) -> PortResult<Vec<StudentRecord>>;
}

#[async_trait]
pub trait SettingsService: Send + Sync {
    async fn gmail_settings(&self) -> PortResult<GmailSettings>;

    async fn update_gmail_settings(&self, update: &GmailSettingsUpdate)
        -> PortResult<GmailSettings>;
}

/// Holds the logged-in session. Injected wherever a credential is needed instead
/// of being read from ambient global state.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<AuthSession>;

    fn store(&self, session: AuthSession) -> PortResult<()>;

    fn clear(&self) -> PortResult<()>;
}
