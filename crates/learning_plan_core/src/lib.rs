pub mod domain;
pub mod draft;
pub mod form;
pub mod history;
pub mod payload;
pub mod ports;
pub mod review;
pub mod session;
pub mod settings;
pub mod signature;
pub mod submission;
pub mod validator;

#[cfg(test)]
mod testing;

pub use domain::{
    ApplicationForm, ApplicationId, ApplicationQuery, ApplicationRecord, ApplicationStatus,
    ApplicationSummary, AuthSession, FormMode, PhoneAgreement, SignerRole, SubmittedBefore, User,
    UserRole,
};
pub use draft::{DraftError, DraftPersistence};
pub use form::{FormError, FormRegistry};
pub use ports::{
    ApplicationService, AuthService, DraftService, PortError, PortResult, SessionStore,
    SettingsService, StudentDirectory,
};
pub use review::{ReviewBoard, ReviewError};
pub use signature::{SignatureCapture, SignatureError, SignatureSurface};
pub use submission::{SubmissionController, SubmissionState, SubmitError};
pub use validator::{validate, ErrorMap, FieldGroup};
