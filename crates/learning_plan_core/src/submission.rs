//! crates/learning_plan_core/src/submission.rs
//!
//! Drives one submit attempt: validate locally, then create or update the
//! record. Nothing reaches the network until the form validates clean.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::domain::{ApplicationForm, ApplicationRecord, FormMode};
use crate::draft::DraftPersistence;
use crate::payload::{to_payload, to_update};
use crate::ports::{ApplicationService, PortError};
use crate::validator::{validate, ErrorMap};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Validating,
    Submitting,
    Succeeded,
    /// Holds the backend's message as shown to the user.
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("表單尚有 {} 個欄位需要修正", .0.len())]
    Invalid(ErrorMap),
    #[error(transparent)]
    Transport(#[from] PortError),
}

pub struct SubmissionController {
    applications: Arc<dyn ApplicationService>,
    drafts: DraftPersistence,
    mode: FormMode,
    state: SubmissionState,
    errors: ErrorMap,
}

impl SubmissionController {
    pub fn new(
        applications: Arc<dyn ApplicationService>,
        drafts: DraftPersistence,
        mode: FormMode,
    ) -> Self {
        Self {
            applications,
            drafts,
            mode,
            state: SubmissionState::Idle,
            errors: ErrorMap::new(),
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// Per-section messages from the last validation.
    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    /// Validates and submits `form`. `on_complete` runs once the backend has accepted it.
    ///
    /// After the first successful create the controller switches to editing the
    /// new record, so a second submit updates instead of creating a duplicate.
    #[instrument(skip_all, fields(mode = ?self.mode))]
    pub async fn submit<F>(
        &mut self,
        form: &ApplicationForm,
        on_complete: F,
    ) -> Result<ApplicationRecord, SubmitError>
    where
        F: FnOnce(&ApplicationRecord),
    {
        self.state = SubmissionState::Validating;
        self.errors = validate(form);
        if !self.errors.is_empty() {
            warn!(count = self.errors.len(), "Submission blocked by validation");
            self.state = SubmissionState::Idle;
            return Err(SubmitError::Invalid(self.errors.clone()));
        }

        self.state = SubmissionState::Submitting;
        let result = match &self.mode {
            FormMode::New => self.applications.create_application(&to_payload(form)).await,
            FormMode::Edit(id) => self.applications.update_application(id, &to_update(form)).await,
        };

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "Submission failed");
                self.state = SubmissionState::Failed(e.to_string());
                return Err(e.into());
            }
        };

        info!(application_id = %record.id, status = %record.status, "Application submitted");
        self.state = SubmissionState::Succeeded;
        on_complete(&record);

        if !self.mode.is_edit() {
            self.drafts.discard_after_submit().await;
            self.mode = FormMode::Edit(record.id.clone());
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApplicationId, ApplicationStatus};
    use crate::testing::{complete_form, FakeBackend};
    use crate::validator::FieldGroup;
    use assert_matches::assert_matches;

    fn controller(backend: &Arc<FakeBackend>, mode: FormMode) -> SubmissionController {
        SubmissionController::new(backend.clone(), DraftPersistence::new(backend.clone()), mode)
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_the_backend() {
        let backend = Arc::new(FakeBackend::default());
        let mut submission = controller(&backend, FormMode::New);
        let mut form = complete_form();
        form.motivation.clear();

        let mut completed = false;
        let result = submission.submit(&form, |_| completed = true).await;

        assert_matches!(result, Err(SubmitError::Invalid(errors)) => {
            assert_eq!(errors.keys().copied().collect::<Vec<_>>(), vec![FieldGroup::Motivation]);
        });
        assert!(!completed);
        assert!(backend.calls().is_empty());
        assert_eq!(submission.state(), &SubmissionState::Idle);
        assert!(submission.errors().contains_key(&FieldGroup::Motivation));
    }

    #[tokio::test]
    async fn first_submit_creates_and_discards_the_draft() {
        let backend = Arc::new(FakeBackend::default());
        *backend.draft.lock().unwrap() = Some(serde_json::json!({"title": "草稿"}));
        let mut submission = controller(&backend, FormMode::New);

        let mut completed_with = None;
        let record = submission
            .submit(&complete_form(), |r| completed_with = Some(r.id.clone()))
            .await
            .unwrap();

        assert_eq!(record.id, ApplicationId::new("app-1"));
        assert_eq!(completed_with, Some(record.id.clone()));
        assert_eq!(backend.calls(), vec!["create_application", "remove_draft"]);
        assert!(backend.draft.lock().unwrap().is_none());
        assert_eq!(submission.state(), &SubmissionState::Succeeded);
        assert_eq!(submission.mode(), &FormMode::Edit(record.id));
    }

    #[tokio::test]
    async fn resubmitting_after_create_updates_the_same_record() {
        let backend = Arc::new(FakeBackend::default());
        let mut submission = controller(&backend, FormMode::New);
        submission.submit(&complete_form(), |_| {}).await.unwrap();
        submission.submit(&complete_form(), |_| {}).await.unwrap();

        assert_eq!(
            backend.calls(),
            vec!["create_application", "remove_draft", "update_application"]
        );
        assert_eq!(backend.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn edit_mode_updates_and_never_touches_drafts() {
        let backend = Arc::new(FakeBackend::default());
        let mut seeded = controller(&backend, FormMode::New);
        let created = seeded.submit(&complete_form(), |_| {}).await.unwrap();
        backend.records.lock().unwrap().get_mut(created.id.as_str()).unwrap().status =
            ApplicationStatus::NotPassed;
        backend.calls.lock().unwrap().clear();

        let mut submission = controller(&backend, FormMode::Edit(created.id.clone()));
        let mut form = complete_form();
        form.title = "修改後".into();
        let record = submission.submit(&form, |_| {}).await.unwrap();

        assert_eq!(backend.calls(), vec!["update_application"]);
        assert_eq!(record.status, ApplicationStatus::Pending);
        assert_eq!(record.form.title, "修改後");
    }

    #[tokio::test]
    async fn transport_failure_keeps_the_message_verbatim() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_next(PortError::Rejected("申請期間已截止".into()));
        let mut submission = controller(&backend, FormMode::New);

        let mut completed = false;
        let result = submission.submit(&complete_form(), |_| completed = true).await;

        assert_matches!(result, Err(SubmitError::Transport(PortError::Rejected(_))));
        assert!(!completed);
        assert_eq!(
            submission.state(),
            &SubmissionState::Failed("申請期間已截止".into())
        );
        assert_eq!(submission.mode(), &FormMode::New);
        assert_eq!(backend.calls(), vec!["create_application"]);
    }

    #[tokio::test]
    async fn draft_cleanup_failure_does_not_fail_the_submission() {
        let backend = Arc::new(FakeBackend::default());
        *backend.draft_delete_error.lock().unwrap() = Some(PortError::Unexpected("timeout".into()));
        let mut submission = controller(&backend, FormMode::New);

        assert!(submission.submit(&complete_form(), |_| {}).await.is_ok());
        assert_eq!(submission.state(), &SubmissionState::Succeeded);
    }
}
