//! crates/learning_plan_core/src/draft.rs
//!
//! The single per-user draft. Saving is an explicit user action and is never
//! available while an already-submitted record is being edited.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{ApplicationForm, FormMode};
use crate::form::normalize;
use crate::ports::{DraftService, PortError};

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("已送出的申請無法另存草稿")]
    EditingExistingRecord,
    #[error("草稿格式錯誤: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Clone)]
pub struct DraftPersistence {
    service: Arc<dyn DraftService>,
}

impl DraftPersistence {
    pub fn new(service: Arc<dyn DraftService>) -> Self {
        Self { service }
    }

    /// Fetches the saved snapshot. A missing draft is `Ok(None)`, not an error.
    pub async fn load_draft(&self) -> Result<Option<ApplicationForm>, DraftError> {
        let value = match self.service.fetch_draft().await {
            Ok(value) => value,
            Err(PortError::NotFound(_)) => {
                debug!("No saved draft");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let form: ApplicationForm = serde_json::from_value(value)?;
        Ok(Some(normalize(form)))
    }

    /// Overwrites the user's draft with `form`.
    pub async fn save_draft(&self, mode: &FormMode, form: &ApplicationForm) -> Result<(), DraftError> {
        if mode.is_edit() {
            return Err(DraftError::EditingExistingRecord);
        }
        let snapshot = serde_json::to_value(form)?;
        self.service.store_draft(&snapshot).await?;
        info!("Draft saved");
        Ok(())
    }

    /// Removes the draft. Deleting a draft that is already gone succeeds.
    pub async fn delete_draft(&self) -> Result<(), DraftError> {
        match self.service.remove_draft().await {
            Ok(()) => Ok(()),
            Err(PortError::NotFound(_)) => {
                debug!("Draft already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort cleanup once the first submission has been created.
    pub async fn discard_after_submit(&self) {
        if let Err(e) = self.delete_draft().await {
            warn!(error = %e, "Could not delete draft after submission");
        }
    }
}
