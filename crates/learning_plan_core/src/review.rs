//! crates/learning_plan_core/src/review.rs
//!
//! The application list as a teacher reviews it. Status changes apply to the
//! local list immediately and are reverted if the backend refuses them.
//! Comments are edited in a buffer and only sent on an explicit save.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::{
    ApplicationId, ApplicationQuery, ApplicationStatus, ApplicationSummary, ReviewRequest, UserRole,
};
use crate::ports::{ApplicationService, PortError};

/// Shown to students while the teacher has not commented yet.
pub const NO_COMMENT_YET: &str = "老師尚未提供評語。";

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("只有教師可以審核申請")]
    NotTeacher,
    #[error("無法將狀態從「{from}」改為「{to}」")]
    IllegalTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("找不到申請 {0}")]
    UnknownApplication(ApplicationId),
    #[error("沒有開啟中的評論")]
    NoOpenComment,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// The comment dialog for one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEditor {
    pub id: ApplicationId,
    pub buffer: String,
    pub editable: bool,
}

pub struct ReviewBoard {
    applications: Arc<dyn ApplicationService>,
    role: UserRole,
    entries: Vec<ApplicationSummary>,
    comment: Option<CommentEditor>,
}

impl ReviewBoard {
    pub fn new(applications: Arc<dyn ApplicationService>, role: UserRole) -> Self {
        Self {
            applications,
            role,
            entries: Vec::new(),
            comment: None,
        }
    }

    pub fn entries(&self) -> &[ApplicationSummary] {
        &self.entries
    }

    pub fn comment_editor(&self) -> Option<&CommentEditor> {
        self.comment.as_ref()
    }

    pub async fn refresh(&mut self, query: &ApplicationQuery) -> Result<(), ReviewError> {
        self.entries = self.applications.list_applications(query).await?;
        Ok(())
    }

    /// Fetches one application and puts it on the board, replacing any stale entry.
    ///
    /// Reaches records beyond the pages `refresh` has listed.
    pub async fn load(&mut self, id: &ApplicationId) -> Result<(), ReviewError> {
        let summary = self.applications.get_application(id).await?.summary();
        match self.entries.iter_mut().find(|entry| &entry.id == id) {
            Some(entry) => *entry = summary,
            None => self.entries.push(summary),
        }
        Ok(())
    }

    fn position(&self, id: &ApplicationId) -> Result<usize, ReviewError> {
        self.entries
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| ReviewError::UnknownApplication(id.clone()))
    }

    fn require_teacher(&self) -> Result<(), ReviewError> {
        match self.role {
            UserRole::Teacher => Ok(()),
            UserRole::Student => Err(ReviewError::NotTeacher),
        }
    }

    /// Moves an application to `status`, optimistically.
    ///
    /// Selecting the status it already has is a no-op and sends nothing.
    #[instrument(skip(self), fields(application_id = %id))]
    pub async fn set_status(
        &mut self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), ReviewError> {
        self.require_teacher()?;
        let index = self.position(id)?;
        let previous = self.entries[index].status;
        if previous == status {
            return Ok(());
        }
        if !previous.can_transition_to(status) {
            return Err(ReviewError::IllegalTransition {
                from: previous,
                to: status,
            });
        }

        self.entries[index].status = status;
        let request = ReviewRequest {
            status,
            comment: None,
        };
        match self.applications.review_application(id, &request).await {
            Ok(record) => {
                info!(from = %previous, to = %record.status, "Review status changed");
                self.entries[index].status = record.status;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Review status change refused, reverting");
                self.entries[index].status = previous;
                Err(e.into())
            }
        }
    }

    /// Opens the comment dialog. Students get a read-only view.
    pub fn open_comment(&mut self, id: &ApplicationId) -> Result<&CommentEditor, ReviewError> {
        let index = self.position(id)?;
        let editor = self.comment.insert(CommentEditor {
            id: id.clone(),
            buffer: self.entries[index].comment.clone(),
            editable: self.role == UserRole::Teacher,
        });
        Ok(editor)
    }

    pub fn edit_comment(&mut self, text: impl Into<String>) -> Result<(), ReviewError> {
        self.require_teacher()?;
        let editor = self.comment.as_mut().ok_or(ReviewError::NoOpenComment)?;
        editor.buffer = text.into();
        Ok(())
    }

    /// Sends the buffered comment with the application's current status.
    ///
    /// The dialog closes on success and stays open with its buffer on failure.
    #[instrument(skip(self))]
    pub async fn save_comment(&mut self) -> Result<(), ReviewError> {
        self.require_teacher()?;
        let editor = self.comment.clone().ok_or(ReviewError::NoOpenComment)?;
        let index = self.position(&editor.id)?;

        let request = ReviewRequest {
            status: self.entries[index].status,
            comment: Some(editor.buffer.clone()),
        };
        let record = self.applications.review_application(&editor.id, &request).await?;
        info!(application_id = %editor.id, "Review comment saved");
        self.entries[index].comment = record.comment;
        self.entries[index].status = record.status;
        self.comment = None;
        Ok(())
    }

    pub fn close_comment(&mut self) {
        self.comment = None;
    }
}

/// The comment as a student sees it.
pub fn display_comment(comment: &str) -> &str {
    if comment.trim().is_empty() {
        NO_COMMENT_YET
    } else {
        comment
    }
}
