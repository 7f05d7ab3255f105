//! crates/learning_plan_core/src/testing.rs
//!
//! Test fixtures and an in-memory backend implementing every port.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::domain::{
    ApplicationForm, ApplicationId, ApplicationQuery, ApplicationRecord, ApplicationStatus,
    ApplicationSummary, AuthSession, GmailSettings, GmailSettingsUpdate, Member, PdfExport,
    PhoneAgreement, PlanItem, Reference, Registration, ReviewRequest, StudentQuery, StudentRecord,
    SubmittedBefore, User, UserRole, PRESENTATION_STATIC,
};
use crate::payload::{from_payload, ApplicationPayload, ApplicationUpdate};
use crate::ports::{
    ApplicationService, AuthService, DraftService, PortError, PortResult, SettingsService,
    StudentDirectory,
};

pub fn plan_item(hours: &str) -> PlanItem {
    PlanItem {
        date: "2025-03-01".into(),
        content: "閱讀第一章".into(),
        hours: hours.into(),
        metric: "完成練習".into(),
        ..PlanItem::empty()
    }
}

/// A form that passes every submission rule: nine two-hour plan items.
pub fn complete_form() -> ApplicationForm {
    let mut form = ApplicationForm {
        title: "Test".into(),
        apply_date_start: "2025-02-01".into(),
        apply_date_end: "2025-06-30".into(),
        motivation: "x".into(),
        references: vec![Reference {
            title: "Python 入門".into(),
            author: "林大華".into(),
            publisher: "旗標".into(),
            ..Reference::empty()
        }],
        expected_outcome: "完成一個小專案".into(),
        equipment_needs: "筆電".into(),
        plan_items: (0..9).map(|_| plan_item("2")).collect(),
        midterm_goal: "完成基礎語法".into(),
        final_goal: "完成專題".into(),
        phone_agreement: PhoneAgreement::Agree,
        ..ApplicationForm::default()
    };
    form.members[0] = Member {
        student_id: "11430001".into(),
        student_class: "101".into(),
        student_seat: "1".into(),
        student_name: "張三".into(),
        has_submitted: SubmittedBefore::No,
    };
    form.learning_categories.checked.insert("閱讀計畫".into(), true);
    form.env_needs.checked.insert("自習室".into(), true);
    form.presentation_formats
        .checked
        .insert(PRESENTATION_STATIC.into(), true);
    form
}

pub fn student_user() -> User {
    User {
        id: "u-student".into(),
        username: "11430001".into(),
        role: UserRole::Student,
        student_id: Some("11430001".into()),
        student_name: Some("張三".into()),
        class_name: Some("101".into()),
        seat_number: Some(1),
        teacher_name: None,
    }
}

pub fn summary(id: &str, status: ApplicationStatus) -> ApplicationSummary {
    ApplicationSummary {
        id: ApplicationId::new(id),
        title: format!("計畫 {}", id),
        apply_date_start: "2025-03-14".into(),
        apply_date_end: "2025-06-30".into(),
        status,
        comment: String::new(),
        submitter_student_id: "11430001".into(),
        created_at: String::new(),
        updated_at: String::new(),
    }
}

//=========================================================================================
// In-memory Backend
//=========================================================================================

/// Records every call and keeps just enough state to behave like the REST backend.
#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<&'static str>>,
    pub draft: Mutex<Option<Value>>,
    pub records: Mutex<BTreeMap<String, ApplicationRecord>>,
    pub summaries: Mutex<Vec<ApplicationSummary>>,
    pub students: Mutex<Vec<StudentRecord>>,
    pub reviews: Mutex<Vec<ReviewRequest>>,
    /// Consumed by the next application call.
    pub fail_next: Mutex<Option<PortError>>,
    /// Returned by every draft removal while set.
    pub draft_delete_error: Mutex<Option<PortError>>,
    next_id: AtomicU32,
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_next(&self, error: PortError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    fn record(&self, call: &'static str) -> PortResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.fail_next.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn store_record(&self, id: String, payload: &ApplicationPayload, status: ApplicationStatus)
        -> ApplicationRecord {
        let record = ApplicationRecord {
            id: ApplicationId::new(id.clone()),
            form: from_payload(payload.clone()),
            status,
            comment: String::new(),
            submitter_id: "u-student".into(),
            submitter_student_id: "11430001".into(),
            created_at: "2025-03-14T09:00:00".into(),
            updated_at: "2025-03-14T09:00:00".into(),
        };
        self.records.lock().unwrap().insert(id, record.clone());
        record
    }
}

#[async_trait]
impl ApplicationService for FakeBackend {
    async fn create_application(&self, payload: &ApplicationPayload)
        -> PortResult<ApplicationRecord> {
        self.record("create_application")?;
        let id = format!("app-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        Ok(self.store_record(id, payload, ApplicationStatus::Pending))
    }

    async fn update_application(
        &self,
        id: &ApplicationId,
        update: &ApplicationUpdate,
    ) -> PortResult<ApplicationRecord> {
        self.record("update_application")?;
        if !self.records.lock().unwrap().contains_key(id.as_str()) {
            return Err(PortError::NotFound(format!("Application {} not found", id)));
        }
        Ok(self.store_record(id.0.clone(), &update.fields, update.status))
    }

    async fn get_application(&self, id: &ApplicationId) -> PortResult<ApplicationRecord> {
        self.record("get_application")?;
        self.records
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Application {} not found", id)))
    }

    async fn list_applications(&self, query: &ApplicationQuery)
        -> PortResult<Vec<ApplicationSummary>> {
        self.record("list_applications")?;
        Ok(self
            .summaries
            .lock()
            .unwrap()
            .iter()
            .filter(|s| query.status.map_or(true, |status| s.status == status))
            .cloned()
            .collect())
    }

    async fn delete_application(&self, id: &ApplicationId) -> PortResult<()> {
        self.record("delete_application")?;
        self.records.lock().unwrap().remove(id.as_str());
        Ok(())
    }

    async fn review_application(
        &self,
        id: &ApplicationId,
        review: &ReviewRequest,
    ) -> PortResult<ApplicationRecord> {
        self.record("review_application")?;
        self.reviews.lock().unwrap().push(review.clone());
        // A review without a comment keeps the stored one.
        let stored_comment = self
            .summaries
            .lock()
            .unwrap()
            .iter()
            .find(|s| &s.id == id)
            .map(|s| s.comment.clone())
            .unwrap_or_default();
        let record = ApplicationRecord {
            id: id.clone(),
            form: ApplicationForm::default(),
            status: review.status,
            comment: review.comment.clone().unwrap_or(stored_comment),
            submitter_id: String::new(),
            submitter_student_id: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        Ok(record)
    }

    async fn export_pdf(&self, id: &ApplicationId) -> PortResult<PdfExport> {
        self.record("export_pdf")?;
        Ok(PdfExport {
            filename: format!("{}.pdf", id),
            bytes: b"%PDF-1.7".to_vec(),
        })
    }
}

#[async_trait]
impl DraftService for FakeBackend {
    async fn fetch_draft(&self) -> PortResult<Value> {
        self.record("fetch_draft")?;
        self.draft
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PortError::NotFound("沒有儲存的草稿".into()))
    }

    async fn store_draft(&self, form_data: &Value) -> PortResult<()> {
        self.record("store_draft")?;
        *self.draft.lock().unwrap() = Some(form_data.clone());
        Ok(())
    }

    async fn remove_draft(&self) -> PortResult<()> {
        self.calls.lock().unwrap().push("remove_draft");
        if let Some(error) = self.draft_delete_error.lock().unwrap().clone() {
            return Err(error);
        }
        match self.draft.lock().unwrap().take() {
            Some(_) => Ok(()),
            None => Err(PortError::NotFound("沒有可刪除的草稿".into())),
        }
    }
}

#[async_trait]
impl StudentDirectory for FakeBackend {
    async fn get_student(&self, student_id: &str) -> PortResult<StudentRecord> {
        self.calls.lock().unwrap().push("get_student");
        self.students
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.student_id == student_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Student {} not found", student_id)))
    }

    async fn search_students(&self, query: &StudentQuery) -> PortResult<Vec<StudentRecord>> {
        self.calls.lock().unwrap().push("search_students");
        Ok(self
            .students
            .lock()
            .unwrap()
            .iter()
            .filter(|s| query.class_name.as_ref().map_or(true, |c| &s.class_name == c))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SettingsService for FakeBackend {
    async fn gmail_settings(&self) -> PortResult<GmailSettings> {
        self.calls.lock().unwrap().push("gmail_settings");
        Ok(GmailSettings::default())
    }

    async fn update_gmail_settings(&self, update: &GmailSettingsUpdate)
        -> PortResult<GmailSettings> {
        self.calls.lock().unwrap().push("update_gmail_settings");
        let user = update.gmail_user.clone().filter(|u| !u.is_empty());
        Ok(GmailSettings {
            is_configured: user.is_some(),
            gmail_user: user,
        })
    }
}

#[async_trait]
impl AuthService for FakeBackend {
    async fn login(&self, username: &str, password: &str) -> PortResult<AuthSession> {
        self.calls.lock().unwrap().push("login");
        if password != "secret" {
            return Err(PortError::Rejected("帳號或密碼錯誤".into()));
        }
        Ok(AuthSession {
            access_token: format!("token-{}", username),
            user: student_user(),
        })
    }

    async fn register(&self, registration: &Registration) -> PortResult<User> {
        self.calls.lock().unwrap().push("register");
        Ok(User {
            username: registration.username.clone(),
            role: registration.role,
            ..student_user()
        })
    }

    async fn change_password(&self, _old_password: &str, _new_password: &str) -> PortResult<()> {
        self.calls.lock().unwrap().push("change_password");
        Ok(())
    }
}
