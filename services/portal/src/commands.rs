//! services/portal/src/commands.rs
//!
//! Handlers for each CLI command. Form files hold the camelCase form snapshot,
//! the same shape the backend stores as a draft.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use learning_plan_core::domain::{
    ApplicationForm, ApplicationId, ApplicationQuery, ApplicationStatus, FormMode, Registration,
    SignerRole, StudentQuery, StudentRecord, UserRole,
};
use learning_plan_core::draft::DraftPersistence;
use learning_plan_core::form::{lookup_member, normalize, FormRegistry};
use learning_plan_core::history::HistoryFilter;
use learning_plan_core::ports::{
    ApplicationService, AuthService, PortError, SessionStore, SettingsService, StudentDirectory,
};
use learning_plan_core::review::{display_comment, ReviewBoard};
use learning_plan_core::session;
use learning_plan_core::settings::{self, GmailSettingsForm, PasswordChange};
use learning_plan_core::signature::{LayoutBox, SignatureCapture, SurfaceEvent};
use learning_plan_core::submission::{SubmissionController, SubmitError};
use learning_plan_core::validator::validate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adapters::HttpBackend;
use crate::cli::{Command, DraftCommand, GmailCommand, ListArgs, ReviewCommand, StudentCommand};
use crate::error::PortalError;

//=========================================================================================
// The Command Context
//=========================================================================================

/// Everything a command needs: the backend and the session it authenticates with.
pub struct Portal {
    backend: Arc<HttpBackend>,
    session: Arc<dyn SessionStore>,
}

impl Portal {
    pub fn new(backend: Arc<HttpBackend>, session: Arc<dyn SessionStore>) -> Self {
        Self { backend, session }
    }

    fn drafts(&self) -> DraftPersistence {
        DraftPersistence::new(self.backend.clone())
    }

    fn role(&self) -> Result<UserRole, PortalError> {
        Ok(session::current_user(self.session.as_ref())
            .ok_or(PortError::Unauthorized)?
            .role)
    }

    pub async fn run(&self, command: Command) -> Result<(), PortalError> {
        match command {
            // --- Account ---
            Command::Login { username, password } => {
                let user = session::login(self.backend.as_ref(), self.session.as_ref(), &username, &password)
                    .await?;
                println!("已登入: {} ({:?})", user.username, user.role);
            }
            Command::Logout => {
                session::logout(self.session.as_ref())?;
                println!("已登出");
            }
            Command::Whoami => match session::current_user(self.session.as_ref()) {
                Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
                None => println!("尚未登入"),
            },
            Command::Register(args) => {
                let registration = Registration {
                    username: args.username,
                    password: args.password,
                    role: args.role.into(),
                    student_id: args.student_id,
                    student_name: args.student_name,
                    class_name: args.class_name,
                    seat_number: args.seat_number,
                    teacher_name: args.teacher_name,
                };
                let user = self.backend.register(&registration).await?;
                println!("已建立帳號: {}", user.username);
            }
            Command::ChangePassword {
                old_password,
                new_password,
                confirm,
            } => {
                let change = PasswordChange {
                    confirm_password: confirm.unwrap_or_else(|| new_password.clone()),
                    old_password,
                    new_password,
                };
                settings::change_password(self.backend.as_ref(), &change).await?;
                println!("密碼已更新");
            }

            // --- Application forms ---
            Command::Init { output } => {
                write_form(&output, &FormFile::default()).await?;
                println!("已建立空白申請表: {}", output.display());
            }
            Command::Check { form } => {
                let errors = validate(&read_form(&form).await?.form);
                if errors.is_empty() {
                    println!("表單檢查通過");
                } else {
                    for (group, message) in &errors {
                        println!("{}: {}", group, message);
                    }
                    return Err(SubmitError::Invalid(errors).into());
                }
            }
            Command::Submit { form, edit } => self.submit(&form, edit).await?,
            Command::FillMember { form, slot } => {
                let mut file = read_form(&form).await?;
                let mut registry = FormRegistry::hydrate(file.form);
                let slot = usize::from(slot - 1);
                let found = lookup_member(&mut registry, self.backend.as_ref(), slot).await?;
                file.form = registry.into_form();
                if found {
                    write_form(&form, &file).await?;
                    println!("已帶入組員 {} 資料", slot + 1);
                } else {
                    println!("查無此學號，請手動填寫");
                }
            }
            Command::Sign {
                form,
                role,
                strokes,
                delete,
            } => {
                let mut file = read_form(&form).await?;
                let image = match strokes {
                    Some(path) if !delete => Some(capture_signature(role, &path).await?),
                    _ => None,
                };
                let saved = image.is_some();
                let mut registry = FormRegistry::hydrate(file.form);
                registry.set_signature(role, image);
                file.form = registry.into_form();
                write_form(&form, &file).await?;
                if saved {
                    println!("已儲存 {}", role.label());
                } else {
                    println!("已刪除 {}", role.label());
                }
            }

            // --- Submitted applications ---
            Command::List(args) => self.list(args).await?,
            Command::Show { id } => {
                let record = self.backend.get_application(&ApplicationId::new(id)).await?;
                println!("{} [{}] {}", record.id, record.status, record.form.title);
                println!("申請期間: {} ~ {}", record.form.apply_date_start, record.form.apply_date_end);
                println!("總時數: {}", record.form.total_hours());
                println!("評語: {}", display_comment(&record.comment));
            }
            Command::Pull { id, output } => {
                let record = self.backend.get_application(&ApplicationId::new(id)).await?;
                let file = FormFile {
                    record_id: Some(record.id.clone()),
                    form: FormRegistry::hydrate(record.form).into_form(),
                };
                write_form(&output, &file).await?;
                println!("已下載 {} 至 {}", record.id, output.display());
            }
            Command::Delete { id } => {
                self.backend.delete_application(&ApplicationId::new(id.clone())).await?;
                println!("已刪除 {}", id);
            }
            Command::ExportPdf { id, output } => {
                let pdf = self.backend.export_pdf(&ApplicationId::new(id)).await?;
                let path = output.unwrap_or_else(|| PathBuf::from(&pdf.filename));
                tokio::fs::write(&path, &pdf.bytes).await?;
                println!("已匯出 {}", path.display());
            }

            // --- Drafts ---
            Command::Draft(DraftCommand::Save { form }) => {
                let file = read_form(&form).await?;
                self.drafts().save_draft(&file.mode(), &file.form).await?;
                println!("草稿已儲存");
            }
            Command::Draft(DraftCommand::Load { output }) => match self.drafts().load_draft().await? {
                Some(form) => {
                    write_form(&output, &FormFile::new(form)).await?;
                    println!("已載入草稿至 {}", output.display());
                }
                None => println!("沒有儲存的草稿"),
            },
            Command::Draft(DraftCommand::Delete) => {
                self.drafts().delete_draft().await?;
                println!("草稿已刪除");
            }

            // --- Teacher review ---
            Command::Review(command) => self.review(command).await?,

            // --- Roster and settings ---
            Command::Student(StudentCommand::Get { student_id }) => {
                print_student(&self.backend.get_student(&student_id).await?);
            }
            Command::Student(StudentCommand::Search { id, name, class }) => {
                let query = StudentQuery {
                    student_id: id,
                    student_name: name,
                    class_name: class,
                };
                for student in self.backend.search_students(&query).await? {
                    print_student(&student);
                }
            }
            Command::Gmail(command) => self.gmail(command).await?,
        }
        Ok(())
    }

    async fn submit(&self, path: &Path, edit: Option<String>) -> Result<(), PortalError> {
        let mut file = read_form(path).await?;
        let mode = match edit {
            Some(id) => FormMode::Edit(ApplicationId::new(id)),
            None => file.mode(),
        };
        let mut controller = SubmissionController::new(self.backend.clone(), self.drafts(), mode);

        match controller.submit(&file.form, |record| println!("已送出申請 {}", record.id)).await {
            Ok(record) => {
                info!(application_id = %record.id, "Submitted from {}", path.display());
                if file.record_id.as_ref() != Some(&record.id) {
                    // Later submits of this file update the record instead of creating another.
                    file.record_id = Some(record.id);
                    write_form(path, &file).await?;
                }
                Ok(())
            }
            Err(SubmitError::Invalid(errors)) => {
                for (group, message) in &errors {
                    println!("{}: {}", group, message);
                }
                Err(SubmitError::Invalid(errors).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, args: ListArgs) -> Result<(), PortalError> {
        let query = ApplicationQuery {
            status: args.status.map(ApplicationStatus::from),
            skip: args.skip,
            limit: args.limit,
        };
        let mut filter = HistoryFilter::default();
        filter.status = query.status;
        set_date_part(&mut filter, args.year, HistoryFilter::set_year)?;
        set_date_part(&mut filter, args.month, HistoryFilter::set_month)?;
        set_date_part(&mut filter, args.day, HistoryFilter::set_day)?;

        let applications = self.backend.list_applications(&query).await?;
        for app in filter.apply(&applications) {
            println!(
                "{}\t{}\t{} ~ {}\t{}",
                app.id, app.status, app.apply_date_start, app.apply_date_end, app.title
            );
        }
        Ok(())
    }

    async fn review(&self, command: ReviewCommand) -> Result<(), PortalError> {
        let mut board = ReviewBoard::new(self.backend.clone(), self.role()?);
        let id = match &command {
            ReviewCommand::Status { id, .. }
            | ReviewCommand::Comment { id, .. }
            | ReviewCommand::View { id } => ApplicationId::new(id.clone()),
        };
        board.load(&id).await?;
        match command {
            ReviewCommand::Status { status, .. } => {
                let status = ApplicationStatus::from(status);
                board.set_status(&id, status).await?;
                println!("{} 已設為 {}", id, status);
            }
            ReviewCommand::Comment { text, .. } => {
                board.open_comment(&id)?;
                board.edit_comment(text)?;
                board.save_comment().await?;
                println!("已儲存 {} 的評論", id);
            }
            ReviewCommand::View { .. } => {
                let editor = board.open_comment(&id)?;
                println!("{}", display_comment(&editor.buffer));
            }
        }
        Ok(())
    }

    async fn gmail(&self, command: GmailCommand) -> Result<(), PortalError> {
        let current = self.backend.gmail_settings().await?;
        let mut form = GmailSettingsForm::from_settings(&current);
        match command {
            GmailCommand::Show => {
                println!(
                    "{} ({})",
                    form.gmail_user,
                    if form.is_configured { "已設定" } else { "未設定" }
                );
                return Ok(());
            }
            GmailCommand::Set { user, app_password } => {
                form.gmail_user = user;
                form.gmail_app_password = app_password.unwrap_or_default();
                settings::save_gmail_settings(self.backend.as_ref(), &mut form).await?;
            }
            GmailCommand::Clear => {
                let saved = self
                    .backend
                    .update_gmail_settings(&GmailSettingsForm::clear_update())
                    .await?;
                form.apply_saved(&saved);
            }
        }
        println!("{}", form.status_message());
        Ok(())
    }
}

//=========================================================================================
// Files
//=========================================================================================

/// A form file: the form snapshot plus, once it has been pulled or submitted,
/// the id of the stored application it edits.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<ApplicationId>,
    #[serde(flatten)]
    pub form: ApplicationForm,
}

impl FormFile {
    pub fn new(form: ApplicationForm) -> Self {
        Self {
            record_id: None,
            form,
        }
    }

    pub fn mode(&self) -> FormMode {
        match &self.record_id {
            Some(id) => FormMode::Edit(id.clone()),
            None => FormMode::New,
        }
    }
}

async fn read_form(path: &Path) -> Result<FormFile, PortalError> {
    let raw = tokio::fs::read_to_string(path).await?;
    debug!(path = %path.display(), "Read form file");
    let mut file: FormFile = serde_json::from_str(&raw)?;
    file.form = normalize(file.form);
    Ok(file)
}

async fn write_form(path: &Path, file: &FormFile) -> Result<(), PortalError> {
    tokio::fs::write(path, serde_json::to_string_pretty(file)?).await?;
    Ok(())
}

fn set_date_part(
    filter: &mut HistoryFilter,
    value: Option<String>,
    setter: fn(&mut HistoryFilter, &str) -> bool,
) -> Result<(), PortalError> {
    match value {
        Some(value) if !setter(filter, &value) => Err(PortalError::InvalidInput(format!(
            "日期篩選只能輸入數字: '{}'",
            value
        ))),
        _ => Ok(()),
    }
}

fn print_student(student: &StudentRecord) {
    println!(
        "{}\t{}\t{}\t{}",
        student.student_id, student.class_name, student.seat_number, student.name
    );
}

/// A pointer session recorded from a signature pad.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeRecording {
    pub layout: LayoutBox,
    #[serde(default = "default_pixel_ratio")]
    pub device_pixel_ratio: f64,
    pub events: Vec<SurfaceEvent>,
}

fn default_pixel_ratio() -> f64 {
    1.0
}

async fn capture_signature(role: SignerRole, path: &Path) -> Result<String, PortalError> {
    let recording: StrokeRecording =
        serde_json::from_str(&tokio::fs::read_to_string(path).await?)?;
    let mut capture = SignatureCapture::open(role, recording.layout, recording.device_pixel_ratio);
    for event in &recording.events {
        capture.surface_mut().apply(event);
    }
    capture
        .confirm()?
        .ok_or_else(|| PortalError::InvalidInput("簽名板上沒有筆跡".to_string()))
}
