//! crates/learning_plan_core/src/settings.rs
//!
//! Account-level forms that sit beside the application form: the teacher's
//! Gmail notification settings and the password change dialog.

use tracing::info;

use crate::domain::{GmailSettings, GmailSettingsUpdate};
use crate::ports::{AuthService, PortError, SettingsService};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("請輸入有效的 Gmail 帳號")]
    InvalidGmail,
    #[error("請輸入 Gmail 應用程式密碼")]
    MissingAppPassword,
    #[error("請填寫所有欄位")]
    MissingPasswordFields,
    #[error("新密碼與確認密碼不一致")]
    PasswordMismatch,
    #[error("新密碼長度至少需要6個字元")]
    PasswordTooShort,
    #[error("新密碼不能與舊密碼相同")]
    PasswordUnchanged,
    #[error(transparent)]
    Port(#[from] PortError),
}

//=========================================================================================
// Gmail Notification Settings
//=========================================================================================

/// Edit state of the notification settings. The stored app password is never
/// shown; `gmail_app_password` only holds a newly typed one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GmailSettingsForm {
    pub gmail_user: String,
    pub gmail_app_password: String,
    pub is_configured: bool,
}

impl GmailSettingsForm {
    pub fn from_settings(settings: &GmailSettings) -> Self {
        Self {
            gmail_user: settings.gmail_user.clone().unwrap_or_default(),
            gmail_app_password: String::new(),
            is_configured: settings.is_configured,
        }
    }

    /// An empty address clears the configuration. A password is only sent when
    /// one was typed, and is required when nothing is configured yet.
    pub fn build_update(&self) -> Result<GmailSettingsUpdate, SettingsError> {
        let user = self.gmail_user.trim();
        if user.is_empty() {
            return Ok(Self::clear_update());
        }
        if !user.contains('@') {
            return Err(SettingsError::InvalidGmail);
        }
        if self.gmail_app_password.is_empty() && !self.is_configured {
            return Err(SettingsError::MissingAppPassword);
        }
        Ok(GmailSettingsUpdate {
            gmail_user: Some(user.to_string()),
            gmail_app_password: Some(self.gmail_app_password.clone()).filter(|p| !p.is_empty()),
        })
    }

    pub fn clear_update() -> GmailSettingsUpdate {
        GmailSettingsUpdate {
            gmail_user: Some(String::new()),
            gmail_app_password: Some(String::new()),
        }
    }

    /// Takes in the saved settings and forgets the typed password.
    pub fn apply_saved(&mut self, saved: &GmailSettings) {
        self.gmail_user = saved.gmail_user.clone().unwrap_or_default();
        self.gmail_app_password.clear();
        self.is_configured = saved.is_configured;
    }

    pub fn status_message(&self) -> &'static str {
        if self.is_configured {
            "Gmail 設定已儲存，審核結果將會自動發送郵件通知學生。"
        } else {
            "Gmail 設定已清除，審核結果將不會發送郵件通知。"
        }
    }
}

pub async fn save_gmail_settings(
    service: &dyn SettingsService,
    form: &mut GmailSettingsForm,
) -> Result<(), SettingsError> {
    let update = form.build_update()?;
    let saved = service.update_gmail_settings(&update).await?;
    form.apply_saved(&saved);
    info!(configured = saved.is_configured, "Gmail settings saved");
    Ok(())
}

//=========================================================================================
// Password Change
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.old_password.is_empty() || self.new_password.is_empty() || self.confirm_password.is_empty() {
            return Err(SettingsError::MissingPasswordFields);
        }
        if self.new_password != self.confirm_password {
            return Err(SettingsError::PasswordMismatch);
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SettingsError::PasswordTooShort);
        }
        if self.new_password == self.old_password {
            return Err(SettingsError::PasswordUnchanged);
        }
        Ok(())
    }
}

pub async fn change_password(
    auth: &dyn AuthService,
    change: &PasswordChange,
) -> Result<(), SettingsError> {
    change.validate()?;
    auth.change_password(&change.old_password, &change.new_password).await?;
    info!("Password changed");
    Ok(())
}
