//! crates/learning_plan_core/src/domain.rs
//!
//! Defines the core data structures of the learning plan application.
//! The form types serialize in the camelCase shape used for draft snapshots;
//! the snake_case transport shape lives in `payload`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Fixed Vocabularies and Limits
//=========================================================================================

/// Number of member slots on a form (leader plus two members).
pub const MEMBER_SLOTS: usize = 3;

/// Upper bound on plan items.
pub const MAX_PLAN_ITEMS: usize = 9;

/// Minimum summed plan hours for a valid submission.
pub const MIN_PLAN_HOURS: f64 = 18.0;

pub const LEARNING_CATEGORIES: [&str; 8] = [
    "閱讀計畫",
    "專題研究",
    "技藝學習",
    "實作體驗",
    "志工服務",
    "藝文創作",
    "競賽準備",
    "課程延伸",
];

pub const ENV_NEEDS: [&str; 4] = ["自習室", "數位閱讀室", "雲端教室", "美力教室"];

pub const PRESENTATION_STATIC: &str = "靜態展";
pub const PRESENTATION_DYNAMIC: &str = "動態展";
pub const PRESENTATION_FORMATS: [&str; 2] = [PRESENTATION_STATIC, PRESENTATION_DYNAMIC];

//=========================================================================================
// Identifiers and Status
//=========================================================================================

/// Opaque backend-assigned application identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Review status of a submitted application.
///
/// Crosses the backend boundary as fixed localized strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Passed,
    NotPassed,
}

impl ApplicationStatus {
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Pending => "審核中",
            Self::Passed => "透過",
            Self::NotPassed => "未透過",
        }
    }

    /// Parses a wire value. `通過` / `未通過` are older spellings still seen in stored data.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "審核中" => Some(Self::Pending),
            "透過" | "通過" => Some(Self::Passed),
            "未透過" | "未通過" => Some(Self::NotPassed),
            _ => None,
        }
    }

    /// Whether a teacher may move a record from `self` to `to`.
    ///
    /// Pending is never a review target; it is only restored by a student edit.
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Passed)
                | (Self::Pending, Self::NotPassed)
                | (Self::Passed, Self::NotPassed)
                | (Self::NotPassed, Self::Passed)
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl From<ApplicationStatus> for String {
    fn from(status: ApplicationStatus) -> Self {
        status.as_wire().to_string()
    }
}

impl TryFrom<String> for ApplicationStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_wire(&value).ok_or_else(|| format!("unknown application status '{}'", value))
    }
}

//=========================================================================================
// Tri-state Fields
//=========================================================================================

/// Whether a member has handed in self-directed learning results before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmittedBefore {
    #[default]
    Unset,
    Yes,
    No,
}

impl SubmittedBefore {
    pub fn as_wire(self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            Self::Yes => Some("是"),
            Self::No => Some("否"),
        }
    }

    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("是") => Self::Yes,
            Some("否") => Self::No,
            _ => Self::Unset,
        }
    }
}

/// Answer to the phone usage rules. Must be set before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhoneAgreement {
    #[default]
    Unset,
    Agree,
    Disagree,
}

impl PhoneAgreement {
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Agree => "同意",
            Self::Disagree => "不同意",
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "同意" => Self::Agree,
            "不同意" => Self::Disagree,
            _ => Self::Unset,
        }
    }

    pub fn is_set(self) -> bool {
        self != Self::Unset
    }
}

//=========================================================================================
// Form Sections
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Member {
    pub student_id: String,
    pub student_class: String,
    pub student_seat: String,
    pub student_name: String,
    pub has_submitted: SubmittedBefore,
}

impl Member {
    pub fn is_blank(&self) -> bool {
        self.student_id.trim().is_empty()
    }
}

/// A book or article the learning method draws on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Client-side row key; rows written by hand get a fresh one.
    #[serde(default = "Uuid::new_v4")]
    pub key: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub link: String,
}

impl Reference {
    pub fn empty() -> Self {
        Self {
            key: Uuid::new_v4(),
            title: String::new(),
            author: String::new(),
            publisher: String::new(),
            link: String::new(),
        }
    }
}

/// One dated entry of the learning schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    #[serde(default = "Uuid::new_v4")]
    pub key: Uuid,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub hours: String,
    #[serde(default)]
    pub metric: String,
}

impl PlanItem {
    pub fn empty() -> Self {
        Self {
            key: Uuid::new_v4(),
            date: String::new(),
            content: String::new(),
            hours: String::new(),
            metric: String::new(),
        }
    }

    /// Hours as a number; anything unparsable counts as zero.
    pub fn parsed_hours(&self) -> f64 {
        self.hours
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|h| h.is_finite())
            .unwrap_or(0.0)
    }

    pub fn is_complete(&self) -> bool {
        [&self.date, &self.content, &self.hours, &self.metric]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

/// A checkbox group over a fixed vocabulary plus a free-text "other".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckboxGroup {
    pub checked: BTreeMap<String, bool>,
    pub other: String,
}

impl CheckboxGroup {
    pub fn is_checked(&self, option: &str) -> bool {
        self.checked.get(option).copied().unwrap_or(false)
    }

    /// True when at least one box is ticked or the other-text is filled.
    pub fn has_selection(&self) -> bool {
        self.checked.values().any(|v| *v) || !self.other.trim().is_empty()
    }
}

//=========================================================================================
// Signatures
//=========================================================================================

/// Fixed signer slots, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignerRole {
    Leader,
    LeaderGuardian,
    Member1,
    Member1Guardian,
    Member2,
    Member2Guardian,
    AdvisingTeacher,
    HomeroomTeacher,
    FacilityManager,
}

impl SignerRole {
    pub const ALL: [SignerRole; 9] = [
        Self::Leader,
        Self::LeaderGuardian,
        Self::Member1,
        Self::Member1Guardian,
        Self::Member2,
        Self::Member2Guardian,
        Self::AdvisingTeacher,
        Self::HomeroomTeacher,
        Self::FacilityManager,
    ];

    /// The label printed on the form, also used as the signature `type` on the wire.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Leader => "組長簽名",
            Self::LeaderGuardian => "組長父母或監護人簽名",
            Self::Member1 => "組員1簽名",
            Self::Member1Guardian => "組員1父母或監護人簽名",
            Self::Member2 => "組員2簽名",
            Self::Member2Guardian => "組員2父母或監護人簽名",
            Self::AdvisingTeacher => "指導教師簽章",
            Self::HomeroomTeacher => "導師簽章",
            Self::FacilityManager => "空間設備管理人簽章",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.label() == label)
    }
}

/// Confirmed signature images keyed by signer slot. Each slot holds at most one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signatures(BTreeMap<SignerRole, String>);

impl Signatures {
    pub fn get(&self, role: SignerRole) -> Option<&str> {
        self.0.get(&role).map(String::as_str)
    }

    /// Stores `image`, replacing whatever the slot held before.
    pub fn set(&mut self, role: SignerRole, image: String) {
        self.0.insert(role, image);
    }

    pub fn remove(&mut self, role: SignerRole) -> Option<String> {
        self.0.remove(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignerRole, &str)> {
        self.0.iter().map(|(role, image)| (*role, image.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

//=========================================================================================
// The Application Form
//=========================================================================================

/// The complete editable state of one application form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationForm {
    pub title: String,
    pub apply_date_start: String,
    pub apply_date_end: String,
    pub members: [Member; MEMBER_SLOTS],
    pub motivation: String,
    pub learning_categories: CheckboxGroup,
    pub references: Vec<Reference>,
    pub expected_outcome: String,
    pub equipment_needs: String,
    pub env_needs: CheckboxGroup,
    pub plan_items: Vec<PlanItem>,
    pub midterm_goal: String,
    pub final_goal: String,
    pub presentation_formats: CheckboxGroup,
    pub phone_agreement: PhoneAgreement,
    pub signatures: Signatures,
}

impl Default for ApplicationForm {
    /// An empty form: three blank member slots, one plan item, one reference.
    fn default() -> Self {
        Self {
            title: String::new(),
            apply_date_start: String::new(),
            apply_date_end: String::new(),
            members: Default::default(),
            motivation: String::new(),
            learning_categories: CheckboxGroup::default(),
            references: vec![Reference::empty()],
            expected_outcome: String::new(),
            equipment_needs: String::new(),
            env_needs: CheckboxGroup::default(),
            plan_items: vec![PlanItem::empty()],
            midterm_goal: String::new(),
            final_goal: String::new(),
            presentation_formats: CheckboxGroup::default(),
            phone_agreement: PhoneAgreement::Unset,
            signatures: Signatures::default(),
        }
    }
}

impl ApplicationForm {
    pub fn total_hours(&self) -> f64 {
        self.plan_items.iter().map(PlanItem::parsed_hours).sum()
    }
}

/// Whether the form creates a new record or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    New,
    Edit(ApplicationId),
}

impl FormMode {
    pub fn is_edit(&self) -> bool {
        matches!(self, Self::Edit(_))
    }
}

//=========================================================================================
// Records Returned by the Backend
//=========================================================================================

/// A submitted application as stored by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub form: ApplicationForm,
    pub status: ApplicationStatus,
    pub comment: String,
    pub submitter_id: String,
    pub submitter_student_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ApplicationRecord {
    /// The list entry for this record.
    pub fn summary(&self) -> ApplicationSummary {
        ApplicationSummary {
            id: self.id.clone(),
            title: self.form.title.clone(),
            apply_date_start: self.form.apply_date_start.clone(),
            apply_date_end: self.form.apply_date_end.clone(),
            status: self.status,
            comment: self.comment.clone(),
            submitter_student_id: self.submitter_student_id.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// The list view of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub id: ApplicationId,
    pub title: String,
    pub apply_date_start: String,
    pub apply_date_end: String,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub submitter_student_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Filters for the application listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub status: ApplicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A rendered PDF of one application.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfExport {
    pub filename: String,
    pub bytes: Vec<u8>,
}

//=========================================================================================
// Users, Students and Settings
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: UserRole,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub seat_number: Option<u32>,
    #[serde(default)]
    pub teacher_name: Option<String>,
}

/// The logged-in credential and its user, as kept by a `SessionStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: User,
}

/// Account creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
}

/// An entry from the school-wide student roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub class_name: String,
    pub seat_number: u32,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// Notification mail configuration. The app password is never returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GmailSettings {
    #[serde(default)]
    pub gmail_user: Option<String>,
    #[serde(default)]
    pub is_configured: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GmailSettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gmail_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gmail_app_password: Option<String>,
}
