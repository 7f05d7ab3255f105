//! crates/learning_plan_core/src/validator.rs
//!
//! Submission rules for the application form. `validate` is pure: it never
//! touches the network and reports every failing field group at once.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{ApplicationForm, MIN_PLAN_HOURS};

/// The section of the form an error message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldGroup {
    ProjectTitle,
    Motivation,
    LearningCategory,
    References,
    ExpectedOutcome,
    EquipmentNeeds,
    EnvNeeds,
    PlanItems,
    PlanHours,
    MidtermGoal,
    FinalGoal,
    PresentationFormat,
    PhoneAgreement,
}

impl FieldGroup {
    pub const fn key(self) -> &'static str {
        match self {
            Self::ProjectTitle => "projectTitle",
            Self::Motivation => "motivation",
            Self::LearningCategory => "learningCategory",
            Self::References => "references",
            Self::ExpectedOutcome => "expectedOutcome",
            Self::EquipmentNeeds => "equipmentNeeds",
            Self::EnvNeeds => "envNeeds",
            Self::PlanItems => "planItems",
            Self::PlanHours => "planHours",
            Self::MidtermGoal => "midtermGoal",
            Self::FinalGoal => "finalGoal",
            Self::PresentationFormat => "presentationFormat",
            Self::PhoneAgreement => "phoneAgreement",
        }
    }
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Field group to the message shown next to that section.
pub type ErrorMap = BTreeMap<FieldGroup, String>;

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Renders hours the way the form displays them (`16`, not `16.0`).
fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{}", hours as i64)
    } else {
        format!("{}", hours)
    }
}

/// Checks `form` against every submission rule and collects all failures.
pub fn validate(form: &ApplicationForm) -> ErrorMap {
    let mut errors = ErrorMap::new();

    if blank(&form.title) {
        errors.insert(FieldGroup::ProjectTitle, "請輸入計畫名稱".to_string());
    }

    if blank(&form.motivation) {
        errors.insert(FieldGroup::Motivation, "請描述您的學習動機".to_string());
    }

    if !form.learning_categories.has_selection() {
        errors.insert(FieldGroup::LearningCategory, "請至少選擇一個學習類別".to_string());
    }

    let incomplete_reference = form
        .references
        .iter()
        .any(|r| blank(&r.title) || blank(&r.author) || blank(&r.publisher));
    if incomplete_reference {
        errors.insert(
            FieldGroup::References,
            "請完整填寫每筆參考資料的書名、作者與出版社".to_string(),
        );
    }

    if blank(&form.expected_outcome) {
        errors.insert(FieldGroup::ExpectedOutcome, "請填寫預期成效".to_string());
    }

    if blank(&form.equipment_needs) {
        errors.insert(FieldGroup::EquipmentNeeds, "請填寫學習裝置需求".to_string());
    }

    if !form.env_needs.has_selection() {
        errors.insert(FieldGroup::EnvNeeds, "請至少選擇一個學習環境需求".to_string());
    }

    // Completeness and the hour total are reported independently.
    if form.plan_items.iter().any(|item| !item.is_complete()) {
        errors.insert(
            FieldGroup::PlanItems,
            "請完整填寫學習內容規劃的每個項次，所有欄位皆為必填".to_string(),
        );
    }

    let total = form.total_hours();
    if total < MIN_PLAN_HOURS {
        errors.insert(
            FieldGroup::PlanHours,
            format!("總時數不足18小時 (目前 {} 小時)", format_hours(total)),
        );
    }

    if blank(&form.midterm_goal) {
        errors.insert(FieldGroup::MidtermGoal, "請填寫階段中(4周後)預計達成目標".to_string());
    }

    if blank(&form.final_goal) {
        errors.insert(FieldGroup::FinalGoal, "請填寫階段末(8周後)預計達成目標".to_string());
    }

    if !form.presentation_formats.has_selection() {
        errors.insert(FieldGroup::PresentationFormat, "請選擇或說明成果發表形式".to_string());
    }

    if !form.phone_agreement.is_set() {
        errors.insert(FieldGroup::PhoneAgreement, "請選擇是否同意手機使用規範".to_string());
    }

    errors
}
