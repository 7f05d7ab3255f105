//! crates/learning_plan_core/src/form.rs
//!
//! The form field registry: controlled-input state for every section of the
//! application form, with the list bounds enforced on each edit.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{
    ApplicationForm, CheckboxGroup, PhoneAgreement, PlanItem, Reference, SignerRole,
    StudentRecord, SubmittedBefore, ENV_NEEDS, LEARNING_CATEGORIES, MAX_PLAN_ITEMS, PRESENTATION_FORMATS,
};
use crate::ports::{PortError, StudentDirectory};

//=========================================================================================
// Field Identifiers and Errors
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Title,
    ApplyDateStart,
    ApplyDateEnd,
    Motivation,
    ExpectedOutcome,
    EquipmentNeeds,
    MidtermGoal,
    FinalGoal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberField {
    StudentId,
    StudentClass,
    StudentSeat,
    StudentName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceField {
    Title,
    Author,
    Publisher,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanItemField {
    Date,
    Content,
    Hours,
    Metric,
}

/// The three checkbox sections, each with its own fixed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckboxSection {
    LearningCategories,
    EnvNeeds,
    PresentationFormats,
}

impl CheckboxSection {
    pub fn vocabulary(self) -> &'static [&'static str] {
        match self {
            Self::LearningCategories => &LEARNING_CATEGORIES,
            Self::EnvNeeds => &ENV_NEEDS,
            Self::PresentationFormats => &PRESENTATION_FORMATS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("Member slot {0} does not exist")]
    NoSuchMember(usize),
    #[error("'{option}' is not an option of {section:?}")]
    UnknownOption {
        section: CheckboxSection,
        option: String,
    },
    #[error("學習內容規劃最多 {0} 個項次")]
    PlanItemsFull(usize),
    #[error("至少需保留一個學習內容項次")]
    LastPlanItem,
    #[error("至少需保留一筆參考資料")]
    LastReference,
    #[error("No form row with key {0}")]
    NoSuchRow(Uuid),
}

//=========================================================================================
// Normalization
//=========================================================================================

/// Restores the list invariants on a form that came from outside (a draft or a
/// stored record): at least one reference, between one and nine plan items.
pub fn normalize(mut form: ApplicationForm) -> ApplicationForm {
    if form.references.is_empty() {
        form.references.push(Reference::empty());
    }
    if form.plan_items.is_empty() {
        form.plan_items.push(PlanItem::empty());
    }
    if form.plan_items.len() > MAX_PLAN_ITEMS {
        warn!(
            count = form.plan_items.len(),
            "Dropping plan items beyond the form's capacity"
        );
        form.plan_items.truncate(MAX_PLAN_ITEMS);
    }
    form
}

//=========================================================================================
// The Registry
//=========================================================================================

/// Owns the form being edited and applies one input change at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormRegistry {
    form: ApplicationForm,
}

impl FormRegistry {
    /// A blank form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates the registry from an existing record or draft snapshot.
    pub fn hydrate(form: ApplicationForm) -> Self {
        Self {
            form: normalize(form),
        }
    }

    pub fn form(&self) -> &ApplicationForm {
        &self.form
    }

    pub fn into_form(self) -> ApplicationForm {
        self.form
    }

    /// A full copy of the current state, as saved to a draft.
    pub fn snapshot(&self) -> ApplicationForm {
        self.form.clone()
    }

    /// Discards every input and starts over with a blank form.
    pub fn reset(&mut self) {
        self.form = ApplicationForm::default();
    }

    // --- Plain text inputs ---

    pub fn set_text(&mut self, field: TextField, value: impl Into<String>) {
        let value = value.into();
        let slot = match field {
            TextField::Title => &mut self.form.title,
            TextField::ApplyDateStart => &mut self.form.apply_date_start,
            TextField::ApplyDateEnd => &mut self.form.apply_date_end,
            TextField::Motivation => &mut self.form.motivation,
            TextField::ExpectedOutcome => &mut self.form.expected_outcome,
            TextField::EquipmentNeeds => &mut self.form.equipment_needs,
            TextField::MidtermGoal => &mut self.form.midterm_goal,
            TextField::FinalGoal => &mut self.form.final_goal,
        };
        *slot = value;
    }

    // --- Members ---

    pub fn set_member_field(
        &mut self,
        slot: usize,
        field: MemberField,
        value: impl Into<String>,
    ) -> Result<(), FormError> {
        let member = self
            .form
            .members
            .get_mut(slot)
            .ok_or(FormError::NoSuchMember(slot))?;
        let target = match field {
            MemberField::StudentId => &mut member.student_id,
            MemberField::StudentClass => &mut member.student_class,
            MemberField::StudentSeat => &mut member.student_seat,
            MemberField::StudentName => &mut member.student_name,
        };
        *target = value.into();
        Ok(())
    }

    pub fn set_member_submitted(
        &mut self,
        slot: usize,
        value: SubmittedBefore,
    ) -> Result<(), FormError> {
        let member = self
            .form
            .members
            .get_mut(slot)
            .ok_or(FormError::NoSuchMember(slot))?;
        member.has_submitted = value;
        Ok(())
    }

    /// Fills name, class and seat of a member slot from a roster entry.
    pub fn apply_student(&mut self, slot: usize, student: &StudentRecord) -> Result<(), FormError> {
        let member = self
            .form
            .members
            .get_mut(slot)
            .ok_or(FormError::NoSuchMember(slot))?;
        member.student_name = student.name.clone();
        member.student_class = student.class_name.clone();
        member.student_seat = student.seat_number.to_string();
        Ok(())
    }

    // --- Checkbox groups ---

    fn group_mut(&mut self, section: CheckboxSection) -> &mut CheckboxGroup {
        match section {
            CheckboxSection::LearningCategories => &mut self.form.learning_categories,
            CheckboxSection::EnvNeeds => &mut self.form.env_needs,
            CheckboxSection::PresentationFormats => &mut self.form.presentation_formats,
        }
    }

    pub fn set_checked(
        &mut self,
        section: CheckboxSection,
        option: &str,
        checked: bool,
    ) -> Result<(), FormError> {
        if !section.vocabulary().contains(&option) {
            return Err(FormError::UnknownOption {
                section,
                option: option.to_string(),
            });
        }
        self.group_mut(section)
            .checked
            .insert(option.to_string(), checked);
        Ok(())
    }

    pub fn set_other(&mut self, section: CheckboxSection, value: impl Into<String>) {
        self.group_mut(section).other = value.into();
    }

    // --- References ---

    /// Appends a blank reference and returns its row key.
    pub fn add_reference(&mut self) -> Uuid {
        let reference = Reference::empty();
        let key = reference.key;
        self.form.references.push(reference);
        key
    }

    pub fn remove_reference(&mut self, key: Uuid) -> Result<(), FormError> {
        let index = self
            .form
            .references
            .iter()
            .position(|r| r.key == key)
            .ok_or(FormError::NoSuchRow(key))?;
        if self.form.references.len() == 1 {
            return Err(FormError::LastReference);
        }
        self.form.references.remove(index);
        Ok(())
    }

    pub fn set_reference_field(
        &mut self,
        key: Uuid,
        field: ReferenceField,
        value: impl Into<String>,
    ) -> Result<(), FormError> {
        let reference = self
            .form
            .references
            .iter_mut()
            .find(|r| r.key == key)
            .ok_or(FormError::NoSuchRow(key))?;
        let target = match field {
            ReferenceField::Title => &mut reference.title,
            ReferenceField::Author => &mut reference.author,
            ReferenceField::Publisher => &mut reference.publisher,
            ReferenceField::Link => &mut reference.link,
        };
        *target = value.into();
        Ok(())
    }

    // --- Plan items ---

    /// Appends a blank plan item unless the schedule is full.
    pub fn add_plan_item(&mut self) -> Result<Uuid, FormError> {
        if self.form.plan_items.len() >= MAX_PLAN_ITEMS {
            return Err(FormError::PlanItemsFull(MAX_PLAN_ITEMS));
        }
        let item = PlanItem::empty();
        let key = item.key;
        self.form.plan_items.push(item);
        Ok(key)
    }

    pub fn remove_plan_item(&mut self, key: Uuid) -> Result<(), FormError> {
        let index = self
            .form
            .plan_items
            .iter()
            .position(|item| item.key == key)
            .ok_or(FormError::NoSuchRow(key))?;
        if self.form.plan_items.len() == 1 {
            return Err(FormError::LastPlanItem);
        }
        self.form.plan_items.remove(index);
        Ok(())
    }

    pub fn set_plan_item_field(
        &mut self,
        key: Uuid,
        field: PlanItemField,
        value: impl Into<String>,
    ) -> Result<(), FormError> {
        let item = self
            .form
            .plan_items
            .iter_mut()
            .find(|item| item.key == key)
            .ok_or(FormError::NoSuchRow(key))?;
        let target = match field {
            PlanItemField::Date => &mut item.date,
            PlanItemField::Content => &mut item.content,
            PlanItemField::Hours => &mut item.hours,
            PlanItemField::Metric => &mut item.metric,
        };
        *target = value.into();
        Ok(())
    }

    pub fn total_hours(&self) -> f64 {
        self.form.total_hours()
    }

    // --- Radio groups and signatures ---

    pub fn set_phone_agreement(&mut self, value: PhoneAgreement) {
        self.form.phone_agreement = value;
    }

    /// Stores a confirmed signature image, or clears the slot with `None`.
    pub fn set_signature(&mut self, role: SignerRole, image: Option<String>) {
        match image {
            Some(image) => self.form.signatures.set(role, image),
            None => {
                self.form.signatures.remove(role);
            }
        }
    }
}

//=========================================================================================
// Student Lookup
//=========================================================================================

/// Looks up the student id typed into `slot` and fills the rest of the member row.
///
/// Returns `Ok(false)` when the id is blank or unknown; the row is left as typed.
pub async fn lookup_member(
    registry: &mut FormRegistry,
    directory: &dyn StudentDirectory,
    slot: usize,
) -> Result<bool, LookupError> {
    let student_id = registry
        .form()
        .members
        .get(slot)
        .ok_or(FormError::NoSuchMember(slot))?
        .student_id
        .trim()
        .to_string();
    if student_id.is_empty() {
        return Ok(false);
    }

    match directory.get_student(&student_id).await {
        Ok(student) => {
            registry.apply_student(slot, &student)?;
            debug!(slot, student_id = %student_id, "Member row filled from roster");
            Ok(true)
        }
        Err(PortError::NotFound(_)) => Ok(false),
        Err(e) => Err(LookupError::Port(e)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Port(#[from] PortError),
}
