//! crates/learning_plan_core/src/payload.rs
//!
//! Translation between the internal form state and the backend's snake_case
//! application schema. Every renamed field is listed in `FIELD_TABLE`.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::{
    ApplicationForm, ApplicationId, ApplicationRecord, ApplicationStatus, CheckboxGroup, Member,
    PhoneAgreement, PlanItem, Reference, SignerRole, Signatures, SubmittedBefore, MEMBER_SLOTS,
};
use crate::form;

//=========================================================================================
// Field Table
//=========================================================================================

/// Internal (draft snapshot) path to transport field name. Nested rows use the
/// `section.field` form on the internal side.
pub const FIELD_TABLE: &[(&str, &str)] = &[
    ("title", "title"),
    ("applyDateStart", "apply_date_start"),
    ("applyDateEnd", "apply_date_end"),
    ("members", "members"),
    ("motivation", "motivation"),
    ("learningCategories", "learning_categories"),
    ("learningCategories.other", "learning_category_other"),
    ("references", "references"),
    ("expectedOutcome", "expected_outcome"),
    ("equipmentNeeds", "equipment_needs"),
    ("envNeeds", "env_needs"),
    ("envNeeds.other", "env_other"),
    ("planItems", "plan_items"),
    ("midtermGoal", "midterm_goal"),
    ("finalGoal", "final_goal"),
    ("presentationFormats", "presentation_formats"),
    ("presentationFormats.other", "presentation_other"),
    ("phoneAgreement", "phone_agreement"),
    ("signatures", "signatures"),
];

pub const MEMBER_FIELD_TABLE: &[(&str, &str)] = &[
    ("studentId", "student_id"),
    ("studentClass", "student_class"),
    ("studentSeat", "student_seat"),
    ("studentName", "student_name"),
    ("hasSubmitted", "has_submitted"),
];

pub const REFERENCE_FIELD_TABLE: &[(&str, &str)] = &[
    ("title", "book_title"),
    ("author", "author"),
    ("publisher", "publisher"),
    ("link", "link"),
];

pub fn wire_name(internal: &str) -> Option<&'static str> {
    FIELD_TABLE
        .iter()
        .find(|(i, _)| *i == internal)
        .map(|(_, w)| *w)
}

pub fn internal_name(wire: &str) -> Option<&'static str> {
    FIELD_TABLE
        .iter()
        .find(|(_, w)| *w == wire)
        .map(|(i, _)| *i)
}

//=========================================================================================
// Transport Structs
//=========================================================================================

/// Reads `null` as the type's default; older records store nulls in optional text fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberWire {
    pub student_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub student_class: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub student_seat: String,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub has_submitted: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceWire {
    pub book_title: String,
    pub author: String,
    pub publisher: String,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanItemWire {
    pub date: String,
    pub content: String,
    pub hours: String,
    pub metric: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureWire {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Body of `POST /applications/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationPayload {
    pub title: String,
    pub apply_date_start: String,
    pub apply_date_end: String,
    pub members: Vec<MemberWire>,
    pub motivation: String,
    pub learning_categories: BTreeMap<String, bool>,
    #[serde(deserialize_with = "null_as_default")]
    pub learning_category_other: String,
    pub references: Vec<ReferenceWire>,
    #[serde(deserialize_with = "null_as_default")]
    pub expected_outcome: String,
    #[serde(deserialize_with = "null_as_default")]
    pub equipment_needs: String,
    pub env_needs: BTreeMap<String, bool>,
    #[serde(deserialize_with = "null_as_default")]
    pub env_other: String,
    pub plan_items: Vec<PlanItemWire>,
    #[serde(deserialize_with = "null_as_default")]
    pub midterm_goal: String,
    #[serde(deserialize_with = "null_as_default")]
    pub final_goal: String,
    #[serde(deserialize_with = "null_as_default")]
    pub presentation_formats: BTreeMap<String, bool>,
    #[serde(deserialize_with = "null_as_default")]
    pub presentation_other: String,
    #[serde(deserialize_with = "null_as_default")]
    pub phone_agreement: String,
    pub signatures: Vec<SignatureWire>,
}

/// Body of `PUT /applications/{id}`. Every student edit sends the record back to review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationUpdate {
    #[serde(flatten)]
    pub fields: ApplicationPayload,
    pub status: ApplicationStatus,
}

/// A full application as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationResponse {
    pub id: String,
    #[serde(flatten)]
    pub fields: ApplicationPayload,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comment: String,
    #[serde(default)]
    pub submitter_id: String,
    #[serde(default)]
    pub submitter_student_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl ApplicationResponse {
    pub fn into_record(self) -> ApplicationRecord {
        ApplicationRecord {
            id: ApplicationId(self.id),
            form: from_payload(self.fields),
            status: self.status,
            comment: self.comment,
            submitter_id: self.submitter_id,
            submitter_student_id: self.submitter_student_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// Form -> Transport
//=========================================================================================

/// Builds the create payload. Blank member slots are left out.
pub fn to_payload(form: &ApplicationForm) -> ApplicationPayload {
    ApplicationPayload {
        title: form.title.trim().to_string(),
        apply_date_start: form.apply_date_start.clone(),
        apply_date_end: form.apply_date_end.clone(),
        members: form
            .members
            .iter()
            .filter(|m| !m.is_blank())
            .map(member_to_wire)
            .collect(),
        motivation: form.motivation.clone(),
        learning_categories: form.learning_categories.checked.clone(),
        learning_category_other: form.learning_categories.other.clone(),
        references: form.references.iter().map(reference_to_wire).collect(),
        expected_outcome: form.expected_outcome.clone(),
        equipment_needs: form.equipment_needs.clone(),
        env_needs: form.env_needs.checked.clone(),
        env_other: form.env_needs.other.clone(),
        plan_items: form
            .plan_items
            .iter()
            .map(|item| PlanItemWire {
                date: item.date.clone(),
                content: item.content.clone(),
                hours: item.hours.trim().to_string(),
                metric: item.metric.clone(),
            })
            .collect(),
        midterm_goal: form.midterm_goal.clone(),
        final_goal: form.final_goal.clone(),
        presentation_formats: form.presentation_formats.checked.clone(),
        presentation_other: form.presentation_formats.other.clone(),
        phone_agreement: form.phone_agreement.as_wire().to_string(),
        signatures: signatures_to_wire(&form.signatures),
    }
}

/// Builds the update payload, resetting the record to pending review.
pub fn to_update(form: &ApplicationForm) -> ApplicationUpdate {
    ApplicationUpdate {
        fields: to_payload(form),
        status: ApplicationStatus::Pending,
    }
}

fn member_to_wire(member: &Member) -> MemberWire {
    MemberWire {
        student_id: member.student_id.trim().to_string(),
        student_class: member.student_class.clone(),
        student_seat: member.student_seat.clone(),
        student_name: Some(member.student_name.clone()).filter(|n| !n.is_empty()),
        has_submitted: member.has_submitted.as_wire().map(str::to_string),
    }
}

fn reference_to_wire(reference: &Reference) -> ReferenceWire {
    ReferenceWire {
        book_title: reference.title.clone(),
        author: reference.author.clone(),
        publisher: reference.publisher.clone(),
        link: Some(reference.link.trim().to_string()).filter(|l| !l.is_empty()),
    }
}

fn signatures_to_wire(signatures: &Signatures) -> Vec<SignatureWire> {
    SignerRole::ALL
        .into_iter()
        .filter_map(|role| {
            signatures.get(role).map(|image| SignatureWire {
                kind: role.label().to_string(),
                image_url: Some(image.to_string()),
            })
        })
        .collect()
}

//=========================================================================================
// Transport -> Form
//=========================================================================================

/// Rebuilds editable form state from a stored application.
pub fn from_payload(payload: ApplicationPayload) -> ApplicationForm {
    let mut members: [Member; MEMBER_SLOTS] = Default::default();
    for (slot, wire) in members.iter_mut().zip(payload.members) {
        *slot = Member {
            student_id: wire.student_id,
            student_class: wire.student_class,
            student_seat: wire.student_seat,
            student_name: wire.student_name.unwrap_or_default(),
            has_submitted: SubmittedBefore::from_wire(wire.has_submitted.as_deref()),
        };
    }

    let mut signatures = Signatures::default();
    for wire in payload.signatures {
        match (SignerRole::from_label(&wire.kind), wire.image_url) {
            (Some(role), Some(image)) if !image.is_empty() => signatures.set(role, image),
            (None, _) => debug!(signer = %wire.kind, "Dropping signature for unknown signer slot"),
            _ => {}
        }
    }

    let form = ApplicationForm {
        title: payload.title,
        apply_date_start: payload.apply_date_start,
        apply_date_end: payload.apply_date_end,
        members,
        motivation: payload.motivation,
        learning_categories: CheckboxGroup {
            checked: payload.learning_categories,
            other: payload.learning_category_other,
        },
        references: payload
            .references
            .into_iter()
            .map(|wire| Reference {
                link: wire.link.unwrap_or_default(),
                title: wire.book_title,
                author: wire.author,
                publisher: wire.publisher,
                ..Reference::empty()
            })
            .collect(),
        expected_outcome: payload.expected_outcome,
        equipment_needs: payload.equipment_needs,
        env_needs: CheckboxGroup {
            checked: payload.env_needs,
            other: payload.env_other,
        },
        plan_items: payload
            .plan_items
            .into_iter()
            .map(|wire| PlanItem {
                date: wire.date,
                content: wire.content,
                hours: wire.hours,
                metric: wire.metric,
                ..PlanItem::empty()
            })
            .collect(),
        midterm_goal: payload.midterm_goal,
        final_goal: payload.final_goal,
        presentation_formats: CheckboxGroup {
            checked: payload.presentation_formats,
            other: payload.presentation_other,
        },
        phone_agreement: PhoneAgreement::from_wire(&payload.phone_agreement),
        signatures,
    };
    form::normalize(form)
}
