mod normalize;
mod rules;
mod schema;

pub use normalize::normalize;
pub use schema::{SchemaRevision, ELIGIBILITY_CUTOFF};

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::domain::{
    ApplicantRecord, Attachment, AttachmentSlot, ExperienceAnswer, Field, VerificationRecord,
};

/// Key under which a validation message is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    Field(Field),
    Attachment(AttachmentSlot),
}

impl FieldKey {
    pub const fn key(self) -> &'static str {
        match self {
            FieldKey::Field(field) => field.key(),
            FieldKey::Attachment(slot) => slot.key(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl From<Field> for FieldKey {
    fn from(value: Field) -> Self {
        FieldKey::Field(value)
    }
}

impl From<AttachmentSlot> for FieldKey {
    fn from(value: AttachmentSlot) -> Self {
        FieldKey::Attachment(value)
    }
}

/// A failed rule with its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: FieldKey,
    pub message: String,
}

/// Outcome of validating a whole record; empty when everything passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: BTreeMap<FieldKey, String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn message(&self, key: impl Into<FieldKey>) -> Option<&str> {
        self.errors.get(&key.into()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &str)> {
        self.errors
            .iter()
            .map(|(key, message)| (*key, message.as_str()))
    }

    pub fn record(&mut self, outcome: Result<(), FieldError>) {
        match outcome {
            Ok(()) => {}
            Err(error) => {
                self.errors.insert(error.field, error.message);
            }
        }
    }

    pub fn clear(&mut self, key: impl Into<FieldKey>) {
        self.errors.remove(&key.into());
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
    }

    /// Wire-keyed view for display and serialization.
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        self.errors
            .iter()
            .map(|(key, message)| (key.key(), message.clone()))
            .collect()
    }
}

impl Serialize for ValidationReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

/// Stateless rule table bound to one schema revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Validator {
    revision: SchemaRevision,
}

impl Validator {
    pub fn new(revision: SchemaRevision) -> Self {
        Self { revision }
    }

    pub fn revision(&self) -> SchemaRevision {
        self.revision
    }

    /// Check one field value as typed.
    pub fn check(&self, field: Field, value: &str) -> Result<(), FieldError> {
        rules::check_field(field, value).map_err(|message| FieldError {
            field: FieldKey::Field(field),
            message,
        })
    }

    pub fn check_attachment(
        &self,
        slot: AttachmentSlot,
        attachment: Option<&Attachment>,
    ) -> Result<(), FieldError> {
        rules::check_attachment(slot, attachment, self.revision).map_err(|message| FieldError {
            field: FieldKey::Attachment(slot),
            message,
        })
    }

    pub fn check_verification(&self, verification: &VerificationRecord) -> ValidationReport {
        let mut report = ValidationReport::default();
        report.record(self.check(Field::NationalId, &verification.national_id));
        report.record(self.check(Field::Suffix, &verification.suffix));
        let region = verification
            .issuing_region
            .map(|region| region.code())
            .unwrap_or_default();
        report.record(self.check(Field::IssuingRegion, region));
        report
    }

    /// Full pre-submission pass over every field and attachment.
    pub fn check_applicant(&self, applicant: &ApplicantRecord) -> ValidationReport {
        let mut report = ValidationReport::default();
        for field in Field::APPLICANT {
            report.record(self.check(field, &applicant.text(field)));
        }

        if applicant.experience == Some(ExperienceAnswer::Yes) && applicant.process_count.is_none()
        {
            report.record(Err(FieldError {
                field: FieldKey::Field(Field::ProcessCount),
                message: "Seleccione el número de procesos".to_string(),
            }));
        }

        for slot in AttachmentSlot::ALL {
            report.record(self.check_attachment(slot, applicant.attachment(slot)));
        }
        report
    }
}
