use super::domain::{ApplicantRecord, Attachment, AttachmentSlot, Field, VerificationRecord};

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("attachment {0} was restored without its content and must be attached again")]
    MissingFileContent(AttachmentSlot),
    #[error("could not encode requirements: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File content sent as one multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: &'static str,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Transport-neutral description of the multipart registration request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub fields: Vec<(&'static str, String)>,
    pub files: Vec<FilePart>,
}

impl SubmissionRequest {
    /// Flatten a validated session into form parts.
    ///
    /// Fails if an attachment only exists as a restored descriptor; absent
    /// optional attachments are left out.
    pub fn build(
        verification: &VerificationRecord,
        applicant: &ApplicantRecord,
    ) -> Result<Self, PayloadError> {
        let mut fields: Vec<(&'static str, String)> = Field::APPLICANT
            .into_iter()
            .map(|field| (field.key(), applicant.text(field)))
            .collect();
        fields.push(("requisitos", serde_json::to_string(&applicant.requirements)?));

        let mut files = Vec::new();
        for slot in AttachmentSlot::ALL {
            match applicant.attachment(slot) {
                Some(Attachment::Live(file)) => files.push(FilePart {
                    field: slot.key(),
                    file_name: file.name.clone(),
                    mime_type: file.mime_type.clone(),
                    bytes: file.bytes.clone(),
                }),
                Some(Attachment::Restored(_)) => {
                    return Err(PayloadError::MissingFileContent(slot))
                }
                None => {}
            }
        }

        fields.push(("cedulaIdentidad", verification.national_id.clone()));
        fields.push(("complemento", verification.suffix.clone()));
        fields.push((
            "expedicion",
            verification
                .issuing_region
                .map(|region| region.code().to_string())
                .unwrap_or_default(),
        ));
        fields.push((
            "experiencia_general",
            applicant.general_experience().to_string(),
        ));

        Ok(Self { fields, files })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}
