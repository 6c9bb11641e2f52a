//! Applicant registration: identity verification, the validated application
//! form, and the submission that returns a confirmation document.

pub mod document;
pub mod domain;
pub mod gateway;
pub mod payload;
pub mod sequencer;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use document::ConfirmationDocument;
pub use domain::{
    ApplicantRecord, Attachment, AttachmentKind, AttachmentSlot, EducationLevel,
    ExperienceAnswer, Field, FileDescriptor, FileHandle, IssuingRegion, PostulationType,
    Requirements, Step, VerificationRecord,
};
pub use gateway::{
    ExistenceReply, GatewayError, HttpRegistryClient, RegistryGateway, SubmissionResponse,
};
pub use payload::{FilePart, PayloadError, SubmissionRequest};
pub use sequencer::{
    Banner, BannerKind, RegistrationError, RegistrationSequencer, SubmissionReceipt,
    VerificationOutcome,
};
pub use store::{
    JsonFileSessionStore, MemorySessionStore, SessionSnapshot, SessionStore, SessionStoreError,
    STORAGE_KEY,
};
pub use validation::{
    normalize, FieldError, FieldKey, SchemaRevision, ValidationReport, Validator,
    ELIGIBILITY_CUTOFF,
};
