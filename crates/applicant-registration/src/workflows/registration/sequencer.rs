use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::document::ConfirmationDocument;
use super::domain::{
    ApplicantRecord, Attachment, AttachmentSlot, EducationLevel, ExperienceAnswer, Field, FileHandle,
    IssuingRegion, PostulationType, Step, VerificationRecord, MAX_PROCESS_COUNT,
};
use super::gateway::{ExistenceReply, GatewayError, RegistryGateway, SubmissionResponse};
use super::payload::{PayloadError, SubmissionRequest};
use super::store::{SessionSnapshot, SessionStore, SessionStoreError};
use super::validation::{normalize, FieldError, FieldKey, ValidationReport, Validator};
use crate::config::FormConfig;

const MSG_ALREADY_REGISTERED: &str = "El postulante ya está registrado.";
const MSG_ELIGIBLE: &str = "Postulante no registrado. Puede proceder con el registro.";
const MSG_VERIFY_FAILED: &str = "Error al verificar el postulante.";
const MSG_CONNECTION: &str = "Error de conexión con el servidor.";
const MSG_FIX_ERRORS: &str = "Por favor corrija los errores en el formulario.";
const MSG_SERVER_RESPONSE: &str = "Error en la respuesta del servidor";
const MSG_UNKNOWN_RESPONSE: &str = "Tipo de respuesta no reconocido";
const MSG_REGISTER_FAILED: &str = "Error al registrar el postulante";
const MSG_DOWNLOAD_FAILED: &str = "Error al descargar el PDF";
const MSG_REGISTERED: &str = "Registro exitoso. Descargando comprobante...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerKind {
    Success,
    Error,
    Info,
}

/// Transient message shown above the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub kind: BannerKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Not registered yet; the form moved to the registration step.
    Eligible,
    AlreadyRegistered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub document: ConfirmationDocument,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("action not available on the {0} step")]
    WrongStep(Step),
    #[error("another registry request is still in flight")]
    Busy,
    #[error("{} field(s) failed validation", .0.len())]
    Validation(ValidationReport),
    #[error("'{value}' is not a valid option for {field}")]
    UnknownOption { field: Field, value: String },
    #[error("unknown requirement '{0}'")]
    UnknownRequirement(String),
    #[error("registry declined the request: {0}")]
    Rejected(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("confirmation download failed: {0}")]
    DocumentDownload(#[source] GatewayError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl RegistrationError {
    /// Banner text for the applicant.
    pub fn user_message(&self) -> String {
        match self {
            RegistrationError::Validation(_) => MSG_FIX_ERRORS.to_string(),
            RegistrationError::Rejected(message) => message.clone(),
            RegistrationError::Gateway(GatewayError::Transport(_)) => MSG_CONNECTION.to_string(),
            RegistrationError::Gateway(GatewayError::UnexpectedResponse(_)) => {
                MSG_UNKNOWN_RESPONSE.to_string()
            }
            RegistrationError::Gateway(_) => MSG_SERVER_RESPONSE.to_string(),
            RegistrationError::DocumentDownload(_) => MSG_DOWNLOAD_FAILED.to_string(),
            other => other.to_string(),
        }
    }
}

/// Marks the session busy for the lifetime of one registry call.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, RegistrationError> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(RegistrationError::Busy);
        }
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Form controller: owns the session state, validates every edit, persists
/// each change and drives the verification and submission calls.
pub struct RegistrationSequencer<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    validator: Validator,
    reset_delay: Duration,
    state: SessionSnapshot,
    errors: ValidationReport,
    touched: BTreeSet<FieldKey>,
    banner: Option<Banner>,
    busy: Arc<AtomicBool>,
    reset_pending: bool,
}

impl<S, G> RegistrationSequencer<S, G>
where
    S: SessionStore,
    G: RegistryGateway,
{
    /// Start from the stored session if there is one, otherwise from an
    /// empty form. Unreadable storage is logged and ignored.
    pub fn restore(store: Arc<S>, gateway: Arc<G>, config: &FormConfig) -> Self {
        let validator = Validator::new(config.revision);
        let state = match store.load() {
            Ok(Some(snapshot)) => {
                info!(step = %snapshot.step, "restored registration session");
                snapshot
            }
            Ok(None) => SessionSnapshot::default(),
            Err(err) => {
                warn!(error = %err, "discarding unreadable registration session");
                SessionSnapshot::default()
            }
        };

        let mut errors = ValidationReport::default();
        let restored = state.applicant.restored_slots();
        if !restored.is_empty() {
            warn!(
                slots = ?restored.iter().map(|slot| slot.key()).collect::<Vec<_>>(),
                "stored session kept file descriptors only; files must be attached again"
            );
        }
        for slot in restored {
            errors.record(validator.check_attachment(slot, state.applicant.attachment(slot)));
        }

        Self {
            store,
            gateway,
            validator,
            reset_delay: config.reset_delay,
            state,
            errors,
            touched: BTreeSet::new(),
            banner: None,
            busy: Arc::new(AtomicBool::new(false)),
            reset_pending: false,
        }
    }

    pub fn step(&self) -> Step {
        self.state.step
    }

    pub fn verification(&self) -> &VerificationRecord {
        &self.state.verification
    }

    pub fn applicant(&self) -> &ApplicantRecord {
        &self.state.applicant
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.state
    }

    pub fn errors(&self) -> &ValidationReport {
        &self.errors
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn is_touched(&self, key: impl Into<FieldKey>) -> bool {
        self.touched.contains(&key.into())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Shared flag a UI can watch to disable its submit control.
    pub fn busy_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.busy)
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    pub fn reset_delay(&self) -> Duration {
        self.reset_delay
    }

    /// Apply one edit: normalize, store, validate and persist.
    ///
    /// The value is stored even when it fails validation; the returned
    /// error is the inline message for the field.
    pub fn edit(&mut self, field: Field, raw: &str) -> Result<Option<FieldError>, RegistrationError> {
        let expected = if field.is_verification() {
            Step::Verification
        } else {
            Step::Registration
        };
        self.require_step(expected)?;

        let value = normalize(field, raw);
        self.assign(field, &value)?;
        self.apply_dependents(field);

        let key = FieldKey::Field(field);
        self.touched.insert(key);
        let outcome = self.validator.check(field, &self.field_text(field));
        self.errors.clear(key);
        self.errors.record(outcome.clone());
        debug!(field = field.key(), valid = outcome.is_ok(), "field edited");

        self.persist();
        Ok(outcome.err())
    }

    pub fn set_requirement(&mut self, key: &str, value: bool) -> Result<(), RegistrationError> {
        self.require_step(Step::Registration)?;
        let flag = self
            .state
            .applicant
            .requirements
            .flag_mut(key)
            .ok_or_else(|| RegistrationError::UnknownRequirement(key.to_string()))?;
        *flag = value;
        self.persist();
        Ok(())
    }

    /// Attach a freshly picked file, or clear the slot with `None`.
    pub fn attach(
        &mut self,
        slot: AttachmentSlot,
        file: Option<FileHandle>,
    ) -> Result<Option<FieldError>, RegistrationError> {
        self.require_step(Step::Registration)?;
        match file {
            Some(file) => {
                debug!(slot = slot.key(), size = file.bytes.len(), "file attached");
                self.state
                    .applicant
                    .attachments
                    .insert(slot, Attachment::Live(file));
            }
            None => {
                self.state.applicant.attachments.remove(&slot);
            }
        }

        let key = FieldKey::Attachment(slot);
        self.touched.insert(key);
        let outcome = self
            .validator
            .check_attachment(slot, self.state.applicant.attachment(slot));
        self.errors.clear(key);
        self.errors.record(outcome.clone());

        self.persist();
        Ok(outcome.err())
    }

    /// Ask the registry whether the applicant already exists.
    ///
    /// Only a "not registered" answer moves the form to the registration
    /// step; every other answer leaves it on verification with a banner.
    pub async fn verify(&mut self) -> Result<VerificationOutcome, RegistrationError> {
        self.require_step(Step::Verification)?;
        let _in_flight = InFlight::acquire(&self.busy)?;

        let report = self.validator.check_verification(&self.state.verification);
        if !report.is_valid() {
            let first = report
                .iter()
                .next()
                .map(|(_, message)| message.to_string())
                .unwrap_or_else(|| MSG_FIX_ERRORS.to_string());
            self.errors.merge(report.clone());
            self.show(BannerKind::Error, first);
            return Err(RegistrationError::Validation(report));
        }

        let reply = self.gateway.check_exists(&self.state.verification).await;
        match reply {
            Ok(ExistenceReply {
                success: true,
                exists: true,
            }) => {
                info!("applicant already registered");
                self.show(BannerKind::Error, MSG_ALREADY_REGISTERED);
                Ok(VerificationOutcome::AlreadyRegistered)
            }
            Ok(ExistenceReply {
                success: true,
                exists: false,
            }) => {
                info!("applicant not registered; opening registration form");
                self.state.step = Step::Registration;
                self.show(BannerKind::Success, MSG_ELIGIBLE);
                self.persist();
                Ok(VerificationOutcome::Eligible)
            }
            Ok(ExistenceReply { success: false, .. }) => {
                warn!("registry could not verify the applicant");
                self.show(BannerKind::Error, MSG_VERIFY_FAILED);
                Err(RegistrationError::Rejected(MSG_VERIFY_FAILED.to_string()))
            }
            Err(err) => {
                warn!(error = %err, "existence check failed");
                let text = match err {
                    GatewayError::Transport(_) => MSG_CONNECTION,
                    _ => MSG_VERIFY_FAILED,
                };
                self.show(BannerKind::Error, text);
                Err(err.into())
            }
        }
    }

    /// Validate everything, post the registration and fetch the receipt.
    ///
    /// Nothing is sent while any field fails validation. On success the
    /// stored session is cleared right away and the in-memory form is
    /// scheduled for reset; call [`Self::settle`] once the receipt has been
    /// handed to the applicant.
    pub async fn submit(&mut self) -> Result<SubmissionReceipt, RegistrationError> {
        self.require_step(Step::Registration)?;
        let _in_flight = InFlight::acquire(&self.busy)?;

        let mut report = self.validator.check_verification(&self.state.verification);
        report.merge(self.validator.check_applicant(&self.state.applicant));
        if !report.is_valid() {
            warn!(invalid_fields = report.len(), "submission blocked by validation");
            self.errors = report.clone();
            self.show(BannerKind::Error, MSG_FIX_ERRORS);
            return Err(RegistrationError::Validation(report));
        }

        let request = SubmissionRequest::build(&self.state.verification, &self.state.applicant)?;
        match self.transmit(&request).await {
            Ok(bytes) => {
                let document =
                    ConfirmationDocument::for_applicant(&self.state.verification.national_id, bytes);
                info!(
                    document = %document.file_name,
                    size = document.bytes.len(),
                    "registration accepted"
                );
                self.show(BannerKind::Success, MSG_REGISTERED);
                self.reset_pending = true;
                if let Err(err) = self.store.clear() {
                    warn!(error = %err, "failed to clear stored session after submission");
                }
                Ok(SubmissionReceipt { document })
            }
            Err(err) => {
                warn!(error = %err, "registration failed");
                self.show(BannerKind::Error, err.user_message());
                Err(err)
            }
        }
    }

    async fn transmit(&self, request: &SubmissionRequest) -> Result<Vec<u8>, RegistrationError> {
        match self.gateway.submit(request).await? {
            SubmissionResponse::Document(bytes) => Ok(bytes),
            SubmissionResponse::DocumentLink(link) => self
                .gateway
                .download(&link)
                .await
                .map_err(RegistrationError::DocumentDownload),
            SubmissionResponse::Rejected { message } => Err(RegistrationError::Rejected(
                message
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| MSG_REGISTER_FAILED.to_string()),
            )),
        }
    }

    /// After a successful submission, wait out the reset delay and clear the
    /// form for the next applicant. Returns whether a reset happened.
    pub async fn settle(&mut self) -> bool {
        if !self.reset_pending {
            return false;
        }
        tokio::time::sleep(self.reset_delay).await;
        self.clear_form();
        info!("form reset for the next applicant");
        true
    }

    /// Leave the registration form. The identity stays so it can be
    /// verified again; applicant data is discarded.
    pub fn cancel(&mut self) {
        self.state.step = Step::Verification;
        self.state.applicant = ApplicantRecord::default();
        self.errors = ValidationReport::default();
        self.touched.clear();
        self.reset_pending = false;
        info!("registration cancelled");
        self.persist();
    }

    /// Start over for a different applicant, wiping durable storage.
    pub fn new_registration(&mut self) -> Result<(), SessionStoreError> {
        self.clear_form();
        self.banner = None;
        info!("starting a new registration");
        self.store.clear()
    }

    fn clear_form(&mut self) {
        self.state = SessionSnapshot::default();
        self.errors = ValidationReport::default();
        self.touched.clear();
        self.reset_pending = false;
    }

    fn require_step(&self, expected: Step) -> Result<(), RegistrationError> {
        if self.state.step == expected {
            Ok(())
        } else {
            Err(RegistrationError::WrongStep(self.state.step))
        }
    }

    fn show(&mut self, kind: BannerKind, text: impl Into<String>) {
        self.banner = Some(Banner {
            kind,
            text: text.into(),
        });
    }

    fn persist(&self) {
        // A submitted session must not come back on the next start.
        if self.reset_pending {
            return;
        }
        if let Err(err) = self.store.save(&self.state) {
            warn!(error = %err, "failed to persist registration session");
        }
    }

    fn field_text(&self, field: Field) -> String {
        let verification = &self.state.verification;
        match field {
            Field::NationalId => verification.national_id.clone(),
            Field::Suffix => verification.suffix.clone(),
            Field::IssuingRegion => verification
                .issuing_region
                .map(|region| region.code().to_string())
                .unwrap_or_default(),
            other => self.state.applicant.text(other),
        }
    }

    fn assign(&mut self, field: Field, value: &str) -> Result<(), RegistrationError> {
        let unknown = || RegistrationError::UnknownOption {
            field,
            value: value.to_string(),
        };
        let verification = &mut self.state.verification;
        let applicant = &mut self.state.applicant;
        match field {
            Field::NationalId => verification.national_id = value.to_string(),
            Field::Suffix => verification.suffix = value.to_string(),
            Field::IssuingRegion => {
                verification.issuing_region = parse_option(value, IssuingRegion::from_code)
                    .map_err(|_| unknown())?;
            }
            Field::FirstName => applicant.first_name = value.to_string(),
            Field::PaternalSurname => applicant.paternal_surname = value.to_string(),
            Field::MaternalSurname => applicant.maternal_surname = value.to_string(),
            Field::BirthDate => applicant.birth_date = value.trim().to_string(),
            Field::Education => {
                applicant.education =
                    parse_option(value, EducationLevel::parse).map_err(|_| unknown())?;
            }
            Field::Career => applicant.career = value.to_string(),
            Field::City => applicant.city = value.to_string(),
            Field::Zone => applicant.zone = value.to_string(),
            Field::Street => applicant.street = value.to_string(),
            Field::HouseNumber => applicant.house_number = value.to_string(),
            Field::Email => applicant.email = value.to_string(),
            Field::Mobile => applicant.mobile = value.to_string(),
            Field::PhoneBrand => applicant.phone_brand = value.to_string(),
            Field::PhoneModel => applicant.phone_model = value.to_string(),
            Field::Postulation => {
                applicant.postulation =
                    parse_option(value, PostulationType::parse).map_err(|_| unknown())?;
            }
            Field::FacilityCode => applicant.facility_code = value.to_string(),
            Field::FacilityName => applicant.facility_name = value.to_string(),
            Field::FacilityMunicipality => applicant.facility_municipality = value.to_string(),
            Field::LivesNearFacility => {
                applicant.lives_near_facility = parse_flag(value).ok_or_else(unknown)?;
            }
            Field::Experience => {
                applicant.experience =
                    parse_option(value, ExperienceAnswer::parse).map_err(|_| unknown())?;
            }
            Field::ProcessCount => {
                applicant.process_count = parse_option(value, |raw| {
                    raw.parse::<u8>()
                        .ok()
                        .filter(|count| (1..=MAX_PROCESS_COUNT).contains(count))
                })
                .map_err(|_| unknown())?;
            }
        }
        Ok(())
    }

    fn apply_dependents(&mut self, field: Field) {
        let applicant = &mut self.state.applicant;
        match field {
            Field::Experience if applicant.experience != Some(ExperienceAnswer::Yes) => {
                applicant.process_count = None;
                self.errors.clear(Field::ProcessCount);
            }
            Field::Education
                if !applicant
                    .education
                    .is_some_and(EducationLevel::allows_career) =>
            {
                applicant.career.clear();
            }
            _ => {}
        }
    }
}

/// Empty input clears a select; anything else must parse.
fn parse_option<T>(raw: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Option<T>, ()> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    parse(raw).map(Some).ok_or(())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "si" | "sí" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
