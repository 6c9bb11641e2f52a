use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::FormConfig;
use crate::workflows::registration::domain::{
    ApplicantRecord, Attachment, AttachmentSlot, EducationLevel, ExperienceAnswer, Field,
    FileHandle, IssuingRegion, PostulationType, Requirements, Step, VerificationRecord,
};
use crate::workflows::registration::gateway::{
    ExistenceReply, GatewayError, RegistryGateway, SubmissionResponse,
};
use crate::workflows::registration::payload::SubmissionRequest;
use crate::workflows::registration::sequencer::RegistrationSequencer;
use crate::workflows::registration::store::{MemorySessionStore, SessionSnapshot, SessionStore};
use crate::workflows::registration::validation::SchemaRevision;

pub(super) const MIB: usize = 1024 * 1024;

pub(super) fn verification() -> VerificationRecord {
    VerificationRecord {
        national_id: "1234567".to_string(),
        suffix: String::new(),
        issuing_region: Some(IssuingRegion::LaPaz),
    }
}

pub(super) fn pdf(name: &str, size: usize) -> FileHandle {
    FileHandle::new(name, "application/pdf", vec![b'%'; size])
}

pub(super) fn png(name: &str, size: usize) -> FileHandle {
    FileHandle::new(name, "image/png", vec![0x89; size])
}

pub(super) fn attachments() -> Vec<(AttachmentSlot, FileHandle)> {
    vec![
        (AttachmentSlot::IdentityDocument, pdf("ci.pdf", 2048)),
        (
            AttachmentSlot::NonAffiliationCapture,
            png("no_militancia.png", 4096),
        ),
        (AttachmentSlot::Curriculum, pdf("hoja_de_vida.pdf", 8192)),
        (AttachmentSlot::DeviceCapture, png("celular.png", 1024)),
    ]
}

pub(super) fn applicant() -> ApplicantRecord {
    ApplicantRecord {
        first_name: "María José".to_string(),
        paternal_surname: "Quispe".to_string(),
        maternal_surname: String::new(),
        birth_date: "1998-03-14".to_string(),
        education: Some(EducationLevel::Universitario),
        career: "Ingeniería de Sistemas".to_string(),
        city: "El Alto".to_string(),
        zone: "Villa Adela".to_string(),
        street: "Av Bolivia".to_string(),
        house_number: "12B".to_string(),
        email: "maria.quispe@example.bo".to_string(),
        mobile: "71234567".to_string(),
        phone_brand: "Samsung".to_string(),
        phone_model: "A14".to_string(),
        postulation: Some(PostulationType::UrbanOperator),
        facility_code: "1-2345-67890".to_string(),
        facility_name: "Unidad Educativa Bolivia".to_string(),
        facility_municipality: "El Alto".to_string(),
        lives_near_facility: true,
        experience: Some(ExperienceAnswer::Yes),
        process_count: Some(3),
        requirements: Requirements {
            es_boliviano: true,
            cedula_identidad_vigente: true,
            ..Requirements::default()
        },
        attachments: attachments()
            .into_iter()
            .map(|(slot, file)| (slot, Attachment::Live(file)))
            .collect(),
    }
}

/// Raw edits that fill the registration step with [`applicant`]'s values.
pub(super) fn applicant_edits() -> Vec<(Field, &'static str)> {
    vec![
        (Field::FirstName, "María José"),
        (Field::PaternalSurname, "Quispe"),
        (Field::BirthDate, "1998-03-14"),
        (Field::Education, "UNIVERSITARIO"),
        (Field::Career, "Ingeniería de Sistemas"),
        (Field::City, "El Alto"),
        (Field::Zone, "Villa Adela"),
        (Field::Street, "Av Bolivia"),
        (Field::HouseNumber, "12b"),
        (Field::Email, "maria.quispe@example.bo"),
        (Field::Mobile, "71234567"),
        (Field::PhoneBrand, "Samsung"),
        (Field::PhoneModel, "A14"),
        (Field::Postulation, "OPERADOR DE TRANSMISION SIREPRE URBANO"),
        (Field::FacilityCode, "1234567890"),
        (Field::FacilityName, "Unidad Educativa Bolivia"),
        (Field::FacilityMunicipality, "El Alto"),
        (Field::LivesNearFacility, "true"),
        (Field::Experience, "SI"),
        (Field::ProcessCount, "3"),
    ]
}

pub(super) fn form_config() -> FormConfig {
    FormConfig {
        revision: SchemaRevision::Current,
        reset_delay: Duration::from_secs(3),
    }
}

pub(super) type TestSequencer = RegistrationSequencer<MemorySessionStore, ScriptedGateway>;

pub(super) fn sequencer(
    gateway: ScriptedGateway,
) -> (TestSequencer, Arc<MemorySessionStore>, Arc<ScriptedGateway>) {
    let store = Arc::new(MemorySessionStore::default());
    let gateway = Arc::new(gateway);
    let sequencer = RegistrationSequencer::restore(store.clone(), gateway.clone(), &form_config());
    (sequencer, store, gateway)
}

/// Sequencer already past verification with the identity filled in.
pub(super) fn registration_sequencer(
    gateway: ScriptedGateway,
) -> (TestSequencer, Arc<MemorySessionStore>, Arc<ScriptedGateway>) {
    let store = Arc::new(MemorySessionStore::default());
    store
        .save(&SessionSnapshot {
            step: Step::Registration,
            verification: verification(),
            applicant: ApplicantRecord::default(),
        })
        .expect("memory store accepts snapshot");
    let gateway = Arc::new(gateway);
    let sequencer = RegistrationSequencer::restore(store.clone(), gateway.clone(), &form_config());
    (sequencer, store, gateway)
}

pub(super) fn fill_registration(sequencer: &mut TestSequencer) {
    for (field, value) in applicant_edits() {
        let outcome = sequencer.edit(field, value).expect("edit accepted");
        assert!(outcome.is_none(), "{field} rejected: {outcome:?}");
    }
    for (slot, file) in attachments() {
        let outcome = sequencer.attach(slot, Some(file)).expect("attach accepted");
        assert!(outcome.is_none(), "{slot} rejected: {outcome:?}");
    }
}

/// Gateway double replaying scripted replies and recording every call.
#[derive(Default)]
pub(super) struct ScriptedGateway {
    existence: Mutex<VecDeque<Result<ExistenceReply, GatewayError>>>,
    submissions: Mutex<VecDeque<Result<SubmissionResponse, GatewayError>>>,
    documents: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
    submitted: Mutex<Vec<SubmissionRequest>>,
}

impl ScriptedGateway {
    pub(super) fn with_existence(self, reply: Result<ExistenceReply, GatewayError>) -> Self {
        self.existence
            .lock()
            .expect("gateway mutex poisoned")
            .push_back(reply);
        self
    }

    pub(super) fn with_submission(self, reply: Result<SubmissionResponse, GatewayError>) -> Self {
        self.submissions
            .lock()
            .expect("gateway mutex poisoned")
            .push_back(reply);
        self
    }

    pub(super) fn with_document(self, link: &str, bytes: &[u8]) -> Self {
        self.documents
            .lock()
            .expect("gateway mutex poisoned")
            .insert(link.to_string(), bytes.to_vec());
        self
    }

    pub(super) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("gateway mutex poisoned").clone()
    }

    pub(super) fn submitted(&self) -> Vec<SubmissionRequest> {
        self.submitted.lock().expect("gateway mutex poisoned").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("gateway mutex poisoned").push(call);
    }
}

pub(super) fn not_registered() -> Result<ExistenceReply, GatewayError> {
    Ok(ExistenceReply {
        success: true,
        exists: false,
    })
}

impl RegistryGateway for ScriptedGateway {
    async fn check_exists(
        &self,
        verification: &VerificationRecord,
    ) -> Result<ExistenceReply, GatewayError> {
        self.record(format!("exists:{}", verification.national_id));
        let next = self
            .existence
            .lock()
            .expect("gateway mutex poisoned")
            .pop_front();
        next.unwrap_or_else(|| Err(GatewayError::Transport("no scripted reply".to_string())))
    }

    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResponse, GatewayError> {
        self.record("submit".to_string());
        self.submitted
            .lock()
            .expect("gateway mutex poisoned")
            .push(request.clone());
        let next = self
            .submissions
            .lock()
            .expect("gateway mutex poisoned")
            .pop_front();
        next.unwrap_or_else(|| Err(GatewayError::Transport("no scripted reply".to_string())))
    }

    async fn download(&self, link: &str) -> Result<Vec<u8>, GatewayError> {
        self.record(format!("download:{link}"));
        let document = self
            .documents
            .lock()
            .expect("gateway mutex poisoned")
            .get(link)
            .cloned();
        document.ok_or(GatewayError::Status(404))
    }
}
