use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Screen the applicant is currently on. The flow cycles between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Verification,
    Registration,
}

impl Step {
    pub const fn label(self) -> &'static str {
        match self {
            Step::Verification => "verification",
            Step::Registration => "registration",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Department that issued the national identity card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssuingRegion {
    #[serde(rename = "LP")]
    LaPaz,
    #[serde(rename = "CB")]
    Cochabamba,
    #[serde(rename = "SC")]
    SantaCruz,
    #[serde(rename = "OR")]
    Oruro,
    #[serde(rename = "PT")]
    Potosi,
    #[serde(rename = "TJ")]
    Tarija,
    #[serde(rename = "CH")]
    Chuquisaca,
    #[serde(rename = "BN")]
    Beni,
    #[serde(rename = "PD")]
    Pando,
}

impl IssuingRegion {
    pub const ALL: [IssuingRegion; 9] = [
        IssuingRegion::LaPaz,
        IssuingRegion::Cochabamba,
        IssuingRegion::SantaCruz,
        IssuingRegion::Oruro,
        IssuingRegion::Potosi,
        IssuingRegion::Tarija,
        IssuingRegion::Chuquisaca,
        IssuingRegion::Beni,
        IssuingRegion::Pando,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            IssuingRegion::LaPaz => "LP",
            IssuingRegion::Cochabamba => "CB",
            IssuingRegion::SantaCruz => "SC",
            IssuingRegion::Oruro => "OR",
            IssuingRegion::Potosi => "PT",
            IssuingRegion::Tarija => "TJ",
            IssuingRegion::Chuquisaca => "CH",
            IssuingRegion::Beni => "BN",
            IssuingRegion::Pando => "PD",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            IssuingRegion::LaPaz => "La Paz",
            IssuingRegion::Cochabamba => "Cochabamba",
            IssuingRegion::SantaCruz => "Santa Cruz",
            IssuingRegion::Oruro => "Oruro",
            IssuingRegion::Potosi => "Potosí",
            IssuingRegion::Tarija => "Tarija",
            IssuingRegion::Chuquisaca => "Chuquisaca",
            IssuingRegion::Beni => "Beni",
            IssuingRegion::Pando => "Pando",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|region| region.code().eq_ignore_ascii_case(code))
    }
}

/// Identity used by the existence check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationRecord {
    #[serde(rename = "cedula_identidad")]
    pub national_id: String,
    #[serde(rename = "complemento")]
    pub suffix: String,
    #[serde(rename = "expedicion")]
    pub issuing_region: Option<IssuingRegion>,
}

/// Highest completed education level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EducationLevel {
    #[serde(rename = "BACHILLER")]
    Bachiller,
    #[serde(rename = "TECNICO MEDIO")]
    TecnicoMedio,
    #[serde(rename = "TECNICO SUPERIOR")]
    TecnicoSuperior,
    #[serde(rename = "UNIVERSITARIO")]
    Universitario,
    #[serde(rename = "LICENCIATURA")]
    Licenciatura,
}

impl EducationLevel {
    pub const ALL: [EducationLevel; 5] = [
        EducationLevel::Bachiller,
        EducationLevel::TecnicoMedio,
        EducationLevel::TecnicoSuperior,
        EducationLevel::Universitario,
        EducationLevel::Licenciatura,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EducationLevel::Bachiller => "BACHILLER",
            EducationLevel::TecnicoMedio => "TECNICO MEDIO",
            EducationLevel::TecnicoSuperior => "TECNICO SUPERIOR",
            EducationLevel::Universitario => "UNIVERSITARIO",
            EducationLevel::Licenciatura => "LICENCIATURA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(raw))
    }

    /// A career only makes sense past secondary school.
    pub const fn allows_career(self) -> bool {
        !matches!(self, EducationLevel::Bachiller)
    }
}

/// Position the applicant is applying for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostulationType {
    #[serde(rename = "OPERADOR DE TRANSMISION SIREPRE URBANO")]
    UrbanOperator,
    #[serde(rename = "OPERADOR DE TRANSMISION SIREPRE PROVINCIA")]
    ProvincialOperator,
}

impl PostulationType {
    pub const ALL: [PostulationType; 2] = [
        PostulationType::UrbanOperator,
        PostulationType::ProvincialOperator,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            PostulationType::UrbanOperator => "OPERADOR DE TRANSMISION SIREPRE URBANO",
            PostulationType::ProvincialOperator => "OPERADOR DE TRANSMISION SIREPRE PROVINCIA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw.to_ascii_uppercase().as_str() {
            "URBANO" => return Some(PostulationType::UrbanOperator),
            "PROVINCIA" => return Some(PostulationType::ProvincialOperator),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
    }
}

/// Yes/no answer for prior electoral experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceAnswer {
    #[serde(rename = "SI")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

impl ExperienceAnswer {
    pub const fn as_str(self) -> &'static str {
        match self {
            ExperienceAnswer::Yes => "SI",
            ExperienceAnswer::No => "NO",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "SI" | "SÍ" => Some(ExperienceAnswer::Yes),
            "NO" => Some(ExperienceAnswer::No),
            _ => None,
        }
    }
}

/// Upper bound of the process count select; 10 stands for "10 or more".
pub const MAX_PROCESS_COUNT: u8 = 10;

/// Self-declared eligibility checkboxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    pub es_boliviano: bool,
    pub registrado_padron_electoral: bool,
    pub cedula_identidad_vigente: bool,
    pub disponibilidad_tiempo_completo: bool,
    pub celular_con_camara: bool,
    #[serde(rename = "android8_2OSuperior")]
    pub android_8_2_o_superior: bool,
    pub linea_entel: bool,
    pub ninguna_militancia_politica: bool,
    pub sin_conflictos_institucion: bool,
    pub cuenta_con_power_bank: bool,
}

impl Requirements {
    pub const KEYS: [&'static str; 10] = [
        "esBoliviano",
        "registradoPadronElectoral",
        "cedulaIdentidadVigente",
        "disponibilidadTiempoCompleto",
        "celularConCamara",
        "android8_2OSuperior",
        "lineaEntel",
        "ningunaMilitanciaPolitica",
        "sinConflictosInstitucion",
        "cuentaConPowerBank",
    ];

    pub fn flag_mut(&mut self, key: &str) -> Option<&mut bool> {
        let flag = match key {
            "esBoliviano" => &mut self.es_boliviano,
            "registradoPadronElectoral" => &mut self.registrado_padron_electoral,
            "cedulaIdentidadVigente" => &mut self.cedula_identidad_vigente,
            "disponibilidadTiempoCompleto" => &mut self.disponibilidad_tiempo_completo,
            "celularConCamara" => &mut self.celular_con_camara,
            "android8_2OSuperior" => &mut self.android_8_2_o_superior,
            "lineaEntel" => &mut self.linea_entel,
            "ningunaMilitanciaPolitica" => &mut self.ninguna_militancia_politica,
            "sinConflictosInstitucion" => &mut self.sin_conflictos_institucion,
            "cuentaConPowerBank" => &mut self.cuenta_con_power_bank,
            _ => return None,
        };
        Some(flag)
    }

    pub fn entries(&self) -> [(&'static str, bool); 10] {
        [
            ("esBoliviano", self.es_boliviano),
            ("registradoPadronElectoral", self.registrado_padron_electoral),
            ("cedulaIdentidadVigente", self.cedula_identidad_vigente),
            (
                "disponibilidadTiempoCompleto",
                self.disponibilidad_tiempo_completo,
            ),
            ("celularConCamara", self.celular_con_camara),
            ("android8_2OSuperior", self.android_8_2_o_superior),
            ("lineaEntel", self.linea_entel),
            ("ningunaMilitanciaPolitica", self.ninguna_militancia_politica),
            ("sinConflictosInstitucion", self.sin_conflictos_institucion),
            ("cuentaConPowerBank", self.cuenta_con_power_bank),
        ]
    }
}

/// What the registry accepts in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Document,
    Screenshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttachmentSlot {
    #[serde(rename = "archivo_ci")]
    IdentityDocument,
    #[serde(rename = "archivo_no_militancia")]
    NonAffiliationCapture,
    #[serde(rename = "curriculum")]
    Curriculum,
    #[serde(rename = "capturaPantalla")]
    DeviceCapture,
}

impl AttachmentSlot {
    pub const ALL: [AttachmentSlot; 4] = [
        AttachmentSlot::IdentityDocument,
        AttachmentSlot::NonAffiliationCapture,
        AttachmentSlot::Curriculum,
        AttachmentSlot::DeviceCapture,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            AttachmentSlot::IdentityDocument => "archivo_ci",
            AttachmentSlot::NonAffiliationCapture => "archivo_no_militancia",
            AttachmentSlot::Curriculum => "curriculum",
            AttachmentSlot::DeviceCapture => "capturaPantalla",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.key() == key.trim())
    }

    pub const fn kind(self) -> AttachmentKind {
        match self {
            AttachmentSlot::IdentityDocument | AttachmentSlot::Curriculum => {
                AttachmentKind::Document
            }
            AttachmentSlot::NonAffiliationCapture | AttachmentSlot::DeviceCapture => {
                AttachmentKind::Screenshot
            }
        }
    }
}

impl fmt::Display for AttachmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A file picked in this session, content included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
            last_modified: None,
        }
    }

    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            name: self.name.clone(),
            size: self.bytes.len() as u64,
            mime_type: self.mime_type.clone(),
            last_modified: self.last_modified,
        }
    }
}

/// Metadata that survives durable storage. Carries no file content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// An attached file.
///
/// Durable storage cannot hold binary content, so an attachment always
/// serializes as its [`FileDescriptor`] and always deserializes as
/// [`Attachment::Restored`]. A restored attachment never passes validation:
/// the applicant has to pick the file again before submitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "FileDescriptor", from = "FileDescriptor")]
pub enum Attachment {
    Live(FileHandle),
    Restored(FileDescriptor),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Live(file) => &file.name,
            Attachment::Restored(descriptor) => &descriptor.name,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            Attachment::Live(file) => &file.mime_type,
            Attachment::Restored(descriptor) => &descriptor.mime_type,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Attachment::Live(file) => file.bytes.len() as u64,
            Attachment::Restored(descriptor) => descriptor.size,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Attachment::Live(_))
    }

    pub fn descriptor(&self) -> FileDescriptor {
        match self {
            Attachment::Live(file) => file.descriptor(),
            Attachment::Restored(descriptor) => descriptor.clone(),
        }
    }
}

impl From<Attachment> for FileDescriptor {
    fn from(value: Attachment) -> Self {
        match value {
            Attachment::Live(file) => file.descriptor(),
            Attachment::Restored(descriptor) => descriptor,
        }
    }
}

impl From<FileDescriptor> for Attachment {
    fn from(value: FileDescriptor) -> Self {
        Attachment::Restored(value)
    }
}

/// Everything the applicant fills in on the registration step.
///
/// Free-text fields keep exactly what was typed (after normalization) so that
/// validation can report on it; select fields are typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicantRecord {
    #[serde(rename = "nombre")]
    pub first_name: String,
    #[serde(rename = "apellidoPaterno")]
    pub paternal_surname: String,
    #[serde(rename = "apellidoMaterno")]
    pub maternal_surname: String,
    #[serde(rename = "fechaNacimiento")]
    pub birth_date: String,
    #[serde(rename = "gradoInstruccion")]
    pub education: Option<EducationLevel>,
    #[serde(rename = "carrera")]
    pub career: String,
    #[serde(rename = "ciudad")]
    pub city: String,
    #[serde(rename = "zona")]
    pub zone: String,
    #[serde(rename = "calleAvenida")]
    pub street: String,
    #[serde(rename = "numeroDomicilio")]
    pub house_number: String,
    pub email: String,
    #[serde(rename = "celular")]
    pub mobile: String,
    #[serde(rename = "marcaCelular")]
    pub phone_brand: String,
    #[serde(rename = "modeloCelular")]
    pub phone_model: String,
    #[serde(rename = "tipoPostulacion")]
    pub postulation: Option<PostulationType>,
    #[serde(rename = "idRecinto")]
    pub facility_code: String,
    #[serde(rename = "nombreRecinto")]
    pub facility_name: String,
    #[serde(rename = "municipioRecinto")]
    pub facility_municipality: String,
    #[serde(rename = "viveCercaRecinto")]
    pub lives_near_facility: bool,
    #[serde(rename = "experienciaEspecifica")]
    pub experience: Option<ExperienceAnswer>,
    #[serde(rename = "nroDeProcesos")]
    pub process_count: Option<u8>,
    #[serde(rename = "requisitos")]
    pub requirements: Requirements,
    #[serde(rename = "archivos")]
    pub attachments: BTreeMap<AttachmentSlot, Attachment>,
}

impl ApplicantRecord {
    /// Processes counted towards general experience; zero without specific experience.
    pub fn general_experience(&self) -> u8 {
        match self.experience {
            Some(ExperienceAnswer::Yes) => self
                .process_count
                .map(|count| count.min(MAX_PROCESS_COUNT))
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn attachment(&self, slot: AttachmentSlot) -> Option<&Attachment> {
        self.attachments.get(&slot)
    }

    /// Slots holding descriptors restored from storage rather than files.
    pub fn restored_slots(&self) -> Vec<AttachmentSlot> {
        self.attachments
            .iter()
            .filter(|(_, attachment)| !attachment.is_live())
            .map(|(slot, _)| *slot)
            .collect()
    }

    /// Text representation of a field as entered in the form.
    pub fn text(&self, field: Field) -> String {
        match field {
            Field::FirstName => self.first_name.clone(),
            Field::PaternalSurname => self.paternal_surname.clone(),
            Field::MaternalSurname => self.maternal_surname.clone(),
            Field::BirthDate => self.birth_date.clone(),
            Field::Education => self
                .education
                .map(|level| level.as_str().to_string())
                .unwrap_or_default(),
            Field::Career => self.career.clone(),
            Field::City => self.city.clone(),
            Field::Zone => self.zone.clone(),
            Field::Street => self.street.clone(),
            Field::HouseNumber => self.house_number.clone(),
            Field::Email => self.email.clone(),
            Field::Mobile => self.mobile.clone(),
            Field::PhoneBrand => self.phone_brand.clone(),
            Field::PhoneModel => self.phone_model.clone(),
            Field::Postulation => self
                .postulation
                .map(|kind| kind.as_str().to_string())
                .unwrap_or_default(),
            Field::FacilityCode => self.facility_code.clone(),
            Field::FacilityName => self.facility_name.clone(),
            Field::FacilityMunicipality => self.facility_municipality.clone(),
            Field::LivesNearFacility => self.lives_near_facility.to_string(),
            Field::Experience => self
                .experience
                .map(|answer| answer.as_str().to_string())
                .unwrap_or_default(),
            Field::ProcessCount => self
                .process_count
                .map(|count| count.to_string())
                .unwrap_or_default(),
            Field::NationalId | Field::Suffix | Field::IssuingRegion => String::new(),
        }
    }
}

/// Every editable scalar field, keyed by its wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    NationalId,
    Suffix,
    IssuingRegion,
    FirstName,
    PaternalSurname,
    MaternalSurname,
    BirthDate,
    Education,
    Career,
    City,
    Zone,
    Street,
    HouseNumber,
    Email,
    Mobile,
    PhoneBrand,
    PhoneModel,
    Postulation,
    FacilityCode,
    FacilityName,
    FacilityMunicipality,
    LivesNearFacility,
    Experience,
    ProcessCount,
}

impl Field {
    pub const VERIFICATION: [Field; 3] = [Field::NationalId, Field::Suffix, Field::IssuingRegion];

    pub const APPLICANT: [Field; 21] = [
        Field::FirstName,
        Field::PaternalSurname,
        Field::MaternalSurname,
        Field::BirthDate,
        Field::Education,
        Field::Career,
        Field::City,
        Field::Zone,
        Field::Street,
        Field::HouseNumber,
        Field::Email,
        Field::Mobile,
        Field::PhoneBrand,
        Field::PhoneModel,
        Field::Postulation,
        Field::FacilityCode,
        Field::FacilityName,
        Field::FacilityMunicipality,
        Field::LivesNearFacility,
        Field::Experience,
        Field::ProcessCount,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Field::NationalId => "cedula_identidad",
            Field::Suffix => "complemento",
            Field::IssuingRegion => "expedicion",
            Field::FirstName => "nombre",
            Field::PaternalSurname => "apellidoPaterno",
            Field::MaternalSurname => "apellidoMaterno",
            Field::BirthDate => "fechaNacimiento",
            Field::Education => "gradoInstruccion",
            Field::Career => "carrera",
            Field::City => "ciudad",
            Field::Zone => "zona",
            Field::Street => "calleAvenida",
            Field::HouseNumber => "numeroDomicilio",
            Field::Email => "email",
            Field::Mobile => "celular",
            Field::PhoneBrand => "marcaCelular",
            Field::PhoneModel => "modeloCelular",
            Field::Postulation => "tipoPostulacion",
            Field::FacilityCode => "idRecinto",
            Field::FacilityName => "nombreRecinto",
            Field::FacilityMunicipality => "municipioRecinto",
            Field::LivesNearFacility => "viveCercaRecinto",
            Field::Experience => "experienciaEspecifica",
            Field::ProcessCount => "nroDeProcesos",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::VERIFICATION
            .into_iter()
            .chain(Self::APPLICANT)
            .find(|field| field.key() == key)
    }

    pub const fn is_verification(self) -> bool {
        matches!(
            self,
            Field::NationalId | Field::Suffix | Field::IssuingRegion
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
