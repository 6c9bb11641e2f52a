use chrono::NaiveDate;

use super::super::domain::{
    Attachment, AttachmentKind, AttachmentSlot, EducationLevel, ExperienceAnswer, Field,
    IssuingRegion, PostulationType, MAX_PROCESS_COUNT,
};
use super::schema::{SchemaRevision, ELIGIBILITY_CUTOFF};

pub(crate) const REQUIRED: &str = "Este campo es requerido";
pub(crate) const REATTACH: &str =
    "Vuelva a adjuntar el archivo: los archivos no se conservan entre sesiones";

const IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/jpg"];
const DOCUMENT_TYPE: &str = "application/pdf";

pub(crate) const DEVICE_FIELD_MAX: usize = 30;
pub(crate) const FACILITY_FIELD_MAX: usize = 250;

type RuleResult = Result<(), String>;

fn fail(message: &str) -> RuleResult {
    Err(message.to_string())
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphabetic()
        || c.is_whitespace()
        || matches!(
            c,
            'Á' | 'É' | 'Í' | 'Ó' | 'Ú' | 'á' | 'é' | 'í' | 'ó' | 'ú' | 'ñ' | 'Ñ'
        )
}

pub(crate) fn is_address_char(c: char) -> bool {
    is_name_char(c) || c.is_ascii_digit()
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Single-field rule table. Cross-field checks live in the validator.
pub(crate) fn check_field(field: Field, value: &str) -> RuleResult {
    match field {
        Field::NationalId => national_id(value),
        Field::Suffix => suffix(value),
        Field::IssuingRegion => {
            if is_blank(value) {
                fail("La expedición es requerida")
            } else if IssuingRegion::from_code(value).is_none() {
                fail("Expedición inválida")
            } else {
                Ok(())
            }
        }
        Field::FirstName => {
            if is_blank(value) {
                fail("El nombre es requerido")
            } else {
                letters_only(value)
            }
        }
        Field::PaternalSurname | Field::MaternalSurname => {
            if value.is_empty() {
                Ok(())
            } else {
                letters_only(value)
            }
        }
        Field::BirthDate => birth_date(value, ELIGIBILITY_CUTOFF),
        Field::Education => {
            if is_blank(value) {
                fail("El grado de instrucción es requerido")
            } else if EducationLevel::parse(value).is_none() {
                fail("Grado de instrucción inválido")
            } else {
                Ok(())
            }
        }
        Field::Career => Ok(()),
        Field::City | Field::Zone | Field::Street => address(value),
        Field::HouseNumber => house_number(value),
        Field::Email => email(value),
        Field::Mobile => mobile(value),
        Field::PhoneBrand | Field::PhoneModel => {
            if value.chars().count() > DEVICE_FIELD_MAX {
                Err(format!("Máximo {DEVICE_FIELD_MAX} caracteres"))
            } else {
                Ok(())
            }
        }
        Field::Postulation => {
            if is_blank(value) {
                fail(REQUIRED)
            } else if PostulationType::parse(value).is_none() {
                fail("Tipo de postulación inválido")
            } else {
                Ok(())
            }
        }
        Field::FacilityCode => facility_code(value),
        Field::FacilityName | Field::FacilityMunicipality => {
            if is_blank(value) {
                fail(REQUIRED)
            } else if value.chars().count() > FACILITY_FIELD_MAX {
                Err(format!("Máximo {FACILITY_FIELD_MAX} caracteres"))
            } else {
                Ok(())
            }
        }
        Field::LivesNearFacility => match value.trim() {
            "true" | "false" => Ok(()),
            _ => fail("Seleccione Sí o No"),
        },
        Field::Experience => {
            if is_blank(value) {
                fail(REQUIRED)
            } else if ExperienceAnswer::parse(value).is_none() {
                fail("Seleccione SÍ o NO")
            } else {
                Ok(())
            }
        }
        Field::ProcessCount => process_count(value),
    }
}

fn national_id(value: &str) -> RuleResult {
    if value.is_empty() {
        return fail("La cédula de identidad es requerida");
    }
    let digits = value.chars().all(|c| c.is_ascii_digit());
    if !digits || !(4..=9).contains(&value.len()) {
        return fail("La cédula debe tener entre 4 y 9 dígitos");
    }
    Ok(())
}

fn suffix(value: &str) -> RuleResult {
    if value.is_empty() {
        return Ok(());
    }
    let well_formed = value.chars().count() <= 2
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if well_formed {
        Ok(())
    } else {
        fail("El complemento admite hasta 2 letras o dígitos")
    }
}

fn letters_only(value: &str) -> RuleResult {
    if value.chars().all(is_name_char) {
        Ok(())
    } else {
        fail("Solo se permiten letras")
    }
}

fn birth_date(value: &str, cutoff: NaiveDate) -> RuleResult {
    if is_blank(value) {
        return fail("La fecha de nacimiento es requerida");
    }
    let Ok(date) = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") else {
        return fail("Fecha inválida (AAAA-MM-DD)");
    };
    if date > cutoff {
        return fail("Debe ser mayor de edad");
    }
    Ok(())
}

fn address(value: &str) -> RuleResult {
    if is_blank(value) {
        return fail(REQUIRED);
    }
    // Only a value made entirely of symbols is rejected.
    if value.chars().all(|c| !is_address_char(c)) {
        return fail("No se permiten símbolos.");
    }
    Ok(())
}

fn house_number(value: &str) -> RuleResult {
    if value.is_empty() {
        return fail("El número de domicilio es requerido");
    }
    let well_formed = (1..=5).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if well_formed {
        Ok(())
    } else {
        fail("Solo letras mayúsculas, números y espacios (máximo 5 caracteres)")
    }
}

/// Accepts any text containing `local@domain.tld` with no whitespace inside.
fn email(value: &str) -> RuleResult {
    if value.is_empty() {
        return fail("El email es requerido");
    }
    if value.split_whitespace().any(looks_like_address) {
        Ok(())
    } else {
        fail("Formato de email inválido")
    }
}

fn looks_like_address(token: &str) -> bool {
    let chars: Vec<char> = token.chars().collect();
    let Some(at) = chars.iter().skip(1).position(|c| *c == '@').map(|index| index + 1) else {
        return false;
    };
    chars
        .iter()
        .enumerate()
        .any(|(index, c)| *c == '.' && index > at + 1 && index + 1 < chars.len())
}

fn mobile(value: &str) -> RuleResult {
    if value.is_empty() {
        return fail("El celular es requerido");
    }
    let well_formed = value.len() == 8
        && value.chars().all(|c| c.is_ascii_digit())
        && matches!(value.as_bytes()[0], b'6' | b'7');
    if well_formed {
        Ok(())
    } else {
        fail("Formato inválido (debe comenzar con 6 o 7 y tener 8 dígitos)")
    }
}

/// `D-DDDD-DDDDD`
fn facility_code(value: &str) -> RuleResult {
    if value.is_empty() {
        return fail("El ID del recinto es requerido");
    }
    let segments: Vec<&str> = value.split('-').collect();
    let well_formed = segments.len() == 3
        && segments
            .iter()
            .zip([1usize, 4, 5])
            .all(|(segment, width)| {
                segment.len() == width && segment.chars().all(|c| c.is_ascii_digit())
            });
    if well_formed {
        Ok(())
    } else {
        fail("Formato inválido (X-XXXX-XXXXX)")
    }
}

fn process_count(value: &str) -> RuleResult {
    if value.is_empty() {
        return Ok(());
    }
    match value.trim().parse::<u8>() {
        Ok(count) if (1..=MAX_PROCESS_COUNT).contains(&count) => Ok(()),
        _ => fail("Seleccione el número de procesos"),
    }
}

pub(crate) fn check_attachment(
    slot: AttachmentSlot,
    attachment: Option<&Attachment>,
    revision: SchemaRevision,
) -> RuleResult {
    let file = match attachment {
        None if revision.requires(slot) => return fail("Este archivo es requerido"),
        None => return Ok(()),
        Some(Attachment::Restored(_)) => return fail(REATTACH),
        Some(Attachment::Live(file)) => file,
    };

    if file.bytes.len() as u64 > revision.max_attachment_bytes() {
        return Err(format!(
            "El archivo no debe superar {}MB",
            revision.max_attachment_megabytes()
        ));
    }

    let mime_type = file.mime_type.trim().to_ascii_lowercase();
    match slot.kind() {
        AttachmentKind::Document if mime_type != DOCUMENT_TYPE => {
            fail("Formato no permitido. Solo se acepta archivo PDF")
        }
        AttachmentKind::Screenshot if !IMAGE_TYPES.contains(&mime_type.as_str()) => {
            fail("Formato no permitido. Solo se aceptan archivos JPG, JPEG o PNG")
        }
        _ => Ok(()),
    }
}
