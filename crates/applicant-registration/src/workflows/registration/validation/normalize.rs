use super::super::domain::Field;
use super::rules::{is_address_char, is_name_char, DEVICE_FIELD_MAX, FACILITY_FIELD_MAX};

/// Clean raw keystrokes the way the form inputs do before a value is stored.
///
/// Normalization never makes a value valid on its own; it only drops
/// characters the input would never accept and enforces length caps.
pub fn normalize(field: Field, raw: &str) -> String {
    match field {
        Field::NationalId => raw.chars().filter(char::is_ascii_digit).take(9).collect(),
        Field::Suffix => raw.to_uppercase().chars().take(2).collect(),
        Field::FirstName | Field::PaternalSurname | Field::MaternalSurname => {
            raw.chars().filter(|c| is_name_char(*c)).collect()
        }
        Field::City | Field::Zone | Field::Street => {
            raw.chars().filter(|c| is_address_char(*c)).collect()
        }
        Field::HouseNumber => raw
            .to_uppercase()
            .chars()
            .filter(|c| {
                c.is_ascii_uppercase() || c.is_ascii_digit() || c.is_whitespace() || "ÁÉÍÓÚÑ".contains(*c)
            })
            .take(5)
            .collect(),
        Field::Mobile => raw.chars().filter(char::is_ascii_digit).take(8).collect(),
        Field::FacilityCode => facility_code(raw),
        Field::PhoneBrand | Field::PhoneModel => raw.chars().take(DEVICE_FIELD_MAX).collect(),
        Field::FacilityName | Field::FacilityMunicipality => {
            raw.chars().take(FACILITY_FIELD_MAX).collect()
        }
        _ => raw.to_string(),
    }
}

/// Keep digits and dashes and insert the dashes of `D-DDDD-DDDDD` as the
/// applicant types.
fn facility_code(raw: &str) -> String {
    let mut value: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if value.len() > 1 && value.as_bytes()[1] != b'-' {
        value.insert(1, '-');
    }
    if value.len() > 6 && value.as_bytes()[6] != b'-' {
        value.insert(6, '-');
    }
    value.truncate(12);
    value
}
