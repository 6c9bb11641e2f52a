use applicant_registration::error::AppError;
use applicant_registration::workflows::registration::{AttachmentSlot, Field, FileHandle};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn parse_field(raw: &str) -> Result<Field, String> {
    Field::from_key(raw).ok_or_else(|| {
        let known: Vec<&str> = Field::VERIFICATION
            .into_iter()
            .chain(Field::APPLICANT)
            .map(Field::key)
            .collect();
        format!("unknown field '{raw}' (expected one of: {})", known.join(", "))
    })
}

pub(crate) fn parse_slot(raw: &str) -> Result<AttachmentSlot, String> {
    AttachmentSlot::from_key(raw).ok_or_else(|| {
        let known: Vec<&str> = AttachmentSlot::ALL.into_iter().map(AttachmentSlot::key).collect();
        format!("unknown attachment '{raw}' (expected one of: {})", known.join(", "))
    })
}

/// `SLOT=PATH`
pub(crate) fn parse_attachment(raw: &str) -> Result<(AttachmentSlot, PathBuf), String> {
    let (slot, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=PATH, got '{raw}'"))?;
    if path.trim().is_empty() {
        return Err(format!("missing path for attachment '{slot}'"));
    }
    Ok((parse_slot(slot)?, PathBuf::from(path.trim())))
}

pub(crate) fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "si" | "sí" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected true or false, got '{raw}'")),
    }
}

/// Read a file from disk the way a browser file picker would hand it over.
pub(crate) fn load_file(path: &Path) -> Result<FileHandle, AppError> {
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Usage(format!("'{}' is not a file path", path.display())))?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let last_modified = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    let mut file = FileHandle::new(name, mime_type, bytes);
    file.last_modified = last_modified;
    Ok(file)
}
