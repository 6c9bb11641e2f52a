use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Registration receipt returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ConfirmationDocument {
    pub fn for_applicant(national_id: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: format!("comprobante_{national_id}.pdf"),
            bytes,
        }
    }

    /// Write the document into `dir`, creating it if needed. An earlier
    /// receipt with the same name is overwritten.
    pub fn save_in(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}
