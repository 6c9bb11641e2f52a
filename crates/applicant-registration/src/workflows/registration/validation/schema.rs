use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::domain::AttachmentSlot;

const MIB: u64 = 1024 * 1024;

/// Latest birth date that still makes the applicant of age on election day.
/// Shared by every revision.
pub const ELIGIBILITY_CUTOFF: NaiveDate = match NaiveDate::from_ymd_opt(2005, 8, 17) {
    Some(date) => date,
    None => panic!("eligibility cutoff is not a calendar date"),
};

/// Version of the form schema.
///
/// Revisions of the form shipped with different attachment ceilings and
/// required-file lists; each one is kept as its own schema instead of being
/// merged into a single rule set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaRevision {
    /// 3 MB ceiling; only the identity card and the curriculum are required.
    Legacy,
    /// 1 MB ceiling; all four attachments are required.
    #[default]
    Current,
}

impl SchemaRevision {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "legacy" | "v1" => Some(SchemaRevision::Legacy),
            "current" | "v2" => Some(SchemaRevision::Current),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SchemaRevision::Legacy => "legacy",
            SchemaRevision::Current => "current",
        }
    }

    pub const fn max_attachment_megabytes(self) -> u64 {
        match self {
            SchemaRevision::Legacy => 3,
            SchemaRevision::Current => 1,
        }
    }

    pub const fn max_attachment_bytes(self) -> u64 {
        self.max_attachment_megabytes() * MIB
    }

    pub const fn requires(self, slot: AttachmentSlot) -> bool {
        match self {
            SchemaRevision::Legacy => matches!(
                slot,
                AttachmentSlot::IdentityDocument | AttachmentSlot::Curriculum
            ),
            SchemaRevision::Current => true,
        }
    }
}
