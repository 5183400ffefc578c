use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobtrail_core::ResumeId;

use crate::application::LinkOutcome;

/// Parent entity of parse jobs: one uploaded resume file.
///
/// `parsed_ref` is the denormalized link to the structured extraction
/// produced by a successful parse, written only by the parse result
/// processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    pub id: ResumeId,
    pub original_name: String,
    pub file_path: String,
    pub uploaded_at: DateTime<Utc>,
    pub parsed_ref: Option<Uuid>,
    pub is_deleted: bool,
    pub updated_at: DateTime<Utc>,
}

impl Resume {
    pub fn new(original_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ResumeId::new(),
            original_name: original_name.into(),
            file_path: file_path.into(),
            uploaded_at: now,
            parsed_ref: None,
            is_deleted: false,
            updated_at: now,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.updated_at = Utc::now();
    }

    /// Write the parsed-data link.
    pub fn link_parsed(&mut self, parsed_ref: Uuid) -> LinkOutcome {
        if self.parsed_ref == Some(parsed_ref) {
            return LinkOutcome::AlreadyLinked;
        }
        self.parsed_ref = Some(parsed_ref);
        self.updated_at = Utc::now();
        LinkOutcome::Linked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_parsed_is_idempotent() {
        let mut resume = Resume::new("cv.pdf", "/uploads/cv.pdf");
        let parsed = Uuid::now_v7();

        assert_eq!(resume.link_parsed(parsed), LinkOutcome::Linked);
        assert_eq!(resume.link_parsed(parsed), LinkOutcome::AlreadyLinked);
        assert_eq!(resume.parsed_ref, Some(parsed));
    }
}
