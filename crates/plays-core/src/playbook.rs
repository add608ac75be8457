use crate::error::{PlaysError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Playbook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub content: String,
    pub created_by: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playbook {
    pub fn new(id: u64, draft: PlaybookDraft) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: draft.name,
            description: draft.description,
            content: draft.content,
            created_by: draft.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the editable fields, keeping identity and creation time.
    pub fn apply(&mut self, draft: PlaybookDraft) {
        self.name = draft.name;
        self.description = draft.description;
        self.content = draft.content;
        self.created_by = draft.created_by;
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// PlaybookDraft
// ---------------------------------------------------------------------------

/// Caller-supplied fields for creating or replacing a playbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    #[serde(default)]
    pub created_by: u64,
}

impl PlaybookDraft {
    pub fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PlaysError::InvalidPlaybook("name must not be empty".into()));
        }
        if self.content.trim().is_empty() {
            return Err(PlaysError::InvalidPlaybook(
                "content must not be empty".into(),
            ));
        }
        Ok(())
    }
}
