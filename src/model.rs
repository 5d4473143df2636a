use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub type NoteId = String;

pub const UNTITLED: &str = "Untitled";
const TEMP_ID_PREFIX: &str = "tmp-";

static TEMP_ID_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

/// Payload for `POST /notes`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

/// Payload for `PUT /notes/{id}`. Absent fields are left untouched.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<String>,
}

impl Note {
    pub fn new(id: NoteId, title: String, content: String) -> Self {
        Note {
            id,
            title,
            content,
            updated_at: Utc::now(),
        }
    }

    /// Builds the optimistic stand-in shown while a create is in flight.
    pub fn optimistic(draft: &NoteDraft) -> Self {
        Note::new(temp_id(), draft.title.clone(), draft.content.clone())
    }

    pub fn apply(&mut self, patch: &NotePatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        self.updated_at = Utc::now();
    }
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        NoteDraft {
            title: normalize_title(&title.into()),
            content: content.into(),
        }
    }
}

impl NotePatch {
    pub fn new(title: Option<String>, content: Option<String>) -> Self {
        NotePatch {
            title: title.map(|t| normalize_title(&t)),
            content,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Blank titles are stored as "Untitled".
pub fn normalize_title(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn temp_id() -> NoteId {
    let seq = TEMP_ID_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}{}-{}", TEMP_ID_PREFIX, seq, random_suffix(6))
}

pub fn random_id() -> NoteId {
    random_suffix(10)
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_titles_become_untitled() {
        assert_eq!(NoteDraft::new("   ", "body").title, UNTITLED);
        assert_eq!(NoteDraft::new(" Groceries ", "").title, "Groceries");
        assert_eq!(NotePatch::new(Some(String::new()), None).title.as_deref(), Some(UNTITLED));
    }

    #[test]
    fn temp_ids_are_unique() {
        let a = temp_id();
        let b = temp_id();
        assert_ne!(a, b);
        assert_ne!(random_id(), random_id());
    }

    #[test]
    fn note_serializes_with_camel_case_timestamp() {
        let note = Note::new("n1".into(), "Title".into(), "Body".into());
        let json = serde_json::to_value(&note).expect("serialize note");
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("updated_at").is_none());

        let parsed: Note = serde_json::from_str(
            r#"{"id":"abc","title":"T","content":"C","updatedAt":"2024-03-01T10:00:00Z"}"#,
        )
        .expect("parse note");
        assert_eq!(parsed.id, "abc");
        assert_eq!(parsed.updated_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn patch_omits_absent_fields() {
        let patch = NotePatch::new(None, Some("new body".into()));
        let json = serde_json::to_string(&patch).expect("serialize patch");
        assert_eq!(json, r#"{"content":"new body"}"#);
    }

    #[test]
    fn apply_merges_only_present_fields() {
        let mut note = Note::new("n1".into(), "Old".into(), "Keep".into());
        let before = note.updated_at;
        note.apply(&NotePatch::new(Some("New".into()), None));
        assert_eq!(note.title, "New");
        assert_eq!(note.content, "Keep");
        assert!(note.updated_at >= before);
    }
}
