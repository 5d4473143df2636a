use super::{ApiError, ApiResult, NotesApi};
use crate::model::{normalize_title, random_id, Note, NoteDraft, NotePatch};
use std::thread;
use std::time::Duration;

pub const DEMO_NOTE_ID: &str = "welcome";
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(250);

/// Volatile stand-in for the notes backend.
///
/// Lives as long as the client that owns it; nothing is written to disk.
/// Every operation sleeps for `latency` first so the UI behaves as it
/// would against a real server.
#[derive(Debug, Clone)]
pub struct FallbackStore {
    notes: Vec<Note>,
    latency: Duration,
}

impl FallbackStore {
    pub fn new() -> Self {
        Self::with_latency(DEFAULT_LATENCY)
    }

    pub fn with_latency(latency: Duration) -> Self {
        FallbackStore {
            notes: vec![demo_note()],
            latency,
        }
    }

    pub fn empty(latency: Duration) -> Self {
        FallbackStore {
            notes: Vec::new(),
            latency,
        }
    }

    /// Drops every change made in this session and reseeds the demo note.
    pub fn reset(&mut self) {
        self.notes = vec![demo_note()];
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
    }

    fn position(&self, id: &str) -> ApiResult<usize> {
        self.notes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }
}

impl Default for FallbackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotesApi for FallbackStore {
    fn list(&mut self) -> ApiResult<Vec<Note>> {
        self.simulate_latency();
        let mut notes = self.notes.clone();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(notes)
    }

    fn get(&mut self, id: &str) -> ApiResult<Note> {
        self.simulate_latency();
        let idx = self.position(id)?;
        Ok(self.notes[idx].clone())
    }

    fn create(&mut self, draft: &NoteDraft) -> ApiResult<Note> {
        self.simulate_latency();
        let mut id = random_id();
        while self.notes.iter().any(|n| n.id == id) {
            id = random_id();
        }
        let note = Note::new(id, normalize_title(&draft.title), draft.content.clone());
        self.notes.insert(0, note.clone());
        Ok(note)
    }

    fn update(&mut self, id: &str, patch: &NotePatch) -> ApiResult<Note> {
        self.simulate_latency();
        let idx = self.position(id)?;
        let mut normalized = patch.clone();
        normalized.title = patch.title.as_deref().map(normalize_title);
        self.notes[idx].apply(&normalized);
        Ok(self.notes[idx].clone())
    }

    fn delete(&mut self, id: &str) -> ApiResult<bool> {
        self.simulate_latency();
        let idx = self.position(id)?;
        self.notes.remove(idx);
        Ok(true)
    }
}

fn demo_note() -> Note {
    Note::new(
        DEMO_NOTE_ID.to_string(),
        "Welcome to jotter".to_string(),
        "The notes backend is unreachable, so jotter is running on a local \
         scratch store. Changes made here disappear when the program exits."
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn store() -> FallbackStore {
        FallbackStore::with_latency(Duration::ZERO)
    }

    #[test]
    fn starts_with_demo_note() {
        let mut store = store();
        let notes = store.list().expect("list");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, DEMO_NOTE_ID);
    }

    #[test]
    fn list_is_sorted_by_updated_at_desc() {
        let mut store = FallbackStore::empty(Duration::ZERO);
        let old = store.create(&NoteDraft::new("old", "")).expect("create");
        let new = store.create(&NoteDraft::new("new", "")).expect("create");
        // Push the first note into the future so order flips.
        if let Some(note) = store.notes.iter_mut().find(|n| n.id == old.id) {
            note.updated_at = Utc::now() + ChronoDuration::hours(1);
        }
        let ids: Vec<_> = store.list().expect("list").into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![old.id, new.id]);
    }

    #[test]
    fn create_prepends_with_fresh_id() {
        let mut store = store();
        let created = store.create(&NoteDraft::new("A", "B")).expect("create");
        assert_ne!(created.id, DEMO_NOTE_ID);
        assert_eq!(store.notes[0].id, created.id);
        assert_eq!(created.title, "A");
        assert_eq!(created.content, "B");
    }

    #[test]
    fn create_with_blank_title_is_untitled() {
        let mut store = store();
        let draft = NoteDraft {
            title: "  ".into(),
            content: String::new(),
        };
        assert_eq!(store.create(&draft).expect("create").title, "Untitled");
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut store = store();
        assert_eq!(store.get("nope"), Err(ApiError::NotFound("nope".into())));
        assert_eq!(
            store.update("nope", &NotePatch::default()),
            Err(ApiError::NotFound("nope".into()))
        );
        assert_eq!(store.delete("nope"), Err(ApiError::NotFound("nope".into())));
    }

    #[test]
    fn update_merges_and_delete_removes() {
        let mut store = store();
        let updated = store
            .update(DEMO_NOTE_ID, &NotePatch::new(None, Some("changed".into())))
            .expect("update");
        assert_eq!(updated.title, "Welcome to jotter");
        assert_eq!(updated.content, "changed");
        assert!(store.delete(DEMO_NOTE_ID).expect("delete"));
        assert!(store.is_empty());
    }

    #[test]
    fn reset_restores_seed() {
        let mut store = store();
        store.create(&NoteDraft::new("x", "y")).expect("create");
        store.delete(DEMO_NOTE_ID).expect("delete");
        store.reset();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(DEMO_NOTE_ID).expect("get").id, DEMO_NOTE_ID);
    }
}
