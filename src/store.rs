use crate::api::{ApiResult, NotesApi};
use crate::model::Note;
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Error,
    Success,
}

/// Notes collection plus the outcome of the last load.
#[derive(Debug)]
pub struct NotesStore {
    notes: Vec<Note>,
    status: LoadStatus,
    error: String,
    refresh_seq: u64,
}

impl NotesStore {
    pub fn new() -> Self {
        NotesStore {
            notes: Vec::new(),
            status: LoadStatus::Idle,
            error: String::new(),
            refresh_seq: 0,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub(crate) fn notes_mut(&mut self) -> &mut Vec<Note> {
        &mut self.notes
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.notes.iter().position(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    /// Marks a load as started and returns its sequence number.
    pub fn begin_refresh(&mut self) -> u64 {
        self.refresh_seq += 1;
        self.status = LoadStatus::Loading;
        self.refresh_seq
    }

    /// Applies the result of load `seq`. Results of superseded loads are
    /// dropped and `false` is returned. On failure the previous notes stay.
    pub fn finish_refresh(&mut self, seq: u64, result: ApiResult<Vec<Note>>) -> bool {
        if seq != self.refresh_seq {
            info!("event=refresh_stale seq={} latest={}", seq, self.refresh_seq);
            return false;
        }
        match result {
            Ok(notes) => {
                self.notes = dedupe(notes);
                self.status = LoadStatus::Success;
                self.error.clear();
                info!("event=refresh status=ok count={}", self.notes.len());
            }
            Err(err) => {
                self.status = LoadStatus::Error;
                self.error = err.to_string();
                warn!("event=refresh status=error error={}", err);
            }
        }
        true
    }

    /// Loads synchronously.
    pub fn refresh(&mut self, api: &mut dyn NotesApi) -> bool {
        let seq = self.begin_refresh();
        let result = api.list();
        self.finish_refresh(seq, result)
    }
}

impl Default for NotesStore {
    fn default() -> Self {
        Self::new()
    }
}

fn dedupe(notes: Vec<Note>) -> Vec<Note> {
    let mut out: Vec<Note> = Vec::with_capacity(notes.len());
    for note in notes {
        if !out.iter().any(|n| n.id == note.id) {
            out.push(note);
        }
    }
    out
}
