//! Optimistic-update orchestration and the editor mode machine.
//!
//! The session never performs I/O. Every handler mutates local state first
//! and returns the [`Request`] the caller must send to a [`NotesApi`]; the
//! caller feeds the matching [`Response`] back through [`Session::apply`],
//! which commits or rolls back the optimistic change and may return
//! follow-up requests.
//!
//! # Invariants
//! - Note ids in the collection are unique.
//! - `Viewing` and `Editing` always have an active note that exists in the
//!   collection; `Creating` and `Empty` have none.
//! - A response only rolls back or overwrites a note when it was issued
//!   under that note's current generation.
//!
//! [`NotesApi`]: crate::api::NotesApi

use crate::api::ApiResult;
use crate::model::{Note, NoteDraft, NoteId, NotePatch};
use crate::store::{LoadStatus, NotesStore};
use crate::txn::{Generations, Transaction, Undo};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet, VecDeque};

pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Empty,
    Viewing,
    Editing,
    Creating,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Empty => "empty",
            Mode::Viewing => "viewing",
            Mode::Editing => "editing",
            Mode::Creating => "creating",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    List,
    Create(NoteDraft),
    Update(NoteId, NotePatch),
    Delete(NoteId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub ticket: Ticket,
    pub call: ApiCall,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listed(ApiResult<Vec<Note>>),
    Created(ApiResult<Note>),
    Updated(ApiResult<Note>),
    Deleted(ApiResult<bool>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub ticket: Ticket,
    pub outcome: Outcome,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no note selected")]
    NoActiveNote,
    #[error("note not found: {0}")]
    UnknownNote(NoteId),
    #[error("note {0} is still being saved")]
    NotSaved(NoteId),
    #[error("cannot {action} while {mode}")]
    WrongMode { action: &'static str, mode: &'static str },
    #[error("a save is already in progress")]
    SaveInFlight,
}

#[derive(Debug)]
enum Pending {
    Refresh { seq: u64 },
    Create { txn: Transaction, title: String },
    Update { txn: Transaction, patch: NotePatch },
    Delete { txn: Transaction, snapshot: Vec<NoteId> },
    /// Server-side delete of a note that was discarded before its create
    /// came back.
    Cleanup { id: NoteId },
}

impl Pending {
    fn touches(&self, id: &str) -> bool {
        match self {
            Pending::Refresh { .. } => false,
            Pending::Create { txn, .. }
            | Pending::Update { txn, .. }
            | Pending::Delete { txn, .. } => txn.id == id,
            Pending::Cleanup { id: target } => target == id,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    store: NotesStore,
    active_id: Option<NoteId>,
    mode: Mode,
    alerts: VecDeque<String>,
    pending: BTreeMap<Ticket, Pending>,
    generations: Generations,
    discarded: HashSet<NoteId>,
    saving: Option<Ticket>,
    next_ticket: Ticket,
}

impl Session {
    pub fn new() -> Self {
        Session {
            store: NotesStore::new(),
            active_id: None,
            mode: Mode::Empty,
            alerts: VecDeque::new(),
            pending: BTreeMap::new(),
            generations: Generations::default(),
            discarded: HashSet::new(),
            saving: None,
            next_ticket: 1,
        }
    }

    pub fn notes(&self) -> &[Note] {
        self.store.notes()
    }

    pub fn store(&self) -> &NotesStore {
        &self.store
    }

    pub fn status(&self) -> LoadStatus {
        self.store.status()
    }

    pub fn error(&self) -> &str {
        self.store.error()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_note(&self) -> Option<&Note> {
        self.active_id.as_deref().and_then(|id| self.store.get(id))
    }

    pub fn alert(&self) -> Option<&str> {
        self.alerts.front().map(String::as_str)
    }

    pub fn dismiss_alert(&mut self) -> Option<String> {
        self.alerts.pop_front()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.is_some()
    }

    /// True while `id` is a local placeholder whose create has not been
    /// answered yet.
    pub fn is_optimistic(&self, id: &str) -> bool {
        self.is_pending_create(id)
    }

    pub fn tracked_generations(&self) -> usize {
        self.generations.len()
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn has_unique_ids(&self) -> bool {
        let mut seen = HashSet::new();
        self.store.notes().iter().all(|n| seen.insert(n.id.as_str()))
    }

    /// Starts a canonical reload of the collection.
    pub fn refresh(&mut self) -> Request {
        let seq = self.store.begin_refresh();
        self.issue(Pending::Refresh { seq }, ApiCall::List)
    }

    pub fn select(&mut self, id: &str) -> bool {
        if !self.store.contains(id) {
            return false;
        }
        self.active_id = Some(id.to_string());
        self.mode = Mode::Viewing;
        true
    }

    pub fn open_create(&mut self) {
        self.active_id = None;
        self.mode = Mode::Creating;
    }

    pub fn open_edit(&mut self) -> Result<(), SessionError> {
        if self.mode != Mode::Viewing {
            return Err(SessionError::WrongMode {
                action: "edit",
                mode: self.mode.label(),
            });
        }
        let note = self.active_note().ok_or(SessionError::NoActiveNote)?;
        if self.is_optimistic(&note.id) {
            return Err(SessionError::NotSaved(note.id.clone()));
        }
        self.mode = Mode::Editing;
        Ok(())
    }

    pub fn cancel(&mut self) {
        if !matches!(self.mode, Mode::Editing | Mode::Creating) {
            return;
        }
        self.saving = None;
        self.mode = if self.active_note().is_some() {
            Mode::Viewing
        } else {
            Mode::Empty
        };
        self.reconcile();
    }

    /// Saves the creation form: prepends an optimistic note and selects it.
    pub fn save_new(&mut self, draft: NoteDraft) -> Result<Request, SessionError> {
        if self.mode != Mode::Creating {
            return Err(SessionError::WrongMode {
                action: "create",
                mode: self.mode.label(),
            });
        }
        Ok(self.create(draft))
    }

    /// Optimistic create regardless of mode.
    pub fn create(&mut self, draft: NoteDraft) -> Request {
        let note = Note::optimistic(&draft);
        let temp_id = note.id.clone();
        let generation = self.generations.bump(&temp_id);
        self.store.notes_mut().insert(0, note);
        self.active_id = Some(temp_id.clone());
        self.mode = Mode::Viewing;
        info!("event=create_begin temp_id={}", temp_id);
        let txn = Transaction::new(temp_id.clone(), generation, Undo::Insert { id: temp_id });
        let title = draft.title.clone();
        let request = self.issue(Pending::Create { txn, title }, ApiCall::Create(draft));
        self.reconcile();
        request
    }

    /// Saves the edit form into the active note.
    pub fn save_edit(&mut self, patch: NotePatch) -> Result<Request, SessionError> {
        if self.mode != Mode::Editing {
            return Err(SessionError::WrongMode {
                action: "save",
                mode: self.mode.label(),
            });
        }
        if self.saving.is_some() {
            return Err(SessionError::SaveInFlight);
        }
        let id = self.active_id.clone().ok_or(SessionError::NoActiveNote)?;
        let request = self.update(&id, patch)?;
        self.saving = Some(request.ticket);
        Ok(request)
    }

    /// Optimistic update of any persisted note.
    pub fn update(&mut self, id: &str, patch: NotePatch) -> Result<Request, SessionError> {
        let idx = self
            .store
            .position(id)
            .ok_or_else(|| SessionError::UnknownNote(id.to_string()))?;
        let before = self.store.notes()[idx].clone();
        if self.is_optimistic(id) {
            return Err(SessionError::NotSaved(id.to_string()));
        }
        self.store.notes_mut()[idx].apply(&patch);
        let generation = self.generations.bump(id);
        info!("event=update_begin id={} generation={}", id, generation);
        let txn = Transaction::new(id.to_string(), generation, Undo::Replace { before });
        Ok(self.issue(
            Pending::Update {
                txn,
                patch: patch.clone(),
            },
            ApiCall::Update(id.to_string(), patch),
        ))
    }

    /// Removes a note optimistically. Confirmation is the caller's job.
    ///
    /// Returns `None` when there is nothing to send: the id is unknown, or
    /// the note is an optimistic placeholder whose create is still pending
    /// (the server copy is deleted once that create returns).
    pub fn delete(&mut self, id: &str) -> Option<Request> {
        let index = self.store.position(id)?;
        let optimistic = self.is_optimistic(id);
        let snapshot: Vec<NoteId> = self.store.notes().iter().map(|n| n.id.clone()).collect();
        let note = self.store.notes_mut().remove(index);
        if self.mode != Mode::Creating {
            self.active_id = None;
            self.mode = Mode::Empty;
        }
        let generation = self.generations.bump(id);
        let request = if optimistic {
            info!("event=delete_discard temp_id={}", id);
            self.discarded.insert(id.to_string());
            None
        } else {
            info!("event=delete_begin id={} generation={}", id, generation);
            let txn = Transaction::new(id.to_string(), generation, Undo::Remove { note, index });
            Some(self.issue(
                Pending::Delete { txn, snapshot },
                ApiCall::Delete(id.to_string()),
            ))
        };
        self.reconcile();
        request
    }

    /// Reconciles a response with local state and returns follow-up
    /// requests. Unknown tickets are ignored.
    pub fn apply(&mut self, response: Response) -> Vec<Request> {
        let Some(pending) = self.pending.remove(&response.ticket) else {
            warn!("event=response_unknown ticket={}", response.ticket);
            return Vec::new();
        };
        if self.saving == Some(response.ticket) {
            self.saving = None;
        }
        let follow_ups = match (pending, response.outcome) {
            (Pending::Refresh { seq }, Outcome::Listed(result)) => {
                let rebased = result.map(|notes| self.rebase(notes));
                if self.store.finish_refresh(seq, rebased) {
                    self.prune_generations();
                }
                Vec::new()
            }
            (Pending::Create { txn, title }, Outcome::Created(result)) => {
                self.finish_create(txn, &title, result)
            }
            (Pending::Update { txn, .. }, Outcome::Updated(result)) => {
                self.finish_update(response.ticket, txn, result)
            }
            (Pending::Delete { txn, snapshot }, Outcome::Deleted(result)) => {
                self.finish_delete(txn, snapshot, result)
            }
            (Pending::Cleanup { id }, Outcome::Deleted(result)) => {
                match result {
                    Ok(_) => info!("event=cleanup_delete status=ok id={}", id),
                    Err(err) => warn!("event=cleanup_delete status=error id={} error={}", id, err),
                }
                Vec::new()
            }
            (pending, outcome) => {
                warn!(
                    "event=response_mismatch ticket={} pending={:?} outcome={:?}",
                    response.ticket, pending, outcome
                );
                Vec::new()
            }
        };
        self.reconcile();
        follow_ups
    }

    fn finish_create(
        &mut self,
        txn: Transaction,
        title: &str,
        result: ApiResult<Note>,
    ) -> Vec<Request> {
        let temp_id = txn.id.clone();
        self.generations.forget(&temp_id);
        let discarded = self.discarded.remove(&temp_id);
        match result {
            Ok(created) if discarded => {
                info!("event=create_commit status=discarded id={}", created.id);
                vec![self.issue(
                    Pending::Cleanup {
                        id: created.id.clone(),
                    },
                    ApiCall::Delete(created.id),
                )]
            }
            Ok(created) => {
                info!(
                    "event=create_commit status=ok temp_id={} id={}",
                    temp_id, created.id
                );
                let notes = self.store.notes_mut();
                notes.retain(|n| n.id != created.id);
                match notes.iter().position(|n| n.id == temp_id) {
                    Some(idx) => notes[idx] = created.clone(),
                    None => notes.insert(0, created.clone()),
                }
                if self.active_id.as_deref() == Some(temp_id.as_str()) {
                    self.active_id = Some(created.id);
                }
                Vec::new()
            }
            Err(err) if discarded => {
                info!("event=create_rollback status=discarded temp_id={} error={}", temp_id, err);
                Vec::new()
            }
            Err(err) => {
                warn!("event=create_rollback temp_id={} error={}", temp_id, err);
                txn.rollback(self.store.notes_mut());
                self.alerts
                    .push_back(format!("Could not create \"{}\": {}", title, err));
                Vec::new()
            }
        }
    }

    fn finish_update(
        &mut self,
        ticket: Ticket,
        txn: Transaction,
        result: ApiResult<Note>,
    ) -> Vec<Request> {
        let current = self.generations.is_current(&txn);
        match result {
            Ok(updated) => {
                if !current {
                    info!("event=update_commit status=stale id={}", txn.id);
                    return vec![self.refresh()];
                }
                info!("event=update_commit status=ok id={}", txn.id);
                if let Some(slot) = self.store.notes_mut().iter_mut().find(|n| n.id == txn.id) {
                    *slot = updated;
                }
                if self.mode == Mode::Editing
                    && self.active_id.as_deref() == Some(txn.id.as_str())
                    && !self.has_pending_update(&txn.id, ticket)
                {
                    self.mode = Mode::Viewing;
                }
                vec![self.refresh()]
            }
            Err(err) => {
                if current {
                    warn!("event=update_rollback id={} error={}", txn.id, err);
                    txn.rollback(self.store.notes_mut());
                } else {
                    warn!("event=update_failed status=stale id={} error={}", txn.id, err);
                }
                self.alerts.push_back(format!("Could not save note: {}", err));
                vec![self.refresh()]
            }
        }
    }

    fn finish_delete(
        &mut self,
        txn: Transaction,
        snapshot: Vec<NoteId>,
        result: ApiResult<bool>,
    ) -> Vec<Request> {
        match result {
            Ok(_) => {
                info!("event=delete_commit status=ok id={}", txn.id);
                self.generations.forget(&txn.id);
                if matches!(self.mode, Mode::Empty | Mode::Viewing) {
                    let next = snapshot
                        .iter()
                        .filter(|id| **id != txn.id)
                        .find(|id| self.store.contains(id))
                        .cloned();
                    if let Some(next) = next {
                        self.active_id = Some(next);
                        self.mode = Mode::Viewing;
                    }
                }
                Vec::new()
            }
            Err(err) => {
                warn!("event=delete_rollback id={} error={}", txn.id, err);
                if self.generations.is_current(&txn) {
                    txn.rollback(self.store.notes_mut());
                }
                self.alerts
                    .push_back(format!("Could not delete note: {}", err));
                vec![self.refresh()]
            }
        }
    }

    fn has_pending_update(&self, id: &str, except: Ticket) -> bool {
        self.pending.iter().any(|(ticket, p)| {
            *ticket != except && matches!(p, Pending::Update { txn, .. } if txn.id == id)
        })
    }

    /// Lays in-flight optimistic work over a fresh server listing so a
    /// reload does not undo it: pending deletes stay removed, pending
    /// updates are re-applied, and placeholders of pending creates stay on
    /// top.
    fn rebase(&self, mut server: Vec<Note>) -> Vec<Note> {
        for pending in self.pending.values() {
            match pending {
                Pending::Delete { txn, .. } => server.retain(|n| n.id != txn.id),
                Pending::Cleanup { id } => server.retain(|n| &n.id != id),
                Pending::Update { txn, patch } => {
                    if let Some(note) = server.iter_mut().find(|n| n.id == txn.id) {
                        note.apply(patch);
                    }
                }
                Pending::Create { .. } | Pending::Refresh { .. } => {}
            }
        }
        let placeholders: Vec<Note> = self
            .store
            .notes()
            .iter()
            .filter(|n| self.is_pending_create(&n.id))
            .cloned()
            .collect();
        let mut notes = placeholders;
        notes.extend(server);
        notes
    }

    fn is_pending_create(&self, temp_id: &str) -> bool {
        self.pending
            .values()
            .any(|p| matches!(p, Pending::Create { txn, .. } if txn.id == temp_id))
    }

    /// Drops counters of ids that left the collection and have no request
    /// in flight.
    fn prune_generations(&mut self) {
        let store = &self.store;
        let pending = &self.pending;
        self.generations.retain(|id| {
            store.contains(id) || pending.values().any(|p| p.touches(id))
        });
    }

    /// Keeps selection and mode consistent with the collection.
    fn reconcile(&mut self) {
        if let Some(id) = &self.active_id {
            if !self.store.contains(id) {
                self.active_id = None;
            }
        }
        if self.store.is_empty() {
            self.active_id = None;
            if self.mode != Mode::Creating {
                self.mode = Mode::Empty;
            }
        } else if self.active_id.is_none() && self.mode != Mode::Creating {
            self.active_id = self.store.notes().first().map(|n| n.id.clone());
            self.mode = Mode::Viewing;
        }
        debug_assert!(self.has_unique_ids(), "duplicate note ids in session");
    }

    fn issue(&mut self, pending: Pending, call: ApiCall) -> Request {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.insert(ticket, pending);
        Request { ticket, call }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
