//! Undo records for optimistic mutations.
//!
//! Every optimistic change to the notes collection is captured as a
//! [`Transaction`] before it is applied. The session commits it when the
//! server confirms, or rolls it back when the request fails.

use crate::model::{Note, NoteId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Undo {
    /// A placeholder was prepended; rolling back removes it.
    Insert { id: NoteId },
    /// A note was edited in place; rolling back restores `before`.
    Replace { before: Note },
    /// A note was removed from `index`; rolling back puts it back.
    Remove { note: Note, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: NoteId,
    pub generation: u64,
    pub undo: Undo,
}

impl Transaction {
    pub fn new(id: NoteId, generation: u64, undo: Undo) -> Self {
        Transaction {
            id,
            generation,
            undo,
        }
    }

    pub fn rollback(&self, notes: &mut Vec<Note>) {
        match &self.undo {
            Undo::Insert { id } => notes.retain(|n| &n.id != id),
            Undo::Replace { before } => {
                if let Some(slot) = notes.iter_mut().find(|n| n.id == before.id) {
                    *slot = before.clone();
                }
            }
            Undo::Remove { note, index } => {
                if !notes.iter().any(|n| n.id == note.id) {
                    let at = (*index).min(notes.len());
                    notes.insert(at, note.clone());
                }
            }
        }
    }
}

/// Per-note operation counters. A response is stale when the generation it
/// was issued under is no longer the note's current one.
#[derive(Debug, Default)]
pub struct Generations(HashMap<NoteId, u64>);

impl Generations {
    pub fn bump(&mut self, id: &str) -> u64 {
        let entry = self.0.entry(id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn current(&self, id: &str) -> u64 {
        self.0.get(id).copied().unwrap_or(0)
    }

    pub fn is_current(&self, txn: &Transaction) -> bool {
        self.current(&txn.id) == txn.generation
    }

    pub fn forget(&mut self, id: &str) {
        self.0.remove(id);
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
