//! Notes API: the `NotesApi` contract and its implementations.
//!
//! `HttpBackend` talks to the remote resource, `FallbackStore` is the
//! volatile in-process substitute, and `NotesClient` ties them together
//! according to the configured base URL and feature flags.

mod client;
mod fallback;
mod http;

pub use client::NotesClient;
pub use fallback::FallbackStore;
pub use http::HttpBackend;

use crate::model::{Note, NoteDraft, NoteId, NotePatch};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("note not found: {0}")]
    NotFound(NoteId),
    #[error("notes backend unavailable: no API URL configured and fallback disabled")]
    Unavailable,
    #[error("invalid response: {0}")]
    Decode(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

pub trait NotesApi {
    fn list(&mut self) -> ApiResult<Vec<Note>>;
    fn get(&mut self, id: &str) -> ApiResult<Note>;
    fn create(&mut self, draft: &NoteDraft) -> ApiResult<Note>;
    fn update(&mut self, id: &str, patch: &NotePatch) -> ApiResult<Note>;
    fn delete(&mut self, id: &str) -> ApiResult<bool>;
}

impl<T: NotesApi + ?Sized> NotesApi for Box<T> {
    fn list(&mut self) -> ApiResult<Vec<Note>> {
        (**self).list()
    }

    fn get(&mut self, id: &str) -> ApiResult<Note> {
        (**self).get(id)
    }

    fn create(&mut self, draft: &NoteDraft) -> ApiResult<Note> {
        (**self).create(draft)
    }

    fn update(&mut self, id: &str, patch: &NotePatch) -> ApiResult<Note> {
        (**self).update(id, patch)
    }

    fn delete(&mut self, id: &str) -> ApiResult<bool> {
        (**self).delete(id)
    }
}
