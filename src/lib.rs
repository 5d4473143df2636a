//! jotter: a terminal notes manager for a remote notes API.
//!
//! Notes are listed in a sidebar and edited in a detail panel. Every change
//! is applied optimistically by [`session::Session`] and reconciled with the
//! server once [`api::NotesClient`] answers. When the backend is down and the
//! `fallback` feature flag is set, the client serves a volatile in-process
//! store instead.

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod model;
pub mod search;
pub mod session;
pub mod store;
pub mod txn;
pub mod ui;
pub mod worker;

pub use api::{ApiError, ApiResult, FallbackStore, HttpBackend, NotesApi, NotesClient};
pub use config::{Config, FeatureFlags, Overrides};
pub use model::{Note, NoteDraft, NoteId, NotePatch};
pub use session::{ApiCall, Mode, Outcome, Request, Response, Session, SessionError};
pub use store::{LoadStatus, NotesStore};
