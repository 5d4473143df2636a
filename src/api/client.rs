use super::{ApiError, ApiResult, FallbackStore, HttpBackend, NotesApi};
use crate::config::Config;
use crate::model::{Note, NoteDraft, NotePatch};
use log::{info, warn};

type Remote = Box<dyn NotesApi + Send>;

/// Remote-first notes client.
///
/// Each call goes to the remote backend when one is configured. When that
/// fails and a fallback store is present, the same operation runs against
/// the fallback store instead. With neither, calls fail with
/// [`ApiError::Unavailable`].
pub struct NotesClient {
    remote: Option<Remote>,
    fallback: Option<FallbackStore>,
}

impl NotesClient {
    pub fn new(remote: Option<Remote>, fallback: Option<FallbackStore>) -> Self {
        NotesClient { remote, fallback }
    }

    pub fn from_config(config: &Config) -> Self {
        let remote = config.api_base().map(|base| {
            Box::new(HttpBackend::new(base, config.request_timeout)) as Remote
        });
        let fallback = config
            .features
            .fallback()
            .then(|| FallbackStore::with_latency(config.fallback_latency));
        info!(
            "event=client_init remote={} fallback={}",
            config.api_base().unwrap_or("none"),
            fallback.is_some()
        );
        NotesClient::new(remote, fallback)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn fallback_mut(&mut self) -> Option<&mut FallbackStore> {
        self.fallback.as_mut()
    }

    fn run<T>(
        &mut self,
        op: &str,
        call: impl Fn(&mut dyn NotesApi) -> ApiResult<T>,
    ) -> ApiResult<T> {
        let remote_err = match self.remote.as_mut() {
            Some(remote) => match call(remote.as_mut()) {
                Ok(value) => return Ok(value),
                Err(err) => Some(err),
            },
            None => None,
        };
        match (self.fallback.as_mut(), remote_err) {
            (Some(store), Some(err)) => {
                warn!("event=api_degraded op={} error={}", op, err);
                call(store)
            }
            (Some(store), None) => call(store),
            (None, Some(err)) => {
                warn!("event=api_failed op={} error={}", op, err);
                Err(err)
            }
            (None, None) => Err(ApiError::Unavailable),
        }
    }
}

impl NotesApi for NotesClient {
    fn list(&mut self) -> ApiResult<Vec<Note>> {
        self.run("list", |api| api.list())
    }

    fn get(&mut self, id: &str) -> ApiResult<Note> {
        self.run("get", |api| api.get(id))
    }

    fn create(&mut self, draft: &NoteDraft) -> ApiResult<Note> {
        self.run("create", |api| api.create(draft))
    }

    fn update(&mut self, id: &str, patch: &NotePatch) -> ApiResult<Note> {
        self.run("update", |api| api.update(id, patch))
    }

    fn delete(&mut self, id: &str) -> ApiResult<bool> {
        self.run("delete", |api| api.delete(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fallback::DEMO_NOTE_ID;
    use std::time::Duration;

    struct DownRemote;

    impl NotesApi for DownRemote {
        fn list(&mut self) -> ApiResult<Vec<Note>> {
            Err(ApiError::Network("connection refused".into()))
        }
        fn get(&mut self, _id: &str) -> ApiResult<Note> {
            Err(ApiError::Network("connection refused".into()))
        }
        fn create(&mut self, _draft: &NoteDraft) -> ApiResult<Note> {
            Err(ApiError::Http {
                status: 500,
                message: "boom".into(),
            })
        }
        fn update(&mut self, _id: &str, _patch: &NotePatch) -> ApiResult<Note> {
            Err(ApiError::Network("connection refused".into()))
        }
        fn delete(&mut self, _id: &str) -> ApiResult<bool> {
            Err(ApiError::Network("connection refused".into()))
        }
    }

    fn degraded_client() -> NotesClient {
        NotesClient::new(
            Some(Box::new(DownRemote)),
            Some(FallbackStore::with_latency(Duration::ZERO)),
        )
    }

    #[test]
    fn unreachable_backend_degrades_to_fallback() {
        let mut client = degraded_client();
        let notes = client.list().expect("fallback list");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, DEMO_NOTE_ID);

        let created = client.create(&NoteDraft::new("A", "B")).expect("create");
        assert_ne!(created.id, DEMO_NOTE_ID);
        let listed = client.list().expect("list");
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn failure_propagates_without_fallback() {
        let mut client = NotesClient::new(Some(Box::new(DownRemote)), None);
        assert_eq!(
            client.create(&NoteDraft::new("A", "B")),
            Err(ApiError::Http {
                status: 500,
                message: "boom".into()
            })
        );
        assert!(matches!(client.list(), Err(ApiError::Network(_))));
    }

    #[test]
    fn no_remote_and_no_fallback_is_unavailable() {
        let mut client = NotesClient::new(None, None);
        assert_eq!(client.list(), Err(ApiError::Unavailable));
        assert_eq!(client.get("x"), Err(ApiError::Unavailable));
        assert_eq!(
            client.create(&NoteDraft::new("t", "c")),
            Err(ApiError::Unavailable)
        );
        assert_eq!(
            client.update("x", &NotePatch::default()),
            Err(ApiError::Unavailable)
        );
        assert_eq!(client.delete("x"), Err(ApiError::Unavailable));
    }

    #[test]
    fn no_remote_with_fallback_uses_store_directly() {
        let mut client = NotesClient::new(None, Some(FallbackStore::with_latency(Duration::ZERO)));
        assert!(!client.has_remote());
        assert_eq!(client.get(DEMO_NOTE_ID).expect("get").id, DEMO_NOTE_ID);
        assert_eq!(client.get("missing"), Err(ApiError::NotFound("missing".into())));
    }
}
