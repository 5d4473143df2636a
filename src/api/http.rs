use super::{ApiError, ApiResult, NotesApi};
use crate::model::{Note, NoteDraft, NotePatch};
use log::debug;
use serde::de::DeserializeOwned;
use std::time::Duration;

const USER_AGENT: &str = concat!("jotter/", env!("CARGO_PKG_VERSION"));

/// Remote notes resource at `{base}/notes`.
pub struct HttpBackend {
    base: String,
    agent: ureq::Agent,
}

impl HttpBackend {
    pub fn new(base: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        HttpBackend {
            base: base.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn collection_url(&self) -> String {
        format!("{}/notes", self.base)
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/notes/{}", self.base, encode_segment(id))
    }

    /// Issues one request. `Ok(None)` means the server answered without a body.
    fn send(&self, method: &str, url: &str, body: Option<String>) -> ApiResult<Option<String>> {
        debug!("event=http_request method={} url={}", method, url);
        let request = self
            .agent
            .request(method, url)
            .set("User-Agent", USER_AGENT)
            .set("Accept", "application/json");
        let result = match body {
            Some(json) => request
                .set("Content-Type", "application/json")
                .send_string(&json),
            None => request.call(),
        };
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                return Err(status_error(status, response));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(ApiError::Network(transport.to_string()));
            }
        };
        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(status_error(status, response));
        }
        if status == 204 {
            return Ok(None);
        }
        let text = response
            .into_string()
            .map_err(|e| ApiError::Network(format!("failed to read response body: {e}")))?;
        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        method: &str,
        url: &str,
        body: Option<String>,
    ) -> ApiResult<T> {
        let text = self
            .send(method, url, body)?
            .ok_or_else(|| ApiError::Decode(format!("{method} {url} returned no content")))?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl NotesApi for HttpBackend {
    fn list(&mut self) -> ApiResult<Vec<Note>> {
        self.send_json("GET", &self.collection_url(), None)
    }

    fn get(&mut self, id: &str) -> ApiResult<Note> {
        self.send_json("GET", &self.item_url(id), None)
    }

    fn create(&mut self, draft: &NoteDraft) -> ApiResult<Note> {
        let body = encode_body(draft)?;
        self.send_json("POST", &self.collection_url(), Some(body))
    }

    fn update(&mut self, id: &str, patch: &NotePatch) -> ApiResult<Note> {
        let body = encode_body(patch)?;
        self.send_json("PUT", &self.item_url(id), Some(body))
    }

    fn delete(&mut self, id: &str) -> ApiResult<bool> {
        self.send("DELETE", &self.item_url(id), None)?;
        Ok(true)
    }
}

fn encode_body<T: serde::Serialize>(payload: &T) -> ApiResult<String> {
    serde_json::to_string(payload).map_err(|e| ApiError::Decode(e.to_string()))
}

fn status_error(status: u16, response: ureq::Response) -> ApiError {
    let status_text = response.status_text().to_string();
    let body = response.into_string().unwrap_or_default();
    let message = if body.trim().is_empty() {
        status_text
    } else {
        body.trim().to_string()
    };
    ApiError::Http { status, message }
}

fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let backend = HttpBackend::new("http://localhost:4000/api/", Duration::from_secs(1));
        assert_eq!(backend.base(), "http://localhost:4000/api");
        assert_eq!(backend.collection_url(), "http://localhost:4000/api/notes");
        assert_eq!(backend.item_url("abc"), "http://localhost:4000/api/notes/abc");
    }

    #[test]
    fn ids_are_percent_encoded() {
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_segment("plain-id_1.2~"), "plain-id_1.2~");
    }

    #[test]
    fn unreachable_server_is_a_network_error() {
        // Port 9 (discard) is closed on test machines; the connect fails fast.
        let mut backend = HttpBackend::new("http://127.0.0.1:9", Duration::from_secs(2));
        match backend.list() {
            Err(ApiError::Network(_)) => {}
            other => panic!("expected network error, got {:?}", other),
        }
    }
}
