use crate::api::NotesApi;
use crate::session::{ApiCall, Outcome, Request, Response, Session};
use log::{debug, warn};
use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

/// Runs one request against `api`.
pub fn execute(api: &mut dyn NotesApi, request: &Request) -> Response {
    debug!("event=execute ticket={} call={:?}", request.ticket, request.call);
    let outcome = match &request.call {
        ApiCall::List => Outcome::Listed(api.list()),
        ApiCall::Create(draft) => Outcome::Created(api.create(draft)),
        ApiCall::Update(id, patch) => Outcome::Updated(api.update(id, patch)),
        ApiCall::Delete(id) => Outcome::Deleted(api.delete(id)),
    };
    Response {
        ticket: request.ticket,
        outcome,
    }
}

/// Executes `request` and every follow-up it causes, in order.
pub fn drive(session: &mut Session, api: &mut dyn NotesApi, request: Request) {
    let mut queue = VecDeque::from([request]);
    while let Some(next) = queue.pop_front() {
        let response = execute(api, &next);
        queue.extend(session.apply(response));
    }
}

/// Background thread that owns the API client and answers requests in the
/// order they were submitted.
pub struct Worker {
    jobs: Sender<Request>,
    results: Receiver<Response>,
}

impl Worker {
    pub fn spawn<A>(mut api: A) -> io::Result<Self>
    where
        A: NotesApi + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel::<Request>();
        let (result_tx, result_rx) = mpsc::channel::<Response>();
        thread::Builder::new()
            .name("jotter-api".into())
            .spawn(move || {
                for request in job_rx {
                    let response = execute(&mut api, &request);
                    if result_tx.send(response).is_err() {
                        break;
                    }
                }
                debug!("event=worker_exit");
            })?;
        Ok(Worker {
            jobs: job_tx,
            results: result_rx,
        })
    }

    pub fn submit(&self, request: Request) -> bool {
        match self.jobs.send(request) {
            Ok(()) => true,
            Err(err) => {
                warn!("event=worker_gone ticket={}", err.0.ticket);
                false
            }
        }
    }

    pub fn submit_all(&self, requests: impl IntoIterator<Item = Request>) {
        for request in requests {
            self.submit(request);
        }
    }

    /// Next finished response, if any, without blocking.
    pub fn try_next(&self) -> Option<Response> {
        match self.results.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Response> {
        self.results.recv_timeout(timeout).ok()
    }
}
