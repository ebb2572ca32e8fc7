//! Request/response correlation.
//!
//! Every outgoing request gets the next sequence number and one slot in the
//! pending table. The slot is vacated by exactly one of: the matching
//! response, the request deadline, or the [`PendingResponse`] being dropped.
//! Responses for vacated or unknown slots are dropped.

use super::types::{Message, Request, Response};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

type ResponseSender = oneshot::Sender<Response>;
type PendingTable = Arc<Mutex<HashMap<i32, ResponseSender>>>;

pub struct Correlator {
    seq_counter: AtomicI32,
    pending_requests: PendingTable,
    write_tx: mpsc::UnboundedSender<Message>,
    request_timeout: Duration,
}

impl Correlator {
    pub fn new(write_tx: mpsc::UnboundedSender<Message>, request_timeout: Duration) -> Self {
        Self {
            seq_counter: AtomicI32::new(1),
            pending_requests: Arc::new(Mutex::new(HashMap::new())),
            write_tx,
            request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending_requests).len()
    }

    /// Register and queue a request. The deadline starts now, whether or not
    /// the returned handle is ever awaited.
    pub fn send(&self, command: &str, arguments: Option<Value>) -> Result<PendingResponse> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        lock(&self.pending_requests).insert(seq, tx);

        let request = Message::Request(Request {
            seq,
            command: command.to_string(),
            arguments,
        });

        if self.write_tx.send(request).is_err() {
            lock(&self.pending_requests).remove(&seq);
            return Err(Error::Process(format!(
                "Cannot send '{}': adapter connection closed",
                command
            )));
        }

        debug!(seq, command, "Request queued");

        Ok(PendingResponse {
            seq,
            command: command.to_string(),
            deadline: Instant::now() + self.request_timeout,
            timeout: self.request_timeout,
            rx,
            table: self.pending_requests.clone(),
        })
    }

    /// Answer a request the adapter sent us with `success: false`.
    pub fn reject_reverse_request(&self, request: &Request, message: &str) -> Result<()> {
        let response = Message::Response(Response {
            seq: self.seq_counter.fetch_add(1, Ordering::SeqCst),
            request_seq: request.seq,
            command: request.command.clone(),
            success: false,
            message: Some(message.to_string()),
            body: None,
        });

        self.write_tx
            .send(response)
            .map_err(|_| Error::Process("Adapter connection closed".to_string()))
    }

    /// Hand a response to its waiter. Returns false when nothing was waiting.
    pub fn resolve(&self, response: Response) -> bool {
        let sender = lock(&self.pending_requests).remove(&response.request_seq);
        match sender {
            Some(sender) => {
                let seq = response.request_seq;
                if sender.send(response).is_err() {
                    warn!(seq, "Response arrived after its waiter went away");
                }
                true
            }
            None => {
                debug!(
                    seq = response.request_seq,
                    command = %response.command,
                    "Dropping response for unknown request"
                );
                false
            }
        }
    }
}

/// Completion handle for one in-flight request.
#[derive(Debug)]
pub struct PendingResponse {
    seq: i32,
    command: String,
    deadline: Instant,
    timeout: Duration,
    rx: oneshot::Receiver<Response>,
    table: PendingTable,
}

impl PendingResponse {
    pub fn seq(&self) -> i32 {
        self.seq
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Wait for the raw response, or time out at the request deadline.
    pub async fn response(mut self) -> Result<Response> {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(response)) => {
                info!(
                    seq = self.seq,
                    command = %self.command,
                    success = response.success,
                    "Response received"
                );
                Ok(response)
            }
            Ok(Err(_)) => Err(Error::Internal(format!(
                "Request '{}' was cancelled",
                self.command
            ))),
            Err(_) => {
                let removed = lock(&self.table).remove(&self.seq).is_some();
                // Lost the race against resolve(): the response is already in the channel.
                if !removed {
                    if let Ok(response) = self.rx.try_recv() {
                        return Ok(response);
                    }
                }
                warn!(seq = self.seq, command = %self.command, "Request timed out");
                Err(Error::Timeout {
                    command: self.command.clone(),
                    after: self.timeout,
                })
            }
        }
    }

    /// Wait for the response and turn `success: false` into an error.
    pub async fn body(self) -> Result<Option<Value>> {
        let command = self.command.clone();
        let response = self.response().await?;

        if response.success {
            Ok(response.body)
        } else {
            Err(Error::AdapterFailure {
                message: response
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("Request '{}' failed", command)),
                command,
            })
        }
    }
}

// Sequence numbers are never reused, so removing an already vacated slot is a no-op.
impl Drop for PendingResponse {
    fn drop(&mut self) {
        lock(&self.table).remove(&self.seq);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
