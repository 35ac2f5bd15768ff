//! Scripted in-memory transport for client and pool tests.
//!
//! Each `send_message` call consumes one batch of scripted responses; the
//! batch is replayed (with optional delays) into the receive side, with
//! the request id patched to match the request that triggered it. This
//! mirrors a Gremlin Server answering each submitted request.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::protocol::{MIME_TYPE, Request};
use crate::transport::Transport;

// ============================================================================
// ScriptedResponse
// ============================================================================

/// One canned server response.
pub(crate) struct ScriptedResponse {
    after: Duration,
    code: u16,
    message: &'static str,
    data: Option<&'static str>,
}

impl ScriptedResponse {
    pub(crate) fn new(code: u16, message: &'static str) -> Self {
        Self {
            after: Duration::ZERO,
            code,
            message,
            data: None,
        }
    }

    pub(crate) fn with_data(mut self, data: &'static str) -> Self {
        self.data = Some(data);
        self
    }

    pub(crate) fn after(mut self, delay: Duration) -> Self {
        self.after = delay;
        self
    }
}

/// Inbound item: a payload, or an injected read failure.
type Inbound = std::result::Result<Vec<u8>, String>;

// ============================================================================
// MockTransport
// ============================================================================

/// In-memory [`Transport`] replaying scripted responses.
pub(crate) struct MockTransport {
    batches: Mutex<VecDeque<Vec<ScriptedResponse>>>,
    sent: Mutex<Vec<Vec<u8>>>,
    incoming_tx: mpsc::UnboundedSender<Inbound>,
    incoming_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
    disposed: AtomicBool,
    fail_writes: AtomicBool,
    credentials: Option<Credentials>,
}

impl MockTransport {
    /// One scripted batch is consumed per `send_message` call.
    pub(crate) fn scripted(batches: Vec<Vec<ScriptedResponse>>) -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            batches: Mutex::new(batches.into()),
            sent: Mutex::new(Vec::new()),
            incoming_tx,
            incoming_rx: tokio::sync::Mutex::new(incoming_rx),
            disposed: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            credentials: None,
        }
    }

    pub(crate) fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// Makes every subsequent write fail.
    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Injects a raw inbound payload, bypassing the script.
    pub(crate) fn push_raw(&self, payload: Vec<u8>) {
        let _ = self.incoming_tx.send(Ok(payload));
    }

    /// Injects a read failure.
    pub(crate) fn push_read_error(&self, message: &str) {
        let _ = self.incoming_tx.send(Err(message.to_string()));
    }

    /// Returns the requests sent so far, decoded from their frames.
    pub(crate) fn sent_requests(&self) -> Vec<Request> {
        self.sent
            .lock()
            .iter()
            .map(|frame| {
                serde_json::from_slice(&frame[1 + MIME_TYPE.len()..]).expect("request body")
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(&self, payload: Vec<u8>) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionDisposed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::connection("mock write failure"));
        }

        let request: Request = serde_json::from_slice(&payload[1 + MIME_TYPE.len()..])
            .expect("sent frame must carry a request body");
        self.sent.lock().push(payload);

        let Some(batch) = self.batches.lock().pop_front() else {
            return Ok(());
        };

        let tx = self.incoming_tx.clone();
        let id = request.request_id;
        tokio::spawn(async move {
            for scripted in batch {
                if !scripted.after.is_zero() {
                    tokio::time::sleep(scripted.after).await;
                }
                let mut body = serde_json::json!({
                    "requestId": id,
                    "status": {"message": scripted.message, "code": scripted.code},
                });
                if let Some(data) = scripted.data {
                    let value: serde_json::Value =
                        serde_json::from_str(data).expect("scripted data must be valid JSON");
                    body["result"] = serde_json::json!({ "data": value });
                }
                let _ = tx.send(Ok(serde_json::to_vec(&body).expect("serialize response")));
            }
        });
        Ok(())
    }

    async fn receive_message(&self) -> Result<Option<Vec<u8>>> {
        if self.disposed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let mut rx = self.incoming_rx.lock().await;
        match rx.recv().await {
            // Empty payload is the close sentinel.
            Some(Ok(payload)) if payload.is_empty() => Ok(None),
            Some(Ok(payload)) => Ok(Some(payload)),
            Some(Err(message)) => Err(Error::connection(message)),
            None => Ok(None),
        }
    }

    async fn send_ping(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::connection("mock ping failure"));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            let _ = self.incoming_tx.send(Ok(Vec::new()));
        }
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }

    fn ping_interval(&self) -> Duration {
        // Far enough out to stay clear of scripted timings.
        Duration::from_secs(3600)
    }
}
