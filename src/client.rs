//! Client: request multiplexing over one connection.
//!
//! A [`Client`] owns one [`Transport`] and multiplexes any number of
//! concurrent callers over it. Four tasks cooperate per connection:
//!
//! - **write worker** — drains the bounded request channel into the
//!   transport; the sole data writer.
//! - **read worker** — pulls raw messages off the transport into the
//!   bounded response channel; the sole reader.
//! - **dispatch worker** — decodes responses and routes them to waiters by
//!   request id, answering 407 authentication challenges on the way.
//! - **keepalive worker** — pings on the configured interval; a failed
//!   ping is connection death.
//!
//! # Correlation
//!
//! Every in-flight request has one entry in the correlation table, keyed by
//! its UUID: an accumulator of responses in arrival order, the terminal
//! status once it arrives, and a wake signal. The table mutex makes each
//! "drain + delete" step a single critical section, so a cursor reader and
//! the terminal writer cannot interleave and lose data.
//!
//! Responses for one request id reach its caller in server arrival order;
//! across ids no ordering is guaranteed. Chunk wake-ups coalesce: the
//! accumulator holds the data, the signal only says "something new".
//!
//! # Cancellation
//!
//! Public operations are cancel-safe. Dropping a waiter mid-flight marks
//! its entry abandoned; the dispatcher discards the entry when the
//! terminal response eventually arrives. Cancellation never aborts
//! server-side work.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, trace, warn};

use crate::cursor::{Cursor, Retriever};
use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{self, Bindings, Request, Response, response};
use crate::transport::Transport;

// ============================================================================
// Constants
// ============================================================================

/// Outbound request channel capacity; submitters suspend when full.
const REQUEST_CHANNEL_CAPACITY: usize = 3;

/// Inbound response channel capacity between reader and dispatcher.
const RESPONSE_CHANNEL_CAPACITY: usize = 200;

// ============================================================================
// Types
// ============================================================================

/// Sink for connection-fatal errors, monitored by the pool owner.
pub type ErrorSink = mpsc::UnboundedSender<Error>;

/// Minimal envelope for recovering the id of an undecodable response.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "requestId")]
    request_id: RequestId,
}

// ============================================================================
// RequestEntry
// ============================================================================

/// Correlation state for one in-flight request.
struct RequestEntry {
    /// Responses in server arrival order, drained by the caller.
    responses: Vec<Response>,
    /// Terminal status; set exactly once.
    terminal: Option<StdResult<(), Error>>,
    /// Whether chunk arrivals should wake a cursor reader.
    cursor: bool,
    /// Caller detached; dispatcher discards on terminal.
    abandoned: bool,
    /// An authentication reply has already been submitted for this id.
    auth_attempted: bool,
    /// Wake signal for the waiter; coalescing.
    notify: Arc<Notify>,
}

impl RequestEntry {
    fn new(cursor: bool) -> Self {
        Self {
            responses: Vec::new(),
            terminal: None,
            cursor,
            abandoned: false,
            auth_attempted: false,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Records the terminal status. Returns `true` when the entry should
    /// be dropped because its caller already detached.
    fn finish(&mut self, terminal: StdResult<(), Error>) -> bool {
        self.terminal = Some(terminal);
        if self.abandoned {
            return true;
        }
        self.notify.notify_one();
        false
    }
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between the client handle and its workers.
struct Shared {
    transport: Arc<dyn Transport>,
    table: Mutex<FxHashMap<RequestId, RequestEntry>>,
    errored: AtomicBool,
    errs: ErrorSink,
}

impl Shared {
    fn register(&self, id: RequestId, cursor: bool) {
        self.table.lock().insert(id, RequestEntry::new(cursor));
    }

    /// Terminates one request with an error.
    fn fail_request(&self, id: RequestId, error: Error) {
        let mut table = self.table.lock();
        if let Some(entry) = table.get_mut(&id)
            && entry.finish(Err(error))
        {
            table.remove(&id);
        }
    }

    /// Fails every live waiter. Used once per connection death.
    fn fail_waiters(&self, message: &str) {
        let mut table = self.table.lock();
        table.retain(|_, entry| {
            if entry.terminal.is_none() && entry.finish(Err(Error::connection(message))) {
                return false;
            }
            true
        });
    }

    /// Marks the connection dead, fails waiters, and reports upstream.
    fn fatal(&self, error: Error) {
        self.errored.store(true, Ordering::SeqCst);
        self.fail_waiters(&error.to_string());
        let _ = self.errs.send(error);
    }

    /// Marks the connection dead after a benign remote close. Waiters
    /// still fail, but nothing is reported upstream.
    fn remote_closed(&self) {
        self.errored.store(true, Ordering::SeqCst);
        self.fail_waiters("connection closed");
    }

    /// Routes one decoded response to its waiter.
    async fn route(&self, response: Response, requests_tx: &mpsc::Sender<Vec<u8>>) {
        let id = response.request_id;

        if response.status.code == response::AUTHENTICATE {
            self.answer_challenge(id, requests_tx).await;
            return;
        }

        let mut table = self.table.lock();
        let Some(entry) = table.get_mut(&id) else {
            warn!(%id, code = response.status.code, "response for unknown request");
            return;
        };

        if response.is_partial() {
            entry.responses.push(response);
            if entry.cursor {
                entry.notify.notify_one();
            }
            return;
        }

        let terminal = match response.status.as_error() {
            Some(error) => Err(error),
            None => Ok(()),
        };
        entry.responses.push(response);
        if entry.finish(terminal) {
            table.remove(&id);
        }
    }

    /// Answers a 407 challenge by resubmitting the same request id with
    /// SASL PLAIN credentials. A repeated challenge, or a challenge with
    /// no credentials configured, terminates the request.
    async fn answer_challenge(&self, id: RequestId, requests_tx: &mpsc::Sender<Vec<u8>>) {
        let frame = {
            let mut table = self.table.lock();
            let Some(entry) = table.get_mut(&id) else {
                warn!(%id, "authentication challenge for unknown request");
                return;
            };

            if entry.auth_attempted {
                if entry.finish(Err(Error::authentication(
                    "server repeated authentication challenge",
                ))) {
                    table.remove(&id);
                }
                return;
            }
            entry.auth_attempted = true;

            let Some(credentials) = self.transport.credentials() else {
                if entry.finish(Err(Error::authentication(
                    "server requires authentication but no credentials are configured",
                ))) {
                    table.remove(&id);
                }
                return;
            };

            match protocol::encode_request(&Request::authentication(id, &credentials)) {
                Ok(frame) => frame,
                Err(error) => {
                    if entry.finish(Err(error)) {
                        table.remove(&id);
                    }
                    return;
                }
            }
        };

        debug!(%id, "answering authentication challenge");
        if requests_tx.send(frame).await.is_err() {
            self.fail_request(id, Error::connection("write worker unavailable"));
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// One multiplexed connection to Gremlin Server.
///
/// Cheap to clone; all clones share the connection and its workers.
pub struct Client {
    shared: Arc<Shared>,
    requests_tx: mpsc::Sender<Vec<u8>>,
}

impl Clone for Client {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            requests_tx: self.requests_tx.clone(),
        }
    }
}

impl Client {
    /// Wires a client over an established transport and spawns its
    /// workers. Connection-fatal errors are reported into `errs`.
    #[must_use]
    pub fn dial(transport: Arc<dyn Transport>, errs: ErrorSink) -> Self {
        let shared = Arc::new(Shared {
            transport,
            table: Mutex::new(FxHashMap::default()),
            errored: AtomicBool::new(false),
            errs,
        });

        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let (responses_tx, responses_rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);

        tokio::spawn(write_worker(Arc::clone(&shared), requests_rx));
        tokio::spawn(read_worker(Arc::clone(&shared), responses_tx));
        tokio::spawn(dispatch_worker(
            Arc::clone(&shared),
            responses_rx,
            requests_tx.clone(),
        ));
        tokio::spawn(keepalive_worker(Arc::clone(&shared)));

        Self {
            shared,
            requests_tx,
        }
    }

    /// Returns `true` once this connection has observed a fatal error or
    /// been closed. An errored client must not be reused.
    #[inline]
    #[must_use]
    pub fn is_errored(&self) -> bool {
        self.shared.errored.load(Ordering::SeqCst) || self.shared.transport.is_disposed()
    }

    /// Executes a Gremlin query and returns all responses for it, in
    /// server arrival order (one, or several for chunked results).
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionDisposed`] when the connection is closed.
    /// - [`Error::Server`] and friends for terminal failure statuses.
    /// - [`Error::Connection`] when the transport dies mid-request.
    pub async fn execute(
        &self,
        query: impl Into<String>,
        bindings: Option<Bindings>,
        rebindings: Option<Bindings>,
    ) -> Result<Vec<Response>> {
        let id = self.submit(query.into(), bindings, rebindings, false).await?;

        let mut guard = WaiterGuard {
            shared: &self.shared,
            id,
            armed: true,
        };
        let result = wait_terminal(&self.shared, id).await;
        guard.armed = false;
        result
    }

    /// [`Client::execute`] bounded by `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when the deadline elapses; the request
    /// entry is cleaned up lazily when its terminal response arrives.
    pub async fn execute_with_timeout(
        &self,
        query: impl Into<String>,
        bindings: Option<Bindings>,
        rebindings: Option<Bindings>,
        wait: Duration,
    ) -> Result<Vec<Response>> {
        match tokio::time::timeout(wait, self.execute(query, bindings, rebindings)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("execute", wait.as_millis() as u64)),
        }
    }

    /// Reads a Gremlin script from `path` and executes it.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the script cannot be read, otherwise as
    /// [`Client::execute`].
    pub async fn execute_file(
        &self,
        path: impl AsRef<Path>,
        bindings: Option<Bindings>,
        rebindings: Option<Bindings>,
    ) -> Result<Vec<Response>> {
        let query = tokio::fs::read_to_string(path).await?;
        self.execute(query, bindings, rebindings).await
    }

    /// Submits a query and returns a cursor over its chunks without
    /// waiting for any results.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionDisposed`] when the connection is closed.
    pub async fn open_cursor(
        &self,
        query: impl Into<String>,
        bindings: Option<Bindings>,
        rebindings: Option<Bindings>,
    ) -> Result<Cursor> {
        let id = self.submit(query.into(), bindings, rebindings, true).await?;
        Ok(Cursor { id })
    }

    /// Returns the next batch of responses for `cursor`.
    ///
    /// Suspends until a chunk or the terminal response arrives. `done` is
    /// `true` once the terminal response has been consumed; a cursor read
    /// after that returns an empty batch and `done = true`.
    ///
    /// # Errors
    ///
    /// Terminal failure statuses surface here, on the read that consumes
    /// them. Buffered chunks already handed out are unaffected.
    pub async fn read_cursor(&self, cursor: &Cursor) -> Result<(Vec<Response>, bool)> {
        loop {
            let notify = {
                let mut table = self.shared.table.lock();
                let Some(entry) = table.get_mut(&cursor.id) else {
                    // Already finalized.
                    return Ok((Vec::new(), true));
                };

                if entry.terminal.is_some() {
                    let entry = table.remove(&cursor.id).expect("entry present");
                    return match entry.terminal.expect("terminal set") {
                        Ok(()) => Ok((entry.responses, true)),
                        Err(error) => Err(error),
                    };
                }

                if !entry.responses.is_empty() {
                    return Ok((std::mem::take(&mut entry.responses), false));
                }

                Arc::clone(&entry.notify)
            };
            notify.notified().await;
        }
    }

    /// Abandons a cursor. Anything still buffered is discarded; the entry
    /// is dropped now or when its terminal response arrives.
    pub fn close_cursor(&self, cursor: &Cursor) {
        let mut table = self.shared.table.lock();
        if let Some(entry) = table.get_mut(&cursor.id) {
            if entry.terminal.is_some() {
                table.remove(&cursor.id);
            } else {
                entry.abandoned = true;
            }
            trace!(id = %cursor.id, "cursor closed");
        }
    }

    /// Closes the underlying connection. Idempotent; in-flight waiters
    /// fail as the workers shut down.
    pub async fn close(&self) {
        if let Err(error) = self.shared.transport.close().await {
            debug!(%error, "transport close reported an error");
        }
    }

    /// Builds, registers, and enqueues one request.
    async fn submit(
        &self,
        query: String,
        bindings: Option<Bindings>,
        rebindings: Option<Bindings>,
        cursor: bool,
    ) -> Result<RequestId> {
        if self.is_errored() {
            return Err(Error::ConnectionDisposed);
        }

        let (request, id) = Request::eval(query, bindings, rebindings);
        let frame = protocol::encode_request(&request)?;

        // Register before sending so the dispatcher always finds an entry,
        // however fast the response comes back.
        self.shared.register(id, cursor);

        if self.requests_tx.send(frame).await.is_err() {
            self.shared.table.lock().remove(&id);
            return Err(Error::ConnectionDisposed);
        }
        trace!(%id, cursor, "request submitted");
        Ok(id)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("errored", &self.is_errored())
            .field("in_flight", &self.shared.table.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Retriever for Client {
    async fn retrieve_next(&self, cursor: &Cursor) -> Result<(Vec<Response>, bool)> {
        self.read_cursor(cursor).await
    }
}

// ============================================================================
// Waiting
// ============================================================================

/// Suspends until the terminal status for `id` is set, then drains and
/// removes the entry in one critical section.
async fn wait_terminal(shared: &Shared, id: RequestId) -> Result<Vec<Response>> {
    loop {
        let notify = {
            let mut table = shared.table.lock();
            let Some(entry) = table.get_mut(&id) else {
                return Err(Error::connection("request entry vanished"));
            };

            if entry.terminal.is_some() {
                let entry = table.remove(&id).expect("entry present");
                return match entry.terminal.expect("terminal set") {
                    Ok(()) => Ok(entry.responses),
                    Err(error) => Err(error),
                };
            }

            Arc::clone(&entry.notify)
        };
        notify.notified().await;
    }
}

/// Marks a request abandoned when its waiter is dropped before completion,
/// so the dispatcher can discard the entry on terminal arrival.
struct WaiterGuard<'a> {
    shared: &'a Shared,
    id: RequestId,
    armed: bool,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut table = self.shared.table.lock();
        if let Some(entry) = table.get_mut(&self.id) {
            if entry.terminal.is_some() {
                table.remove(&self.id);
            } else {
                entry.abandoned = true;
            }
        }
    }
}

// ============================================================================
// Workers
// ============================================================================

/// Sole data writer: drains the request channel into the transport.
async fn write_worker(shared: Arc<Shared>, mut requests_rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(frame) = requests_rx.recv().await {
        if let Err(error) = shared.transport.send_message(frame).await {
            shared.fatal(error);
            break;
        }
    }
    trace!("write worker terminated");
}

/// Sole reader: hands raw messages to the dispatcher.
async fn read_worker(shared: Arc<Shared>, responses_tx: mpsc::Sender<Vec<u8>>) {
    loop {
        match shared.transport.receive_message().await {
            Ok(Some(payload)) => {
                if responses_tx.send(payload).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("connection closed by remote");
                shared.remote_closed();
                break;
            }
            Err(error) => {
                shared.fatal(error);
                break;
            }
        }
    }
    trace!("read worker terminated");
}

/// Decodes queued responses and routes them to waiters.
async fn dispatch_worker(
    shared: Arc<Shared>,
    mut responses_rx: mpsc::Receiver<Vec<u8>>,
    requests_tx: mpsc::Sender<Vec<u8>>,
) {
    while let Some(payload) = responses_rx.recv().await {
        match protocol::decode_response(&payload) {
            Ok(response) => shared.route(response, &requests_tx).await,
            Err(error) => {
                // Salvage the id so at least the owning request fails fast.
                if let Ok(envelope) = serde_json::from_slice::<Envelope>(&payload) {
                    shared.fail_request(envelope.request_id, error);
                } else {
                    warn!(%error, "undecodable response discarded");
                }
            }
        }
    }
    trace!("dispatch worker terminated");
}

/// Pings on the transport's interval until the connection dies.
async fn keepalive_worker(shared: Arc<Shared>) {
    let period = shared.transport.ping_interval();
    if period.is_zero() {
        return;
    }

    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if shared.transport.is_disposed() || shared.errored.load(Ordering::SeqCst) {
            break;
        }
        if let Err(error) = shared.transport.send_ping().await {
            shared.fatal(error);
            break;
        }
        trace!("keepalive ping sent");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Op;
    use crate::transport::mock::{MockTransport, ScriptedResponse};

    const VERTEX_ONE: &str = r#"{"@type":"g:List","@value":[
        {"@type":"g:Vertex","@value":{"id":"test-id1","label":"my-label","properties":{}}}]}"#;

    const VERTEX_TWO_AND_THREE: &str = r#"{"@type":"g:List","@value":[
        {"@type":"g:Vertex","@value":{"id":"test-id2","label":"my-label","properties":{}}},
        {"@type":"g:Vertex","@value":{"id":"test-id3","label":"my-label","properties":{}}}]}"#;

    fn sink() -> (ErrorSink, mpsc::UnboundedReceiver<Error>) {
        mpsc::unbounded_channel()
    }

    fn dial(transport: MockTransport) -> (Client, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        // Error reports are dropped; these tests assert via return values.
        let (errs, _) = sink();
        (Client::dial(transport.clone(), errs), transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_single_response() {
        let (client, transport) = dial(MockTransport::scripted(vec![vec![
            ScriptedResponse::new(200, "ok").with_data(r#"{"@type":"g:List","@value":[]}"#),
        ]]));

        let responses = client.execute("g.V('1234')", None, None).await.expect("execute");
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].status.code, 200);

        let sent = transport.sent_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].args.gremlin.as_deref(), Some("g.V('1234')"));

        // All correlation state is gone once the caller returns.
        assert_eq!(client.shared.table.lock().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_chunked_responses() {
        let (client, _transport) = dial(MockTransport::scripted(vec![vec![
            ScriptedResponse::new(206, "partial").with_data(VERTEX_ONE),
            ScriptedResponse::new(200, "ok")
                .with_data(VERTEX_TWO_AND_THREE)
                .after(Duration::from_millis(50)),
        ]]));

        let responses = client.execute("g.V()", None, None).await.expect("execute");
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].status.code, 206);
        assert_eq!(responses[1].status.code, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_correlate() {
        let (client, _transport) = dial(MockTransport::scripted(vec![
            vec![
                ScriptedResponse::new(200, "first")
                    .with_data(VERTEX_ONE)
                    .after(Duration::from_millis(80)),
            ],
            vec![
                ScriptedResponse::new(200, "second")
                    .with_data(VERTEX_TWO_AND_THREE)
                    .after(Duration::from_millis(10)),
            ],
        ]));

        let (first, second) = tokio::join!(
            client.execute("g.V('a')", None, None),
            client.execute("g.V('b')", None, None),
        );

        let first = first.expect("first");
        let second = second.expect("second");
        // Each caller sees exactly its own response, regardless of the
        // interleaved arrival order.
        assert_eq!(first[0].status.message, "first");
        assert_eq!(second[0].status.message, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_challenge_transparent() {
        let (client, transport) = dial(
            MockTransport::scripted(vec![
                vec![ScriptedResponse::new(407, "challenge")],
                vec![ScriptedResponse::new(200, "ok").with_data(VERTEX_ONE)],
            ])
            .with_credentials("user", "pass"),
        );

        let responses = client.execute("g.V()", None, None).await.expect("execute");
        // The caller observes only the terminal 200.
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].status.code, 200);

        let sent = transport.sent_requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].op, Op::Eval);
        assert_eq!(sent[1].op, Op::Authentication);
        // The SASL reply reuses the challenged request id.
        assert_eq!(sent[1].request_id, sent[0].request_id);
        assert!(sent[1].args.sasl.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_challenge_without_credentials() {
        let (client, _transport) = dial(MockTransport::scripted(vec![vec![
            ScriptedResponse::new(407, "challenge"),
        ]]));

        let err = client.execute("g.V()", None, None).await.expect_err("must fail");
        assert!(err.is_auth_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_after_close_is_disposed() {
        let (client, _transport) = dial(MockTransport::scripted(Vec::new()));
        client.close().await;

        let err = client.execute("g.V()", None, None).await.expect_err("disposed");
        assert!(matches!(err, Error::ConnectionDisposed));
        // Close is idempotent.
        client.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_chunk_then_terminal() {
        let (client, _transport) = dial(MockTransport::scripted(vec![vec![
            ScriptedResponse::new(206, "partial").with_data(VERTEX_ONE),
            ScriptedResponse::new(200, "ok")
                .with_data(VERTEX_TWO_AND_THREE)
                .after(Duration::from_millis(100)),
        ]]));

        let cursor = client.open_cursor("g.V()", None, None).await.expect("open");

        let (batch, done) = client.read_cursor(&cursor).await.expect("first read");
        assert!(!done);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].status.code, 206);

        let (batch, done) = client.read_cursor(&cursor).await.expect("second read");
        assert!(done);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].status.code, 200);

        // Reading a finalized cursor yields an empty terminal batch.
        let (batch, done) = client.read_cursor(&cursor).await.expect("third read");
        assert!(done);
        assert!(batch.is_empty());
        assert_eq!(client.shared.table.lock().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_error_mid_stream() {
        let (client, _transport) = dial(MockTransport::scripted(vec![vec![
            ScriptedResponse::new(206, "partial").with_data(VERTEX_ONE),
            ScriptedResponse::new(500, "SPLAT").after(Duration::from_millis(100)),
        ]]));

        let cursor = client.open_cursor("g.V()", None, None).await.expect("open");

        let (batch, done) = client.read_cursor(&cursor).await.expect("first read");
        assert!(!done);
        assert_eq!(batch.len(), 1);

        let err = client.read_cursor(&cursor).await.expect_err("second read");
        assert_eq!(err.to_string(), "SERVER ERROR - Response Message: SPLAT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_is_fatal() {
        let (errs, mut errs_rx) = sink();
        let transport = Arc::new(MockTransport::scripted(Vec::new()));
        let client = Client::dial(transport.clone(), errs);

        transport.fail_writes();
        let err = client.execute("g.V()", None, None).await.expect_err("must fail");
        assert!(err.is_connection_error());
        assert!(client.is_errored());

        // The supervisor hears about it too.
        let reported = errs_rx.recv().await.expect("reported error");
        assert!(reported.is_connection_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_error_fails_pending_request() {
        let (client, transport) = dial(MockTransport::scripted(vec![Vec::new()]));

        let inject = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            transport.push_read_error("socket reset");
        };
        let (result, ()) = tokio::join!(client.execute("g.V()", None, None), inject);

        let err = result.expect_err("must fail");
        assert!(err.is_connection_error());
        assert!(client.is_errored());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stray_and_garbage_responses_ignored() {
        let (client, transport) = dial(MockTransport::scripted(vec![vec![
            ScriptedResponse::new(200, "ok")
                .with_data(VERTEX_ONE)
                .after(Duration::from_millis(20)),
        ]]));

        // Neither a response for an unknown id nor garbage disturbs the
        // in-flight request.
        transport.push_raw(
            format!(
                "{{\"requestId\":\"{}\",\"status\":{{\"code\":200}}}}",
                RequestId::generate()
            )
            .into_bytes(),
        );
        transport.push_raw(b"{not json".to_vec());

        let responses = client.execute("g.V()", None, None).await.expect("execute");
        assert_eq!(responses.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_with_timeout() {
        // A request the server never answers.
        let (client, _transport) = dial(MockTransport::scripted(vec![Vec::new()]));

        let err = client
            .execute_with_timeout("g.V()", None, None, Duration::from_millis(100))
            .await
            .expect_err("must time out");
        assert!(matches!(err, Error::Timeout { .. }));

        // The abandoned entry stays until a terminal response arrives.
        assert_eq!(client.shared.table.lock().len(), 1);
        assert!(client.shared.table.lock().values().all(|e| e.abandoned));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cursor_discards_entry() {
        let (client, _transport) = dial(MockTransport::scripted(vec![vec![
            ScriptedResponse::new(200, "ok")
                .with_data(VERTEX_ONE)
                .after(Duration::from_millis(50)),
        ]]));

        let cursor = client.open_cursor("g.V()", None, None).await.expect("open");
        client.close_cursor(&cursor);

        // Entry is dropped once the terminal response lands.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.shared.table.lock().len(), 0);
    }
}
