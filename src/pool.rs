//! Connection pool.
//!
//! The pool owns every [`Client`] it dials and lends them out one caller
//! at a time:
//!
//! - acquire returns an idle connection, dials a new one while under the
//!   `max_open` cap, or queues the caller until a connection frees up;
//! - release returns healthy connections to the free list and retires
//!   errored ones (the next acquire dials a replacement — a broken
//!   connection is never repaired);
//! - a cleaner task evicts idle connections past `max_lifetime` and purges
//!   errored ones.
//!
//! The façade methods ([`Pool::execute`], [`Pool::add_vertex`], …) pair
//! acquire and release around one client call. Cursor traffic pins its
//! connection for the whole cursor lifetime: acquired on open, released on
//! the terminal read or on [`Pool::close_cursor`].

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::client::{Client, ErrorSink};
use crate::config::{Options, PoolOptions};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::graphson::{self, Edges, Vertex};
use crate::identifiers::RequestId;
use crate::protocol::{Bindings, Response};
use crate::query::{self, GraphRecord, gremlin_for_vertex};
use crate::transport::WsTransport;

// ============================================================================
// Types
// ============================================================================

/// Future returned by a dial function.
pub type DialFuture = Pin<Box<dyn Future<Output = Result<Client>> + Send>>;

/// Factory producing a fresh connected [`Client`] per call.
pub type DialFn = Arc<dyn Fn() -> DialFuture + Send + Sync>;

/// One pooled connection with its idle bookkeeping.
struct PooledConn {
    client: Client,
    last_used: Instant,
}

// ============================================================================
// Pool State
// ============================================================================

struct PoolState {
    /// Idle connections; most recently used at the tail.
    free: Vec<PooledConn>,
    /// Total constructed connections, idle and lent out.
    open: usize,
    /// Callers blocked in acquire, FIFO.
    waiters: VecDeque<oneshot::Sender<()>>,
    /// Connections pinned by open cursors, keyed by cursor id.
    held: FxHashMap<RequestId, PooledConn>,
    closed: bool,
    cleaner_running: bool,
}

struct PoolInner {
    dial: DialFn,
    options: PoolOptions,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn expired(&self, conn: &PooledConn) -> bool {
        !self.options.max_lifetime.is_zero() && conn.last_used.elapsed() > self.options.max_lifetime
    }
}

impl PoolState {
    /// Signals the first waiter still listening. Cancelled waiters are
    /// skipped so a wake-up is never lost on them.
    fn wake_one(&mut self) {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.send(()).is_ok() {
                return;
            }
        }
    }
}

// ============================================================================
// Pool
// ============================================================================

/// A bounded pool of multiplexed Gremlin Server connections.
///
/// Cheap to clone; all clones share the pool.
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Clone for Pool {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Pool {
    /// Creates a pool over a custom dial function.
    #[must_use]
    pub fn new(dial: DialFn, options: PoolOptions) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                dial,
                options,
                state: Mutex::new(PoolState {
                    free: Vec::new(),
                    open: 0,
                    waiters: VecDeque::new(),
                    held: FxHashMap::default(),
                    closed: false,
                    cleaner_running: false,
                }),
            }),
        }
    }

    /// Creates a pool that dials [`WsTransport`] connections from
    /// `options`. Connection-fatal errors are reported into `errs`.
    #[must_use]
    pub fn with_dialer(options: Options, pool_options: PoolOptions, errs: ErrorSink) -> Self {
        let dial: DialFn = Arc::new(move || {
            let options = options.clone();
            let errs = errs.clone();
            Box::pin(async move {
                let transport = WsTransport::connect(options).await?;
                Ok(Client::dial(Arc::new(transport), errs))
            })
        });
        Self::new(dial, pool_options)
    }

    /// Closes the pool: all connections (idle and cursor-pinned) are
    /// closed and every queued waiter fails with [`Error::PoolClosed`].
    /// Idempotent.
    pub async fn close(&self) {
        let (retired, waiters) = {
            let mut state = self.inner.state.lock();
            state.closed = true;

            let mut retired: Vec<PooledConn> = state.free.drain(..).collect();
            retired.extend(state.held.drain().map(|(_, conn)| conn));
            state.open -= retired.len();

            (retired, std::mem::take(&mut state.waiters))
        };

        // Dropping the senders resolves every waiter with PoolClosed.
        drop(waiters);

        for conn in retired {
            conn.client.close().await;
        }
        debug!("pool closed");
    }
}

// ============================================================================
// Pool - Acquire / Release
// ============================================================================

enum Acquire {
    Conn(PooledConn),
    Dial,
    Wait(oneshot::Receiver<()>),
}

impl Pool {
    /// Takes a healthy connection: from the free list, by dialing, or by
    /// queueing behind the `max_open` cap.
    async fn conn(&self) -> Result<PooledConn> {
        loop {
            let (action, stale) = {
                let mut state = self.inner.state.lock();
                if state.closed {
                    return Err(Error::PoolClosed);
                }

                let mut stale = Vec::new();
                let mut picked = None;
                while let Some(candidate) = state.free.pop() {
                    if candidate.client.is_errored() || self.inner.expired(&candidate) {
                        state.open -= 1;
                        stale.push(candidate);
                        continue;
                    }
                    picked = Some(candidate);
                    break;
                }

                let action = match picked {
                    Some(conn) => Acquire::Conn(conn),
                    None if self.inner.options.max_open == 0
                        || state.open < self.inner.options.max_open =>
                    {
                        // Reserve the slot so concurrent dials respect the cap.
                        state.open += 1;
                        Acquire::Dial
                    }
                    None => {
                        let (tx, rx) = oneshot::channel();
                        state.waiters.push_back(tx);
                        Acquire::Wait(rx)
                    }
                };
                (action, stale)
            };

            for conn in stale {
                conn.client.close().await;
                trace!("stale connection dropped on acquire");
            }

            match action {
                Acquire::Conn(conn) => return Ok(conn),
                Acquire::Dial => match (self.inner.dial)().await {
                    Ok(client) => {
                        return Ok(PooledConn {
                            client,
                            last_used: Instant::now(),
                        });
                    }
                    Err(error) => {
                        let mut state = self.inner.state.lock();
                        state.open -= 1;
                        state.wake_one();
                        return Err(error);
                    }
                },
                Acquire::Wait(rx) => {
                    if rx.await.is_err() && self.inner.state.lock().closed {
                        return Err(Error::PoolClosed);
                    }
                    // Woken by a release; rescan.
                }
            }
        }
    }

    /// Returns a connection to the pool, or retires it when the request
    /// failed or the client itself has errored.
    async fn put(&self, mut conn: PooledConn, failed: bool) {
        let retire = failed || conn.client.is_errored();
        {
            let mut state = self.inner.state.lock();
            if !state.closed && !retire {
                conn.last_used = Instant::now();
                state.free.push(conn);
                self.start_cleaner_locked(&mut state);
                state.wake_one();
                return;
            }

            state.open -= 1;
            // A slot freed up even though the connection died.
            state.wake_one();
        }

        conn.client.close().await;
        trace!(failed, "connection retired");
    }
}

// ============================================================================
// Pool - Cleaner
// ============================================================================

impl Pool {
    /// Starts the eviction task if lifetimes are bounded and it is not
    /// already running.
    fn start_cleaner_locked(&self, state: &mut PoolState) {
        if self.inner.options.max_lifetime.is_zero() || state.cleaner_running || state.closed {
            return;
        }
        state.cleaner_running = true;
        tokio::spawn(cleaner_loop(Arc::clone(&self.inner)));
    }
}

/// Periodically evicts idle connections that expired or errored. Exits
/// once the pool is closed or empty.
async fn cleaner_loop(inner: Arc<PoolInner>) {
    let period = inner
        .options
        .max_lifetime
        .min(Duration::from_secs(1))
        .max(Duration::from_millis(50));

    loop {
        tokio::time::sleep(period).await;

        let stale = {
            let mut state = inner.state.lock();
            if state.closed || state.open == 0 {
                state.cleaner_running = false;
                return;
            }

            let mut stale = Vec::new();
            let free = std::mem::take(&mut state.free);
            let mut kept = Vec::with_capacity(free.len());
            for conn in free {
                if conn.client.is_errored() || inner.expired(&conn) {
                    state.open -= 1;
                    stale.push(conn);
                } else {
                    kept.push(conn);
                }
            }
            state.free = kept;

            for _ in 0..stale.len() {
                state.wake_one();
            }
            stale
        };

        for conn in stale {
            conn.client.close().await;
            debug!("idle connection evicted");
        }
    }
}

// ============================================================================
// Pool - Query Operations
// ============================================================================

impl Pool {
    /// Executes a Gremlin query on a pooled connection and returns all
    /// responses for it.
    ///
    /// # Errors
    ///
    /// Acquisition errors ([`Error::PoolClosed`], dial failures) and all
    /// [`Client::execute`] errors.
    pub async fn execute(
        &self,
        query: impl Into<String>,
        bindings: Option<Bindings>,
        rebindings: Option<Bindings>,
    ) -> Result<Vec<Response>> {
        let conn = self.conn().await?;
        let result = conn.client.execute(query, bindings, rebindings).await;
        self.put(conn, result.is_err()).await;
        result
    }

    /// Executes a query and decodes the results as vertices. A 204
    /// no-content reply yields an empty vec.
    pub async fn get_vertices(
        &self,
        query: impl Into<String>,
        bindings: Option<Bindings>,
        rebindings: Option<Bindings>,
    ) -> Result<Vec<Vertex>> {
        let responses = self.execute(query, bindings, rebindings).await?;
        graphson::vertices_from_responses(&responses)
    }

    /// Executes a query and decodes the results as edges.
    pub async fn get_edges(&self, query: impl Into<String>) -> Result<Edges> {
        let responses = self.execute(query, None, None).await?;
        graphson::edges_from_responses(&responses)
    }

    /// Adds `record` as a vertex labelled `label` and returns the stored
    /// vertex.
    ///
    /// # Errors
    ///
    /// [`Error::NoGraphTags`] for an empty record, [`Error::Protocol`]
    /// when the server answers with anything but exactly one vertex.
    pub async fn add_vertex<R: GraphRecord + ?Sized>(
        &self,
        label: &str,
        record: &R,
        bindings: Option<Bindings>,
        rebindings: Option<Bindings>,
    ) -> Result<Vertex> {
        let (add, _) = gremlin_for_vertex(label, record)?;
        let responses = self.execute(format!("g.{add}"), bindings, rebindings).await?;

        if responses.len() != 1 {
            return Err(Error::protocol(format!(
                "add vertex expected 1 response, got {}",
                responses.len()
            )));
        }
        let mut vertices = graphson::vertices_from_responses(&responses)?;
        if vertices.len() != 1 {
            return Err(Error::protocol(format!(
                "add vertex expected 1 result, got {}",
                vertices.len()
            )));
        }
        Ok(vertices.remove(0))
    }

    /// Looks up vertices matching `record` under `label`, using the
    /// record's fields as `has` filters.
    pub async fn get_vertex<R: GraphRecord + ?Sized>(
        &self,
        label: &str,
        record: &R,
    ) -> Result<Vec<Vertex>> {
        let (_, get) = gremlin_for_vertex(label, record)?;
        self.get_vertices(format!("g.{get}"), None, None).await
    }

    /// Creates an edge labelled `label` between two vertices by id.
    pub async fn add_edge(
        &self,
        label: &str,
        from_id: &str,
        to_id: &str,
    ) -> Result<Vec<Response>> {
        let query = format!(
            "g.addE('{}').from(g.V().hasId('{}')).to(g.V().hasId('{}'))",
            query::escape(label),
            query::escape(from_id),
            query::escape(to_id),
        );
        self.execute(query, None, None).await
    }
}

// ============================================================================
// Pool - Cursor Operations
// ============================================================================

impl Pool {
    /// Opens a cursor over `query`. The acquired connection stays pinned
    /// to the cursor until the terminal read or [`Pool::close_cursor`].
    pub async fn open_cursor(
        &self,
        query: impl Into<String>,
        bindings: Option<Bindings>,
        rebindings: Option<Bindings>,
    ) -> Result<Cursor> {
        let conn = self.conn().await?;
        match conn.client.open_cursor(query, bindings, rebindings).await {
            Ok(cursor) => match self.pin(cursor.id(), conn) {
                None => Ok(cursor),
                Some(conn) => {
                    conn.client.close().await;
                    Err(Error::PoolClosed)
                }
            },
            Err(error) => {
                self.put(conn, true).await;
                Err(error)
            }
        }
    }

    /// Reads the next batch of vertices from `cursor`. `done` is `true`
    /// once the terminal response has been consumed; the pinned
    /// connection is released at that point. A read after that returns
    /// an empty batch and `done = true`.
    pub async fn read_cursor(&self, cursor: &Cursor) -> Result<(Vec<Vertex>, bool)> {
        let Some(conn) = self.inner.state.lock().held.remove(&cursor.id()) else {
            return Ok((Vec::new(), true));
        };

        match conn.client.read_cursor(cursor).await {
            Ok((responses, false)) => {
                let decoded = graphson::vertices_from_responses(&responses);
                match self.pin(cursor.id(), conn) {
                    None => decoded.map(|vertices| (vertices, false)),
                    Some(conn) => {
                        conn.client.close().await;
                        Err(Error::PoolClosed)
                    }
                }
            }
            Ok((responses, true)) => {
                self.put(conn, false).await;
                let vertices = graphson::vertices_from_responses(&responses)?;
                Ok((vertices, true))
            }
            Err(error) => {
                self.put(conn, true).await;
                Err(error)
            }
        }
    }

    /// Abandons a cursor and releases its pinned connection.
    pub async fn close_cursor(&self, cursor: &Cursor) {
        let conn = self.inner.state.lock().held.remove(&cursor.id());
        if let Some(conn) = conn {
            conn.client.close_cursor(cursor);
            self.put(conn, false).await;
        }
    }

    /// Pins `conn` to a cursor id. When the pool closed in the meantime
    /// the connection is handed back for the caller to retire.
    fn pin(&self, id: RequestId, conn: PooledConn) -> Option<PooledConn> {
        let mut state = self.inner.state.lock();
        if state.closed {
            state.open -= 1;
            return Some(conn);
        }
        state.held.insert(id, conn);
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
