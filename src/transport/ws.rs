//! WebSocket transport over tokio-tungstenite.
//!
//! The socket is split once at connect time: the sink half serves the
//! single writing task (requests and pings, serialized by a mutex), the
//! stream half serves the single reading task. Control frames are handled
//! here; the client core only ever sees data messages.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::config::{Credentials, Options};
use crate::error::{Error, Result};
use crate::transport::Transport;

// ============================================================================
// Types
// ============================================================================

/// The underlying socket type produced by `connect_async`.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WsTransport
// ============================================================================

/// WebSocket implementation of [`Transport`].
#[derive(Debug)]
pub struct WsTransport {
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
    options: Options,
    disposed: AtomicBool,
}

impl WsTransport {
    /// Establishes the WebSocket handshake to the configured endpoint.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] when the dial timeout elapses.
    /// - [`Error::Connection`] when the handshake fails.
    pub async fn connect(options: Options) -> Result<Self> {
        let timeout_ms = options.timeout.as_millis() as u64;

        let (stream, _response) = timeout(options.timeout, connect_async(options.url.as_str()))
            .await
            .map_err(|_| Error::connection_timeout(timeout_ms))?
            .map_err(|e| Error::connection(e.to_string()))?;

        debug!(url = %options.url, "WebSocket connected");

        let (writer, reader) = stream.split();
        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            options,
            disposed: AtomicBool::new(false),
        })
    }

    /// Marks the transport dead, returning whether it already was.
    fn dispose(&self) -> bool {
        self.disposed.swap(true, Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_message(&self, payload: Vec<u8>) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::ConnectionDisposed);
        }

        let wait = self.options.writing_wait;
        let send = async {
            let mut writer = self.writer.lock().await;
            writer.send(Message::Binary(payload.into())).await
        };

        match timeout(wait, send).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.dispose();
                Err(Error::connection(e.to_string()))
            }
            Err(_) => {
                // A half-written frame leaves the sink unusable.
                self.dispose();
                Err(Error::timeout("write", wait.as_millis() as u64))
            }
        }
    }

    async fn receive_message(&self) -> Result<Option<Vec<u8>>> {
        // Inactivity bound: something (at worst a pong to our keepalive)
        // must arrive within one ping interval plus the read grace period.
        let wait = self.options.ping_interval + self.options.reading_wait;

        loop {
            let message = {
                let mut reader = self.reader.lock().await;
                match timeout(wait, reader.next()).await {
                    Ok(message) => message,
                    Err(_) => {
                        self.dispose();
                        return Err(Error::timeout("read", wait.as_millis() as u64));
                    }
                }
            };

            match message {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.to_vec())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => {
                    trace!("WebSocket closed by remote");
                    self.dispose();
                    return Ok(None);
                }
                // Control frames are not data.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    // Errors after a local close are part of teardown.
                    if self.dispose() {
                        return Ok(None);
                    }
                    return Err(Error::connection(e.to_string()));
                }
            }
        }
    }

    async fn send_ping(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::ConnectionDisposed);
        }

        let wait = self.options.writing_wait;
        let send = async {
            let mut writer = self.writer.lock().await;
            writer.send(Message::Ping(Bytes::new())).await
        };

        match timeout(wait, send).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.dispose();
                Err(Error::connection(e.to_string()))
            }
            Err(_) => {
                self.dispose();
                Err(Error::timeout("ping", wait.as_millis() as u64))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if self.dispose() {
            return Ok(());
        }

        let wait = self.options.writing_wait;
        let mut writer = self.writer.lock().await;
        if let Ok(Err(e)) = timeout(wait, writer.send(Message::Close(None))).await {
            debug!(error = %e, "close frame not delivered");
        }
        let _ = timeout(wait, writer.close()).await;
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn credentials(&self) -> Option<Credentials> {
        self.options.credentials.clone()
    }

    fn ping_interval(&self) -> Duration {
        self.options.ping_interval
    }
}

// ============================================================================
// Tests
// ============================================================================
