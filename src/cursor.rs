//! Cursor handles and row streaming.
//!
//! A [`Cursor`] is an opaque handle to one in-flight streamed query;
//! successive reads through the owning client return chunks until the
//! terminal status arrives.
//!
//! [`Stream`] is a line-oriented view over a cursor for queries that return
//! lists of strings: it buffers decoded rows and hands them out one at a
//! time, newline-terminated, ending with `Ok(None)`.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graphson;
use crate::identifiers::RequestId;
use crate::protocol::Response;

// ============================================================================
// Constants
// ============================================================================

/// Retry cap for reads that race ahead of response arrival.
const MAX_REFILL_RETRIES: usize = 5;

// ============================================================================
// Cursor
// ============================================================================

/// Handle to one streamed query.
///
/// Owned by the caller; resolved through the client that opened it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub(crate) id: RequestId,
}

impl Cursor {
    /// Returns the request id this cursor tracks.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }
}

// ============================================================================
// Retriever
// ============================================================================

/// Source of cursor chunks.
///
/// Implemented by the client; a trait so [`Stream`] can be driven by a
/// scripted source in tests.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns the next batch of responses for the cursor.
    ///
    /// The batch may be empty when results were drained by an earlier call.
    /// `done` is `true` once the terminal response has been consumed.
    async fn retrieve_next(&self, cursor: &Cursor) -> Result<(Vec<Response>, bool)>;
}

// ============================================================================
// Stream
// ============================================================================

/// Line-oriented reader over a cursor of string lists.
pub struct Stream<'a> {
    cursor: Cursor,
    retriever: &'a dyn Retriever,
    buffer: VecDeque<String>,
    eof: bool,
}

impl<'a> Stream<'a> {
    /// Creates a stream over `cursor`, reading through `retriever`.
    #[must_use]
    pub fn new(cursor: Cursor, retriever: &'a dyn Retriever) -> Self {
        Self {
            cursor,
            retriever,
            buffer: VecDeque::new(),
            eof: false,
        }
    }

    /// Returns the next row, newline-terminated, or `Ok(None)` at the end
    /// of the stream.
    ///
    /// Rows come from the buffer of previously retrieved responses when
    /// possible; otherwise the retriever is polled for further chunks.
    pub async fn read(&mut self) -> Result<Option<String>> {
        if self.buffer.is_empty() {
            if self.eof {
                return Ok(None);
            }
            self.refill().await?;
            if self.buffer.is_empty() {
                return Ok(None);
            }
        }

        let mut row = self.buffer.pop_front().expect("buffer checked non-empty");
        row.push('\n');
        Ok(Some(row))
    }

    /// Releases the stream. A no-op: the owning client holds the
    /// connection and is responsible for its resources.
    pub fn close(self) {}

    async fn refill(&mut self) -> Result<()> {
        let mut batch: Vec<Response> = Vec::new();
        let mut attempts = 0;

        // A batch can be empty when reading faster than chunks arrive.
        while batch.is_empty() && !self.eof {
            let (responses, done) = self
                .retriever
                .retrieve_next(&self.cursor)
                .await
                .inspect_err(|e| debug!(cursor = %self.cursor.id, error = %e, "refill failed"))?;
            self.eof = done;

            // A well-formed no-content response ends the stream.
            if responses.len() == 1 && responses[0].is_no_content() {
                self.eof = true;
                return Ok(());
            }

            if responses.is_empty() && !self.eof {
                attempts += 1;
                if attempts > MAX_REFILL_RETRIES {
                    return Err(Error::protocol(format!(
                        "cursor {} returned no data after {MAX_REFILL_RETRIES} retries",
                        self.cursor.id
                    )));
                }
                continue;
            }

            batch = responses;
        }

        if batch.is_empty() {
            return Ok(());
        }

        for response in &batch {
            if let Some(data) = response.data() {
                self.buffer.extend(graphson::string_list(data)?);
            }
        }

        if self.buffer.is_empty() {
            return Err(Error::protocol("no results deserialized"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ResultPayload, Status};

    use parking_lot::Mutex;
    use serde_json::value::RawValue;

    /// Scripted retriever: pops one `(responses, done)` result per call.
    struct ScriptedRetriever {
        script: Mutex<VecDeque<(Vec<Response>, bool)>>,
    }

    impl ScriptedRetriever {
        fn new(script: Vec<(Vec<Response>, bool)>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    #[async_trait]
    impl Retriever for ScriptedRetriever {
        async fn retrieve_next(&self, _cursor: &Cursor) -> Result<(Vec<Response>, bool)> {
            Ok(self
                .script
                .lock()
                .pop_front()
                .unwrap_or((Vec::new(), true)))
        }
    }

    fn cursor() -> Cursor {
        Cursor {
            id: RequestId::generate(),
        }
    }

    fn row_response(row: &str) -> Response {
        let data = format!("{{\"@type\":\"g:List\",\"@value\":[\"{row}\"]}}");
        Response {
            request_id: RequestId::generate(),
            status: Status {
                message: String::new(),
                code: 200,
                attributes: None,
            },
            result: ResultPayload {
                data: Some(RawValue::from_string(data).expect("raw")),
                meta: None,
            },
        }
    }

    fn no_content_response() -> Response {
        Response {
            request_id: RequestId::generate(),
            status: Status {
                message: String::new(),
                code: 204,
                attributes: None,
            },
            result: ResultPayload::default(),
        }
    }

    #[tokio::test]
    async fn test_read_single_row() {
        let retriever =
            ScriptedRetriever::new(vec![(vec![row_response("example,row,content,")], true)]);
        let mut stream = Stream::new(cursor(), &retriever);

        let row = stream.read().await.expect("read");
        assert_eq!(row.as_deref(), Some("example,row,content,\n"));

        let end = stream.read().await.expect("read");
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn test_read_multiple_responses_at_once() {
        let retriever = ScriptedRetriever::new(vec![(
            vec![row_response("row-1"), row_response("row-2")],
            true,
        )]);
        let mut stream = Stream::new(cursor(), &retriever);

        assert_eq!(stream.read().await.expect("read").as_deref(), Some("row-1\n"));
        assert_eq!(stream.read().await.expect("read").as_deref(), Some("row-2\n"));
        assert_eq!(stream.read().await.expect("read"), None);
    }

    #[tokio::test]
    async fn test_read_across_retrievals() {
        let retriever = ScriptedRetriever::new(vec![
            (vec![row_response("row-1")], false),
            (vec![row_response("row-2")], true),
        ]);
        let mut stream = Stream::new(cursor(), &retriever);

        assert_eq!(stream.read().await.expect("read").as_deref(), Some("row-1\n"));
        assert_eq!(stream.read().await.expect("read").as_deref(), Some("row-2\n"));
        assert_eq!(stream.read().await.expect("read"), None);
    }

    #[tokio::test]
    async fn test_empty_last_response() {
        let retriever = ScriptedRetriever::new(vec![
            (vec![row_response("row-1")], false),
            (Vec::new(), true),
        ]);
        let mut stream = Stream::new(cursor(), &retriever);

        assert_eq!(stream.read().await.expect("read").as_deref(), Some("row-1\n"));
        assert_eq!(stream.read().await.expect("read"), None);
    }

    #[tokio::test]
    async fn test_no_content_response_ends_stream() {
        let retriever = ScriptedRetriever::new(vec![(vec![no_content_response()], false)]);
        let mut stream = Stream::new(cursor(), &retriever);

        assert_eq!(stream.read().await.expect("read"), None);
        // eof is sticky
        assert_eq!(stream.read().await.expect("read"), None);
    }

    #[tokio::test]
    async fn test_slow_chunks_are_retried() {
        let retriever = ScriptedRetriever::new(vec![
            (Vec::new(), false),
            (Vec::new(), false),
            (vec![row_response("late-row")], true),
        ]);
        let mut stream = Stream::new(cursor(), &retriever);

        assert_eq!(
            stream.read().await.expect("read").as_deref(),
            Some("late-row\n")
        );
    }

    #[tokio::test]
    async fn test_retry_cap() {
        let script = vec![(Vec::new(), false); MAX_REFILL_RETRIES + 2];
        let retriever = ScriptedRetriever::new(script);
        let mut stream = Stream::new(cursor(), &retriever);

        let err = stream.read().await.expect_err("must give up");
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_retriever_error_propagates() {
        struct FailingRetriever;

        #[async_trait]
        impl Retriever for FailingRetriever {
            async fn retrieve_next(&self, _cursor: &Cursor) -> Result<(Vec<Response>, bool)> {
                Err(Error::server(500, "SPLAT"))
            }
        }

        let mut stream = Stream::new(cursor(), &FailingRetriever);
        let err = stream.read().await.expect_err("must fail");
        assert_eq!(err.to_string(), "SERVER ERROR - Response Message: SPLAT");
    }
}
