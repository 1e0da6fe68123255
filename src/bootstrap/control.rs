//! Line-oriented control channel to the engine.
//!
//! Each statement is followed by `SELECT '<marker>';`. The engine answers
//! the statement first, then prints the marker, so everything read before
//! the marker is the statement's output. With `-bail` a failing statement
//! terminates the engine and stdout reaches end-of-stream instead.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

static MARKER_COUNTER: AtomicU64 = AtomicU64::new(1);

const MARKER_PREFIX: &str = "__ui_gateway_ack_";

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control channel I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine closed its output before acknowledging")]
    Closed,

    #[error("no acknowledgement within {0:?}")]
    Timeout(Duration),
}

/// Something that executes statements on the engine.
#[async_trait]
pub trait EngineControl: Send {
    /// Run one statement and return its output rows.
    async fn execute(&mut self, statement: &str) -> Result<Vec<String>, ControlError>;
}

/// Marker-acknowledged control over a writer/reader pair.
pub struct LineControl<W, R> {
    input: W,
    output: Lines<BufReader<R>>,
    timeout: Duration,
}

impl<W, R> LineControl<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(input: W, output: R, timeout: Duration) -> Self {
        Self {
            input,
            output: BufReader::new(output).lines(),
            timeout,
        }
    }

    async fn round_trip(&mut self, statement: &str, marker: &str) -> Result<Vec<String>, ControlError> {
        let request = format!("{statement}\nSELECT '{marker}';\n");
        self.input.write_all(request.as_bytes()).await?;
        self.input.flush().await?;

        let mut rows = Vec::new();
        loop {
            match self.output.next_line().await? {
                Some(line) if line.trim() == marker => return Ok(rows),
                Some(line) => rows.push(line),
                None => return Err(ControlError::Closed),
            }
        }
    }

    /// Stop waiting for acknowledgements. Stdout keeps being drained in the
    /// background so the engine never blocks on a full pipe; stdin stays
    /// open until the returned handle is dropped.
    pub fn park(self) -> ParkedControl<W> {
        let mut output = self.output;
        tokio::spawn(async move {
            while let Ok(Some(line)) = output.next_line().await {
                tracing::debug!(target: "engine", line = %line, "stdout");
            }
        });
        ParkedControl { _input: self.input }
    }
}

#[async_trait]
impl<W, R> EngineControl for LineControl<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn execute(&mut self, statement: &str) -> Result<Vec<String>, ControlError> {
        let marker = format!(
            "{MARKER_PREFIX}{}",
            MARKER_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.round_trip(statement, &marker)).await {
            Ok(result) => result,
            Err(_) => Err(ControlError::Timeout(timeout)),
        }
    }
}

/// The engine's stdin, held open for the process lifetime.
/// Dropping it closes stdin, which asks the engine to exit.
pub struct ParkedControl<W> {
    _input: W,
}
