//! Hardware link types shared by the supervisor, the reader and callers.
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::serial::protocol::{BatchKind, CommandBatch, COMMAND_DELAY};
use crate::serial::Result;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Both directions of one open connection to the rig.
pub struct LinkIo {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl LinkIo {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Split a bidirectional stream (a serial port, a socket) into halves.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

/// Source of connections for the link supervisor. Called once at startup and
/// again on every reconnect attempt.
#[async_trait]
pub trait LinkConnector: Send + Sync + 'static {
    async fn connect(&self) -> Result<LinkIo>;

    /// Human readable target, used in log lines.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Minimum spacing between consecutive lines on the wire.
    pub command_delay: Duration,
    /// Upper bound for writing and flushing one line.
    pub write_timeout: Duration,
    /// Silence on the inbound side longer than this is logged. Not a failure.
    pub read_idle_timeout: Duration,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    /// Consecutive failed connection attempts before the link gives up and
    /// closes. `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    pub queue_capacity: usize,
    pub line_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            command_delay: COMMAND_DELAY,
            write_timeout: Duration::from_millis(1000),
            read_idle_timeout: Duration::from_secs(30),
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(10),
            max_reconnect_attempts: None,
            queue_capacity: 1,
            line_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkState {
    Closed,
    Open,
    Degraded { reason: String },
}

impl LinkState {
    pub fn is_open(&self) -> bool {
        matches!(self, LinkState::Open)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Closed => write!(f, "closed"),
            LinkState::Open => write!(f, "open"),
            LinkState::Degraded { reason } => write!(f, "degraded ({})", reason),
        }
    }
}

/// Confirmation that every command of a batch reached the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub batch_id: Uuid,
    pub kind: BatchKind,
    pub commands: usize,
    pub elapsed: Duration,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkMetrics {
    pub batches_sent: u64,
    pub lines_written: u64,
    pub lines_read: u64,
    pub write_failures: u64,
    pub read_failures: u64,
    pub reconnect_attempts: u64,
    pub last_error: Option<String>,
    pub last_batch_at: Option<DateTime<Utc>>,
}

pub(crate) struct LinkRequest {
    pub batch: CommandBatch,
    pub responder: oneshot::Sender<Result<DeliveryReceipt>>,
}
