pub mod interface;
pub mod link;
pub mod protocol;

pub use interface::{SerialConnector, SerialInterface};
pub use link::{LinkBuilder, LinkHandle};
pub use protocol::{BatchKind, Command, CommandBatch, ControlAction};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub kind: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Transmission of batch {batch_id} failed after {sent} command(s): {reason}")]
    TransmissionFailed {
        batch_id: Uuid,
        sent: usize,
        reason: String,
    },

    #[error("Write timed out after {timeout:?} in batch {batch_id} after {sent} command(s)")]
    WriteTimeout {
        batch_id: Uuid,
        sent: usize,
        timeout: Duration,
    },

    #[error("Hardware link degraded: {0}")]
    LinkDegraded(String),

    #[error("Hardware link closed")]
    LinkClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

impl SerialError {
    /// True for errors raised while a batch was on the wire.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self,
            SerialError::TransmissionFailed { .. } | SerialError::WriteTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SerialError>;
