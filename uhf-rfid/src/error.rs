//! High-level error types

use std::time::Duration;

use uhf_rfid_core::{ConnectionStatus, Status};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] uhf_rfid_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] uhf_rfid_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] uhf_rfid_types::Error),

    /// A command was issued while the connection was not open
    #[error("Reader not connected (status: {status})")]
    NotConnected { status: ConnectionStatus },

    /// The link dropped while a command was in flight
    #[error("Connection to reader lost")]
    ConnectionLost,

    /// No response arrived in time
    #[error("No response to command 0x{code:02X} within {after:?}")]
    Timeout { code: u8, after: Duration },

    /// Another command is still awaiting its response
    #[error("Reader busy: command 0x{pending:02X} is still pending")]
    Busy { pending: u8 },
}

impl Error {
    /// The connection is not usable
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected { .. } | Self::ConnectionLost | Self::Transport(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    /// The reader answered with an error status
    pub fn is_command_error(&self) -> bool {
        matches!(self, Self::Core(uhf_rfid_core::Error::Command { .. }))
    }

    /// Status code reported by the reader, if any
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Core(e) => e.status(),
            _ => None,
        }
    }

    /// Retrying the same call on the same connection may succeed
    pub fn is_recoverable(&self) -> bool {
        self.is_timeout() || self.is_busy()
    }

    /// The connection has to be re-opened before further commands
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, Self::ConnectionLost | Self::Transport(_))
    }
}
