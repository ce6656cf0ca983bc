//! Transport errors

use std::io;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport is not open")]
    NotConnected,

    #[error("Transport is already open")]
    AlreadyConnected,

    #[error("No connection to {addr} within {after:?}")]
    ConnectionTimeout { addr: String, after: Duration },

    #[error("Reader closed the connection")]
    ConnectionClosed,

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot resolve reader address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// The link is gone and must be re-established
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionClosed | Self::Io(_)
        )
    }

    /// The link was never established
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::ConnectionRefused(_) | Self::InvalidAddress(_)
        )
    }
}
