//! Byte transports for UHF RFID readers
//!
//! A transport moves raw bytes and knows nothing about frames. The
//! connection layer owns one exclusively while it is open.

pub mod error;
pub mod mock;
pub mod tcp;

pub use error::{Error, Result};
pub use mock::{MockHandle, MockTransport};
pub use tcp::TcpTransport;

use async_trait::async_trait;
use bytes::BytesMut;

/// Byte stream to a reader
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the link
    async fn connect(&mut self) -> Result<()>;

    /// Close the link; closing a closed transport is not an error
    async fn disconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Write all of `data`
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to `max_bytes`
    ///
    /// Returns an empty buffer when nothing arrived within the transport's
    /// poll interval. Must be cancel-safe: dropping the future loses no data.
    async fn receive(&mut self, max_bytes: usize) -> Result<BytesMut>;

    /// Peer address for logging
    fn remote_addr(&self) -> String;
}
