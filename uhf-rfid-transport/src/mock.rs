//! In-memory transport for driving the connection layer without hardware
//!
//! [`MockTransport`] is handed to the code under test; the paired
//! [`MockHandle`] stays with the test and plays the reader: it queues
//! inbound bytes, answers writes through a responder and can drop the link.
//!
//! # Example
//!
//! ```
//! use uhf_rfid_transport::{MockTransport, Transport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut transport, handle) = MockTransport::pair();
//! handle.on_write(|written| vec![written.to_vec()]);
//!
//! transport.connect().await.unwrap();
//! transport.send(&[0x52, 0x46]).await.unwrap();
//! assert_eq!(&transport.receive(64).await.unwrap()[..], &[0x52, 0x46]);
//! assert_eq!(handle.sent(), vec![vec![0x52, 0x46]]);
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::{error::*, Transport};

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

#[derive(Default)]
struct MockState {
    inbound: VecDeque<Bytes>,
    sent: Vec<Vec<u8>>,
    responder: Option<Responder>,
    remote_closed: bool,
    refuse_connect: Option<String>,
    fail_writes: bool,
    connects: usize,
}

struct Shared {
    state: Mutex<MockState>,
    readable: Notify,
}

impl Shared {
    fn enqueue(&self, chunks: impl IntoIterator<Item = Vec<u8>>) {
        {
            let mut state = self.state.lock();
            state
                .inbound
                .extend(chunks.into_iter().filter(|c| !c.is_empty()).map(Bytes::from));
        }
        self.readable.notify_one();
    }
}

/// Test double for a reader link
pub struct MockTransport {
    shared: Arc<Shared>,
    connected: bool,
    poll_interval: Duration,
}

/// Test-side control of a [`MockTransport`]
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockTransport {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// A disconnected transport and the handle that controls it
    pub fn pair() -> (Self, MockHandle) {
        let shared = Arc::new(Shared {
            state: Mutex::new(MockState::default()),
            readable: Notify::new(),
        });
        let transport = Self {
            shared: Arc::clone(&shared),
            connected: false,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        };
        (transport, MockHandle { shared })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn poll_inbound(&mut self, max_bytes: usize) -> Result<Option<BytesMut>> {
        let mut state = self.shared.state.lock();
        if let Some(mut chunk) = state.inbound.pop_front() {
            if chunk.len() > max_bytes {
                let rest = chunk.split_off(max_bytes);
                state.inbound.push_front(rest);
            }
            return Ok(Some(BytesMut::from(&chunk[..])));
        }
        if state.remote_closed {
            drop(state);
            self.connected = false;
            return Err(Error::ConnectionClosed);
        }
        Ok(None)
    }
}

impl MockHandle {
    /// Queue bytes for the next `receive` calls
    pub fn push_rx(&self, bytes: impl Into<Vec<u8>>) {
        self.shared.enqueue([bytes.into()]);
    }

    /// Answer every write with the returned chunks
    pub fn on_write<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        self.shared.state.lock().responder = Some(Box::new(responder));
    }

    /// Stop answering writes
    pub fn clear_responder(&self) {
        self.shared.state.lock().responder = None;
    }

    /// Every buffer passed to `send`, in order
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().sent.clone()
    }

    /// Simulate the reader dropping the link
    ///
    /// Bytes already queued are still delivered first.
    pub fn close_remote(&self) {
        self.shared.state.lock().remote_closed = true;
        self.shared.readable.notify_one();
    }

    /// Refuse the next `connect` with this reason
    pub fn refuse_connect(&self, reason: impl Into<String>) {
        self.shared.state.lock().refuse_connect = Some(reason.into());
    }

    /// Make every `send` fail with an I/O error
    pub fn fail_writes(&self, fail: bool) {
        self.shared.state.lock().fail_writes = fail;
    }

    /// Successful `connect` calls so far
    pub fn connect_count(&self) -> usize {
        self.shared.state.lock().connects
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.connected {
            return Err(Error::AlreadyConnected);
        }

        let mut state = self.shared.state.lock();
        if let Some(reason) = state.refuse_connect.take() {
            return Err(Error::ConnectionRefused(reason));
        }
        state.remote_closed = false;
        state.connects += 1;
        self.connected = true;
        debug!("Mock transport connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let replies = {
            let mut state = self.shared.state.lock();
            if state.fail_writes {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "mock write failure",
                )));
            }
            trace!("Mock sent {} bytes: {:02X?}", data.len(), data);
            state.sent.push(data.to_vec());
            match state.responder.as_mut() {
                Some(responder) => responder(data),
                None => Vec::new(),
            }
        };

        if !replies.is_empty() {
            self.shared.enqueue(replies);
        }
        Ok(())
    }

    async fn receive(&mut self, max_bytes: usize) -> Result<BytesMut> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if let Some(chunk) = self.poll_inbound(max_bytes)? {
            return Ok(chunk);
        }

        // A permit left by an earlier enqueue makes this return at once
        let _ = tokio::time::timeout(self.poll_interval, self.shared.readable.notified()).await;

        Ok(self.poll_inbound(max_bytes)?.unwrap_or_default())
    }

    fn remote_addr(&self) -> String {
        "mock".to_string()
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("connected", &self.connected)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("MockHandle")
            .field("queued", &state.inbound.len())
            .field("sent", &state.sent.len())
            .field("remote_closed", &state.remote_closed)
            .finish()
    }
}
