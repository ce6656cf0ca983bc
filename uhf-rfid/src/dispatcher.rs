//! Command/response correlation and notification fan-out
//!
//! While a connection is open a single IO task owns the transport. It
//! writes frames handed to it by [`Dispatcher::send`], accumulates inbound
//! bytes, extracts frames and routes each one: the response to the pending
//! command resolves that command, notifications go to registered
//! observers, anything else is logged and dropped.
//!
//! At most one command is in flight per connection. A second concurrent
//! [`send`](Dispatcher::send) fails at once with [`Error::Busy`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use uhf_rfid_core::constants::FRAME_HEADER;
use uhf_rfid_core::{
    ConnectionStatus, Extracted, Frame, NotificationCategory, Protocol, Session, TlvList,
};
use uhf_rfid_transport::Transport;

use crate::error::{Error, Result};

/// Outbound frames queued for the IO task
const WRITE_QUEUE_DEPTH: usize = 8;

/// A decoded response to a command
#[derive(Debug, Clone)]
pub struct Response {
    pub frame: Frame,
    pub params: TlvList,
}

/// An unsolicited report from the reader
#[derive(Debug, Clone)]
pub struct Notification {
    pub category: NotificationCategory,
    pub frame: Frame,
    pub params: TlvList,
}

/// Handle returned when registering a notification observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// Buffering limits for the read side
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Bytes requested from the transport per read
    pub read_chunk: usize,
    /// Accumulation buffer size beyond which it is discarded
    pub max_buffered: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            read_chunk: 1024,
            max_buffered: 4096,
        }
    }
}

type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

#[derive(Default)]
struct Routes {
    observers: RwLock<Vec<(ObserverHandle, NotificationCategory, NotificationCallback)>>,
    next_id: AtomicU64,
}

impl Routes {
    fn dispatch(&self, notification: &Notification) {
        let callbacks: Vec<NotificationCallback> = self
            .observers
            .read()
            .iter()
            .filter(|(_, category, _)| *category == notification.category)
            .map(|(_, _, cb)| Arc::clone(cb))
            .collect();

        if callbacks.is_empty() {
            trace!("No observers for {} notification", notification.category);
            return;
        }

        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(notification))).is_err() {
                warn!(
                    "Observer panicked handling {} notification {}",
                    notification.category, notification.frame
                );
            }
        }
    }
}

struct PendingCommand {
    id: u64,
    code: u8,
    address: u16,
    reply: oneshot::Sender<Result<Response>>,
}

type PendingSlot = Arc<Mutex<Option<PendingCommand>>>;

/// Frees the pending slot when the waiting caller goes away
struct PendingGuard<'a> {
    slot: &'a PendingSlot,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|p| p.id == self.id) {
            *slot = None;
        }
    }
}

fn fail_pending(slot: &PendingSlot) {
    if let Some(pending) = slot.lock().take() {
        debug!("Failing pending command 0x{:02X}: connection lost", pending.code);
        let _ = pending.reply.send(Err(Error::ConnectionLost));
    }
}

struct IoHandle {
    writes: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    task: JoinHandle<Box<dyn Transport>>,
}

/// Routes traffic between callers, observers and the IO task
pub struct Dispatcher {
    protocol: Arc<dyn Protocol>,
    session: Session,
    config: DispatchConfig,
    routes: Arc<Routes>,
    pending: PendingSlot,
    io: Mutex<Option<IoHandle>>,
    next_command: AtomicU64,
}

impl Dispatcher {
    pub fn new(protocol: Arc<dyn Protocol>, session: Session, config: DispatchConfig) -> Self {
        Self {
            protocol,
            session,
            config,
            routes: Arc::new(Routes::default()),
            pending: Arc::new(Mutex::new(None)),
            io: Mutex::new(None),
            next_command: AtomicU64::new(1),
        }
    }

    pub fn protocol(&self) -> &Arc<dyn Protocol> {
        &self.protocol
    }

    /// Whether an IO task is alive
    pub fn is_running(&self) -> bool {
        self.io
            .lock()
            .as_ref()
            .is_some_and(|io| !io.task.is_finished())
    }

    /// Hand a connected transport to a new IO task
    pub fn start(&self, transport: Box<dyn Transport>) {
        let (writes, rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
        let cancel = CancellationToken::new();

        let ctx = IoContext {
            protocol: Arc::clone(&self.protocol),
            session: self.session.clone(),
            routes: Arc::clone(&self.routes),
            pending: Arc::clone(&self.pending),
            config: self.config,
        };
        let task = tokio::spawn(io_loop(transport, ctx, rx, cancel.clone()));

        if let Some(previous) = self.io.lock().replace(IoHandle { writes, cancel, task }) {
            warn!("Replacing a running IO task");
            previous.cancel.cancel();
        }
    }

    /// Stop the IO task and take the transport back
    ///
    /// The pending command, if any, fails with [`Error::ConnectionLost`]
    /// before this waits for the task. Returns `None` when no task was
    /// started or the task died without returning its transport.
    pub async fn stop(&self) -> Option<Box<dyn Transport>> {
        let io = self.io.lock().take()?;

        fail_pending(&self.pending);
        io.cancel.cancel();

        match io.task.await {
            Ok(transport) => Some(transport),
            Err(e) => {
                error!("IO task ended abnormally: {}", e);
                None
            }
        }
    }

    /// Cancel the IO task without waiting for it
    ///
    /// The pending command fails with [`Error::ConnectionLost`]. The task
    /// handle stays in place, so a later [`stop`](Self::stop) still gets the
    /// transport back.
    pub fn cancel(&self) {
        fail_pending(&self.pending);
        if let Some(io) = self.io.lock().as_ref() {
            io.cancel.cancel();
        }
    }

    /// Send a command and wait for its response
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless the session is connected
    /// - [`Error::Busy`] if another command is awaiting its response
    /// - [`Error::Timeout`] if no matching response arrives within `timeout`
    /// - [`Error::ConnectionLost`] if the link drops or is closed meanwhile
    /// - a core command error if the reader reports a failure status
    pub async fn send(
        &self,
        code: u8,
        address: u16,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Response> {
        let status = self.session.status();
        if status != ConnectionStatus::Connected {
            return Err(Error::NotConnected { status });
        }

        let id = self.next_command.fetch_add(1, Ordering::Relaxed);
        let (reply, response) = oneshot::channel();
        {
            let mut slot = self.pending.lock();
            if let Some(pending) = slot.as_ref() {
                return Err(Error::Busy {
                    pending: pending.code,
                });
            }
            *slot = Some(PendingCommand {
                id,
                code,
                address,
                reply,
            });
        }
        let _guard = PendingGuard {
            slot: &self.pending,
            id,
        };

        let bytes = self.protocol.encode_command(code, address, payload)?;
        let writes = self
            .io
            .lock()
            .as_ref()
            .map(|io| io.writes.clone())
            .ok_or(Error::NotConnected { status })?;

        debug!("Sending command 0x{:02X} to 0x{:04X}", code, address);
        writes
            .send(bytes)
            .await
            .map_err(|_| Error::ConnectionLost)?;

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionLost),
            Err(_) => {
                warn!("Command 0x{:02X} timed out after {:?}", code, timeout);
                Err(Error::Timeout {
                    code,
                    after: timeout,
                })
            }
        }
    }

    /// Call `callback` for every notification of `category`
    ///
    /// Callbacks run on the IO task in arrival order and must not block.
    /// Registrations survive reconnects.
    pub fn register<F>(&self, category: NotificationCategory, callback: F) -> ObserverHandle
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let handle = ObserverHandle(self.routes.next_id.fetch_add(1, Ordering::Relaxed));
        self.routes
            .observers
            .write()
            .push((handle, category, Arc::new(callback)));
        handle
    }

    /// Returns whether the observer was registered
    pub fn unregister(&self, handle: ObserverHandle) -> bool {
        let mut observers = self.routes.observers.write();
        let before = observers.len();
        observers.retain(|(h, _, _)| *h != handle);
        observers.len() != before
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(io) = self.io.get_mut().take() {
            io.cancel.cancel();
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("protocol", &self.protocol.name())
            .field("status", &self.session.status())
            .field("running", &self.is_running())
            .field("observers", &self.routes.observers.read().len())
            .finish()
    }
}

struct IoContext {
    protocol: Arc<dyn Protocol>,
    session: Session,
    routes: Arc<Routes>,
    pending: PendingSlot,
    config: DispatchConfig,
}

impl IoContext {
    /// Extract and route every complete frame in `buf`
    ///
    /// A header still waiting for its body once `max_buffered` bytes have
    /// piled up is abandoned, and scanning resumes just past it.
    fn drain(&self, buf: &mut BytesMut) {
        loop {
            match self.protocol.try_extract_frame(buf) {
                Extracted::Invalid { consumed, error } => {
                    warn!("Skipping {} bytes: {}", consumed, error);
                    buf.advance(consumed);
                }
                Extracted::Frame { frame, consumed } => {
                    buf.advance(consumed);
                    self.route(frame);
                }
                Extracted::Incomplete if buf.len() > self.config.max_buffered => {
                    warn!(
                        "Receive buffer overflow ({} bytes), abandoning stalled frame",
                        buf.len()
                    );
                    buf.advance(FRAME_HEADER.len().min(buf.len()));
                }
                Extracted::Incomplete => break,
            }
        }
    }

    fn route(&self, frame: Frame) {
        debug!("Received {}", frame);

        if frame.is_response() {
            let matched = {
                let mut slot = self.pending.lock();
                match slot.as_ref() {
                    Some(p) if self.protocol.is_response_to(&frame, p.code, p.address) => {
                        slot.take()
                    }
                    _ => None,
                }
            };

            if let Some(pending) = matched {
                let result = self.decode_response(frame);
                if pending.reply.send(result).is_err() {
                    debug!("Caller for command 0x{:02X} went away", pending.code);
                }
                return;
            }
        } else if frame.is_notification() {
            if let Some(category) = self.protocol.notification_category_of(frame.code) {
                match self.protocol.decode_params(&frame) {
                    Ok(params) => self.routes.dispatch(&Notification {
                        category,
                        frame,
                        params,
                    }),
                    Err(e) => warn!("Undecodable {} notification {}: {}", category, frame, e),
                }
                return;
            }
        }

        warn!("Dropping unsolicited {}", frame);
    }

    fn decode_response(&self, frame: Frame) -> Result<Response> {
        let params = self.protocol.decode_params(&frame)?;
        self.protocol.check_status(&frame, &params)?;
        Ok(Response { frame, params })
    }
}

/// The IO task. Returns the transport, disconnected, when it ends.
async fn io_loop(
    mut transport: Box<dyn Transport>,
    ctx: IoContext,
    mut writes: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) -> Box<dyn Transport> {
    let mut buf = BytesMut::with_capacity(ctx.config.read_chunk);

    let failure = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("IO task cancelled");
                break None;
            }

            outgoing = writes.recv() => {
                match outgoing {
                    Some(bytes) => {
                        if let Err(e) = transport.send(&bytes).await {
                            break Some(e);
                        }
                    }
                    None => {
                        debug!("Dispatcher dropped, exiting IO task");
                        break None;
                    }
                }
            }

            received = transport.receive(ctx.config.read_chunk) => {
                match received {
                    Ok(chunk) if chunk.is_empty() => {}
                    Ok(chunk) => {
                        buf.extend_from_slice(&chunk);
                        ctx.drain(&mut buf);
                    }
                    Err(e) => break Some(e),
                }
            }
        }
    };

    if let Some(e) = failure {
        warn!("Transport to {} failed: {}", transport.remote_addr(), e);
        fail_pending(&ctx.pending);
        ctx.session.force_disconnected();
    }

    if let Err(e) = transport.disconnect().await {
        debug!("Transport disconnect failed: {}", e);
    }
    transport
}
