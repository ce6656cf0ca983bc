//! Connection state machine
//!
//! ```text
//! Disconnected --begin_connect--> Connecting --connected--> Connected
//!      ^                              |                         |
//!      +-------connect_failed---------+                  begin_disconnect
//!      |                                                        v
//!      +---------------disconnected------------------------ Disconnecting
//! ```
//!
//! `force_disconnected` jumps to `Disconnected` from anywhere and is used
//! when the transport fails underneath an open connection.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnecting => "DISCONNECTING",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle returned by [`Session::on_change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusObserver(u64);

type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Shared connection state
///
/// Cloning is cheap; every clone sees the same state and observers.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: RwLock<ConnectionStatus>,
    observers: Mutex<Vec<(StatusObserver, StatusCallback)>>,
    next_observer: AtomicU64,
}

impl Session {
    /// Create a new disconnected session
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                state: RwLock::new(ConnectionStatus::Disconnected),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(1),
            }),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Start connecting
    ///
    /// Returns `false` without changing anything when already connected or
    /// connecting.
    pub fn begin_connect(&self) -> Result<bool> {
        {
            let mut state = self.inner.state.write();
            match *state {
                ConnectionStatus::Disconnected => *state = ConnectionStatus::Connecting,
                ConnectionStatus::Connected | ConnectionStatus::Connecting => return Ok(false),
                from => {
                    return Err(Error::InvalidTransition {
                        from,
                        to: ConnectionStatus::Connecting,
                    })
                }
            }
        }
        self.notify(ConnectionStatus::Connecting);
        Ok(true)
    }

    pub fn connected(&self) -> Result<()> {
        self.transition(ConnectionStatus::Connecting, ConnectionStatus::Connected)
    }

    pub fn connect_failed(&self) -> Result<()> {
        self.transition(ConnectionStatus::Connecting, ConnectionStatus::Disconnected)
    }

    /// Start disconnecting
    ///
    /// Returns `false` when there is nothing to disconnect.
    pub fn begin_disconnect(&self) -> Result<bool> {
        {
            let mut state = self.inner.state.write();
            match *state {
                ConnectionStatus::Connected => *state = ConnectionStatus::Disconnecting,
                ConnectionStatus::Disconnected | ConnectionStatus::Disconnecting => {
                    return Ok(false)
                }
                from => {
                    return Err(Error::InvalidTransition {
                        from,
                        to: ConnectionStatus::Disconnecting,
                    })
                }
            }
        }
        self.notify(ConnectionStatus::Disconnecting);
        Ok(true)
    }

    pub fn disconnected(&self) -> Result<()> {
        self.transition(ConnectionStatus::Disconnecting, ConnectionStatus::Disconnected)
    }

    /// Drop to `Disconnected` from any state
    ///
    /// Returns whether the state changed.
    pub fn force_disconnected(&self) -> bool {
        {
            let mut state = self.inner.state.write();
            if *state == ConnectionStatus::Disconnected {
                return false;
            }
            *state = ConnectionStatus::Disconnected;
        }
        self.notify(ConnectionStatus::Disconnected);
        true
    }

    /// Call `callback` with the new state after every transition
    pub fn on_change<F>(&self, callback: F) -> StatusObserver
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        let handle = StatusObserver(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        self.inner.observers.lock().push((handle, Arc::new(callback)));
        handle
    }

    /// Returns whether the observer was registered
    pub fn remove_observer(&self, handle: StatusObserver) -> bool {
        let mut observers = self.inner.observers.lock();
        let before = observers.len();
        observers.retain(|(h, _)| *h != handle);
        observers.len() != before
    }

    fn transition(&self, from: ConnectionStatus, to: ConnectionStatus) -> Result<()> {
        {
            let mut state = self.inner.state.write();
            if *state != from {
                return Err(Error::InvalidTransition { from: *state, to });
            }
            *state = to;
        }
        self.notify(to);
        Ok(())
    }

    // Runs with no lock held so observers may query or change the session.
    fn notify(&self, status: ConnectionStatus) {
        info!("Connection status: {}", status);

        let observers: Vec<StatusCallback> = self
            .inner
            .observers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in observers {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(status))).is_err() {
                warn!("Status observer panicked on {}", status);
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status())
            .field("observers", &self.inner.observers.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recorder(session: &Session) -> Arc<Mutex<Vec<ConnectionStatus>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.on_change(move |status| sink.lock().push(status));
        seen
    }

    #[test]
    fn test_session_new() {
        let session = Session::new();
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert!(!session.is_connected());
    }

    #[test]
    fn test_full_lifecycle() {
        let session = Session::new();
        let seen = recorder(&session);

        assert!(session.begin_connect().unwrap());
        session.connected().unwrap();
        assert!(session.is_connected());
        assert!(session.begin_disconnect().unwrap());
        session.disconnected().unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                ConnectionStatus::Connecting,
                ConnectionStatus::Connected,
                ConnectionStatus::Disconnecting,
                ConnectionStatus::Disconnected,
            ]
        );
    }

    #[test]
    fn test_connect_failure() {
        let session = Session::new();
        let seen = recorder(&session);

        session.begin_connect().unwrap();
        session.connect_failed().unwrap();

        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(
            *seen.lock(),
            vec![ConnectionStatus::Connecting, ConnectionStatus::Disconnected]
        );
    }

    #[test]
    fn test_connect_while_connected_is_noop() {
        let session = Session::new();
        session.begin_connect().unwrap();
        session.connected().unwrap();
        let seen = recorder(&session);

        assert!(!session.begin_connect().unwrap());
        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_disconnect_while_disconnected_is_noop() {
        let session = Session::new();
        assert!(!session.begin_disconnect().unwrap());
        assert!(!session.force_disconnected());
    }

    #[test]
    fn test_invalid_transitions() {
        let session = Session::new();

        let err = session.connected().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: ConnectionStatus::Disconnected,
                to: ConnectionStatus::Connected
            }
        ));
        assert!(session.disconnected().is_err());

        session.begin_connect().unwrap();
        assert!(session.begin_disconnect().is_err());
    }

    #[test]
    fn test_force_disconnected_from_connected() {
        let session = Session::new();
        session.begin_connect().unwrap();
        session.connected().unwrap();
        let seen = recorder(&session);

        assert!(session.force_disconnected());
        assert_eq!(*seen.lock(), vec![ConnectionStatus::Disconnected]);
    }

    #[test]
    fn test_remove_observer() {
        let session = Session::new();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let handle = session.on_change(move |_| *sink.lock() += 1);

        session.begin_connect().unwrap();
        assert!(session.remove_observer(handle));
        assert!(!session.remove_observer(handle));
        session.connected().unwrap();

        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn test_observer_panic_is_contained() {
        let session = Session::new();
        session.on_change(|_| panic!("observer bug"));
        let seen = recorder(&session);

        session.begin_connect().unwrap();

        assert_eq!(*seen.lock(), vec![ConnectionStatus::Connecting]);
        assert_eq!(session.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn test_observer_may_read_status() {
        let session = Session::new();
        let probe = session.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.on_change(move |_| sink.lock().push(probe.status()));

        session.begin_connect().unwrap();
        assert_eq!(*seen.lock(), vec![ConnectionStatus::Connecting]);
    }

    #[test]
    fn test_session_clone_shares_state() {
        let a = Session::new();
        let b = a.clone();

        a.begin_connect().unwrap();
        assert_eq!(b.status(), ConnectionStatus::Connecting);
    }
}
