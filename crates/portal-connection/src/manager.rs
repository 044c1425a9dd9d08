use std::cell::Cell;
use std::net::{SocketAddrV4, TcpStream};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use portal_transport::{
    parse_target, tcp, SocketTransport, TransportConfig, TransportError, TransportObserver,
    TransportState,
};
use tracing::{debug, info, warn};

use crate::error::{ConnectionError, Result};
use crate::state::ConnectionState;
use crate::traits::ConnectionObserver;

/// Default wall-clock budget for one `connect()` call.
pub const DEFAULT_CONNECT_DEADLINE: Duration = Duration::from_millis(200);

/// Default pause between failed connect attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for a [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Total time `connect()` keeps retrying. Default: 200 ms.
    pub connect_deadline: Duration,
    /// Pause after a failed attempt. Default: 10 ms.
    pub retry_interval: Duration,
    /// Settings for each transport the manager builds.
    pub transport: TransportConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_deadline: DEFAULT_CONNECT_DEADLINE,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            transport: TransportConfig::default(),
        }
    }
}

/// Owns the transport to one device and tracks its [`ConnectionState`].
///
/// Always handled through an `Arc`: the manager registers itself, weakly, as
/// the observer of every transport it builds.
pub struct ConnectionManager {
    this: Weak<ConnectionManager>,
    host: String,
    port: u32,
    config: ConnectionConfig,
    /// Same locking discipline as the transport: held while notifying.
    state: ReentrantMutex<Cell<ConnectionState>>,
    transport: Mutex<Option<Arc<SocketTransport>>>,
    /// Held for the whole retry loop of one `connect()`.
    attempt: Mutex<()>,
    observer: RwLock<Option<Weak<dyn ConnectionObserver>>>,
}

impl ConnectionManager {
    /// Create a manager for `host:port` with default configuration.
    pub fn new(host: impl Into<String>, port: u32) -> Arc<Self> {
        Self::with_config(host, port, ConnectionConfig::default())
    }

    /// Create a manager for `host:port` with explicit configuration.
    ///
    /// The target is not validated until [`connect`](Self::connect).
    pub fn with_config(host: impl Into<String>, port: u32, config: ConnectionConfig) -> Arc<Self> {
        let host = host.into();
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            host,
            port,
            config,
            state: ReentrantMutex::new(Cell::new(ConnectionState::Disconnected)),
            transport: Mutex::new(None),
            attempt: Mutex::new(()),
            observer: RwLock::new(None),
        })
    }

    /// Register the observer. Only a weak reference is kept.
    pub fn set_observer(&self, observer: Weak<dyn ConnectionObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// Stop delivering notifications.
    pub fn clear_observer(&self) {
        *self.observer.write() = None;
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().get()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connect to the device, retrying until the deadline.
    ///
    /// Any previously owned transport is closed first. Success means the
    /// socket is connected and its receive worker is running; the state stays
    /// `Connecting` until the first bytes arrive.
    pub fn connect(&self) -> Result<()> {
        let Some(_attempt) = self.attempt.try_lock() else {
            return Err(ConnectionError::AlreadyConnecting);
        };
        if self.state() == ConnectionState::Connecting {
            return Err(ConnectionError::AlreadyConnecting);
        }

        self.release_transport();
        self.set_state(ConnectionState::Connecting);

        let addr = match parse_target(&self.host, self.port) {
            Ok(addr) => addr,
            Err(err) => {
                warn!(host = %self.host, port = self.port, error = %err, "device address rejected");
                self.set_state(ConnectionState::ImpossibleToConnect);
                return Err(ConnectionError::Address(err));
            }
        };

        match self.connect_with_retry(addr) {
            Ok(stream) => self.attach(stream),
            Err(err) => {
                self.set_state(ConnectionState::FailedToConnect);
                Err(err)
            }
        }
    }

    /// Close the transport and move to `Disconnected`.
    ///
    /// Only valid while `Connected`; see [`release`](Self::release) for the
    /// unconditional variant.
    pub fn disconnect(&self) -> Result<()> {
        let current = self.state();
        if current != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected(current));
        }

        self.release_transport();
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    /// Close any owned transport and move to `Disconnected`, whatever the
    /// current state.
    pub fn release(&self) {
        self.release_transport();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Send `data` to the device in one write.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        let transport = self.transport.lock().clone();
        let Some(transport) = transport else {
            return Err(ConnectionError::NotConnected(self.state()));
        };
        transport.send(data)?;
        Ok(())
    }

    fn connect_with_retry(&self, addr: SocketAddrV4) -> Result<TcpStream> {
        let deadline = Instant::now() + self.config.connect_deadline;
        let mut attempts = 0u32;
        let mut last: Option<TransportError> = None;

        loop {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());

            match tcp::connect(addr, remaining) {
                Ok(stream) => {
                    debug!(peer = %addr, attempt = attempts, "connect attempt succeeded");
                    return Ok(stream);
                }
                Err(err) if err.is_retryable() => {
                    debug!(peer = %addr, attempt = attempts, error = %err, "connect attempt failed");
                    last = Some(err);
                }
                Err(err) => return Err(err.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(self.config.retry_interval.min(deadline - now));
        }

        warn!(peer = %addr, attempts, deadline = ?self.config.connect_deadline, "device unreachable");
        Err(ConnectionError::ConnectTimeout {
            deadline: self.config.connect_deadline,
            attempts,
            last,
        })
    }

    fn attach(&self, stream: TcpStream) -> Result<()> {
        let transport = match SocketTransport::with_config(stream, self.config.transport.clone()) {
            Ok(transport) => Arc::new(transport),
            Err(err) => {
                self.set_state(ConnectionState::FailedToConnect);
                return Err(err.into());
            }
        };

        let observer: Weak<dyn TransportObserver> = self.this.clone();
        transport.set_observer(observer);
        *self.transport.lock() = Some(Arc::clone(&transport));

        if let Err(err) = transport.start() {
            self.release_transport();
            self.set_state(ConnectionState::FailedToConnect);
            return Err(err.into());
        }

        info!(peer = ?transport.peer_addr(), "device socket connected");
        Ok(())
    }

    /// Detach and close the owned transport, if any.
    ///
    /// The observer is cleared before closing so the old transport's final
    /// `Disconnected` never reaches this manager.
    fn release_transport(&self) {
        let transport = self.transport.lock().take();
        if let Some(transport) = transport {
            transport.clear_observer();
            transport.close();
        }
    }

    fn set_state(&self, next: ConnectionState) -> bool {
        self.transition(|_| Some(next))
    }

    fn transition(&self, f: impl FnOnce(ConnectionState) -> Option<ConnectionState>) -> bool {
        let guard = self.state.lock();
        let current = guard.get();
        let Some(next) = f(current) else {
            return false;
        };
        if next == current {
            return false;
        }

        guard.set(next);
        debug!(host = %self.host, port = self.port, from = %current, to = %next, "connection state changed");

        if let Some(observer) = self.observer() {
            observer.on_state_changed(next);
        }
        true
    }

    fn observer(&self) -> Option<Arc<dyn ConnectionObserver>> {
        self.observer.read().as_ref().and_then(Weak::upgrade)
    }
}

impl TransportObserver for ConnectionManager {
    fn on_state_changed(&self, state: TransportState) {
        self.transition(|current| current.on_transport(state));
    }

    fn on_data_received(&self, data: Bytes) {
        if let Some(observer) = self.observer() {
            observer.on_data_received(data);
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.release_transport();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
