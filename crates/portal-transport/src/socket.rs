use std::cell::Cell;
use std::io::{ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, TransportError};
use crate::state::TransportState;
use crate::sys::{self, Readiness};
use crate::traits::TransportObserver;

/// Default bound on each readability wait.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default size of a single read: 256 KiB.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 256 * 1024;

const WORKER_THREAD_NAME: &str = "portal-recv";

/// Configuration for a [`SocketTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on each readability wait. Also bounds how long `close()`
    /// waits for the worker to notice cancellation. Default: 1 s.
    pub poll_timeout: Duration,
    /// Maximum bytes taken from the socket per receive cycle. Default: 256 KiB.
    pub read_chunk_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

/// Owns one connected TCP stream and the worker thread that reads from it.
///
/// The transport becomes `Connected` on its first successful receive, not when
/// the socket connects. Any receive failure (including an orderly close by the
/// peer) closes the socket and moves the transport to `Errored`, which is
/// terminal: recovery means building a new transport.
///
/// `send` is not serialized against other senders; callers with more than one
/// sending thread must coordinate themselves.
pub struct SocketTransport {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    /// Read-locked for a receive cycle or a send; write-locked to close.
    socket: RwLock<Option<TcpStream>>,
    /// Held across observer notification so deliveries never interleave.
    /// Re-entrant so an observer may query or change state from its callback.
    state: ReentrantMutex<Cell<TransportState>>,
    running: AtomicBool,
    observer: RwLock<Option<Weak<dyn TransportObserver>>>,
    peer: Option<SocketAddr>,
    config: TransportConfig,
}

enum Cycle {
    Idle,
    Data(Bytes),
    Failed(TransportError),
    Closed,
}

impl SocketTransport {
    /// Wrap a connected stream with default configuration.
    pub fn new(stream: TcpStream) -> Result<Self> {
        Self::with_config(stream, TransportConfig::default())
    }

    /// Wrap a connected stream with explicit configuration.
    ///
    /// The worker is not started until [`start`](Self::start).
    pub fn with_config(stream: TcpStream, config: TransportConfig) -> Result<Self> {
        stream.set_nonblocking(false)?;
        sys::disable_sigpipe(stream.as_raw_fd())?;
        let peer = stream.peer_addr().ok();

        Ok(Self {
            shared: Arc::new(Shared {
                socket: RwLock::new(Some(stream)),
                state: ReentrantMutex::new(Cell::new(TransportState::Disconnected)),
                running: AtomicBool::new(false),
                observer: RwLock::new(None),
                peer,
                config,
            }),
            worker: Mutex::new(None),
        })
    }

    /// Register the observer. Only a weak reference is kept.
    pub fn set_observer(&self, observer: Weak<dyn TransportObserver>) {
        *self.shared.observer.write() = Some(observer);
    }

    /// Stop delivering notifications.
    pub fn clear_observer(&self) {
        *self.shared.observer.write() = None;
    }

    /// Current connection state.
    pub fn state(&self) -> TransportState {
        self.shared.state.lock().get()
    }

    /// Remote address of the wrapped stream, if the OS reported one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.peer
    }

    /// Transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }

    /// Spawn the receive worker and move to `Connecting`.
    ///
    /// Calling `start` again while the worker is still running only re-arms
    /// its loop flag.
    pub fn start(&self) -> Result<()> {
        match self.state() {
            TransportState::Connected => return Err(TransportError::AlreadyConnected),
            TransportState::Errored => return Err(TransportError::Closed),
            _ => {}
        }
        if self.shared.socket.read().is_none() {
            return Err(TransportError::Closed);
        }

        self.shared.running.store(true, Ordering::SeqCst);
        if self.worker_alive() {
            debug!(peer = ?self.shared.peer, "receive worker already running; re-armed");
            return Ok(());
        }

        // Set before the worker exists: its first receive promotes only from Connecting.
        self.shared.set_state(TransportState::Connecting);

        let mut worker = self.worker.lock();
        match worker.take() {
            Some(handle) if !handle.is_finished() => {
                *worker = Some(handle);
                return Ok(());
            }
            Some(finished) => {
                let _ = finished.join();
            }
            None => {}
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || shared.run());

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                drop(worker);
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared.set_state(TransportState::Disconnected);
                Err(TransportError::Spawn(err))
            }
        }
    }

    fn worker_alive(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the worker, wait for it to exit, and close the socket.
    ///
    /// Called from the worker itself (for example from inside an observer
    /// callback), this only requests cancellation: the worker tears down at its
    /// next loop boundary.
    pub fn close(&self) {
        self.shared.running.store(false, Ordering::SeqCst);

        let handle = {
            let mut worker = self.worker.lock();
            match worker.as_ref() {
                Some(handle) if handle.thread().id() == thread::current().id() => {
                    debug!("close requested on receive worker; deferring teardown");
                    return;
                }
                _ => worker.take(),
            }
        };

        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(peer = ?self.shared.peer, "receive worker panicked");
            }
        }

        self.shared.finish();
    }

    /// Write `data` to the peer in a single blocking send.
    ///
    /// Only valid while `Connected`. A short write is reported as an error and
    /// is not retried.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        let state = self.state();
        if state != TransportState::Connected {
            return Err(TransportError::NotConnected(state));
        }

        let socket = self.shared.socket.read();
        let stream = socket.as_ref().ok_or(TransportError::Closed)?;
        let written = sys::send(stream.as_raw_fd(), data)?;
        if written < data.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: data.len(),
            });
        }

        trace!(bytes = written, "sent");
        Ok(())
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.worker.get_mut().take() {
            if handle.thread().id() == thread::current().id() {
                debug!("transport dropped on its receive worker; detaching");
            } else if handle.join().is_err() {
                warn!(peer = ?self.shared.peer, "receive worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketTransport")
            .field("peer", &self.shared.peer)
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn run(self: Arc<Self>) {
        let mut buf = vec![0u8; self.config.read_chunk_size.max(1)];
        debug!(peer = ?self.peer, "receive worker started");

        while self.running.load(Ordering::SeqCst) {
            match self.receive_cycle(&mut buf) {
                Cycle::Idle => {}
                Cycle::Data(data) => {
                    let promoted = self.transition(|s| {
                        (s == TransportState::Connecting).then_some(TransportState::Connected)
                    });
                    if promoted {
                        info!(peer = ?self.peer, "transport connected");
                    }
                    trace!(bytes = data.len(), "received");
                    if let Some(observer) = self.observer() {
                        observer.on_data_received(data);
                    }
                }
                Cycle::Failed(err) => {
                    warn!(peer = ?self.peer, error = %err, "receive failed; closing transport");
                    self.running.store(false, Ordering::SeqCst);
                    self.close_socket();
                    self.set_state(TransportState::Errored);
                    break;
                }
                Cycle::Closed => break,
            }
        }

        self.finish();
        debug!(peer = ?self.peer, "receive worker exited");
    }

    /// One bounded wait plus at most one read. Holds the socket lock throughout.
    fn receive_cycle(&self, buf: &mut [u8]) -> Cycle {
        let socket = self.socket.read();
        let Some(stream) = socket.as_ref() else {
            return Cycle::Closed;
        };

        match sys::wait_readable(stream.as_raw_fd(), self.config.poll_timeout) {
            Ok(Readiness::TimedOut) => {
                trace!(timeout = ?self.config.poll_timeout, "no data before poll timeout");
                return Cycle::Idle;
            }
            Ok(Readiness::Readable) => {}
            Err(err) => return Cycle::Failed(err.into()),
        }

        let mut reader: &TcpStream = stream;
        match reader.read(buf) {
            Ok(0) => Cycle::Failed(TransportError::PeerClosed),
            Ok(n) => Cycle::Data(Bytes::copy_from_slice(&buf[..n])),
            Err(err) if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                Cycle::Idle
            }
            Err(err) => Cycle::Failed(err.into()),
        }
    }

    fn close_socket(&self) -> bool {
        match self.socket.write().take() {
            Some(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
                true
            }
            None => false,
        }
    }

    /// Close the socket and settle in `Disconnected` unless already `Errored`.
    fn finish(&self) {
        if self.close_socket() {
            info!(peer = ?self.peer, "transport closed");
        }
        self.transition(|s| {
            (s != TransportState::Errored).then_some(TransportState::Disconnected)
        });
    }

    fn set_state(&self, next: TransportState) -> bool {
        self.transition(|_| Some(next))
    }

    /// Apply `f` to the current state and notify on an actual change.
    ///
    /// `Errored` never changes. Returns whether a transition happened.
    fn transition(&self, f: impl FnOnce(TransportState) -> Option<TransportState>) -> bool {
        let guard = self.state.lock();
        let current = guard.get();
        if current.is_terminal() {
            return false;
        }
        let Some(next) = f(current) else {
            return false;
        };
        if next == current {
            return false;
        }

        guard.set(next);
        debug!(from = %current, to = %next, "transport state changed");

        if let Some(observer) = self.observer() {
            observer.on_state_changed(next);
        }
        true
    }

    fn observer(&self) -> Option<Arc<dyn TransportObserver>> {
        self.observer.read().as_ref().and_then(Weak::upgrade)
    }
}
