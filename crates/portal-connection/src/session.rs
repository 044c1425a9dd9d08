use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use portal_frame::{FramerConfig, StreamFramer};
use tracing::{debug, info};

use crate::error::Result;
use crate::manager::{ConnectionConfig, ConnectionManager};
use crate::state::ConnectionState;
use crate::traits::{ConnectionObserver, PacketHandler};

/// A device connection whose bytes are framed into units.
///
/// Owns a [`ConnectionManager`], a [`StreamFramer`], and the
/// [`PacketHandler`] that receives every unit. The framer is reset whenever
/// a connection attempt starts or the session stops, so units never mix
/// bytes from two connections.
pub struct DeviceSession {
    this: Weak<DeviceSession>,
    manager: RwLock<Arc<ConnectionManager>>,
    framer: Mutex<StreamFramer>,
    handler: Arc<dyn PacketHandler>,
    config: ConnectionConfig,
}

impl DeviceSession {
    /// Create a session for `host:port` with default configuration.
    pub fn new(host: impl Into<String>, port: u32, handler: Arc<dyn PacketHandler>) -> Arc<Self> {
        Self::with_config(
            host,
            port,
            ConnectionConfig::default(),
            FramerConfig::default(),
            handler,
        )
    }

    /// Create a session with explicit connection and framer configuration.
    pub fn with_config(
        host: impl Into<String>,
        port: u32,
        config: ConnectionConfig,
        framer_config: FramerConfig,
        handler: Arc<dyn PacketHandler>,
    ) -> Arc<Self> {
        let host = host.into();
        Arc::new_cyclic(|this: &Weak<Self>| {
            let manager = ConnectionManager::with_config(host, port, config.clone());
            let observer: Weak<dyn ConnectionObserver> = this.clone();
            manager.set_observer(observer);

            Self {
                this: this.clone(),
                manager: RwLock::new(manager),
                framer: Mutex::new(StreamFramer::with_config(framer_config)),
                handler,
                config,
            }
        })
    }

    /// Reset the framer and connect.
    pub fn start(&self) -> Result<()> {
        self.framer.lock().reset();
        self.manager().connect()
    }

    /// Close the connection in any state and discard buffered bytes.
    pub fn stop(&self) {
        let manager = self.manager();
        if manager.disconnect().is_err() {
            manager.release();
        }
        self.framer.lock().reset();
    }

    /// Point the session at a new device.
    ///
    /// A changed target stops the current connection and replaces the
    /// manager; call [`start`](Self::start) to connect to the new target.
    /// Returns whether the target changed.
    pub fn retarget(&self, host: &str, port: u32) -> bool {
        {
            let current = self.manager.read();
            if current.host() == host && current.port() == port {
                return false;
            }
        }

        self.stop();

        let manager = ConnectionManager::with_config(host, port, self.config.clone());
        let observer: Weak<dyn ConnectionObserver> = self.this.clone();
        manager.set_observer(observer);

        let old = std::mem::replace(&mut *self.manager.write(), manager);
        old.clear_observer();
        info!(
            old_host = old.host(),
            old_port = old.port(),
            host,
            port,
            "device target changed"
        );
        true
    }

    /// Send `data` to the device.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.manager().send(data)
    }

    pub fn state(&self) -> ConnectionState {
        self.manager().state()
    }

    pub fn host(&self) -> String {
        self.manager.read().host().to_string()
    }

    pub fn port(&self) -> u32 {
        self.manager.read().port()
    }

    /// The manager for the current target.
    pub fn manager(&self) -> Arc<ConnectionManager> {
        Arc::clone(&self.manager.read())
    }

    /// Bytes buffered toward the next unit.
    pub fn buffered_len(&self) -> usize {
        self.framer.lock().buffered_len()
    }
}

impl ConnectionObserver for DeviceSession {
    fn on_state_changed(&self, state: ConnectionState) {
        self.handler.on_state_changed(state);
    }

    fn on_data_received(&self, data: Bytes) {
        let packets = self.framer.lock().process_data(&data);
        if packets.is_empty() {
            return;
        }

        debug!(units = packets.len(), "dispatching units");
        for packet in packets {
            self.handler.on_packet(packet);
        }
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("manager", &*self.manager.read())
            .finish_non_exhaustive()
    }
}
