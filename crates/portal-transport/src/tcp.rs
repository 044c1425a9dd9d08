use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// Lowest valid device port.
pub const MIN_PORT: u32 = 1;
/// Highest valid device port.
pub const MAX_PORT: u32 = 65535;

/// `connect_timeout` rejects a zero duration.
const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(1);

/// Validate a device target.
///
/// The host must be a strict dotted-decimal IPv4 literal; names are not
/// resolved. The port is checked first, then the host.
pub fn parse_target(host: &str, port: u32) -> Result<SocketAddrV4> {
    if !(MIN_PORT..=MAX_PORT).contains(&port) {
        return Err(TransportError::InvalidPort { port });
    }

    let ip: Ipv4Addr = host.parse().map_err(|_| TransportError::InvalidHost {
        host: host.to_string(),
    })?;

    Ok(SocketAddrV4::new(ip, port as u16))
}

/// Open a TCP connection to `addr`, giving up after `timeout`.
pub fn connect(addr: SocketAddrV4, timeout: Duration) -> Result<TcpStream> {
    let target = SocketAddr::V4(addr);
    let stream = TcpStream::connect_timeout(&target, timeout.max(MIN_CONNECT_TIMEOUT))
        .map_err(|source| TransportError::Connect {
            addr: target,
            source,
        })?;
    debug!(peer = %target, "tcp connection established");
    Ok(stream)
}
