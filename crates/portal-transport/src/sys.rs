//! Thin libc wrappers for the receive worker and `send`.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
// Apple targets have no MSG_NOSIGNAL; SO_NOSIGPIPE is set on the socket instead.
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
const SEND_FLAGS: libc::c_int = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    Readable,
    TimedOut,
}

/// Wait until `fd` is readable or `timeout` elapses.
///
/// Hang-up and error conditions report `Readable` so that the following read
/// surfaces them. EINTR restarts the wait.
pub(crate) fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<Readiness> {
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    loop {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };

        // SAFETY: `pfd` is a valid, writable pollfd and the count matches the
        // single entry passed. `fd` is an open socket owned by the caller.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };

        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }

        if rc == 0 {
            return Ok(Readiness::TimedOut);
        }

        return Ok(Readiness::Readable);
    }
}

/// One blocking `send(2)` of `data` with SIGPIPE suppressed.
///
/// Returns the number of bytes the kernel accepted. No retry on short writes.
pub(crate) fn send(fd: RawFd, data: &[u8]) -> io::Result<usize> {
    // SAFETY: `data` is a valid readable buffer of `data.len()` bytes and `fd`
    // is an open socket owned by the caller.
    let rc = unsafe {
        libc::send(
            fd,
            data.as_ptr().cast::<libc::c_void>(),
            data.len(),
            SEND_FLAGS,
        )
    };

    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(rc as usize)
}

/// Stop writes to a closed peer from raising SIGPIPE (Apple targets).
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub(crate) fn disable_sigpipe(fd: RawFd) -> io::Result<()> {
    let on: libc::c_int = 1;

    // SAFETY: `on` is a valid c_int for the provided length and `fd` is an
    // open socket owned by the caller.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_NOSIGPIPE,
            (&on as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub(crate) fn disable_sigpipe(_fd: RawFd) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::os::fd::AsRawFd;

    use super::*;

    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn wait_times_out_without_data() {
        let (client, _server) = pair();
        let readiness = wait_readable(client.as_raw_fd(), Duration::from_millis(20)).unwrap();
        assert_eq!(readiness, Readiness::TimedOut);
    }

    #[test]
    fn wait_reports_pending_data() {
        let (client, mut server) = pair();
        server.write_all(b"x").unwrap();
        let readiness = wait_readable(client.as_raw_fd(), Duration::from_secs(2)).unwrap();
        assert_eq!(readiness, Readiness::Readable);
    }

    #[test]
    fn wait_reports_hangup_as_readable() {
        let (client, server) = pair();
        drop(server);
        let readiness = wait_readable(client.as_raw_fd(), Duration::from_secs(2)).unwrap();
        assert_eq!(readiness, Readiness::Readable);
    }

    #[test]
    fn send_writes_whole_small_payload() {
        let (client, server) = pair();
        let sent = send(client.as_raw_fd(), b"hello").unwrap();
        assert_eq!(sent, 5);

        let mut buf = [0u8; 5];
        std::io::Read::read_exact(&mut &server, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
