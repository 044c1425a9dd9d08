use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::cmd::{parse_duration, ReplayArgs};
use crate::exit::{io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_listening, print_served, OutputFormat};

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk_size == 0 {
        return Err(CliError::new(USAGE, "chunk size must be greater than zero"));
    }
    let interval = args.interval.as_deref().map(parse_duration).transpose()?;

    let source = args.path.display().to_string();
    let data = std::fs::read(&args.path)
        .map_err(|err| io_error(&format!("failed to read {source}"), err))?;

    let listener = TcpListener::bind((args.host.as_str(), args.port))
        .map_err(|err| io_error(&format!("failed to bind {}:{}", args.host, args.port), err))?;
    let local = listener
        .local_addr()
        .map_err(|err| io_error("failed to query listen address", err))?;
    print_listening(local, format);

    let (mut stream, peer) = listener
        .accept()
        .map_err(|err| io_error("accept failed", err))?;
    info!(%peer, bytes = data.len(), "client connected; replaying");

    let chunks = serve(&mut stream, &data, args.chunk_size, interval)
        .map_err(|err| io_error("replay write failed", err))?;
    print_served(peer, data.len(), chunks, format);

    if args.linger {
        drain_until_closed(&mut stream);
    }
    let _ = stream.shutdown(Shutdown::Both);

    Ok(SUCCESS)
}

/// Write `data` in `chunk_size` pieces. Returns the number of writes.
fn serve(
    stream: &mut impl Write,
    data: &[u8],
    chunk_size: usize,
    interval: Option<Duration>,
) -> std::io::Result<usize> {
    let mut chunks = 0;
    for chunk in data.chunks(chunk_size) {
        if chunks > 0 {
            if let Some(pause) = interval {
                thread::sleep(pause);
            }
        }
        stream.write_all(chunk)?;
        chunks += 1;
    }
    stream.flush()?;
    Ok(chunks)
}

/// Block until the client closes its side, discarding anything it sends.
fn drain_until_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => debug!(bytes = n, "discarding client data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_splits_into_chunks() {
        let mut sink = Vec::new();
        let chunks = serve(&mut sink, &[1, 2, 3, 4, 5], 2, None).unwrap();
        assert_eq!(chunks, 3);
        assert_eq!(sink, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn serve_empty_file_writes_nothing() {
        let mut sink = Vec::new();
        assert_eq!(serve(&mut sink, &[], 16, None).unwrap(), 0);
        assert!(sink.is_empty());
    }
}
