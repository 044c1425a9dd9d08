use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use portal_connection::{ConnectionConfig, ConnectionState, DeviceSession, PacketHandler};
use portal_frame::{DataPacket, FramerConfig};
use portal_transport::TransportConfig;
use tracing::info;

use crate::cmd::{parse_duration, WatchArgs};
use crate::exit::{
    connection_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT, TRANSPORT_ERROR,
};
use crate::output::{print_packet, OutputFormat};

#[derive(Debug)]
enum Event {
    Packet(DataPacket),
    State(ConnectionState),
    Interrupted,
}

struct ChannelHandler {
    tx: Sender<Event>,
}

impl PacketHandler for ChannelHandler {
    fn on_packet(&self, packet: DataPacket) {
        let _ = self.tx.send(Event::Packet(packet));
    }

    fn on_state_changed(&self, state: ConnectionState) {
        let _ = self.tx.send(Event::State(state));
    }
}

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ConnectionConfig {
        connect_deadline: parse_duration(&args.deadline)?,
        transport: TransportConfig {
            poll_timeout: parse_duration(&args.poll_timeout)?,
            ..TransportConfig::default()
        },
        ..ConnectionConfig::default()
    };
    let framer_config = FramerConfig {
        scan_bound: args.scan_bound.into(),
        ..FramerConfig::default()
    };
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;

    let (tx, rx) = unbounded();
    install_ctrlc_handler(tx.clone())?;

    let session = DeviceSession::with_config(
        args.host,
        args.port,
        config,
        framer_config,
        Arc::new(ChannelHandler { tx }),
    );

    session
        .start()
        .map_err(|err| connection_error("connect failed", err))?;

    let result = pump(&rx, args.count, timeout, format);
    session.stop();
    result
}

fn pump(
    rx: &Receiver<Event>,
    count: Option<usize>,
    timeout: Option<std::time::Duration>,
    format: OutputFormat,
) -> CliResult<i32> {
    let mut printed = 0usize;
    let mut last_unit = Instant::now();

    if count == Some(0) {
        return Ok(SUCCESS);
    }

    loop {
        let event = match timeout {
            Some(limit) => {
                let remaining = limit.saturating_sub(last_unit.elapsed());
                match rx.recv_timeout(remaining) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(CliError::new(
                            TIMEOUT,
                            format!("no unit received within {limit:?}"),
                        ));
                    }
                    Err(RecvTimeoutError::Disconnected) => return Ok(SUCCESS),
                }
            }
            None => match rx.recv() {
                Ok(event) => event,
                Err(_) => return Ok(SUCCESS),
            },
        };

        match event {
            Event::Packet(packet) => {
                print_packet(printed, &packet, format);
                printed = printed.saturating_add(1);
                last_unit = Instant::now();

                if count.is_some_and(|count| printed >= count) {
                    return Ok(SUCCESS);
                }
            }
            Event::State(ConnectionState::Errored) => {
                return Err(CliError::new(
                    TRANSPORT_ERROR,
                    format!("device connection lost after {printed} units"),
                ));
            }
            Event::State(ConnectionState::Disconnected) => return Ok(SUCCESS),
            Event::State(state) => info!(%state, "device state"),
            Event::Interrupted => {
                info!(units = printed, "interrupted");
                return Ok(SUCCESS);
            }
        }
    }
}

fn install_ctrlc_handler(tx: Sender<Event>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        let _ = tx.send(Event::Interrupted);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn pump_stops_after_count() {
        let (tx, rx) = unbounded();
        tx.send(Event::State(ConnectionState::Connected)).unwrap();
        for unit in [[0x09u8], [0x67], [0x68]] {
            tx.send(Event::Packet(DataPacket::video(&unit))).unwrap();
        }

        let code = pump(&rx, Some(2), None, OutputFormat::Pretty).unwrap();
        assert_eq!(code, SUCCESS);
        assert!(matches!(rx.try_recv(), Ok(Event::Packet(_))));
    }

    #[test]
    fn pump_reports_lost_connection() {
        let (tx, rx) = unbounded();
        tx.send(Event::State(ConnectionState::Errored)).unwrap();

        let err = pump(&rx, None, None, OutputFormat::Pretty).unwrap_err();
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn pump_times_out_without_units() {
        let (_tx, rx) = unbounded::<Event>();
        let err = pump(
            &rx,
            None,
            Some(Duration::from_millis(30)),
            OutputFormat::Pretty,
        )
        .unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }
}
