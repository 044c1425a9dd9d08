use std::fs::File;
use std::io::{self, Read};

use portal_frame::{start_code_len, DataPacket, FrameError, FramerConfig, UnitReader};
use tracing::info;

use crate::cmd::InspectArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_packet, print_summary, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let source = args.path.display().to_string();
    let input: Box<dyn Read> = if args.path.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&args.path)
            .map_err(|err| io_error(&format!("failed to open {source}"), err))?;
        Box::new(file)
    };

    let config = FramerConfig {
        scan_bound: args.scan_bound.into(),
        ..FramerConfig::default()
    };
    let mut reader = UnitReader::with_config(input, config, args.chunk_size);

    let mut tally = Tally {
        units: 0,
        unit_bytes: 0,
        print: (!args.summary).then_some(format),
    };

    let mut at_eof = false;
    while args.count.is_none_or(|count| tally.units < count) {
        match reader.read_unit() {
            Ok(packet) => tally.record(&packet),
            Err(FrameError::EndOfStream { .. }) => {
                at_eof = true;
                break;
            }
            Err(err) => return Err(frame_error(&format!("failed to read {source}"), err)),
        }
    }

    let mut trailing = reader.trailing().len();
    let within_count = args.count.is_none_or(|count| tally.units < count);
    if args.flush && at_eof && within_count {
        if let Some(packet) = final_unit(reader.trailing()) {
            tally.record(&packet);
            trailing = 0;
        }
    }

    info!(
        source = %source,
        units = tally.units,
        unit_bytes = tally.unit_bytes,
        trailing,
        "inspection finished"
    );
    if args.summary {
        print_summary(&source, tally.units, tally.unit_bytes, trailing, format);
    }

    Ok(SUCCESS)
}

struct Tally {
    units: usize,
    unit_bytes: usize,
    print: Option<OutputFormat>,
}

impl Tally {
    fn record(&mut self, packet: &DataPacket) {
        if let Some(format) = self.print {
            print_packet(self.units, packet, format);
        }
        self.units += 1;
        self.unit_bytes += packet.unit().len();
    }
}

/// The unterminated unit left at end of input, if it has any payload.
fn final_unit(trailing: &[u8]) -> Option<DataPacket> {
    if trailing.len() < 3 {
        return None;
    }
    let head = start_code_len(trailing);
    if trailing.len() <= head {
        return None;
    }
    Some(DataPacket::video(&trailing[head..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_unit_strips_either_start_code() {
        assert_eq!(final_unit(&[0, 0, 0, 1, 0x65]).unwrap().unit(), &[0x65]);
        assert_eq!(final_unit(&[0, 0, 1, 0x41, 0x9A]).unwrap().unit(), &[0x41, 0x9A]);
    }

    #[test]
    fn final_unit_ignores_bare_start_codes() {
        assert!(final_unit(&[]).is_none());
        assert!(final_unit(&[0, 0, 1]).is_none());
        assert!(final_unit(&[0, 0, 0, 1]).is_none());
    }
}
