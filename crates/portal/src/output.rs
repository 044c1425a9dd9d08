use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::net::SocketAddr;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use portal_frame::{kind_name, DataPacket};
use serde::Serialize;

const PREVIEW_BYTES: usize = 8;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    index: usize,
    version: u32,
    kind: u32,
    kind_name: &'a str,
    tag: u32,
    size: usize,
    head: String,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    source: &'a str,
    units: usize,
    unit_bytes: usize,
    trailing_bytes: usize,
}

#[derive(Serialize)]
struct ListeningOutput {
    event: &'static str,
    addr: String,
}

#[derive(Serialize)]
struct ServedOutput {
    event: &'static str,
    peer: String,
    bytes: usize,
    chunks: usize,
}

/// Print one unit. `Raw` writes the re-prefixed payload, so a sequence of
/// raw packets is itself a valid Annex-B stream.
pub fn print_packet(index: usize, packet: &DataPacket, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                index,
                version: packet.version,
                kind: packet.kind,
                kind_name: kind_name(packet.kind),
                tag: packet.tag,
                size: packet.payload.len(),
                head: hex_preview(packet.unit()),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "KIND", "TAG", "SIZE", "HEAD"])
                .add_row(vec![
                    index.to_string(),
                    kind_name(packet.kind).to_string(),
                    packet.tag.to_string(),
                    packet.payload.len().to_string(),
                    hex_preview(packet.unit()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{} kind={} ({}) tag={} size={} head={}",
                index,
                packet.kind,
                kind_name(packet.kind),
                packet.tag,
                packet.payload.len(),
                hex_preview(packet.unit())
            );
        }
        OutputFormat::Raw => {
            print_raw(packet.payload.as_ref());
        }
    }
}

/// Totals for a framed file. Nothing is printed in `Raw` mode.
pub fn print_summary(
    source: &str,
    units: usize,
    unit_bytes: usize,
    trailing_bytes: usize,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = SummaryOutput {
                source,
                units,
                unit_bytes,
                trailing_bytes,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SOURCE", "UNITS", "UNIT BYTES", "TRAILING"])
                .add_row(vec![
                    source.to_string(),
                    units.to_string(),
                    unit_bytes.to_string(),
                    trailing_bytes.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{source}: {units} units, {unit_bytes} unit bytes, {trailing_bytes} trailing bytes"
            );
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_listening(addr: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ListeningOutput {
                event: "listening",
                addr: addr.to_string(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        _ => println!("listening on {addr}"),
    }
}

pub fn print_served(peer: SocketAddr, bytes: usize, chunks: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ServedOutput {
                event: "served",
                peer: peer.to_string(),
                bytes,
                chunks,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        _ => println!("served {bytes} bytes in {chunks} chunks to {peer}"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn hex_preview(data: &[u8]) -> String {
    let mut out = String::with_capacity(PREVIEW_BYTES * 3 + 3);
    for (i, byte) in data.iter().take(PREVIEW_BYTES).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    if data.len() > PREVIEW_BYTES {
        out.push_str(" ..");
    }
    out
}
