use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use portal_frame::ScanBound;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod inspect;
pub mod replay;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a device and print framed units.
    Watch(WatchArgs),
    /// Frame an Annex-B file offline.
    Inspect(InspectArgs),
    /// Serve an Annex-B file over TCP to one client.
    Replay(ReplayArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Watch(args) => watch::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Start-code recognition at the end of the buffer.
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum ScanBoundArg {
    #[default]
    Inclusive,
    Conservative,
}

impl From<ScanBoundArg> for ScanBound {
    fn from(arg: ScanBoundArg) -> Self {
        match arg {
            ScanBoundArg::Inclusive => ScanBound::Inclusive,
            ScanBoundArg::Conservative => ScanBound::Conservative,
        }
    }
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Device IPv4 address.
    #[arg(long, env = "PORTAL_HOST")]
    pub host: String,
    /// Device TCP port.
    #[arg(long, env = "PORTAL_PORT", default_value = "2019")]
    pub port: u32,
    /// Exit after printing N units.
    #[arg(long)]
    pub count: Option<usize>,
    /// Give up if no unit arrives within this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Connect retry budget.
    #[arg(long, default_value = "200ms")]
    pub deadline: String,
    /// Bound on each receive wait; also bounds shutdown latency.
    #[arg(long, default_value = "1s")]
    pub poll_timeout: String,
    /// Start-code recognition at the end of the buffer.
    #[arg(long, value_enum, default_value_t = ScanBoundArg::Inclusive)]
    pub scan_bound: ScanBoundArg,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Annex-B file to frame ("-" reads stdin).
    pub path: PathBuf,
    /// Bytes per read.
    #[arg(long, default_value = "65536")]
    pub chunk_size: usize,
    /// Stop after N units.
    #[arg(long)]
    pub count: Option<usize>,
    /// Also print the final unit, which no start code terminates.
    #[arg(long)]
    pub flush: bool,
    /// Print only the totals.
    #[arg(long)]
    pub summary: bool,
    /// Start-code recognition at the end of the buffer.
    #[arg(long, value_enum, default_value_t = ScanBoundArg::Inclusive)]
    pub scan_bound: ScanBoundArg,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Annex-B file to serve.
    pub path: PathBuf,
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Port to listen on (0 picks a free port).
    #[arg(long, default_value = "0")]
    pub port: u16,
    /// Bytes per write.
    #[arg(long, default_value = "4096")]
    pub chunk_size: usize,
    /// Pause between writes (e.g. 5ms). Omit to write back to back.
    #[arg(long)]
    pub interval: Option<String>,
    /// Keep the connection open after the file is sent, until the client
    /// disconnects.
    #[arg(long)]
    pub linger: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
