use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use linewire_endpoint::{Endpoint, EndpointConfig};

use crate::exit::{CliError, CliResult, INTERNAL, INTERRUPTED, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept peers one at a time and echo every frame back.
    Echo(EchoArgs),
    /// Dial a peer and send frames.
    Send(SendArgs),
    /// Accept a single peer and print the frames it sends.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConnArgs {
    /// Address: host:port for tcp/tcp4/tcp6, a socket path for unix.
    pub address: String,
    /// Transport protocol.
    #[arg(long, short = 'p', default_value = "tcp")]
    pub protocol: String,
    /// Read timeout on the connection (e.g. 5s, 500ms). Expiry ends the session.
    #[arg(long, value_name = "DURATION")]
    pub read_timeout: Option<String>,
    /// Write timeout on the connection (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub write_timeout: Option<String>,
}

impl ConnArgs {
    pub fn endpoint_config(&self) -> CliResult<EndpointConfig> {
        let mut config = EndpointConfig::default();
        if let Some(timeout) = &self.read_timeout {
            config = config.with_read_timeout(parse_duration(timeout)?);
        }
        if let Some(timeout) = &self.write_timeout {
            config = config.with_write_timeout(parse_duration(timeout)?);
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    #[command(flatten)]
    pub conn: ConnArgs,
    /// Stop after serving this many peers.
    #[arg(long)]
    pub peers: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub conn: ConnArgs,
    /// JSON payload, re-serialized onto a single line.
    #[arg(long, conflicts_with_all = ["data", "file", "stdin"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file", "stdin"])]
    pub data: Option<String>,
    /// Send each line of a file as its own frame.
    #[arg(long, conflicts_with_all = ["json", "data", "stdin"])]
    pub file: Option<PathBuf>,
    /// Send each line of standard input as its own frame.
    #[arg(long, conflicts_with_all = ["json", "data", "file"])]
    pub stdin: bool,
    /// Wait for one response frame and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the response when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Per-attempt connect timeout (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub connect_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub conn: ConnArgs,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// The endpoint Ctrl-C should close, if any.
///
/// While nothing is active (for example while blocked waiting for a peer),
/// Ctrl-C exits the process directly.
#[derive(Clone, Default)]
pub struct Interrupt {
    active: Arc<Mutex<Option<Arc<Endpoint>>>>,
    fired: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn install() -> CliResult<Self> {
        let interrupt = Self::default();
        let handler = interrupt.clone();
        ctrlc::set_handler(move || handler.trigger()).map_err(|err| {
            CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
        })?;
        Ok(interrupt)
    }

    /// Make `endpoint` the one closed on Ctrl-C.
    pub fn guard(&self, endpoint: Arc<Endpoint>) {
        *self.slot() = Some(endpoint);
    }

    pub fn release(&self) {
        self.slot().take();
    }

    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    fn trigger(&self) {
        self.fired.store(true, Ordering::SeqCst);
        match self.slot().as_ref() {
            Some(endpoint) => {
                tracing::info!("interrupted; closing endpoint");
                endpoint.close();
            }
            None => std::process::exit(INTERRUPTED),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<Endpoint>>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Human-readable remote address for output.
pub fn peer_label(endpoint: &Endpoint) -> String {
    endpoint
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
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
