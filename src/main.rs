use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use signal_hook::flag;
use tracing_subscriber::EnvFilter;

use rumb::config::{self, process_identifier, DEFAULT_COUNT};
use rumb::{ChecksumMode, ConsoleReporter, LibcSocket, PingConfig, PingError, PingResult, Pinger};

/// Measure round-trip time to a host with ICMP echo requests.
#[derive(Parser, Debug)]
#[command(name = "rumb")]
#[command(version)]
#[command(about = "Measure round-trip time to a host with ICMP echo requests")]
pub struct Args {
    /// Target hostname or IPv4 address.
    #[arg(required = true)]
    pub host: String,

    /// Seconds to wait for each reply.
    #[arg(short = 'W', long, default_value = "1")]
    pub timeout: f64,

    /// Number of echo requests to send.
    #[arg(short, long, default_value_t = DEFAULT_COUNT)]
    pub count: u32,

    /// Seconds to pause after each probe.
    #[arg(short, long, default_value = "1")]
    pub interval: f64,

    /// ICMP identifier (defaults to the low 16 bits of the process id).
    #[arg(long)]
    pub ident: Option<u16>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    fn to_config(&self) -> PingResult<PingConfig> {
        let config = PingConfig {
            host: self.host.clone(),
            timeout: config::seconds("timeout", self.timeout)?,
            count: self.count,
            interval: config::seconds("interval", self.interval)?,
            identifier: self.ident.unwrap_or_else(process_identifier),
            checksum_mode: ChecksumMode::detect(),
        };
        config.validate()?;
        Ok(config)
    }
}

fn interrupt_flag() -> PingResult<Arc<AtomicBool>> {
    let term = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        flag::register(signal, Arc::clone(&term)).map_err(PingError::Signal)?;
    }
    Ok(term)
}

fn run(args: &Args) -> PingResult<()> {
    let config = args.to_config()?;
    let term = interrupt_flag()?;
    let mut pinger = Pinger::new(config, LibcSocket::open).interrupt_on(term);
    pinger.run(&mut ConsoleReporter)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
