use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{Receiver, TryRecvError};
use log::{error, info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pingwatch::clock::InstantClock;
use pingwatch::command::Command;
use pingwatch::config::{MonitorConfig, RejectLogging};
use pingwatch::monitor::LinkMonitor;
use pingwatch::net::{self, UdpPingTransport};
use pingwatch::report::{JsonReporter, LogReporter};
use pingwatch::traits::Reporter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file (missing fields use defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to receive pings on
    #[arg(short, long)]
    bind: Option<String>,

    /// End the session once this sequence number arrives
    #[arg(long)]
    target: Option<u32>,

    /// With --target: end the session after this long without pings
    #[arg(long)]
    end_timeout_ms: Option<u64>,

    #[arg(long)]
    signal_timeout_ms: Option<u64>,

    #[arg(long)]
    heartbeat_ms: Option<u64>,

    /// Drop malformed packets without logging them
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Emit events as JSON lines on stdout instead of log lines
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Exit after the session summary has been reported
    #[arg(long, default_value_t = false)]
    exit_on_complete: bool,

    /// Do not read keystroke commands from stdin
    #[arg(long, default_value_t = false)]
    no_commands: bool,
}

fn build_config(args: &Args) -> Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };

    if let Some(bind) = &args.bind {
        config.transport.bind_addr = bind.clone();
    }
    if let Some(target) = args.target {
        let mut limits = config.tracker.session.unwrap_or_default();
        limits.target_packets = target;
        config.tracker.session = Some(limits);
    }
    if let Some(ms) = args.end_timeout_ms {
        match config.tracker.session.as_mut() {
            Some(limits) => limits.end_timeout_ms = ms,
            None => warn!("--end-timeout-ms has no effect without --target"),
        }
    }
    if let Some(ms) = args.signal_timeout_ms {
        config.tracker.signal_timeout_ms = ms;
    }
    if let Some(ms) = args.heartbeat_ms {
        config.tracker.heartbeat_interval_ms = ms;
    }
    if args.quiet {
        config.tracker.reject_logging = RejectLogging::Quiet;
    }

    config.validate()?;
    Ok(config)
}

fn spawn_command_reader() -> Receiver<Command> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            for cmd in Command::parse_line(&line) {
                if tx.send(cmd).is_err() {
                    return;
                }
            }
        }
    });
    rx
}

fn run<R: Reporter>(
    config: MonitorConfig,
    reporter: R,
    args: &Args,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let bind = net::resolve(&config.transport.bind_addr)?;
    let transport = UdpPingTransport::bind(bind, config.transport.recv_buffer_bytes)?;
    let poll_interval = Duration::from_millis(config.transport.poll_interval_ms);

    let commands = if args.no_commands {
        None
    } else {
        info!("Commands: S=stats, R=reset, N=new session, H=help (then Enter)");
        Some(spawn_command_reader())
    };

    let mut monitor = LinkMonitor::new(transport, InstantClock::new(), reporter, config);

    while running.load(Ordering::SeqCst) {
        if let Err(e) = monitor.process_loop_iteration() {
            warn!("Error in loop: {}", e);
        }

        if let Some(rx) = &commands {
            loop {
                match rx.try_recv() {
                    Ok(cmd) => monitor.handle_command(cmd),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }

        if args.exit_on_complete && monitor.is_finished() {
            info!("Session complete, exiting.");
            break;
        }

        thread::sleep(poll_interval);
    }

    if monitor.rejected_count() > 0 {
        info!("Rejected {} malformed packet(s)", monitor.rejected_count());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down...");
        r.store(false, Ordering::SeqCst);
    })?;

    if args.json {
        run(config, JsonReporter::new(std::io::stdout()), &args, running)?;
    } else {
        run(config, LogReporter::new(), &args, running)?;
    }

    info!("Exiting.");
    Ok(())
}
