//! Ping transmitter for exercising a `pingwatch` receiver.
//!
//! Sends one 9-byte ping record per interval. `--drop-every`/`--pause-at`
//! inject sequence gaps and silences so loss detection can be checked end to end.

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pingwatch::net::{self, UdpPingSender};

#[derive(Parser, Debug)]
#[command(author, version, about = "Send ping records to a pingwatch receiver", long_about = None)]
struct Args {
    /// Receiver address
    #[arg(short, long, default_value = "127.0.0.1:4210")]
    target: String,

    #[arg(short, long, default_value_t = 100)]
    interval_ms: u64,

    /// Stop after this many pings (0 = forever)
    #[arg(short, long, default_value_t = 0)]
    count: u32,

    #[arg(long, default_value_t = 1)]
    first_seq: u32,

    /// Skip (don't send) every Nth sequence number
    #[arg(long)]
    drop_every: Option<u32>,

    /// Go silent for --pause-ms once this sequence number is reached
    #[arg(long)]
    pause_at: Option<u32>,

    #[arg(long, default_value_t = 5_000)]
    pause_ms: u64,
}

fn main() -> Result<()> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let target = net::resolve(&args.target)?;
    let mut sender = UdpPingSender::new(target, args.first_seq)?;
    let interval = Duration::from_millis(args.interval_ms);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    info!("Sending pings to {} every {:?}", target, interval);

    let started = Instant::now();
    let mut sent = 0u32;
    let mut failed = 0u32;
    let mut paused = false;

    while running.load(Ordering::SeqCst) && (args.count == 0 || sent + failed < args.count) {
        let seq = sender.next_sequence();

        if !paused && args.pause_at == Some(seq) {
            paused = true;
            info!("Pausing {} ms at seq={}", args.pause_ms, seq);
            thread::sleep(Duration::from_millis(args.pause_ms));
        }

        if matches!(args.drop_every, Some(n) if n > 0 && seq % n == 0) {
            sender.skip(1);
        } else {
            let uptime_ms = started.elapsed().as_millis() as u32;
            let (seq, ok) = sender.send_next(uptime_ms);
            if ok {
                sent += 1;
            } else {
                failed += 1;
                warn!("Send FAILED (seq={})", seq);
            }
        }

        thread::sleep(interval);
    }

    info!("Done: {} sent, {} failed, next seq={}", sent, failed, sender.next_sequence());
    Ok(())
}
