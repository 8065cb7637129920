//! Reporters: turn tracker events into operator-facing output.
//!
//! - [`LogReporter`]: human-readable log lines and boxed tables
//! - [`JsonReporter`]: one JSON object per line, for piping into other tools

use log::{info, warn};
use serde::Serialize;
use std::io::Write;
use std::time::Instant;

use crate::clock::format_uptime;
use crate::events::TrackerEvent;
use crate::status::LinkSnapshot;
use crate::traits::Reporter;

const TABLE_WIDTH: usize = 56;

/// Logs events through the `log` facade, prefixed with receiver uptime.
pub struct LogReporter {
    started: Instant,
}

impl LogReporter {
    pub fn new() -> Self {
        LogReporter {
            started: Instant::now(),
        }
    }

    fn uptime(&self) -> String {
        format_uptime(self.started.elapsed())
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for LogReporter {
    fn report(&mut self, event: &TrackerEvent) {
        let up = self.uptime();
        match event {
            TrackerEvent::PacketRejected { error } => warn!("[{}] WARN: {}", up, error),
            other => {
                for line in render_event(other).lines() {
                    info!("[{}] {}", up, line);
                }
            }
        }
    }

    fn snapshot(&mut self, snapshot: &LinkSnapshot) {
        for line in render_stats_table(snapshot, &self.uptime()).lines() {
            info!("{}", line);
        }
    }

    fn help(&mut self) {
        for line in render_help().lines() {
            info!("{}", line);
        }
    }
}

/// One event as text. Multi-line for heartbeats and summaries.
pub fn render_event(event: &TrackerEvent) -> String {
    match event {
        TrackerEvent::WaitingForFirstPacket => "Waiting for first ping from transmitter...".to_string(),
        TrackerEvent::FirstPacketReceived { sender, seq } => {
            format!("First ping received from {} (seq={})", sender, seq)
        }
        TrackerEvent::PacketsMissed { from, to, count } => {
            format!("MISSED {} packet(s) (seq {} -> {})", count, from, to)
        }
        TrackerEvent::PacketRejected { error } => format!("Rejected packet: {}", error),
        TrackerEvent::SignalLost { silence, last_seq } => format!(
            "*** SIGNAL LOST *** No ping for {} ms (last seq={})",
            silence.as_millis(),
            last_seq
        ),
        TrackerEvent::SignalRestored { silence, missed_during_loss } => {
            let mut line = format!("*** SIGNAL RESTORED *** after {} ms", silence.as_millis());
            if *missed_during_loss > 0 {
                line.push_str(&format!(" (missed {} packets)", missed_during_loss));
            }
            line
        }
        TrackerEvent::Heartbeat { counters, success_rate, sender, last_seq } => {
            let mut text = format!(
                "=== HEARTBEAT === Receiver online\n    Received: {} | Missed: {} | Loss events: {} | Success: {:.1}%",
                counters.received, counters.missed, counters.signal_loss_events, success_rate
            );
            if let Some(sender) = sender {
                text.push_str(&format!("\n    Transmitter: {} | Last seq: {}", sender, last_seq));
            }
            text
        }
        TrackerEvent::CountersReset => "Counters reset".to_string(),
        TrackerEvent::SessionComplete { counters, success_rate, duration } => format!(
            "=== SESSION COMPLETE === after {}\n    Received: {} | Missed: {} | Loss events: {} | Success: {:.2}%",
            format_uptime(*duration),
            counters.received,
            counters.missed,
            counters.signal_loss_events,
            success_rate
        ),
    }
}

fn table_border(left: char, right: char) -> String {
    format!("{}{}{}", left, "═".repeat(TABLE_WIDTH), right)
}

fn table_row(label: &str, value: &str) -> String {
    let content = format!("  {:<20}{}", label, value);
    format!("║{:<width$}║", content, width = TABLE_WIDTH)
}

fn table_title(title: &str) -> String {
    format!("║{:^width$}║", title, width = TABLE_WIDTH)
}

/// Boxed statistics table for the `S` command.
pub fn render_stats_table(snapshot: &LinkSnapshot, receiver_uptime: &str) -> String {
    let c = &snapshot.counters;
    let mut rows = vec![
        table_border('╔', '╗'),
        table_title("DIAGNOSTIC STATISTICS"),
        table_border('╠', '╣'),
        table_row("Receiver uptime:", receiver_uptime),
        table_row("Pings received:", &c.received.to_string()),
        table_row("Pings missed:", &c.missed.to_string()),
        table_row("Late/duplicate:", &c.duplicates.to_string()),
        table_row("Signal loss events:", &c.signal_loss_events.to_string()),
        table_row("Success rate:", &format!("{:.2}%", snapshot.success_rate)),
        table_border('╠', '╣'),
    ];

    match (snapshot.sender, snapshot.last_sequence) {
        (Some(sender), Some(seq)) => {
            rows.push(table_row("Transmitter:", &sender.to_string()));
            rows.push(table_row("Last sequence:", &seq.to_string()));
        }
        _ => rows.push(table_row("Transmitter:", "Not yet detected")),
    }
    rows.push(table_row("Signal status:", &snapshot.status.to_string()));
    if snapshot.session_complete {
        rows.push(table_row("Session:", "COMPLETE"));
    }
    rows.push(table_border('╚', '╝'));
    rows.join("\n")
}

pub fn render_help() -> String {
    [
        table_border('╔', '╗'),
        table_title("COMMANDS"),
        table_border('╠', '╣'),
        table_row("S", "Print statistics summary"),
        table_row("R", "Reset all counters"),
        table_row("N", "Start a new session"),
        table_row("H / ?", "Print this help message"),
        table_border('╚', '╝'),
    ]
    .join("\n")
}

#[derive(Serialize)]
struct JsonLine<'a, T: Serialize> {
    logged_at: String,
    #[serde(flatten)]
    body: JsonBody<'a, T>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum JsonBody<'a, T: Serialize> {
    Event(&'a T),
    Snapshot(&'a T),
}

/// Newline-delimited JSON output. Write failures are logged and otherwise ignored.
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        JsonReporter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line<T: Serialize>(&mut self, body: JsonBody<'_, T>) {
        let line = JsonLine {
            logged_at: chrono::Local::now().to_rfc3339(),
            body,
        };
        let result = serde_json::to_writer(&mut self.out, &line)
            .map_err(std::io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!("JSON report write failed: {}", e);
        }
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn report(&mut self, event: &TrackerEvent) {
        self.write_line(JsonBody::Event(event));
    }

    fn snapshot(&mut self, snapshot: &LinkSnapshot) {
        self.write_line(JsonBody::Snapshot(snapshot));
    }
}
