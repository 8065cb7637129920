//! Diagnostic Tracker - ping accounting state machine
//!
//! ```text
//! WAITING_FIRST_PACKET -> ACTIVE <-> SIGNAL_LOST -> COMPLETE
//! ```
//!
//! `ingest` is driven by packet arrival, `poll` by a periodic tick. Both run to
//! completion on the caller's thread and never block. All output goes to the
//! `Reporter`; the tracker itself never prints.

use log::debug;
use std::time::Duration;

use crate::config::{RejectLogging, TrackerConfig};
use crate::events::{LinkCounters, TrackerEvent};
use crate::ping::{PingError, PingRecord, SenderId};
use crate::status::{LinkSnapshot, SignalStatus};
use crate::traits::Reporter;

pub struct DiagnosticTracker<R: Reporter> {
    config: TrackerConfig,
    reporter: R,

    // Transmitter identity (first writer wins)
    expected_sender: Option<SenderId>,

    // Sequence tracking
    last_sequence: u32,
    first_packet_received: bool,
    last_uptime_ms: Option<u32>,

    // Monotonic timestamps
    last_packet_at: Duration,
    session_start_at: Duration,
    last_heartbeat_at: Duration,

    signal_lost: bool,

    // Completion
    session_complete: bool,
    completed_at: Option<Duration>,
    final_counters: LinkCounters,
    summary_emitted: bool,

    counters: LinkCounters,
}

impl<R: Reporter> DiagnosticTracker<R> {
    /// Create a tracker and start its first session.
    pub fn new(config: TrackerConfig, reporter: R) -> Self {
        let mut tracker = DiagnosticTracker {
            config,
            reporter,
            expected_sender: None,
            last_sequence: 0,
            first_packet_received: false,
            last_uptime_ms: None,
            last_packet_at: Duration::ZERO,
            session_start_at: Duration::ZERO,
            last_heartbeat_at: Duration::ZERO,
            signal_lost: false,
            session_complete: false,
            completed_at: None,
            final_counters: LinkCounters::default(),
            summary_emitted: false,
            counters: LinkCounters::default(),
        };
        tracker.start_session();
        tracker
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Clear everything, including the sender identity, and wait for a new first ping.
    pub fn start_session(&mut self) {
        self.expected_sender = None;
        self.last_sequence = 0;
        self.first_packet_received = false;
        self.last_uptime_ms = None;
        self.last_packet_at = Duration::ZERO;
        self.session_start_at = Duration::ZERO;
        self.last_heartbeat_at = Duration::ZERO;
        self.signal_lost = false;
        self.session_complete = false;
        self.completed_at = None;
        self.final_counters = LinkCounters::default();
        self.summary_emitted = false;
        self.counters = LinkCounters::default();

        self.reporter.report(&TrackerEvent::WaitingForFirstPacket);
    }

    /// Zero the counters but keep watching: the gap baseline, sender identity
    /// and link state survive.
    pub fn reset_counters(&mut self) {
        self.counters = LinkCounters::default();
        self.reporter.report(&TrackerEvent::CountersReset);
    }

    // ========================================================================
    // PACKET PATH
    // ========================================================================

    /// Account for one received datagram.
    ///
    /// Rejected packets leave every counter and timestamp untouched. Packets
    /// arriving after the session completed are dropped without error.
    pub fn ingest(&mut self, sender: SenderId, payload: &[u8], now: Duration) -> Result<(), PingError> {
        if self.session_complete {
            return Ok(());
        }

        let ping = match PingRecord::parse(payload, self.config.record_len, self.config.magic) {
            Ok(p) => p,
            Err(error) => {
                if self.config.reject_logging == RejectLogging::Log {
                    self.reporter.report(&TrackerEvent::PacketRejected { error });
                }
                return Err(error);
            }
        };
        let seq = ping.sequence;

        if self.expected_sender.is_none() {
            self.expected_sender = Some(sender);
        }

        if self.signal_lost {
            let silence = now.saturating_sub(self.last_packet_at);
            let expected = self.last_sequence as u64 + 1;
            let missed_during_loss = (seq as u64).saturating_sub(expected) as u32;
            self.reporter.report(&TrackerEvent::SignalRestored { silence, missed_during_loss });
            self.signal_lost = false;
        }

        if self.first_packet_received {
            if seq as u64 > self.last_sequence as u64 + 1 {
                let missed = seq - self.last_sequence - 1;
                self.counters.missed = self.counters.missed.saturating_add(missed);
                self.reporter.report(&TrackerEvent::PacketsMissed {
                    from: self.last_sequence,
                    to: seq,
                    count: missed,
                });
            } else if seq <= self.last_sequence {
                debug!("Late/duplicate ping seq={} (last={})", seq, self.last_sequence);
                self.counters.duplicates = self.counters.duplicates.saturating_add(1);
            }
        }

        if !self.first_packet_received || seq > self.last_sequence {
            self.last_sequence = seq;
        }
        self.last_packet_at = now;
        self.last_uptime_ms = Some(ping.uptime_ms);
        self.counters.received = self.counters.received.saturating_add(1);

        if !self.first_packet_received {
            self.first_packet_received = true;
            self.session_start_at = now;
            self.last_heartbeat_at = now;
            self.reporter.report(&TrackerEvent::FirstPacketReceived { sender, seq });
        }

        if let Some(limits) = self.config.session {
            if seq >= limits.target_packets {
                debug!("Session target {} reached at seq={}", limits.target_packets, seq);
                self.complete(now);
            }
        }

        Ok(())
    }

    // ========================================================================
    // TIME PATH
    // ========================================================================

    /// Periodic tick: completion summary, end-of-session timeout, loss
    /// detection and heartbeat, in that order.
    pub fn poll(&mut self, now: Duration) {
        if self.session_complete {
            if !self.summary_emitted {
                self.summary_emitted = true;
                let completed_at = self.completed_at.unwrap_or(now);
                let counters = self.final_counters;
                self.reporter.report(&TrackerEvent::SessionComplete {
                    counters,
                    success_rate: counters.success_rate(),
                    duration: completed_at.saturating_sub(self.session_start_at),
                });
            }
            return;
        }

        if !self.first_packet_received {
            return;
        }

        let silence = now.saturating_sub(self.last_packet_at);

        if let Some(limits) = self.config.session {
            if silence >= limits.end_timeout() {
                debug!("No ping for {:?}, ending session", silence);
                self.complete(now);
                return;
            }
        }

        if !self.signal_lost && silence >= self.config.signal_timeout() {
            self.signal_lost = true;
            self.counters.signal_loss_events = self.counters.signal_loss_events.saturating_add(1);
            self.reporter.report(&TrackerEvent::SignalLost {
                silence,
                last_seq: self.last_sequence,
            });
        }

        if now.saturating_sub(self.last_heartbeat_at) >= self.config.heartbeat_interval() {
            self.last_heartbeat_at = now;
            self.reporter.report(&TrackerEvent::Heartbeat {
                counters: self.counters,
                success_rate: self.counters.success_rate(),
                sender: self.expected_sender,
                last_seq: self.last_sequence,
            });
        }
    }

    fn complete(&mut self, now: Duration) {
        self.session_complete = true;
        self.completed_at = Some(now);
        // Summary is built from these, not from live counters
        self.final_counters = self.counters;
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            counters: self.counters,
            success_rate: self.counters.success_rate(),
            status: self.signal_status(),
            sender: self.expected_sender,
            last_sequence: self.first_packet_received.then_some(self.last_sequence),
            last_uptime_ms: self.last_uptime_ms,
            session_complete: self.session_complete,
        }
    }

    pub fn signal_status(&self) -> SignalStatus {
        if self.signal_lost {
            SignalStatus::Lost
        } else if self.first_packet_received {
            SignalStatus::Ok
        } else {
            SignalStatus::Waiting
        }
    }

    pub fn counters(&self) -> LinkCounters {
        self.counters
    }

    pub fn last_sequence(&self) -> u32 {
        self.last_sequence
    }

    pub fn sender(&self) -> Option<SenderId> {
        self.expected_sender
    }

    pub fn is_signal_lost(&self) -> bool {
        self.signal_lost
    }

    pub fn is_complete(&self) -> bool {
        self.session_complete
    }

    /// True once the completion summary has gone out.
    pub fn summary_emitted(&self) -> bool {
        self.summary_emitted
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }
}

// ============================================================================
// TESTS
// ============================================================================
