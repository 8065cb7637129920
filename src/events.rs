use serde::Serialize;
use std::time::Duration;

use crate::ping::{PingError, SenderId};

/// Session counters. Monotonic within a session except on an explicit reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkCounters {
    pub received: u32,
    pub missed: u32,
    pub signal_loss_events: u32,
    /// Accepted packets whose sequence did not advance the baseline.
    pub duplicates: u32,
}

impl LinkCounters {
    /// Percentage of expected packets that arrived. 0 when nothing is expected yet.
    pub fn success_rate(&self) -> f64 {
        let total = self.received as u64 + self.missed as u64;
        if total == 0 {
            0.0
        } else {
            self.received as f64 * 100.0 / total as f64
        }
    }
}

/// Everything the tracker tells its reporter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    WaitingForFirstPacket,
    FirstPacketReceived {
        sender: SenderId,
        seq: u32,
    },
    PacketsMissed {
        from: u32,
        to: u32,
        count: u32,
    },
    PacketRejected {
        error: PingError,
    },
    SignalLost {
        #[serde(with = "duration_ms")]
        silence: Duration,
        last_seq: u32,
    },
    SignalRestored {
        #[serde(with = "duration_ms")]
        silence: Duration,
        missed_during_loss: u32,
    },
    Heartbeat {
        counters: LinkCounters,
        success_rate: f64,
        sender: Option<SenderId>,
        last_seq: u32,
    },
    CountersReset,
    SessionComplete {
        counters: LinkCounters,
        success_rate: f64,
        #[serde(with = "duration_ms")]
        duration: Duration,
    },
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
