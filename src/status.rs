use serde::{Deserialize, Serialize};
use std::fmt;

use crate::events::LinkCounters;
use crate::ping::SenderId;

/// Link state as shown to the operator.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    /// No ping received yet this session
    Waiting,
    Ok,
    Lost,
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalStatus::Waiting => "WAITING",
            SignalStatus::Ok => "OK",
            SignalStatus::Lost => "LOST",
        })
    }
}

/// Point-in-time view of the tracker, returned by `DiagnosticTracker::snapshot`.
///
/// Safe to take at any time, including after the session has completed.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct LinkSnapshot {
    pub counters: LinkCounters,

    /// received / (received + missed) * 100
    pub success_rate: f64,

    pub status: SignalStatus,

    /// Transmitter identity, once the first valid ping has been seen
    pub sender: Option<SenderId>,

    /// Highest accepted sequence number (None before the first ping)
    pub last_sequence: Option<u32>,

    /// Transmitter uptime carried by the last accepted ping
    pub last_uptime_ms: Option<u32>,

    pub session_complete: bool,
}
