use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::ping::{MAX_RECORD_LEN, PING_MAGIC, PING_RECORD_LEN};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub tracker: TrackerConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub signal_timeout_ms: u64,     // no ping for this long = signal lost
    pub heartbeat_interval_ms: u64,
    /// Fixed-count session. `None` = continuous monitoring, never completes.
    pub session: Option<SessionLimits>,
    pub reject_logging: RejectLogging,
    pub record_len: usize,
    pub magic: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
    /// Session ends once a sequence number >= this arrives.
    pub target_packets: u32,
    /// Session ends after this long without a valid ping.
    pub end_timeout_ms: u64,
}

/// What to do with malformed packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectLogging {
    /// Report each rejected packet.
    Log,
    /// Drop rejected packets silently.
    Quiet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub bind_addr: String,
    pub recv_buffer_bytes: Option<usize>,
    /// Upper bound on packets ingested per loop iteration.
    pub max_batch: usize,
    pub poll_interval_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            signal_timeout_ms: 3_000,
            heartbeat_interval_ms: 60_000,
            session: None,
            reject_logging: RejectLogging::Log,
            record_len: PING_RECORD_LEN,
            magic: PING_MAGIC,
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        SessionLimits {
            target_packets: 10_000,
            end_timeout_ms: 10_000,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            bind_addr: "0.0.0.0:4210".to_string(),
            recv_buffer_bytes: None,
            max_batch: 64,
            poll_interval_ms: 10,
        }
    }
}

impl TrackerConfig {
    pub fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.record_len < PING_RECORD_LEN {
            return Err(anyhow!(
                "record_len {} is shorter than the {}-byte ping layout",
                self.record_len,
                PING_RECORD_LEN
            ));
        }
        if self.record_len > MAX_RECORD_LEN {
            return Err(anyhow!(
                "record_len {} exceeds the {}-byte receive buffer",
                self.record_len,
                MAX_RECORD_LEN
            ));
        }
        if self.signal_timeout_ms == 0 {
            return Err(anyhow!("signal_timeout_ms must be non-zero"));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(anyhow!("heartbeat_interval_ms must be non-zero"));
        }
        if let Some(limits) = &self.session {
            if limits.end_timeout_ms == 0 {
                return Err(anyhow!("session.end_timeout_ms must be non-zero"));
            }
        }
        Ok(())
    }
}

impl SessionLimits {
    pub fn end_timeout(&self) -> Duration {
        Duration::from_millis(self.end_timeout_ms)
    }
}

impl MonitorConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: MonitorConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tracker.validate()?;
        if self.transport.max_batch == 0 {
            return Err(anyhow!("transport.max_batch must be non-zero"));
        }
        Ok(())
    }
}
