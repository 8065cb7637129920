use anyhow::Result;
use std::time::Duration;

use crate::events::TrackerEvent;
use crate::ping::SenderId;
use crate::status::LinkSnapshot;

#[cfg_attr(test, mockall::automock)]
pub trait PingTransport {
    /// Receive one datagram. Returns Ok(Some((sender, payload))) if one was pending,
    /// Ok(None) if nothing is waiting (wouldblock).
    fn recv_packet(&mut self) -> Result<Option<(SenderId, Vec<u8>)>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait MonotonicClock {
    /// Time since the clock's zero reference. Never goes backwards between resets.
    fn now(&self) -> Duration;

    /// Move the zero reference to the present. Default impl does nothing.
    fn reset(&mut self) {}
}

#[cfg_attr(test, mockall::automock)]
pub trait Reporter {
    fn report(&mut self, event: &TrackerEvent);

    /// On-demand statistics print.
    fn snapshot(&mut self, snapshot: &LinkSnapshot);

    fn help(&mut self) {}
}
