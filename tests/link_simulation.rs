use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use pingwatch::config::{MonitorConfig, SessionLimits};
use pingwatch::events::TrackerEvent;
use pingwatch::monitor::LinkMonitor;
use pingwatch::ping::{PingRecord, SenderId};
use pingwatch::status::{LinkSnapshot, SignalStatus};
use pingwatch::traits::{MonotonicClock, PingTransport, Reporter};

// --- Simulated radio link ---

const TX: SenderId = SenderId([0x24, 0x0A, 0xC4, 0x11, 0x22, 0x33]);
const PING_INTERVAL_MS: u64 = 100;
const TICK_MS: u64 = 10;

struct Link {
    now_ms: u64,
    next_seq: u32,
    next_send_ms: u64,
    rng: StdRng,
    loss_probability: f64,
    /// (start_ms, end_ms) windows where nothing gets through
    outages: Vec<(u64, u64)>,
    /// Transmitter stops after this sequence number
    last_seq: u32,
    inbox: VecDeque<Vec<u8>>,
    sent: u32,
    dropped: u32,
}

impl Link {
    fn advance(&mut self, dt_ms: u64) {
        self.now_ms += dt_ms;
        while self.next_send_ms <= self.now_ms && self.next_seq <= self.last_seq {
            let in_outage = self
                .outages
                .iter()
                .any(|(start, end)| self.next_send_ms >= *start && self.next_send_ms < *end);
            let lost = in_outage || self.rng.random_bool(self.loss_probability);

            self.sent += 1;
            if lost {
                self.dropped += 1;
            } else {
                let record = PingRecord::new(self.next_seq, self.next_send_ms as u32);
                self.inbox.push_back(record.encode().to_vec());
            }
            self.next_seq += 1;
            self.next_send_ms += PING_INTERVAL_MS;
        }
    }
}

#[derive(Clone)]
struct SimTransport(Rc<RefCell<Link>>);

impl PingTransport for SimTransport {
    fn recv_packet(&mut self) -> Result<Option<(SenderId, Vec<u8>)>> {
        Ok(self.0.borrow_mut().inbox.pop_front().map(|p| (TX, p)))
    }
}

struct SimClock(Rc<RefCell<Link>>);

impl MonotonicClock for SimClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.0.borrow().now_ms)
    }
}

#[derive(Clone, Default)]
struct EventLog(Rc<RefCell<Vec<TrackerEvent>>>);

impl Reporter for EventLog {
    fn report(&mut self, event: &TrackerEvent) {
        self.0.borrow_mut().push(event.clone());
    }

    fn snapshot(&mut self, _snapshot: &LinkSnapshot) {}
}

impl EventLog {
    fn count(&self, pred: impl Fn(&TrackerEvent) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| pred(e)).count()
    }
}

// --- The Test Runner ---

struct Outcome {
    snapshot: LinkSnapshot,
    events: EventLog,
    sent: u32,
    dropped: u32,
}

fn run_simulation(
    config: MonitorConfig,
    loss_probability: f64,
    outages: Vec<(u64, u64)>,
    last_seq: u32,
    duration_ms: u64,
) -> Outcome {
    let link = Rc::new(RefCell::new(Link {
        now_ms: 0,
        next_seq: 1,
        next_send_ms: 0,
        rng: StdRng::seed_from_u64(0x5EED),
        loss_probability,
        outages,
        last_seq,
        inbox: VecDeque::new(),
        sent: 0,
        dropped: 0,
    }));

    let events = EventLog::default();
    let mut monitor = LinkMonitor::new(
        SimTransport(link.clone()),
        SimClock(link.clone()),
        events.clone(),
        config,
    );

    // Deliver t=0 before the first tick
    link.borrow_mut().advance(0);
    for _ in 0..duration_ms / TICK_MS {
        monitor.process_loop_iteration().unwrap();
        link.borrow_mut().advance(TICK_MS);
    }
    monitor.process_loop_iteration().unwrap();

    let (sent, dropped) = {
        let l = link.borrow();
        (l.sent, l.dropped)
    };
    Outcome {
        snapshot: monitor.snapshot(),
        events,
        sent,
        dropped,
    }
}

#[test]
fn test_clean_link_has_full_success() {
    let out = run_simulation(MonitorConfig::default(), 0.0, vec![], u32::MAX, 30_000);

    assert_eq!(out.snapshot.counters.missed, 0);
    assert_eq!(out.snapshot.counters.signal_loss_events, 0);
    assert_eq!(out.snapshot.counters.received, out.sent);
    assert!((out.snapshot.success_rate - 100.0).abs() < 1e-9);
    assert_eq!(out.snapshot.status, SignalStatus::Ok);
}

#[test]
fn test_random_loss_is_fully_accounted() {
    let out = run_simulation(MonitorConfig::default(), 0.05, vec![], u32::MAX, 60_000);

    let c = out.snapshot.counters;
    assert!(out.dropped > 0, "simulation should drop something at 5%");
    // Drops after the last delivered ping are not yet visible as a gap
    let trailing = out.sent - (c.received + c.missed);
    assert!(trailing < 10, "unaccounted tail too long: {}", trailing);
    assert_eq!(c.missed + trailing, out.dropped);
    assert!(out.snapshot.success_rate > 90.0);
    assert_eq!(c.signal_loss_events, 0);
}

#[test]
fn test_outage_triggers_one_loss_and_restore() {
    // 5 s outage starting at t=10 s
    let out = run_simulation(MonitorConfig::default(), 0.0, vec![(10_000, 15_000)], u32::MAX, 30_000);

    assert_eq!(out.snapshot.counters.signal_loss_events, 1);
    assert_eq!(out.snapshot.counters.missed, 50);
    assert_eq!(
        out.events.count(|e| matches!(e, TrackerEvent::SignalLost { last_seq: 100, .. })),
        1
    );
    assert_eq!(
        out.events.count(|e| matches!(
            e,
            TrackerEvent::SignalRestored { missed_during_loss: 50, .. }
        )),
        1
    );
    assert_eq!(out.snapshot.status, SignalStatus::Ok);
}

#[test]
fn test_fixed_session_completes_on_target() {
    let mut config = MonitorConfig::default();
    config.tracker.session = Some(SessionLimits { target_packets: 200, end_timeout_ms: 10_000 });

    let out = run_simulation(config, 0.0, vec![], 250, 60_000);

    assert!(out.snapshot.session_complete);
    assert_eq!(out.snapshot.counters.received, 200);
    assert_eq!(out.snapshot.last_sequence, Some(200));
    assert_eq!(
        out.events.count(|e| matches!(e, TrackerEvent::SessionComplete { .. })),
        1
    );
}

#[test]
fn test_fixed_session_ends_on_idle_when_transmitter_stops_early() {
    let mut config = MonitorConfig::default();
    config.tracker.session = Some(SessionLimits { target_packets: 10_000, end_timeout_ms: 10_000 });

    // Transmitter gives up at seq 100 (t=9.9 s)
    let out = run_simulation(config, 0.0, vec![], 100, 40_000);

    assert!(out.snapshot.session_complete);
    assert_eq!(out.snapshot.counters.received, 100);
    assert_eq!(out.snapshot.counters.signal_loss_events, 1);
    let summary = out
        .events
        .0
        .borrow()
        .iter()
        .find_map(|e| match e {
            TrackerEvent::SessionComplete { duration, .. } => Some(*duration),
            _ => None,
        })
        .expect("no summary");
    // First ping at 0, last at 9.9 s, idle timeout 10 s
    assert_eq!(summary, Duration::from_millis(19_900));
}

#[test]
fn test_heartbeats_follow_interval() {
    let mut config = MonitorConfig::default();
    config.tracker.heartbeat_interval_ms = 5_000;

    let out = run_simulation(config, 0.0, vec![], u32::MAX, 30_000);
    let beats = out.events.count(|e| matches!(e, TrackerEvent::Heartbeat { .. }));
    assert_eq!(beats, 6);
}
