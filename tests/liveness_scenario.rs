//! End-to-end timing scenarios driven by a virtual clock.
//!
//! A recording connection owns a reliable send buffer and logs every
//! callback together with the virtual time it happened at. The timers are
//! stepped from one deadline to the next, so every callback lands exactly on
//! its deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reliant_protocol::prelude::*;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Nak(SequenceNumber),
    Heartbeat,
    Resend(SequenceNumber),
    Timeout,
    Warning,
    Lost,
    Regained,
}

struct Connection {
    now: Instant,
    opening: bool,
    buffer: SenderBuffer,
    events: Vec<(Duration, Event)>,
    start: Instant,
}

impl Connection {
    fn new(start: Instant) -> Self {
        Self {
            now: start,
            opening: true,
            buffer: SenderBuffer::new(64 * 1024),
            events: Vec::new(),
            start,
        }
    }

    fn record(&mut self, event: Event) {
        let at = self.now.duration_since(self.start);
        self.events.push((at, event));
    }

    fn times_of(&self, event: &Event) -> Vec<Duration> {
        self.events
            .iter()
            .filter(|(_, e)| e == event)
            .map(|(at, _)| *at)
            .collect()
    }

    fn count(&self, event: &Event) -> usize {
        self.times_of(event).len()
    }
}

impl ConnectionDelegate for Connection {
    fn enqueue_nak(&mut self, seq: SequenceNumber) {
        self.record(Event::Nak(seq));
    }

    fn tick(&mut self, _now: Instant) -> bool {
        false
    }

    fn enqueue_heartbeat(&mut self) {
        self.record(Event::Heartbeat);
    }

    fn rto_timeout(&mut self, now: Instant, rto_at_schedule: Duration) {
        let mut resent = Vec::new();
        self.buffer
            .each_current_message(now, rto_at_schedule, |_, message| {
                resent.push(message.sequence_number())
            })
            .unwrap();
        for seq in resent {
            self.record(Event::Resend(seq));
        }
    }

    fn connection_timeout(&mut self) {
        self.record(Event::Timeout);
    }

    fn connection_lost(&mut self) {
        self.record(Event::Lost);
    }

    fn connection_regained(&mut self) {
        self.record(Event::Regained);
    }

    fn connection_warning(&mut self) {
        self.record(Event::Warning);
    }

    fn is_opening(&self) -> bool {
        self.opening
    }

    fn sender_buffer_is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn scenario_config() -> Arc<SocketConfig> {
    let config = SocketConfig::new()
        .with_initial_rto(ms(100))
        .with_heartbeat_frequency(2.0)
        .with_heartbeats_before_connection_warning(2.0)
        .with_connection_timeout(ms(3000))
        .with_tick_frequency(100.0);
    config.validate().unwrap();
    Arc::new(config)
}

/// Fire every timer up to and including `end`, one deadline at a time.
fn run_until(timers: &mut ConnTimers, connection: &mut Connection, end: Instant) {
    while let Some(deadline) = timers.next_deadline() {
        if deadline > end {
            break;
        }
        connection.now = deadline;
        timers.advance(deadline, connection).unwrap();
    }
    connection.now = end;
}

#[test]
fn test_idle_connection_warns_then_is_lost() {
    let start = Instant::now();
    let mut connection = Connection::new(start);
    let mut timers = ConnTimers::with_queue(scenario_config(), start).unwrap();
    assert_eq!(timers.rto(), ms(100));

    // Nothing happens while the handshake is in progress.
    run_until(&mut timers, &mut connection, start + ms(1000));
    assert!(connection.events.is_empty());
    assert_eq!(timers.liveness_state(), LivenessState::Opening);

    connection.opening = false;
    timers.connection_opened(start + ms(1000)).unwrap();
    run_until(&mut timers, &mut connection, start + ms(5000));

    let heartbeats = connection.times_of(&Event::Heartbeat);
    assert_eq!(heartbeats.first(), Some(&ms(1500)));
    assert_eq!(connection.times_of(&Event::Warning), vec![ms(2000)]);
    assert_eq!(connection.times_of(&Event::Lost), vec![ms(4000)]);
    assert!(timers.issued_connection_warning());
    assert_eq!(timers.liveness_state(), LivenessState::Lost);

    // Nothing arrived, so nothing was NAKed or timed out.
    assert!(!connection
        .events
        .iter()
        .any(|(_, e)| matches!(e, Event::Nak(_) | Event::Timeout)));
}

#[test]
fn test_lost_connection_is_regained_once() {
    let start = Instant::now();
    let mut connection = Connection::new(start);
    connection.opening = false;
    let mut timers = ConnTimers::with_queue(scenario_config(), start).unwrap();
    timers.connection_opened(start).unwrap();

    run_until(&mut timers, &mut connection, start + ms(3500));
    assert_eq!(connection.count(&Event::Lost), 1);

    let now = start + ms(3600);
    connection.now = now;
    timers.got_packet(&PacketHeader::new(1), now, &mut connection).unwrap();
    assert_eq!(timers.liveness_state(), LivenessState::Normal);
    assert!(!timers.issued_connection_warning());

    timers.got_packet(&PacketHeader::new(2), now, &mut connection).unwrap();
    run_until(&mut timers, &mut connection, now + ms(500));
    assert_eq!(connection.count(&Event::Regained), 1);
    assert_eq!(connection.count(&Event::Lost), 1);
}

#[test]
fn test_handshake_that_never_completes_times_out() {
    let start = Instant::now();
    let mut connection = Connection::new(start);
    let config = SocketConfig::new().with_initial_connection_timeout(ms(2500));
    let mut timers = ConnTimers::with_queue(Arc::new(config), start).unwrap();

    run_until(&mut timers, &mut connection, start + ms(30_000));
    assert_eq!(connection.events, vec![(ms(2500), Event::Timeout)]);
    assert!(timers.next_deadline().is_none());
}

#[test]
fn test_missing_packet_is_naked_until_it_arrives() {
    let start = Instant::now();
    let mut connection = Connection::new(start);
    connection.opening = false;
    let mut timers = ConnTimers::with_queue(scenario_config(), start).unwrap();
    timers.connection_opened(start).unwrap();

    for seq in [1, 2, 4, 5] {
        timers.got_packet(&PacketHeader::new(seq), start, &mut connection).unwrap();
    }
    assert!(timers.loss_list().contains(3));

    run_until(&mut timers, &mut connection, start + ms(260));
    // First requested after an RTO, then once per NAK interval while missing.
    assert_eq!(
        connection.times_of(&Event::Nak(3)),
        vec![ms(100), ms(150), ms(200), ms(250)]
    );

    let now = start + ms(260);
    timers.got_packet(&PacketHeader::new(3), now, &mut connection).unwrap();
    run_until(&mut timers, &mut connection, start + ms(1000));
    assert_eq!(connection.count(&Event::Nak(3)), 4);
    assert!(timers.loss_list().is_empty());
}

#[test]
fn test_unacknowledged_message_is_retransmitted() {
    let start = Instant::now();
    let mut connection = Connection::new(start);
    connection.opening = false;
    let mut timers = ConnTimers::with_queue(scenario_config(), start).unwrap();
    timers.connection_opened(start).unwrap();

    connection
        .buffer
        .register_reliable_message(Arc::new(Message::new(0, 7, b"state".to_vec())), start)
        .unwrap();
    timers.update_rto_timeout(start, &mut connection).unwrap();

    run_until(&mut timers, &mut connection, start + ms(250));
    assert_eq!(connection.times_of(&Event::Resend(7)), vec![ms(100), ms(200)]);

    connection.buffer.deregister_reliable_messages(0, 7).unwrap();
    run_until(&mut timers, &mut connection, start + ms(600));
    assert_eq!(connection.count(&Event::Resend(7)), 2);
}
