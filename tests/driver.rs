//! Tokio driver tests on a paused clock.
//!
//! The runtime auto-advances virtual time whenever every task is idle, so
//! seconds of protocol time pass instantly and deterministically.

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::time::{Duration, Instant};

use reliant_protocol::prelude::*;

#[derive(Debug, Default)]
struct Recorder {
    buffered: bool,
    heartbeats: usize,
    naks: Vec<SequenceNumber>,
    rto_timeouts: usize,
    warnings: usize,
    lost: usize,
    regained: usize,
}

impl ConnectionDelegate for Recorder {
    fn enqueue_nak(&mut self, seq: SequenceNumber) {
        self.naks.push(seq);
    }

    fn tick(&mut self, _now: Instant) -> bool {
        false
    }

    fn enqueue_heartbeat(&mut self) {
        self.heartbeats += 1;
    }

    fn rto_timeout(&mut self, _now: Instant, _rto_at_schedule: Duration) {
        self.rto_timeouts += 1;
    }

    fn connection_timeout(&mut self) {}

    fn connection_lost(&mut self) {
        self.lost += 1;
    }

    fn connection_regained(&mut self) {
        self.regained += 1;
    }

    fn connection_warning(&mut self) {
        self.warnings += 1;
    }

    fn is_opening(&self) -> bool {
        false
    }

    fn sender_buffer_is_empty(&self) -> bool {
        !self.buffered
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn config() -> Arc<SocketConfig> {
    Arc::new(
        SocketConfig::new()
            .with_initial_rto(ms(100))
            .with_heartbeat_frequency(2.0)
            .with_heartbeats_before_connection_warning(2.0)
            .with_connection_timeout(ms(3000)),
    )
}

#[tokio::test(start_paused = true)]
async fn test_driver_detects_lost_connection() {
    let (driver, handle) = ConnectionDriver::new(config(), Recorder::default()).unwrap();
    let task = tokio::spawn(driver.run());

    handle.connection_opened().await.unwrap();
    tokio::time::sleep(ms(3500)).await;
    handle.shutdown().await.unwrap();

    let recorder = task.await.unwrap().unwrap();
    assert!(recorder.heartbeats >= 1);
    assert_eq!(recorder.warnings, 1);
    assert_eq!(recorder.lost, 1);
    assert_eq!(recorder.regained, 0);
}

#[tokio::test(start_paused = true)]
async fn test_driver_regains_connection() {
    let (driver, handle) = ConnectionDriver::new(config(), Recorder::default()).unwrap();
    let task = tokio::spawn(driver.run());

    handle.connection_opened().await.unwrap();
    tokio::time::sleep(ms(3500)).await;
    handle.got_packet(PacketHeader::new(1)).await.unwrap();
    handle.got_packet(PacketHeader::new(2)).await.unwrap();
    tokio::time::sleep(ms(100)).await;

    // Dropping the last handle stops the driver.
    drop(handle);
    let recorder = task.await.unwrap().unwrap();
    assert_eq!(recorder.lost, 1);
    assert_eq!(recorder.regained, 1);
}

#[tokio::test(start_paused = true)]
async fn test_driver_naks_missing_packet() {
    let (driver, handle) = ConnectionDriver::new(config(), Recorder::default()).unwrap();
    let task = tokio::spawn(driver.run());

    handle.connection_opened().await.unwrap();
    for seq in [1, 2, 4] {
        handle.got_packet(PacketHeader::new(seq)).await.unwrap();
    }
    tokio::time::sleep(ms(120)).await;
    handle.shutdown().await.unwrap();

    let recorder = task.await.unwrap().unwrap();
    assert_eq!(recorder.naks, vec![3]);
}

#[tokio::test(start_paused = true)]
async fn test_driver_retransmits_registered_data() {
    let (driver, handle) = ConnectionDriver::new(config(), Recorder::default()).unwrap();
    let task = tokio::spawn(driver.run());

    handle.connection_opened().await.unwrap();
    handle.exec(|recorder, _| recorder.buffered = true).await.unwrap();
    handle.data_registered().await.unwrap();
    tokio::time::sleep(ms(250)).await;

    handle.exec(|recorder, _| recorder.buffered = false).await.unwrap();
    tokio::time::sleep(ms(500)).await;
    handle.shutdown().await.unwrap();

    let recorder = task.await.unwrap().unwrap();
    assert_eq!(recorder.rto_timeouts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_handle_fails_after_shutdown() {
    let (driver, handle) = ConnectionDriver::new(config(), Recorder::default()).unwrap();
    let task = tokio::spawn(driver.run());

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();

    assert!(handle.is_closed());
    assert_eq!(
        handle.sent_packet().await,
        Err(TransportError::ConnectionClosed)
    );
}
