//! Packet header metadata consumed by the timing core.
//!
//! Wire framing happens elsewhere; this is the already-parsed view of the
//! fields the timers care about.

use std::time::Duration;

use crate::core::SequenceNumber;

/// Echo of a timestamp the local side previously sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampEcho {
    /// Our timestamp (ms since connection epoch), as received by the peer.
    pub timestamp: u32,
    /// How long the peer held the timestamp before echoing it.
    pub hold: Duration,
}

/// Parsed header of an inbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Cyclic packet sequence number.
    pub sequence_number: SequenceNumber,
    /// Peer's send timestamp, if it asks for an RTT echo.
    pub timestamp: Option<u32>,
    /// Echo of one of our timestamps, if the packet carries one.
    pub echo: Option<TimestampEcho>,
}

impl PacketHeader {
    /// Header with only a sequence number.
    pub fn new(sequence_number: SequenceNumber) -> Self {
        Self {
            sequence_number,
            timestamp: None,
            echo: None,
        }
    }

    /// Attach the peer's send timestamp.
    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Attach an echo of one of our timestamps.
    pub fn with_echo(mut self, timestamp: u32, hold: Duration) -> Self {
        self.echo = Some(TimestampEcho { timestamp, hold });
        self
    }
}
