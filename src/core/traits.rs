//! Owner-facing traits.
//!
//! The timing core never performs I/O itself. It calls back into the
//! connection that owns it through [`ConnectionDelegate`], and the liveness
//! timer only sees the narrower [`LivenessHost`] capability.

use std::time::{Duration, Instant};

use super::sequence::SequenceNumber;

/// Callbacks implemented by the connection that owns a set of timers.
///
/// All methods run on the connection's serialized execution context; none of
/// them may block.
pub trait ConnectionDelegate {
    /// Queue a negative acknowledgment for `seq`.
    fn enqueue_nak(&mut self, seq: SequenceNumber);

    /// Flush pending output. Returns `true` if anything was sent.
    fn tick(&mut self, now: Instant) -> bool;

    /// Queue a heartbeat packet.
    fn enqueue_heartbeat(&mut self);

    /// The retransmission timeout elapsed with reliable data outstanding.
    ///
    /// `rto_at_schedule` is the RTO that was in effect when the deadline was
    /// armed.
    fn rto_timeout(&mut self, now: Instant, rto_at_schedule: Duration);

    /// The handshake did not complete within the initial connection timeout.
    fn connection_timeout(&mut self);

    /// The peer has been silent for the full connection timeout.
    fn connection_lost(&mut self);

    /// A packet arrived after the connection was declared lost.
    fn connection_regained(&mut self);

    /// The peer has been silent long enough to be worth reporting.
    /// Diagnostic only.
    fn connection_warning(&mut self) {}

    /// Whether the handshake is still in progress.
    fn is_opening(&self) -> bool;

    /// Whether the reliable send buffer has nothing outstanding.
    fn sender_buffer_is_empty(&self) -> bool;
}

/// The subset of connection behavior the liveness timer may use.
pub trait LivenessHost {
    /// Whether the reliable send buffer has nothing outstanding.
    fn sender_buffer_is_empty(&self) -> bool;

    /// Retransmission deadline passed with data outstanding.
    fn rto_timeout(&mut self, now: Instant, rto_at_schedule: Duration);

    /// Handshake timed out.
    fn connection_timeout(&mut self);

    /// Connection declared lost.
    fn connection_lost(&mut self);

    /// Connection came back after being lost.
    fn connection_regained(&mut self);

    /// Connection warning issued.
    fn connection_warning(&mut self);
}
