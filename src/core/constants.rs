//! Protocol constants and configuration defaults.
//!
//! Values in the first sections are fixed by the wire protocol. The
//! `DEFAULT_*` values seed [`SocketConfig`](super::SocketConfig) and may be
//! overridden per socket.

use std::time::Duration;

// =============================================================================
// SEQUENCE NUMBERS
// =============================================================================

/// Width of a cyclic sequence number in bits.
pub const SEQUENCE_BITS: u32 = 24;

/// Mask selecting the valid bits of a sequence number.
pub const SEQUENCE_MASK: u32 = (1 << SEQUENCE_BITS) - 1;

/// Half of the sequence space. Two sequence numbers further apart than this
/// cannot be ordered.
pub const SEQUENCE_HALF_RANGE: u32 = 1 << (SEQUENCE_BITS - 1);

// =============================================================================
// MESSAGE SIZES
// =============================================================================

/// Upper bound on the header bytes of one reliable message
/// (flags + channel + length + sequence + ack).
pub const MAX_MESSAGE_HEADER_SIZE: usize = 10;

// =============================================================================
// RTT ESTIMATION (RFC 6298)
// =============================================================================

/// Alpha for SRTT smoothing (0.125 = 1/8).
pub const SRTT_ALPHA: f64 = 0.125;

/// Beta for RTTVAR smoothing (0.25 = 1/4).
pub const RTTVAR_BETA: f64 = 0.25;

/// K multiplier for RTO calculation (4.0 per RFC 6298).
pub const RTO_K: f64 = 4.0;

/// Clock granularity term of the RTO calculation.
pub const RTO_GRANULARITY: Duration = Duration::from_millis(10);

/// NAK interval as a fraction of the RTO.
pub const NAK_RTO_FRACTION: f64 = 0.5;

// =============================================================================
// SOCKET CONFIGURATION DEFAULTS
// =============================================================================

/// Default maximum transmission unit.
pub const DEFAULT_MTU: usize = 576;

/// Default heartbeat frequency (Hz).
pub const DEFAULT_HEARTBEAT_FREQUENCY: f32 = 0.3;

/// Default tick frequency (Hz). Ticks flush batched protocol output.
pub const DEFAULT_TICK_FREQUENCY: f32 = 100.0;

/// Default silence after which a connection is considered lost.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to wait for the handshake to complete.
pub const DEFAULT_INITIAL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of missed heartbeat periods before a connection warning.
pub const DEFAULT_HEARTBEATS_BEFORE_CONNECTION_WARNING: f32 = 1.8;

/// Default receiver buffer size in bytes.
pub const DEFAULT_RECEIVER_BUFFER_SIZE: usize = 1024 * 1024;

/// Default sender buffer size in bytes.
pub const DEFAULT_SENDER_BUFFER_SIZE: usize = 1024 * 1024;

/// Initial retransmission timeout before first RTT sample.
pub const DEFAULT_INITIAL_RTO: Duration = Duration::from_millis(1000);

/// Minimum retransmission timeout.
/// Keeps spurious retransmissions down on jittery low-latency links.
pub const DEFAULT_MIN_RTO: Duration = Duration::from_millis(100);

/// Maximum retransmission timeout.
/// Kept well below the connection timeout so a stalled peer still sees
/// several retransmissions before the connection is declared lost.
pub const DEFAULT_MAX_RTO: Duration = Duration::from_secs(10);
