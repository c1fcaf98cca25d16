//! RTT estimation and timing utilities.
//!
//! Implements the RFC 6298 estimator. The derived RTO drives retransmission
//! and the NAK interval throttles repeated retransmission requests.

use std::time::{Duration, Instant};

use crate::core::SocketConfig;
use crate::core::constants::{NAK_RTO_FRACTION, RTO_GRANULARITY, RTO_K, RTTVAR_BETA, SRTT_ALPHA};

use super::header::{PacketHeader, TimestampEcho};

/// RTT estimator implementing RFC 6298.
///
/// This struct maintains smoothed RTT (SRTT) and RTT variance (RTTVAR) values,
/// and computes an adaptive Retransmission Timeout (RTO) clamped to
/// `[min_rto, max_rto]`.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    /// Smoothed RTT in milliseconds.
    srtt: f64,
    /// RTT variance in milliseconds.
    rttvar: f64,
    /// Current retransmission timeout.
    rto: Duration,
    /// Lower RTO bound.
    min_rto: Duration,
    /// Upper RTO bound.
    max_rto: Duration,
    /// Whether we've received the first RTT sample.
    initialized: bool,
}

impl RttEstimator {
    /// Create a new RTT estimator.
    ///
    /// `initial_rto` is used until the first sample arrives and is clamped
    /// like any computed RTO.
    pub fn new(initial_rto: Duration, min_rto: Duration, max_rto: Duration) -> Self {
        Self {
            srtt: 0.0,
            rttvar: 0.0,
            rto: initial_rto.clamp(min_rto, max_rto),
            min_rto,
            max_rto,
            initialized: false,
        }
    }

    /// Create an estimator with the RTO parameters of a socket.
    pub fn from_config(config: &SocketConfig) -> Self {
        Self::new(config.initial_rto, config.min_rto, config.max_rto)
    }

    /// Update RTT estimate with a new sample.
    ///
    /// - First measurement: SRTT = sample, RTTVAR = sample / 2
    /// - Subsequent: RTTVAR = 0.75 * RTTVAR + 0.25 * |SRTT - sample|
    /// - SRTT = 0.875 * SRTT + 0.125 * sample
    pub fn update(&mut self, sample: Duration) {
        let sample_ms = sample.as_secs_f64() * 1000.0;

        if !self.initialized {
            self.srtt = sample_ms;
            self.rttvar = sample_ms / 2.0;
            self.initialized = true;
        } else {
            self.rttvar = (1.0 - RTTVAR_BETA) * self.rttvar
                + RTTVAR_BETA * (self.srtt - sample_ms).abs();
            self.srtt = (1.0 - SRTT_ALPHA) * self.srtt + SRTT_ALPHA * sample_ms;
        }

        // RTO = SRTT + max(G, K * RTTVAR)
        let granularity_ms = RTO_GRANULARITY.as_secs_f64() * 1000.0;
        let rto_ms = self.srtt + f64::max(granularity_ms, RTO_K * self.rttvar);

        let rto_ms = rto_ms.clamp(
            self.min_rto.as_secs_f64() * 1000.0,
            self.max_rto.as_secs_f64() * 1000.0,
        );

        self.rto = Duration::from_secs_f64(rto_ms / 1000.0).clamp(self.min_rto, self.max_rto);
    }

    /// Get the current smoothed RTT.
    pub fn srtt(&self) -> Duration {
        Duration::from_secs_f64(self.srtt / 1000.0)
    }

    /// Get the current RTT variance.
    pub fn rttvar(&self) -> Duration {
        Duration::from_secs_f64(self.rttvar / 1000.0)
    }

    /// Get the current retransmission timeout.
    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Interval between NAK timer runs, a fixed fraction of the RTO.
    pub fn nak_interval(&self) -> Duration {
        self.rto.mul_f64(NAK_RTO_FRACTION)
    }

    /// Check if the estimator has been initialized with at least one sample.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Per-connection clock state: RTT estimation plus timestamp echo bookkeeping.
///
/// Outgoing packets carry milliseconds since the connection epoch. The peer
/// echoes them back together with how long it held them, which yields an RTT
/// sample independent of the peer's clock.
#[derive(Debug, Clone)]
pub struct ConnTime {
    epoch: Instant,
    rtt: RttEstimator,
    /// Most recent peer timestamp and when it arrived.
    last_peer_timestamp: Option<(u32, Instant)>,
}

impl ConnTime {
    /// Create connection time state anchored at `epoch`.
    pub fn new(epoch: Instant, rtt: RttEstimator) -> Self {
        Self {
            epoch,
            rtt,
            last_peer_timestamp: None,
        }
    }

    /// Timestamp to stamp on an outgoing packet sent at `now`.
    pub fn timestamp(&self, now: Instant) -> u32 {
        now.saturating_duration_since(self.epoch).as_millis() as u32
    }

    /// Echo to attach to an outgoing packet sent at `now`, if the peer has
    /// sent us a timestamp.
    pub fn echo(&self, now: Instant) -> Option<TimestampEcho> {
        self.last_peer_timestamp
            .map(|(timestamp, received_at)| TimestampEcho {
                timestamp,
                hold: now.saturating_duration_since(received_at),
            })
    }

    /// Process the timing fields of an inbound packet.
    ///
    /// Returns the RTT sample if the packet carried a usable echo.
    pub fn got_packet(&mut self, header: &PacketHeader, now: Instant) -> Option<Duration> {
        if let Some(timestamp) = header.timestamp {
            self.last_peer_timestamp = Some((timestamp, now));
        }

        let echo = header.echo?;
        let sent_at = self.epoch + Duration::from_millis(echo.timestamp as u64);
        if sent_at > now {
            // Echo of a timestamp we could not have sent yet.
            return None;
        }

        let sample = now.duration_since(sent_at).saturating_sub(echo.hold);
        self.rtt.update(sample);
        Some(sample)
    }

    /// Get the current retransmission timeout.
    pub fn rto(&self) -> Duration {
        self.rtt.rto()
    }

    /// Get the current NAK interval.
    pub fn nak_interval(&self) -> Duration {
        self.rtt.nak_interval()
    }

    /// Get the underlying estimator.
    pub fn estimator(&self) -> &RttEstimator {
        &self.rtt
    }
}
