//! Socket configuration.
//!
//! A [`SocketConfig`] is created once per listening or connecting socket and
//! shared read-only (behind an `Arc`) by every connection of that socket.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::constants::*;
use super::error::ConfigError;

/// Immutable parameter block consumed by the timing and buffering machinery.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketConfig {
    /// Maximum transmission unit in bytes.
    pub mtu: usize,
    /// Heartbeats per second on an otherwise idle connection.
    pub heartbeat_frequency: f32,
    /// Ticks per second; a tick flushes batched outgoing traffic.
    pub tick_frequency: f32,
    /// Silence after which the connection is declared lost.
    pub connection_timeout: Duration,
    /// How long to wait for the handshake before giving up.
    pub initial_connection_timeout: Duration,
    /// Missed heartbeat periods before a connection warning is issued.
    pub heartbeats_before_connection_warning: f32,
    /// Receiver buffer size in bytes.
    pub receiver_buffer_size: usize,
    /// Sender buffer size in bytes.
    pub sender_buffer_size: usize,
    /// Whether the socket accepts inbound connections.
    pub accept_connections: bool,
    /// Bind address.
    pub address: IpAddr,
    /// Bind port (0 lets the OS choose).
    pub port: u16,
    /// Probability of silently dropping a packet. Test instrumentation only.
    pub fabricated_packet_drop_rate: f32,
    /// RTO used before the first round-trip sample.
    pub initial_rto: Duration,
    /// Lower RTO bound.
    pub min_rto: Duration,
    /// Upper RTO bound.
    pub max_rto: Duration,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            heartbeat_frequency: DEFAULT_HEARTBEAT_FREQUENCY,
            tick_frequency: DEFAULT_TICK_FREQUENCY,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            initial_connection_timeout: DEFAULT_INITIAL_CONNECTION_TIMEOUT,
            heartbeats_before_connection_warning: DEFAULT_HEARTBEATS_BEFORE_CONNECTION_WARNING,
            receiver_buffer_size: DEFAULT_RECEIVER_BUFFER_SIZE,
            sender_buffer_size: DEFAULT_SENDER_BUFFER_SIZE,
            accept_connections: false,
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            fabricated_packet_drop_rate: 0.0,
            initial_rto: DEFAULT_INITIAL_RTO,
            min_rto: DEFAULT_MIN_RTO,
            max_rto: DEFAULT_MAX_RTO,
        }
    }
}

impl SocketConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the MTU.
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the heartbeat frequency (Hz).
    pub fn with_heartbeat_frequency(mut self, frequency: f32) -> Self {
        self.heartbeat_frequency = frequency;
        self
    }

    /// Set the tick frequency (Hz).
    pub fn with_tick_frequency(mut self, frequency: f32) -> Self {
        self.tick_frequency = frequency;
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the handshake timeout.
    pub fn with_initial_connection_timeout(mut self, timeout: Duration) -> Self {
        self.initial_connection_timeout = timeout;
        self
    }

    /// Set the number of heartbeat periods before a connection warning.
    pub fn with_heartbeats_before_connection_warning(mut self, heartbeats: f32) -> Self {
        self.heartbeats_before_connection_warning = heartbeats;
        self
    }

    /// Set the receiver buffer size in bytes.
    pub fn with_receiver_buffer_size(mut self, size: usize) -> Self {
        self.receiver_buffer_size = size;
        self
    }

    /// Set the sender buffer size in bytes.
    pub fn with_sender_buffer_size(mut self, size: usize) -> Self {
        self.sender_buffer_size = size;
        self
    }

    /// Accept inbound connections.
    pub fn with_accept_connections(mut self, accept: bool) -> Self {
        self.accept_connections = accept;
        self
    }

    /// Set the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.address = addr.ip();
        self.port = addr.port();
        self
    }

    /// Set the fabricated packet drop rate.
    pub fn with_fabricated_packet_drop_rate(mut self, rate: f32) -> Self {
        self.fabricated_packet_drop_rate = rate;
        self
    }

    /// Set the initial RTO.
    pub fn with_initial_rto(mut self, rto: Duration) -> Self {
        self.initial_rto = rto;
        self
    }

    /// Set the RTO clamp bounds.
    pub fn with_rto_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.min_rto = min;
        self.max_rto = max;
        self
    }

    /// Check that every field holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.heartbeat_frequency.is_finite() && self.heartbeat_frequency > 0.0) {
            return Err(ConfigError::invalid(
                "heartbeat_frequency",
                "must be finite and positive",
            ));
        }
        if !(self.tick_frequency.is_finite() && self.tick_frequency > 0.0) {
            return Err(ConfigError::invalid(
                "tick_frequency",
                "must be finite and positive",
            ));
        }
        if !(self.heartbeats_before_connection_warning.is_finite()
            && self.heartbeats_before_connection_warning > 0.0)
        {
            return Err(ConfigError::invalid(
                "heartbeats_before_connection_warning",
                "must be finite and positive",
            ));
        }
        if self.connection_timeout.is_zero() {
            return Err(ConfigError::invalid("connection_timeout", "must be non-zero"));
        }
        if self.initial_connection_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "initial_connection_timeout",
                "must be non-zero",
            ));
        }
        if self.mtu <= MAX_MESSAGE_HEADER_SIZE {
            return Err(ConfigError::invalid(
                "mtu",
                "must exceed the per-message header size",
            ));
        }
        if self.receiver_buffer_size == 0 {
            return Err(ConfigError::invalid("receiver_buffer_size", "must be non-zero"));
        }
        if self.sender_buffer_size == 0 {
            return Err(ConfigError::invalid("sender_buffer_size", "must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.fabricated_packet_drop_rate) {
            return Err(ConfigError::invalid(
                "fabricated_packet_drop_rate",
                "must lie in [0, 1]",
            ));
        }
        if self.min_rto.is_zero() {
            return Err(ConfigError::invalid("min_rto", "must be non-zero"));
        }
        if self.min_rto > self.max_rto {
            return Err(ConfigError::invalid("min_rto", "must not exceed max_rto"));
        }
        if self.initial_rto < self.min_rto || self.initial_rto > self.max_rto {
            return Err(ConfigError::invalid(
                "initial_rto",
                "must lie within [min_rto, max_rto]",
            ));
        }
        Ok(())
    }

    /// Interval between heartbeats.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.heartbeat_frequency as f64)
    }

    /// Interval between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_frequency as f64)
    }

    /// Silence after which a connection warning is issued.
    pub fn time_before_connection_warning(&self) -> Duration {
        Duration::from_secs_f64(
            self.heartbeats_before_connection_warning as f64 / self.heartbeat_frequency as f64,
        )
    }

    /// Maximum number of outstanding loss entries the receiver tracks.
    pub fn loss_list_capacity(&self) -> usize {
        (self.receiver_buffer_size / self.mtu.max(1)).max(1)
    }

    /// The socket address to bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}
