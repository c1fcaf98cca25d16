//! # Reliant Protocol
//!
//! The reliability and timing core of a UDP transport for low-latency
//! interactive applications. It provides:
//!
//! - **Ordering**: 24-bit cyclic sequence arithmetic shared by every component
//! - **Recovery**: receive-side loss tracking with NAKs, and an RTO-driven
//!   retransmission scan over a per-channel reliable send buffer
//! - **Adaptivity**: RFC 6298 RTT estimation from timestamp echoes
//! - **Liveness**: heartbeats, connection warnings, loss and recovery detection
//! - **Determinism**: every operation takes the current time from the caller,
//!   so the whole core can be driven by a virtual clock
//!
//! ## Feature Flags
//!
//! - `runtime` (default): tokio-backed [`ConnectionDriver`](transport::ConnectionDriver)
//! - `simulation` (default): fabricated packet drop for testing recovery paths
//!
//! ## Modules
//!
//! - [`core`]: Constants, sequence arithmetic, configuration, owner traits, errors
//! - [`transport`]: RTT estimation, loss list, liveness and timer orchestration
//! - [`sender`]: Reliable messages and the reliable send buffer
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//! use reliant_protocol::prelude::*;
//!
//! #[derive(Default)]
//! struct Connection {
//!     naks: Vec<SequenceNumber>,
//!     heartbeats: usize,
//! }
//!
//! impl ConnectionDelegate for Connection {
//!     fn enqueue_nak(&mut self, seq: SequenceNumber) {
//!         self.naks.push(seq);
//!     }
//!     fn tick(&mut self, _now: Instant) -> bool {
//!         false
//!     }
//!     fn enqueue_heartbeat(&mut self) {
//!         self.heartbeats += 1;
//!     }
//!     fn rto_timeout(&mut self, _now: Instant, _rto: Duration) {}
//!     fn connection_timeout(&mut self) {}
//!     fn connection_lost(&mut self) {}
//!     fn connection_regained(&mut self) {}
//!     fn is_opening(&self) -> bool {
//!         false
//!     }
//!     fn sender_buffer_is_empty(&self) -> bool {
//!         true
//!     }
//! }
//!
//! let config = Arc::new(SocketConfig::default());
//! let start = Instant::now();
//! let mut connection = Connection::default();
//! let mut timers = ConnTimers::with_queue(config, start).unwrap();
//! timers.connection_opened(start).unwrap();
//!
//! for seq in [1, 2, 4] {
//!     timers.got_packet(&PacketHeader::new(seq), start, &mut connection).unwrap();
//! }
//! timers.advance(start + Duration::from_secs(2), &mut connection).unwrap();
//! assert_eq!(connection.naks, vec![3]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Timing core
pub mod transport;

// Reliable send path
pub mod sender;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::transport::{
        ConnTime, ConnTimers, LivenessState, LossList, PacketHeader, RttEstimator, Scheduler,
        TimerError, TimerKind, TimerQueue, TransportError, TransportResult,
    };

    #[cfg(feature = "runtime")]
    pub use crate::transport::{ConnectionDriver, ConnectionHandle};

    pub use crate::sender::{ChannelQualifier, Message, SenderBuffer};
}

// Re-export commonly used items at crate root
pub use crate::core::{ConfigError, ConnectionDelegate, ReliantError, SocketConfig};
pub use sender::SenderBuffer;
pub use transport::{ConnTimers, TransportError};
