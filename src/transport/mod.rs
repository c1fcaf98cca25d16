//! Reliant Protocol - Transport Layer
//!
//! The timing core of a connection. It provides:
//!
//! - **RTT estimation**: [`RttEstimator`] implementing RFC 6298, and
//!   [`ConnTime`] for timestamp-echo round-trip samples
//! - **Loss tracking**: [`LossList`] records receive-side gaps and decides
//!   when a NAK is due
//! - **Liveness**: [`LivenessTimer`] detects warning, loss and recovery from
//!   peer silence, and owns the retransmission deadline
//! - **Timer substrate**: the [`Scheduler`] trait and its binary-heap
//!   implementation [`TimerQueue`]
//! - **Orchestration**: [`ConnTimers`] coordinates the NAK, tick, heartbeat
//!   and liveness timers of one connection
//! - **Event loop**: [`ConnectionDriver`] runs the timers on a tokio task
//!   (feature `runtime`)
//!
//! # Architecture
//!
//! The transport layer sits between the owning connection and the reliable
//! send path. It never touches the network: the connection feeds it parsed
//! headers and the current time, and receives callbacks through
//! [`ConnectionDelegate`](crate::core::ConnectionDelegate).
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Connection (delegate)          │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   RTT, loss list, liveness, timers      │
//! ├─────────────────────────────────────────┤
//! │     Timer substrate (queue / tokio)     │
//! └─────────────────────────────────────────┘
//! ```

mod error;
mod header;
mod liveness;
mod loss;
mod scheduler;
mod timers;
mod timing;

#[cfg(feature = "runtime")]
mod driver;
#[cfg(feature = "simulation")]
mod simulator;

pub use error::*;
pub use header::{PacketHeader, TimestampEcho};
pub use liveness::{LivenessState, LivenessTimer};
pub use loss::LossList;
pub use scheduler::{Scheduler, TimerKind, TimerQueue};
pub use timers::ConnTimers;
pub use timing::{ConnTime, RttEstimator};

#[cfg(feature = "runtime")]
pub use driver::{ConnectionDriver, ConnectionEvent, ConnectionHandle, DelegateTask};
#[cfg(feature = "simulation")]
pub use simulator::PacketDropper;
