//! Transport layer error types.

use thiserror::Error;

/// Failures reported by the timer substrate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// The requested fire time cannot be represented.
    #[error("timer deadline overflows the clock")]
    DeadlineOverflow,

    /// The event loop backing the timers has shut down.
    #[error("timer substrate closed")]
    Closed,
}

/// Transport layer errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Admitting a reliable message would exceed the sender buffer.
    /// The buffer is left unchanged.
    #[error("send buffer overflow: {required} bytes required, {available} available")]
    SendBufferOverflow {
        /// Bytes the message would occupy, including header overhead.
        required: usize,
        /// Bytes still free in the buffer.
        available: usize,
    },

    /// Internal bookkeeping went out of sync. Indicates a defect.
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),

    /// The timer substrate failed.
    #[error("timer error: {0}")]
    Timer(#[from] TimerError),

    /// The connection has been shut down.
    #[error("connection closed")]
    ConnectionClosed,
}

impl TransportError {
    /// Check if this error is fatal to the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::InvariantViolation(_)
                | TransportError::Timer(_)
                | TransportError::ConnectionClosed
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
