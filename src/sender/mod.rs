//! Reliant Protocol - Reliable Send Path
//!
//! Buffers reliable messages until the peer cumulatively acknowledges them
//! and selects retransmission candidates once they have waited an RTO.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//! use reliant_protocol::sender::{Message, SenderBuffer};
//!
//! let now = Instant::now();
//! let mut buffer = SenderBuffer::new(64 * 1024);
//! buffer
//!     .register_reliable_message(Arc::new(Message::new(0, 1, b"hello".to_vec())), now)
//!     .unwrap();
//!
//! let later = now + Duration::from_millis(250);
//! let resent = buffer
//!     .each_current_message(later, Duration::from_millis(200), |_, message| {
//!         assert_eq!(message.payload(), b"hello");
//!     })
//!     .unwrap();
//! assert_eq!(resent, 1);
//!
//! // Acknowledged up to and including sequence number 1.
//! buffer.deregister_reliable_messages(0, 1).unwrap();
//! assert!(buffer.is_empty());
//! ```

mod buffer;
mod message;

pub use buffer::SenderBuffer;
pub use message::{ChannelQualifier, Message};
