//! Reliable application messages.

use crate::core::constants::{MAX_MESSAGE_HEADER_SIZE, SEQUENCE_MASK};
use crate::core::SequenceNumber;

/// Identifies an independent ordered delivery lane within a connection.
pub type ChannelQualifier = i32;

/// A reliably-sent unit of application data.
///
/// Buffered messages are shared as `Arc<Message>` between the full buffered
/// set and the next-to-send selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    channel: ChannelQualifier,
    sequence_number: SequenceNumber,
    payload: Vec<u8>,
}

impl Message {
    /// Create a message. The sequence number is truncated to the cyclic
    /// sequence width.
    pub fn new(
        channel: ChannelQualifier,
        sequence_number: SequenceNumber,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            channel,
            sequence_number: sequence_number & SEQUENCE_MASK,
            payload: payload.into(),
        }
    }

    /// Channel this message is ordered on.
    pub fn channel(&self) -> ChannelQualifier {
        self.channel
    }

    /// Cyclic sequence number within the channel.
    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }

    /// Opaque application payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Bytes this message occupies in the send buffer, header included.
    pub fn wire_size(&self) -> usize {
        self.payload.len() + MAX_MESSAGE_HEADER_SIZE
    }
}
