//! Reliable send buffer.
//!
//! Holds every reliable message that has not been cumulatively acknowledged,
//! and picks retransmission candidates. Two views share the same messages:
//!
//! - per-channel queues ordered by cyclic sequence number, used for lookup
//!   and cumulative removal
//! - the next-to-send view, holding the oldest pending message of each
//!   channel ordered by registration time, then channel

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::constants::MAX_MESSAGE_HEADER_SIZE;
use crate::core::{cyclic_difference, SequenceNumber, SocketConfig};
use crate::transport::{TransportError, TransportResult};

use super::message::{ChannelQualifier, Message};

/// Offsets beyond this distance from a queue's base trigger a rebase.
const REBASE_THRESHOLD: i32 = 1 << 20;

#[derive(Debug, Clone)]
struct Slot {
    message: Arc<Message>,
    registered_at: Instant,
}

/// Buffered messages of one channel.
///
/// Keys are signed distances from `base`, so plain integer order matches
/// cyclic sequence order as long as the queue spans less than half the
/// sequence space.
#[derive(Debug, Clone)]
struct ChannelQueue {
    base: SequenceNumber,
    slots: BTreeMap<i32, Slot>,
    /// Registration time and sequence of the entry in the next-to-send view.
    current: Option<(Instant, SequenceNumber)>,
}

impl ChannelQueue {
    fn new(base: SequenceNumber) -> Self {
        Self {
            base,
            slots: BTreeMap::new(),
            current: None,
        }
    }

    fn offset(&self, seq: SequenceNumber) -> i32 {
        cyclic_difference(seq, self.base)
    }

    /// Re-key around the first slot once offsets drift far from the base.
    fn maybe_rebase(&mut self) {
        let Some((&first, slot)) = self.slots.first_key_value() else {
            return;
        };
        if first.unsigned_abs() <= REBASE_THRESHOLD as u32 {
            return;
        }

        let base = slot.message.sequence_number();
        let slots = std::mem::take(&mut self.slots);
        self.slots = slots
            .into_values()
            .map(|slot| (cyclic_difference(slot.message.sequence_number(), base), slot))
            .collect();
        self.base = base;
    }
}

/// Per-connection buffer of unacknowledged reliable messages.
#[derive(Debug, Clone)]
pub struct SenderBuffer {
    capacity: usize,
    /// Bytes accounted, header overhead included.
    size: usize,
    channels: BTreeMap<ChannelQualifier, ChannelQueue>,
    next: BTreeMap<(Instant, ChannelQualifier), Arc<Message>>,
}

impl SenderBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            size: 0,
            channels: BTreeMap::new(),
            next: BTreeMap::new(),
        }
    }

    /// Create a buffer sized by the socket's sender buffer size.
    pub fn from_config(config: &SocketConfig) -> Self {
        Self::new(config.sender_buffer_size)
    }

    /// Whether `count` messages with `size` payload bytes in total would fit.
    pub fn fits_into_buffer(&self, size: usize, count: usize) -> bool {
        count
            .checked_mul(MAX_MESSAGE_HEADER_SIZE)
            .and_then(|headers| headers.checked_add(size))
            .and_then(|required| required.checked_add(self.size))
            .is_some_and(|total| total <= self.capacity)
    }

    /// Buffer `message`, registered at `now`.
    ///
    /// Fails with [`TransportError::SendBufferOverflow`] if it does not fit,
    /// leaving the buffer unchanged. Registering a (channel, sequence) pair
    /// that is already buffered does nothing.
    pub fn register_reliable_message(
        &mut self,
        message: Arc<Message>,
        now: Instant,
    ) -> TransportResult<()> {
        let required = message.wire_size();
        if !self.fits_into_buffer(message.payload().len(), 1) {
            return Err(TransportError::SendBufferOverflow {
                required,
                available: self.capacity.saturating_sub(self.size),
            });
        }

        let channel = message.channel();
        let seq = message.sequence_number();
        let queue = self
            .channels
            .entry(channel)
            .or_insert_with(|| ChannelQueue::new(seq));

        let offset = queue.offset(seq);
        if queue.slots.contains_key(&offset) {
            return Ok(());
        }

        queue.slots.insert(
            offset,
            Slot {
                message: Arc::clone(&message),
                registered_at: now,
            },
        );
        self.size += required;

        if queue.current.is_none() {
            queue.current = Some((now, seq));
            self.next.insert((now, channel), message);
        }
        queue.maybe_rebase();
        Ok(())
    }

    /// Remove every message on `channel` whose sequence number is at or
    /// before `bound` in cyclic order. Returns the number removed.
    ///
    /// If the channel's next-to-send message was removed, its next remaining
    /// message takes its place.
    pub fn deregister_reliable_messages(
        &mut self,
        channel: ChannelQualifier,
        bound: SequenceNumber,
    ) -> TransportResult<usize> {
        let Some(queue) = self.channels.get_mut(&channel) else {
            return Ok(0);
        };

        let bound_offset = queue.offset(bound);
        let kept = queue.slots.split_off(&(bound_offset + 1));
        let removed = std::mem::replace(&mut queue.slots, kept);
        if removed.is_empty() {
            return Ok(0);
        }

        let freed: usize = removed.values().map(|slot| slot.message.wire_size()).sum();
        self.size = self.size.saturating_sub(freed);

        if let Some((registered_at, seq)) = queue.current {
            if removed.contains_key(&queue.offset(seq)) {
                self.next
                    .remove(&(registered_at, channel))
                    .ok_or(TransportError::InvariantViolation(
                        "current message missing from next-to-send view",
                    ))?;
                queue.current = None;

                if let Some(slot) = queue.slots.values().next() {
                    queue.current = Some((slot.registered_at, slot.message.sequence_number()));
                    self.next
                        .insert((slot.registered_at, channel), Arc::clone(&slot.message));
                }
            }
        }

        if queue.slots.is_empty() {
            self.channels.remove(&channel);
        } else {
            queue.maybe_rebase();
        }
        Ok(removed.len())
    }

    /// Visit every next-to-send message registered at least `rto` before
    /// `now`, oldest first, then restamp the visited messages with `now`.
    ///
    /// The visitor receives the previous registration time. Returns the
    /// number of messages visited.
    pub fn each_current_message<F>(
        &mut self,
        now: Instant,
        rto: Duration,
        mut visitor: F,
    ) -> TransportResult<usize>
    where
        F: FnMut(Instant, &Arc<Message>),
    {
        let due: Vec<(Instant, ChannelQualifier)> = self
            .next
            .iter()
            .take_while(|((registered_at, _), _)| {
                now.saturating_duration_since(*registered_at) >= rto
            })
            .map(|(&key, message)| {
                visitor(key.0, message);
                key
            })
            .collect();

        for &(registered_at, channel) in &due {
            let message = self.next.remove(&(registered_at, channel)).ok_or(
                TransportError::InvariantViolation("visited message missing from next-to-send view"),
            )?;
            let queue = self
                .channels
                .get_mut(&channel)
                .ok_or(TransportError::InvariantViolation("visited message has no channel"))?;

            let offset = queue.offset(message.sequence_number());
            let slot = queue
                .slots
                .get_mut(&offset)
                .ok_or(TransportError::InvariantViolation("visited message not buffered"))?;
            slot.registered_at = now;
            queue.current = Some((now, message.sequence_number()));
            self.next.insert((now, channel), message);
        }

        if !due.is_empty() {
            tracing::debug!(
                count = due.len(),
                rto_ms = rto.as_millis() as u64,
                "retransmission scan"
            );
        }
        Ok(due.len())
    }

    /// Whether `(channel, seq)` is buffered.
    pub fn contains(&self, channel: ChannelQualifier, seq: SequenceNumber) -> bool {
        self.channels
            .get(&channel)
            .is_some_and(|queue| queue.slots.contains_key(&queue.offset(seq)))
    }

    /// Next-to-send messages, oldest registration first.
    pub fn next_messages(&self) -> impl Iterator<Item = &Arc<Message>> {
        self.next.values()
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.channels.values().map(|queue| queue.slots.len()).sum()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }

    /// Bytes currently accounted, header overhead included.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Maximum bytes the buffer accepts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every buffered message.
    pub fn clear(&mut self) {
        self.channels.clear();
        self.next.clear();
        self.size = 0;
    }
}
