//! Receive-side loss tracking.
//!
//! Every inbound packet sequence number is fed to a [`LossList`]. Skipped
//! sequence numbers become loss entries; the NAK timer periodically asks for
//! the oldest outstanding one that has waited at least an RTO. A gap that
//! was already requested is asked for again after the NAK interval.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::core::constants::{NAK_RTO_FRACTION, SEQUENCE_MASK};
use crate::core::{cyclic_difference, SequenceNumber};

/// Offset that keeps unwrapped sequence numbers positive. A multiple of the
/// sequence space, so the low bits still equal the wire value.
const UNWRAP_BASE: u64 = 1 << 40;

#[derive(Debug, Clone, Copy)]
struct LossEntry {
    /// When the gap was first observed.
    discovered: Instant,
    /// When a NAK was last issued for it.
    last_requested: Option<Instant>,
}

impl LossEntry {
    fn due(&self, now: Instant, rto: Duration) -> bool {
        match self.last_requested {
            Some(requested) => {
                now.saturating_duration_since(requested) >= rto.mul_f64(NAK_RTO_FRACTION)
            }
            None => now.saturating_duration_since(self.discovered) >= rto,
        }
    }
}

/// Gaps observed in the received packet sequence.
///
/// Sequence numbers are unwrapped into a monotonic 64-bit space anchored at
/// the first packet, so ordering inside the list is plain integer ordering.
/// At most `capacity` entries are tracked, and only within `capacity`
/// sequence numbers of the highest one seen.
#[derive(Debug, Clone)]
pub struct LossList {
    capacity: usize,
    /// Highest sequence number seen so far, unwrapped.
    highest: Option<u64>,
    entries: BTreeMap<u64, LossEntry>,
}

impl LossList {
    /// Create an empty loss list tracking at most `capacity` gaps.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            highest: None,
            entries: BTreeMap::new(),
        }
    }

    /// Record the arrival of packet `seq` at `now`.
    pub fn got_packet(&mut self, now: Instant, seq: SequenceNumber) {
        let seq = seq & SEQUENCE_MASK;

        let highest = match self.highest {
            Some(highest) => highest,
            None => {
                self.highest = Some(UNWRAP_BASE + seq as u64);
                return;
            }
        };

        let diff = cyclic_difference(seq, (highest & SEQUENCE_MASK as u64) as u32);
        if diff > 0 {
            let new_highest = highest + diff as u64;
            let floor = new_highest.saturating_sub(self.capacity as u64);

            for unwrapped in (highest + 1).max(floor)..new_highest {
                self.entries.insert(
                    unwrapped,
                    LossEntry {
                        discovered: now,
                        last_requested: None,
                    },
                );
            }

            self.highest = Some(new_highest);
            self.entries = self.entries.split_off(&floor);
        } else if diff < 0 {
            let unwrapped = highest - diff.unsigned_abs() as u64;
            if self.entries.remove(&unwrapped).is_some() {
                tracing::trace!(seq, "loss gap filled");
            }
        }
    }

    /// Pick the lowest outstanding gap that has waited at least `rto` since it
    /// was discovered, or the NAK interval (a fraction of `rto`) since it was
    /// last requested, and mark it requested.
    ///
    /// Returns `None` when no NAK is due.
    pub fn calculate_nak(&mut self, now: Instant, rto: Duration) -> Option<SequenceNumber> {
        let (unwrapped, entry) = self
            .entries
            .iter_mut()
            .find(|(_, entry)| entry.due(now, rto))?;

        entry.last_requested = Some(now);
        Some((*unwrapped & SEQUENCE_MASK as u64) as SequenceNumber)
    }

    /// Whether `seq` is currently recorded as missing.
    pub fn contains(&self, seq: SequenceNumber) -> bool {
        let Some(highest) = self.highest else {
            return false;
        };
        let diff = cyclic_difference(seq, (highest & SEQUENCE_MASK as u64) as u32);
        diff < 0 && self.entries.contains_key(&(highest - diff.unsigned_abs() as u64))
    }

    /// Number of outstanding gaps.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no outstanding gaps.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest sequence number seen, if any.
    pub fn highest(&self) -> Option<SequenceNumber> {
        self.highest
            .map(|unwrapped| (unwrapped & SEQUENCE_MASK as u64) as SequenceNumber)
    }
}
