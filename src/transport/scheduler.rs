//! Timer substrate.
//!
//! The orchestrator does not own threads or callbacks. It asks a
//! [`Scheduler`] to arm one of its four timers, and whoever drives the
//! connection calls back into the orchestrator when a timer comes due.
//! [`TimerQueue`] is the binary-heap implementation used both by tests
//! (driven by an explicit clock) and by the tokio driver.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use super::error::TimerError;

/// Identifies one of the timers owned by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Periodic check for due NAKs.
    Nak,
    /// Short wakeup that flushes batched output.
    Tick,
    /// Heartbeat on an idle connection.
    Heartbeat,
    /// Retransmission and connection liveness deadlines.
    Liveness,
}

impl TimerKind {
    /// Every timer kind.
    pub const ALL: [TimerKind; 4] = [
        TimerKind::Nak,
        TimerKind::Tick,
        TimerKind::Heartbeat,
        TimerKind::Liveness,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Host scheduling facility for one connection's timers.
///
/// A non-repeating timer is no longer scheduled by the time its callback
/// runs, so the callback may arm it again.
pub trait Scheduler {
    /// Arm `kind` to fire `delay` after `now`.
    ///
    /// When `reschedule` is false and the timer is already armed the call is
    /// a no-op. A repeating timer re-arms itself with the same delay after
    /// each fire.
    fn schedule(
        &mut self,
        kind: TimerKind,
        now: Instant,
        delay: Duration,
        repeating: bool,
        reschedule: bool,
    ) -> Result<(), TimerError>;

    /// Disarm `kind`. It will not fire until scheduled again.
    fn deschedule(&mut self, kind: TimerKind);

    /// Disarm every timer.
    fn deschedule_all(&mut self) {
        for kind in TimerKind::ALL {
            self.deschedule(kind);
        }
    }

    /// Whether `kind` is currently armed.
    fn is_scheduled(&self, kind: TimerKind) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    deadline: Instant,
    period: Option<Duration>,
    generation: u64,
}

/// Heap entries beyond this many trigger a rebuild from the armed set.
const COMPACT_THRESHOLD: usize = 64;

/// Priority-queue backed timer substrate.
///
/// Rescheduling leaves the superseded heap entry in place; each entry
/// carries a generation number and stale ones are skipped when popped, so a
/// descheduled timer can never fire.
#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<(Instant, u64, TimerKind)>>,
    armed: [Option<Armed>; 4],
    generation: u64,
}

impl TimerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Earliest deadline among armed timers.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.armed.iter().flatten().map(|armed| armed.deadline).min()
    }

    /// Deadline of `kind`, if armed.
    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.armed[kind.index()].map(|armed| armed.deadline)
    }

    /// Remove and return the earliest timer whose deadline is at or before
    /// `now`. Repeating timers are re-armed one period later.
    pub fn pop_expired(&mut self, now: Instant) -> Option<TimerKind> {
        while let Some(&Reverse((deadline, generation, kind))) = self.heap.peek() {
            let live = matches!(
                self.armed[kind.index()],
                Some(armed) if armed.generation == generation
            );
            if !live {
                self.heap.pop();
                continue;
            }
            if deadline > now {
                return None;
            }

            self.heap.pop();
            let period = self.armed[kind.index()].and_then(|armed| armed.period);
            self.armed[kind.index()] = None;

            if let Some(period) = period {
                if let Some(next) = deadline.checked_add(period) {
                    self.arm(kind, next, Some(period));
                }
            }

            tracing::trace!(timer = ?kind, "timer fired");
            return Some(kind);
        }
        None
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.armed.iter().flatten().count()
    }

    /// Whether no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn arm(&mut self, kind: TimerKind, deadline: Instant, period: Option<Duration>) {
        self.generation += 1;
        self.armed[kind.index()] = Some(Armed {
            deadline,
            period,
            generation: self.generation,
        });
        self.heap.push(Reverse((deadline, self.generation, kind)));

        if self.heap.len() > COMPACT_THRESHOLD {
            self.compact();
        }
    }

    fn compact(&mut self) {
        self.heap = TimerKind::ALL
            .iter()
            .filter_map(|&kind| {
                self.armed[kind.index()]
                    .map(|armed| Reverse((armed.deadline, armed.generation, kind)))
            })
            .collect();
    }
}

impl Scheduler for TimerQueue {
    fn schedule(
        &mut self,
        kind: TimerKind,
        now: Instant,
        delay: Duration,
        repeating: bool,
        reschedule: bool,
    ) -> Result<(), TimerError> {
        if !reschedule && self.is_scheduled(kind) {
            return Ok(());
        }

        let deadline = now
            .checked_add(delay)
            .ok_or(TimerError::DeadlineOverflow)?;
        // A zero period would fire forever within a single instant.
        let period = (repeating && !delay.is_zero()).then_some(delay);

        tracing::trace!(
            timer = ?kind,
            delay_ms = delay.as_millis() as u64,
            "timer scheduled"
        );
        self.arm(kind, deadline, period);
        Ok(())
    }

    fn deschedule(&mut self, kind: TimerKind) {
        self.armed[kind.index()] = None;
    }

    fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.armed[kind.index()].is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_pop_in_deadline_order() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(TimerKind::Heartbeat, t0, ms(30), false, true).unwrap();
        queue.schedule(TimerKind::Tick, t0, ms(10), false, true).unwrap();
        queue.schedule(TimerKind::Nak, t0, ms(20), false, true).unwrap();

        assert_eq!(queue.next_deadline(), Some(t0 + ms(10)));
        assert_eq!(queue.pop_expired(t0 + ms(5)), None);
        assert_eq!(queue.pop_expired(t0 + ms(30)), Some(TimerKind::Tick));
        assert_eq!(queue.pop_expired(t0 + ms(30)), Some(TimerKind::Nak));
        assert_eq!(queue.pop_expired(t0 + ms(30)), Some(TimerKind::Heartbeat));
        assert_eq!(queue.pop_expired(t0 + ms(30)), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_no_stacking_without_reschedule() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(TimerKind::Nak, t0, ms(50), false, false).unwrap();
        queue.schedule(TimerKind::Nak, t0, ms(10), false, false).unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.deadline(TimerKind::Nak), Some(t0 + ms(50)));
        assert_eq!(queue.pop_expired(t0 + ms(100)), Some(TimerKind::Nak));
        assert_eq!(queue.pop_expired(t0 + ms(100)), None);
    }

    #[test]
    fn test_reschedule_replaces_deadline() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(TimerKind::Heartbeat, t0, ms(10), false, true).unwrap();
        queue.schedule(TimerKind::Heartbeat, t0, ms(40), false, true).unwrap();

        assert_eq!(queue.pop_expired(t0 + ms(20)), None);
        assert_eq!(queue.pop_expired(t0 + ms(40)), Some(TimerKind::Heartbeat));
        assert_eq!(queue.pop_expired(t0 + ms(100)), None);
    }

    #[test]
    fn test_descheduled_timer_never_fires() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(TimerKind::Tick, t0, ms(10), false, true).unwrap();
        queue.schedule(TimerKind::Liveness, t0, ms(10), true, true).unwrap();
        queue.deschedule_all();

        assert!(!queue.is_scheduled(TimerKind::Tick));
        assert_eq!(queue.next_deadline(), None);
        assert_eq!(queue.pop_expired(t0 + ms(1000)), None);
    }

    #[test]
    fn test_repeating_timer() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(TimerKind::Tick, t0, ms(10), true, true).unwrap();

        assert_eq!(queue.pop_expired(t0 + ms(10)), Some(TimerKind::Tick));
        assert_eq!(queue.deadline(TimerKind::Tick), Some(t0 + ms(20)));
        assert_eq!(queue.pop_expired(t0 + ms(15)), None);
        assert_eq!(queue.pop_expired(t0 + ms(20)), Some(TimerKind::Tick));
    }

    #[test]
    fn test_zero_delay_repeating_fires_once() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(TimerKind::Tick, t0, Duration::ZERO, true, true).unwrap();

        assert_eq!(queue.pop_expired(t0), Some(TimerKind::Tick));
        assert_eq!(queue.pop_expired(t0), None);
    }

    #[test]
    fn test_deadline_overflow() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        assert_eq!(
            queue.schedule(TimerKind::Nak, t0, Duration::MAX, false, true),
            Err(TimerError::DeadlineOverflow)
        );
        assert!(!queue.is_scheduled(TimerKind::Nak));
    }

    #[test]
    fn test_compaction_keeps_armed_timers() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        for i in 0..(COMPACT_THRESHOLD as u64 * 3) {
            queue.schedule(TimerKind::Heartbeat, t0, ms(100 + i), false, true).unwrap();
        }
        queue.schedule(TimerKind::Tick, t0, ms(5), false, true).unwrap();

        assert!(queue.heap.len() <= COMPACT_THRESHOLD + 1);
        assert_eq!(queue.pop_expired(t0 + ms(5)), Some(TimerKind::Tick));
        assert_eq!(queue.pop_expired(t0 + ms(1000)), Some(TimerKind::Heartbeat));
        assert_eq!(queue.pop_expired(t0 + ms(1000)), None);
    }
}
